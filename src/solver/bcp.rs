/*!
Nogood propagation.

A nogood forbids the joint satisfaction of its literals, so propagation is
the mirror image of clause propagation: each (non-unit) nogood watches two
of its literals which are not currently satisfied, lists are indexed by the
literal whose *satisfaction* may move the nogood closer to violation, and
when all literals but one are satisfied the remaining literal is falsified.

Watch lists are taken out of the solver while traversed. This avoids a
mutable borrow of the list conflicting with watch moves, and is sound as a
replacement watch is never the just-satisfied literal (a replacement must
be unsatisfied).
*/

use crate::misc::log::targets;
use crate::structures::{Lit, Nogood};

use super::{AddOutcome, GenericGroundSolver, NogoodKey, Reason, SolverState, StoredNogood};

/// What examining a single watch entry concluded.
enum WatchOutcome {
    /// The watch moved to another literal; drop this entry.
    Moved,

    /// The entry stays.
    Keep,

    /// The entry stays, and the other watch was falsified in response.
    Forced,

    /// Every literal of the nogood is satisfied.
    Conflict,
}

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// Propagate every queued assignment. On conflict, the key of a
    /// violated nogood is returned.
    pub(crate) fn propagate_queue(&mut self) -> Result<(), NogoodKey> {
        while let Some(&literal) = self.trail.assignments.get(self.trail.q_head) {
            self.trail.q_head += 1;
            self.propagate_literal(literal)?;
        }
        self.propagate_weight_bodies()
    }

    /// Examine the nogoods watching `literal`, which has just been
    /// satisfied.
    fn propagate_literal(&mut self, literal: Lit) -> Result<(), NogoodKey> {
        let address = literal.address() as usize;
        let side = literal.polarity() as usize;
        let mut list = std::mem::take(&mut self.watches[address][side]);

        let mut index = 0;
        while index < list.len() {
            let key = list[index];
            if !self.nogoods[key as usize].active {
                list.swap_remove(index);
                continue;
            }

            match self.examine_watch(key, literal) {
                WatchOutcome::Moved => {
                    list.swap_remove(index);
                }

                WatchOutcome::Keep | WatchOutcome::Forced => {
                    index += 1;
                }

                WatchOutcome::Conflict => {
                    log::trace!(target: targets::PROPAGATION, "Nogood {key} violated by {literal}");
                    // Reinstall the remainder of the list before bailing.
                    self.watches[address][side].append(&mut list);
                    return Err(key);
                }
            }
        }

        self.watches[address][side].append(&mut list);
        Ok(())
    }

    fn examine_watch(&mut self, key: NogoodKey, literal: Lit) -> WatchOutcome {
        let (this_is_a, this, other, length) = {
            let nogood = &self.nogoods[key as usize];
            if nogood.literals[nogood.watch_a] == literal {
                (true, nogood.watch_a, nogood.watch_b, nogood.literals.len())
            } else if nogood.literals[nogood.watch_b] == literal {
                (false, nogood.watch_b, nogood.watch_a, nogood.literals.len())
            } else {
                // A stale entry left by an earlier watch move.
                return WatchOutcome::Moved;
            }
        };

        // A replacement watch is any unwatched literal which is not
        // satisfied.
        for candidate in 0..length {
            if candidate == this || candidate == other {
                continue;
            }
            let candidate_literal = self.nogoods[key as usize].literals[candidate];
            if self.value_of_lit(candidate_literal) != Some(true) {
                let nogood = &mut self.nogoods[key as usize];
                match this_is_a {
                    true => nogood.watch_a = candidate,
                    false => nogood.watch_b = candidate,
                }
                self.watches[candidate_literal.address() as usize]
                    [candidate_literal.polarity() as usize]
                    .push(key);
                return WatchOutcome::Moved;
            }
        }

        // No replacement: every literal but the other watch is satisfied.
        let other_literal = self.nogoods[key as usize].literals[other];
        match self.value_of_lit(other_literal) {
            Some(true) => WatchOutcome::Conflict,

            None => {
                self.assign(other_literal.negate(), Reason::Propagated(key));
                WatchOutcome::Forced
            }

            // The other watch is falsified; the nogood cannot be violated
            // while it holds its value.
            Some(false) => WatchOutcome::Keep,
        }
    }

    /// Evaluate weight-rule bodies against the current assignment, forcing
    /// reified body atoms whose value is determined.
    ///
    /// Forced values are justified by an ordinary nogood over the
    /// contributing literals, so conflict analysis needs no special case.
    pub(crate) fn propagate_weight_bodies(&mut self) -> Result<(), NogoodKey> {
        for index in 0..self.encoding.weight_bodies.len() {
            let body = &self.encoding.weight_bodies[index];
            let beta = body.beta;
            let bound = body.bound;

            let mut satisfied: u64 = 0;
            let mut possible: u64 = 0;
            for (literal, weight) in &body.literals {
                match self.value_of_lit(*literal) {
                    Some(true) => {
                        satisfied += weight;
                        possible += weight;
                    }
                    None => possible += weight,
                    Some(false) => {}
                }
            }

            let forced = if satisfied >= bound {
                // The satisfied prefix meets the bound.
                let body = &self.encoding.weight_bodies[index];
                let mut reason: Vec<Lit> = body
                    .literals
                    .iter()
                    .filter(|(literal, _)| self.value_of_lit(*literal) == Some(true))
                    .map(|(literal, _)| *literal)
                    .collect();
                reason.push(Lit::negative(beta));
                Some((Lit::positive(beta), reason))
            } else if possible < bound {
                // Too much weight is already lost.
                let body = &self.encoding.weight_bodies[index];
                let mut reason: Vec<Lit> = body
                    .literals
                    .iter()
                    .filter(|(literal, _)| self.value_of_lit(*literal) == Some(false))
                    .map(|(literal, _)| literal.negate())
                    .collect();
                reason.push(Lit::positive(beta));
                Some((Lit::negative(beta), reason))
            } else {
                None
            };

            if let Some((value, reason)) = forced {
                if self.value_of_lit(value) == Some(true) {
                    continue;
                }
                match self.add_nogood(Nogood::new(reason)) {
                    AddOutcome::Conflict(key) => return Err(key),
                    AddOutcome::Propagated => return self.propagate_queue(),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Admit `nogood` into the store, at any time.
    ///
    /// The nogood is evaluated against the current assignment: it may
    /// force an assignment, or report a conflict for the caller to
    /// analyse. Vacuous and duplicate nogoods are ignored.
    pub fn add_nogood(&mut self, nogood: Nogood) -> AddOutcome {
        if nogood.is_empty() {
            log::info!(target: targets::PROPAGATION, "Empty nogood added");
            self.state = SolverState::Exhausted;
            self.explanation_core = Some(Nogood::empty());
            return AddOutcome::TopConflict;
        }

        if nogood.is_vacuous() {
            return AddOutcome::Ignored;
        }

        let signature = nogood.signature();
        if let Some(keys) = self.dedup.get(&signature) {
            for key in keys {
                let stored = &self.nogoods[*key as usize];
                if stored.active
                    && stored.literals.len() == nogood.len()
                    && nogood
                        .literals()
                        .iter()
                        .all(|literal| stored.literals.contains(literal))
                {
                    return AddOutcome::Ignored;
                }
            }
        }

        for literal in nogood.literals() {
            if literal.address() as usize >= self.cells.len() {
                self.grow_to(literal.address() as usize + 1);
            }
            self.decidable.set(literal.address());
            // The atom may have been discarded from the heap while it was
            // outside every nogood.
            if self.cells[literal.address() as usize].value.is_none() {
                self.heap.activate(literal.address() as usize);
            }
        }

        self.store_nogood(nogood, false)
    }

    /// Store `nogood` with watches chosen against the current assignment.
    pub(crate) fn store_nogood(&mut self, nogood: Nogood, learnt: bool) -> AddOutcome {
        let literals: Vec<Lit> = nogood.literals().to_vec();
        let key = self.nogoods.len() as NogoodKey;

        // Watch preferences: unsatisfied literals first, then satisfied
        // literals of maximal level.
        let mut watch_a = 0;
        let mut watch_b = if literals.len() > 1 { 1 } else { 0 };
        if literals.len() > 1 {
            let mut order: Vec<usize> = (0..literals.len()).collect();
            order.sort_by_key(|&index| match self.value_of_lit(literals[index]) {
                None => (0, u32::MAX - self.level_of(literals[index])),
                Some(false) => (0, u32::MAX - self.level_of(literals[index])),
                Some(true) => (1, u32::MAX - self.level_of(literals[index])),
            });
            watch_a = order[0];
            watch_b = order[1];
        }

        let unsatisfied: Vec<usize> = (0..literals.len())
            .filter(|&index| self.value_of_lit(literals[index]) != Some(true))
            .collect();

        self.dedup.entry(nogood.signature()).or_default().push(key);
        self.nogoods.push(StoredNogood {
            literals: literals.clone(),
            learnt,
            active: true,
            activity: self.activity_increment,
            watch_a,
            watch_b,
        });

        for watch in [watch_a, watch_b] {
            let literal = literals[watch];
            self.watches[literal.address() as usize][literal.polarity() as usize].push(key);
            if watch_a == watch_b {
                break;
            }
        }

        match unsatisfied.len() {
            0 => {
                log::trace!(target: targets::PROPAGATION, "Added nogood {key} is violated");
                AddOutcome::Conflict(key)
            }

            1 => {
                let pending = literals[unsatisfied[0]];
                match self.value_of_lit(pending) {
                    None => {
                        self.assign(pending.negate(), Reason::Propagated(key));
                        AddOutcome::Propagated
                    }
                    // Falsified: the nogood is satisfied for now.
                    _ => AddOutcome::Added,
                }
            }

            _ => AddOutcome::Added,
        }
    }

    pub(crate) fn level_of(&self, literal: Lit) -> u32 {
        let cell = &self.cells[literal.address() as usize];
        match cell.value {
            Some(_) => cell.level,
            None => u32::MAX,
        }
    }

    /// Forget half of the learnt nogoods, least active first.
    ///
    /// Nogoods currently acting as a reason are kept.
    pub(crate) fn reduce_learnt(&mut self) {
        let reasons: std::collections::HashSet<NogoodKey> = self
            .trail
            .assignments
            .iter()
            .filter_map(|literal| {
                match self.cells[literal.address() as usize].reason {
                    Reason::Propagated(key) => Some(key),
                    _ => None,
                }
            })
            .collect();

        let mut learnt: Vec<NogoodKey> = (0..self.nogoods.len() as NogoodKey)
            .filter(|key| {
                let nogood = &self.nogoods[*key as usize];
                nogood.learnt && nogood.active && !reasons.contains(key)
            })
            .collect();
        learnt.sort_by(|a, b| {
            self.nogoods[*a as usize]
                .activity
                .partial_cmp(&self.nogoods[*b as usize].activity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let removals = learnt.len() / 2;
        for key in learnt.into_iter().take(removals) {
            self.nogoods[key as usize].active = false;
        }
        log::info!(target: targets::PROPAGATION, "Reduced learnt store by {removals}");
    }
}
