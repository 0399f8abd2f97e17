/*!
Conflict analysis.

Analysis resolves a violated nogood against the reasons of its literals
until exactly one literal assigned at the conflict level remains --- the
unique implication point. The resolvent is learnt, and asserting it after
a backjump falsifies the implication point.

Resolution over nogoods runs on satisfied literals: a trail literal `t`
forced by nogood `N` appears in `N` with opposite polarity, so the
resolvent of a nogood holding `t` with `N` drops `t` and gains the other
(satisfied) literals of `N`.
*/

use std::collections::HashSet;

use crate::misc::log::targets;
use crate::structures::{AtomAddress, Lit, Nogood};

use super::{GenericGroundSolver, LevelIndex, NogoodKey, Reason, SolverState};

/// The result of analysing a conflict.
#[derive(Debug, PartialEq, Eq)]
pub enum AnalysisOk {
    /// A nogood was learnt and asserted after a backjump.
    Asserting,

    /// The conflict does not depend on any decision: the solver is
    /// exhausted (under the current assumptions).
    Fundamental,
}

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// Analyse the violated nogood under `conflict`, learn the asserting
    /// resolvent, and backjump.
    pub(crate) fn analyse(&mut self, conflict: NogoodKey) -> AnalysisOk {
        self.total_conflicts += 1;
        self.fresh_conflicts += 1;
        self.decay_activity();
        self.nogoods[conflict as usize].activity += self.activity_increment;

        let conflict_literals = self.nogoods[conflict as usize].literals.clone();

        // A nogood violated below the current level is analysed at the
        // level of its latest literal.
        let conflict_level = conflict_literals
            .iter()
            .map(|literal| self.level_of(*literal))
            .max()
            .unwrap_or(0);
        if conflict_level < self.trail.level() {
            self.backjump(conflict_level);
        }

        if conflict_level <= self.trail.initial_decision_level {
            log::info!(target: targets::ANALYSIS, "Fundamental conflict");
            self.explanation_core = Some(self.assumption_core(&conflict_literals));
            self.state = SolverState::Exhausted;
            return AnalysisOk::Fundamental;
        }

        let mut seen: HashSet<AtomAddress> = HashSet::new();
        let mut learnt: Vec<Lit> = Vec::new();
        let mut pending: usize = 0;

        let mut absorb =
            |solver: &mut Self,
             literals: &[Lit],
             skip: Option<AtomAddress>,
             seen: &mut HashSet<AtomAddress>,
             learnt: &mut Vec<Lit>,
             pending: &mut usize| {
                for literal in literals {
                    if Some(literal.address()) == skip || seen.contains(&literal.address()) {
                        continue;
                    }
                    seen.insert(literal.address());
                    solver.bump_atom(literal.address());

                    let level = solver.level_of(*literal);
                    if level == conflict_level {
                        *pending += 1;
                    } else if level > 0 {
                        learnt.push(*literal);
                    }
                }
            };

        absorb(
            self,
            &conflict_literals,
            None,
            &mut seen,
            &mut learnt,
            &mut pending,
        );

        let mut index = self.trail.assignments.len();
        let uip = loop {
            debug_assert!(index > 0, "! Trail exhausted during analysis");
            index -= 1;
            let trail_literal = self.trail.assignments[index];
            if !seen.contains(&trail_literal.address()) {
                continue;
            }

            pending -= 1;
            if pending == 0 {
                break trail_literal;
            }

            match self.cells[trail_literal.address() as usize].reason {
                Reason::Propagated(key) => {
                    self.nogoods[key as usize].activity += self.activity_increment;
                    let reason_literals = self.nogoods[key as usize].literals.clone();
                    absorb(
                        self,
                        &reason_literals,
                        Some(trail_literal.address()),
                        &mut seen,
                        &mut learnt,
                        &mut pending,
                    );
                }

                Reason::Decision | Reason::Assumption => {
                    unreachable!("! Unforced literal below the implication point")
                }
            }
        };

        self.minimise(&mut learnt, uip);
        learnt.push(uip);

        let backjump_level = learnt
            .iter()
            .filter(|literal| **literal != uip)
            .map(|literal| self.level_of(*literal))
            .max()
            .unwrap_or(self.trail.initial_decision_level)
            .max(self.trail.initial_decision_level);

        log::trace!(
            target: targets::ANALYSIS,
            "Learnt nogood of length {} asserting at level {backjump_level}",
            learnt.len()
        );

        self.backjump(backjump_level as LevelIndex);

        // After the backjump the implication point is the single
        // unsatisfied literal, so storing also asserts.
        self.store_nogood(Nogood::new(learnt), true);

        AnalysisOk::Asserting
    }

    /// Drop learnt literals whose reason resolves entirely into the learnt
    /// set and proven literals.
    fn minimise(&self, learnt: &mut Vec<Lit>, uip: Lit) {
        let keep: Vec<Lit> = learnt.clone();
        learnt.retain(|literal| {
            match self.cells[literal.address() as usize].reason {
                Reason::Propagated(key) => {
                    let redundant = self.nogoods[key as usize].literals.iter().all(|other| {
                        other.address() == literal.address()
                            || self.level_of(*other) == 0
                            || *other == uip
                            || keep.contains(other)
                    });
                    !redundant
                }
                _ => true,
            }
        });
    }

    /// Resolve `literals` back to the assumptions they depend on.
    ///
    /// Propagated literals are replaced by the other literals of their
    /// reason; assumption literals are kept; proven (level-zero,
    /// unit-forced) literals vanish once their reasons are exhausted.
    pub(crate) fn assumption_core(&self, literals: &[Lit]) -> Nogood {
        let mut seen: HashSet<AtomAddress> =
            literals.iter().map(|literal| literal.address()).collect();
        let mut core: Vec<Lit> = Vec::new();

        for index in (0..self.trail.assignments.len()).rev() {
            let trail_literal = self.trail.assignments[index];
            if !seen.contains(&trail_literal.address()) {
                continue;
            }

            match self.cells[trail_literal.address() as usize].reason {
                Reason::Assumption => core.push(trail_literal),

                Reason::Propagated(key) => {
                    for other in &self.nogoods[key as usize].literals {
                        if other.address() != trail_literal.address() {
                            seen.insert(other.address());
                        }
                    }
                }

                // A decision cannot be below the implication point of a
                // fundamental conflict.
                Reason::Decision => {}
            }
        }

        Nogood::new(core)
    }
}
