/*!
Unfounded-set check heuristics.

The [SkipTracker] maintains the *skip program*: the rules with at least
one unassigned or unverified scope atom, which a partial check must
ignore. Bookkeeping is incremental --- per atom, the rules it
participates in; per rule, a count of ready atoms --- so a propagation
step costs time proportional to the atoms it changed.

A [UfsHeuristic] consults the tracker to decide whether a partial check
is worthwhile.
*/

use std::collections::{HashMap, HashSet};

use crate::config::UfsHeuristicKind;
use crate::registry::Registry;
use crate::structures::{AtomAddress, Id, Interpretation};

/// Incremental bookkeeping of the skip program.
#[derive(Debug, Default)]
pub struct SkipTracker {
    /// The atoms of each tracked rule.
    rule_atoms: Vec<Vec<AtomAddress>>,

    /// The rule ids, parallel to `rule_atoms`.
    rule_ids: Vec<Id>,

    /// The rules each atom participates in.
    member_of: HashMap<AtomAddress, Vec<usize>>,

    /// Per rule, the count of ready (assigned-and-verified) atoms.
    ready: Vec<usize>,

    /// The atoms currently counted ready.
    ready_atoms: HashSet<AtomAddress>,
}

impl SkipTracker {
    /// Track the rules of `idb`.
    pub fn new(registry: &Registry, idb: &[Id]) -> Self {
        let mut tracker = SkipTracker::default();

        for rule_id in idb {
            let rule = registry.rule(*rule_id);
            let mut atoms: Vec<AtomAddress> = rule
                .head
                .iter()
                .map(|head| head.address)
                .chain(rule.body.iter().map(|literal| Id::atom_of(*literal).address))
                .collect();
            atoms.sort();
            atoms.dedup();

            let index = tracker.rule_atoms.len();
            for atom in &atoms {
                tracker.member_of.entry(*atom).or_default().push(index);
            }
            tracker.rule_atoms.push(atoms);
            tracker.rule_ids.push(*rule_id);
            tracker.ready.push(0);
        }

        tracker
    }

    /// Update the tracker: an atom is ready when assigned and, if in some
    /// external scope, verified.
    pub fn update(&mut self, changed: &Interpretation, ready_now: impl Fn(AtomAddress) -> bool) {
        for atom in changed.iter_true() {
            let was_ready = self.ready_atoms.contains(&atom);
            let is_ready = ready_now(atom);
            if was_ready == is_ready {
                continue;
            }

            if is_ready {
                self.ready_atoms.insert(atom);
            } else {
                self.ready_atoms.remove(&atom);
            }

            if let Some(rules) = self.member_of.get(&atom) {
                for rule in rules {
                    if is_ready {
                        self.ready[*rule] += 1;
                    } else {
                        self.ready[*rule] -= 1;
                    }
                }
            }
        }
    }

    /// The rules of the skip program: those not fully ready.
    pub fn skip_program(&self) -> Vec<Id> {
        (0..self.rule_atoms.len())
            .filter(|index| self.ready[*index] < self.rule_atoms[*index].len())
            .map(|index| self.rule_ids[index])
            .collect()
    }

    /// A count of fully ready rules.
    pub fn ready_count(&self) -> usize {
        (0..self.rule_atoms.len())
            .filter(|index| self.ready[*index] == self.rule_atoms[*index].len())
            .count()
    }

    /// A count of tracked rules.
    pub fn rule_count(&self) -> usize {
        self.rule_atoms.len()
    }
}

/// Decides when to run a partial unfounded-set check.
#[derive(Debug)]
pub struct UfsHeuristic {
    kind: UfsHeuristicKind,
    consultations: u32,

    /// Ready count at the last triggered check, to require progress.
    last_ready: usize,
}

impl UfsHeuristic {
    pub fn new(kind: UfsHeuristicKind) -> Self {
        UfsHeuristic {
            kind,
            consultations: 0,
            last_ready: 0,
        }
    }

    /// Run a partial check now?
    pub fn should_check(&mut self, tracker: &SkipTracker) -> bool {
        self.consultations += 1;

        let fire = match self.kind {
            UfsHeuristicKind::Post => false,

            UfsHeuristicKind::Max => tracker.ready_count() > self.last_ready,

            UfsHeuristicKind::Periodic(period) => {
                period > 0
                    && self.consultations % period == 0
                    && tracker.ready_count() > self.last_ready
            }
        };

        if fire {
            self.last_ready = tracker.ready_count();
        }
        fire
    }

    /// Forget progress, e.g. after a restart.
    pub fn reset(&mut self) {
        self.last_ready = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::Rule;

    #[test]
    fn tracker_counts_ready_rules() {
        let mut registry = Registry::default();
        let p = registry.intern_constant("p");
        let q = registry.intern_constant("q");
        let a = registry.intern_constant("a");

        let pa = registry.intern_ground_atom(vec![p, a]);
        let qa = registry.intern_ground_atom(vec![q, a]);

        let rule = registry.intern_rule(Rule::regular(vec![pa], vec![Id::literal(qa)]));
        let mut tracker = SkipTracker::new(&registry, &[rule]);

        assert_eq!(tracker.skip_program(), vec![rule]);

        let both: Interpretation = [pa.address, qa.address].into_iter().collect();
        tracker.update(&both, |_| true);

        assert!(tracker.skip_program().is_empty());
        assert_eq!(tracker.ready_count(), 1);

        // One atom loses its value again.
        let one: Interpretation = [qa.address].into_iter().collect();
        tracker.update(&one, |_| false);
        assert_eq!(tracker.skip_program(), vec![rule]);
    }
}
