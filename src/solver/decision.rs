/*!
Decisions.

When propagation settles without conflict and atoms remain unassigned,
the solver decides: the unassigned atom of most activity is taken from the
heap and valued by phase saving, a configured polarity lean, or the
negative default --- which suits answer-set search, as unsupported atoms
must be false in any model.
*/

use crate::structures::Lit;

use super::{GenericGroundSolver, Reason};

/// The result of attempting a decision.
#[derive(Debug, PartialEq, Eq)]
pub enum DecisionOk {
    /// A decision was made at a fresh level.
    Made,

    /// Every atom is assigned.
    Exhausted,
}

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// Open a fresh level with a decision on some unassigned atom.
    pub(crate) fn make_decision(&mut self) -> DecisionOk {
        let atom = loop {
            match self.heap.pop_max() {
                Some(atom) => {
                    if self.cells[atom].value.is_none() && self.decidable.test(atom as u32) {
                        break atom;
                    }
                }
                None => return DecisionOk::Exhausted,
            }
        };

        let cell = &self.cells[atom];
        let polarity = if cell.frozen {
            // Frozen atoms hold their values for later program parts.
            false
        } else if self.config.phase_saving {
            cell.previous
        } else if self.config.polarity_lean > 0.0 {
            self.rng.random_bool(self.config.polarity_lean)
        } else {
            false
        };

        let literal = Lit::new(atom as u32, polarity);
        self.trail.level_indices.push(self.trail.assignments.len());
        self.assign(literal, Reason::Decision);
        log::trace!(
            target: crate::misc::log::targets::PROPAGATION,
            "Decided {literal} at level {}",
            self.trail.level()
        );

        DecisionOk::Made
    }

    /// True if the luby-scheduled restart interval has been reached.
    pub(crate) fn restart_due(&self) -> bool {
        self.config.restarts
            && self.fresh_conflicts >= self.luby.current().saturating_mul(self.config.luby_u)
    }

    /// Forget decisions and reschedule.
    pub(crate) fn restart(&mut self) {
        self.backjump(self.trail.initial_decision_level);
        self.fresh_conflicts = 0;
        self.luby.next();

        if self.config.reduction_limit > 0 {
            let active_learnt = self
                .nogoods
                .iter()
                .filter(|nogood| nogood.learnt && nogood.active)
                .count();
            if active_learnt > self.config.reduction_limit {
                self.reduce_learnt();
            }
        }
    }
}
