/*!
Assumptions and inconsistency causes.

Assumptions are signed literals forced true before any decision, each at
its own level below the first decision level. When search exhausts under
assumptions, the final conflict is resolved back through the trail to the
subset of assumptions it depends on --- the inconsistency cause handed to
predecessor units by transitive learning.
*/

use crate::misc::log::targets;
use crate::structures::{AtomAddress, Lit, Nogood};
use crate::types::err::SolverError;

use super::enumerate::Conflict;
use super::{GenericGroundSolver, Reason, SolverState};

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// Restart the solver, clearing decisions and prior assumptions, with
    /// `literals` to be forced true at the base of any further search.
    pub fn restart_with_assumptions(&mut self, literals: Vec<Lit>) {
        self.backjump(0);
        self.trail.initial_decision_level = 0;
        self.assumptions = literals;
        self.state = SolverState::Input;
        self.model_found = false;
        self.explanation_core = None;
    }

    /// Force the installed assumptions, one level each. Returns false if
    /// the assumptions are inconsistent with the nogoods, in which case an
    /// inconsistency cause is recorded.
    pub(crate) fn assert_assumptions(&mut self) -> bool {
        // Settle proven consequences first, so an assumption conflicting
        // with a unit nogood is recognised as such.
        match self.propagate_fixpoint() {
            Ok(()) => {}

            Err(Conflict::Top) => return false,

            Err(Conflict::Nogood(key)) => {
                let literals = self.nogoods[key as usize].literals.clone();
                self.explanation_core = Some(self.assumption_core(&literals));
                return false;
            }
        }

        for assumption in self.assumptions.clone() {
            match self.value_of_lit(assumption) {
                Some(true) => continue,

                Some(false) => {
                    // The assumption contradicts an implied literal; the
                    // cause is the assumption plus whatever implied its
                    // negation.
                    log::info!(target: targets::ANALYSIS, "Assumption {assumption} is refuted");
                    let mut cause = self.assumption_core(&[assumption.negate()]);
                    cause = Nogood::new(
                        cause.literals().iter().copied().chain([assumption]),
                    );
                    self.explanation_core = Some(cause);
                    return false;
                }

                None => {
                    self.trail
                        .level_indices
                        .push(self.trail.assignments.len());
                    self.assign(assumption, Reason::Assumption);
                    self.trail.initial_decision_level = self.trail.level();

                    match self.propagate_fixpoint() {
                        Ok(()) => {}

                        Err(Conflict::Top) => return false,

                        Err(Conflict::Nogood(key)) => {
                            let literals = self.nogoods[key as usize].literals.clone();
                            self.explanation_core = Some(self.assumption_core(&literals));
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    /// The subset of `explanation` atoms whose assumed values suffice to
    /// derive unsatisfiability.
    ///
    /// Only valid immediately after [next_model](GenericGroundSolver::next_model)
    /// returned none through exhaustion. The installed assumptions are
    /// expected to range over the explanation atoms.
    pub fn inconsistency_cause(
        &self,
        explanation: &[AtomAddress],
    ) -> Result<Nogood, SolverError> {
        if self.state != SolverState::Exhausted {
            return Err(SolverError::NoInconsistency);
        }

        let core = self
            .explanation_core
            .clone()
            .ok_or(SolverError::NoInconsistency)?;

        Ok(Nogood::new(
            core.literals()
                .iter()
                .copied()
                .filter(|literal| explanation.contains(&literal.address())),
        ))
    }
}
