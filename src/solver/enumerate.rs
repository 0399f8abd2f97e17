/*!
Model enumeration.

[next_model](GenericGroundSolver::next_model) drives search to the next
assignment violating no nogood, passing each propagation fixpoint to the
attached propagator and each total assignment through the final checks:
the ordinary-loop (unfounded-set) elimination for positive cycles without
head or external involvement, and the optimum bound.

Between successive calls the solver re-enters where it left off: the
previous model is excluded through the nogood of its decision literals,
which after a backjump flips the latest decision and continues the
search chronologically.
*/

use crate::misc::log::targets;
use crate::structures::{Interpretation, Lit, Nogood};

use super::decision::DecisionOk;
use super::encoding::LoopRule;
use super::{
    AddOutcome, AnalysisOk, GenericGroundSolver, NogoodKey, PropagationView, SolverState,
};

/// A conflict met during propagation.
pub(crate) enum Conflict {
    /// A stored nogood is violated.
    Nogood(NogoodKey),

    /// The empty nogood was added: no assignment is admissible.
    Top,
}

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// Search for the next model. Returns none on exhaustion, after which
    /// [inconsistency_cause](GenericGroundSolver::inconsistency_cause)
    /// may be queried if assumptions were installed.
    pub fn next_model(&mut self) -> Option<Interpretation> {
        match self.state {
            SolverState::Exhausted => return None,

            SolverState::Input => {
                self.state = SolverState::Solving;
                if !self.assert_assumptions() {
                    self.state = SolverState::Exhausted;
                    return None;
                }
            }

            SolverState::Solving => {}
        }

        if self.model_found {
            self.model_found = false;
            if !self.exclude_current_model() {
                self.state = SolverState::Exhausted;
                return None;
            }
        }

        'search: loop {
            if let Some(flag) = &self.terminate {
                if flag.load(std::sync::atomic::Ordering::Relaxed) {
                    log::info!(target: targets::PROPAGATION, "Termination requested");
                    return None;
                }
            }

            match self.propagate_fixpoint() {
                Err(Conflict::Top) => {
                    self.state = SolverState::Exhausted;
                    return None;
                }

                Err(Conflict::Nogood(key)) => match self.analyse(key) {
                    AnalysisOk::Fundamental => return None,

                    AnalysisOk::Asserting => {
                        if self.restart_due() {
                            self.restart();
                        }
                        continue 'search;
                    }
                },

                Ok(()) => match self.make_decision() {
                    DecisionOk::Made => continue 'search,

                    DecisionOk::Exhausted => {
                        // A total assignment; apply the final checks.
                        if let Some(reject) = self.check_total() {
                            if !self.apply_rejection(reject) {
                                return None;
                            }
                            continue 'search;
                        }

                        self.model_found = true;
                        let mut model = self.true_view.clone();
                        model.subtract(&self.encoding.strip);
                        return Some(model);
                    }
                },
            }
        }
    }

    /// Propagate to a fixpoint, interleaving the attached propagator.
    pub(crate) fn propagate_fixpoint(&mut self) -> Result<(), Conflict> {
        loop {
            self.propagate_queue().map_err(Conflict::Nogood)?;

            let Some(propagator) = self.propagator.clone() else {
                return Ok(());
            };

            let nogoods = {
                let view = PropagationView {
                    partial: &self.true_view,
                    assigned: &self.assigned_view,
                    changed: &self.changed_view,
                };
                propagator.borrow_mut().propagate(&view)
            };
            self.changed_view.clear_all();

            let mut progress = false;
            for nogood in nogoods {
                match self.add_nogood(nogood) {
                    AddOutcome::TopConflict => return Err(Conflict::Top),
                    AddOutcome::Conflict(key) => return Err(Conflict::Nogood(key)),
                    AddOutcome::Propagated => progress = true,
                    AddOutcome::Added | AddOutcome::Ignored => {}
                }
            }

            if !progress {
                return Ok(());
            }
        }
    }

    /// Admit a nogood from outside the search loop --- verification and
    /// minimality rejections --- resolving any conflict with the standing
    /// assignment at once. Returns false on exhaustion.
    ///
    /// A conflict here abandons the standing model, so the caller's next
    /// [next_model](GenericGroundSolver::next_model) resumes from the
    /// backjump rather than excluding a no-longer-standing assignment.
    pub fn integrate_nogood(&mut self, nogood: Nogood) -> bool {
        match self.add_nogood(nogood) {
            AddOutcome::TopConflict => {
                self.model_found = false;
                self.state = SolverState::Exhausted;
                false
            }

            AddOutcome::Conflict(key) => {
                self.model_found = false;
                matches!(self.analyse(key), AnalysisOk::Asserting)
            }

            _ => true,
        }
    }

    /// Handle a nogood rejecting the current total assignment. Returns
    /// false on exhaustion.
    fn apply_rejection(&mut self, reject: Nogood) -> bool {
        match self.add_nogood(reject) {
            AddOutcome::TopConflict => {
                self.state = SolverState::Exhausted;
                false
            }

            AddOutcome::Conflict(key) => match self.analyse(key) {
                AnalysisOk::Fundamental => false,
                AnalysisOk::Asserting => true,
            },

            AddOutcome::Propagated | AddOutcome::Added => true,

            AddOutcome::Ignored => {
                // A rejection must be fresh; fall back to chronological
                // enumeration to keep the search moving.
                log::warn!(target: targets::PROPAGATION, "Stale rejection nogood");
                self.exclude_current_model()
            }
        }
    }

    /// Exclude the current total assignment via its decision literals.
    /// Returns false when no decision is left to flip.
    pub(crate) fn exclude_current_model(&mut self) -> bool {
        let decisions: Vec<Lit> = (self.trail.initial_decision_level as usize
            ..self.trail.level_indices.len())
            .map(|level| self.trail.assignments[self.trail.level_indices[level]])
            .collect();

        if decisions.is_empty() {
            return false;
        }

        self.backjump(self.trail.level() - 1);

        match self.add_nogood(Nogood::new(decisions)) {
            AddOutcome::TopConflict => false,
            AddOutcome::Conflict(key) => matches!(self.analyse(key), AnalysisOk::Asserting),
            _ => true,
        }
    }

    /// The final checks on a total assignment. Returns a nogood rejecting
    /// the assignment, or none if it stands as a model.
    fn check_total(&mut self) -> Option<Nogood> {
        if let Some(loop_nogood) = self.ordinary_loop_check() {
            log::info!(target: targets::PROPAGATION, "Unfounded loop rejected");
            return Some(loop_nogood);
        }

        if let Some(optimum) = self.optimum.clone() {
            let costs = self.current_costs();
            if !lexicographically_better(&costs, &optimum) {
                log::info!(target: targets::PROPAGATION, "Model not better than the optimum");
                let decisions: Vec<Lit> = (self.trail.initial_decision_level as usize
                    ..self.trail.level_indices.len())
                    .map(|level| self.trail.assignments[self.trail.level_indices[level]])
                    .collect();
                return Some(Nogood::new(decisions));
            }
        }

        None
    }

    /// Search the positive-cycle components for a nonempty unfounded set
    /// under the current total assignment, returning its loop nogood.
    ///
    /// Components with head cycles or external cycles are not present in
    /// the encoding; their minimality is the business of the unfounded-set
    /// checker behind the propagator.
    fn ordinary_loop_check(&self) -> Option<Nogood> {
        for component in &self.encoding.loop_components {
            let mut unfounded: Vec<u32> = component
                .atoms
                .iter()
                .copied()
                .filter(|atom| self.value_of(*atom) == Some(true))
                .collect();
            if unfounded.is_empty() {
                continue;
            }

            // Shrink to the greatest unfounded set: drop any atom with a
            // founding rule whose positive support avoids the set.
            let mut shrunk = true;
            while shrunk {
                shrunk = false;
                let member: Interpretation = unfounded.iter().copied().collect();

                unfounded.retain(|atom| {
                    let founded = component.rules.iter().any(|rule| {
                        rule.scc_head() == *atom && self.rule_founds(rule, &member)
                    });
                    if founded {
                        shrunk = true;
                    }
                    !founded
                });
            }

            if unfounded.is_empty() {
                continue;
            }

            // The loop nogood: the set itself, plus witnesses that every
            // rule over the set fails to found it.
            let member: Interpretation = unfounded.iter().copied().collect();
            let mut literals: Vec<Lit> =
                unfounded.iter().map(|atom| Lit::positive(*atom)).collect();

            for rule in &component.rules {
                if !member.test(rule.scc_head()) {
                    continue;
                }
                self.founding_failure_witnesses(rule, &member, &mut literals);
            }

            return Some(Nogood::new(literals));
        }

        None
    }

    /// True if `rule` founds its component head atom outside `member`.
    fn rule_founds(&self, rule: &LoopRule, member: &Interpretation) -> bool {
        match rule {
            LoopRule::Plain {
                beta,
                other_heads,
                positive_body_in_scc,
                ..
            } => {
                self.value_of(*beta) == Some(true)
                    && other_heads
                        .iter()
                        .all(|head| self.value_of(*head) != Some(true))
                    && positive_body_in_scc.iter().all(|atom| !member.test(*atom))
            }

            LoopRule::Weight {
                other_heads,
                literals,
                bound,
                ..
            } => {
                if other_heads
                    .iter()
                    .any(|head| self.value_of(*head) == Some(true))
                {
                    return false;
                }
                let external_weight: u64 = literals
                    .iter()
                    .filter(|(literal, _)| {
                        self.value_of_lit(*literal) == Some(true)
                            && !(literal.polarity() && member.test(literal.address()))
                    })
                    .map(|(_, weight)| weight)
                    .sum();
                external_weight >= *bound
            }
        }
    }

    /// Append literals witnessing that `rule` fails to found `member`.
    ///
    /// Positive dependence on the set itself needs no witness: the set's
    /// own literals carry it.
    fn founding_failure_witnesses(
        &self,
        rule: &LoopRule,
        member: &Interpretation,
        literals: &mut Vec<Lit>,
    ) {
        match rule {
            LoopRule::Plain {
                beta,
                other_heads,
                positive_body_in_scc,
                ..
            } => {
                if self.value_of(*beta) != Some(true) {
                    literals.push(Lit::negative(*beta));
                } else if let Some(head) = other_heads
                    .iter()
                    .find(|head| self.value_of(**head) == Some(true))
                {
                    literals.push(Lit::positive(*head));
                } else {
                    debug_assert!(
                        positive_body_in_scc.iter().any(|atom| member.test(*atom)),
                        "! A founding rule left unfounded"
                    );
                }
            }

            LoopRule::Weight {
                other_heads,
                literals: weighted,
                ..
            } => {
                if let Some(head) = other_heads
                    .iter()
                    .find(|head| self.value_of(**head) == Some(true))
                {
                    literals.push(Lit::positive(*head));
                } else {
                    // The weight reachable outside the set falls short;
                    // witnessed by the unsatisfied body literals.
                    for (literal, _) in weighted {
                        if self.value_of_lit(*literal) == Some(false) {
                            literals.push(literal.negate());
                        }
                    }
                }
            }
        }
    }
}

/// True if `costs` is strictly better than `bound`, comparing levels from
/// most significant down.
pub fn lexicographically_better(costs: &[u64], bound: &[u64]) -> bool {
    let levels = costs.len().max(bound.len());
    for level in (0..levels).rev() {
        let ours = costs.get(level).copied().unwrap_or(0);
        let theirs = bound.get(level).copied().unwrap_or(0);
        if ours != theirs {
            return ours < theirs;
        }
    }
    false
}
