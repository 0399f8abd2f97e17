/*!
External-atom evaluation heuristics.

An [EvalHeuristic] answers one question per external atom under a partial
assignment: evaluate now? High-frequency heuristics have every scope atom
watched so they are consulted on each scope change; low-frequency ones
watch a single unassigned scope atom at a time.
*/

use crate::config::EvalHeuristicKind;
use crate::structures::Interpretation;

/// How often a heuristic wants to be consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalFrequency {
    /// Consult on every change to a scope atom.
    High,

    /// Consult when the single watched scope atom is assigned.
    Low,
}

/// Decides when to evaluate one external atom.
#[derive(Debug)]
pub struct EvalHeuristic {
    kind: EvalHeuristicKind,
    consultations: u32,
}

impl EvalHeuristic {
    pub fn new(kind: EvalHeuristicKind) -> Self {
        EvalHeuristic {
            kind,
            consultations: 0,
        }
    }

    /// The watch mode the heuristic requires.
    pub fn frequency(&self) -> EvalFrequency {
        match self.kind {
            EvalHeuristicKind::Always | EvalHeuristicKind::Periodic(_) => EvalFrequency::High,
            EvalHeuristicKind::Never | EvalHeuristicKind::InputComplete => EvalFrequency::Low,
        }
    }

    /// Evaluate the external atom now?
    ///
    /// `scope` is the atom's scope mask and `assigned` the currently
    /// assigned atoms.
    pub fn should_evaluate(
        &mut self,
        scope: &Interpretation,
        assigned: &Interpretation,
    ) -> bool {
        self.consultations += 1;
        match self.kind {
            EvalHeuristicKind::Always => true,

            EvalHeuristicKind::Never => false,

            EvalHeuristicKind::Periodic(period) => {
                period > 0 && self.consultations % period == 0
            }

            EvalHeuristicKind::InputComplete => scope.is_subset_of(assigned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_complete_waits_for_the_scope() {
        let mut heuristic = EvalHeuristic::new(EvalHeuristicKind::InputComplete);
        let scope: Interpretation = [1, 2].into_iter().collect();

        let partial: Interpretation = [1].into_iter().collect();
        assert!(!heuristic.should_evaluate(&scope, &partial));

        let complete: Interpretation = [1, 2, 3].into_iter().collect();
        assert!(heuristic.should_evaluate(&scope, &complete));
    }

    #[test]
    fn periodic_counts_consultations() {
        let mut heuristic = EvalHeuristic::new(EvalHeuristicKind::Periodic(2));
        let scope = Interpretation::new();
        let assigned = Interpretation::new();

        assert!(!heuristic.should_evaluate(&scope, &assigned));
        assert!(heuristic.should_evaluate(&scope, &assigned));
        assert!(!heuristic.should_evaluate(&scope, &assigned));
    }
}
