/*!
The encoding-based unfounded-set checker.

Per candidate, a fresh satisfiability problem is laid down whose models
are exactly the nonempty candidate unfounded sets of one component:
- one search variable per member atom of the component true in the
  candidate (facts and replacement atoms excluded --- the former are
  founded by definition, the latter are handled through re-evaluation);
- a nonemptiness nogood;
- per rule whose body holds in the candidate, a nogood forbidding any
  set the rule would found: every true head inside the set, no positive
  ordinary support from the set, and no oracle input inside the set.

Each produced set is post-verified against the oracles; see the
[module documentation](crate::ufs).
*/

use std::collections::{HashMap, HashSet};

use crate::annotated::AnnotatedProgram;
use crate::config::SolverConfig;
use crate::misc::log::targets;
use crate::registry::Registry;
use crate::solver::GroundSolver;
use crate::structures::{AtomAddress, Id, Interpretation, Lit, Nogood};

use super::{body_true, founded_in_reduct, rule_parts, ReductOracle, RuleParts};

/// A per-candidate checker for one component.
pub struct EncodingUfsChecker {
    component: usize,
}

impl EncodingUfsChecker {
    pub fn new(_registry: &Registry, _annotated: &AnnotatedProgram, component: usize) -> Self {
        EncodingUfsChecker { component }
    }

    /// Search for a nonempty unfounded set of the component under
    /// `candidate`, ignoring the rules of `skip`.
    pub fn find(
        &self,
        registry: &Registry,
        annotated: &AnnotatedProgram,
        candidate: &Interpretation,
        skip: &HashSet<Id>,
        oracle: &mut dyn ReductOracle,
    ) -> Option<Vec<AtomAddress>> {
        let scc = &annotated.sccs[self.component];
        let members: Interpretation = scc.atoms.iter().copied().collect();

        // The search domain: true member atoms which are neither facts
        // nor replacements.
        let domain: Vec<AtomAddress> = scc
            .atoms
            .iter()
            .copied()
            .filter(|atom| {
                candidate.test(*atom)
                    && !annotated.program.edb.test(*atom)
                    && annotated.eatom_of_replacement(*atom).is_none()
            })
            .collect();
        if domain.is_empty() {
            return None;
        }
        let variable: HashMap<AtomAddress, u32> = domain
            .iter()
            .enumerate()
            .map(|(index, atom)| (*atom, index as u32))
            .collect();

        // Rules with some head in the component, body holding in the
        // candidate, and not skipped.
        let rules: Vec<RuleParts> = annotated
            .program
            .idb
            .iter()
            .filter(|rule_id| !skip.contains(rule_id))
            .map(|rule_id| rule_parts(registry, annotated, *rule_id))
            .filter(|parts| parts.heads.iter().any(|head| members.test(*head)))
            .collect();

        let mut solver = GroundSolver::over_atoms(domain.len(), SolverConfig::default());

        solver.add_nogood(Nogood::new(
            variable.values().map(|index| Lit::negative(*index)),
        ));

        for parts in &rules {
            if !body_true(parts, candidate) {
                continue;
            }

            let true_heads: Vec<AtomAddress> = parts
                .heads
                .iter()
                .copied()
                .filter(|head| candidate.test(*head))
                .collect();
            if true_heads.is_empty() {
                continue;
            }
            // A true head outside the domain can never join the set, so
            // the rule retains external support and blocks nothing.
            if true_heads
                .iter()
                .any(|head| !variable.contains_key(head))
            {
                continue;
            }

            let mut block: Vec<Lit> = true_heads
                .iter()
                .map(|head| Lit::positive(variable[head]))
                .collect();
            for atom in &parts.positive_ordinary {
                if let Some(index) = variable.get(atom) {
                    block.push(Lit::negative(*index));
                }
            }
            for input in &parts.inputs {
                if let Some(index) = variable.get(input) {
                    block.push(Lit::negative(*index));
                }
            }
            solver.add_nogood(Nogood::new(block));
        }

        while let Some(model) = solver.next_model() {
            let unfounded: Vec<AtomAddress> = domain
                .iter()
                .copied()
                .filter(|atom| model.test(variable[atom]))
                .collect();
            let set: Interpretation = unfounded.iter().copied().collect();

            if !founded_in_reduct(registry, annotated, &rules, candidate, &set, oracle) {
                return Some(unfounded);
            }
            log::trace!(
                target: targets::UFS,
                "Candidate set of {} atoms withdrawn after re-evaluation",
                unfounded.len()
            );
        }

        None
    }
}
