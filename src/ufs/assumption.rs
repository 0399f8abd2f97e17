/*!
The assumption-based unfounded-set checker.

One static encoding per component, built at initialisation and re-solved
with different assumptions per candidate. Shadow variables track, per
atom, its truth in the candidate (`a_I`, fixed by assumption) and its
membership in the set (`a_U`, searched); combined markers `a_{I∧U}` and
`a_{¬I∨U}` keep the per-rule founding conditions expressible as plain
nogoods. Rules are enabled per candidate through an activation variable,
which is how the skip program is applied without rebuilding.

The learnt nogoods of the inner solver persist across candidate queries.
*/

use std::collections::{HashMap, HashSet};

use crate::annotated::AnnotatedProgram;
use crate::config::SolverConfig;
use crate::misc::log::targets;
use crate::registry::Registry;
use crate::solver::GroundSolver;
use crate::structures::{AtomAddress, Id, Interpretation, Lit, Nogood};

use super::{founded_in_reduct, rule_parts, ReductOracle, RuleParts};

/// A static checker for one component.
pub struct AssumptionUfsChecker {
    solver: GroundSolver,

    /// Truth-in-candidate variables, fixed by assumption.
    var_i: HashMap<AtomAddress, u32>,

    /// Set-membership variables over the search domain.
    var_u: HashMap<AtomAddress, u32>,

    /// Per-rule activation variables, fixed by assumption.
    var_active: HashMap<Id, u32>,

    /// The search domain, in variable order.
    domain: Vec<AtomAddress>,

    /// The decomposed rules of the component.
    rules: Vec<RuleParts>,
}

impl AssumptionUfsChecker {
    /// Build the static encoding for `component`.
    pub fn new(registry: &Registry, annotated: &AnnotatedProgram, component: usize) -> Self {
        let scc = &annotated.sccs[component];
        let members: Interpretation = scc.atoms.iter().copied().collect();

        let rules: Vec<RuleParts> = annotated
            .program
            .idb
            .iter()
            .map(|rule_id| rule_parts(registry, annotated, *rule_id))
            .filter(|parts| parts.heads.iter().any(|head| members.test(*head)))
            .collect();

        let domain: Vec<AtomAddress> = scc
            .atoms
            .iter()
            .copied()
            .filter(|atom| {
                !annotated.program.edb.test(*atom)
                    && annotated.eatom_of_replacement(*atom).is_none()
            })
            .collect();

        let mut next_variable: u32 = 0;
        let mut fresh = || {
            let variable = next_variable;
            next_variable += 1;
            variable
        };

        let mut var_i: HashMap<AtomAddress, u32> = HashMap::new();
        let mut var_u: HashMap<AtomAddress, u32> = HashMap::new();
        let mut var_active: HashMap<Id, u32> = HashMap::new();

        for parts in &rules {
            for atom in parts
                .heads
                .iter()
                .chain(parts.positive_ordinary.iter())
                .chain(parts.naf_ordinary.iter())
                .chain(parts.inputs.iter())
                .chain(parts.replacements.iter().map(|(atom, _, _)| atom))
            {
                var_i.entry(*atom).or_insert_with(&mut fresh);
            }
            var_active.entry(parts.rule).or_insert_with(&mut fresh);
        }
        for atom in &domain {
            var_i.entry(*atom).or_insert_with(&mut fresh);
            var_u.entry(*atom).or_insert_with(&mut fresh);
        }

        let mut nogoods: Vec<Nogood> = Vec::new();

        // U ⊆ I.
        for atom in &domain {
            nogoods.push(Nogood::new([
                Lit::positive(var_u[atom]),
                Lit::negative(var_i[atom]),
            ]));
        }

        // U nonempty.
        nogoods.push(Nogood::new(
            domain.iter().map(|atom| Lit::negative(var_u[atom])),
        ));

        for parts in &rules {
            // b_sat ↔ the body holds in the candidate.
            let body_literals: Vec<Lit> = parts
                .positive_ordinary
                .iter()
                .map(|atom| Lit::positive(var_i[atom]))
                .chain(
                    parts
                        .naf_ordinary
                        .iter()
                        .map(|atom| Lit::negative(var_i[atom])),
                )
                .chain(
                    parts
                        .replacements
                        .iter()
                        .map(|(atom, polarity, _)| Lit::new(var_i[atom], *polarity)),
                )
                .collect();

            let b_sat = fresh();
            for literal in &body_literals {
                nogoods.push(Nogood::new([Lit::positive(b_sat), literal.negate()]));
            }
            nogoods.push(Nogood::new(
                body_literals
                    .iter()
                    .copied()
                    .chain([Lit::negative(b_sat)]),
            ));

            // Per head markers: in-candidate-and-in-set, and
            // out-of-candidate-or-in-set.
            let mut m_in_set = Vec::with_capacity(parts.heads.len());
            let mut m_covered = Vec::with_capacity(parts.heads.len());
            for head in &parts.heads {
                let i = var_i[head];
                let m1 = fresh();
                let m2 = fresh();

                match var_u.get(head) {
                    Some(u) => {
                        nogoods.push(Nogood::new([Lit::positive(m1), Lit::negative(i)]));
                        nogoods.push(Nogood::new([Lit::positive(m1), Lit::negative(*u)]));
                        nogoods.push(Nogood::new([
                            Lit::negative(m1),
                            Lit::positive(i),
                            Lit::positive(*u),
                        ]));

                        nogoods.push(Nogood::new([Lit::negative(m2), Lit::negative(i)]));
                        nogoods.push(Nogood::new([Lit::negative(m2), Lit::positive(*u)]));
                        nogoods.push(Nogood::new([
                            Lit::positive(m2),
                            Lit::positive(i),
                            Lit::negative(*u),
                        ]));
                    }

                    // Heads outside the domain can never join the set.
                    None => {
                        nogoods.push(Nogood::new([Lit::positive(m1)]));
                        nogoods.push(Nogood::new([Lit::negative(m2), Lit::negative(i)]));
                        nogoods.push(Nogood::new([Lit::positive(m2), Lit::positive(i)]));
                    }
                }

                m_in_set.push(m1);
                m_covered.push(m2);
            }

            // h_any ↔ some head is in the candidate and the set.
            let h_any = fresh();
            nogoods.push(Nogood::new(
                m_in_set
                    .iter()
                    .map(|m1| Lit::negative(*m1))
                    .chain([Lit::positive(h_any)]),
            ));
            for m1 in &m_in_set {
                nogoods.push(Nogood::new([Lit::negative(h_any), Lit::positive(*m1)]));
            }

            // The founding block: an active rule with a held body, every
            // head covered, some head in the set, and no support or
            // oracle input from the set, forbids the set.
            let mut block: Vec<Lit> = vec![
                Lit::positive(var_active[&parts.rule]),
                Lit::positive(b_sat),
                Lit::positive(h_any),
            ];
            block.extend(m_covered.iter().map(|m2| Lit::positive(*m2)));
            for atom in &parts.positive_ordinary {
                if let Some(u) = var_u.get(atom) {
                    block.push(Lit::negative(*u));
                }
            }
            for input in &parts.inputs {
                if let Some(u) = var_u.get(input) {
                    block.push(Lit::negative(*u));
                }
            }
            nogoods.push(Nogood::new(block));
        }

        let mut solver = GroundSolver::over_atoms(next_variable as usize, SolverConfig::default());
        for nogood in nogoods {
            solver.add_nogood(nogood);
        }

        log::debug!(
            target: targets::UFS,
            "Static encoding: {} variables over {} rules",
            next_variable,
            rules.len()
        );

        AssumptionUfsChecker {
            solver,
            var_i,
            var_u,
            var_active,
            domain,
            rules,
        }
    }

    /// Re-solve the static encoding under `candidate`, ignoring the
    /// rules of `skip`.
    pub fn find(
        &mut self,
        registry: &Registry,
        annotated: &AnnotatedProgram,
        candidate: &Interpretation,
        skip: &HashSet<Id>,
        oracle: &mut dyn ReductOracle,
    ) -> Option<Vec<AtomAddress>> {
        let mut assumptions: Vec<Lit> = self
            .var_i
            .iter()
            .map(|(atom, variable)| Lit::new(*variable, candidate.test(*atom)))
            .collect();
        assumptions.extend(
            self.var_active
                .iter()
                .map(|(rule, variable)| Lit::new(*variable, !skip.contains(rule))),
        );

        self.solver.restart_with_assumptions(assumptions);

        while let Some(model) = self.solver.next_model() {
            let unfounded: Vec<AtomAddress> = self
                .domain
                .iter()
                .copied()
                .filter(|atom| model.test(self.var_u[atom]))
                .collect();
            let set: Interpretation = unfounded.iter().copied().collect();

            let active_rules: Vec<RuleParts> = self
                .rules
                .iter()
                .filter(|parts| !skip.contains(&parts.rule))
                .cloned()
                .collect();
            if !founded_in_reduct(registry, annotated, &active_rules, candidate, &set, oracle) {
                return Some(unfounded);
            }
        }

        None
    }
}
