/*!
Translation of a ground program into nogoods.

Each rule body is reified through an auxiliary atom defined by Clark
completion, rule satisfaction ties the body atom to the head disjunction,
and atom support completes the other direction: a true atom needs some
rule supporting it. Disjunctive rules whose heads avoid head cycles are
given *shifted* support (the body holds and every other head atom is
false) through a second auxiliary; head-cyclic rules keep the weak
support of their body atom alone, leaving minimality to the unfounded-set
checker behind the propagator.

Weight-rule bodies are not completed: their reified atoms are valued by
the bound propagation in [bcp](crate::solver::bcp).

Positive cycles free of head cycles are collected into loop components
for the solver's own unfounded-set elimination on total assignments; see
[enumerate](crate::solver::enumerate).

Reification auxiliaries live in the `'b'` / `'s'` spaces of the registry
and are projected away from returned models.
*/

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::annotated::AnnotatedProgram;
use crate::config::SolverConfig;
use crate::misc::log::targets;
use crate::registry::Registry;
use crate::structures::{AtomAddress, Id, Interpretation, Lit, Nogood};

use super::{AddOutcome, GenericGroundSolver, WeakCost, WeightBody};

/// The per-program data the solver carries beyond its nogoods.
#[derive(Debug, Default)]
pub struct ProgramEncoding {
    /// Reification auxiliaries, projected away from returned models.
    pub strip: Interpretation,

    /// Weight-rule bodies, valued by bound propagation.
    pub weight_bodies: Vec<WeightBody>,

    /// Weak-constraint cost entries.
    pub weak_costs: Vec<WeakCost>,

    /// Positive-cycle components subject to the internal unfounded-set
    /// elimination.
    pub loop_components: Vec<LoopComponent>,
}

/// A positive cycle without head cycles.
#[derive(Debug)]
pub struct LoopComponent {
    /// The member atoms; facts and frozen atoms are excluded, being
    /// founded by definition.
    pub atoms: Vec<AtomAddress>,

    /// The rules with their single head atom in the component.
    pub rules: Vec<LoopRule>,
}

/// A rule as seen by the loop check.
#[derive(Debug)]
pub enum LoopRule {
    Plain {
        /// The head atom inside the component.
        scc_head: AtomAddress,

        /// The reified body atom.
        beta: AtomAddress,

        /// Head atoms outside the component.
        other_heads: Vec<AtomAddress>,

        /// Positive body atoms inside the component.
        positive_body_in_scc: Vec<AtomAddress>,
    },

    Weight {
        /// The head atom inside the component.
        scc_head: AtomAddress,

        /// Head atoms outside the component.
        other_heads: Vec<AtomAddress>,

        /// The weighted body literals.
        literals: Vec<(Lit, u64)>,

        /// The bound to reach.
        bound: u64,
    },
}

impl LoopRule {
    pub fn scc_head(&self) -> AtomAddress {
        match self {
            LoopRule::Plain { scc_head, .. } | LoopRule::Weight { scc_head, .. } => *scc_head,
        }
    }
}

/// The signed ground literal of a body literal id.
pub(crate) fn body_lit(literal: Id) -> Lit {
    let atom = Id::atom_of(literal);
    Lit::new(atom.address, !literal.is_naf())
}

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// A solver over the nogood translation of `annotated`.
    pub fn from_program(
        annotated: &AnnotatedProgram,
        registry: &mut Registry,
        config: SolverConfig,
    ) -> Self {
        let mut solver = Self::over_atoms(0, config);
        solver.add_program(annotated, registry, &Interpretation::new());
        solver
    }

    /// Admit the rules of `annotated` into the solver.
    ///
    /// Atoms of `frozen` are barred from free decisions and carry no
    /// support obligation; their values belong to program parts supplied
    /// later. Head atoms must be fresh to this call: support is completed
    /// per call, so redefining an atom across calls is a programming
    /// error.
    pub fn add_program(
        &mut self,
        annotated: &AnnotatedProgram,
        registry: &mut Registry,
        frozen: &Interpretation,
    ) {
        // Intern every reification auxiliary first, so the atom space is
        // complete before nogoods are laid down.
        let mut beta_of: HashMap<Id, AtomAddress> = HashMap::new();
        let mut sigma_of: HashMap<(Id, usize), AtomAddress> = HashMap::new();

        for rule_id in &annotated.program.idb {
            let rule = registry.rule(*rule_id).clone();
            if rule.is_weak_constraint() || rule.is_constraint() {
                continue;
            }

            let beta_symbol = registry.aux_symbol('b', *rule_id);
            let beta = registry.intern_ground_atom(vec![beta_symbol]).address;
            beta_of.insert(*rule_id, beta);

            if rule.is_disjunctive() && !self.rule_has_head_cycle(annotated, &rule) {
                let sigma_symbol = registry.aux_symbol('s', *rule_id);
                for index in 0..rule.head.len() {
                    let sigma = registry
                        .intern_ground_atom(vec![sigma_symbol, Id::integer(index as u32)])
                        .address;
                    sigma_of.insert((*rule_id, index), sigma);
                }
            }
        }

        self.grow_to(registry.ground_atom_count() as usize);
        for atom in frozen.iter_true() {
            self.cells[atom as usize].frozen = true;
        }
        self.decidable.union_with(&annotated.program_mask);
        for beta in beta_of.values() {
            self.encoding.strip.set(*beta);
        }
        for sigma in sigma_of.values() {
            self.encoding.strip.set(*sigma);
        }

        // Facts.
        for atom in annotated.program.edb.iter_true() {
            self.admit(Nogood::new([Lit::negative(atom)]));
        }

        // Rules.
        let mut supports: HashMap<AtomAddress, Vec<AtomAddress>> = HashMap::new();

        for rule_id in &annotated.program.idb {
            let rule = registry.rule(*rule_id).clone();

            if rule.is_weak_constraint() {
                let annotation = rule.weak.as_ref().expect("! Weak subkind without annotation");
                self.encoding.weak_costs.push(WeakCost {
                    level: annotation.level,
                    weight: annotation.weight,
                    body: rule.body.iter().map(|literal| body_lit(*literal)).collect(),
                });
                continue;
            }

            if rule.is_constraint() {
                self.admit(Nogood::new(
                    rule.body.iter().map(|literal| body_lit(*literal)),
                ));
                continue;
            }

            let beta = beta_of[rule_id];
            let body: Vec<Lit> = rule.body.iter().map(|literal| body_lit(*literal)).collect();

            if rule.is_weight_rule() {
                let weights = rule
                    .body_weights
                    .as_ref()
                    .expect("! Weight subkind without weights");
                self.encoding.weight_bodies.push(WeightBody {
                    beta,
                    literals: body.iter().copied().zip(weights.iter().copied()).collect(),
                    bound: rule.bound.expect("! Weight subkind without bound"),
                });
            } else {
                // Completion of the reified body.
                for literal in &body {
                    self.admit(Nogood::new([Lit::positive(beta), literal.negate()]));
                }
                self.admit(Nogood::new(
                    body.iter().copied().chain([Lit::negative(beta)]),
                ));
            }

            // Satisfaction: a held body implies some head.
            self.admit(Nogood::new(
                rule.head
                    .iter()
                    .map(|head| Lit::negative(head.address))
                    .chain([Lit::positive(beta)]),
            ));

            // Support sources per head atom.
            let shifted = rule.is_disjunctive() && !self.rule_has_head_cycle(annotated, &rule);
            for (index, head) in rule.head.iter().enumerate() {
                let source = if shifted {
                    let sigma = sigma_of[&(*rule_id, index)];

                    // sigma holds exactly when the body holds and every
                    // other head atom fails.
                    self.admit(Nogood::new([
                        Lit::positive(sigma),
                        Lit::negative(beta),
                    ]));
                    for (other_index, other) in rule.head.iter().enumerate() {
                        if other_index != index {
                            self.admit(Nogood::new([
                                Lit::positive(sigma),
                                Lit::positive(other.address),
                            ]));
                        }
                    }
                    self.admit(Nogood::new(
                        rule.head
                            .iter()
                            .enumerate()
                            .filter(|(other_index, _)| *other_index != index)
                            .map(|(_, other)| Lit::negative(other.address))
                            .chain([Lit::negative(sigma), Lit::positive(beta)]),
                    ));

                    sigma
                } else {
                    beta
                };

                supports.entry(head.address).or_default().push(source);
            }
        }

        // Support: a true atom needs a source. Facts, frozen atoms, and
        // the reification space itself are exempt.
        for atom in annotated.program_mask.iter_true() {
            if annotated.program.edb.test(atom)
                || frozen.test(atom)
                || self.encoding.strip.test(atom)
                || self.cells[atom as usize].frozen
            {
                continue;
            }
            let sources = supports.remove(&atom).unwrap_or_default();
            self.admit(Nogood::new(
                sources
                    .into_iter()
                    .map(Lit::negative)
                    .chain([Lit::positive(atom)]),
            ));
        }

        self.collect_loop_components(annotated, registry, &beta_of, frozen);

        log::info!(
            target: targets::PROPAGATION,
            "Program admitted: {} atoms, {} nogoods, {} loop components",
            self.cells.len(),
            self.nogoods.len(),
            self.encoding.loop_components.len()
        );
    }

    /// True if two or more head atoms of `rule` share a component.
    fn rule_has_head_cycle(
        &self,
        annotated: &AnnotatedProgram,
        rule: &crate::structures::Rule,
    ) -> bool {
        for (index, head) in rule.head.iter().enumerate() {
            for other in &rule.head[index + 1..] {
                if annotated.scc_of.get(&head.address).is_some()
                    && annotated.scc_of.get(&head.address) == annotated.scc_of.get(&other.address)
                {
                    return true;
                }
            }
        }
        false
    }

    /// Feed an encoding nogood to the store, resolving immediate
    /// conflicts; a level-zero conflict exhausts the solver.
    fn admit(&mut self, nogood: Nogood) {
        match self.add_nogood(nogood) {
            AddOutcome::Conflict(key) => {
                self.analyse(key);
            }
            _ => {}
        }
    }

    /// Group positive cycles without head cycles into loop components.
    fn collect_loop_components(
        &mut self,
        annotated: &AnnotatedProgram,
        registry: &Registry,
        beta_of: &HashMap<Id, AtomAddress>,
        frozen: &Interpretation,
    ) {
        let mut graph: DiGraph<AtomAddress, ()> = DiGraph::new();
        let mut nodes: HashMap<AtomAddress, NodeIndex> = HashMap::new();
        let mut node = |graph: &mut DiGraph<AtomAddress, ()>, atom: AtomAddress| {
            *nodes
                .entry(atom)
                .or_insert_with(|| graph.add_node(atom))
        };

        for rule_id in &annotated.program.idb {
            let rule = registry.rule(*rule_id);
            for head in &rule.head {
                let from = node(&mut graph, head.address);
                for literal in &rule.body {
                    if literal.is_naf() {
                        continue;
                    }
                    let to = node(&mut graph, Id::atom_of(*literal).address);
                    graph.add_edge(from, to, ());
                }
            }
        }

        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || graph
                    .neighbors(component[0])
                    .any(|neighbor| neighbor == component[0]);
            if !cyclic {
                continue;
            }

            let members: Interpretation =
                component.iter().map(|index| graph[*index]).collect();

            // Head-cyclic components belong to the external checker.
            let head_cycle = annotated.program.idb.iter().any(|rule_id| {
                let rule = registry.rule(*rule_id);
                rule.head
                    .iter()
                    .filter(|head| members.test(head.address))
                    .count()
                    >= 2
            });
            if head_cycle {
                continue;
            }

            let atoms: Vec<AtomAddress> = component
                .iter()
                .map(|index| graph[*index])
                .filter(|atom| {
                    !annotated.program.edb.test(*atom) && !frozen.test(*atom)
                })
                .collect();
            if atoms.is_empty() {
                continue;
            }

            let mut rules = Vec::new();
            for rule_id in &annotated.program.idb {
                let rule = registry.rule(*rule_id);
                let Some(scc_head) = rule
                    .head
                    .iter()
                    .map(|head| head.address)
                    .find(|head| members.test(*head))
                else {
                    continue;
                };
                let other_heads: Vec<AtomAddress> = rule
                    .head
                    .iter()
                    .map(|head| head.address)
                    .filter(|head| *head != scc_head)
                    .collect();

                if rule.is_weight_rule() {
                    let weights = rule.body_weights.as_ref().expect("! Weights");
                    rules.push(LoopRule::Weight {
                        scc_head,
                        other_heads,
                        literals: rule
                            .body
                            .iter()
                            .map(|literal| body_lit(*literal))
                            .zip(weights.iter().copied())
                            .collect(),
                        bound: rule.bound.expect("! Bound"),
                    });
                } else {
                    rules.push(LoopRule::Plain {
                        scc_head,
                        beta: beta_of[rule_id],
                        other_heads,
                        positive_body_in_scc: rule
                            .body
                            .iter()
                            .filter(|literal| !literal.is_naf())
                            .map(|literal| Id::atom_of(*literal).address)
                            .filter(|atom| members.test(*atom))
                            .collect(),
                    });
                }
            }

            self.encoding
                .loop_components
                .push(LoopComponent { atoms, rules });
        }
    }
}
