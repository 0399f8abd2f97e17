/*!
The annotated ground program.

Annotation derives, from a ground program and the external atoms active
in its component: the program mask, per-external-atom scope and input
masks, the replacement→external-atom reverse map, the atom-dependency
graph with its e-edges, the strongly connected components with their
head-cycle and external-cycle flags, and the per-component sub-programs.

The dependency graph holds one node per ordinary ground atom of the
program mask. Ordinary edges run from a head atom to each non-naf body
atom (and to every body atom of a weight rule, regardless of polarity);
e-edges run from the head atoms of a rule whose body holds a replacement
of external atom `X` to the input atoms of `X`. An e-edge is pruned when
the corresponding input parameter is antimonotonic (monotonic, under
naf) --- such a parameter cannot be the source of a non-monotone cycle
--- or when the oracle declares the input atom independent.

Every unreachable precondition here is a programming error and aborts.
*/

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::misc::log::targets;
use crate::oracle::{InputType, OracleRegistry};
use crate::registry::Registry;
use crate::structures::{AtomAddress, Id, Interpretation, Program};

/// The kind of a dependency edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// An intra-rule head→body dependency.
    Ordinary,

    /// A head→external-input dependency.
    External,
}

/// A dependency edge over ground atom addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepEdge {
    pub from: AtomAddress,
    pub to: AtomAddress,
    pub kind: EdgeKind,
}

/// Derived data for one active external atom.
#[derive(Clone, Debug)]
pub struct EatomAnnotation {
    /// The external atom.
    pub eatom: Id,

    /// Ground atoms over the predicate inputs.
    pub input_mask: Interpretation,

    /// Ground atoms over the auxiliary input predicate.
    pub aux_input_mask: Interpretation,

    /// Atoms whose change may affect verification: predicate inputs,
    /// auxiliary inputs, and the replacements themselves.
    pub scope_mask: Interpretation,

    /// Ground positive-replacement atoms of this external atom.
    pub positive_replacements: Vec<AtomAddress>,

    /// Ground negative-replacement atoms of this external atom.
    pub negative_replacements: Vec<AtomAddress>,
}

/// One strongly connected component of the dependency graph.
#[derive(Clone, Debug)]
pub struct SccInfo {
    /// The member atoms.
    pub atoms: Vec<AtomAddress>,

    /// Some rule has two or more head atoms in the component.
    pub head_cycle: bool,

    /// Some e-edge has both endpoints in the component.
    pub external_cycle: bool,

    /// The rules with a head atom in the component.
    pub program: Vec<Id>,
}

/// A ground program with its derived annotations.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedProgram {
    /// The ground program.
    pub program: Program,

    /// Every ground atom occurring in the program.
    pub program_mask: Interpretation,

    /// The indexed external atoms active in the component.
    pub eatoms: Vec<EatomAnnotation>,

    /// Replacement atom address → (index into `eatoms`, polarity of the
    /// replacement).
    pub replacement_of: HashMap<AtomAddress, (usize, bool)>,

    /// The strongly connected components, with constraints and weak
    /// constraints held separately in `constraints`.
    pub sccs: Vec<SccInfo>,

    /// Component index per atom.
    pub scc_of: HashMap<AtomAddress, usize>,

    /// Rules without head atoms.
    pub constraints: Vec<Id>,

    /// The dependency edges, kept for merging.
    pub edges: Vec<DepEdge>,

    /// Some component has a head cycle.
    pub head_cycle: bool,

    /// Some component has an external cycle.
    pub external_cycle: bool,

    /// Disjunction is compiled via choice semantics in the backend, so
    /// the unfounded-set check may not be skipped on head-cycle-freeness.
    pub choice_disjunction: bool,
}

impl AnnotatedProgram {
    /// Annotate `program` with respect to the active external atoms.
    pub fn new(
        registry: &Registry,
        oracles: &OracleRegistry,
        program: Program,
        active_eatoms: &[Id],
        monotonicity_filter: bool,
    ) -> AnnotatedProgram {
        let mut annotated = AnnotatedProgram {
            program,
            choice_disjunction: false,
            ..AnnotatedProgram::default()
        };

        annotated.build_program_mask(registry);
        annotated.build_eatom_annotations(registry, oracles, active_eatoms);
        annotated.build_dependency_graph(registry, oracles, monotonicity_filter);
        annotated.decompose(registry);

        log::debug!(
            target: targets::GENERATOR,
            "Annotated program: {} atoms, {} components, head cycle {}, e-cycle {}",
            annotated.program_mask.count(),
            annotated.sccs.len(),
            annotated.head_cycle,
            annotated.external_cycle
        );

        annotated
    }

    fn build_program_mask(&mut self, registry: &Registry) {
        let mut mask = self.program.edb.clone();
        for rule_id in &self.program.idb {
            let rule = registry.rule(*rule_id);
            for head in &rule.head {
                assert!(head.is_ordinary_ground_atom(), "! Nonground head atom");
                mask.set(head.address);
            }
            for literal in &rule.body {
                let atom = Id::atom_of(*literal);
                assert!(atom.is_ordinary_ground_atom(), "! Nonground body literal");
                mask.set(atom.address);
            }
        }
        self.program_mask = mask;
    }

    fn build_eatom_annotations(
        &mut self,
        registry: &Registry,
        oracles: &OracleRegistry,
        active_eatoms: &[Id],
    ) {
        for (index, eatom_id) in active_eatoms.iter().enumerate() {
            let external = registry.external(*eatom_id);

            let mut input_mask = Interpretation::new();
            if let Some(types) = oracles.input_types(external.predicate) {
                for (position, input) in external.inputs.iter().enumerate() {
                    if types.get(position) == Some(&InputType::Predicate) {
                        for atom in registry.ground_atoms_of(*input) {
                            if self.program_mask.test(atom.address) {
                                input_mask.set(atom.address);
                            }
                        }
                    }
                }
            }

            let mut aux_input_mask = Interpretation::new();
            if let Some(aux_input) = &external.aux_input {
                for atom in registry.ground_atoms_of(aux_input.predicate) {
                    aux_input_mask.set(atom.address);
                }
            }

            // Replacements are restricted to this component's program:
            // the registry may hold instances ground for other components
            // over the same external atom.
            let mut positive_replacements = Vec::new();
            let mut negative_replacements = Vec::new();
            for (type_char, list) in
                [('r', &mut positive_replacements), ('n', &mut negative_replacements)]
            {
                let replacement_atoms = match registry
                    .ground_atoms_of_aux(type_char, *eatom_id)
                {
                    Some(atoms) => atoms,
                    None => continue,
                };
                for atom in replacement_atoms {
                    if !self.program_mask.test(atom.address) {
                        continue;
                    }
                    list.push(atom.address);
                    self.replacement_of
                        .insert(atom.address, (index, type_char == 'r'));
                }
            }

            let mut scope_mask = input_mask.clone();
            scope_mask.union_with(&aux_input_mask);
            for address in positive_replacements.iter().chain(&negative_replacements) {
                scope_mask.set(*address);
            }

            self.eatoms.push(EatomAnnotation {
                eatom: *eatom_id,
                input_mask,
                aux_input_mask,
                scope_mask,
                positive_replacements,
                negative_replacements,
            });
        }
    }

    fn build_dependency_graph(
        &mut self,
        registry: &Registry,
        oracles: &OracleRegistry,
        monotonicity_filter: bool,
    ) {
        for rule_id in &self.program.idb {
            let rule = registry.rule(*rule_id);
            let weighted = rule.is_weight_rule();

            for head in &rule.head {
                for literal in &rule.body {
                    let atom = Id::atom_of(*literal);
                    if !literal.is_naf() || weighted {
                        self.edges.push(DepEdge {
                            from: head.address,
                            to: atom.address,
                            kind: EdgeKind::Ordinary,
                        });
                    }
                }
            }

            // E-edges: a replacement literal in the body ties the rule's
            // heads to the inputs of its external atom.
            for literal in &rule.body {
                let atom = Id::atom_of(*literal);
                let Some((eatom_index, _)) = self.replacement_of.get(&atom.address).copied()
                else {
                    continue;
                };
                let eatom_id = self.eatoms[eatom_index].eatom;
                let external = registry.external(eatom_id);
                let oracle = oracles.get(external.predicate);
                let properties = oracles.merged_properties(registry, eatom_id);
                let types = oracles.input_types(external.predicate).unwrap_or_default();

                let mut inputs = self.eatoms[eatom_index].input_mask.clone();
                inputs.union_with(&self.eatoms[eatom_index].aux_input_mask);

                for input_atom in inputs.iter_true() {
                    if !self.program_mask.test(input_atom) {
                        continue;
                    }
                    let input_predicate = registry.predicate_of(input_atom);

                    if monotonicity_filter {
                        let benign = external.inputs.iter().enumerate().any(|(i, input)| {
                            *input == input_predicate
                                && types.get(i) == Some(&InputType::Predicate)
                                && ((!literal.is_naf() && properties.is_antimonotonic(i))
                                    || (literal.is_naf() && properties.is_monotonic(i)))
                        });
                        if benign {
                            continue;
                        }
                    }

                    if let Some(oracle) = oracle {
                        if !oracle.relevant_input_atom(registry, external, input_atom) {
                            continue;
                        }
                    }

                    for head in &rule.head {
                        self.edges.push(DepEdge {
                            from: head.address,
                            to: input_atom,
                            kind: EdgeKind::External,
                        });
                    }
                }
            }
        }
    }

    fn decompose(&mut self, registry: &Registry) {
        let mut graph: DiGraph<AtomAddress, EdgeKind> = DiGraph::new();
        let mut nodes: HashMap<AtomAddress, NodeIndex> = HashMap::new();

        for atom in self.program_mask.iter_true() {
            nodes.insert(atom, graph.add_node(atom));
        }
        for edge in &self.edges {
            let from = nodes[&edge.from];
            let to = nodes[&edge.to];
            graph.add_edge(from, to, edge.kind);
        }

        self.sccs.clear();
        self.scc_of.clear();
        for component in tarjan_scc(&graph) {
            let index = self.sccs.len();
            let atoms: Vec<AtomAddress> =
                component.iter().map(|node| graph[*node]).collect();
            for atom in &atoms {
                self.scc_of.insert(*atom, index);
            }
            self.sccs.push(SccInfo {
                atoms,
                head_cycle: false,
                external_cycle: false,
                program: Vec::new(),
            });
        }

        for edge in &self.edges {
            if edge.kind == EdgeKind::External && self.scc_of[&edge.from] == self.scc_of[&edge.to]
            {
                self.sccs[self.scc_of[&edge.from]].external_cycle = true;
            }
        }

        self.constraints.clear();
        for rule_id in self.program.idb.clone() {
            let rule = registry.rule(rule_id);

            if rule.head.is_empty() {
                self.constraints.push(rule_id);
                continue;
            }

            let mut per_scc: HashMap<usize, usize> = HashMap::new();
            for head in &rule.head {
                *per_scc.entry(self.scc_of[&head.address]).or_insert(0) += 1;
            }
            for (scc, count) in per_scc {
                if count >= 2 {
                    self.sccs[scc].head_cycle = true;
                }
            }

            let home = self.scc_of[&rule.head[0].address];
            self.sccs[home].program.push(rule_id);
        }

        self.head_cycle = self.sccs.iter().any(|scc| scc.head_cycle);
        self.external_cycle = self.sccs.iter().any(|scc| scc.external_cycle);
    }

    /// The annotation index of the external atom a replacement atom
    /// stands for, with the replacement's polarity.
    pub fn eatom_of_replacement(&self, address: AtomAddress) -> Option<(usize, bool)> {
        self.replacement_of.get(&address).copied()
    }

    /// True if the minimality of a candidate is trivial for this program:
    /// no head cycle, no external cycle, and disjunction not compiled via
    /// choice semantics.
    pub fn minimality_is_trivial(&self) -> bool {
        !self.head_cycle && !self.external_cycle && !self.choice_disjunction
    }

    /// Fold `successor` into this program.
    ///
    /// Precondition: the successor has no cyclic dependency back into this
    /// program, so each of its components maps into at most one component
    /// here by shared atoms. Violations abort.
    pub fn merge_program(&mut self, successor: AnnotatedProgram) {
        for scc in successor.sccs {
            let mut target: Option<usize> = None;
            for atom in &scc.atoms {
                if let Some(here) = self.scc_of.get(atom) {
                    match target {
                        None => target = Some(*here),
                        Some(existing) => assert_eq!(
                            existing, *here,
                            "! Acyclic merge precondition violated"
                        ),
                    }
                }
            }

            match target {
                Some(here) => {
                    let info = &mut self.sccs[here];
                    info.head_cycle |= scc.head_cycle;
                    info.external_cycle |= scc.external_cycle;
                    for atom in scc.atoms {
                        if !info.atoms.contains(&atom) {
                            info.atoms.push(atom);
                            self.scc_of.insert(atom, here);
                        }
                    }
                    info.program.extend(scc.program);
                }

                None => {
                    let index = self.sccs.len();
                    for atom in &scc.atoms {
                        self.scc_of.insert(*atom, index);
                    }
                    self.sccs.push(scc);
                }
            }
        }

        self.program.edb.union_with(&successor.program.edb);
        self.program.idb.extend(successor.program.idb);
        self.program_mask.union_with(&successor.program_mask);
        self.constraints.extend(successor.constraints);
        self.edges.extend(successor.edges);

        let offset = self.eatoms.len();
        for (address, (index, polarity)) in successor.replacement_of {
            self.replacement_of.insert(address, (index + offset, polarity));
        }
        self.eatoms.extend(successor.eatoms);

        self.head_cycle = self.sccs.iter().any(|scc| scc.head_cycle);
        self.external_cycle = self.sccs.iter().any(|scc| scc.external_cycle);
    }
}
