/*!
Inconsistency analysis --- transitive unit learning.

When the very first model query of a unit exhausts without a model, the
question becomes: which atoms from predecessor units caused the unit to
have no model? The *explanation atoms* are the ground atoms over
predicates the component reads but does not define. The component is
reground *exhaustively*, so that every head atom which could conceivably
be derived is present; an extension rule through a fresh explanation
marker keeps each explanation atom derivable in principle, and the
markers join the explanation set so spurious causes are recognisable.

An auxiliary solver over the reground program --- primed with every
nogood the main search learned --- is solved under assumptions fixing
each explanation atom to its input value, and the resulting
inconsistency cause is published upward unless it leans on a marker.
*/

use std::collections::HashSet;
use std::sync::Arc;

use crate::annotated::AnnotatedProgram;
use crate::grounder::{self, GroundingOptions};
use crate::misc::log::targets;
use crate::solver::GroundSolver;
use crate::structures::{AtomAddress, Id, Interpretation, Lit, Nogood, Program, Rule};

use super::ModelGenerator;

impl ModelGenerator {
    /// Identify which input atoms caused the unit to have no model.
    pub(crate) fn identify_inconsistency_cause(&mut self) -> Option<Nogood> {
        log::info!(target: targets::INCONSISTENCY, "Analysing inconsistency");

        // Predicates defined by the component: those of its head atoms.
        // Read predicates include the predicate inputs of the inner
        // external atoms, which reach the component only through their
        // oracles.
        let (defined, read): (HashSet<Id>, HashSet<Id>) = {
            let registry = self.registry.borrow();
            let mut defined = HashSet::new();
            let mut read = HashSet::new();
            for rule_id in &self.extended_idb {
                let rule = registry.rule(*rule_id);
                for head in &rule.head {
                    defined.insert(registry.ordinary_atom(*head).predicate());
                }
                for literal in &rule.body {
                    let atom = Id::atom_of(*literal);
                    if atom.is_ordinary_atom() && !atom.is_aux() {
                        read.insert(registry.ordinary_atom(atom).predicate());
                    }
                }
            }
            for eatom in &self.inner_eatoms {
                let external = registry.external(*eatom);
                if let Some(types) = self.oracles.input_types(external.predicate) {
                    for (position, input) in external.inputs.iter().enumerate() {
                        if types.get(position) == Some(&crate::oracle::InputType::Predicate) {
                            read.insert(*input);
                        }
                    }
                }
            }
            (defined, read)
        };

        let underdefined: HashSet<Id> = read
            .into_iter()
            .filter(|predicate| !defined.contains(predicate))
            .collect();
        if underdefined.is_empty() {
            log::info!(target: targets::INCONSISTENCY, "No explanation atoms");
            return None;
        }

        // Exhaustive regrounding: every conceivable input constellation
        // is present as a ground instance. Explanation atoms are
        // withdrawn from the facts --- their values are the assumptions
        // under analysis.
        let options = GroundingOptions {
            underdefined: underdefined.clone(),
        };
        let analysis_edb = {
            let registry = self.registry.borrow();
            let mut edb = self.input_mask.clone();
            for atom in self.input_mask.iter_true() {
                if underdefined.contains(&registry.predicate_of(atom)) {
                    edb.clear(atom);
                }
            }
            edb
        };
        let extended = Program::new(analysis_edb, self.extended_idb.clone());
        let mut ground = match grounder::ground(
            &mut self.registry.borrow_mut(),
            &extended,
            &options,
        ) {
            Ok(ground) => ground,
            Err(error) => {
                log::warn!(
                    target: targets::INCONSISTENCY,
                    "Exhaustive regrounding failed: {error:?}"
                );
                return None;
            }
        };

        // Explanation atoms, and an extension rule through a marker for
        // each.
        let mut explanation: Vec<AtomAddress> = Vec::new();
        let mut markers: Vec<AtomAddress> = Vec::new();
        {
            let mut registry = self.registry.borrow_mut();
            let atoms: Vec<Id> = underdefined
                .iter()
                .flat_map(|predicate| registry.ground_atoms_of(*predicate).to_vec())
                .collect();

            for atom in atoms {
                explanation.push(atom.address);

                let marker_symbol = registry.aux_symbol('x', atom);
                let marker = registry.intern_ground_atom(vec![marker_symbol]);
                markers.push(marker.address);

                let extension =
                    registry.intern_rule(Rule::regular(vec![atom], vec![Id::literal(marker)]));
                ground.idb.push(extension);
            }
        }

        // Annotate and translate for the analysis solver; explanation
        // atoms are frozen, their values belonging to the predecessor.
        let annotated = Arc::new(AnnotatedProgram::new(
            &self.registry.borrow(),
            &self.oracles,
            ground,
            &self.inner_eatoms,
            self.config.monotonicity_edge_filter,
        ));
        let frozen: Interpretation = explanation.iter().copied().collect();
        let mut analysis_solver = GroundSolver::over_atoms(0, self.config.solver);
        analysis_solver.add_program(&annotated, &mut self.registry.borrow_mut(), &frozen);

        // Replay everything the main search learned, and the causes
        // imported from successors.
        {
            let verifier = self.verifier.borrow();
            for nogood in verifier.store.ground() {
                analysis_solver.integrate_nogood(nogood.clone());
            }
        }
        for nogood in &self.imported {
            analysis_solver.integrate_nogood(nogood.clone());
        }

        // Assumptions: explanation atoms at their input values, markers
        // false.
        let mut assumptions: Vec<Lit> = explanation
            .iter()
            .map(|atom| Lit::new(*atom, self.input_mask.test(*atom)))
            .collect();
        assumptions.extend(markers.iter().map(|marker| Lit::negative(*marker)));
        analysis_solver.restart_with_assumptions(assumptions);

        if analysis_solver.next_model().is_some() {
            log::warn!(
                target: targets::INCONSISTENCY,
                "Analysis solver found a model; no cause to report"
            );
            return None;
        }

        let mut atoms: Vec<AtomAddress> = explanation.clone();
        atoms.extend(markers.iter().copied());
        let cause = match analysis_solver.inconsistency_cause(&atoms) {
            Ok(cause) => cause,
            Err(error) => {
                log::warn!(target: targets::INCONSISTENCY, "No cause: {error:?}");
                return None;
            }
        };

        // A cause leaning on an extension marker is an artefact of the
        // extensibility construction.
        if cause
            .literals()
            .iter()
            .any(|literal| markers.contains(&literal.address()))
        {
            log::info!(target: targets::INCONSISTENCY, "No real explanation found");
            return None;
        }

        log::info!(
            target: targets::INCONSISTENCY,
            "Inconsistency cause over {} literals",
            cause.len()
        );
        Some(cause)
    }
}
