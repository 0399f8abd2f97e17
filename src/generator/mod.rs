/*!
The model generator --- the guess-and-check loop for one component.

Construction builds the *extended* program: external literals are
rewritten to replacement literals, outer external atoms (those
independent of the component's guess) are evaluated into the facts, and
each inner external atom gains a guessing rule over its positive and
negative replacements. The extended program is ground, annotated,
translated into the ground solver, and the verifier installs itself as
the solver's propagator.

Each [next_model](ModelGenerator::next_model) call drives the solver to
a candidate, re-checks every inner external atom against its oracle
([final_compatibility_check](ModelGenerator::final_compatibility_check)),
decides FLP-minimality ([is_model](ModelGenerator::is_model)), and emits
the candidate projected to the non-auxiliary, non-input atoms. When the
very first call exhausts without a model, inconsistency analysis derives
which input atoms are to blame, for predecessor units to learn from.

# Example

```rust,ignore
let factory = ModelGeneratorFactory::new(config, oracles);
let mut generator = factory.create(registry, input)?;
while let Some(answer) = generator.next_model() {
    println!("{}", answer.text(&generator.registry().borrow()));
}
```
*/

pub mod asynchronous;
pub mod inconsistency;
pub mod learning;
pub mod support;
pub mod verify;

pub use verify::{EatomState, EatomVerifier};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::annotated::AnnotatedProgram;
use crate::config::Config;
use crate::grounder::{self, GroundingOptions};
use crate::misc::log::targets;
use crate::oracle::{OracleQuery, OracleRegistry, QueryCache};
use crate::registry::Registry;
use crate::solver::{GroundSolver, Propagator};
use crate::structures::{
    AnswerSet, Id, Interpretation, Nogood, NogoodTemplate, Program, Rule,
};
use crate::types::err::{ErrorKind, IngestError};

use support::{inline_eatom, tree_entry};

/// The program-IR handed to the core for one component.
#[derive(Clone, Debug)]
pub struct ComponentInput {
    /// Ground facts, including the output of predecessor units.
    pub edb: Interpretation,

    /// The component rules; external literals still in place.
    pub idb: Vec<Id>,

    /// The largest integer the grounder may produce.
    pub maxint: u32,

    /// The external atoms whose input depends on the component's guess.
    /// External atoms not listed are outer, and evaluated up front.
    pub inner_eatoms: Vec<Id>,
}

/// Builds model generators, and accumulates the nogoods successor units
/// learn about this unit's output.
pub struct ModelGeneratorFactory {
    /// The engine configuration.
    pub config: Config,

    oracles: OracleRegistry,
    cache: QueryCache,
    successor_causes: Vec<Nogood>,
    transmitted: Vec<Nogood>,
}

impl ModelGeneratorFactory {
    pub fn new(config: Config, oracles: OracleRegistry) -> Self {
        ModelGeneratorFactory {
            config,
            oracles,
            cache: QueryCache::new(),
            successor_causes: Vec::new(),
            transmitted: Vec::new(),
        }
    }

    /// Record an inconsistency cause published by a successor unit.
    /// Generators built afterwards prune every interpretation containing
    /// the cause.
    pub fn add_inconsistency_cause_from_successor(&mut self, cause: &Nogood) {
        log::info!(
            target: targets::INCONSISTENCY,
            "Learned inconsistency cause of {} literals from a successor",
            cause.len()
        );
        self.successor_causes.push(cause.clone());
    }

    /// Add a nogood transmitted from outside the unit.
    pub fn add_nogood(&mut self, nogood: Nogood) {
        self.transmitted.push(nogood);
    }

    /// Build a generator for `input`.
    pub fn create(
        &self,
        registry: Rc<RefCell<Registry>>,
        input: ComponentInput,
    ) -> Result<ModelGenerator, ErrorKind> {
        self.validate(&registry.borrow(), &input)?;
        registry.borrow_mut().maxint = input.maxint;

        // Stage one: fold outer external atoms into the facts and rewrite
        // external literals to replacement literals.
        let (post_edb, rewritten, guesses) = self.rewrite_externals(&registry, &input)?;

        // Stage two: support sets, and inlining where they are complete.
        let mut active_inner = input.inner_eatoms.clone();
        let mut extended_idb = rewritten;
        let mut support_templates: Vec<(Id, Vec<NogoodTemplate>)> = Vec::new();

        if self.config.support_sets {
            for eatom in input.inner_eatoms.clone() {
                let templates = self.learn_support_sets(&registry, &post_edb, eatom);
                if templates.is_empty() {
                    continue;
                }

                let properties = self
                    .oracles
                    .merged_properties(&registry.borrow(), eatom);
                if self.config.inline_support_sets && properties.complete_positive_support_sets
                {
                    extended_idb = inline_eatom(
                        &mut registry.borrow_mut(),
                        &extended_idb,
                        eatom,
                        &templates,
                    );
                    active_inner.retain(|inner| *inner != eatom);
                    log::info!(target: targets::GENERATOR, "Inlined external atom {eatom}");
                } else {
                    support_templates.push((eatom, templates));
                }
            }
        }

        // Stage three: guessing rules for the remaining inner atoms.
        for (eatom, guess_rule) in guesses {
            if active_inner.contains(&eatom) {
                extended_idb.push(guess_rule);
            }
        }

        // Stage four: ground and annotate.
        let extended = Program::new(post_edb, extended_idb.clone());
        let ground = grounder::ground(
            &mut registry.borrow_mut(),
            &extended,
            &GroundingOptions::default(),
        )?;
        let annotated = Arc::new(AnnotatedProgram::new(
            &registry.borrow(),
            &self.oracles,
            ground,
            &active_inner,
            self.config.monotonicity_edge_filter,
        ));

        // Stage five: the solver, primed with imported nogoods.
        let mut solver = GroundSolver::from_program(
            &annotated,
            &mut registry.borrow_mut(),
            self.config.solver,
        );
        let mut imported = self.transmitted.clone();
        imported.extend(self.successor_causes.iter().cloned());
        for nogood in &imported {
            solver.integrate_nogood(nogood.clone());
        }

        // Stage six: the verifier, installed as propagator.
        let mut verifier = EatomVerifier::new(
            registry.clone(),
            self.oracles.clone(),
            annotated.clone(),
            self.config.clone(),
            self.cache.clone(),
        );

        for (_, templates) in &support_templates {
            for template in templates {
                if let Some((conditions, forced)) = tree_entry(template, |address| {
                    annotated.eatom_of_replacement(address).is_some()
                }) {
                    verifier.tree.insert(conditions, forced);
                }
                if template.is_ground() {
                    solver.add_nogood(crate::nogoods::translate(template));
                }
                verifier.store.add_template(template.clone());
            }
        }

        if self.config.learning.functionality {
            for index in 0..annotated.eatoms.len() {
                for nogood in verifier.functionality_nogoods(index) {
                    solver.add_nogood(nogood);
                }
            }
        }

        let verifier = Rc::new(RefCell::new(verifier));
        solver.attach_propagator(verifier.clone() as Rc<RefCell<dyn Propagator>>);

        let input_mask = input.edb.clone();
        Ok(ModelGenerator {
            config: self.config.clone(),
            registry,
            oracles: self.oracles.clone(),
            cache: self.cache.clone(),
            annotated,
            solver,
            verifier,
            input_mask,
            extended_idb,
            inner_eatoms: active_inner,
            first_call: true,
            inconsistency_cause: None,
            global_optimum: None,
            imported,
            terminate: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Static ingest validation: unknown oracles, arity and input-type
    /// mismatches, raw aggregates.
    fn validate(&self, registry: &Registry, input: &ComponentInput) -> Result<(), ErrorKind> {
        for rule_id in &input.idb {
            if !rule_id.is_rule() {
                return Err(IngestError::NotARule(*rule_id).into());
            }
            let rule = registry.rule(*rule_id);
            for literal in &rule.body {
                let atom = Id::atom_of(*literal);
                if atom.is_aggregate_atom() {
                    return Err(IngestError::RawAggregate(atom).into());
                }
                if atom.is_external_atom() {
                    self.oracles.validate(registry, atom)?;
                }
            }
        }
        for eatom in &input.inner_eatoms {
            self.oracles.validate(registry, *eatom)?;
        }
        Ok(())
    }

    /// Replace external literals by replacement literals; evaluate outer
    /// external atoms into the facts; collect guessing rules for inner
    /// ones.
    #[allow(clippy::type_complexity)]
    fn rewrite_externals(
        &self,
        registry: &Rc<RefCell<Registry>>,
        input: &ComponentInput,
    ) -> Result<(Interpretation, Vec<Id>, Vec<(Id, Id)>), ErrorKind> {
        let mut post_edb = input.edb.clone();
        let mut rewritten = Vec::with_capacity(input.idb.len());
        let mut guesses: Vec<(Id, Id)> = Vec::new();

        for rule_id in &input.idb {
            let rule = registry.borrow().rule(*rule_id).clone();
            let mut body = Vec::with_capacity(rule.body.len());
            let mut changed = false;

            let positive_ordinary: Vec<Id> = rule
                .body
                .iter()
                .copied()
                .filter(|literal| {
                    !literal.is_naf() && Id::atom_of(*literal).is_ordinary_atom()
                })
                .collect();

            for literal in &rule.body {
                let atom = Id::atom_of(*literal);
                if !atom.is_external_atom() {
                    body.push(*literal);
                    continue;
                }
                changed = true;

                let external = registry.borrow().external(atom).clone();
                let mut registry_mut = registry.borrow_mut();
                let r_predicate = registry_mut.aux_symbol('r', atom);

                let mut tuple = vec![r_predicate];
                tuple.extend(external.inputs.iter().copied());
                tuple.extend(external.outputs.iter().copied());
                let replacement = match registry_mut.tuple_is_ground(&tuple) {
                    true => registry_mut.intern_ground_atom(tuple.clone()),
                    false => registry_mut.intern_nonground_atom(tuple.clone()),
                };
                body.push(match literal.is_naf() {
                    true => Id::naf_literal(replacement),
                    false => Id::literal(replacement),
                });

                if input.inner_eatoms.contains(&atom) {
                    let n_predicate = registry_mut.aux_symbol('n', atom);
                    let mut negative_tuple = tuple.clone();
                    negative_tuple[0] = n_predicate;
                    let negative = match registry_mut.tuple_is_ground(&negative_tuple) {
                        true => registry_mut.intern_ground_atom(negative_tuple),
                        false => registry_mut.intern_nonground_atom(negative_tuple),
                    };
                    let guess_rule = registry_mut.intern_rule(Rule::regular(
                        vec![replacement, negative],
                        positive_ordinary.clone(),
                    ));
                    guesses.push((atom, guess_rule));
                } else {
                    // An outer atom: evaluate against the facts.
                    drop(registry_mut);
                    self.evaluate_outer(registry, &mut post_edb, atom, &external)?;
                }
            }

            match changed {
                true => {
                    let mut revised = rule;
                    revised.body = body;
                    rewritten.push(registry.borrow_mut().intern_rule(revised));
                }
                false => rewritten.push(*rule_id),
            }
        }

        Ok((post_edb, rewritten, guesses))
    }

    /// Evaluate an outer external atom under the facts, adding the
    /// replacement atoms of its positive tuples as further facts.
    fn evaluate_outer(
        &self,
        registry: &Rc<RefCell<Registry>>,
        post_edb: &mut Interpretation,
        eatom: Id,
        external: &crate::structures::ExternalAtom,
    ) -> Result<(), ErrorKind> {
        let positive = {
            let registry = registry.borrow();
            let oracle = self
                .oracles
                .get(external.predicate)
                .ok_or(IngestError::UnknownOracle(external.predicate))?;
            let query = OracleQuery {
                eatom,
                input: &external.inputs,
                pattern: &external.outputs,
                interpretation: post_edb,
                assigned: None,
                changed: None,
            };
            oracle
                .retrieve(&registry, &query)
                .map_err(ErrorKind::Oracle)?
                .positive
        };

        let mut registry = registry.borrow_mut();
        let r_predicate = registry.aux_symbol('r', eatom);
        for tuple in positive {
            let mut atom = vec![r_predicate];
            atom.extend(external.inputs.iter().copied());
            atom.extend(tuple);
            let fact = registry.intern_ground_atom(atom);
            post_edb.set(fact.address);
        }
        Ok(())
    }

    /// Ask a willing oracle for its support sets.
    fn learn_support_sets(
        &self,
        registry: &Rc<RefCell<Registry>>,
        edb: &Interpretation,
        eatom: Id,
    ) -> Vec<NogoodTemplate> {
        let external = registry.borrow().external(eatom).clone();
        let properties = self
            .oracles
            .merged_properties(&registry.borrow(), eatom);
        if !properties.provides_support_sets {
            return Vec::new();
        }
        let Some(oracle) = self.oracles.get(external.predicate).cloned() else {
            return Vec::new();
        };

        let query = OracleQuery {
            eatom,
            input: &external.inputs,
            pattern: &external.outputs,
            interpretation: edb,
            assigned: None,
            changed: None,
        };
        let learned = oracle.learn_support_sets(&mut registry.borrow_mut(), &query);
        match learned {
            Ok(templates) => {
                let registry = registry.borrow();
                templates
                    .into_iter()
                    .filter_map(|template| oracle.guard_support_set(&registry, &template))
                    .collect()
            }
            Err(error) => {
                log::warn!(
                    target: targets::LEARNING,
                    "Support-set learning failed: {error:?}"
                );
                Vec::new()
            }
        }
    }
}

/// The guess-and-check loop for one component.
pub struct ModelGenerator {
    pub(crate) config: Config,
    pub(crate) registry: Rc<RefCell<Registry>>,
    pub(crate) oracles: OracleRegistry,
    pub(crate) cache: QueryCache,
    pub(crate) annotated: Arc<AnnotatedProgram>,
    pub(crate) solver: GroundSolver,
    pub(crate) verifier: Rc<RefCell<EatomVerifier>>,

    /// Input facts, projected away from emitted answer sets.
    pub(crate) input_mask: Interpretation,

    /// The extended nonground program, kept for inconsistency analysis.
    pub(crate) extended_idb: Vec<Id>,

    pub(crate) inner_eatoms: Vec<Id>,
    pub(crate) imported: Vec<Nogood>,

    first_call: bool,
    inconsistency_cause: Option<Nogood>,
    global_optimum: Option<Vec<u64>>,

    terminate: Arc<AtomicBool>,
}

impl ModelGenerator {
    /// The registry handle shared with the caller.
    pub fn registry(&self) -> Rc<RefCell<Registry>> {
        self.registry.clone()
    }

    /// The flag cancelling the solve; safe to set from a signal handler.
    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        self.terminate.clone()
    }

    /// Future models must be strictly better than `weights`.
    pub fn set_global_optimum(&mut self, weights: Vec<u64>) {
        self.global_optimum = Some(weights);
    }

    /// The inconsistency cause identified on an exhausted first call, for
    /// the predecessor unit to learn from.
    pub fn inconsistency_cause(&self) -> Option<&Nogood> {
        self.inconsistency_cause.as_ref()
    }

    /// Dump every nogood learned so far, one per line in the canonical
    /// form `{±p(a,b),…}`. A debugging aid; nothing is persisted
    /// otherwise.
    pub fn dump_learned_nogoods<W: std::io::Write>(
        &self,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let verifier = self.verifier.borrow();
        verifier.store.dump(&self.registry.borrow(), writer)
    }

    /// Drive search to the next answer set.
    pub fn next_model(&mut self) -> Option<AnswerSet> {
        loop {
            if self.terminate.load(Ordering::Relaxed) {
                log::info!(target: targets::GENERATOR, "Termination requested");
                return None;
            }

            if let Some(optimum) = &self.global_optimum {
                self.solver.set_optimum(optimum.clone());
            }

            let Some(candidate) = self.solver.next_model() else {
                if self.first_call && self.config.transitive_unit_learning {
                    self.inconsistency_cause = self.identify_inconsistency_cause();
                }
                return None;
            };

            if !self.final_compatibility_check(&candidate) {
                log::debug!(target: targets::GENERATOR, "Candidate failed compatibility");
                continue;
            }

            if !self.is_model(&candidate) {
                log::debug!(target: targets::GENERATOR, "Candidate failed minimality");
                continue;
            }

            self.first_call = false;
            let weights = self.solver.current_costs();
            return Some(AnswerSet::with_weights(self.project(&candidate), weights));
        }
    }

    /// Walk every inner external atom: verified passes, falsified
    /// rejects, anything else is verified now.
    pub(crate) fn final_compatibility_check(&mut self, candidate: &Interpretation) -> bool {
        let mut learned: Vec<Nogood> = Vec::new();
        let mut compatible = true;

        {
            let mut verifier = self.verifier.borrow_mut();
            for index in 0..self.annotated.eatoms.len() {
                let state = verifier.state(index);
                if state.evaluated && state.verified {
                    continue;
                }
                if state.evaluated && state.falsified {
                    compatible = false;
                    break;
                }
                if !verifier.verify_on_total(index, candidate, &mut learned) {
                    compatible = false;
                    break;
                }
            }
        }

        for nogood in learned {
            self.solver.integrate_nogood(nogood);
        }
        compatible
    }

    /// FLP-minimality of a compatible set: trivial for components without
    /// external cycles under the decision criterion, otherwise decided by
    /// the unfounded-set checker.
    pub(crate) fn is_model(&mut self, candidate: &Interpretation) -> bool {
        if self.annotated.minimality_is_trivial() && self.config.flp_decision_criterion {
            return true;
        }

        let nogood = self.verifier.borrow_mut().full_ufs_check(candidate);
        match nogood {
            Some(nogood) => {
                self.solver.integrate_nogood(nogood);
                false
            }
            None => true,
        }
    }

    /// Project a candidate to the non-auxiliary, non-input atoms.
    fn project(&self, candidate: &Interpretation) -> Interpretation {
        let registry = self.registry.borrow();
        let mut projected = candidate.clone();
        for atom in candidate.iter_true() {
            if registry.is_aux_atom(atom) {
                projected.clear(atom);
            }
        }
        projected.subtract(&self.input_mask);
        projected
    }
}
