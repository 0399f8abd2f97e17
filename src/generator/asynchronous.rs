/*!
The asynchronous model generator.

An ordinary-model producer and a model verifier run in two threads,
connected by a bounded queue of (candidate, verification-state snapshot)
pairs: the producer blocks when the queue is full, the verifier when it
is empty. The producer is the main solver with a sink propagator which
drains nogoods the verifier learned --- appended under a mutex, consumed
on the producer's next propagation tick. The verifier works against a
frozen clone of the registry, so oracles must be thread-safe or
externally serialised. A shared terminate flag drains both sides on
completion.

Verification here is purely post-hoc: candidates are compatible sets of
the guessing program, checked against the oracles and the unfounded-set
checker only once complete.
*/

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::annotated::AnnotatedProgram;
use crate::config::Config;
use crate::misc::log::targets;
use crate::oracle::cache::QueryKey;
use crate::oracle::{OracleQuery, OracleRegistry, QueryCache};
use crate::registry::Registry;
use crate::solver::{PropagationView, Propagator};
use crate::structures::{AnswerSet, AtomAddress, Id, Interpretation, Lit, Nogood};
use crate::ufs::{ReductOracle, UfsCheckerManager};

use super::verify::EatomState;
use super::ModelGenerator;

/// A propagator which only relays nogoods learned elsewhere.
struct NogoodSink {
    shared: Arc<Mutex<Vec<Nogood>>>,
}

impl Propagator for NogoodSink {
    fn propagate(&mut self, _view: &PropagationView) -> Vec<Nogood> {
        let mut shared = self.shared.lock().expect("! Sink mutex poisoned");
        shared.drain(..).collect()
    }
}

impl ModelGenerator {
    /// Enumerate answer sets with producer and verifier in separate
    /// threads. Stops after `limit` answers when given.
    pub fn solve_async(&mut self, limit: Option<usize>) -> Vec<AnswerSet> {
        let snapshot: Registry = self.registry.borrow().clone();
        let annotated = self.annotated.clone();
        let oracles = self.oracles.clone();
        let cache = self.cache.clone();
        let config = self.config.clone();
        let input_mask = self.input_mask.clone();
        let terminate: Arc<AtomicBool> = self.terminate.clone();

        let learned: Arc<Mutex<Vec<Nogood>>> = Arc::default();
        let results: Arc<Mutex<Vec<AnswerSet>>> = Arc::default();

        // Swap the inline verifier for the nogood sink.
        let inline_verifier = self.verifier.clone();
        self.solver.detach_propagator();
        self.solver.attach_propagator(Rc::new(RefCell::new(NogoodSink {
            shared: learned.clone(),
        })));

        let (sender, receiver) = crossbeam::channel::bounded::<(
            Interpretation,
            Vec<EatomState>,
        )>(config.async_queue_capacity.max(1));

        crossbeam::scope(|scope| {
            let worker_results = results.clone();
            let worker_learned = learned.clone();
            let worker_terminate = terminate.clone();
            let worker_config = config.clone();

            scope.spawn(move |_| {
                let mut worker = AsyncVerifier {
                    ufs: UfsCheckerManager::new(&worker_config, &annotated),
                    registry: snapshot,
                    annotated,
                    oracles,
                    cache,
                    config: worker_config,
                    input_mask,
                };

                for (candidate, _states) in receiver.iter() {
                    if worker_terminate.load(Ordering::Relaxed) {
                        break;
                    }
                    let mut fresh: Vec<Nogood> = Vec::new();
                    if let Some(answer) = worker.process(&candidate, &mut fresh) {
                        worker_results
                            .lock()
                            .expect("! Results mutex poisoned")
                            .push(answer);
                    }
                    if !fresh.is_empty() {
                        worker_learned
                            .lock()
                            .expect("! Sink mutex poisoned")
                            .append(&mut fresh);
                    }
                }
            });

            // The producer: ordinary models of the guessing program.
            loop {
                if terminate.load(Ordering::Relaxed) {
                    break;
                }
                if let Some(limit) = limit {
                    let produced = results.lock().expect("! Results mutex poisoned").len();
                    if produced >= limit {
                        break;
                    }
                }

                match self.solver.next_model() {
                    Some(candidate) => {
                        if sender.send((candidate, Vec::new())).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            drop(sender);
        })
        .expect("! Verifier thread panicked");

        // Restore the inline verifier and fold late learning back in.
        self.solver.detach_propagator();
        self.solver.attach_propagator(inline_verifier);
        for nogood in learned.lock().expect("! Sink mutex poisoned").drain(..) {
            self.solver.integrate_nogood(nogood);
        }

        let mut answers = std::mem::take(
            &mut *results.lock().expect("! Results mutex poisoned"),
        );
        if let Some(limit) = limit {
            answers.truncate(limit);
        }
        log::info!(
            target: targets::GENERATOR,
            "Asynchronous solve produced {} answer sets",
            answers.len()
        );
        answers
    }
}

/// The verifier-side worker: compatibility and minimality against a
/// frozen registry clone.
struct AsyncVerifier {
    registry: Registry,
    annotated: Arc<AnnotatedProgram>,
    oracles: OracleRegistry,
    cache: QueryCache,
    config: Config,
    input_mask: Interpretation,
    ufs: UfsCheckerManager,
}

impl AsyncVerifier {
    fn process(
        &mut self,
        candidate: &Interpretation,
        learned: &mut Vec<Nogood>,
    ) -> Option<AnswerSet> {
        // Compatibility of every inner external atom.
        for index in 0..self.annotated.eatoms.len() {
            if !self.compatible(index, candidate, learned) {
                return None;
            }
        }

        // Minimality.
        if !(self.annotated.minimality_is_trivial() && self.config.flp_decision_criterion) {
            let mut eval = SnapshotEval {
                registry: &self.registry,
                annotated: &self.annotated,
                oracles: &self.oracles,
                cache: &self.cache,
            };
            if let Some(unfounded) = self.ufs.find_unfounded_set(
                &self.registry,
                &self.annotated,
                candidate,
                &Default::default(),
                &mut eval,
            ) {
                learned.push(self.ufs.ufs_nogood(
                    &self.registry,
                    &self.annotated,
                    candidate,
                    &unfounded,
                ));
                return None;
            }
        }

        Some(self.answer(candidate))
    }

    /// Check the guess over one external atom, learning the behavioural
    /// nogoods either way.
    fn compatible(
        &self,
        index: usize,
        candidate: &Interpretation,
        learned: &mut Vec<Nogood>,
    ) -> bool {
        let eval = SnapshotEval {
            registry: &self.registry,
            annotated: &self.annotated,
            oracles: &self.oracles,
            cache: &self.cache,
        };
        let positive = eval.positive_tuples(index, candidate);

        let annotation = &self.annotated.eatoms[index];
        let external = self.registry.external(annotation.eatom);
        let mut mask = annotation.input_mask.clone();
        mask.union_with(&annotation.aux_input_mask);

        let mut compatible = true;
        for replacement in &annotation.positive_replacements {
            let tuple = &self.registry.ground_atom(*replacement).tuple;
            let output = tuple[1 + external.inputs.len()..].to_vec();
            let actual = positive.contains(&output);

            learned.push(Nogood::new(
                mask.iter_true()
                    .map(|atom| Lit::new(atom, candidate.test(atom)))
                    .chain([Lit::new(*replacement, !actual)]),
            ));

            if candidate.test(*replacement) != actual {
                compatible = false;
            }
        }
        compatible
    }

    fn answer(&self, candidate: &Interpretation) -> AnswerSet {
        let mut projected = candidate.clone();
        for atom in candidate.iter_true() {
            if self.registry.is_aux_atom(atom) {
                projected.clear(atom);
            }
        }
        projected.subtract(&self.input_mask);

        // Weak-constraint costs, read off the annotated program.
        let mut weights: Vec<u64> = Vec::new();
        for rule_id in &self.annotated.program.idb {
            let rule = self.registry.rule(*rule_id);
            let Some(annotation) = &rule.weak else {
                continue;
            };
            let violated = rule.body.iter().all(|literal| {
                let atom = Id::atom_of(*literal);
                candidate.test(atom.address) != literal.is_naf()
            });
            if violated {
                let level = annotation.level as usize;
                if weights.len() <= level {
                    weights.resize(level + 1, 0);
                }
                weights[level] += annotation.weight;
            }
        }

        AnswerSet::with_weights(projected, weights)
    }
}

/// Oracle evaluation against the frozen registry clone.
struct SnapshotEval<'s> {
    registry: &'s Registry,
    annotated: &'s AnnotatedProgram,
    oracles: &'s OracleRegistry,
    cache: &'s QueryCache,
}

impl SnapshotEval<'_> {
    fn positive_tuples(&self, index: usize, interpretation: &Interpretation) -> Vec<Vec<Id>> {
        let annotation = &self.annotated.eatoms[index];
        let external = self.registry.external(annotation.eatom).clone();

        let mut mask = annotation.input_mask.clone();
        mask.union_with(&annotation.aux_input_mask);
        let projection = interpretation.masked(&mask);

        let key = QueryKey {
            input: external.inputs.clone(),
            pattern: external.outputs.clone(),
            interpretation: projection.clone(),
            assigned: None,
            mask_size: mask.count(),
        };
        if let Some(answer) = self.cache.get(&key) {
            return answer.positive.clone();
        }

        let Some(oracle) = self.oracles.get(external.predicate) else {
            return Vec::new();
        };
        let query = OracleQuery {
            eatom: annotation.eatom,
            input: &external.inputs,
            pattern: &external.outputs,
            interpretation: &projection,
            assigned: None,
            changed: None,
        };
        match oracle.retrieve(self.registry, &query) {
            Ok(answer) => {
                let positive = answer.positive.clone();
                self.cache.insert(key, Arc::new(answer));
                positive
            }
            Err(error) => {
                if cfg!(feature = "strict_oracle") {
                    panic!("! Oracle protocol failure: {error:?}");
                }
                log::warn!(target: targets::VERIFICATION, "Oracle failure: {error:?}");
                Vec::new()
            }
        }
    }
}

impl ReductOracle for SnapshotEval<'_> {
    fn replacement_value(
        &mut self,
        eatom_index: usize,
        replacement: AtomAddress,
        reduct: &Interpretation,
    ) -> bool {
        let positive = self.positive_tuples(eatom_index, reduct);
        let external = self
            .registry
            .external(self.annotated.eatoms[eatom_index].eatom);
        let tuple = &self.registry.ground_atom(replacement).tuple;
        let output = tuple[1 + external.inputs.len()..].to_vec();
        positive.contains(&output)
    }
}
