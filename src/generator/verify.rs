/*!
External-atom verification.

The [EatomVerifier] is the propagator the model generator installs on
its ground solver. After each propagation fixpoint it:

1. *Unverifies* any external atom one of whose scope atoms changed ---
   the guess it was checked against is gone.
2. Consults the evaluation heuristics, high-frequency first, and
   evaluates external atoms through their oracles, accumulating learned
   nogoods. An atom whose scope has become fully assigned is evaluated
   regardless of its heuristic.
3. Confirms guesses through complete support sets where available,
   without an oracle call.
4. Updates the skip-program bookkeeping and, when the unfounded-set
   heuristic fires, runs a partial check on the remainder.
5. Instantiates learned templates against the live assignment.

Every nogood handed to the solver is also recorded in the verifier's
store, which inconsistency analysis later replays into its own solver.
*/

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use crate::annotated::AnnotatedProgram;
use crate::config::Config;
use crate::heuristics::{EvalFrequency, EvalHeuristic, SkipTracker, UfsHeuristic};
use crate::misc::log::targets;
use crate::nogoods::{translate, NogoodGrounder, NogoodStore};
use crate::oracle::cache::QueryKey;
use crate::oracle::{OracleAnswer, OracleQuery, OracleRegistry, QueryCache};
use crate::registry::Registry;
use crate::solver::{PropagationView, Propagator};
use crate::structures::{
    AtomAddress, ExtProperties, Id, Interpretation, Lit, Nogood,
};
use crate::ufs::{ReductOracle, UfsCheckerManager};

use super::support::VerificationTree;

/// Verification state of one inner external atom.
#[derive(Debug, Default, Clone)]
pub struct EatomState {
    /// The oracle has been evaluated against the full scope.
    pub evaluated: bool,

    /// The guessed replacements agree with the oracle.
    pub verified: bool,

    /// The guessed replacements disagree with the oracle.
    pub falsified: bool,

    /// Scope atoms changed since the last query, for oracles which care.
    pub changed: Interpretation,
}

/// The model generator's propagator.
pub struct EatomVerifier {
    pub(crate) registry: Rc<RefCell<Registry>>,
    pub(crate) oracles: OracleRegistry,
    pub(crate) annotated: Arc<AnnotatedProgram>,
    pub(crate) config: Config,
    pub(crate) cache: QueryCache,

    pub(crate) properties: Vec<ExtProperties>,
    pub(crate) heuristics: Vec<EvalHeuristic>,
    pub(crate) states: Vec<EatomState>,

    /// The single watched scope atom per low-frequency external atom.
    watch_of: Vec<Option<AtomAddress>>,

    pub(crate) store: NogoodStore,
    pub(crate) grounder: NogoodGrounder,
    pub(crate) tree: VerificationTree,

    pub(crate) ufs: UfsCheckerManager,
    ufs_heuristic: UfsHeuristic,
    skip_tracker: SkipTracker,
}

impl EatomVerifier {
    pub(crate) fn new(
        registry: Rc<RefCell<Registry>>,
        oracles: OracleRegistry,
        annotated: Arc<AnnotatedProgram>,
        config: Config,
        cache: QueryCache,
    ) -> Self {
        let (properties, skip_tracker) = {
            let registry = registry.borrow();
            let properties: Vec<ExtProperties> = annotated
                .eatoms
                .iter()
                .map(|annotation| oracles.merged_properties(&registry, annotation.eatom))
                .collect();
            let tracker = SkipTracker::new(&registry, &annotated.program.idb);
            (properties, tracker)
        };

        let heuristics: Vec<EvalHeuristic> = annotated
            .eatoms
            .iter()
            .map(|_| EvalHeuristic::new(config.eval_heuristic))
            .collect();

        let watch_of: Vec<Option<AtomAddress>> = annotated
            .eatoms
            .iter()
            .map(|annotation| annotation.scope_mask.iter_true().next())
            .collect();

        let states = vec![EatomState::default(); annotated.eatoms.len()];
        let ufs = UfsCheckerManager::new(&config, &annotated);

        EatomVerifier {
            registry,
            oracles,
            annotated,
            cache,
            properties,
            heuristics,
            states,
            watch_of,
            store: NogoodStore::new(config.nogood_budget),
            grounder: NogoodGrounder::new(),
            tree: VerificationTree::default(),
            ufs,
            ufs_heuristic: UfsHeuristic::new(config.ufs_heuristic),
            skip_tracker,
            config,
        }
    }

    /// The verification state of the external atom at `index`.
    pub fn state(&self, index: usize) -> &EatomState {
        &self.states[index]
    }

    /// Forget all verification state, e.g. between enumerated models.
    pub fn reset_states(&mut self) {
        for state in &mut self.states {
            state.evaluated = false;
            state.verified = false;
            state.falsified = false;
        }
        self.ufs_heuristic.reset();
    }

    /// Evaluate the external atom at `index` against a *total*
    /// interpretation, updating its state. Nogoods learned on the way are
    /// appended to `out`.
    pub fn verify_on_total(
        &mut self,
        index: usize,
        interpretation: &Interpretation,
        out: &mut Vec<Nogood>,
    ) -> bool {
        self.evaluate_eatom(index, interpretation, None, out);
        self.states[index].verified
    }

    fn scope_of(&self, index: usize) -> &Interpretation {
        &self.annotated.eatoms[index].scope_mask
    }

    /// The input projection mask of the external atom at `index`.
    fn input_mask_of(&self, index: usize) -> Interpretation {
        let annotation = &self.annotated.eatoms[index];
        let mut mask = annotation.input_mask.clone();
        mask.union_with(&annotation.aux_input_mask);
        mask
    }

    fn unverify(&mut self, index: usize, assigned: &Interpretation) {
        let state = &mut self.states[index];
        if state.evaluated || state.verified || state.falsified {
            log::trace!(target: targets::VERIFICATION, "External atom {index} unverified");
        }
        state.evaluated = false;
        state.verified = false;
        state.falsified = false;

        // Move the verify watch to a scope atom still unassigned.
        let unassigned = self
            .annotated.eatoms[index]
            .scope_mask
            .iter_true()
            .find(|atom| !assigned.test(*atom));
        if let Some(atom) = unassigned {
            self.watch_of[index] = Some(atom);
        }
    }

    /// Evaluate `index` under a (possibly partial) interpretation.
    ///
    /// With `assigned` absent the interpretation is read as total.
    pub(crate) fn evaluate_eatom(
        &mut self,
        index: usize,
        partial: &Interpretation,
        assigned: Option<&Interpretation>,
        out: &mut Vec<Nogood>,
    ) {
        let mask = self.input_mask_of(index);
        let projection = partial.masked(&mask);
        let assigned_projection = assigned.map(|view| view.masked(&mask));

        let external = {
            let registry = self.registry.borrow();
            registry.external(self.annotated.eatoms[index].eatom).clone()
        };

        let answer = self.retrieve_split(index, &external, &mask, &projection, assigned_projection.as_ref());

        for template in &answer.nogoods {
            if template.is_ground() {
                let nogood = translate(template);
                self.store.add_ground(nogood.clone());
                out.push(nogood);
            } else {
                self.store.add_template(template.clone());
            }
        }

        let inputs_assigned = assigned.map_or(true, |view| mask.is_subset_of(view));
        if self.config.learning.io_behaviour && inputs_assigned {
            self.learn_io_behaviour(index, &external, &projection, &mask, &answer.positive, out);
        }

        let scope_assigned = assigned.map_or(true, |view| {
            self.scope_of(index).is_subset_of(view)
        });
        if scope_assigned {
            if !answer.unknown.is_empty() {
                log::warn!(
                    target: targets::VERIFICATION,
                    "Oracle returned unknown tuples for a fully assigned scope"
                );
            }

            let matches = {
                let registry = self.registry.borrow();
                self.annotated.eatoms[index]
                    .positive_replacements
                    .iter()
                    .all(|replacement| {
                        let tuple = &registry.ground_atom(*replacement).tuple;
                        let output = tuple[1 + external.inputs.len()..].to_vec();
                        let actual = answer.positive.contains(&output);
                        partial.test(*replacement) == actual
                    })
            };

            let state = &mut self.states[index];
            state.evaluated = true;
            state.verified = matches;
            state.falsified = !matches;
            log::debug!(
                target: targets::VERIFICATION,
                "External atom {index} evaluated: verified {matches}"
            );
        }

        self.states[index].changed.clear_all();
    }

    /// Answer a query, splitting by declared linearity and consulting the
    /// shared cache per split.
    fn retrieve_split(
        &mut self,
        index: usize,
        external: &crate::structures::ExternalAtom,
        mask: &Interpretation,
        projection: &Interpretation,
        assigned_projection: Option<&Interpretation>,
    ) -> OracleAnswer {
        let properties = &self.properties[index];

        let splits: Vec<Interpretation> = if self.config.learning.linearity
            && properties.atom_level_linear
        {
            let singletons: Vec<Interpretation> = projection
                .iter_true()
                .map(|atom| [atom].into_iter().collect())
                .collect();
            match singletons.is_empty() {
                true => vec![Interpretation::new()],
                false => singletons,
            }
        } else if self.config.learning.linearity && properties.tuple_level_linear {
            let registry = self.registry.borrow();
            let mut groups: std::collections::HashMap<Vec<Id>, Interpretation> =
                std::collections::HashMap::new();
            for atom in projection.iter_true() {
                let arguments = registry.ground_atom(atom).arguments().to_vec();
                groups.entry(arguments).or_default().set(atom);
            }
            match groups.is_empty() {
                true => vec![Interpretation::new()],
                false => groups.into_values().collect(),
            }
        } else {
            vec![projection.clone()]
        };

        let mut combined = OracleAnswer::default();
        for split in splits {
            let key = QueryKey {
                input: external.inputs.clone(),
                pattern: external.outputs.clone(),
                interpretation: split.clone(),
                assigned: assigned_projection.cloned(),
                mask_size: mask.count(),
            };

            let answer = match self.cache.get(&key) {
                Some(answer) => answer,
                None => {
                    let registry = self.registry.borrow();
                    let changed = &self.states[index].changed;
                    let query = OracleQuery {
                        eatom: self.annotated.eatoms[index].eatom,
                        input: &external.inputs,
                        pattern: &external.outputs,
                        interpretation: &split,
                        assigned: assigned_projection,
                        changed: match self.properties[index].cares_about_changed {
                            true => Some(changed),
                            false => None,
                        },
                    };
                    let oracle = self
                        .oracles
                        .get(external.predicate)
                        .expect("! Oracle validated at ingest");
                    match oracle.retrieve(&registry, &query) {
                        Ok(answer) => {
                            let answer = Arc::new(answer);
                            self.cache.insert(key, answer.clone());
                            answer
                        }
                        Err(error) => {
                            if cfg!(feature = "strict_oracle") {
                                panic!("! Oracle protocol failure: {error:?}");
                            }
                            log::warn!(
                                target: targets::VERIFICATION,
                                "Oracle failure: {error:?}"
                            );
                            Arc::new(OracleAnswer::default())
                        }
                    }
                }
            };

            combined.positive.extend(answer.positive.iter().cloned());
            combined.unknown.extend(answer.unknown.iter().cloned());
            combined.nogoods.extend(answer.nogoods.iter().cloned());
        }
        combined.positive.sort();
        combined.positive.dedup();
        combined.unknown.sort();
        combined.unknown.dedup();
        combined
    }

    /// Confirm the guess over `index` through complete positive support
    /// sets, if possible.
    fn verify_by_support_sets(&mut self, index: usize, partial: &Interpretation) {
        if self.tree.is_empty() || !self.properties[index].complete_positive_support_sets {
            return;
        }

        let verified = self.tree.verified_replacements(partial);
        let matches = self.annotated.eatoms[index]
            .positive_replacements
            .iter()
            .all(|replacement| {
                let confirmed = verified.contains(&Lit::positive(*replacement));
                partial.test(*replacement) == confirmed
            });

        let state = &mut self.states[index];
        state.evaluated = true;
        state.verified = matches;
        state.falsified = !matches;
        log::debug!(
            target: targets::VERIFICATION,
            "External atom {index} checked by support sets: verified {matches}"
        );
    }

    /// A full unfounded-set check on a total candidate.
    ///
    /// Returns the nogood of a found set, already suitable for the main
    /// solver; none means the candidate is minimal.
    pub(crate) fn full_ufs_check(&mut self, candidate: &Interpretation) -> Option<Nogood> {
        let mut eval = OracleEval {
            registry: &self.registry,
            oracles: &self.oracles,
            annotated: &self.annotated,
            cache: &self.cache,
        };

        let unfounded = self.ufs.find_unfounded_set(
            &self.registry.borrow(),
            &self.annotated,
            candidate,
            &HashSet::new(),
            &mut eval,
        )?;

        Some(self.ufs.ufs_nogood(
            &self.registry.borrow(),
            &self.annotated,
            candidate,
            &unfounded,
        ))
    }

    /// A partial unfounded-set check on the candidate so far, skipping
    /// the rules with unassigned or unverified atoms.
    fn partial_ufs_check(&mut self, view: &PropagationView, out: &mut Vec<Nogood>) {
        let skip: HashSet<Id> = self.skip_tracker.skip_program().into_iter().collect();

        let mut eval = OracleEval {
            registry: &self.registry,
            oracles: &self.oracles,
            annotated: &self.annotated,
            cache: &self.cache,
        };

        if let Some(unfounded) = self.ufs.find_unfounded_set(
            &self.registry.borrow(),
            &self.annotated,
            view.partial,
            &skip,
            &mut eval,
        ) {
            let nogood = self.ufs.ufs_nogood(
                &self.registry.borrow(),
                &self.annotated,
                view.partial,
                &unfounded,
            );
            log::info!(
                target: targets::UFS,
                "Partial check found an unfounded set of {} atoms",
                unfounded.len()
            );
            out.push(nogood);
        }
    }
}

impl Propagator for EatomVerifier {
    fn propagate(&mut self, view: &PropagationView) -> Vec<Nogood> {
        let mut out: Vec<Nogood> = Vec::new();

        // Unverification, and per-atom change accumulation.
        for index in 0..self.states.len() {
            let scope_changed = view.changed.intersects(self.scope_of(index));
            if scope_changed {
                if self.states[index].evaluated {
                    self.unverify(index, view.assigned);
                }
                if self.properties[index].cares_about_changed {
                    let mut touched = view.changed.clone();
                    touched.intersect_with(self.scope_of(index));
                    self.states[index].changed.union_with(&touched);
                }
            }
        }

        // Evaluation, high-frequency heuristics first.
        for pass in [EvalFrequency::High, EvalFrequency::Low] {
            for index in 0..self.states.len() {
                if self.heuristics[index].frequency() != pass || self.states[index].evaluated {
                    continue;
                }

                let triggered = match pass {
                    EvalFrequency::High => view.changed.intersects(self.scope_of(index)),
                    EvalFrequency::Low => self.watch_of[index]
                        .map(|watch| view.assigned.test(watch))
                        .unwrap_or(true),
                };
                if !triggered {
                    continue;
                }

                let wanted = {
                    let scope = self.scope_of(index).clone();
                    self.heuristics[index].should_evaluate(&scope, view.assigned)
                };
                if wanted {
                    self.evaluate_eatom(index, view.partial, Some(view.assigned), &mut out);
                }

                if !self.states[index].evaluated {
                    // Reselect a watch among unassigned scope atoms; a
                    // fully assigned scope forces evaluation.
                    let unassigned = self
                        .scope_of(index)
                        .iter_true()
                        .find(|atom| !view.assigned.test(*atom));
                    match unassigned {
                        Some(atom) => self.watch_of[index] = Some(atom),
                        None => {
                            self.verify_by_support_sets(index, view.partial);
                            if !self.states[index].evaluated {
                                self.evaluate_eatom(
                                    index,
                                    view.partial,
                                    Some(view.assigned),
                                    &mut out,
                                );
                            }
                        }
                    }
                }
            }
        }

        // Skip-program bookkeeping and the partial unfounded-set check.
        if !self.annotated.minimality_is_trivial() {
            let scopes: Vec<Interpretation> = (0..self.states.len())
                .map(|index| self.scope_of(index).clone())
                .collect();
            let verified: Vec<bool> =
                self.states.iter().map(|state| state.verified).collect();
            let assigned = view.assigned.clone();
            self.skip_tracker.update(view.changed, move |atom| {
                if !assigned.test(atom) {
                    return false;
                }
                scopes
                    .iter()
                    .enumerate()
                    .all(|(index, scope)| !scope.test(atom) || verified[index])
            });

            if self.ufs_heuristic.should_check(&self.skip_tracker) {
                self.partial_ufs_check(view, &mut out);
            }
        }

        // Instantiate learned templates against the live assignment.
        {
            let registry = self.registry.borrow();
            let fresh =
                self.grounder
                    .instantiate(&registry, &self.store, &self.annotated.program_mask);
            out.extend(fresh);
        }

        for nogood in &out {
            self.store.add_ground(nogood.clone());
        }

        out
    }
}

/// Oracle evaluation against arbitrary (reduct) interpretations, shared
/// between the verifier and the unfounded-set checkers.
pub(crate) struct OracleEval<'e> {
    pub registry: &'e Rc<RefCell<Registry>>,
    pub oracles: &'e OracleRegistry,
    pub annotated: &'e AnnotatedProgram,
    pub cache: &'e QueryCache,
}

impl OracleEval<'_> {
    /// The positive output tuples of the external atom at `index` under
    /// a total `interpretation`.
    pub fn positive_tuples(&self, index: usize, interpretation: &Interpretation) -> Vec<Vec<Id>> {
        let annotation = &self.annotated.eatoms[index];
        let registry = self.registry.borrow();
        let external = registry.external(annotation.eatom).clone();

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
        match oracle.retrieve(&registry, &query) {
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

impl ReductOracle for OracleEval<'_> {
    fn replacement_value(
        &mut self,
        eatom_index: usize,
        replacement: AtomAddress,
        reduct: &Interpretation,
    ) -> bool {
        let positive = self.positive_tuples(eatom_index, reduct);

        let registry = self.registry.borrow();
        let external = registry.external(self.annotated.eatoms[eatom_index].eatom);
        let tuple = &registry.ground_atom(replacement).tuple;
        let output = tuple[1 + external.inputs.len()..].to_vec();
        positive.contains(&output)
    }
}
