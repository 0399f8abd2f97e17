/*!
Unfounded-set checking.

Given a candidate interpretation `I`, a set of rules to skip, and the
verified external replacements, find a nonempty unfounded set
`U ⊆ atoms(I)` with respect to a component, or prove none exists. A set
`U` is unfounded when every rule with a head in `U` either has a false
body in `I`, or a true head outside `U`, or positive support inside `U`.

Both checkers --- [encoding-based](encoding) (a fresh encoding per
candidate) and [assumption-based](assumption) (one static encoding per
component, re-solved under per-candidate assumptions) --- search with an
inner [GroundSolver](crate::solver::GroundSolver) over an optimistic
encoding: a rule whose body reads an external replacement is assumed
unable to found the set whenever some input atom of the replacement's
oracle joins `U`, since the oracle may then answer differently in the
reduct. Each candidate set the search produces is therefore
*post-verified*: the oracles are re-evaluated under `I ∖ U` through a
[ReductOracle], and sets with a surviving founding rule are excluded and
the search resumed.

The [UfsCheckerManager] walks the components, applying the decision
criterion: a component with neither head cycle nor external cycle is
skipped --- unless disjunction was compiled via choice semantics, which
forfeits the criterion.
*/

pub mod assumption;
pub mod encoding;

pub use assumption::AssumptionUfsChecker;
pub use encoding::EncodingUfsChecker;

use std::collections::HashSet;

use crate::annotated::AnnotatedProgram;
use crate::config::{Config, UfsNogoodKind, UfsVariant};
use crate::misc::log::targets;
use crate::registry::Registry;
use crate::structures::{AtomAddress, Id, Interpretation, Lit, Nogood};

/// Re-evaluates a replacement atom under a reduct interpretation.
///
/// Implemented by the model generator, which owns the oracles and their
/// cache.
pub trait ReductOracle {
    /// The truth of `replacement` (a replacement atom of the external
    /// atom at `eatom_index`) when its oracle is evaluated under
    /// `reduct`.
    fn replacement_value(
        &mut self,
        eatom_index: usize,
        replacement: AtomAddress,
        reduct: &Interpretation,
    ) -> bool;
}

/// A rule, decomposed for the checkers.
#[derive(Clone, Debug)]
pub(crate) struct RuleParts {
    pub rule: Id,

    /// Head atom addresses.
    pub heads: Vec<AtomAddress>,

    /// Positive ordinary body atoms (replacements excluded).
    pub positive_ordinary: Vec<AtomAddress>,

    /// Default-negated body atoms (replacements excluded).
    pub naf_ordinary: Vec<AtomAddress>,

    /// Replacement body literals: (replacement atom, required polarity,
    /// external-atom index).
    pub replacements: Vec<(AtomAddress, bool, usize)>,

    /// Input atoms of the external atoms read by the body.
    pub inputs: Vec<AtomAddress>,
}

pub(crate) fn rule_parts(
    registry: &Registry,
    annotated: &AnnotatedProgram,
    rule_id: Id,
) -> RuleParts {
    let rule = registry.rule(rule_id);

    let mut parts = RuleParts {
        rule: rule_id,
        heads: rule.head.iter().map(|head| head.address).collect(),
        positive_ordinary: Vec::new(),
        naf_ordinary: Vec::new(),
        replacements: Vec::new(),
        inputs: Vec::new(),
    };

    for literal in &rule.body {
        let atom = Id::atom_of(*literal);
        match annotated.eatom_of_replacement(atom.address) {
            Some((eatom_index, _)) => {
                parts
                    .replacements
                    .push((atom.address, !literal.is_naf(), eatom_index));

                let annotation = &annotated.eatoms[eatom_index];
                let mut inputs = annotation.input_mask.clone();
                inputs.union_with(&annotation.aux_input_mask);
                parts.inputs.extend(inputs.iter_true());
            }

            None => match literal.is_naf() {
                false => parts.positive_ordinary.push(atom.address),
                true => parts.naf_ordinary.push(atom.address),
            },
        }
    }

    parts.inputs.sort();
    parts.inputs.dedup();
    parts
}

/// Classical truth of the rule body in `candidate`.
pub(crate) fn body_true(parts: &RuleParts, candidate: &Interpretation) -> bool {
    parts
        .positive_ordinary
        .iter()
        .all(|atom| candidate.test(*atom))
        && parts.naf_ordinary.iter().all(|atom| !candidate.test(*atom))
        && parts
            .replacements
            .iter()
            .all(|(atom, polarity, _)| candidate.test(*atom) == *polarity)
}

/// Does some rule found `unfounded` in the FLP reduct of `candidate`?
///
/// External replacements are re-evaluated under `candidate ∖ unfounded`
/// when the set touches their inputs.
pub(crate) fn founded_in_reduct(
    _registry: &Registry,
    annotated: &AnnotatedProgram,
    rules: &[RuleParts],
    candidate: &Interpretation,
    unfounded: &Interpretation,
    oracle: &mut dyn ReductOracle,
) -> bool {
    let mut reduct = candidate.clone();
    reduct.subtract(unfounded);

    for parts in rules {
        if !parts.heads.iter().any(|head| unfounded.test(*head)) {
            continue;
        }
        // A true head outside the set blocks founding.
        if parts
            .heads
            .iter()
            .any(|head| candidate.test(*head) && !unfounded.test(*head))
        {
            continue;
        }
        // The FLP reduct keeps rules whose body holds in the candidate.
        if !body_true(parts, candidate) {
            continue;
        }

        let ordinary_hold = parts
            .positive_ordinary
            .iter()
            .all(|atom| reduct.test(*atom))
            && parts.naf_ordinary.iter().all(|atom| !candidate.test(*atom));
        if !ordinary_hold {
            continue;
        }

        let replacements_hold = parts.replacements.iter().all(|(atom, polarity, eatom)| {
            let annotation = &annotated.eatoms[*eatom];
            let mut touched = annotation.input_mask.clone();
            touched.union_with(&annotation.aux_input_mask);
            touched.intersect_with(unfounded);

            let value = if touched.is_empty() {
                candidate.test(*atom)
            } else {
                oracle.replacement_value(*eatom, *atom, &reduct)
            };
            value == *polarity
        });

        if replacements_hold {
            log::debug!(
                target: targets::UFS,
                "Candidate set founded through rule {}",
                parts.rule
            );
            return true;
        }
    }

    false
}

/// Dispatches unfounded-set checks per component.
pub struct UfsCheckerManager {
    variant: UfsVariant,
    nogood_kind: UfsNogoodKind,

    /// Static checkers per component, built lazily.
    assumption_checkers: Vec<Option<AssumptionUfsChecker>>,
}

impl UfsCheckerManager {
    pub fn new(config: &Config, annotated: &AnnotatedProgram) -> Self {
        UfsCheckerManager {
            variant: config.ufs_variant,
            nogood_kind: config.ufs_nogoods,
            assumption_checkers: (0..annotated.sccs.len()).map(|_| None).collect(),
        }
    }

    /// Search every component which the decision criterion does not
    /// excuse. Returns the first nonempty unfounded set found.
    pub fn find_unfounded_set(
        &mut self,
        registry: &Registry,
        annotated: &AnnotatedProgram,
        candidate: &Interpretation,
        skip: &HashSet<Id>,
        oracle: &mut dyn ReductOracle,
    ) -> Option<Vec<AtomAddress>> {
        for index in 0..annotated.sccs.len() {
            let scc = &annotated.sccs[index];
            let excused =
                !scc.head_cycle && !scc.external_cycle && !annotated.choice_disjunction;
            if excused {
                continue;
            }

            let found = match self.variant {
                UfsVariant::Encoding => {
                    EncodingUfsChecker::new(registry, annotated, index)
                        .find(registry, annotated, candidate, skip, oracle)
                }

                UfsVariant::Assumption => {
                    if self.assumption_checkers[index].is_none() {
                        self.assumption_checkers[index] =
                            Some(AssumptionUfsChecker::new(registry, annotated, index));
                    }
                    self.assumption_checkers[index]
                        .as_mut()
                        .expect("! Checker built above")
                        .find(registry, annotated, candidate, skip, oracle)
                }
            };

            if let Some(unfounded) = found {
                log::info!(
                    target: targets::UFS,
                    "Unfounded set of {} atoms in component {index}",
                    unfounded.len()
                );
                return Some(unfounded);
            }
        }

        None
    }

    /// The nogood pruning any interpretation which would reintroduce
    /// `unfounded`.
    pub fn ufs_nogood(
        &self,
        registry: &Registry,
        annotated: &AnnotatedProgram,
        candidate: &Interpretation,
        unfounded: &[AtomAddress],
    ) -> Nogood {
        let member: Interpretation = unfounded.iter().copied().collect();
        let mut literals: Vec<Lit> = unfounded
            .iter()
            .map(|atom| Lit::positive(*atom))
            .collect();

        for rule_id in &annotated.program.idb {
            let parts = rule_parts(registry, annotated, *rule_id);
            if !parts.heads.iter().any(|head| member.test(*head)) {
                continue;
            }

            match self.nogood_kind {
                UfsNogoodKind::UfsBased => {
                    // Pin one witness per rule: a false body literal, or a
                    // true head outside the set; positive dependence on
                    // the set itself is carried by the set literals.
                    if let Some(witness) = false_body_witness(&parts, candidate) {
                        literals.push(witness);
                    } else if let Some(head) = parts
                        .heads
                        .iter()
                        .find(|head| candidate.test(**head) && !member.test(**head))
                    {
                        literals.push(Lit::positive(*head));
                    } else {
                        for input in &parts.inputs {
                            literals.push(Lit::new(*input, candidate.test(*input)));
                        }
                    }
                }

                UfsNogoodKind::ReductBased => {
                    // Pin the whole body status and external environment
                    // of every involved rule: stronger literals, tighter
                    // reuse.
                    for atom in parts
                        .positive_ordinary
                        .iter()
                        .chain(parts.naf_ordinary.iter())
                    {
                        literals.push(Lit::new(*atom, candidate.test(*atom)));
                    }
                    for (atom, _, _) in &parts.replacements {
                        literals.push(Lit::new(*atom, candidate.test(*atom)));
                    }
                    for input in &parts.inputs {
                        literals.push(Lit::new(*input, candidate.test(*input)));
                    }
                    for head in &parts.heads {
                        if !member.test(*head) {
                            literals.push(Lit::new(*head, candidate.test(*head)));
                        }
                    }
                }
            }
        }

        Nogood::new(literals)
    }
}

/// A literal of the body false in `candidate`, as its satisfied
/// complement, if the body fails classically.
fn false_body_witness(parts: &RuleParts, candidate: &Interpretation) -> Option<Lit> {
    for atom in &parts.positive_ordinary {
        if !candidate.test(*atom) {
            return Some(Lit::negative(*atom));
        }
    }
    for atom in &parts.naf_ordinary {
        if candidate.test(*atom) {
            return Some(Lit::positive(*atom));
        }
    }
    for (atom, polarity, _) in &parts.replacements {
        if candidate.test(*atom) != *polarity {
            return Some(Lit::new(*atom, !polarity));
        }
    }
    None
}
