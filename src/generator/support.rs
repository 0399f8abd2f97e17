/*!
Support sets.

A support set is a nogood with exactly one replacement literal: its
ordinary literals force the replacement's truth value. Oracles which
advertise support sets deliver them at initialisation; the engine keeps
them in the learned store (pruning the guess directly) and, for ground
sets, in the [VerificationTree] --- a trie over signed ground literals
which, given an interpretation, enumerates the replacement literals
verified by subsets of the currently satisfied literals in time linear
in the interpretation.

When an external atom's positive support sets are *complete*, the guess
over it can be eliminated altogether: each positive support set becomes
an ordinary rule deriving an inlining auxiliary (`'F'` space), and body
occurrences of the replacement are rewritten to that auxiliary. The
emitted answer sets are identical to the non-inlined rendition.
*/

use std::collections::HashMap;

use crate::registry::Registry;
use crate::structures::{AtomAddress, Id, Interpretation, Lit, NogoodTemplate, Rule};

/// A trie over signed ground literals, leaves holding replacement
/// literals.
#[derive(Debug, Default)]
pub struct VerificationTree {
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    /// Replacement literals verified once the path is satisfied.
    verified: Vec<Lit>,

    /// Children, by the next path literal.
    children: HashMap<Lit, Node>,
}

impl VerificationTree {
    /// Insert a ground support set: `conditions` force `replacement`.
    ///
    /// Conditions are the *satisfied* forms of the set's ordinary
    /// literals; `replacement` is the forced replacement literal.
    pub fn insert(&mut self, mut conditions: Vec<Lit>, replacement: Lit) {
        conditions.sort();
        conditions.dedup();

        let mut node = &mut self.root;
        for literal in conditions {
            node = node.children.entry(literal).or_default();
        }
        if !node.verified.contains(&replacement) {
            node.verified.push(replacement);
        }
    }

    /// Every replacement literal whose conditions are satisfied: positive
    /// conditions must be true in `interpretation`, negative conditions
    /// false.
    pub fn verified_replacements(&self, interpretation: &Interpretation) -> Vec<Lit> {
        let mut found = Vec::new();
        self.root.collect(interpretation, &mut found);
        found.sort();
        found.dedup();
        found
    }

    pub fn is_empty(&self) -> bool {
        self.root.verified.is_empty() && self.root.children.is_empty()
    }
}

impl Node {
    fn collect(&self, interpretation: &Interpretation, found: &mut Vec<Lit>) {
        found.extend(self.verified.iter().copied());
        for (literal, child) in &self.children {
            if interpretation.test(literal.address()) == literal.polarity() {
                child.collect(interpretation, found);
            }
        }
    }
}

/// Split a support-set template into its replacement literal and the
/// satisfied forms of its ordinary condition literals.
///
/// The template semantics are those of a nogood, so a condition literal
/// is satisfied at its recorded polarity and the replacement is forced
/// to the *opposite* of its polarity in the set.
pub fn split_support_set(
    template: &NogoodTemplate,
    is_replacement: impl Fn(AtomAddress) -> bool,
) -> Option<(Vec<Id>, Id)> {
    let mut replacement = None;
    let mut conditions = Vec::new();

    for literal in &template.literals {
        let atom = Id::atom_of(*literal);
        let is_rep = atom.is_ordinary_ground_atom() && is_replacement(atom.address)
            || atom.is_external_aux();
        if is_rep {
            if replacement.is_some() {
                return None;
            }
            replacement = Some(*literal);
        } else {
            conditions.push(*literal);
        }
    }

    replacement.map(|replacement| (conditions, replacement))
}

/// The ground [VerificationTree] entry of a ground support set: the
/// forced replacement literal with its condition literals.
pub fn tree_entry(
    template: &NogoodTemplate,
    is_replacement: impl Fn(AtomAddress) -> bool,
) -> Option<(Vec<Lit>, Lit)> {
    if !template.is_ground() {
        return None;
    }
    let (conditions, replacement) = split_support_set(template, is_replacement)?;

    let condition_literals = conditions
        .iter()
        .map(|literal| {
            let atom = Id::atom_of(*literal);
            Lit::new(atom.address, !literal.is_naf())
        })
        .collect();

    let replacement_atom = Id::atom_of(replacement);
    // The set forbids the replacement at its recorded polarity, so the
    // verified value is the opposite.
    let forced = Lit::new(replacement_atom.address, replacement.is_naf());

    Some((condition_literals, forced))
}

/// Rewrite `idb`, eliminating the guess over an external atom with
/// complete positive support sets.
///
/// Each support set `{conditions, ¬replacement}` becomes the rule
/// `F(args) :- conditions`, and body occurrences of the replacement are
/// redirected to the `'F'` auxiliary. Returns the revised rule ids.
pub fn inline_eatom(
    registry: &mut Registry,
    idb: &[Id],
    eatom: Id,
    support_sets: &[NogoodTemplate],
) -> Vec<Id> {
    let r_predicate = registry.aux_symbol('r', eatom);
    let f_predicate = registry.aux_symbol('F', eatom);

    let mut revised: Vec<Id> = Vec::new();

    // Derivation rules from the support sets.
    for template in support_sets {
        let Some((conditions, replacement)) = split_support_set(template, |_| false) else {
            continue;
        };
        let replacement_atom = Id::atom_of(replacement);
        let tuple = {
            let atom = registry.ordinary_atom(replacement_atom);
            let mut tuple = atom.tuple.clone();
            tuple[0] = f_predicate;
            tuple
        };
        let head = match registry.tuple_is_ground(&tuple) {
            true => registry.intern_ground_atom(tuple),
            false => registry.intern_nonground_atom(tuple),
        };

        // Condition literals flip polarity when moved from nogood to body.
        let body: Vec<Id> = conditions
            .iter()
            .map(|literal| {
                let atom = Id::atom_of(*literal);
                match literal.is_naf() {
                    true => Id::naf_literal(atom),
                    false => Id::literal(atom),
                }
            })
            .collect();

        revised.push(registry.intern_rule(Rule::regular(vec![head], body)));
    }

    // Redirect replacement occurrences.
    for rule_id in idb {
        let rule = registry.rule(*rule_id).clone();
        let mut body = Vec::with_capacity(rule.body.len());
        let mut changed = false;

        for literal in &rule.body {
            let atom = Id::atom_of(*literal);
            let redirected = if atom.is_ordinary_atom()
                && registry.ordinary_atom(atom).predicate() == r_predicate
            {
                changed = true;
                let mut tuple = registry.ordinary_atom(atom).tuple.clone();
                tuple[0] = f_predicate;
                let target = match registry.tuple_is_ground(&tuple) {
                    true => registry.intern_ground_atom(tuple),
                    false => registry.intern_nonground_atom(tuple),
                };
                match literal.is_naf() {
                    true => Id::naf_literal(target),
                    false => Id::literal(target),
                }
            } else {
                *literal
            };
            body.push(redirected);
        }

        if changed {
            let mut rewritten = rule;
            rewritten.body = body;
            revised.push(registry.intern_rule(rewritten));
        } else {
            revised.push(*rule_id);
        }
    }

    revised
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_enumerates_verified_replacements() {
        let mut tree = VerificationTree::default();

        // {p(a)} forces the replacement at 10 true.
        tree.insert(vec![Lit::positive(1)], Lit::positive(10));
        // {p(a), -q(b)} forces the replacement at 11 false.
        tree.insert(vec![Lit::positive(1), Lit::negative(2)], Lit::negative(11));

        let interpretation: Interpretation = [1].into_iter().collect();
        let verified = tree.verified_replacements(&interpretation);

        assert!(verified.contains(&Lit::positive(10)));
        assert!(verified.contains(&Lit::negative(11)));

        let with_q: Interpretation = [1, 2].into_iter().collect();
        let verified = tree.verified_replacements(&with_q);
        assert!(verified.contains(&Lit::positive(10)));
        assert!(!verified.contains(&Lit::negative(11)));
    }
}
