/*!
External atoms and their declared source properties.

An external atom `&g[t1,…,tk](u1,…,ul)` pairs an oracle predicate with an
input tuple and an output tuple. The property block describes how the
oracle behaves, and is the sole basis for the optimisations which rely on
such behaviour: the engine trusts declared properties without validation.

Properties attached to a specific occurrence are merged with the oracle's
global properties by set union; properties are declared never to
contradict.
*/

use std::collections::BTreeSet;

use crate::structures::Id;

/// Mapping from the arguments of an auxiliary input atom to positions of
/// the external atom's input tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AuxInput {
    /// The auxiliary input predicate.
    pub predicate: Id,

    /// For each auxiliary-atom argument, the input-tuple position it fills.
    pub positions: Vec<usize>,
}

/// An external atom.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExternalAtom {
    /// The oracle predicate, a constant term.
    pub predicate: Id,

    /// The input tuple.
    pub inputs: Vec<Id>,

    /// The output tuple.
    pub outputs: Vec<Id>,

    /// Optional auxiliary input predicate with its position mapping.
    pub aux_input: Option<AuxInput>,

    /// The property block of this occurrence, already merged with the
    /// oracle's global properties.
    pub properties: ExtProperties,
}

impl ExternalAtom {
    /// The arity of the output tuple.
    pub fn output_arity(&self) -> usize {
        self.outputs.len()
    }
}

/// Declared behaviour of an external source.
///
/// Per-parameter sets hold input positions; pair sets hold
/// (input, output) or (output, output) position pairs as documented per
/// field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExtProperties {
    /// Input positions the oracle is monotonic in.
    pub monotonic: BTreeSet<usize>,

    /// Input positions the oracle is antimonotonic in.
    pub antimonotonic: BTreeSet<usize>,

    /// Input positions whose predicate name is irrelevant to the oracle.
    pub name_irrelevant: BTreeSet<usize>,

    /// Output positions with a finite domain.
    pub finite_output_domain: BTreeSet<usize>,

    /// (input, output) pairs where the output domain is finite relative to
    /// the input extension.
    pub relative_finite_output_domain: BTreeSet<(usize, usize)>,

    /// (input, output) pairs under a string-length wellordering.
    pub wellordering_strlen: BTreeSet<(usize, usize)>,

    /// (input, output) pairs under a natural-number wellordering.
    pub wellordering_natural: BTreeSet<(usize, usize)>,

    /// The oracle is functional from some output position onward.
    pub functional: bool,

    /// First output position from which the functionality applies.
    pub functional_start: usize,

    /// The oracle is linear over individual input atoms.
    pub atom_level_linear: bool,

    /// The oracle is linear over equal-argument input tuples.
    pub tuple_level_linear: bool,

    /// The oracle reads an environment beyond its inputs.
    pub uses_environment: bool,

    /// The preimage of every output tuple is finite.
    pub finite_fiber: bool,

    /// The oracle can provide support sets.
    pub provides_support_sets: bool,

    /// Provided positive support sets are complete.
    pub complete_positive_support_sets: bool,

    /// Provided negative support sets are complete.
    pub complete_negative_support_sets: bool,

    /// The output arity is not fixed.
    pub variable_output_arity: bool,

    /// The oracle wants the set of assigned atoms in its queries.
    pub cares_about_assigned: bool,

    /// The oracle wants the set of changed atoms in its queries.
    pub cares_about_changed: bool,
}

impl ExtProperties {
    /// Union-merge `other` into `self`.
    ///
    /// Used to layer occurrence-level declarations over plugin defaults.
    pub fn merge(&mut self, other: &ExtProperties) {
        self.monotonic.extend(&other.monotonic);
        self.antimonotonic.extend(&other.antimonotonic);
        self.name_irrelevant.extend(&other.name_irrelevant);
        self.finite_output_domain.extend(&other.finite_output_domain);
        self.relative_finite_output_domain
            .extend(&other.relative_finite_output_domain);
        self.wellordering_strlen.extend(&other.wellordering_strlen);
        self.wellordering_natural.extend(&other.wellordering_natural);

        self.functional |= other.functional;
        self.functional_start = self.functional_start.max(other.functional_start);
        self.atom_level_linear |= other.atom_level_linear;
        self.tuple_level_linear |= other.tuple_level_linear;
        self.uses_environment |= other.uses_environment;
        self.finite_fiber |= other.finite_fiber;
        self.provides_support_sets |= other.provides_support_sets;
        self.complete_positive_support_sets |= other.complete_positive_support_sets;
        self.complete_negative_support_sets |= other.complete_negative_support_sets;
        self.variable_output_arity |= other.variable_output_arity;
        self.cares_about_assigned |= other.cares_about_assigned;
        self.cares_about_changed |= other.cares_about_changed;
    }

    /// True if the oracle is monotonic in input position `index`.
    pub fn is_monotonic(&self, index: usize) -> bool {
        self.monotonic.contains(&index)
    }

    /// True if the oracle is antimonotonic in input position `index`.
    pub fn is_antimonotonic(&self, index: usize) -> bool {
        self.antimonotonic.contains(&index)
    }

    /// True if the predicate name at input position `index` is irrelevant.
    pub fn is_name_irrelevant(&self, index: usize) -> bool {
        self.name_irrelevant.contains(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_union() {
        let mut base = ExtProperties::default();
        base.monotonic.insert(0);

        let mut occurrence = ExtProperties::default();
        occurrence.monotonic.insert(1);
        occurrence.functional = true;
        occurrence.functional_start = 2;

        base.merge(&occurrence);

        assert!(base.is_monotonic(0));
        assert!(base.is_monotonic(1));
        assert!(base.functional);
        assert_eq!(base.functional_start, 2);
    }
}
