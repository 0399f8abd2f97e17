/*!
Nogoods.

A nogood is a deduplicated set of signed ground atoms with the reading
"not all of these simultaneously": an assignment satisfying every literal
of a nogood is forbidden.

Two flavours exist:
- [Nogood], over ground atom addresses, consumed by the solver.
- [NogoodTemplate], over (possibly nonground) literal ids, produced by
  generalisation and by oracles, and instantiated against a live
  assignment by the [NogoodGrounder](crate::nogoods::NogoodGrounder).

A *support set* is a nogood with exactly one external-atom-replacement
literal; see [Nogood::support_literal].
*/

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::structures::{AtomAddress, Id, Lit};

/// A deduplicated set of signed ground atoms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Nogood {
    literals: Vec<Lit>,
}

impl Nogood {
    /// A fresh nogood from the given literals, sorted and deduplicated.
    pub fn new(literals: impl IntoIterator<Item = Lit>) -> Self {
        let mut literals: Vec<Lit> = literals.into_iter().collect();
        literals.sort();
        literals.dedup();
        Nogood { literals }
    }

    /// The empty nogood, forbidding every assignment.
    pub fn empty() -> Self {
        Nogood {
            literals: Vec::new(),
        }
    }

    /// The literals of the nogood, in ascending order.
    pub fn literals(&self) -> &[Lit] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn contains(&self, literal: Lit) -> bool {
        self.literals.binary_search(&literal).is_ok()
    }

    /// True if the nogood holds some literal over `address`.
    pub fn mentions(&self, address: AtomAddress) -> bool {
        self.contains(Lit::positive(address)) || self.contains(Lit::negative(address))
    }

    /// True if the nogood contains both polarities of some atom, and so can
    /// never be violated.
    pub fn is_vacuous(&self) -> bool {
        self.literals
            .windows(2)
            .any(|pair| pair[0].address() == pair[1].address())
    }

    /// A stable content hash, used as a cheap dedup signature.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.literals.hash(&mut hasher);
        hasher.finish()
    }

    /// The single replacement literal of a support set, given the set of
    /// replacement-atom addresses.
    ///
    /// Returns `None` if the nogood holds no replacement literal or more
    /// than one.
    pub fn support_literal(
        &self,
        is_replacement: impl Fn(AtomAddress) -> bool,
    ) -> Option<Lit> {
        let mut found = None;
        for &literal in &self.literals {
            if is_replacement(literal.address()) {
                if found.is_some() {
                    return None;
                }
                found = Some(literal);
            }
        }
        found
    }
}

impl FromIterator<Lit> for Nogood {
    fn from_iter<T: IntoIterator<Item = Lit>>(iter: T) -> Self {
        Nogood::new(iter)
    }
}

impl std::fmt::Display for Nogood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, literal) in self.literals.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{literal}")?;
        }
        write!(f, "}}")
    }
}

/// A nogood over literal ids, possibly nonground.
///
/// Literal ids carry polarity in their NAF bit: a NAF literal id stands
/// for "the atom is false".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NogoodTemplate {
    /// The literal ids of the template, sorted and deduplicated.
    pub literals: Vec<Id>,
}

impl NogoodTemplate {
    /// A fresh template from the given literal ids.
    pub fn new(literals: impl IntoIterator<Item = Id>) -> Self {
        let mut literals: Vec<Id> = literals.into_iter().collect();
        literals.sort();
        literals.dedup();
        NogoodTemplate { literals }
    }

    /// True if every literal is over a ground atom.
    pub fn is_ground(&self) -> bool {
        self.literals
            .iter()
            .all(|literal| literal.is_ordinary_ground_atom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_and_order() {
        let nogood = Nogood::new([Lit::positive(3), Lit::positive(1), Lit::positive(3)]);
        assert_eq!(nogood.len(), 2);
        assert_eq!(nogood.literals()[0], Lit::positive(1));
    }

    #[test]
    fn vacuous_detection() {
        let vacuous = Nogood::new([Lit::positive(2), Lit::negative(2)]);
        assert!(vacuous.is_vacuous());

        let sound = Nogood::new([Lit::positive(2), Lit::negative(3)]);
        assert!(!sound.is_vacuous());
    }

    #[test]
    fn support_literal_is_unique() {
        let nogood = Nogood::new([Lit::positive(7), Lit::negative(1), Lit::positive(2)]);
        assert_eq!(
            nogood.support_literal(|address| address == 7),
            Some(Lit::positive(7))
        );
        assert_eq!(nogood.support_literal(|address| address >= 2), None);
    }
}
