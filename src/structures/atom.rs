/*!
Ordinary atoms.

An ordinary atom is a tuple of term ids, the first of which is the
predicate. Ground and nonground atoms are stored in separate registry
tables, distinguished by the subkind of their ids, and the address of a
ground atom doubles as its index into [interpretations](crate::structures::Interpretation).
*/

use crate::structures::Id;

/// An ordinary atom: predicate plus arguments, with a cached printable form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrdinaryAtom {
    /// The tuple of term ids, predicate first.
    pub tuple: Vec<Id>,

    /// The cached printable form.
    pub text: String,
}

impl OrdinaryAtom {
    /// The predicate term of the atom.
    pub fn predicate(&self) -> Id {
        self.tuple[0]
    }

    /// The argument terms of the atom.
    pub fn arguments(&self) -> &[Id] {
        &self.tuple[1..]
    }

    /// The arity of the atom.
    pub fn arity(&self) -> usize {
        self.tuple.len() - 1
    }
}

impl std::fmt::Display for OrdinaryAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}
