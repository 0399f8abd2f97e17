/*!
Signed ground atoms, as used by the solver and in nogoods.

A [Lit] pairs the address of an ordinary ground atom with a polarity.
The literal is *satisfied* by an assignment which gives its atom exactly
its polarity, and *falsified* by the opposite assignment.
*/

use crate::structures::IdAddress;

/// The address of an ordinary ground atom.
pub type AtomAddress = IdAddress;

/// A signed ground atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit {
    address: AtomAddress,
    polarity: bool,
}

impl Lit {
    /// A fresh literal from an atom address and a polarity.
    pub fn new(address: AtomAddress, polarity: bool) -> Self {
        Lit { address, polarity }
    }

    /// The positive literal over `address`.
    pub fn positive(address: AtomAddress) -> Self {
        Lit::new(address, true)
    }

    /// The negative literal over `address`.
    pub fn negative(address: AtomAddress) -> Self {
        Lit::new(address, false)
    }

    /// The atom address of the literal.
    pub fn address(&self) -> AtomAddress {
        self.address
    }

    /// The polarity of the literal.
    pub fn polarity(&self) -> bool {
        self.polarity
    }

    /// The literal over the same atom with opposite polarity.
    pub fn negate(&self) -> Self {
        Lit {
            address: self.address,
            polarity: !self.polarity,
        }
    }
}

impl std::fmt::Display for Lit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.polarity {
            true => write!(f, "{}", self.address),
            false => write!(f, "-{}", self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation() {
        let literal = Lit::positive(9);
        assert_eq!(literal.negate(), Lit::negative(9));
        assert_eq!(literal.negate().negate(), literal);
    }

    #[test]
    fn ordering_is_by_atom_then_polarity() {
        let mut literals = vec![Lit::positive(2), Lit::negative(2), Lit::positive(1)];
        literals.sort();
        assert_eq!(
            literals,
            vec![Lit::positive(1), Lit::negative(2), Lit::positive(2)]
        );
    }
}
