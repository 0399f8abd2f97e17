/*!
Terms, as stored by the registry.

Integers and builtin operators live inline in their [Id](crate::structures::Id)
and never reach a table; everything here is a constant, a variable, or a
nested term. The printable form is fixed at intern time and doubles as the
interning key, so equal text implies an equal id.
*/

use crate::structures::Id;

/// The shape of a stored term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TermShape {
    /// A constant symbol; quoted constants keep their quotes in the text.
    Constant,

    /// A variable.
    Variable {
        /// True if the variable is anonymous (`_`).
        anonymous: bool,
    },

    /// A function symbol applied to arguments.
    Nested {
        /// The function symbol, a constant term.
        function: Id,
        /// The argument terms.
        arguments: Vec<Id>,
    },
}

/// A stored term: printable form plus shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Term {
    /// The printable form, also the interning key.
    pub text: String,

    /// The shape of the term.
    pub shape: TermShape,
}

impl Term {
    /// True if the constant is a quoted string.
    pub fn is_quoted(&self) -> bool {
        matches!(self.shape, TermShape::Constant) && self.text.starts_with('"')
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}
