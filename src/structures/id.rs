/*!
Tagged ids for terms, atoms, literals, and rules.

Every object handled by the engine is addressed by an [Id]: a kind word
paired with an address into the table of the registry holding objects of
that kind. The kind word carries the main kind (term / atom / literal /
rule), a subkind, and a handful of property bits, so that most dispatch
during a solve is a mask test rather than a table access.

Two kinds avoid the registry altogether:
- Integer terms store their value in the address field.
- Builtin terms store a [TermBuiltin] discriminant in the address field.

Literals are atoms with the literal main kind set, and optionally the NAF
bit for default negation. As the address is shared, moving between an atom
and the literals over the atom is a matter of masking.

A distinguished [FAIL](Id::FAIL) id stands for "none", and is never issued
by a registry.
*/

/// The kind word of an id.
pub type IdKind = u32;

/// An address into a registry table, or an inline value.
pub type IdAddress = u32;

/// A kind word paired with an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    /// The kind of the identified object.
    pub kind: IdKind,

    /// The address of the identified object, or its inline value.
    pub address: IdAddress,
}

impl Id {
    /// Mask of the main kind bits.
    pub const MAINKIND_MASK: IdKind = 0x7000_0000;

    /// Main kind: atom.
    pub const MAINKIND_ATOM: IdKind = 0x0000_0000;
    /// Main kind: term.
    pub const MAINKIND_TERM: IdKind = 0x1000_0000;
    /// Main kind: literal (an atom used in a rule body).
    pub const MAINKIND_LITERAL: IdKind = 0x2000_0000;
    /// Main kind: rule.
    pub const MAINKIND_RULE: IdKind = 0x3000_0000;

    /// Mask of the subkind bits.
    pub const SUBKIND_MASK: IdKind = 0x0F00_0000;

    /// Term subkind: constant.
    pub const SUBKIND_TERM_CONSTANT: IdKind = 0x0000_0000;
    /// Term subkind: integer, value inline in the address.
    pub const SUBKIND_TERM_INTEGER: IdKind = 0x0100_0000;
    /// Term subkind: variable.
    pub const SUBKIND_TERM_VARIABLE: IdKind = 0x0200_0000;
    /// Term subkind: builtin operator, discriminant inline in the address.
    pub const SUBKIND_TERM_BUILTIN: IdKind = 0x0300_0000;
    /// Term subkind: nested (function symbol applied to arguments).
    pub const SUBKIND_TERM_NESTED: IdKind = 0x0500_0000;

    /// Atom subkind: ordinary ground.
    pub const SUBKIND_ATOM_ORDINARY_GROUND: IdKind = 0x0000_0000;
    /// Atom subkind: ordinary nonground.
    pub const SUBKIND_ATOM_ORDINARY_NONGROUND: IdKind = 0x0100_0000;
    /// Atom subkind: builtin comparison.
    pub const SUBKIND_ATOM_BUILTIN: IdKind = 0x0200_0000;
    /// Atom subkind: aggregate.
    pub const SUBKIND_ATOM_AGGREGATE: IdKind = 0x0300_0000;
    /// Atom subkind: external.
    pub const SUBKIND_ATOM_EXTERNAL: IdKind = 0x0600_0000;

    /// Rule subkind: regular rule.
    pub const SUBKIND_RULE_REGULAR: IdKind = 0x0000_0000;
    /// Rule subkind: constraint (empty head).
    pub const SUBKIND_RULE_CONSTRAINT: IdKind = 0x0100_0000;
    /// Rule subkind: weak constraint.
    pub const SUBKIND_RULE_WEAK: IdKind = 0x0200_0000;
    /// Rule subkind: weight rule (body holds under a weight bound).
    pub const SUBKIND_RULE_WEIGHT: IdKind = 0x0300_0000;

    /// Mask of the property bits.
    pub const PROPERTY_MASK: IdKind = 0x00FF_0000;

    /// The object is an auxiliary introduced by the engine.
    pub const PROPERTY_AUX: IdKind = 0x0080_0000;
    /// The atom is a positive or negative external-atom replacement.
    pub const PROPERTY_EXTERNAL_AUX: IdKind = 0x0040_0000;
    /// The atom is an external-atom input auxiliary.
    pub const PROPERTY_EXTERNAL_INPUT_AUX: IdKind = 0x0020_0000;
    /// The rule has a disjunctive head.
    pub const PROPERTY_RULE_DISJUNCTIVE: IdKind = 0x0010_0000;
    /// The rule mentions at least one external atom.
    pub const PROPERTY_RULE_EXTERNAL: IdKind = 0x0008_0000;
    /// The rule has a head guard (variable-length disjunction).
    pub const PROPERTY_RULE_HEADGUARD: IdKind = 0x0004_0000;
    /// The atom carries strong negation.
    pub const PROPERTY_STRONG_NEGATION: IdKind = 0x0002_0000;
    /// The variable is anonymous.
    pub const PROPERTY_ANONYMOUS: IdKind = 0x0001_0000;

    /// The literal is default negated.
    pub const NAF_MASK: IdKind = 0x8000_0000;

    /// The id which identifies nothing.
    pub const FAIL: Id = Id {
        kind: IdKind::MAX,
        address: IdAddress::MAX,
    };

    /// A fresh id from a kind and an address.
    pub const fn new(kind: IdKind, address: IdAddress) -> Self {
        Id { kind, address }
    }

    /// An integer term id carrying `value` inline.
    pub const fn integer(value: IdAddress) -> Self {
        Id::new(Self::MAINKIND_TERM | Self::SUBKIND_TERM_INTEGER, value)
    }

    /// A builtin term id carrying the operator inline.
    pub const fn builtin(op: TermBuiltin) -> Self {
        Id::new(Self::MAINKIND_TERM | Self::SUBKIND_TERM_BUILTIN, op as IdAddress)
    }

    /// The positive body literal over `atom`.
    ///
    /// Panics if `atom` is not an atom id.
    pub fn literal(atom: Id) -> Self {
        assert!(atom.is_atom());
        Id::new(atom.kind | Self::MAINKIND_LITERAL, atom.address)
    }

    /// The default-negated body literal over `atom`.
    ///
    /// Panics if `atom` is not an atom id.
    pub fn naf_literal(atom: Id) -> Self {
        assert!(atom.is_atom());
        Id::new(atom.kind | Self::MAINKIND_LITERAL | Self::NAF_MASK, atom.address)
    }

    /// The atom of a literal, with the literal main kind and NAF bit dropped.
    pub fn atom_of(literal: Id) -> Self {
        Id::new(
            (literal.kind & !(Self::NAF_MASK | Self::MAINKIND_MASK)) | Self::MAINKIND_ATOM,
            literal.address,
        )
    }

    /// The main kind bits of the id.
    pub fn main_kind(&self) -> IdKind {
        self.kind & Self::MAINKIND_MASK
    }

    /// The subkind bits of the id.
    pub fn subkind(&self) -> IdKind {
        self.kind & Self::SUBKIND_MASK
    }

    pub fn is_fail(&self) -> bool {
        *self == Self::FAIL
    }

    pub fn is_term(&self) -> bool {
        self.main_kind() == Self::MAINKIND_TERM
    }

    pub fn is_constant_term(&self) -> bool {
        self.is_term() && self.subkind() == Self::SUBKIND_TERM_CONSTANT
    }

    pub fn is_integer_term(&self) -> bool {
        self.is_term() && self.subkind() == Self::SUBKIND_TERM_INTEGER
    }

    pub fn is_variable_term(&self) -> bool {
        self.is_term() && self.subkind() == Self::SUBKIND_TERM_VARIABLE
    }

    pub fn is_builtin_term(&self) -> bool {
        self.is_term() && self.subkind() == Self::SUBKIND_TERM_BUILTIN
    }

    pub fn is_nested_term(&self) -> bool {
        self.is_term() && self.subkind() == Self::SUBKIND_TERM_NESTED
    }

    pub fn is_atom(&self) -> bool {
        self.main_kind() == Self::MAINKIND_ATOM
    }

    pub fn is_literal(&self) -> bool {
        self.main_kind() == Self::MAINKIND_LITERAL
    }

    pub fn is_atom_or_literal(&self) -> bool {
        self.is_atom() || self.is_literal()
    }

    pub fn is_ordinary_ground_atom(&self) -> bool {
        self.is_atom_or_literal() && self.subkind() == Self::SUBKIND_ATOM_ORDINARY_GROUND
    }

    pub fn is_ordinary_nonground_atom(&self) -> bool {
        self.is_atom_or_literal() && self.subkind() == Self::SUBKIND_ATOM_ORDINARY_NONGROUND
    }

    pub fn is_ordinary_atom(&self) -> bool {
        self.is_ordinary_ground_atom() || self.is_ordinary_nonground_atom()
    }

    pub fn is_builtin_atom(&self) -> bool {
        self.is_atom_or_literal() && self.subkind() == Self::SUBKIND_ATOM_BUILTIN
    }

    pub fn is_aggregate_atom(&self) -> bool {
        self.is_atom_or_literal() && self.subkind() == Self::SUBKIND_ATOM_AGGREGATE
    }

    pub fn is_external_atom(&self) -> bool {
        self.is_atom_or_literal() && self.subkind() == Self::SUBKIND_ATOM_EXTERNAL
    }

    pub fn is_rule(&self) -> bool {
        self.main_kind() == Self::MAINKIND_RULE
    }

    pub fn is_constraint_rule(&self) -> bool {
        self.is_rule() && self.subkind() == Self::SUBKIND_RULE_CONSTRAINT
    }

    pub fn is_weak_constraint_rule(&self) -> bool {
        self.is_rule() && self.subkind() == Self::SUBKIND_RULE_WEAK
    }

    pub fn is_weight_rule(&self) -> bool {
        self.is_rule() && self.subkind() == Self::SUBKIND_RULE_WEIGHT
    }

    pub fn is_naf(&self) -> bool {
        self.is_literal() && (self.kind & Self::NAF_MASK) != 0
    }

    pub fn is_aux(&self) -> bool {
        (self.kind & Self::PROPERTY_AUX) != 0
    }

    pub fn is_external_aux(&self) -> bool {
        (self.kind & Self::PROPERTY_EXTERNAL_AUX) != 0
    }

    pub fn is_external_input_aux(&self) -> bool {
        (self.kind & Self::PROPERTY_EXTERNAL_INPUT_AUX) != 0
    }

    pub fn is_disjunctive_rule(&self) -> bool {
        self.is_rule() && (self.kind & Self::PROPERTY_RULE_DISJUNCTIVE) != 0
    }

    pub fn rule_mentions_external(&self) -> bool {
        self.is_rule() && (self.kind & Self::PROPERTY_RULE_EXTERNAL) != 0
    }

    pub fn is_anonymous_variable(&self) -> bool {
        self.is_variable_term() && (self.kind & Self::PROPERTY_ANONYMOUS) != 0
    }

    /// The builtin operator of a builtin term id.
    ///
    /// Panics if the id is not a builtin term.
    pub fn builtin_op(&self) -> TermBuiltin {
        assert!(self.is_builtin_term());
        TermBuiltin::from_address(self.address)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_fail() {
            return write!(f, "#fail");
        }
        let main = match self.main_kind() {
            Self::MAINKIND_ATOM => "a",
            Self::MAINKIND_TERM => "t",
            Self::MAINKIND_LITERAL => "l",
            Self::MAINKIND_RULE => "r",
            _ => "?",
        };
        write!(f, "{main}{:x}:{}", self.subkind() >> 24, self.address)
    }
}

/// Builtin operators, stored inline in the address of a builtin term id.
///
/// Comparisons and arithmetic are evaluated by the grounder; the aggregate
/// function symbols exist so aggregate atoms are representable, though the
/// engine expects aggregates compiled into weight rules by the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TermBuiltin {
    Eq = 0,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Mul,
    Add,
    Sub,
    Div,
    Mod,
    AggCount,
    AggMin,
    AggMax,
    AggSum,
    AggTimes,
    AggAvg,
    AggAny,
    AggInt,
    Succ,
}

impl TermBuiltin {
    /// The operator stored at `address`.
    ///
    /// Panics if `address` is outside the builtin range.
    pub fn from_address(address: IdAddress) -> Self {
        use TermBuiltin::*;
        const TABLE: [TermBuiltin; 20] = [
            Eq, Ne, Lt, Le, Gt, Ge, Mul, Add, Sub, Div, Mod, AggCount, AggMin, AggMax, AggSum,
            AggTimes, AggAvg, AggAny, AggInt, Succ,
        ];
        TABLE[address as usize]
    }

    /// The printable form of the operator.
    pub fn as_str(&self) -> &'static str {
        use TermBuiltin::*;
        match self {
            Eq => "=",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Mul => "*",
            Add => "+",
            Sub => "-",
            Div => "/",
            Mod => "%",
            AggCount => "#count",
            AggMin => "#min",
            AggMax => "#max",
            AggSum => "#sum",
            AggTimes => "#times",
            AggAvg => "#avg",
            AggAny => "#any",
            AggInt => "#int",
            Succ => "#succ",
        }
    }

    /// True for the comparison operators.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TermBuiltin::Eq
                | TermBuiltin::Ne
                | TermBuiltin::Lt
                | TermBuiltin::Le
                | TermBuiltin::Gt
                | TermBuiltin::Ge
        )
    }

    /// True for the binary arithmetic operators.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            TermBuiltin::Mul
                | TermBuiltin::Add
                | TermBuiltin::Sub
                | TermBuiltin::Div
                | TermBuiltin::Mod
        )
    }
}

impl std::fmt::Display for TermBuiltin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_disjoint() {
        let term = Id::new(Id::MAINKIND_TERM | Id::SUBKIND_TERM_CONSTANT, 3);
        let atom = Id::new(Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_ORDINARY_GROUND, 3);

        assert!(term.is_term());
        assert!(!term.is_atom());
        assert!(atom.is_ordinary_ground_atom());
        assert_ne!(term, atom);
    }

    #[test]
    fn literal_round_trip() {
        let atom = Id::new(Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_ORDINARY_GROUND, 7);

        let positive = Id::literal(atom);
        assert!(positive.is_literal());
        assert!(!positive.is_naf());
        assert_eq!(Id::atom_of(positive), atom);

        let negative = Id::naf_literal(atom);
        assert!(negative.is_naf());
        assert_eq!(Id::atom_of(negative), atom);
    }

    #[test]
    fn integers_are_inline() {
        let five = Id::integer(5);
        assert!(five.is_integer_term());
        assert_eq!(five.address, 5);
    }

    #[test]
    fn builtin_addresses() {
        for address in 0..20 {
            let op = TermBuiltin::from_address(address);
            assert_eq!(Id::builtin(op).builtin_op(), op);
        }
    }
}
