/*!
The registry --- interning tables for terms, atoms, rules, and external
atoms.

Each table is an append-only arena with a secondary hash index from
content to id, so interning is idempotent: distinct ids imply distinct
printable content, and id equality implies structural equality. Ids are
created by the front end and the grounder and never destroyed for the
lifetime of a solve.

The registry also owns the reserved auxiliary constant space used by the
engine to name guess replacements, input auxiliaries, FLP markers, and
inconsistency-explanation constants; see [aux_symbol](Registry::aux_symbol).

# Example

```rust
# use aspex::registry::Registry;
let mut registry = Registry::default();

let p = registry.intern_constant("p");
let a = registry.intern_constant("a");

let atom = registry.intern_ground_atom(vec![p, a]);
assert_eq!(atom, registry.intern_ground_atom(vec![p, a]));
assert_eq!(registry.ground_atom(atom.address).text, "p(a)");
```
*/

use std::collections::HashMap;

use crate::structures::{
    AtomAddress, ExternalAtom, Id, Interpretation, Lit, OrdinaryAtom, Rule, Term, TermShape,
};
use crate::types::err::RegistryError;

/// Interning tables and the auxiliary constant space.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    terms: Vec<Term>,
    term_index: HashMap<String, Id>,

    ground_atoms: Vec<OrdinaryAtom>,
    ground_index: HashMap<Vec<Id>, Id>,

    nonground_atoms: Vec<OrdinaryAtom>,
    nonground_index: HashMap<Vec<Id>, Id>,

    builtin_atoms: Vec<OrdinaryAtom>,
    builtin_index: HashMap<Vec<Id>, Id>,

    rules: Vec<Rule>,
    rule_index: HashMap<Rule, Id>,

    externals: Vec<ExternalAtom>,
    external_index: HashMap<ExternalAtom, Id>,

    aux_forward: HashMap<(char, Id), Id>,
    aux_meta: HashMap<Id, (char, Id)>,

    by_predicate: HashMap<Id, Vec<Id>>,

    /// The largest integer the grounder may produce.
    pub maxint: u32,
}

impl Registry {
    // Terms

    fn intern_term(&mut self, term: Term, kind: u32) -> Id {
        if let Some(id) = self.term_index.get(&term.text) {
            return *id;
        }
        let id = Id::new(kind, self.terms.len() as u32);
        self.term_index.insert(term.text.clone(), id);
        self.terms.push(term);
        id
    }

    /// Intern a constant symbol.
    pub fn intern_constant(&mut self, text: &str) -> Id {
        self.intern_term(
            Term {
                text: text.to_owned(),
                shape: TermShape::Constant,
            },
            Id::MAINKIND_TERM | Id::SUBKIND_TERM_CONSTANT,
        )
    }

    /// Intern a variable; `_` is anonymous.
    pub fn intern_variable(&mut self, name: &str) -> Id {
        let mut kind = Id::MAINKIND_TERM | Id::SUBKIND_TERM_VARIABLE;
        if name == "_" {
            kind |= Id::PROPERTY_ANONYMOUS;
        }
        self.intern_term(
            Term {
                text: name.to_owned(),
                shape: TermShape::Variable { anonymous: name == "_" },
            },
            kind,
        )
    }

    /// Intern a nested term from a function symbol and arguments.
    pub fn intern_nested(&mut self, function: Id, arguments: Vec<Id>) -> Id {
        let mut text = self.term_text(function);
        text.push('(');
        for (index, argument) in arguments.iter().enumerate() {
            if index > 0 {
                text.push(',');
            }
            text.push_str(&self.term_text(*argument));
        }
        text.push(')');
        self.intern_term(
            Term {
                text,
                shape: TermShape::Nested {
                    function,
                    arguments,
                },
            },
            Id::MAINKIND_TERM | Id::SUBKIND_TERM_NESTED,
        )
    }

    /// The stored term of `id`.
    ///
    /// Panics on the fail id and on inline (integer / builtin) terms, which
    /// have no table entry.
    pub fn term(&self, id: Id) -> &Term {
        assert!(!id.is_fail(), "! Lookup on the fail id");
        assert!(id.is_constant_term() || id.is_variable_term() || id.is_nested_term());
        &self.terms[id.address as usize]
    }

    /// The printable form of any term id, inline kinds included.
    pub fn term_text(&self, id: Id) -> String {
        if id.is_integer_term() {
            id.address.to_string()
        } else if id.is_builtin_term() {
            id.builtin_op().as_str().to_owned()
        } else {
            self.term(id).text.clone()
        }
    }

    /// True if every term of `tuple` is ground.
    pub fn tuple_is_ground(&self, tuple: &[Id]) -> bool {
        tuple.iter().all(|term| self.term_is_ground(*term))
    }

    /// True if the term holds no variable.
    pub fn term_is_ground(&self, id: Id) -> bool {
        if id.is_integer_term() || id.is_builtin_term() {
            return true;
        }
        match &self.term(id).shape {
            TermShape::Constant => true,
            TermShape::Variable { .. } => false,
            TermShape::Nested { arguments, .. } => {
                arguments.iter().all(|argument| self.term_is_ground(*argument))
            }
        }
    }

    // Ordinary atoms

    fn atom_text(&self, tuple: &[Id]) -> String {
        let mut text = self.term_text(tuple[0]);
        if tuple.len() > 1 {
            text.push('(');
            for (index, argument) in tuple[1..].iter().enumerate() {
                if index > 0 {
                    text.push(',');
                }
                text.push_str(&self.term_text(*argument));
            }
            text.push(')');
        }
        text
    }

    fn aux_kind_bits(&self, predicate: Id) -> u32 {
        match self.aux_meta.get(&predicate) {
            Some(('r', _)) | Some(('n', _)) => Id::PROPERTY_AUX | Id::PROPERTY_EXTERNAL_AUX,
            Some(('i', _)) => Id::PROPERTY_AUX | Id::PROPERTY_EXTERNAL_INPUT_AUX,
            Some(_) => Id::PROPERTY_AUX,
            None => 0,
        }
    }

    /// Intern an ordinary ground atom.
    ///
    /// Panics if the tuple holds a variable.
    pub fn intern_ground_atom(&mut self, tuple: Vec<Id>) -> Id {
        assert!(
            tuple.iter().all(|term| self.term_is_ground(*term)),
            "! Nonground tuple interned as ground"
        );
        if let Some(id) = self.ground_index.get(&tuple) {
            return *id;
        }
        let kind =
            Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_ORDINARY_GROUND | self.aux_kind_bits(tuple[0]);
        let id = Id::new(kind, self.ground_atoms.len() as u32);
        let text = self.atom_text(&tuple);
        self.ground_index.insert(tuple.clone(), id);
        self.by_predicate.entry(tuple[0]).or_default().push(id);
        self.ground_atoms.push(OrdinaryAtom { tuple, text });
        id
    }

    /// Intern an ordinary nonground atom.
    pub fn intern_nonground_atom(&mut self, tuple: Vec<Id>) -> Id {
        if let Some(id) = self.nonground_index.get(&tuple) {
            return *id;
        }
        let kind =
            Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_ORDINARY_NONGROUND | self.aux_kind_bits(tuple[0]);
        let id = Id::new(kind, self.nonground_atoms.len() as u32);
        let text = self.atom_text(&tuple);
        self.nonground_index.insert(tuple.clone(), id);
        self.nonground_atoms.push(OrdinaryAtom { tuple, text });
        id
    }

    /// Intern an ordinary atom under an explicit kind, checking the kind
    /// matches the groundness of the tuple.
    pub fn intern_atom(&mut self, kind: u32, tuple: Vec<Id>) -> Result<Id, RegistryError> {
        let ground = tuple.iter().all(|term| self.term_is_ground(*term));
        let probe = Id::new(kind, 0);
        if probe.is_ordinary_ground_atom() && ground {
            Ok(self.intern_ground_atom(tuple))
        } else if probe.is_ordinary_nonground_atom() && !ground {
            Ok(self.intern_nonground_atom(tuple))
        } else {
            Err(RegistryError::KindMismatch(probe))
        }
    }

    /// The ground atom stored at `address`.
    pub fn ground_atom(&self, address: AtomAddress) -> &OrdinaryAtom {
        &self.ground_atoms[address as usize]
    }

    /// The ordinary atom of `id`, ground or nonground.
    pub fn ordinary_atom(&self, id: Id) -> &OrdinaryAtom {
        assert!(!id.is_fail(), "! Lookup on the fail id");
        assert!(id.is_ordinary_atom());
        if id.is_ordinary_ground_atom() {
            &self.ground_atoms[id.address as usize]
        } else {
            &self.nonground_atoms[id.address as usize]
        }
    }

    /// The id of the ground atom with `tuple`, if interned.
    pub fn ground_atom_id(&self, tuple: &[Id]) -> Option<Id> {
        self.ground_index.get(tuple).copied()
    }

    /// A count of interned ground atoms.
    pub fn ground_atom_count(&self) -> u32 {
        self.ground_atoms.len() as u32
    }

    /// The ids of ground atoms over `predicate`, in interning order.
    pub fn ground_atoms_of(&self, predicate: Id) -> &[Id] {
        self.by_predicate
            .get(&predicate)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// The predicate term of the ground atom at `address`.
    pub fn predicate_of(&self, address: AtomAddress) -> Id {
        self.ground_atom(address).predicate()
    }

    /// The ground atoms over the auxiliary predicate of
    /// `(type_char, payload)`, if that auxiliary constant exists.
    pub fn ground_atoms_of_aux(&self, type_char: char, payload: Id) -> Option<&[Id]> {
        let predicate = self.aux_forward.get(&(type_char, payload))?;
        Some(self.ground_atoms_of(*predicate))
    }

    // Builtin atoms

    /// Intern a builtin atom; the tuple is the operator term followed by
    /// its operands.
    pub fn intern_builtin_atom(&mut self, tuple: Vec<Id>) -> Id {
        assert!(tuple[0].is_builtin_term(), "! Builtin atom without operator");
        if let Some(id) = self.builtin_index.get(&tuple) {
            return *id;
        }
        let id = Id::new(
            Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_BUILTIN,
            self.builtin_atoms.len() as u32,
        );
        let text = self.atom_text(&tuple);
        self.builtin_index.insert(tuple.clone(), id);
        self.builtin_atoms.push(OrdinaryAtom { tuple, text });
        id
    }

    /// The builtin atom stored under `id`.
    pub fn builtin_atom(&self, id: Id) -> &OrdinaryAtom {
        assert!(id.is_builtin_atom());
        &self.builtin_atoms[id.address as usize]
    }

    // Rules

    /// Intern a rule. The returned id carries the rule subkind and the
    /// disjunction / external-atom property flags.
    pub fn intern_rule(&mut self, rule: Rule) -> Id {
        if let Some(id) = self.rule_index.get(&rule) {
            return *id;
        }
        let mut kind = Id::MAINKIND_RULE | rule.subkind();
        if rule.is_disjunctive() {
            kind |= Id::PROPERTY_RULE_DISJUNCTIVE;
        }
        if rule.mentions_external() {
            kind |= Id::PROPERTY_RULE_EXTERNAL;
        }
        if rule.head_guard.is_some() {
            kind |= Id::PROPERTY_RULE_HEADGUARD;
        }
        let id = Id::new(kind, self.rules.len() as u32);
        self.rule_index.insert(rule.clone(), id);
        self.rules.push(rule);
        id
    }

    /// The rule stored under `id`.
    pub fn rule(&self, id: Id) -> &Rule {
        assert!(!id.is_fail(), "! Lookup on the fail id");
        assert!(id.is_rule());
        &self.rules[id.address as usize]
    }

    // External atoms

    /// Intern an external atom.
    pub fn intern_external(&mut self, external: ExternalAtom) -> Id {
        if let Some(id) = self.external_index.get(&external) {
            return *id;
        }
        let id = Id::new(
            Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_EXTERNAL,
            self.externals.len() as u32,
        );
        self.external_index.insert(external.clone(), id);
        self.externals.push(external);
        id
    }

    /// The external atom stored under `id`.
    pub fn external(&self, id: Id) -> &ExternalAtom {
        assert!(!id.is_fail(), "! Lookup on the fail id");
        assert!(id.is_external_atom());
        &self.externals[id.address as usize]
    }

    // Auxiliary space

    /// The reserved constant for `(type_char, payload)`.
    ///
    /// Deterministic: each pair yields a distinct, stable id across the
    /// process lifetime. The constant carries the aux property bit and its
    /// origin is recoverable through [aux_origin](Registry::aux_origin).
    pub fn aux_symbol(&mut self, type_char: char, payload: Id) -> Id {
        if let Some(id) = self.aux_forward.get(&(type_char, payload)) {
            return *id;
        }
        let text = format!("aux_{type_char}_{:x}_{:x}", payload.kind, payload.address);
        let id = self.intern_term(
            Term {
                text,
                shape: TermShape::Constant,
            },
            Id::MAINKIND_TERM | Id::SUBKIND_TERM_CONSTANT | Id::PROPERTY_AUX,
        );
        self.aux_forward.insert((type_char, payload), id);
        self.aux_meta.insert(id, (type_char, payload));
        id
    }

    /// The `(type_char, payload)` pair of an auxiliary constant, if it is
    /// one.
    pub fn aux_origin(&self, id: Id) -> Option<(char, Id)> {
        self.aux_meta.get(&id).copied()
    }

    /// True if the ground atom at `address` is over an auxiliary predicate.
    pub fn is_aux_atom(&self, address: AtomAddress) -> bool {
        self.aux_meta.contains_key(&self.predicate_of(address))
    }

    // Printing

    /// The printable form of an interpretation: ground atoms in braces,
    /// comma separated, in address order.
    pub fn interpretation_text(&self, interpretation: &Interpretation) -> String {
        let mut text = String::from("{");
        for (index, address) in interpretation.iter_true().enumerate() {
            if index > 0 {
                text.push(',');
            }
            text.push_str(&self.ground_atom(address).text);
        }
        text.push('}');
        text
    }

    /// The printable form of a signed literal, `±p(a,b)`.
    pub fn lit_text(&self, literal: Lit) -> String {
        match literal.polarity() {
            true => self.ground_atom(literal.address()).text.clone(),
            false => format!("-{}", self.ground_atom(literal.address()).text),
        }
    }

    /// The canonical dump form of a nogood, `{±p(a,b),…}`.
    pub fn nogood_text(&self, nogood: &crate::structures::Nogood) -> String {
        let mut text = String::from("{");
        for (index, literal) in nogood.literals().iter().enumerate() {
            if index > 0 {
                text.push(',');
            }
            text.push_str(&self.lit_text(*literal));
        }
        text.push('}');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut registry = Registry::default();

        let p = registry.intern_constant("p");
        assert_eq!(p, registry.intern_constant("p"));

        let x = registry.intern_variable("X");
        let atom = registry.intern_nonground_atom(vec![p, x]);
        assert_eq!(atom, registry.intern_nonground_atom(vec![p, x]));
        assert!(atom.is_ordinary_nonground_atom());
    }

    #[test]
    fn kind_checked_interning() {
        let mut registry = Registry::default();
        let p = registry.intern_constant("p");
        let x = registry.intern_variable("X");

        let ground_kind = Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_ORDINARY_GROUND;
        assert!(registry.intern_atom(ground_kind, vec![p, x]).is_err());
        assert!(registry.intern_atom(ground_kind, vec![p, p]).is_ok());
    }

    #[test]
    fn aux_symbols_are_stable_and_distinct() {
        let mut registry = Registry::default();
        let payload_one = Id::new(Id::MAINKIND_ATOM, 1);
        let payload_two = Id::new(Id::MAINKIND_ATOM, 2);

        let r_one = registry.aux_symbol('r', payload_one);
        let r_two = registry.aux_symbol('r', payload_two);
        let n_one = registry.aux_symbol('n', payload_one);

        assert_eq!(r_one, registry.aux_symbol('r', payload_one));
        assert_ne!(r_one, r_two);
        assert_ne!(r_one, n_one);
        assert_eq!(registry.aux_origin(r_one), Some(('r', payload_one)));
    }

    #[test]
    fn replacement_atoms_carry_aux_bits() {
        let mut registry = Registry::default();
        let payload = Id::new(Id::MAINKIND_ATOM | Id::SUBKIND_ATOM_EXTERNAL, 0);
        let replacement_predicate = registry.aux_symbol('r', payload);
        let a = registry.intern_constant("a");

        let atom = registry.intern_ground_atom(vec![replacement_predicate, a]);
        assert!(atom.is_aux());
        assert!(atom.is_external_aux());
        assert!(registry.is_aux_atom(atom.address));
    }

    #[test]
    fn interpretation_text_lists_atoms() {
        let mut registry = Registry::default();
        let p = registry.intern_constant("p");
        let a = registry.intern_constant("a");
        let b = registry.intern_constant("b");

        let pa = registry.intern_ground_atom(vec![p, a]);
        let pb = registry.intern_ground_atom(vec![p, b]);

        let interpretation: Interpretation =
            [pa.address, pb.address].into_iter().collect();
        assert_eq!(registry.interpretation_text(&interpretation), "{p(a),p(b)}");
    }
}
