/*!
The oracle interface.

An oracle evaluates one external predicate. The engine exchanges only ids
and interpretations across this boundary: a query bundles the concrete
input tuple, the output pattern, and the current interpretation projected
to the atom's scope; the answer lists output tuples which hold, output
tuples which may yet hold under some completion of a partial assignment,
and optionally nogoods justifying the answer. Any returned nogood must be
valid under all completions of the given partial assignment.

Oracles are registered against their predicate symbol in an
[OracleRegistry], which also validates occurrences at ingest. Oracles are
shared behind [Arc] and must be thread-safe (or externally serialised)
when the asynchronous generator is used.
*/

pub mod cache;
pub use cache::QueryCache;

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::Registry;
use crate::structures::{ExtProperties, Id, Interpretation, NogoodTemplate};
use crate::types::err::{IngestError, OracleError};

/// The type of one input position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputType {
    /// A predicate whose extension feeds the oracle.
    Predicate,

    /// A plain constant.
    Constant,

    /// A variable-length tail of constants; at most one, in the final
    /// position.
    Tuple,
}

/// The output arity of an oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputArity {
    Fixed(usize),
    Variable,
}

/// A query to an oracle.
pub struct OracleQuery<'q> {
    /// The external atom queried.
    pub eatom: Id,

    /// The concrete input tuple.
    pub input: &'q [Id],

    /// The output pattern; variables allowed.
    pub pattern: &'q [Id],

    /// The current interpretation, projected to the scope of the atom.
    pub interpretation: &'q Interpretation,

    /// The currently assigned atoms, projected likewise. Absent for total
    /// queries.
    pub assigned: Option<&'q Interpretation>,

    /// The atoms changed since the last query to this atom; provided only
    /// to oracles which care about change.
    pub changed: Option<&'q Interpretation>,
}

/// An oracle's answer.
#[derive(Clone, Debug, Default)]
pub struct OracleAnswer {
    /// Output tuples which hold under the queried assignment.
    pub positive: Vec<Vec<Id>>,

    /// Output tuples which may hold under some completion of the queried
    /// partial assignment.
    pub unknown: Vec<Vec<Id>>,

    /// Nogoods justifying the answer.
    pub nogoods: Vec<NogoodTemplate>,
}

/// One external source.
pub trait Oracle {
    /// The predicate symbol the oracle answers for.
    fn predicate(&self) -> &str;

    /// The input-type sequence.
    fn input_types(&self) -> &[InputType];

    /// The output arity.
    fn output_arity(&self) -> OutputArity;

    /// The global property block of the source.
    fn properties(&self) -> ExtProperties {
        ExtProperties::default()
    }

    /// Evaluate a query.
    fn retrieve(
        &self,
        registry: &Registry,
        query: &OracleQuery,
    ) -> Result<OracleAnswer, OracleError>;

    /// Produce support sets for the queried atom; called once during
    /// initialisation when the source advertises
    /// `provides_support_sets`. The registry is mutable so templates may
    /// intern the nonground atoms they mention.
    fn learn_support_sets(
        &self,
        _registry: &mut Registry,
        _query: &OracleQuery,
    ) -> Result<Vec<NogoodTemplate>, OracleError> {
        Ok(Vec::new())
    }

    /// Validate a cached support set at runtime: return the set to keep
    /// it (possibly shrunken), or none to drop it.
    fn guard_support_set(
        &self,
        _registry: &Registry,
        nogood: &NogoodTemplate,
    ) -> Option<NogoodTemplate> {
        Some(nogood.clone())
    }

    /// Declare an input atom independent of the oracle's output, allowing
    /// the dependency graph to prune the e-edge to it. The declaration is
    /// trusted without validation.
    fn relevant_input_atom(
        &self,
        _registry: &Registry,
        _eatom: &crate::structures::ExternalAtom,
        _input_atom: crate::structures::AtomAddress,
    ) -> bool {
        true
    }
}

/// A shared oracle handle.
pub type OracleHandle = Arc<dyn Oracle + Send + Sync>;

/// Registered oracles, by predicate term.
#[derive(Clone, Default)]
pub struct OracleRegistry {
    oracles: HashMap<Id, OracleHandle>,
}

impl OracleRegistry {
    /// Register `oracle`, interning its predicate symbol.
    ///
    /// Panics if the input signature places a `Tuple` anywhere but last:
    /// a malformed signature is a plugin programming error.
    pub fn register(&mut self, registry: &mut Registry, oracle: OracleHandle) -> Id {
        let types = oracle.input_types();
        for (position, input_type) in types.iter().enumerate() {
            assert!(
                *input_type != InputType::Tuple || position + 1 == types.len(),
                "! Tuple input before the final position"
            );
        }
        let predicate = registry.intern_constant(oracle.predicate());
        self.oracles.insert(predicate, oracle);
        predicate
    }

    /// The oracle for `predicate`, if registered.
    pub fn get(&self, predicate: Id) -> Option<&OracleHandle> {
        self.oracles.get(&predicate)
    }

    /// The input types declared for `predicate`.
    pub fn input_types(&self, predicate: Id) -> Option<Vec<InputType>> {
        self.oracles
            .get(&predicate)
            .map(|oracle| oracle.input_types().to_vec())
    }

    /// Validate an external-atom occurrence against its oracle.
    pub fn validate(&self, registry: &Registry, eatom: Id) -> Result<(), IngestError> {
        let external = registry.external(eatom);
        let oracle = self
            .get(external.predicate)
            .ok_or(IngestError::UnknownOracle(external.predicate))?;

        match oracle.output_arity() {
            OutputArity::Fixed(arity) if arity != external.outputs.len() => {
                return Err(IngestError::OutputArityMismatch(eatom));
            }
            _ => {}
        }

        let types = oracle.input_types();
        let tuple_tail = types.last() == Some(&InputType::Tuple);
        if !tuple_tail && external.inputs.len() != types.len() {
            return Err(IngestError::InputTypeMismatch(eatom));
        }

        for (position, term) in external.inputs.iter().enumerate() {
            let declared = types
                .get(position)
                .copied()
                .unwrap_or(*types.last().ok_or(IngestError::InputTypeMismatch(eatom))?);
            match declared {
                InputType::Predicate => {
                    if !term.is_constant_term() {
                        return Err(IngestError::InputTypeMismatch(eatom));
                    }
                }
                InputType::Constant | InputType::Tuple => {
                    if term.is_builtin_term() {
                        return Err(IngestError::InputTypeMismatch(eatom));
                    }
                }
            }
        }

        Ok(())
    }

    /// The merged properties of an occurrence: occurrence-level
    /// declarations layered over the oracle's global block by union.
    pub fn merged_properties(&self, registry: &Registry, eatom: Id) -> ExtProperties {
        let external = registry.external(eatom);
        let mut properties = match self.get(external.predicate) {
            Some(oracle) => oracle.properties(),
            None => ExtProperties::default(),
        };
        properties.merge(&external.properties);
        properties
    }
}
