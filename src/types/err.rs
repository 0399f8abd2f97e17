/*!
Error types used in the library.

- Some of these are internally expected --- e.g. propagation conflicts are
  used to control the flow of a solve and never escape the solver.
- Others mark static programming errors at the ingest boundary, which are
  unrecoverable.
- Oracle protocol errors fail the solve with a diagnostic; the engine does
  not retry oracle calls.

Names of the error enums --- for the most part --- overlap with the
corresponding structs, so `err::{self}` is often used to prefix uses.
*/

use crate::structures::{Id, Lit};

/// A union of varied error kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An error in the registry.
    Registry(RegistryError),

    /// An error at program ingest.
    Ingest(IngestError),

    /// An error during grounding.
    Grounding(GroundingError),

    /// An error in the ground solver.
    Solver(SolverError),

    /// An oracle protocol error.
    Oracle(OracleError),

    /// An error in an unfounded-set check.
    Ufs(UfsError),

    /// Termination was requested; the model stream emitted so far is valid.
    Terminated,
}

/// Errors in the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// An atom was interned under a kind which does not match its tuple.
    KindMismatch(Id),

    /// A lookup was attempted with the fail id.
    LookupFail,
}

impl From<RegistryError> for ErrorKind {
    fn from(e: RegistryError) -> Self {
        ErrorKind::Registry(e)
    }
}

/// Errors at the program-ingest boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestError {
    /// An external atom names an oracle predicate with no registered oracle.
    UnknownOracle(Id),

    /// The output arity of an occurrence does not match the oracle.
    OutputArityMismatch(Id),

    /// An input term does not match the oracle's input-type signature.
    InputTypeMismatch(Id),

    /// A `Tuple` input type occurs before the final position.
    MisplacedTupleInput(Id),

    /// A ground rule holds a raw aggregate atom; aggregates are expected
    /// compiled into weight rules by the front end.
    RawAggregate(Id),

    /// A rule id does not resolve to a rule.
    NotARule(Id),
}

impl From<IngestError> for ErrorKind {
    fn from(e: IngestError) -> Self {
        ErrorKind::Ingest(e)
    }
}

/// Errors during grounding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroundingError {
    /// A rule is unsafe: the variable cannot be bound by the positive body.
    UnsafeVariable(Id),

    /// A builtin was applied to an unbound or non-integer operand.
    BuiltinOperand(Id),

    /// Arithmetic left the integer range [0, maxint].
    IntegerRange,
}

impl From<GroundingError> for ErrorKind {
    fn from(e: GroundingError) -> Self {
        ErrorKind::Grounding(e)
    }
}

/// Errors in the ground solver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolverError {
    /// An inconsistency cause was requested in a state other than
    /// exhaustion.
    NoInconsistency,

    /// A nogood mentions an atom outside the solver's atom space.
    UnknownAtom(Lit),
}

impl From<SolverError> for ErrorKind {
    fn from(e: SolverError) -> Self {
        ErrorKind::Solver(e)
    }
}

/// Oracle protocol errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle failed to answer a query.
    RetrieveFailed(String),

    /// A support set lacked the single replacement literal required.
    InvalidSupportSet,

    /// A learned nogood contradicts the declared properties.
    PropertyViolation(String),
}

impl From<OracleError> for ErrorKind {
    fn from(e: OracleError) -> Self {
        ErrorKind::Oracle(e)
    }
}

/// Errors in an unfounded-set check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UfsError {
    /// The checker's inner solver rejected the encoding.
    Encoding(SolverError),
}

impl From<UfsError> for ErrorKind {
    fn from(e: UfsError) -> Self {
        ErrorKind::Ufs(e)
    }
}
