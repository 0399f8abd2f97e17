/*!
The abstract elements of a solve and their representation.

- [Id]s tag and address every object.
- [Term]s, [OrdinaryAtom]s, [ExternalAtom]s, and [Rule]s are the stored
  objects, owned by the [registry](crate::registry).
- [Interpretation]s are dense bitsets over ground-atom addresses.
- [Lit]s and [Nogood]s are the currency of the solver;
  [NogoodTemplate]s their nonground counterpart.
- [Program]s pair an EDB with an IDB; [AnswerSet]s are projected models.
*/

pub mod id;
pub use id::{Id, IdAddress, IdKind, TermBuiltin};

pub mod term;
pub use term::{Term, TermShape};

pub mod atom;
pub use atom::OrdinaryAtom;

pub mod external;
pub use external::{AuxInput, ExtProperties, ExternalAtom};

pub mod rule;
pub use rule::{Rule, WeakAnnotation};

pub mod literal;
pub use literal::{AtomAddress, Lit};

pub mod nogood;
pub use nogood::{Nogood, NogoodTemplate};

pub mod interpretation;
pub use interpretation::Interpretation;

pub mod program;
pub use program::Program;

pub mod answer_set;
pub use answer_set::AnswerSet;
