/*!
Programs.

A program pairs an EDB (facts, as an interpretation over ground atom
addresses) with an IDB (a sequence of rule ids). The same structure holds
nonground component programs before grounding and ground programs after;
the rule ids tell the two apart.
*/

use crate::structures::{Id, Interpretation};

/// An EDB paired with an IDB.
#[derive(Clone, Debug, Default)]
pub struct Program {
    /// Ground facts.
    pub edb: Interpretation,

    /// Rule ids.
    pub idb: Vec<Id>,
}

impl Program {
    pub fn new(edb: Interpretation, idb: Vec<Id>) -> Self {
        Program { edb, idb }
    }
}
