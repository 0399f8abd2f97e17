/*!
Miscellaneous items related to [logging](log).

Calls to the log macro are made throughout the library.
No log implementation is provided; for details, see [log].
*/

/// Targets to be used within a [log]! macro.
pub mod targets {
    /// Logs related to nogood propagation in the ground solver.
    pub const PROPAGATION: &str = "propagation";

    /// Logs related to conflict analysis.
    pub const ANALYSIS: &str = "analysis";

    /// Logs related to grounding.
    pub const GROUNDING: &str = "grounding";

    /// Logs related to external-atom verification.
    pub const VERIFICATION: &str = "verification";

    /// Logs related to nogood learning from oracle behaviour.
    pub const LEARNING: &str = "learning";

    /// Logs related to unfounded-set checks.
    pub const UFS: &str = "ufs";

    /// Logs related to the model generator loop.
    pub const GENERATOR: &str = "generator";

    /// Logs related to the nogood store.
    pub const NOGOOD_DB: &str = "nogood_db";

    /// Logs related to inconsistency analysis.
    pub const INCONSISTENCY: &str = "inconsistency";
}
