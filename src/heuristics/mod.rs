/*!
Heuristics for external-atom evaluation and unfounded-set checks.

Both heuristics only *schedule* work which would otherwise happen at a
complete assignment; they trade oracle calls and checker invocations
against earlier pruning, and choosing badly costs time rather than
correctness.
*/

pub mod eval;
pub use eval::{EvalFrequency, EvalHeuristic};

pub mod ufs;
pub use ufs::{SkipTracker, UfsHeuristic};
