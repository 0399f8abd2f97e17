/*!
Configuration of the engine.

A [Config] aggregates the solver, learning, and check sub-configurations
together with the heuristic selections. The default configuration matches
the behaviour exercised by the test suite: eager external-atom evaluation,
post-hoc unfounded-set checks, and the assumption-based checker.
*/

/// When to evaluate an external atom under a partial assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalHeuristicKind {
    /// Evaluate on every opportunity.
    Always,

    /// Evaluate only when forced, i.e. when the scope is fully assigned.
    Never,

    /// Evaluate every `n`th opportunity.
    Periodic(u32),

    /// Evaluate once the scope of the atom is fully assigned.
    InputComplete,
}

/// When to run an unfounded-set check under a partial assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UfsHeuristicKind {
    /// Only on complete assignments.
    Post,

    /// As soon as the skip program allows.
    Max,

    /// Every `n`th propagation with progress.
    Periodic(u32),
}

/// Which unfounded-set checker to instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UfsVariant {
    /// A fresh encoding per candidate.
    Encoding,

    /// One static encoding per component, re-solved under assumptions.
    Assumption,
}

/// Which nogood to learn from a found unfounded set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UfsNogoodKind {
    /// Encode the unfounded set directly.
    UfsBased,

    /// Encode unfoundedness in the reduct.
    ReductBased,
}

/// Switches for nogood learning from oracle behaviour.
#[derive(Clone, Copy, Debug)]
pub struct LearningConfig {
    /// Learn from input/output behaviour of answered queries.
    pub io_behaviour: bool,

    /// Learn from declared functionality.
    pub functionality: bool,

    /// Split queries by declared linearity before answering.
    pub linearity: bool,

    /// Generalise learned nogoods over name-irrelevant positions into
    /// templates.
    pub generalise: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            io_behaviour: true,
            functionality: true,
            linearity: true,
            generalise: true,
        }
    }
}

/// Configuration of the ground solver.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// The `u` value the luby sequence is multiplied by when scheduling
    /// restarts.
    pub luby_u: u32,

    /// Permit scheduled restarts.
    pub restarts: bool,

    /// The probability of assigning positive polarity to an atom when
    /// freely deciding.
    pub polarity_lean: f64,

    /// Default to the last value of an atom when deciding on it.
    pub phase_saving: bool,

    /// Bump applied to atom activity on conflict participation.
    pub activity_bump: f64,

    /// Decay factor applied to atom activity after each conflict.
    pub activity_decay: f64,

    /// Reduce the learnt store once it exceeds this many nogoods.
    /// Zero disables reduction.
    pub reduction_limit: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            luby_u: 128,
            restarts: true,
            polarity_lean: 0.0,
            phase_saving: true,
            activity_bump: 1.0,
            activity_decay: 0.95,
            reduction_limit: 0,
        }
    }
}

/// The primary configuration structure.
#[derive(Clone, Debug)]
pub struct Config {
    /// Configuration of the ground solver.
    pub solver: SolverConfig,

    /// Configuration of oracle-behaviour learning.
    pub learning: LearningConfig,

    /// The external-atom evaluation heuristic.
    pub eval_heuristic: EvalHeuristicKind,

    /// The unfounded-set check heuristic.
    pub ufs_heuristic: UfsHeuristicKind,

    /// The unfounded-set checker variant.
    pub ufs_variant: UfsVariant,

    /// The unfounded-set nogood flavour.
    pub ufs_nogoods: UfsNogoodKind,

    /// Skip the minimality check for components without external cycles.
    pub flp_decision_criterion: bool,

    /// Drop e-edges justified by declared (anti)monotonicity.
    pub monotonicity_edge_filter: bool,

    /// Learn support sets from willing oracles at initialisation.
    pub support_sets: bool,

    /// Replace external atoms with complete support sets by ordinary rules.
    pub inline_support_sets: bool,

    /// Run inconsistency analysis when the first model query exhausts.
    pub transitive_unit_learning: bool,

    /// Nogoods kept in the learned store before forgetting; zero is
    /// unbounded.
    pub nogood_budget: usize,

    /// Capacity of the candidate queue of the asynchronous generator.
    pub async_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            solver: SolverConfig::default(),
            learning: LearningConfig::default(),
            eval_heuristic: EvalHeuristicKind::Always,
            ufs_heuristic: UfsHeuristicKind::Post,
            ufs_variant: UfsVariant::Assumption,
            ufs_nogoods: UfsNogoodKind::UfsBased,
            flp_decision_criterion: true,
            monotonicity_edge_filter: true,
            support_sets: true,
            inline_support_sets: false,
            transitive_unit_learning: true,
            nogood_budget: 0,
            async_queue_capacity: 16,
        }
    }
}
