/*!
The ground solver --- conflict-driven nogood learning over a ground
program.

A [GenericGroundSolver] holds a set of nogoods, an assignment trail, and
the machinery to search for assignments violating no nogood. A ground
program enters through the [encoding](crate::solver::encoding), which
reifies rule bodies, completes atom support, and hands the residual
minimality obligations either to the solver's own ordinary-loop check or
to an external unfounded-set checker via the attached propagator.

At a high level a solve is viewed in terms of a handful of cooperating
stores:
- Nogoods live in a single arena addressed by [NogoodKey]s.
- The valuation lives in a vector of [AtomCell]s.
- Consequences of the current valuation are recorded on the [Trail].

The solver is generic over its source of randomness; the canonical
instantiation [GroundSolver] fixes it to
[MinimalPCG32](crate::generic::minimal_pcg::MinimalPCG32).

# Example

```rust
# use aspex::solver::GroundSolver;
# use aspex::config::SolverConfig;
# use aspex::structures::{Lit, Nogood};
let mut solver = GroundSolver::over_atoms(2, SolverConfig::default());

// Not both 0 and 1.
solver.add_nogood(Nogood::new([Lit::positive(0), Lit::positive(1)]));
// Not neither.
solver.add_nogood(Nogood::new([Lit::negative(0), Lit::negative(1)]));

let mut models = 0;
while let Some(model) = solver.next_model() {
    assert_eq!(model.count(), 1);
    models += 1;
}
assert_eq!(models, 2);
```
*/

pub mod analysis;
pub mod assumptions;
pub mod bcp;
pub mod decision;
pub mod encoding;
pub mod enumerate;

pub use analysis::AnalysisOk;
pub use encoding::ProgramEncoding;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::SolverConfig;
use crate::generic::activity_heap::ActivityHeap;
use crate::generic::luby::Luby;
use crate::generic::minimal_pcg::MinimalPCG32;
use crate::structures::{AtomAddress, Interpretation, Lit, Nogood};

/// A decision/assumption level. Level zero holds proven literals.
pub type LevelIndex = u32;

/// The address of a stored nogood.
pub type NogoodKey = u32;

/// Why an atom holds its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// A free decision.
    Decision,

    /// An assumption installed by [restart_with_assumptions](GenericGroundSolver::restart_with_assumptions).
    Assumption,

    /// Forced by the stored nogood, all of whose other literals were
    /// satisfied.
    Propagated(NogoodKey),
}

/// The valuation cell of one atom.
#[derive(Clone, Debug)]
pub struct AtomCell {
    /// The current value, if any.
    pub value: Option<bool>,

    /// The last value held, for phase saving.
    pub previous: bool,

    /// The level of the current value.
    pub level: LevelIndex,

    /// The source of the current value.
    pub reason: Reason,

    /// Assignments to this atom are barred from free decisions and the
    /// atom carries no support obligation.
    pub frozen: bool,
}

impl Default for AtomCell {
    fn default() -> Self {
        AtomCell {
            value: None,
            previous: false,
            level: 0,
            reason: Reason::Decision,
            frozen: false,
        }
    }
}

/// A stored nogood with its watch positions.
#[derive(Clone, Debug)]
pub struct StoredNogood {
    /// The literals of the nogood.
    pub literals: Vec<Lit>,

    /// True for nogoods learned during search.
    pub learnt: bool,

    /// False once forgotten; inactive nogoods are skipped and their watch
    /// entries dropped lazily.
    pub active: bool,

    /// Activity for the reduction heuristic.
    pub activity: f64,

    /// Index of the first watched literal.
    pub watch_a: usize,

    /// Index of the second watched literal.
    pub watch_b: usize,
}

/// The trail of assignments.
///
/// The first level (level zero) contains proven literals; each greater
/// level begins with an assumption or a decision.
#[derive(Debug, Default)]
pub struct Trail {
    /// Each assignment made, in order.
    pub assignments: Vec<Lit>,

    /// Indices of the initial assignment of each level.
    pub level_indices: Vec<usize>,

    /// The index of the first assignment whose consequences have not been
    /// examined.
    pub q_head: usize,

    /// The first level at which a decision (rather than an assumption) is
    /// made. Zero if no assumption has been made.
    pub initial_decision_level: LevelIndex,
}

impl Trail {
    /// The current level.
    pub fn level(&self) -> LevelIndex {
        self.level_indices.len() as LevelIndex
    }

    /// True if some decision beyond the assumptions is active.
    pub fn decision_is_made(&self) -> bool {
        self.level() > self.initial_decision_level
    }
}

/// The state of a solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    /// Accepting input; no search has begun since the last restart.
    Input,

    /// A search is underway.
    Solving,

    /// The nogoods admit no (further) model.
    Exhausted,
}

/// The outcome of adding a nogood to a live solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored without immediate consequence.
    Added,

    /// Vacuous or a duplicate; not stored.
    Ignored,

    /// Stored, and an assignment was forced.
    Propagated,

    /// Stored and violated by the current assignment.
    Conflict(NogoodKey),

    /// The empty nogood: no assignment is admissible.
    TopConflict,
}

/// Read-only views passed to an attached propagator.
pub struct PropagationView<'s> {
    /// The atoms currently assigned true.
    pub partial: &'s Interpretation,

    /// The atoms currently holding a value.
    pub assigned: &'s Interpretation,

    /// The atoms whose value changed since the previous callback.
    pub changed: &'s Interpretation,
}

/// A callback invoked after each propagation fixpoint.
///
/// The callback may return nogoods to add, including the empty nogood to
/// signal a top-level conflict. Within a single callback `changed` is
/// atomic with respect to `partial`.
pub trait Propagator {
    fn propagate(&mut self, view: &PropagationView) -> Vec<Nogood>;
}

/// A weight-rule body: the reified body atom holds exactly when the
/// satisfied weight reaches the bound.
#[derive(Clone, Debug)]
pub struct WeightBody {
    /// The reified body atom.
    pub beta: AtomAddress,

    /// Weighted body literals.
    pub literals: Vec<(Lit, u64)>,

    /// The bound to reach.
    pub bound: u64,
}

/// A weak-constraint cost entry.
#[derive(Clone, Debug)]
pub struct WeakCost {
    /// The priority level of the penalty.
    pub level: u64,

    /// The penalty incurred when the body holds.
    pub weight: u64,

    /// The body literals.
    pub body: Vec<Lit>,
}

/// A generic ground solver, parameterised to a source of randomness.
pub struct GenericGroundSolver<R: rand::Rng + std::default::Default> {
    /// The configuration of the solver.
    pub config: SolverConfig,

    pub(crate) cells: Vec<AtomCell>,
    pub(crate) watches: Vec<[Vec<NogoodKey>; 2]>,
    pub(crate) nogoods: Vec<StoredNogood>,
    pub(crate) dedup: HashMap<u64, Vec<NogoodKey>>,
    pub(crate) trail: Trail,
    pub(crate) heap: ActivityHeap,
    pub(crate) activity_increment: f64,

    pub(crate) luby: Luby,
    pub(crate) fresh_conflicts: u32,
    pub(crate) total_conflicts: u64,

    pub(crate) assumptions: Vec<Lit>,
    pub(crate) state: SolverState,
    pub(crate) model_found: bool,
    pub(crate) explanation_core: Option<Nogood>,

    /// Atoms assigned true, maintained incrementally.
    pub(crate) true_view: Interpretation,
    /// Atoms holding a value, maintained incrementally.
    pub(crate) assigned_view: Interpretation,
    /// Atoms changed since the last propagator callback.
    pub(crate) changed_view: Interpretation,

    /// Atoms eligible for free decisions. The registry's atom space is
    /// shared across components, so atoms this solver holds no nogood
    /// over stay unassigned and read as false.
    pub(crate) decidable: Interpretation,

    pub(crate) encoding: ProgramEncoding,
    pub(crate) optimum: Option<Vec<u64>>,

    pub(crate) propagator: Option<Rc<RefCell<dyn Propagator>>>,

    pub(crate) terminate: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,

    pub(crate) rng: R,
}

/// The canonical ground solver.
pub type GroundSolver = GenericGroundSolver<MinimalPCG32>;

impl<R: rand::Rng + std::default::Default> GenericGroundSolver<R> {
    /// A solver over `atoms` fresh atoms with no nogoods.
    ///
    /// Used directly by the unfounded-set checkers, whose encodings are
    /// plain nogood sets rather than programs.
    pub fn over_atoms(atoms: usize, config: SolverConfig) -> Self {
        let mut solver = GenericGroundSolver {
            cells: vec![AtomCell::default(); atoms],
            watches: (0..atoms).map(|_| [Vec::new(), Vec::new()]).collect(),
            nogoods: Vec::new(),
            dedup: HashMap::new(),
            trail: Trail::default(),
            heap: ActivityHeap::new(atoms),
            activity_increment: config.activity_bump,
            config,
            luby: Luby::default(),
            fresh_conflicts: 0,
            total_conflicts: 0,
            assumptions: Vec::new(),
            state: SolverState::Input,
            model_found: false,
            explanation_core: None,
            true_view: Interpretation::with_capacity(atoms),
            assigned_view: Interpretation::with_capacity(atoms),
            changed_view: Interpretation::with_capacity(atoms),
            decidable: (0..atoms as u32).collect(),
            encoding: ProgramEncoding::default(),
            optimum: None,
            propagator: None,
            terminate: None,
            rng: R::default(),
        };
        for atom in 0..atoms {
            solver.heap.activate(atom);
        }
        solver
    }

    /// Grow the atom space to `atoms`.
    pub(crate) fn grow_to(&mut self, atoms: usize) {
        while self.cells.len() < atoms {
            self.cells.push(AtomCell::default());
            self.watches.push([Vec::new(), Vec::new()]);
        }
        self.heap.grow_to(atoms);
        for atom in 0..atoms {
            if self.cells[atom].value.is_none() {
                self.heap.activate(atom);
            }
        }
    }

    /// A count of atoms in the solver's space.
    pub fn atom_count(&self) -> usize {
        self.cells.len()
    }

    /// The value of `atom`, if any.
    pub fn value_of(&self, atom: AtomAddress) -> Option<bool> {
        self.cells[atom as usize].value
    }

    /// The value of `literal`: true if satisfied, false if falsified, none
    /// if its atom is unassigned.
    pub fn value_of_lit(&self, literal: Lit) -> Option<bool> {
        self.cells[literal.address() as usize]
            .value
            .map(|value| value == literal.polarity())
    }

    /// The state of the solver.
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Install `propagator`, to be invoked after each propagation fixpoint.
    pub fn attach_propagator(&mut self, propagator: Rc<RefCell<dyn Propagator>>) {
        self.propagator = Some(propagator);
    }

    /// Remove the installed propagator, if any.
    pub fn detach_propagator(&mut self) {
        self.propagator = None;
    }

    /// Install a termination flag, checked between propagation rounds.
    pub fn set_terminate_flag(&mut self, flag: std::sync::Arc<std::sync::atomic::AtomicBool>) {
        self.terminate = Some(flag);
    }

    /// Future models must be strictly better than `weights` on the
    /// lexicographic cost order (higher level takes priority).
    pub fn set_optimum(&mut self, weights: Vec<u64>) {
        self.optimum = Some(weights);
    }

    /// The cost vector of the current total assignment, indexed by level.
    pub fn current_costs(&self) -> Vec<u64> {
        let mut costs: Vec<u64> = Vec::new();
        for entry in &self.encoding.weak_costs {
            let violated = entry
                .body
                .iter()
                .all(|literal| self.value_of_lit(*literal) == Some(true));
            if violated {
                let level = entry.level as usize;
                if costs.len() <= level {
                    costs.resize(level + 1, 0);
                }
                costs[level] += entry.weight;
            }
        }
        costs
    }

    pub(crate) fn assign(&mut self, literal: Lit, reason: Reason) {
        let address = literal.address() as usize;
        debug_assert!(self.cells[address].value.is_none());

        let level = self.trail.level();
        let cell = &mut self.cells[address];
        cell.value = Some(literal.polarity());
        cell.level = level;
        cell.reason = reason;

        self.trail.assignments.push(literal);
        self.assigned_view.set(literal.address());
        if literal.polarity() {
            self.true_view.set(literal.address());
        }
        self.changed_view.set(literal.address());
    }

    pub(crate) fn unassign(&mut self, literal: Lit) {
        let address = literal.address() as usize;
        let cell = &mut self.cells[address];
        cell.previous = cell.value.unwrap_or(cell.previous);
        cell.value = None;

        self.assigned_view.clear(literal.address());
        self.true_view.clear(literal.address());
        self.changed_view.set(literal.address());
        self.heap.activate(address);
    }

    /// Remove levels above `level`, unassigning their literals.
    pub(crate) fn backjump(&mut self, level: LevelIndex) {
        log::trace!(target: crate::misc::log::targets::PROPAGATION, "Backjump to level {level}");
        while self.trail.level() > level {
            let start = self
                .trail
                .level_indices
                .pop()
                .expect("! A level above zero");
            for index in (start..self.trail.assignments.len()).rev() {
                let literal = self.trail.assignments[index];
                self.unassign(literal);
            }
            self.trail.assignments.truncate(start);
        }
        self.trail.q_head = self.trail.q_head.min(self.trail.assignments.len());
    }

    pub(crate) fn bump_atom(&mut self, atom: AtomAddress) {
        let score = self.heap.bump(atom as usize, self.activity_increment);
        if score > 1e100 {
            self.heap.scale_all(1e-100);
            self.activity_increment *= 1e-100;
        }
    }

    pub(crate) fn decay_activity(&mut self) {
        self.activity_increment /= self.config.activity_decay;
    }
}
