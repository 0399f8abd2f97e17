//! The ground solver on bare nogoods: propagation, conflict analysis,
//! enumeration, assumptions, and cores.

use aspex::config::SolverConfig;
use aspex::solver::GroundSolver;
use aspex::structures::{Lit, Nogood};

#[test]
fn unit_propagation_settles_a_chain() {
    let mut solver = GroundSolver::over_atoms(4, SolverConfig::default());

    // 0 true; 0 → 1 → 2 → 3 (as nogoods).
    solver.add_nogood(Nogood::new([Lit::negative(0)]));
    solver.add_nogood(Nogood::new([Lit::positive(0), Lit::negative(1)]));
    solver.add_nogood(Nogood::new([Lit::positive(1), Lit::negative(2)]));
    solver.add_nogood(Nogood::new([Lit::positive(2), Lit::negative(3)]));

    let model = solver.next_model().expect("satisfiable");
    for atom in 0..4 {
        assert!(model.test(atom));
    }
}

#[test]
fn contradictory_units_exhaust() {
    let mut solver = GroundSolver::over_atoms(1, SolverConfig::default());

    solver.add_nogood(Nogood::new([Lit::negative(0)]));
    solver.add_nogood(Nogood::new([Lit::positive(0)]));

    assert!(solver.next_model().is_none());
}

#[test]
fn enumeration_is_exhaustive_and_repetition_free() {
    // Three free atoms, no constraints: eight models.
    let mut solver = GroundSolver::over_atoms(3, SolverConfig::default());
    solver.add_nogood(Nogood::new([
        Lit::positive(0),
        Lit::positive(1),
        Lit::positive(2),
    ]));

    let mut seen = std::collections::HashSet::new();
    while let Some(model) = solver.next_model() {
        let key: Vec<bool> = (0..3).map(|atom| model.test(atom)).collect();
        assert!(seen.insert(key), "model repeated");
        assert!(seen.len() <= 7, "runaway enumeration");
    }
    assert_eq!(seen.len(), 7);
}

#[test]
fn conflict_analysis_learns_and_continues() {
    // A small pigeonhole-flavoured instance: atoms 0..4, nogoods carving
    // the space so search must backtrack.
    let mut solver = GroundSolver::over_atoms(4, SolverConfig::default());
    solver.add_nogood(Nogood::new([Lit::negative(0), Lit::negative(1)]));
    solver.add_nogood(Nogood::new([Lit::positive(0), Lit::positive(1)]));
    solver.add_nogood(Nogood::new([Lit::negative(2), Lit::negative(3)]));
    solver.add_nogood(Nogood::new([Lit::positive(2), Lit::positive(3)]));
    solver.add_nogood(Nogood::new([Lit::positive(0), Lit::positive(2)]));

    let mut models = 0;
    while let Some(model) = solver.next_model() {
        // Exactly one of each pair, never 0 and 2 together.
        assert_ne!(model.test(0), model.test(1));
        assert_ne!(model.test(2), model.test(3));
        assert!(!(model.test(0) && model.test(2)));
        models += 1;
        assert!(models <= 3, "runaway enumeration");
    }
    assert_eq!(models, 3);
}

#[test]
fn assumptions_bound_the_models() {
    let mut solver = GroundSolver::over_atoms(2, SolverConfig::default());
    solver.add_nogood(Nogood::new([Lit::positive(0), Lit::positive(1)]));

    solver.restart_with_assumptions(vec![Lit::positive(0)]);
    while let Some(model) = solver.next_model() {
        assert!(model.test(0));
        assert!(!model.test(1));
    }

    // The same solver, re-solved under the opposite assumption.
    solver.restart_with_assumptions(vec![Lit::negative(0)]);
    let model = solver.next_model().expect("satisfiable");
    assert!(!model.test(0));
}

#[test]
fn inconsistency_cause_names_the_guilty_assumptions() {
    let mut solver = GroundSolver::over_atoms(3, SolverConfig::default());

    // 0 and 1 together are impossible; 2 is free.
    solver.add_nogood(Nogood::new([Lit::positive(0), Lit::positive(1)]));

    solver.restart_with_assumptions(vec![
        Lit::positive(0),
        Lit::positive(1),
        Lit::positive(2),
    ]);
    assert!(solver.next_model().is_none());

    let cause = solver
        .inconsistency_cause(&[0, 1, 2])
        .expect("a cause after exhaustion");
    assert!(cause.mentions(0));
    assert!(cause.mentions(1));
    assert!(!cause.mentions(2));
}

#[test]
fn cause_requires_exhaustion() {
    let mut solver = GroundSolver::over_atoms(1, SolverConfig::default());
    assert!(solver.next_model().is_some());
    assert!(solver.inconsistency_cause(&[0]).is_err());
}
