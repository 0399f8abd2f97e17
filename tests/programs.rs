//! Program-level behaviour beyond the core scenarios: dependency
//! annotation, weight rules, and weak-constraint costs.

mod common;

use std::sync::Arc;

use aspex::annotated::AnnotatedProgram;
use aspex::config::Config;
use aspex::generator::{ComponentInput, ModelGeneratorFactory};
use aspex::oracle::OracleRegistry;
use aspex::structures::{ExtProperties, ExternalAtom, Id, Interpretation, Program, Rule};

use common::{complement, fresh_registry, NonemptyOracle};

#[test]
fn head_cycles_are_flagged_per_component() {
    let registry = fresh_registry();
    let mut reg = registry.borrow_mut();

    let a = {
        let p = reg.intern_constant("a");
        reg.intern_ground_atom(vec![p])
    };
    let b = {
        let p = reg.intern_constant("b");
        reg.intern_ground_atom(vec![p])
    };

    let idb = vec![
        reg.intern_rule(Rule::regular(vec![a, b], vec![])),
        reg.intern_rule(Rule::regular(vec![a], vec![Id::literal(b)])),
        reg.intern_rule(Rule::regular(vec![b], vec![Id::literal(a)])),
    ];

    let annotated = AnnotatedProgram::new(
        &reg,
        &OracleRegistry::default(),
        Program::new(Interpretation::new(), idb),
        &[],
        true,
    );

    assert!(annotated.head_cycle);
    assert!(!annotated.external_cycle);
    assert!(!annotated.minimality_is_trivial());
    assert_eq!(
        annotated.scc_of[&a.address],
        annotated.scc_of[&b.address]
    );
}

#[test]
fn external_cycles_are_flagged_through_e_edges() {
    let registry = fresh_registry();
    let mut oracles = OracleRegistry::default();
    let some_pred =
        oracles.register(&mut registry.borrow_mut(), Arc::new(NonemptyOracle { name: "some" }));

    let mut reg = registry.borrow_mut();
    let p = reg.intern_constant("p");
    let a = reg.intern_constant("a");
    let pa = reg.intern_ground_atom(vec![p, a]);

    let eatom = reg.intern_external(ExternalAtom {
        predicate: some_pred,
        inputs: vec![p],
        outputs: vec![],
        aux_input: None,
        properties: ExtProperties::default(),
    });

    // The ground shape after guessing: p(a) :- r(p).  r(p) v n(p).
    let r_pred = reg.aux_symbol('r', eatom);
    let n_pred = reg.aux_symbol('n', eatom);
    let r = reg.intern_ground_atom(vec![r_pred, p]);
    let n = reg.intern_ground_atom(vec![n_pred, p]);

    let idb = vec![
        reg.intern_rule(Rule::regular(vec![pa], vec![Id::literal(r)])),
        reg.intern_rule(Rule::regular(vec![r, n], vec![])),
    ];

    let annotated = AnnotatedProgram::new(
        &reg,
        &oracles,
        Program::new(Interpretation::new(), idb),
        &[eatom],
        true,
    );

    assert!(annotated.external_cycle);
    assert!(!annotated.minimality_is_trivial());
    assert_eq!(annotated.eatoms.len(), 1);
    assert!(annotated.eatoms[0].input_mask.test(pa.address));
    assert_eq!(
        annotated.eatom_of_replacement(r.address),
        Some((0, true))
    );
    assert_eq!(
        annotated.eatom_of_replacement(n.address),
        Some((0, false))
    );
}

#[test]
fn antimonotonic_inputs_prune_the_e_edge() {
    let registry = fresh_registry();
    let mut oracles = OracleRegistry::default();
    let some_pred =
        oracles.register(&mut registry.borrow_mut(), Arc::new(NonemptyOracle { name: "some" }));

    let mut reg = registry.borrow_mut();
    let p = reg.intern_constant("p");
    let a = reg.intern_constant("a");
    let pa = reg.intern_ground_atom(vec![p, a]);

    let mut properties = ExtProperties::default();
    properties.antimonotonic.insert(0);
    let eatom = reg.intern_external(ExternalAtom {
        predicate: some_pred,
        inputs: vec![p],
        outputs: vec![],
        aux_input: None,
        properties,
    });

    let r_pred = reg.aux_symbol('r', eatom);
    let n_pred = reg.aux_symbol('n', eatom);
    let r = reg.intern_ground_atom(vec![r_pred, p]);
    let n = reg.intern_ground_atom(vec![n_pred, p]);

    let idb = vec![
        reg.intern_rule(Rule::regular(vec![pa], vec![Id::literal(r)])),
        reg.intern_rule(Rule::regular(vec![r, n], vec![])),
    ];

    let annotated = AnnotatedProgram::new(
        &reg,
        &oracles,
        Program::new(Interpretation::new(), idb.clone()),
        &[eatom],
        true,
    );
    // The antimonotonic parameter cannot source a non-monotone cycle.
    assert!(!annotated.external_cycle);

    // With the filter off the cycle is kept.
    let unfiltered = AnnotatedProgram::new(
        &reg,
        &oracles,
        Program::new(Interpretation::new(), idb),
        &[eatom],
        false,
    );
    assert!(unfiltered.external_cycle);
}

#[test]
fn weight_rules_fire_at_the_bound() {
    // b v -b.  c v -c.  a :- 2 <= { b=1, c=1 }.
    let registry = fresh_registry();
    let (idb, a, b, c) = {
        let mut reg = registry.borrow_mut();
        let a = {
            let p = reg.intern_constant("a");
            reg.intern_ground_atom(vec![p])
        };
        let b = {
            let p = reg.intern_constant("b");
            reg.intern_ground_atom(vec![p])
        };
        let c = {
            let p = reg.intern_constant("c");
            reg.intern_ground_atom(vec![p])
        };
        let not_b = complement(&mut reg, b);
        let not_c = complement(&mut reg, c);

        let idb = vec![
            reg.intern_rule(Rule::regular(vec![b, not_b], vec![])),
            reg.intern_rule(Rule::regular(vec![c, not_c], vec![])),
            reg.intern_rule(Rule::weight(
                vec![a],
                vec![(Id::literal(b), 1), (Id::literal(c), 1)],
                2,
            )),
        ];
        (idb, a, b, c)
    };

    let factory = ModelGeneratorFactory::new(Config::default(), OracleRegistry::default());
    let mut generator = factory
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb,
                maxint: 0,
                inner_eatoms: vec![],
            },
        )
        .expect("well-formed input");

    let mut models = 0;
    while let Some(answer) = generator.next_model() {
        let i = &answer.interpretation;
        assert_eq!(i.test(a.address), i.test(b.address) && i.test(c.address));
        models += 1;
        assert!(models <= 4, "runaway enumeration");
    }
    assert_eq!(models, 4);
}

#[test]
fn weak_constraints_cost_the_answer() {
    // b v -b.  :~ b. [2:1]
    let registry = fresh_registry();
    let (idb, b) = {
        let mut reg = registry.borrow_mut();
        let b = {
            let p = reg.intern_constant("b");
            reg.intern_ground_atom(vec![p])
        };
        let not_b = complement(&mut reg, b);

        let idb = vec![
            reg.intern_rule(Rule::regular(vec![b, not_b], vec![])),
            reg.intern_rule(Rule::weak_constraint(vec![Id::literal(b)], 2, 1, vec![])),
        ];
        (idb, b)
    };

    let factory = ModelGeneratorFactory::new(Config::default(), OracleRegistry::default());
    let mut generator = factory
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb,
                maxint: 0,
                inner_eatoms: vec![],
            },
        )
        .expect("well-formed input");

    let mut costed = Vec::new();
    while let Some(answer) = generator.next_model() {
        let violated = answer.interpretation.test(b.address);
        let expected = match violated {
            true => vec![0, 2],
            false => vec![],
        };
        assert_eq!(answer.weights, expected);
        costed.push(answer.text(&registry.borrow()));
        assert!(costed.len() <= 2, "runaway enumeration");
    }
    assert_eq!(costed.len(), 2);
}
