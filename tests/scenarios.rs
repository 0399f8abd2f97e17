//! End-to-end scenarios for the guess-and-check loop.

mod common;

use std::sync::Arc;

use aspex::config::Config;
use aspex::generator::{ComponentInput, ModelGeneratorFactory};
use aspex::oracle::OracleRegistry;
use aspex::structures::{ExtProperties, ExternalAtom, Id, Interpretation, Rule};

use common::{all_answer_texts, complement, fresh_registry, CopyOracle, MemOracle, NonemptyOracle};

#[test]
fn even_guess_emits_both_answer_sets() {
    // { a v -a. }
    let registry = fresh_registry();
    let rule = {
        let mut reg = registry.borrow_mut();
        let a_pred = reg.intern_constant("a");
        let a = reg.intern_ground_atom(vec![a_pred]);
        let not_a = complement(&mut reg, a);
        reg.intern_rule(Rule::regular(vec![a, not_a], vec![]))
    };

    let factory = ModelGeneratorFactory::new(Config::default(), OracleRegistry::default());
    let mut generator = factory
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb: vec![rule],
                maxint: 0,
                inner_eatoms: vec![],
            },
        )
        .expect("well-formed input");

    let texts = all_answer_texts(&mut generator, &registry);
    assert_eq!(texts, vec!["{}".to_owned(), "{a}".to_owned()]);
}

#[test]
fn simple_oracle_copies_the_guess() {
    // d(a) v -d(a).   p(X) :- &id[d](X).
    let registry = fresh_registry();
    let mut oracles = OracleRegistry::default();
    let id_pred = oracles.register(&mut registry.borrow_mut(), Arc::new(CopyOracle::new("id")));

    let (p, a) = {
        let mut reg = registry.borrow_mut();
        (reg.intern_constant("p"), reg.intern_constant("a"))
    };

    let (idb, eatom, da) = {
        let mut reg = registry.borrow_mut();
        let d = reg.intern_constant("d");
        let x = reg.intern_variable("X");

        let da = reg.intern_ground_atom(vec![d, a]);
        let not_da = complement(&mut reg, da);
        let p_x = reg.intern_nonground_atom(vec![p, x]);

        let eatom = reg.intern_external(ExternalAtom {
            predicate: id_pred,
            inputs: vec![d],
            outputs: vec![x],
            aux_input: None,
            properties: ExtProperties::default(),
        });

        let guess = reg.intern_rule(Rule::regular(vec![da, not_da], vec![]));
        let copy = reg.intern_rule(Rule::regular(vec![p_x], vec![Id::literal(eatom)]));
        (vec![guess, copy], eatom, da)
    };

    let factory = ModelGeneratorFactory::new(Config::default(), oracles);
    let mut generator = factory
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb,
                maxint: 0,
                inner_eatoms: vec![eatom],
            },
        )
        .expect("well-formed input");

    let mut interpretations = Vec::new();
    let mut texts = Vec::new();
    while let Some(answer) = generator.next_model() {
        texts.push(answer.text(&registry.borrow()));
        interpretations.push(answer.interpretation);
        assert!(texts.len() < 8, "runaway enumeration");
    }
    texts.sort();

    assert_eq!(texts, vec!["{}".to_owned(), "{d(a),p(a)}".to_owned()]);

    // The oracle's copy semantics hold in every emitted set.
    let pa = registry
        .borrow()
        .ground_atom_id(&[p, a])
        .expect("p(a) interned by grounding");
    for interpretation in &interpretations {
        assert_eq!(
            interpretation.test(da.address),
            interpretation.test(pa.address)
        );
    }
}

#[test]
fn external_cycle_is_rejected_as_non_minimal() {
    // p(a) :- &some[p]().   Only {} is an answer set.
    let registry = fresh_registry();
    let mut oracles = OracleRegistry::default();
    let some_pred =
        oracles.register(&mut registry.borrow_mut(), Arc::new(NonemptyOracle { name: "some" }));

    let (idb, eatom) = {
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

        let rule = reg.intern_rule(Rule::regular(vec![pa], vec![Id::literal(eatom)]));
        (vec![rule], eatom)
    };

    let factory = ModelGeneratorFactory::new(Config::default(), oracles);
    let mut generator = factory
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb,
                maxint: 0,
                inner_eatoms: vec![eatom],
            },
        )
        .expect("well-formed input");

    let texts = all_answer_texts(&mut generator, &registry);
    assert_eq!(texts, vec!["{}".to_owned()]);
}

#[test]
fn head_cycle_disjunction_needs_the_checker() {
    // a v b.  a :- b.  b :- a.   Exactly {a,b}, once.
    let registry = fresh_registry();
    let idb = {
        let mut reg = registry.borrow_mut();
        let a_pred = reg.intern_constant("a");
        let b_pred = reg.intern_constant("b");
        let a = reg.intern_ground_atom(vec![a_pred]);
        let b = reg.intern_ground_atom(vec![b_pred]);

        vec![
            reg.intern_rule(Rule::regular(vec![a, b], vec![])),
            reg.intern_rule(Rule::regular(vec![a], vec![Id::literal(b)])),
            reg.intern_rule(Rule::regular(vec![b], vec![Id::literal(a)])),
        ]
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

    let texts = all_answer_texts(&mut generator, &registry);
    assert_eq!(texts, vec!["{a,b}".to_owned()]);
}

#[test]
fn transitive_unit_learning_propagates_the_cause() {
    // Unit one guesses d(a) v -d(a); unit two carries :- &some[d]().
    // The inconsistency of unit two under {d(a)} teaches unit one to
    // never emit it again.
    let registry = fresh_registry();
    let mut oracles = OracleRegistry::default();
    let some_pred =
        oracles.register(&mut registry.borrow_mut(), Arc::new(NonemptyOracle { name: "some" }));

    let (guess_rule, da) = {
        let mut reg = registry.borrow_mut();
        let d = reg.intern_constant("d");
        let a = reg.intern_constant("a");
        let da = reg.intern_ground_atom(vec![d, a]);
        let not_da = complement(&mut reg, da);
        (reg.intern_rule(Rule::regular(vec![da, not_da], vec![])), da)
    };

    let (constraint, eatom) = {
        let mut reg = registry.borrow_mut();
        let d = reg.intern_constant("d");
        let eatom = reg.intern_external(ExternalAtom {
            predicate: some_pred,
            inputs: vec![d],
            outputs: vec![],
            aux_input: None,
            properties: ExtProperties::default(),
        });
        (
            reg.intern_rule(Rule::constraint(vec![Id::literal(eatom)])),
            eatom,
        )
    };

    let mut unit_one = ModelGeneratorFactory::new(Config::default(), OracleRegistry::default());
    let unit_two = ModelGeneratorFactory::new(Config::default(), oracles);

    // First pass of unit one: both guesses appear.
    let mut generator_one = unit_one
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb: vec![guess_rule],
                maxint: 0,
                inner_eatoms: vec![],
            },
        )
        .expect("well-formed input");

    let mut cause = None;
    let mut first_pass = Vec::new();
    while let Some(answer) = generator_one.next_model() {
        first_pass.push(answer.interpretation.clone());

        // Feed the output into unit two.
        let mut generator_two = unit_two
            .create(
                registry.clone(),
                ComponentInput {
                    edb: answer.interpretation.clone(),
                    idb: vec![constraint],
                    maxint: 0,
                    inner_eatoms: vec![eatom],
                },
            )
            .expect("well-formed input");

        if answer.interpretation.test(da.address) {
            assert!(generator_two.next_model().is_none());
            cause = generator_two.inconsistency_cause().cloned();
        } else {
            assert!(generator_two.next_model().is_some());
        }
    }
    assert_eq!(first_pass.len(), 2);

    // The cause is exactly {d(a)}.
    let cause = cause.expect("an inconsistency cause for {d(a)}");
    assert_eq!(cause.len(), 1);
    assert!(cause.mentions(da.address));

    // A regenerated unit one never emits {d(a)} again.
    unit_one.add_inconsistency_cause_from_successor(&cause);
    let mut regenerated = unit_one
        .create(
            registry.clone(),
            ComponentInput {
                edb: Interpretation::new(),
                idb: vec![guess_rule],
                maxint: 0,
                inner_eatoms: vec![],
            },
        )
        .expect("well-formed input");

    let texts = all_answer_texts(&mut regenerated, &registry);
    assert_eq!(texts, vec!["{}".to_owned()]);
}

#[test]
fn support_set_inlining_preserves_answer_sets() {
    // d(a) v -d(a).  q(X) :- &mem[d](X).
    let registry = fresh_registry();
    let mut oracles = OracleRegistry::default();
    let mem_pred =
        oracles.register(&mut registry.borrow_mut(), Arc::new(MemOracle { name: "mem" }));

    let (idb, eatom) = {
        let mut reg = registry.borrow_mut();
        let d = reg.intern_constant("d");
        let q = reg.intern_constant("q");
        let a = reg.intern_constant("a");
        let x = reg.intern_variable("X");

        let da = reg.intern_ground_atom(vec![d, a]);
        let not_da = complement(&mut reg, da);
        let q_x = reg.intern_nonground_atom(vec![q, x]);

        let eatom = reg.intern_external(ExternalAtom {
            predicate: mem_pred,
            inputs: vec![d],
            outputs: vec![x],
            aux_input: None,
            properties: ExtProperties::default(),
        });

        let guess = reg.intern_rule(Rule::regular(vec![da, not_da], vec![]));
        let derive = reg.intern_rule(Rule::regular(vec![q_x], vec![Id::literal(eatom)]));
        (vec![guess, derive], eatom)
    };

    let input = ComponentInput {
        edb: Interpretation::new(),
        idb,
        maxint: 0,
        inner_eatoms: vec![eatom],
    };

    let plain_factory = ModelGeneratorFactory::new(Config::default(), oracles.clone());
    let mut plain = plain_factory
        .create(registry.clone(), input.clone())
        .expect("well-formed input");
    let plain_texts = all_answer_texts(&mut plain, &registry);

    let mut inline_config = Config::default();
    inline_config.inline_support_sets = true;
    let inline_factory = ModelGeneratorFactory::new(inline_config, oracles);
    let mut inlined = inline_factory
        .create(registry.clone(), input)
        .expect("well-formed input");
    let inlined_texts = all_answer_texts(&mut inlined, &registry);

    assert_eq!(plain_texts, vec!["{}".to_owned(), "{d(a),q(a)}".to_owned()]);
    assert_eq!(plain_texts, inlined_texts);
}
