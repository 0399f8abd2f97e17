//! Shared fixtures: small oracles and program-building helpers.

// Each test target compiles its own copy; not every target uses every
// fixture.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use aspex::oracle::{InputType, Oracle, OracleAnswer, OracleQuery, OutputArity};
use aspex::registry::Registry;
use aspex::structures::{ExtProperties, Id, NogoodTemplate};
use aspex::types::err::OracleError;

/// `&id[P](X)` --- copies the extension of its predicate input.
pub struct CopyOracle {
    pub name: &'static str,
    pub properties: ExtProperties,
}

impl CopyOracle {
    pub fn new(name: &'static str) -> Self {
        CopyOracle {
            name,
            properties: ExtProperties::default(),
        }
    }
}

impl Oracle for CopyOracle {
    fn predicate(&self) -> &str {
        self.name
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }

    fn output_arity(&self) -> OutputArity {
        OutputArity::Fixed(1)
    }

    fn properties(&self) -> ExtProperties {
        self.properties.clone()
    }

    fn retrieve(
        &self,
        registry: &Registry,
        query: &OracleQuery,
    ) -> Result<OracleAnswer, OracleError> {
        let mut answer = OracleAnswer::default();
        for atom in query.interpretation.iter_true() {
            answer
                .positive
                .push(registry.ground_atom(atom).arguments().to_vec());
        }
        Ok(answer)
    }
}

/// `&some[P]()` --- outputs the empty tuple exactly when the extension of
/// its predicate input is nonempty.
pub struct NonemptyOracle {
    pub name: &'static str,
}

impl Oracle for NonemptyOracle {
    fn predicate(&self) -> &str {
        self.name
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }

    fn output_arity(&self) -> OutputArity {
        OutputArity::Fixed(0)
    }

    fn retrieve(
        &self,
        _registry: &Registry,
        query: &OracleQuery,
    ) -> Result<OracleAnswer, OracleError> {
        let mut answer = OracleAnswer::default();
        if !query.interpretation.is_empty() {
            answer.positive.push(Vec::new());
        }
        Ok(answer)
    }
}

/// A copy oracle which advertises complete positive support sets
/// `{p(X), ¬&mem[p](X)}`.
pub struct MemOracle {
    pub name: &'static str,
}

impl Oracle for MemOracle {
    fn predicate(&self) -> &str {
        self.name
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }

    fn output_arity(&self) -> OutputArity {
        OutputArity::Fixed(1)
    }

    fn properties(&self) -> ExtProperties {
        let mut properties = ExtProperties::default();
        properties.provides_support_sets = true;
        properties.complete_positive_support_sets = true;
        properties
    }

    fn retrieve(
        &self,
        registry: &Registry,
        query: &OracleQuery,
    ) -> Result<OracleAnswer, OracleError> {
        let mut answer = OracleAnswer::default();
        for atom in query.interpretation.iter_true() {
            answer
                .positive
                .push(registry.ground_atom(atom).arguments().to_vec());
        }
        Ok(answer)
    }

    fn learn_support_sets(
        &self,
        registry: &mut Registry,
        query: &OracleQuery,
    ) -> Result<Vec<NogoodTemplate>, OracleError> {
        // One template: p(X) forces the replacement for output X.
        let x = registry.intern_variable("X");
        let input_predicate = query.input[0];

        let condition = registry.intern_nonground_atom(vec![input_predicate, x]);
        let replacement_predicate = registry.aux_symbol('r', query.eatom);
        let replacement =
            registry.intern_nonground_atom(vec![replacement_predicate, input_predicate, x]);

        Ok(vec![NogoodTemplate::new([
            Id::literal(condition),
            Id::naf_literal(replacement),
        ])])
    }
}

/// A shared fresh registry.
pub fn fresh_registry() -> Rc<RefCell<Registry>> {
    Rc::new(RefCell::new(Registry::default()))
}

/// The complement auxiliary used to write `a v -a` style guesses.
pub fn complement(registry: &mut Registry, atom: Id) -> Id {
    let symbol = registry.aux_symbol('g', atom);
    registry.intern_ground_atom(vec![symbol])
}

/// Collect the printable forms of all answer sets of a generator.
pub fn all_answer_texts(
    generator: &mut aspex::generator::ModelGenerator,
    registry: &Rc<RefCell<Registry>>,
) -> Vec<String> {
    let mut texts = Vec::new();
    while let Some(answer) = generator.next_model() {
        texts.push(answer.text(&registry.borrow()));
        assert!(texts.len() < 64, "runaway enumeration");
    }
    texts.sort();
    texts
}
