/*!
A guess-and-check answer set solver for ground programs extended with
external atoms.

aspex evaluates one strongly connected component of an already-decomposed
answer-set program whose rule bodies may read *external atoms* --- opaque
boolean predicates answered by an oracle over a slice of the
interpretation. The engine guesses both polarities of each external
atom's replacement, searches for compatible sets with a conflict-driven
nogood-learning solver, re-checks every guess against the oracles
(learning nogoods from their behaviour on the way), and eliminates
FLP-non-minimal candidates through unfounded-set checking.

# Orientation

Internally, and at a high level, a solve is viewed in terms of a handful
of cooperating stores around a central [registry](crate::registry):
- Terms, atoms, rules, and external atoms are interned once and
  addressed by [tagged ids](crate::structures::id).
- A ground program with its dependency analysis lives in an
  [annotated program](crate::annotated).
- The [ground solver](crate::solver) owns the current assignment and
  publishes immutable views to its propagator.
- The [model generator](crate::generator) orchestrates the
  guess-and-check loop and emits [answer sets](crate::structures::AnswerSet).

Useful starting points:
- [generator::ModelGeneratorFactory] to run a component end to end.
- [solver](crate::solver) to inspect the search backend on its own.
- [oracle::Oracle] to supply an external source.
- [config::Config] to see what behaviour is selectable.

# Example

Guess a fact and copy it through an oracle:

```rust
use std::sync::Arc;

use aspex::config::Config;
use aspex::generator::{ComponentInput, ModelGeneratorFactory};
use aspex::oracle::{InputType, Oracle, OracleAnswer, OracleQuery, OracleRegistry, OutputArity};
use aspex::registry::Registry;
use aspex::structures::{ExtProperties, ExternalAtom, Id, Interpretation, Rule};
use aspex::types::err::OracleError;

// An oracle copying the extension of its predicate input.
struct Copy;

impl Oracle for Copy {
    fn predicate(&self) -> &str {
        "id"
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }

    fn output_arity(&self) -> OutputArity {
        OutputArity::Fixed(1)
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

let registry = std::rc::Rc::new(std::cell::RefCell::new(Registry::default()));
let mut oracles = OracleRegistry::default();
let id_pred = oracles.register(&mut registry.borrow_mut(), Arc::new(Copy));

// d(a) v -d(a).   p(X) :- &id[d](X).
let (edb, idb, eatom) = {
    let mut reg = registry.borrow_mut();
    let d = reg.intern_constant("d");
    let p = reg.intern_constant("p");
    let a = reg.intern_constant("a");
    let x = reg.intern_variable("X");

    let da = reg.intern_ground_atom(vec![d, a]);
    let not_da = reg.aux_symbol('g', da);
    let guess = reg.intern_ground_atom(vec![not_da]);
    let p_x = reg.intern_nonground_atom(vec![p, x]);

    let eatom = reg.intern_external(ExternalAtom {
        predicate: id_pred,
        inputs: vec![d],
        outputs: vec![x],
        aux_input: None,
        properties: ExtProperties::default(),
    });

    let guess_rule = reg.intern_rule(Rule::regular(vec![da, guess], vec![]));
    let copy_rule = reg.intern_rule(Rule::regular(vec![p_x], vec![Id::literal(eatom)]));

    (Interpretation::new(), vec![guess_rule, copy_rule], eatom)
};

let factory = ModelGeneratorFactory::new(Config::default(), oracles);
let mut generator = factory
    .create(
        registry.clone(),
        ComponentInput {
            edb,
            idb,
            maxint: 0,
            inner_eatoms: vec![eatom],
        },
    )
    .expect("well-formed input");

let mut count = 0;
while let Some(answer) = generator.next_model() {
    count += 1;
    let _text = answer.text(&registry.borrow());
}
assert_eq!(count, 2);
```

# Logs

To help diagnose issues, (somewhat) detailed calls to [log!](log) are
made, with targets defined per subsystem to narrow output; see
[misc::log]. No log implementation is provided.
*/

#![allow(clippy::collapsible_else_if)]
#![allow(clippy::single_match)]

pub mod config;
pub mod structures;
pub mod types;

pub mod generic;
pub mod misc;

pub mod registry;

pub mod annotated;
pub mod grounder;
pub mod nogoods;
pub mod oracle;

pub mod solver;

pub mod heuristics;
pub mod ufs;

pub mod generator;
