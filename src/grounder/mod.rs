/*!
The grounder.

Bottom-up instantiation of a component program against its facts. Rules
are matched over the set of derivable atoms, saturated to a fixpoint:
positive ordinary body literals bind variables against derivable atoms,
builtin comparisons filter and builtin arithmetic binds result variables,
and instantiated heads extend the derivable set. Default-negated
literals are instantiated but never pruned, so correctness does not
depend on derivability: an uninstantiable atom is simply false in every
model.

The *exhaustive* mode used by inconsistency analysis additionally
matches positive body atoms over *underdefined* predicates (those read
but not defined in the component) against every tuple over the observed
constant universe, so each head atom which could conceivably be derived
is present in the output.
*/

use std::collections::{HashMap, HashSet};

use crate::misc::log::targets;
use crate::registry::Registry;
use crate::structures::{Id, Program, Rule, TermBuiltin, TermShape};
use crate::types::err::GroundingError;

/// Options for one grounding run.
#[derive(Clone, Debug, Default)]
pub struct GroundingOptions {
    /// Predicates whose positive occurrences are matched against the full
    /// constant universe rather than the derivable set.
    pub underdefined: HashSet<Id>,
}

/// Ground `program` against its EDB.
pub fn ground(
    registry: &mut Registry,
    program: &Program,
    options: &GroundingOptions,
) -> Result<Program, GroundingError> {
    let universe = constant_universe(registry, program);

    let mut derivable: HashSet<Id> = HashSet::new();
    for address in program.edb.iter_true() {
        let tuple = registry.ground_atom(address).tuple.clone();
        let id = registry
            .ground_atom_id(&tuple)
            .expect("! EDB atom uninterned");
        derivable.insert(id);
    }

    let mut idb: Vec<Id> = Vec::new();
    let mut emitted: HashSet<Id> = HashSet::new();

    loop {
        let mut grew = false;

        for rule_id in &program.idb {
            let rule = registry.rule(*rule_id).clone();

            let mut bindings = vec![HashMap::new()];
            bindings = match_positive_body(
                registry, &rule, bindings, &derivable, options, &universe,
            )?;

            for binding in bindings {
                for ground_rule in instantiate(registry, &rule, &binding, &universe)? {
                    let ground_id = registry.intern_rule(ground_rule.clone());

                    if emitted.insert(ground_id) {
                        idb.push(ground_id);
                        grew = true;
                    }
                    for head in &ground_rule.head {
                        if derivable.insert(*head) {
                            grew = true;
                        }
                    }
                }
            }
        }

        if !grew {
            break;
        }
    }

    log::debug!(
        target: targets::GROUNDING,
        "Grounding: {} rules from {} templates",
        idb.len(),
        program.idb.len()
    );

    Ok(Program::new(program.edb.clone(), idb))
}

/// The constant terms observed in the program and its facts.
fn constant_universe(registry: &Registry, program: &Program) -> Vec<Id> {
    let mut seen: HashSet<Id> = HashSet::new();

    let visit_term = |term: Id, seen: &mut HashSet<Id>| {
        if term.is_constant_term() || term.is_integer_term() || term.is_nested_term() {
            seen.insert(term);
        }
    };

    for address in program.edb.iter_true() {
        for term in &registry.ground_atom(address).tuple[1..] {
            visit_term(*term, &mut seen);
        }
    }
    for rule_id in &program.idb {
        let rule = registry.rule(*rule_id);
        for atom_id in rule.head.iter().chain(rule.body.iter()) {
            let atom = Id::atom_of(*atom_id);
            if !atom.is_ordinary_atom() {
                continue;
            }
            for term in &registry.ordinary_atom(atom).tuple[1..] {
                if registry.term_is_ground(*term) {
                    visit_term(*term, &mut seen);
                }
            }
        }
    }

    let mut universe: Vec<Id> = seen.into_iter().collect();
    universe.sort();
    universe
}

/// Extend the bindings over the positive ordinary body literals.
fn match_positive_body(
    registry: &mut Registry,
    rule: &Rule,
    mut bindings: Vec<HashMap<Id, Id>>,
    derivable: &HashSet<Id>,
    options: &GroundingOptions,
    universe: &[Id],
) -> Result<Vec<HashMap<Id, Id>>, GroundingError> {
    for literal in &rule.body {
        let atom_id = Id::atom_of(*literal);
        if literal.is_naf() || !atom_id.is_ordinary_atom() {
            continue;
        }
        assert!(
            !atom_id.is_external_atom(),
            "! External literal reached the grounder"
        );

        let pattern = registry.ordinary_atom(atom_id).tuple.clone();
        let exhaustive = options.underdefined.contains(&pattern[0]);

        let mut candidates: Vec<Vec<Id>> = derivable
            .iter()
            .filter(|candidate| registry.ground_atom(candidate.address).predicate() == pattern[0])
            .map(|candidate| registry.ground_atom(candidate.address).tuple.clone())
            .collect();

        if exhaustive {
            let arity = pattern.len() - 1;
            let mut tuples: Vec<Vec<Id>> = vec![vec![pattern[0]]];
            for _ in 0..arity {
                let mut extended = Vec::new();
                for tuple in &tuples {
                    for constant in universe {
                        let mut next = tuple.clone();
                        next.push(*constant);
                        extended.push(next);
                    }
                }
                tuples = extended;
            }
            candidates.extend(tuples);
        }
        candidates.sort();
        candidates.dedup();

        let mut extended = Vec::new();
        for binding in bindings {
            for candidate in &candidates {
                if let Some(revised) = unify_tuple(registry, &pattern, candidate, &binding) {
                    extended.push(revised);
                }
            }
        }
        bindings = extended;
        if bindings.is_empty() {
            break;
        }
    }

    Ok(bindings)
}

/// Unify a (possibly nonground) tuple against a ground tuple.
fn unify_tuple(
    registry: &Registry,
    pattern: &[Id],
    ground: &[Id],
    binding: &HashMap<Id, Id>,
) -> Option<HashMap<Id, Id>> {
    if pattern.len() != ground.len() {
        return None;
    }
    let mut revised = binding.clone();
    for (pattern_term, ground_term) in pattern.iter().zip(ground.iter()) {
        if !unify_term(registry, *pattern_term, *ground_term, &mut revised) {
            return None;
        }
    }
    Some(revised)
}

fn unify_term(
    registry: &Registry,
    pattern: Id,
    ground: Id,
    binding: &mut HashMap<Id, Id>,
) -> bool {
    if pattern.is_variable_term() {
        match binding.get(&pattern) {
            Some(bound) => *bound == ground,
            None => {
                binding.insert(pattern, ground);
                true
            }
        }
    } else if pattern.is_nested_term() && ground.is_nested_term() {
        let (pattern_function, pattern_arguments) = match &registry.term(pattern).shape {
            TermShape::Nested {
                function,
                arguments,
            } => (*function, arguments.clone()),
            _ => return false,
        };
        let (ground_function, ground_arguments) = match &registry.term(ground).shape {
            TermShape::Nested {
                function,
                arguments,
            } => (*function, arguments.clone()),
            _ => return false,
        };
        pattern_function == ground_function
            && pattern_arguments.len() == ground_arguments.len()
            && pattern_arguments
                .iter()
                .zip(ground_arguments.iter())
                .all(|(p, g)| unify_term(registry, *p, *g, binding))
    } else {
        pattern == ground
    }
}

/// Apply `binding` to `term`, interning substituted nested terms.
fn apply_term(registry: &mut Registry, term: Id, binding: &HashMap<Id, Id>) -> Option<Id> {
    if term.is_variable_term() {
        return binding.get(&term).copied();
    }
    if term.is_nested_term() {
        let (function, arguments) = match &registry.term(term).shape {
            TermShape::Nested {
                function,
                arguments,
            } => (*function, arguments.clone()),
            _ => unreachable!(),
        };
        let substituted: Option<Vec<Id>> = arguments
            .iter()
            .map(|argument| apply_term(registry, *argument, binding))
            .collect();
        return Some(registry.intern_nested(function, substituted?));
    }
    Some(term)
}

/// Instantiate `rule` under `binding`: evaluate builtins, ground the
/// remaining literals and the head. Returns no rules when a builtin
/// filter rejects the binding.
///
/// A guessing rule (every head a replacement atom) may hold output
/// variables no body literal binds; those are enumerated over the
/// constant universe, which bounds the guess to the observable domain.
fn instantiate(
    registry: &mut Registry,
    rule: &Rule,
    binding: &HashMap<Id, Id>,
    universe: &[Id],
) -> Result<Vec<Rule>, GroundingError> {
    let guessing_heads = !rule.head.is_empty()
        && rule.head.iter().all(|head| head.is_external_aux());
    if guessing_heads {
        let mut free: Vec<Id> = Vec::new();
        for atom_id in &rule.head {
            if atom_id.is_ordinary_ground_atom() {
                continue;
            }
            for term in &registry.ordinary_atom(*atom_id).tuple {
                if term.is_variable_term() && !binding.contains_key(term) && !free.contains(term)
                {
                    free.push(*term);
                }
            }
        }

        if !free.is_empty() {
            let mut rules = Vec::new();
            let mut assignments: Vec<HashMap<Id, Id>> = vec![binding.clone()];
            for variable in &free {
                let mut extended = Vec::new();
                for assignment in &assignments {
                    for constant in universe {
                        let mut next = assignment.clone();
                        next.insert(*variable, *constant);
                        extended.push(next);
                    }
                }
                assignments = extended;
            }
            for assignment in assignments {
                rules.extend(instantiate_bound(registry, rule, &assignment)?);
            }
            return Ok(rules);
        }
    }

    instantiate_bound(registry, rule, binding)
}

fn instantiate_bound(
    registry: &mut Registry,
    rule: &Rule,
    binding: &HashMap<Id, Id>,
) -> Result<Vec<Rule>, GroundingError> {
    let mut binding = binding.clone();

    // Builtins: evaluated once bound, arithmetic may bind its result.
    // Iterate to let chained arithmetic settle.
    let mut open: Vec<Id> = rule
        .body
        .iter()
        .copied()
        .filter(|literal| Id::atom_of(*literal).is_builtin_atom())
        .collect();
    loop {
        let before = open.len();
        let mut still_open = Vec::new();
        for literal in open {
            match evaluate_builtin(registry, literal, &mut binding)? {
                BuiltinOutcome::Holds => {}
                BuiltinOutcome::Fails => return Ok(Vec::new()),
                BuiltinOutcome::Unready => still_open.push(literal),
            }
        }
        open = still_open;
        if open.is_empty() {
            break;
        }
        if open.len() == before {
            return Err(GroundingError::BuiltinOperand(Id::atom_of(open[0])));
        }
    }

    // Head and remaining body literals must ground fully.
    let mut head = Vec::with_capacity(rule.head.len());
    for atom_id in &rule.head {
        head.push(ground_atom(registry, *atom_id, &binding)?);
    }

    let mut body = Vec::with_capacity(rule.body.len());
    let mut weights = Vec::new();
    for (index, literal) in rule.body.iter().enumerate() {
        let atom_id = Id::atom_of(*literal);
        if atom_id.is_builtin_atom() {
            continue;
        }
        let ground_id = ground_atom(registry, atom_id, &binding)?;
        body.push(match literal.is_naf() {
            true => Id::naf_literal(ground_id),
            false => Id::literal(ground_id),
        });
        if let Some(rule_weights) = &rule.body_weights {
            weights.push(rule_weights[index]);
        }
    }

    let weak = match &rule.weak {
        None => None,
        Some(annotation) => {
            let mut tuple = Vec::with_capacity(annotation.tuple.len());
            for term in &annotation.tuple {
                match apply_term(registry, *term, &binding) {
                    Some(ground_term) => tuple.push(ground_term),
                    None => return Err(GroundingError::UnsafeVariable(Id::FAIL)),
                }
            }
            Some(crate::structures::WeakAnnotation {
                weight: annotation.weight,
                level: annotation.level,
                tuple,
            })
        }
    };

    let ground_rule = Rule {
        head,
        body,
        head_guard: None,
        body_weights: rule.body_weights.as_ref().map(|_| weights),
        bound: rule.bound,
        weak,
    };
    Ok(vec![ground_rule])
}

/// The ground instance of an ordinary atom under `binding`.
fn ground_atom(
    registry: &mut Registry,
    atom_id: Id,
    binding: &HashMap<Id, Id>,
) -> Result<Id, GroundingError> {
    if atom_id.is_ordinary_ground_atom() {
        return Ok(atom_id);
    }
    let pattern = registry.ordinary_atom(atom_id).tuple.clone();
    let mut tuple = Vec::with_capacity(pattern.len());
    for term in pattern {
        match apply_term(registry, term, binding) {
            Some(ground_term) => tuple.push(ground_term),
            None => return Err(GroundingError::UnsafeVariable(atom_id)),
        }
    }
    Ok(registry.intern_ground_atom(tuple))
}

enum BuiltinOutcome {
    Holds,
    Fails,
    Unready,
}

/// Evaluate one builtin literal under (and possibly extending) `binding`.
fn evaluate_builtin(
    registry: &mut Registry,
    literal: Id,
    binding: &mut HashMap<Id, Id>,
) -> Result<BuiltinOutcome, GroundingError> {
    let atom_id = Id::atom_of(literal);
    let tuple = registry.builtin_atom(atom_id).tuple.clone();
    let op = tuple[0].builtin_op();

    let value = |term: Id, binding: &HashMap<Id, Id>| -> Option<Id> {
        if term.is_variable_term() {
            binding.get(&term).copied()
        } else {
            Some(term)
        }
    };

    let holds = |outcome: bool| match (outcome, literal.is_naf()) {
        (true, false) | (false, true) => BuiltinOutcome::Holds,
        _ => BuiltinOutcome::Fails,
    };

    if op.is_comparison() {
        let (Some(left), Some(right)) = (value(tuple[1], binding), value(tuple[2], binding))
        else {
            // Equality against a sole unbound variable assigns it.
            if op == TermBuiltin::Eq && !literal.is_naf() {
                if let (None, Some(right)) = (value(tuple[1], binding), value(tuple[2], binding))
                {
                    binding.insert(tuple[1], right);
                    return Ok(BuiltinOutcome::Holds);
                }
                if let (Some(left), None) = (value(tuple[1], binding), value(tuple[2], binding)) {
                    binding.insert(tuple[2], left);
                    return Ok(BuiltinOutcome::Holds);
                }
            }
            return Ok(BuiltinOutcome::Unready);
        };

        let outcome = match op {
            TermBuiltin::Eq => left == right,
            TermBuiltin::Ne => left != right,
            _ => {
                // Order comparisons require integers.
                if !left.is_integer_term() || !right.is_integer_term() {
                    return Err(GroundingError::BuiltinOperand(atom_id));
                }
                match op {
                    TermBuiltin::Lt => left.address < right.address,
                    TermBuiltin::Le => left.address <= right.address,
                    TermBuiltin::Gt => left.address > right.address,
                    TermBuiltin::Ge => left.address >= right.address,
                    _ => unreachable!(),
                }
            }
        };
        return Ok(holds(outcome));
    }

    if op.is_arithmetic() || op == TermBuiltin::Succ {
        let (left, right) = match op {
            TermBuiltin::Succ => (value(tuple[1], binding), Some(Id::integer(1))),
            _ => (value(tuple[1], binding), value(tuple[2], binding)),
        };
        let result_slot = match op {
            TermBuiltin::Succ => tuple[2],
            _ => tuple[3],
        };

        let (Some(left), Some(right)) = (left, right) else {
            return Ok(BuiltinOutcome::Unready);
        };
        if !left.is_integer_term() || !right.is_integer_term() {
            return Err(GroundingError::BuiltinOperand(atom_id));
        }

        let computed = match op {
            TermBuiltin::Add | TermBuiltin::Succ => left.address.checked_add(right.address),
            TermBuiltin::Sub => left.address.checked_sub(right.address),
            TermBuiltin::Mul => left.address.checked_mul(right.address),
            TermBuiltin::Div => left.address.checked_div(right.address),
            TermBuiltin::Mod => left.address.checked_rem(right.address),
            _ => unreachable!(),
        };
        let Some(computed) = computed else {
            return Ok(holds(false));
        };
        if computed > registry.maxint {
            return Err(GroundingError::IntegerRange);
        }
        let computed = Id::integer(computed);

        return match value(result_slot, binding) {
            Some(bound) => Ok(holds(bound == computed)),
            None => {
                if literal.is_naf() {
                    return Err(GroundingError::BuiltinOperand(atom_id));
                }
                binding.insert(result_slot, computed);
                Ok(BuiltinOutcome::Holds)
            }
        };
    }

    // Aggregate function symbols are compiled to weight rules upstream.
    Err(GroundingError::BuiltinOperand(atom_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::Interpretation;

    fn setup() -> (Registry, Id, Id, Id, Id) {
        let mut registry = Registry::default();
        registry.maxint = 10;
        let p = registry.intern_constant("p");
        let q = registry.intern_constant("q");
        let a = registry.intern_constant("a");
        let b = registry.intern_constant("b");
        (registry, p, q, a, b)
    }

    #[test]
    fn transitive_closure_saturates() {
        let (mut registry, p, q, a, b) = setup();
        let x = registry.intern_variable("X");

        let pa = registry.intern_ground_atom(vec![p, a]);
        let pb = registry.intern_ground_atom(vec![p, b]);
        let p_x = registry.intern_nonground_atom(vec![p, x]);
        let q_x = registry.intern_nonground_atom(vec![q, x]);

        // q(X) :- p(X).
        let rule = registry.intern_rule(Rule::regular(vec![q_x], vec![Id::literal(p_x)]));

        let edb: Interpretation = [pa.address, pb.address].into_iter().collect();
        let program = Program::new(edb, vec![rule]);

        let ground_program =
            ground(&mut registry, &program, &GroundingOptions::default()).expect("! Grounds");

        assert_eq!(ground_program.idb.len(), 2);
        assert!(registry.ground_atom_id(&[q, a]).is_some());
        assert!(registry.ground_atom_id(&[q, b]).is_some());
    }

    #[test]
    fn comparison_filters_instances() {
        let (mut registry, p, q, a, b) = setup();
        let x = registry.intern_variable("X");

        let pa = registry.intern_ground_atom(vec![p, a]);
        let pb = registry.intern_ground_atom(vec![p, b]);
        let p_x = registry.intern_nonground_atom(vec![p, x]);
        let q_x = registry.intern_nonground_atom(vec![q, x]);
        let ne = registry.intern_builtin_atom(vec![Id::builtin(TermBuiltin::Ne), x, a]);

        // q(X) :- p(X), X != a.
        let rule = registry.intern_rule(Rule::regular(
            vec![q_x],
            vec![Id::literal(p_x), Id::literal(ne)],
        ));

        let edb: Interpretation = [pa.address, pb.address].into_iter().collect();
        let program = Program::new(edb, vec![rule]);

        let ground_program =
            ground(&mut registry, &program, &GroundingOptions::default()).expect("! Grounds");

        assert_eq!(ground_program.idb.len(), 1);
        assert!(registry.ground_atom_id(&[q, b]).is_some());
        assert!(registry.ground_atom_id(&[q, a]).is_none());
    }

    #[test]
    fn exhaustive_mode_covers_the_universe() {
        let (mut registry, p, q, a, b) = setup();
        let x = registry.intern_variable("X");

        // No facts at all; p is underdefined.
        let p_x = registry.intern_nonground_atom(vec![p, x]);
        let q_x = registry.intern_nonground_atom(vec![q, x]);
        let rule = registry.intern_rule(Rule::regular(vec![q_x], vec![Id::literal(p_x)]));

        // Mention the constants so the universe is nonempty.
        let seed = registry.intern_ground_atom(vec![q, a]);
        let seed_b = registry.intern_ground_atom(vec![q, b]);
        let edb: Interpretation = [seed.address, seed_b.address].into_iter().collect();

        let mut options = GroundingOptions::default();
        options.underdefined.insert(p);

        let program = Program::new(edb, vec![rule]);
        let ground_program = ground(&mut registry, &program, &options).expect("! Grounds");

        // One instance per universe constant.
        assert_eq!(ground_program.idb.len(), 2);
        assert!(registry.ground_atom_id(&[p, a]).is_some());
        assert!(registry.ground_atom_id(&[p, b]).is_some());
    }
}
