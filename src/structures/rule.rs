/*!
Rules.

A rule pairs a head (a disjunction of atom ids) with a body (a sequence of
literal ids). Constraints have an empty head; facts are kept in the EDB
rather than as rules. Weight rules carry a weight for each body literal
and a bound the satisfied weight must reach; weak constraints carry a
weight/level annotation and never constrain models.
*/

use crate::structures::Id;

/// The weak-constraint annotation of a rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WeakAnnotation {
    /// The penalty incurred when the body holds.
    pub weight: u64,

    /// The priority level of the penalty; higher levels dominate.
    pub level: u64,

    /// The discriminating tuple of the weak constraint.
    pub tuple: Vec<Id>,
}

/// A rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    /// Head atoms, interpreted as a disjunction. Empty for constraints.
    pub head: Vec<Id>,

    /// Body literal ids.
    pub body: Vec<Id>,

    /// Optional guard for variable-length disjunction.
    pub head_guard: Option<Vec<Id>>,

    /// Weights of the body literals, for weight rules.
    pub body_weights: Option<Vec<u64>>,

    /// The bound the satisfied body weight must reach, for weight rules.
    pub bound: Option<u64>,

    /// The weak-constraint annotation, if any.
    pub weak: Option<WeakAnnotation>,
}

impl Rule {
    /// A regular rule from a head and a body.
    pub fn regular(head: Vec<Id>, body: Vec<Id>) -> Self {
        Rule {
            head,
            body,
            head_guard: None,
            body_weights: None,
            bound: None,
            weak: None,
        }
    }

    /// A constraint from a body.
    pub fn constraint(body: Vec<Id>) -> Self {
        Rule::regular(Vec::new(), body)
    }

    /// A weight rule from a head, weighted body literals, and a bound.
    pub fn weight(head: Vec<Id>, body: Vec<(Id, u64)>, bound: u64) -> Self {
        let (literals, weights) = body.into_iter().unzip();
        Rule {
            head,
            body: literals,
            head_guard: None,
            body_weights: Some(weights),
            bound: Some(bound),
            weak: None,
        }
    }

    /// A weak constraint from a body and its annotation.
    pub fn weak_constraint(body: Vec<Id>, weight: u64, level: u64, tuple: Vec<Id>) -> Self {
        Rule {
            head: Vec::new(),
            body,
            head_guard: None,
            body_weights: None,
            bound: None,
            weak: Some(WeakAnnotation {
                weight,
                level,
                tuple,
            }),
        }
    }

    pub fn is_constraint(&self) -> bool {
        self.head.is_empty() && self.weak.is_none()
    }

    pub fn is_weak_constraint(&self) -> bool {
        self.weak.is_some()
    }

    pub fn is_weight_rule(&self) -> bool {
        self.bound.is_some()
    }

    pub fn is_disjunctive(&self) -> bool {
        self.head.len() > 1
    }

    /// True if some body literal is an external atom.
    pub fn mentions_external(&self) -> bool {
        self.body.iter().any(|literal| literal.is_external_atom())
    }

    /// The rule subkind for its id.
    pub fn subkind(&self) -> u32 {
        if self.is_weak_constraint() {
            Id::SUBKIND_RULE_WEAK
        } else if self.is_weight_rule() {
            Id::SUBKIND_RULE_WEIGHT
        } else if self.is_constraint() {
            Id::SUBKIND_RULE_CONSTRAINT
        } else {
            Id::SUBKIND_RULE_REGULAR
        }
    }
}
