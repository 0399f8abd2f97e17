/*!
Answer sets, as emitted by a model generator.

The interpretation is already projected to the non-auxiliary, non-masked
atoms of the component. Weights are indexed by level and compared
lexicographically with higher levels taking priority; a program without
weak constraints yields an empty weight vector.
*/

use crate::registry::Registry;
use crate::structures::Interpretation;

/// A projected model, optionally costed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerSet {
    /// The projected interpretation.
    pub interpretation: Interpretation,

    /// Violation weights per level, index = level.
    pub weights: Vec<u64>,
}

impl AnswerSet {
    pub fn new(interpretation: Interpretation) -> Self {
        AnswerSet {
            interpretation,
            weights: Vec::new(),
        }
    }

    pub fn with_weights(interpretation: Interpretation, weights: Vec<u64>) -> Self {
        AnswerSet {
            interpretation,
            weights,
        }
    }

    /// True if `self` costs strictly less than `other`, comparing levels
    /// from most significant down.
    pub fn strictly_better_than(&self, other: &[u64]) -> bool {
        let levels = self.weights.len().max(other.len());
        for level in (0..levels).rev() {
            let ours = self.weights.get(level).copied().unwrap_or(0);
            let theirs = other.get(level).copied().unwrap_or(0);
            if ours != theirs {
                return ours < theirs;
            }
        }
        false
    }

    /// The printable form, `{a,b}` optionally followed by
    /// `<[w_k:k],…,[w_0:0]>`.
    pub fn text(&self, registry: &Registry) -> String {
        let mut text = registry.interpretation_text(&self.interpretation);
        if !self.weights.is_empty() {
            text.push('<');
            for (offset, level) in (0..self.weights.len()).rev().enumerate() {
                if offset > 0 {
                    text.push(',');
                }
                text.push_str(&format!("[{}:{}]", self.weights[level], level));
            }
            text.push('>');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicographic_comparison_prefers_high_levels() {
        let cheap_high = AnswerSet::with_weights(Interpretation::new(), vec![9, 1]);
        let cheap_low = AnswerSet::with_weights(Interpretation::new(), vec![1, 2]);

        // Level 1 dominates level 0.
        assert!(cheap_high.strictly_better_than(&[1, 2]));
        assert!(!cheap_low.strictly_better_than(&[9, 1]));
        assert!(!cheap_high.strictly_better_than(&[9, 1]));
    }
}
