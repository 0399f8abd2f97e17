/*!
A max-heap over a fixed index range, keyed by mutable scores.

The heap tracks where each index sits so that scores may be bumped while
the index is on the heap, and indices may be dropped and later
re-activated without losing their score. Used to pick the unassigned atom
of most activity when a decision is required.
*/

/// A heap of `usize` indices ordered by `f64` scores.
#[derive(Debug, Default)]
pub struct ActivityHeap {
    scores: Vec<f64>,
    heap: Vec<usize>,
    position: Vec<Option<usize>>,
}

impl ActivityHeap {
    /// A heap over the indices `0..size`, all scores zero, nothing active.
    pub fn new(size: usize) -> Self {
        ActivityHeap {
            scores: vec![0.0; size],
            heap: Vec::with_capacity(size),
            position: vec![None; size],
        }
    }

    /// Grow the index range to `size`, keeping existing scores.
    pub fn grow_to(&mut self, size: usize) {
        if size > self.scores.len() {
            self.scores.resize(size, 0.0);
            self.position.resize(size, None);
        }
    }

    /// The score of `index`.
    pub fn score(&self, index: usize) -> f64 {
        self.scores[index]
    }

    /// Add `amount` to the score of `index`, restoring heap order if the
    /// index is active. Returns the revised score.
    pub fn bump(&mut self, index: usize, amount: f64) -> f64 {
        self.scores[index] += amount;
        if let Some(at) = self.position[index] {
            self.sift_up(at);
        }
        self.scores[index]
    }

    /// Multiply every score by `factor`. Relative order is unchanged, so
    /// the heap remains valid.
    pub fn scale_all(&mut self, factor: f64) {
        for score in self.scores.iter_mut() {
            *score *= factor;
        }
    }

    /// Put `index` on the heap, if it is not already there.
    pub fn activate(&mut self, index: usize) {
        if self.position[index].is_none() {
            let at = self.heap.len();
            self.heap.push(index);
            self.position[index] = Some(at);
            self.sift_up(at);
        }
    }

    /// Remove and return the index of highest score, if any.
    pub fn pop_max(&mut self) -> Option<usize> {
        let max = *self.heap.first()?;
        let last = self.heap.pop().expect("! Nonempty heap");
        self.position[max] = None;
        if last != max {
            self.heap[0] = last;
            self.position[last] = Some(0);
            self.sift_down(0);
        }
        Some(max)
    }

    /// True if no index is active.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn sift_up(&mut self, mut at: usize) {
        while at > 0 {
            let parent = (at - 1) / 2;
            if self.scores[self.heap[at]] <= self.scores[self.heap[parent]] {
                break;
            }
            self.swap(at, parent);
            at = parent;
        }
    }

    fn sift_down(&mut self, mut at: usize) {
        loop {
            let left = 2 * at + 1;
            let right = 2 * at + 2;
            let mut largest = at;

            if left < self.heap.len()
                && self.scores[self.heap[left]] > self.scores[self.heap[largest]]
            {
                largest = left;
            }
            if right < self.heap.len()
                && self.scores[self.heap[right]] > self.scores[self.heap[largest]]
            {
                largest = right;
            }
            if largest == at {
                break;
            }
            self.swap(at, largest);
            at = largest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.position[self.heap[a]] = Some(a);
        self.position[self.heap[b]] = Some(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_score_order() {
        let mut heap = ActivityHeap::new(5);
        for index in 0..5 {
            heap.bump(index, index as f64);
            heap.activate(index);
        }

        assert_eq!(heap.pop_max(), Some(4));
        assert_eq!(heap.pop_max(), Some(3));

        heap.bump(0, 10.0);
        heap.activate(0);
        assert_eq!(heap.pop_max(), Some(0));
        assert_eq!(heap.pop_max(), Some(2));
        assert_eq!(heap.pop_max(), Some(1));
        assert_eq!(heap.pop_max(), None);
    }

    #[test]
    fn reactivation_keeps_scores() {
        let mut heap = ActivityHeap::new(3);
        heap.bump(1, 5.0);
        heap.activate(1);
        assert_eq!(heap.pop_max(), Some(1));

        heap.activate(1);
        heap.activate(2);
        assert_eq!(heap.pop_max(), Some(1));
    }
}
