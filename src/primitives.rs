//! Array-backed binary min-heap, Fenwick tree and argmax routines shared by
//! the algorithm families.

use serde::Serialize;

/// Snapshot taken after every swap performed by [`sift_down`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeapStep<T> {
    pub swapped: (usize, usize),
    pub heap: Vec<T>,
}

/// Restores the min-heap property downward from `index`, considering only
/// `heap[..heap_size]`. Each swap is appended to `steps`.
pub fn sift_down<T: PartialOrd + Clone>(
    heap: &mut [T],
    heap_size: usize,
    mut index: usize,
    steps: &mut Vec<HeapStep<T>>,
) {
    loop {
        let left = 2 * index + 1;
        let right = left + 1;
        let mut smallest = index;
        if left < heap_size && heap[left] < heap[smallest] {
            smallest = left;
        }
        if right < heap_size && heap[right] < heap[smallest] {
            smallest = right;
        }
        if smallest == index {
            return;
        }
        heap.swap(index, smallest);
        steps.push(HeapStep {
            swapped: (index, smallest),
            heap: heap.to_vec(),
        });
        index = smallest;
    }
}

/// Bottom-up heap construction.
pub fn heapify<T: PartialOrd + Clone>(heap: &mut [T], steps: &mut Vec<HeapStep<T>>) {
    let len = heap.len();
    for index in (0..len / 2).rev() {
        sift_down(heap, len, index, steps);
    }
}

/// Removes the root of a valid heap and re-sifts.
pub fn pop_min<T: PartialOrd + Clone>(heap: &mut Vec<T>) -> Option<T> {
    if heap.is_empty() {
        return None;
    }
    let root = heap.swap_remove(0);
    let len = heap.len();
    sift_down(heap, len, 0, &mut Vec::new());
    Some(root)
}

#[inline]
fn lowest_bit(i: usize) -> usize {
    i & i.wrapping_neg()
}

/// Adds `delta` at 0-based `index`. `tree` is the 1-based internal array of
/// length `n + 1`. Returns the internal positions that were touched.
pub fn update(tree: &mut [f64], index: usize, delta: f64) -> Vec<usize> {
    let mut touched = Vec::new();
    let mut i = index + 1;
    while i < tree.len() {
        tree[i] += delta;
        touched.push(i);
        i += lowest_bit(i);
    }
    touched
}

/// Inclusive prefix sum ending at 0-based `index`.
pub fn query(tree: &[f64], index: usize) -> f64 {
    let mut sum = 0.0;
    let mut i = (index + 1).min(tree.len().saturating_sub(1));
    while i > 0 {
        sum += tree[i];
        i -= lowest_bit(i);
    }
    sum
}

/// Index of the first maximum. `None` for an empty iterator.
pub fn first_argmax<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (index, value)| match best {
            Some((_, max)) if value <= max || value.is_nan() => best,
            _ => Some((index, value)),
        })
        .map(|(index, _)| index)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FenwickTree {
    tree: Vec<f64>,
}

impl FenwickTree {
    pub fn new(len: usize) -> Self {
        Self {
            tree: vec![0.0; len + 1],
        }
    }

    pub fn from_values(values: &[f64]) -> Self {
        let mut tree = Self::new(values.len());
        for (index, &value) in values.iter().enumerate() {
            tree.add(index, value);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.tree.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, index: usize, delta: f64) -> Vec<usize> {
        update(&mut self.tree, index, delta)
    }

    pub fn prefix_sum(&self, index: usize) -> f64 {
        query(&self.tree, index)
    }

    pub fn prefix_sums(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.prefix_sum(i)).collect()
    }

    pub fn total(&self) -> f64 {
        match self.len() {
            0 => 0.0,
            len => self.prefix_sum(len - 1),
        }
    }

    /// The internal 1-based array, including the unused slot 0.
    pub fn as_slice(&self) -> &[f64] {
        &self.tree
    }
}
