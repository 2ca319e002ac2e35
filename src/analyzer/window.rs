use std::collections::VecDeque;

/// Fixed-capacity window over the most recent values
///
/// Pushing into a full window evicts the oldest value.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of values kept (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a value, returning the evicted one if the window was full
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.values.len() == self.capacity {
            self.values.pop_front()
        } else {
            None
        };
        self.values.push_back(value);
        evicted
    }

    /// Arithmetic mean of the held values, `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_window() {
        let window = SlidingWindow::new(3);
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 3);
        assert_eq!(window.mean(), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = SlidingWindow::new(0);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.mean(), Some(2.0));
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = SlidingWindow::new(3);

        assert_eq!(window.push(1.0), None);
        assert_eq!(window.push(2.0), None);
        assert_eq!(window.push(3.0), None);
        assert_eq!(window.push(4.0), Some(1.0));

        let held: Vec<f64> = window.iter().copied().collect();
        assert_eq!(held, vec![2.0, 3.0, 4.0]);
        assert_eq!(window.mean(), Some(3.0));
    }

    proptest! {
        #[test]
        fn test_window_never_exceeds_capacity(
            capacity in 1usize..10,
            values in prop::collection::vec(0.0f64..1000.0, 0..200),
        ) {
            let mut window = SlidingWindow::new(capacity);
            for v in &values {
                window.push(*v);
                prop_assert!(window.len() <= capacity);
            }
            prop_assert_eq!(window.len(), values.len().min(capacity));
        }
    }
}
