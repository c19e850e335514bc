use std::collections::VecDeque;
/// Window length used for both velocity and force smoothing.
pub const FILTER_WINDOW_LEN: usize = 8;
/// Moving-average window: keeps the most recent `capacity` raw values of one channel.
#[derive(Clone, Debug)]
pub struct FilterWindow {
    values: VecDeque<f64>,
    capacity: usize,
}
impl FilterWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    /// Push a new value, evicting the oldest one once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }
    /// Mean of the current contents, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }
    /// Push `value` and return the filtered output, falling back to `value` itself.
    pub fn filter(&mut self, value: f64) -> f64 {
        self.push(value);
        self.mean().unwrap_or(value)
    }
    pub fn clear(&mut self) {
        self.values.clear();
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
}
impl Default for FilterWindow {
    fn default() -> Self {
        Self::new(FILTER_WINDOW_LEN)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }
    #[test]
    fn ninth_value_evicts_first() {
        let mut window = FilterWindow::default();
        for v in 1..=8 {
            window.push(v as f64);
        }
        assert_eq!(window.len(), 8);
        assert!(close(window.mean().unwrap(), 4.5));
        window.push(9.0);
        assert_eq!(window.len(), 8);
        // (2 + ... + 9) / 8
        assert!(close(window.mean().unwrap(), 5.5));
    }
    #[test]
    fn output_is_mean_of_recent_values_at_every_step() {
        let inputs = [3.0, -1.0, 4.0, 1.5, -5.0, 9.0, 2.0, 6.5, -3.0, 5.0, 8.0];
        let mut window = FilterWindow::default();
        for (i, &v) in inputs.iter().enumerate() {
            let out = window.filter(v);
            let start = (i + 1).saturating_sub(FILTER_WINDOW_LEN);
            let recent = &inputs[start..=i];
            let expected = recent.iter().sum::<f64>() / recent.len() as f64;
            assert!(close(out, expected), "step {i}: {out} != {expected}");
        }
    }
    #[test]
    fn empty_window_has_no_mean() {
        let mut window = FilterWindow::default();
        assert_eq!(window.mean(), None);
        window.push(2.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.mean(), None);
    }
}
