use std::collections::VecDeque;

use parking_lot::Mutex;

/// A small ring of observed bytes-per-token ratios used to estimate token
/// counts from message sizes. Until enough traffic has been seen, a fixed
/// default is reported.
pub struct Samples {
    default_value: f32,
    capacity: usize,
    values: Mutex<VecDeque<f32>>,
}

impl Samples {
    pub(crate) fn new(capacity: usize, default_value: f32) -> Self {
        Self {
            default_value,
            capacity,
            values: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn put(&self, value: f32) {
        let mut values = self.values.lock();
        if values.len() == self.capacity {
            values.pop_front();
        }
        values.push_back(value);
    }

    /// The average observed bytes-per-token ratio, or the default when no
    /// samples have been recorded yet.
    pub fn bytes_per_tok(&self) -> f32 {
        let values = self.values.lock();
        if values.is_empty() {
            return self.default_value;
        }
        values.iter().sum::<f32>() / values.len() as f32
    }
}
