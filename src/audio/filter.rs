//! Audio filter collaborator
//!
//! Filters are opaque in-place transforms. A stream only decides which bytes
//! a filter sees; what the filter does with them is its own business.

use std::fmt;
use std::sync::Arc;

use crate::interval::Interval;

/// In-place transform over a region of raw audio bytes.
///
/// Filters are shared between a stream and its clones, so `process` takes
/// `&self`; stateful filters keep their state behind their own lock.
pub trait AudioFilter: Send + Sync {
    /// Process this buffer region in place
    fn process(&self, data: &mut [u8]);

    /// Name used in log output
    fn name(&self) -> &str {
        "audio-filter"
    }
}

impl<F> AudioFilter for F
where
    F: Fn(&mut [u8]) + Send + Sync,
{
    fn process(&self, data: &mut [u8]) {
        self(data)
    }
}

/// A filter bound to the physical byte range it applies to
#[derive(Clone)]
pub struct FilterBinding {
    pub filter: Arc<dyn AudioFilter>,
    pub range: Interval<i64>,
}

impl FilterBinding {
    pub fn new(filter: Arc<dyn AudioFilter>, range: Interval<i64>) -> Self {
        Self { filter, range }
    }

    pub fn is_bound_to(&self, filter: &Arc<dyn AudioFilter>) -> bool {
        Arc::ptr_eq(&self.filter, filter)
    }

    /// Run the filter over the part of `data` that falls into its range.
    ///
    /// `data_start` is the physical position of `data[0]`.
    pub fn apply(&self, data: &mut [u8], data_start: i64) {
        let produced = Interval::new(data_start, data_start + data.len() as i64);

        if let Some(overlap) = self.range.intersection(&produced) {
            let from = (overlap.start - data_start) as usize;
            let to = (overlap.end - data_start) as usize;
            self.filter.process(&mut data[from..to]);
        }
    }
}

impl fmt::Debug for FilterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterBinding")
            .field("filter", &self.filter.name())
            .field("range", &self.range)
            .finish()
    }
}
