//! Exclusion and filter layer over any byte source
//!
//! A `DynamicInputStream` keeps its own exclusion list on top of whatever
//! the wrapped source already skips, so editing layers stack without seeing
//! each other's edits. It also hosts the range-bound filter pipeline.
//!
//! Physical coordinates of this layer are the output coordinates of the
//! wrapped source.

use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::audio::filter::{AudioFilter, FilterBinding};
use crate::error::Result;
use crate::interval::Interval;
use crate::stream::exclusion::{self, ExclusionList};
use crate::stream::source::ByteSource;

struct DynamicState {
    source: Box<dyn ByteSource>,
    /// Cursor of the wrapped source
    physical: i64,
    /// Bytes handed to the caller by read and skip
    virtual_pos: i64,
    exclusions: ExclusionList,
    /// Exclusions restored by `reset`
    snapshot: ExclusionList,
    filters: Vec<FilterBinding>,
    read_limit: Option<u64>,
}

impl DynamicState {
    /// Physical end of the readable region
    fn limit(&self) -> i64 {
        let len = self.source.len() as i64;
        self.read_limit.map_or(len, |limit| (limit as i64).min(len))
    }

    fn runs(&self) -> Vec<Interval<i64>> {
        self.exclusions.merged(0, self.limit())
    }

    /// Move the source cursor forward to `target`. Returns false if the
    /// source ran out first.
    fn advance_to(&mut self, target: i64) -> Result<bool> {
        if target <= self.physical {
            return Ok(true);
        }

        let gap = (target - self.physical) as u64;
        let skipped = self.source.skip(gap)?;
        self.physical += skipped as i64;

        Ok(skipped == gap)
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.rewind()?;
        self.physical = 0;
        self.virtual_pos = 0;
        Ok(())
    }
}

/// Byte stream with its own exclusion list and filter pipeline
pub struct DynamicInputStream {
    state: Mutex<DynamicState>,
}

impl DynamicInputStream {
    pub fn new(source: impl ByteSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: Box<dyn ByteSource>) -> Self {
        Self {
            state: Mutex::new(DynamicState {
                source,
                physical: 0,
                virtual_pos: 0,
                exclusions: ExclusionList::new(),
                snapshot: ExclusionList::new(),
                filters: Vec::new(),
                read_limit: None,
            }),
        }
    }

    /// Stop reads at physical position `limit`; trailing bytes of the
    /// source are treated as absent.
    pub(crate) fn set_read_limit(&self, limit: Option<u64>) {
        self.state.lock().read_limit = limit;
    }

    /// Copy up to `buf.len()` non-excluded bytes with all filters applied.
    ///
    /// Returns 0 at the end of the stream.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let limit = state.limit();
        let runs = state.runs();
        let mut filled = 0;

        while filled < buf.len() {
            let Some((from, readable)) =
                exclusion::next_span(&runs, state.physical, limit, buf.len() - filled)
            else {
                state.advance_to(limit)?;
                break;
            };

            if !state.advance_to(from)? {
                break;
            }

            let chunk = &mut buf[filled..filled + readable];
            let n = state.source.read(chunk)?;
            if n == 0 {
                break;
            }

            for binding in &state.filters {
                binding.apply(&mut chunk[..n], state.physical);
            }

            state.physical += n as i64;
            state.virtual_pos += n as i64;
            filled += n;
        }

        trace!(
            "read {} bytes, physical {} virtual {}",
            filled,
            state.physical,
            state.virtual_pos
        );
        Ok(filled)
    }

    /// Advance by `n` non-excluded bytes, returning how many were skipped.
    pub fn skip(&self, n: u64) -> Result<u64> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let limit = state.limit();
        let runs = state.runs();
        let mut skipped = 0u64;

        while skipped < n {
            let wanted = (n - skipped).min(usize::MAX as u64) as usize;
            let Some((from, readable)) = exclusion::next_span(&runs, state.physical, limit, wanted)
            else {
                state.advance_to(limit)?;
                break;
            };

            if !state.advance_to(from)? {
                break;
            }

            let before = state.physical;
            state.advance_to(from + readable as i64)?;
            let moved = state.physical - before;
            state.virtual_pos += moved;
            skipped += moved as u64;

            if moved < readable as i64 {
                break;
            }
        }

        Ok(skipped)
    }

    /// Remaining non-excluded bytes, never negative
    pub fn available(&self) -> u64 {
        let state = self.state.lock();
        let runs = state.runs();
        let remaining =
            state.limit() - state.physical - exclusion::excluded_after(&runs, state.physical);

        remaining.max(0) as u64
    }

    /// Virtual bytes consumed so far
    pub fn position(&self) -> u64 {
        self.state.lock().virtual_pos as u64
    }

    pub fn virtual_position(&self) -> u64 {
        self.position()
    }

    /// Cursor of the wrapped source
    pub fn physical_position(&self) -> u64 {
        self.state.lock().physical as u64
    }

    /// Length of the wrapped source (or the read limit, if lower)
    pub fn physical_length(&self) -> u64 {
        self.state.lock().limit().max(0) as u64
    }

    /// Bytes this layer yields: physical length minus excluded length
    pub fn len(&self) -> u64 {
        let state = self.state.lock();
        let limit = state.limit();
        (limit - state.exclusions.excluded_length(0, limit)).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture the current exclusions as the state `reset` returns to.
    pub fn mark(&self) {
        let mut state = self.state.lock();
        state.snapshot = state.exclusions.clone();
    }

    /// Rewind to the start and restore the exclusions captured by the last
    /// `mark` (or at construction).
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.rewind()?;
        state.exclusions = state.snapshot.clone();
        Ok(())
    }

    /// Rewind to the start, exclusions untouched.
    pub fn rewind(&self) -> Result<()> {
        self.state.lock().rewind()
    }

    pub fn add_exclusion(&self, interval: Interval<i64>) {
        debug!("exclude {}", interval);
        self.state.lock().exclusions.add(interval);
    }

    pub fn remove_exclusion(&self, interval: &Interval<i64>) -> bool {
        let removed = self.state.lock().exclusions.remove(interval);
        if removed {
            debug!("removed exclusion {}", interval);
        }
        removed
    }

    pub fn clear_exclusions(&self) {
        self.state.lock().exclusions.clear();
    }

    pub fn set_exclusions(&self, intervals: Vec<Interval<i64>>) {
        self.state.lock().exclusions.replace(intervals);
    }

    pub fn exclusions(&self) -> Vec<Interval<i64>> {
        self.state.lock().exclusions.to_vec()
    }

    pub fn excluded_length(&self) -> i64 {
        let state = self.state.lock();
        state.exclusions.excluded_length(0, state.limit())
    }

    /// Merged runs clipped to `[min, max]`, for callers with their own bounds
    pub fn merged_exclusions(&self, min: i64, max: i64) -> Vec<Interval<i64>> {
        self.state.lock().exclusions.merged(min, max)
    }

    /// Physical position of virtual byte `virtual_pos`; a virtual position
    /// on a run boundary maps to the run's end.
    pub fn virtual_to_physical(&self, virtual_pos: i64) -> i64 {
        let runs = self.state.lock().runs();
        exclusion::virtual_to_physical(&runs, virtual_pos)
    }

    /// Virtual position of `physical`, `None` strictly inside an excluded run.
    pub fn physical_to_virtual(&self, physical: i64) -> Option<i64> {
        let runs = self.state.lock().runs();
        exclusion::physical_to_virtual(&runs, physical)
    }

    /// Bind `filter` to the physical byte `range`.
    ///
    /// Binding a filter that is already bound moves it to the new range and
    /// keeps its place in the pipeline.
    pub fn set_audio_filter(&self, filter: Arc<dyn AudioFilter>, range: Interval<i64>) {
        let mut state = self.state.lock();

        match state.filters.iter_mut().find(|b| b.is_bound_to(&filter)) {
            Some(binding) => {
                debug!("filter '{}' moved to {}", filter.name(), range);
                binding.range = range;
            }
            None => {
                debug!("filter '{}' bound to {}", filter.name(), range);
                state.filters.push(FilterBinding::new(filter, range));
            }
        }
    }

    pub fn remove_audio_filter(&self, filter: &Arc<dyn AudioFilter>) -> bool {
        let mut state = self.state.lock();
        let before = state.filters.len();
        state.filters.retain(|b| !b.is_bound_to(filter));
        before != state.filters.len()
    }

    /// Current bindings in application order
    pub fn audio_filters(&self) -> Vec<FilterBinding> {
        self.state.lock().filters.clone()
    }

    /// Deep copy: exclusions, filter bindings and a fresh source cursor.
    ///
    /// The copy's reset snapshot is the exclusion list at the time of cloning.
    pub fn try_clone(&self) -> Result<Self> {
        let state = self.state.lock();
        let source = state.source.try_clone_source()?;

        debug!(
            "cloned dynamic stream ({} exclusions, {} filters)",
            state.exclusions.len(),
            state.filters.len()
        );

        Ok(Self {
            state: Mutex::new(DynamicState {
                source,
                physical: 0,
                virtual_pos: 0,
                exclusions: state.exclusions.clone(),
                snapshot: state.exclusions.clone(),
                filters: state.filters.clone(),
                read_limit: state.read_limit,
            }),
        })
    }

    pub fn close(&self) -> Result<()> {
        self.state.lock().source.close()
    }
}

impl std::fmt::Debug for DynamicInputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DynamicInputStream")
            .field("physical", &state.physical)
            .field("virtual", &state.virtual_pos)
            .field("exclusions", &state.exclusions)
            .field("filters", &state.filters)
            .finish()
    }
}

impl ByteSource for DynamicInputStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        DynamicInputStream::read(self, buf)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        DynamicInputStream::skip(self, n)
    }

    /// Bytes an outer layer actually receives, end bytes of interior runs
    /// included
    fn len(&self) -> u64 {
        let state = self.state.lock();
        exclusion::yielded_length(&state.runs(), state.limit()) as u64
    }

    fn rewind(&mut self) -> Result<()> {
        DynamicInputStream::rewind(self)
    }

    fn try_clone_source(&self) -> Result<Box<dyn ByteSource>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn close(&mut self) -> Result<()> {
        DynamicInputStream::close(self)
    }
}
