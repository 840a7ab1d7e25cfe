//! Exclusion lists and the merge/walk algorithms shared by every stream layer
//!
//! Exclusions are stored exactly as callers hand them in. Merging happens on
//! demand: drop empty intervals, clip to the valid range, sort, then sweep
//! (touching intervals merge as well as overlapping ones).

use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// Ordered collection of physical-byte exclusions as given by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionList {
    intervals: Vec<Interval<i64>>,
}

impl ExclusionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, interval: Interval<i64>) {
        self.intervals.push(interval);
    }

    /// Remove the first interval equal to `interval`.
    pub fn remove(&mut self, interval: &Interval<i64>) -> bool {
        match self.intervals.iter().position(|iv| iv == interval) {
            Some(index) => {
                self.intervals.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn replace(&mut self, intervals: Vec<Interval<i64>>) {
        self.intervals = intervals;
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Interval<i64>> {
        self.intervals.clone()
    }

    /// Disjoint, sorted runs of the union clipped to `[min, max]`
    pub fn merged(&self, min: i64, max: i64) -> Vec<Interval<i64>> {
        merge_runs(&self.intervals, min, max)
    }

    /// Bytes covered by the merged runs inside `[min, max]`
    pub fn excluded_length(&self, min: i64, max: i64) -> i64 {
        self.merged(min, max).iter().map(|run| run.length()).sum()
    }
}

/// Collapse overlapping and touching intervals into sorted, disjoint runs.
pub fn merge_runs(intervals: &[Interval<i64>], min: i64, max: i64) -> Vec<Interval<i64>> {
    let mut clipped: Vec<Interval<i64>> = intervals
        .iter()
        .filter(|iv| !iv.is_empty())
        .map(|iv| iv.clipped(min, max))
        .filter(|iv| !iv.is_empty())
        .collect();

    clipped.sort_by_key(|iv| iv.start);

    let mut runs: Vec<Interval<i64>> = Vec::with_capacity(clipped.len());
    for iv in clipped {
        match runs.last_mut() {
            Some(current) if iv.start <= current.end => {
                current.end = current.end.max(iv.end);
            }
            _ => runs.push(iv),
        }
    }

    runs
}

/// Excluded bytes of `runs` at or after `position`
pub fn excluded_after(runs: &[Interval<i64>], position: i64) -> i64 {
    runs.iter()
        .filter(|run| run.end > position)
        .map(|run| run.end - run.start.max(position))
        .sum()
}

/// Physical position of virtual offset `virtual_pos`.
///
/// A virtual offset that lands on a run's start maps to the run's end, so
/// material placed there follows the removed range.
pub fn virtual_to_physical(runs: &[Interval<i64>], virtual_pos: i64) -> i64 {
    let mut physical = virtual_pos;
    for run in runs {
        if run.start <= physical {
            physical = physical.saturating_add(run.length());
        } else {
            break;
        }
    }
    physical
}

/// Virtual offset of `physical`, or `None` strictly inside an excluded run.
pub fn physical_to_virtual(runs: &[Interval<i64>], physical: i64) -> Option<i64> {
    let mut virtual_pos = physical;
    for run in runs {
        if run.end <= physical {
            virtual_pos -= run.length();
        } else if run.start < physical {
            return None;
        } else {
            break;
        }
    }
    Some(virtual_pos)
}

/// Next readable stretch for a cursor at `position`.
///
/// Returns the position to continue from and how many bytes (at most
/// `wanted`) can be taken from there before the next run or `limit`. A run
/// `[s, e)` takes the byte at `e` with it: the cursor resumes at `e + 1`.
/// Returns `None` once the cursor reaches `limit`.
pub fn next_span(runs: &[Interval<i64>], position: i64, limit: i64, wanted: usize) -> Option<(i64, usize)> {
    let mut position = position;

    for run in runs {
        if run.start > position {
            break;
        }
        if position <= run.end {
            position = (run.end + 1).min(limit);
        }
    }

    if position >= limit {
        return None;
    }

    let boundary = runs
        .iter()
        .find(|run| run.start > position)
        .map_or(limit, |run| run.start.min(limit));
    let wanted = wanted.min(i64::MAX as usize) as i64;
    let readable = (boundary - position).min(wanted) as usize;

    Some((position, readable))
}

/// Bytes a cursor walking `runs` from 0 to `limit` actually yields.
///
/// Unlike the half-open `limit - excluded`, every run ending below `limit`
/// also costs its end byte.
pub fn yielded_length(runs: &[Interval<i64>], limit: i64) -> i64 {
    let excluded: i64 = runs.iter().map(|run| run.length()).sum();
    let swallowed = runs.iter().filter(|run| run.end < limit).count() as i64;
    (limit - excluded - swallowed).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn iv(start: i64, end: i64) -> Interval<i64> {
        Interval::new(start, end)
    }

    fn list(intervals: &[(i64, i64)]) -> ExclusionList {
        let mut list = ExclusionList::new();
        for &(s, e) in intervals {
            list.add(iv(s, e));
        }
        list
    }

    #[test_case(&[(10, 20), (15, 25)], 15 ; "overlapping")]
    #[test_case(&[(10, 20), (20, 30)], 20 ; "adjacent")]
    #[test_case(&[(10, 30), (15, 25)], 20 ; "nested")]
    #[test_case(&[(10, 20), (15, 25), (30, 40)], 25 ; "overlapping plus disjoint")]
    #[test_case(&[(10, 10)], 0 ; "zero length")]
    #[test_case(&[(20, 10)], 0 ; "inverted")]
    #[test_case(&[], 0 ; "empty")]
    #[test_case(&[(-50, 10), (990, 2000)], 20 ; "clipped to bounds")]
    #[test_case(&[(2000, 3000)], 0 ; "wholly outside")]
    fn test_excluded_length(intervals: &[(i64, i64)], expected: i64) {
        assert_eq!(list(intervals).excluded_length(0, 1000), expected);
    }

    #[test]
    fn test_storage_keeps_degenerate_entries() {
        let exclusions = list(&[(10, 10), (20, 10), (0, 5)]);
        assert_eq!(exclusions.len(), 3);
        assert_eq!(exclusions.merged(0, 100), vec![iv(0, 5)]);
    }

    #[test]
    fn test_merged_is_sorted_and_disjoint() {
        let exclusions = list(&[(50, 60), (0, 5), (55, 70), (5, 8), (90, 95)]);
        assert_eq!(
            exclusions.merged(0, 100),
            vec![iv(0, 8), iv(50, 70), iv(90, 95)]
        );
    }

    #[test]
    fn test_remove_first_match_only() {
        let mut exclusions = list(&[(1, 2), (1, 2)]);
        assert!(exclusions.remove(&iv(1, 2)));
        assert_eq!(exclusions.len(), 1);
        assert!(!exclusions.remove(&iv(3, 4)));
    }

    #[test]
    fn test_excluded_after() {
        let runs = vec![iv(10, 20), iv(30, 40)];
        assert_eq!(excluded_after(&runs, 0), 20);
        assert_eq!(excluded_after(&runs, 15), 15);
        assert_eq!(excluded_after(&runs, 40), 0);
    }

    #[test]
    fn test_virtual_to_physical() {
        let runs = vec![iv(10, 20), iv(30, 40)];
        assert_eq!(virtual_to_physical(&runs, 5), 5);
        // Landing on a run start maps behind the run.
        assert_eq!(virtual_to_physical(&runs, 10), 20);
        assert_eq!(virtual_to_physical(&runs, 15), 25);
        assert_eq!(virtual_to_physical(&runs, 20), 40);
    }

    #[test]
    fn test_physical_to_virtual() {
        let runs = vec![iv(10, 20), iv(30, 40)];
        assert_eq!(physical_to_virtual(&runs, 5), Some(5));
        assert_eq!(physical_to_virtual(&runs, 10), Some(10));
        assert_eq!(physical_to_virtual(&runs, 15), None);
        assert_eq!(physical_to_virtual(&runs, 20), Some(10));
        assert_eq!(physical_to_virtual(&runs, 45), Some(25));
    }

    #[test]
    fn test_next_span_skips_run_and_its_end_byte() {
        let runs = vec![iv(0, 8)];
        assert_eq!(next_span(&runs, 0, 51, 8), Some((9, 8)));
    }

    #[test]
    fn test_next_span_stops_before_run() {
        let runs = vec![iv(4, 5)];
        assert_eq!(next_span(&runs, 0, 51, 8), Some((0, 4)));
        assert_eq!(next_span(&runs, 4, 51, 8), Some((6, 8)));
    }

    #[test]
    fn test_next_span_back_to_back_runs() {
        // [10, 20) swallows byte 20, then [21, 30) starts right there.
        let runs = vec![iv(10, 20), iv(21, 30)];
        assert_eq!(next_span(&runs, 10, 100, 4), Some((31, 4)));
    }

    #[test]
    fn test_next_span_at_limit() {
        let runs = vec![iv(40, 51)];
        assert_eq!(next_span(&runs, 40, 51, 8), None);
        assert_eq!(next_span(&[], 51, 51, 8), None);
    }

    #[test]
    fn test_next_span_unbounded_request() {
        let runs = vec![iv(10, 20)];
        assert_eq!(next_span(&[], 0, 10, usize::MAX), Some((0, 10)));
        assert_eq!(next_span(&runs, 10, 100, usize::MAX), Some((21, 79)));
    }

    #[test_case(&[], 100, 100 ; "no runs")]
    #[test_case(&[(10, 20), (40, 50)], 100, 78 ; "interior runs")]
    #[test_case(&[(10, 20), (21, 30)], 100, 79 ; "back to back")]
    #[test_case(&[(0, 10)], 100, 89 ; "leading run")]
    #[test_case(&[(90, 100)], 100, 90 ; "trailing run keeps its end")]
    #[test_case(&[(0, 100)], 100, 0 ; "everything")]
    fn test_yielded_length(runs: &[(i64, i64)], limit: i64, expected: i64) {
        let runs: Vec<_> = runs.iter().map(|&(s, e)| iv(s, e)).collect();
        assert_eq!(yielded_length(&runs, limit), expected);

        // The walk agrees.
        let mut position = 0;
        let mut yielded = 0;
        while let Some((from, readable)) = next_span(&runs, position, limit, usize::MAX) {
            yielded += readable as i64;
            position = from + readable as i64;
        }
        assert_eq!(yielded, expected);
    }
}
