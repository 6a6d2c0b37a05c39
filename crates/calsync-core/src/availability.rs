//! Free-slot enumeration and conflict detection.
//!
//! Slot enumeration works on a normalized busy list: intervals are sorted by
//! start and merged when they overlap or touch. Conflict detection never uses
//! the merged list; it tests the candidate against every original busy
//! interval, so the two operations can be checked independently.

use chrono::{DateTime, Duration, Utc};

use crate::error::{DomainError, DomainResult};
use crate::event::BusyInterval;
use crate::time::TimeInterval;

/// The window of a single day inside which free slots are searched.
///
/// Usually obtained from [`BusinessHours::window_on`](crate::time::BusinessHours::window_on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    window: TimeInterval,
}

impl AvailabilityWindow {
    /// Creates a window from its opening and closing instants.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidWindow`] if `open >= close`.
    pub fn new(open: DateTime<Utc>, close: DateTime<Utc>) -> DomainResult<Self> {
        TimeInterval::new(open, close)
            .map(Self::from)
            .map_err(|_| DomainError::InvalidWindow {
                open: open.to_rfc3339(),
                close: close.to_rfc3339(),
            })
    }

    /// The window as an interval.
    pub fn interval(&self) -> TimeInterval {
        self.window
    }

    /// Enumerates the maximal free intervals of at least `requested` length.
    ///
    /// `busy` may be unsorted and may contain overlapping or out-of-window
    /// entries. The result is chronological and computed fresh on every call.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidDuration`] if `requested` is not positive.
    pub fn free_slots(
        &self,
        busy: &[BusyInterval],
        requested: Duration,
    ) -> DomainResult<Vec<TimeInterval>> {
        if requested <= Duration::zero() {
            return Err(DomainError::InvalidDuration {
                minutes: requested.num_minutes(),
            });
        }
        if requested > self.window.duration() {
            return Ok(Vec::new());
        }

        let merged = merge_busy(busy.iter().map(|b| b.interval));
        let mut slots = Vec::new();
        let mut cursor = self.window.start();

        for block in &merged {
            if block.end() <= cursor {
                continue;
            }
            if block.start() >= self.window.end() {
                break;
            }
            push_if_fits(&mut slots, cursor, block.start().min(self.window.end()), requested);
            cursor = cursor.max(block.end());
        }
        push_if_fits(&mut slots, cursor, self.window.end(), requested);

        Ok(slots)
    }
}

impl From<TimeInterval> for AvailabilityWindow {
    fn from(window: TimeInterval) -> Self {
        Self { window }
    }
}

fn push_if_fits(
    slots: &mut Vec<TimeInterval>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    requested: Duration,
) {
    if let Ok(slot) = TimeInterval::new(start, end)
        && slot.duration() >= requested
    {
        slots.push(slot);
    }
}

/// Sorts intervals by start and merges those that overlap or touch.
///
/// Merging an already merged list returns it unchanged.
pub fn merge_busy(intervals: impl IntoIterator<Item = TimeInterval>) -> Vec<TimeInterval> {
    let mut sorted: Vec<TimeInterval> = intervals.into_iter().collect();
    sorted.sort();

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        if let Some(last) = merged.last_mut()
            && interval.start() <= last.end()
        {
            if interval.end() > last.end() {
                *last = TimeInterval::new(last.start(), interval.end())
                    .unwrap_or(*last);
            }
            continue;
        }
        merged.push(interval);
    }
    merged
}

/// True if `candidate` overlaps any busy interval.
pub fn has_conflict(candidate: &TimeInterval, busy: &[BusyInterval]) -> bool {
    busy.iter().any(|b| candidate.overlaps(&b.interval))
}

/// Returns the busy intervals overlapping `candidate`, in input order.
pub fn conflicts<'a>(candidate: &TimeInterval, busy: &'a [BusyInterval]) -> Vec<&'a BusyInterval> {
    busy.iter()
        .filter(|b| candidate.overlaps(&b.interval))
        .collect()
}
