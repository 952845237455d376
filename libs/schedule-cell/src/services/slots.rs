//! Slot computation over a doctor's weekly schedule entries.
//!
//! Everything here is a pure function of its inputs: the service layer
//! fetches the rows, this module does the arithmetic. Slots are generated
//! on demand and never persisted.

use chrono::{Duration, NaiveTime};

use crate::models::{BookedInterval, Schedule};

/// Slot starts for a single schedule window, walking forward from
/// `start_time` in fixed increments. A slot ending exactly at the window's
/// end is valid; a window shorter than one slot yields nothing.
pub fn entry_slot_starts(entry: &Schedule, slot_duration: Duration) -> Vec<NaiveTime> {
    let mut starts = Vec::new();
    let mut current = entry.start_time;

    loop {
        let (slot_end, wrapped) = current.overflowing_add_signed(slot_duration);
        if wrapped != 0 || slot_end > entry.end_time {
            break;
        }
        starts.push(current);
        current = slot_end;
    }

    starts
}

/// Open slot starts for one day, across all ACTIVE entries, with booked
/// intervals subtracted. Output is ascending and deduplicated; overlapping
/// input entries are tolerated even though the store should reject them.
pub fn compute_available_slots(
    entries: &[Schedule],
    booked: &[BookedInterval],
    slot_duration: Duration,
) -> Vec<NaiveTime> {
    let mut slots: Vec<NaiveTime> = entries
        .iter()
        .filter(|entry| entry.is_active())
        .flat_map(|entry| entry_slot_starts(entry, slot_duration))
        .filter(|start| {
            let end = *start + slot_duration;
            !booked.iter().any(|interval| interval.overlaps(*start, end))
        })
        .collect();

    slots.sort();
    slots.dedup();
    slots
}

/// A candidate interval is free only if it lies entirely within at least one
/// ACTIVE entry and does not intersect any booked interval.
pub fn is_slot_free(
    entries: &[Schedule],
    booked: &[BookedInterval],
    start: NaiveTime,
    end: NaiveTime,
) -> bool {
    let within_schedule = entries
        .iter()
        .any(|entry| entry.is_active() && entry.contains(start, end));

    within_schedule && !booked.iter().any(|interval| interval.overlaps(start, end))
}

/// Rejects overlapping ACTIVE windows on the same day within a submitted
/// weekly set. Returns the offending pair's day when found.
pub fn find_internal_overlap(entries: &[(u32, NaiveTime, NaiveTime)]) -> Option<u32> {
    for (i, (day_a, start_a, end_a)) in entries.iter().enumerate() {
        for (day_b, start_b, end_b) in entries.iter().skip(i + 1) {
            if day_a == day_b && start_a < end_b && end_a > start_b {
                return Some(*day_a);
            }
        }
    }
    None
}
