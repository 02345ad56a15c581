//! Pure, verifiable functions for instruction-count accounting and audio
//! ring indexing.
//!
//! Every function in this module is:
//! - **Pure**: no I/O, no locking, no side effects beyond the return value.
//! - **Deterministic**: same inputs always produce the same outputs.
//! - **Assertion-guarded**: Tiger Style `debug_assert!` postconditions.
//!
//! # Mapping to the engine
//!
//! | Verified function        | Used by                                 |
//! |--------------------------|-----------------------------------------|
//! | [`icount_delta`]         | `Session::advance_current_icount()`     |
//! | [`clip_to_break`]        | `Session::get_instructions()`           |
//! | [`nearest_at_or_before`] | `ReplayDebugger::seek()`                |
//! | [`ring_positions`]       | `Session::audio_in()`                   |

// ─── Instruction counting ───────────────────────────────────────────

/// Instructions between `current` and `target`.
///
/// Returns `None` when `target` lies behind `current`: the counter never
/// moves backwards.
pub fn icount_delta(current: u64, target: u64) -> Option<u64> {
    let delta = target.checked_sub(current);

    // Postcondition: a delta, when present, lands exactly on target.
    debug_assert!(
        delta.map_or(target < current, |d| current + d == target),
        "icount_delta: result must reach target"
    );

    delta
}

/// Clip an instruction budget so execution stops at a breakpoint.
///
/// A breakpoint at `current` leaves no budget at all; one behind `current`
/// does not constrain it.
///
/// # Examples
///
/// ```rust,ignore
/// assert_eq!(clip_to_break(100, 50, Some(120)), 20);
/// assert_eq!(clip_to_break(100, 50, Some(200)), 50);
/// assert_eq!(clip_to_break(100, 50, Some(100)), 0);
/// ```
pub fn clip_to_break(current: u64, budget: u32, break_icount: Option<u64>) -> u32 {
    let clipped = match break_icount {
        Some(brk) if brk >= current => {
            let until_break = brk - current;
            u32::try_from(until_break).map_or(budget, |until| budget.min(until))
        }
        _ => budget,
    };

    // Postcondition: clipping only ever shrinks the budget.
    debug_assert!(clipped <= budget, "clip_to_break: budget grew");
    // Postcondition: the clipped run never crosses the breakpoint.
    debug_assert!(
        break_icount.map_or(true, |brk| brk < current || current + clipped as u64 <= brk),
        "clip_to_break: run would overshoot the breakpoint"
    );

    clipped
}

/// Index of the latest point at or before `target`.
///
/// Ties go to the earliest listed point.
pub fn nearest_at_or_before(points: &[u64], target: u64) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &point) in points.iter().enumerate() {
        if point <= target && best.map_or(true, |b| point > points[b]) {
            best = Some(i);
        }
    }

    // Postcondition: the chosen point never lies past the target.
    debug_assert!(best.map_or(true, |b| points[b] <= target));
    // Postcondition: no other candidate is closer.
    debug_assert!(best.map_or(true, |b| points
        .iter()
        .all(|&p| p > target || p <= points[b])));

    best
}

// ─── Audio ring ─────────────────────────────────────────────────────

/// Ring indices holding the `recorded` most recent samples ending just
/// before `wpos`, oldest first.
///
/// Returns `None` if the ring is empty, `wpos` is outside it, or more
/// samples are claimed than the ring holds.
pub fn ring_positions(wpos: u64, recorded: u64, size: usize) -> Option<Vec<usize>> {
    let size64 = size as u64;
    if size == 0 || wpos >= size64 || recorded > size64 {
        return None;
    }
    let start = (wpos + size64 - recorded) % size64;
    let positions: Vec<usize> = (0..recorded)
        .map(|i| ((start + i) % size64) as usize)
        .collect();

    // Postcondition: one index per sample, all inside the ring.
    debug_assert_eq!(positions.len() as u64, recorded);
    debug_assert!(positions.iter().all(|&p| p < size));
    // Postcondition: the last sample sits right before the write position.
    debug_assert!(positions
        .last()
        .map_or(true, |&p| (p as u64 + 1) % size64 == wpos));

    Some(positions)
}
