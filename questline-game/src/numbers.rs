//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Ratio of `part` to `whole` clamped to `[0, 1]`; an empty whole counts as done.
#[must_use]
pub fn clamped_ratio(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 1.0;
    }
    (i64_to_f64(part) / i64_to_f64(whole)).clamp(0.0, 1.0)
}

/// Convert a non-negative i64 to u64, flooring negatives at zero.
#[must_use]
pub fn non_negative_u64(value: i64) -> u64 {
    u64::try_from(value.max(0)).unwrap_or(0)
}

/// Convert a u64 to i64, saturating at `i64::MAX`.
#[must_use]
pub fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Pick an entry from a fixed table using a bounded roll.
#[must_use]
pub fn pick<'a>(table: &[&'a str], roll: u32) -> &'a str {
    let roll = usize::try_from(roll).unwrap_or(0);
    table.get(roll % table.len().max(1)).copied().unwrap_or("")
}
