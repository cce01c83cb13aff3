//! Shape utilities for ONNX tensors
//!
//! Shapes are `Vec<i64>` with `-1` for a dimension whose size is unknown.

/// Calculate total number of elements from shape
pub fn numel(shape: &[i64]) -> usize {
    if shape.is_empty() {
        1 // scalar
    } else {
        shape.iter().map(|&d| d.max(0) as usize).product()
    }
}

/// Check if shape contains dynamic dimensions (negative values)
pub fn is_dynamic(shape: &[i64]) -> bool {
    shape.iter().any(|&d| d < 0)
}

/// Resolve `start`/`end` of a slice over `rank` elements
///
/// Negative bounds count from the back. `start` is clamped to `[0, rank]` and
/// `end` to `[start, rank]`, so the returned range is never inverted.
pub fn clamp_slice_bounds(start: i64, end: i64, rank: i64) -> (i64, i64) {
    let start = (start + if start < 0 { rank } else { 0 }).clamp(0, rank);
    let end = (end + if end < 0 { rank } else { 0 }).clamp(start, rank);
    (start, end)
}
