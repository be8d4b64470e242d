//! Template matcher
//!
//! Byte-exact similarity between two opaque templates. The score is the
//! share of positions holding equal bytes, so it only detects identical or
//! slightly corrupted copies; it has no tolerance for re-captured samples.

/// Similarity of two templates as a percentage in `[0, 100]`.
///
/// Returns 0 when either template is absent, when the lengths differ, or
/// when both are empty.
pub fn similarity(a: Option<&[u8]>, b: Option<&[u8]>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return 0.0,
    };

    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let matching = a.iter().zip(b).filter(|(x, y)| x == y).count();
    (matching as f64 / a.len() as f64) * 100.0
}
