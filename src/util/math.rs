//! Integer helpers for tolerance budgets and partitioning.

/// Number of mismatched pixels allowed by a tolerance percentage.
///
/// `percent` is the share of pixels that must match: 100 allows no errors,
/// 0 allows every pixel to differ. Intermediate values round to the nearest
/// pixel.
pub(crate) fn error_budget(percent: u8, pixels: usize) -> usize {
    match percent {
        p if p >= 100 => 0,
        0 => pixels,
        p => {
            let allowed = (100.0 - f64::from(p)) / 100.0 * pixels as f64;
            allowed.round() as usize
        }
    }
}

/// Share of required pixels that matched, in percent (capped at 100).
pub(crate) fn match_percentage(matched: usize, required: usize) -> f32 {
    if required == 0 {
        return 100.0;
    }
    ((matched as f64 / required as f64) * 100.0).min(100.0) as f32
}

/// Splits `start..start + len` into `parts` contiguous, nearly equal pieces.
///
/// Empty pieces are skipped, so fewer than `parts` ranges are returned when
/// `len < parts`. Each item is `(offset, length)`.
pub(crate) fn split_even(start: usize, len: usize, parts: usize) -> Vec<(usize, usize)> {
    let parts = parts.max(1);
    let mut out = Vec::with_capacity(parts.min(len));
    for i in 0..parts {
        let lo = len * i / parts;
        let hi = len * (i + 1) / parts;
        if hi > lo {
            out.push((start + lo, hi - lo));
        }
    }
    out
}
