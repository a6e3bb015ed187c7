// src/metrics/parser.rs - Parse judge replies into scores

use super::CollectError;

/// Parse a judge reply such as `0.25` into a score in [0, 1].
///
/// Surrounding whitespace and a single trailing period are tolerated;
/// anything else (prose, NaN, out-of-range values) is rejected.
pub fn parse_score(reply: &str) -> Result<f64, CollectError> {
    let trimmed = reply.trim();
    let candidate = trimmed.strip_suffix('.').unwrap_or(trimmed).trim();

    let score: f64 = candidate
        .parse()
        .ok()
        .filter(|s: &f64| s.is_finite())
        .ok_or_else(|| CollectError::Unparseable {
            reply: trimmed.to_string(),
        })?;

    if !(0.0..=1.0).contains(&score) {
        return Err(CollectError::OutOfRange { score });
    }

    Ok(score)
}
