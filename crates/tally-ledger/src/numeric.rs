/// Absolute nudge applied before truncation so that representation error
/// (e.g. `6.999999999999999` shares) does not cost a whole share.
const SHARE_EPSILON: f64 = 1e-9;

/// Largest share count a position may hold on either side. Keeps share
/// arithmetic (deltas, splits) far from `i64` overflow.
pub const MAX_SHARES: i64 = 1_000_000_000_000_000;

/// A price the ledger can trade or mark at: finite and strictly positive.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Convert a fractional share amount to whole shares, truncating toward zero.
///
/// Non-finite input yields zero shares. Truncation (never rounding) keeps
/// sizing from over-allocating capital. Results are clamped to
/// `±MAX_SHARES`.
pub fn truncate_shares(x: f64) -> i64 {
    if !x.is_finite() {
        return 0;
    }
    let bound = MAX_SHARES as f64;
    (x + SHARE_EPSILON.copysign(x)).trunc().clamp(-bound, bound) as i64
}

/// `num / den`, or 0 when the ratio is undefined.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() || !num.is_finite() {
        0.0
    } else {
        num / den
    }
}

pub(crate) fn commission(shares: i64, rate: f64) -> f64 {
    shares.unsigned_abs() as f64 * rate
}

/// Cash dividend per share; missing or non-finite values pay nothing.
pub(crate) fn sanitize_dividend(dividend: f64) -> Option<f64> {
    dividend.is_finite().then_some(dividend)
}

/// Split multiplier; must be finite and positive.
pub(crate) fn sanitize_split(multiplier: f64) -> Option<f64> {
    (multiplier.is_finite() && multiplier > 0.0).then_some(multiplier)
}
