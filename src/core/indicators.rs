//! Price-derived indicators computed from candle closes.

/// Recursive EMA with `k = 2 / (period + 1)`, seeded with the first close.
/// Returns one value per input close.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() || period == 0 {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(closes.len());
    let mut prev = closes[0];
    out.push(prev);
    for &close in &closes[1..] {
        prev = close * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Latest EMA value.
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period).last().copied()
}

/// Simple-average RSI over the last `period` price changes.
///
/// `None` when there are fewer than `period + 1` closes; a window with no
/// losses is 100.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Signed distance of `price` from `ema` in percent.
pub fn ema_distance_pct(price: f64, ema: f64) -> Option<f64> {
    if ema <= 0.0 {
        return None;
    }
    Some((price - ema) / ema * 100.0)
}
