//! Indicator arithmetic over daily bars. Every function expects bars ordered
//! oldest first.

use chrono::NaiveDate;

use crate::models::{DailyBar, TechnicalIndicators};

const RSI_PERIOD: usize = 14;
const MA_SHORT_PERIOD: usize = 50;
const MA_LONG_PERIOD: usize = 200;
const HIGH_LOW_PERIOD: usize = 20;

/// Calendar days of history needed to cover 200 trading days.
pub const LOOKBACK_DAYS: u64 = 300;

pub fn compute(symbol: &str, fallback_date: NaiveDate, bars: &[DailyBar]) -> TechnicalIndicators {
    let (twenty_day_high, twenty_day_low) = twenty_day_high_low(bars).unzip();

    TechnicalIndicators {
        symbol: symbol.to_string(),
        as_of_date: bars.last().map_or(fallback_date, |bar| bar.date),
        rsi14: rsi14(bars),
        ma50: simple_moving_average(bars, MA_SHORT_PERIOD),
        ma200: simple_moving_average(bars, MA_LONG_PERIOD),
        twenty_day_high,
        twenty_day_low,
    }
}

/// Seeded with the plain average of the first 14 changes, then smoothed.
/// Needs at least 15 bars.
pub fn rsi14(bars: &[DailyBar]) -> Option<f64> {
    if bars.len() < RSI_PERIOD + 1 {
        return None;
    }

    let period = RSI_PERIOD as f64;
    let mut changes = bars.windows(2).map(|pair| pair[1].close - pair[0].close);

    let (mut avg_gain, mut avg_loss) = changes
        .by_ref()
        .take(RSI_PERIOD)
        .fold((0.0, 0.0), |(gain, loss), change| {
            (gain + change.max(0.0), loss + (-change).max(0.0))
        });
    avg_gain /= period;
    avg_loss /= period;

    for change in changes {
        avg_gain = (avg_gain * (period - 1.0) + change.max(0.0)) / period;
        avg_loss = (avg_loss * (period - 1.0) + (-change).max(0.0)) / period;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Mean close of the last `period` bars.
pub fn simple_moving_average(bars: &[DailyBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    Some(window.iter().map(|bar| bar.close).sum::<f64>() / period as f64)
}

/// Highest high and lowest low over the last 20 bars.
pub fn twenty_day_high_low(bars: &[DailyBar]) -> Option<(f64, f64)> {
    if bars.len() < HIGH_LOW_PERIOD {
        return None;
    }
    let window = &bars[bars.len() - HIGH_LOW_PERIOD..];
    let high = window.iter().map(|bar| bar.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|bar| bar.low).fold(f64::MAX, f64::min);
    Some((high, low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn series(closes: &[f64]) -> Vec<DailyBar> {
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                date: first + Days::new(i as u64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 100,
            })
            .collect()
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn rsi_needs_fifteen_bars() {
        assert_eq!(rsi14(&series(&[1.0; 14])), None);
        assert!(rsi14(&series(&[1.0; 15])).is_some());
    }

    #[test]
    fn rsi_is_100_without_losses() {
        let rising: Vec<f64> = (0..30).map(f64::from).collect();
        assert_eq!(rsi14(&series(&rising)), Some(100.0));
        // Flat prices have no losses either.
        assert_eq!(rsi14(&series(&[5.0; 20])), Some(100.0));
    }

    #[test]
    fn rsi_with_equal_gains_and_losses_is_50() {
        let zigzag: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        assert_close(rsi14(&series(&zigzag)), 50.0);
    }

    #[test]
    fn rsi_applies_wilder_smoothing() {
        // 14 alternating changes seed gain = loss = 0.5, then a +2 move.
        let mut closes: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        closes.push(12.0);
        let avg_gain = (0.5 * 13.0 + 2.0) / 14.0;
        let avg_loss = (0.5 * 13.0) / 14.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert_close(rsi14(&series(&closes)), expected);
    }

    #[test]
    fn moving_averages_use_the_latest_bars() {
        let closes: Vec<f64> = (1..=200).map(f64::from).collect();
        let bars = series(&closes);
        assert_close(simple_moving_average(&bars, 50), 175.5);
        assert_close(simple_moving_average(&bars, 200), 100.5);
        assert_eq!(simple_moving_average(&bars[..49], 50), None);
    }

    #[test]
    fn high_low_over_last_twenty() {
        let mut closes = vec![500.0];
        closes.extend((1..=20).map(f64::from));
        assert_eq!(twenty_day_high_low(&series(&closes)), Some((21.0, 0.0)));
        assert_eq!(twenty_day_high_low(&series(&closes[..19])), None);
    }

    #[test]
    fn compute_dates_from_the_last_bar() {
        let fallback = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let bars = series(&[1.0, 2.0, 3.0]);

        let result = compute("AAPL", fallback, &bars);
        assert_eq!(result.as_of_date, bars[2].date);
        assert_eq!(result.rsi14, None);
        assert_eq!(result.ma50, None);
        assert_eq!(result.twenty_day_high, None);

        assert_eq!(compute("AAPL", fallback, &[]).as_of_date, fallback);
    }
}
