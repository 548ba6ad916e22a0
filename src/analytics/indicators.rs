//! Momentum, RSI, and liquidity indicators over daily price series.

/// RSI lookback in samples (daily averages).
pub const RSI_PERIOD: usize = 14;

/// Neutral RSI reported when the series is too short to evaluate.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Trailing/preceding window length for the momentum comparison.
pub const MOMENTUM_WINDOW: usize = 7;

/// Reference listing count at which the listing sub-score saturates.
pub const REFERENCE_LISTING_COUNT: f64 = 50.0;

/// Reference sales-per-day rate at which the velocity sub-score saturates.
pub const REFERENCE_DAILY_SALES: f64 = 10.0;

const SUB_SCORE_CAP: f64 = 100.0 / 3.0;

/// RSI over a series of daily average prices.
///
/// Gains and losses are summed over the trailing `RSI_PERIOD` deltas;
/// `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`, defined as 100 when the
/// window has no losses and as the neutral 50 when fewer than
/// `RSI_PERIOD + 1` samples exist.
pub fn rsi(daily_averages: &[f64]) -> f64 {
    if daily_averages.len() < RSI_PERIOD + 1 {
        return RSI_NEUTRAL;
    }
    let window = &daily_averages[daily_averages.len() - (RSI_PERIOD + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses += -delta;
        }
    }
    if losses == 0.0 {
        return 100.0;
    }
    let avg_gain = gains / RSI_PERIOD as f64;
    let avg_loss = losses / RSI_PERIOD as f64;
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Momentum: mean of the trailing seven samples against the mean of the
/// seven before them, as a percentage clamped to [-100, 100]. Zero when
/// there is not enough history or the prior window mean is zero.
pub fn momentum(daily_averages: &[f64]) -> f64 {
    if daily_averages.len() < MOMENTUM_WINDOW * 2 {
        return 0.0;
    }
    let len = daily_averages.len();
    let recent = mean(&daily_averages[len - MOMENTUM_WINDOW..]);
    let prior = mean(&daily_averages[len - MOMENTUM_WINDOW * 2..len - MOMENTUM_WINDOW]);
    if prior == 0.0 {
        return 0.0;
    }
    ((recent - prior) / prior * 100.0).clamp(-100.0, 100.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Min/max/count view of the active listing book.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ListingSnapshot {
    pub count: usize,
    pub min_price_eth: f64,
    pub max_price_eth: f64,
}

/// Liquidity score in [0, 100]: the sum of three sub-scores, each capped at
/// 33.3 — listing depth against a reference count, sales velocity against a
/// reference daily rate, and a spread penalty that shrinks as the relative
/// spread between the cheapest and dearest active listing widens.
pub fn liquidity_score(listings: Option<&ListingSnapshot>, sales_per_day: f64) -> f64 {
    let listing_score = match listings {
        Some(snapshot) => {
            SUB_SCORE_CAP * (snapshot.count as f64 / REFERENCE_LISTING_COUNT).min(1.0)
        }
        None => 0.0,
    };

    let velocity_score =
        SUB_SCORE_CAP * (sales_per_day.max(0.0) / REFERENCE_DAILY_SALES).min(1.0);

    let spread_score = match listings {
        Some(snapshot) if snapshot.count > 0 && snapshot.min_price_eth > 0.0 => {
            let relative_spread =
                (snapshot.max_price_eth - snapshot.min_price_eth) / snapshot.min_price_eth;
            SUB_SCORE_CAP * (1.0 - relative_spread.min(1.0))
        }
        _ => 0.0,
    };

    (listing_score + velocity_score + spread_score).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_is_100_on_monotonic_rise() {
        let series: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        assert_eq!(rsi(&series), 100.0);
    }

    #[test]
    fn rsi_is_0_on_monotonic_fall() {
        let series: Vec<f64> = (1..=20).rev().map(|i| i as f64).collect();
        assert_eq!(rsi(&series), 0.0);
    }

    #[test]
    fn rsi_neutral_with_short_series() {
        let series: Vec<f64> = (1..=14).map(|i| i as f64).collect();
        assert_eq!(rsi(&series), RSI_NEUTRAL);
    }

    #[test]
    fn rsi_balanced_series_is_midrange() {
        // Alternating +1/-1 deltas: equal gains and losses -> RSI 50.
        let series: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let value = rsi(&series);
        assert!((value - 50.0).abs() < 5.0, "got {}", value);
    }

    #[test]
    fn momentum_detects_rising_prices() {
        let mut series = vec![10.0; 7];
        series.extend(vec![15.0; 7]);
        assert_eq!(momentum(&series), 50.0);
    }

    #[test]
    fn momentum_clamps_extremes() {
        let mut series = vec![1.0; 7];
        series.extend(vec![10.0; 7]);
        assert_eq!(momentum(&series), 100.0);
    }

    #[test]
    fn momentum_zero_without_history() {
        assert_eq!(momentum(&[10.0, 11.0, 12.0]), 0.0);
    }

    #[test]
    fn liquidity_score_saturates_at_100() {
        let listings = ListingSnapshot {
            count: 500,
            min_price_eth: 1.0,
            max_price_eth: 1.0,
        };
        let score = liquidity_score(Some(&listings), 100.0);
        assert!((score - 100.0).abs() < 0.1, "got {}", score);
    }

    #[test]
    fn wide_spread_erodes_the_score() {
        let tight = ListingSnapshot { count: 50, min_price_eth: 1.0, max_price_eth: 1.1 };
        let wide = ListingSnapshot { count: 50, min_price_eth: 1.0, max_price_eth: 5.0 };
        assert!(
            liquidity_score(Some(&tight), 0.0) > liquidity_score(Some(&wide), 0.0)
        );
    }

    #[test]
    fn no_listings_no_listing_score() {
        let score = liquidity_score(None, 10.0);
        assert!((score - SUB_SCORE_CAP).abs() < 0.1, "got {}", score);
    }
}
