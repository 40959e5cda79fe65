//! Broad-market regime filter.
//!
//! Checks run in priority order against the last reference bar at or before
//! the query date:
//! 1. volatility proxy >= threshold -> blocked, `high_volatility`
//! 2. drawdown from the rolling high > crash threshold -> blocked, `market_crash`
//! 3. close below the long MA -> blocked, `bear_market`
//! 4. otherwise allowed, strength from the count of bullish sub-conditions.
//!
//! Missing reference data fails open: trading is allowed with reason
//! `regime_data_unavailable`.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::indicator::sma::sma_values;
use crate::domain::price_bar::PriceBar;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeConfig {
    pub enabled: bool,
    pub reference_symbol: String,
    pub volatility_symbol: String,
    pub volatility_threshold: f64,
    /// Fractional drawdown from the rolling high, e.g. 0.10.
    pub crash_threshold: f64,
    pub crash_lookback: usize,
    pub short_ma: usize,
    pub long_ma: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            enabled: true,
            reference_symbol: "SPY".to_string(),
            volatility_symbol: "VIXY".to_string(),
            volatility_threshold: 30.0,
            crash_threshold: 0.10,
            crash_lookback: 20,
            short_ma: 50,
            long_ma: 200,
        }
    }
}

impl RegimeConfig {
    pub fn disabled() -> Self {
        RegimeConfig {
            enabled: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeReason {
    Disabled,
    RegimeDataUnavailable,
    HighVolatility,
    MarketCrash,
    BearMarket,
    Bullish,
}

impl RegimeReason {
    /// Blocking reasons that liquidate an open position.
    pub fn forces_exit(self) -> bool {
        matches!(self, RegimeReason::HighVolatility | RegimeReason::MarketCrash)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegimeReason::Disabled => "disabled",
            RegimeReason::RegimeDataUnavailable => "regime_data_unavailable",
            RegimeReason::HighVolatility => "high_volatility",
            RegimeReason::MarketCrash => "market_crash",
            RegimeReason::BearMarket => "bear_market",
            RegimeReason::Bullish => "bullish",
        }
    }
}

impl fmt::Display for RegimeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeLabel {
    Unknown,
    Volatile,
    Crash,
    Bear,
    Bull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeStrength {
    Strong,
    Moderate,
    Weak,
}

impl RegimeStrength {
    fn from_count(count: usize) -> Self {
        match count {
            5.. => RegimeStrength::Strong,
            3 | 4 => RegimeStrength::Moderate,
            _ => RegimeStrength::Weak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeSnapshot {
    pub date: NaiveDate,
    pub label: RegimeLabel,
    pub strength: Option<RegimeStrength>,
    pub can_trade: bool,
    pub reason: RegimeReason,
}

impl RegimeSnapshot {
    fn open(date: NaiveDate, reason: RegimeReason) -> Self {
        RegimeSnapshot {
            date,
            label: RegimeLabel::Unknown,
            strength: None,
            can_trade: true,
            reason,
        }
    }

    fn blocked(date: NaiveDate, label: RegimeLabel, reason: RegimeReason) -> Self {
        RegimeSnapshot {
            date,
            label,
            strength: None,
            can_trade: false,
            reason,
        }
    }
}

#[derive(Debug, Clone)]
struct ReferenceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
    short_ma: Vec<Option<f64>>,
    long_ma: Vec<Option<f64>>,
    rolling_high: Vec<f64>,
}

impl ReferenceSeries {
    fn build(bars: &[PriceBar], config: &RegimeConfig) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let lookback = config.crash_lookback.max(1);
        let rolling_high = (0..closes.len())
            .map(|i| {
                let from = (i + 1).saturating_sub(lookback);
                closes[from..=i]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .collect();
        ReferenceSeries {
            dates: bars.iter().map(PriceBar::date).collect(),
            short_ma: sma_values(&closes, config.short_ma.max(1)),
            long_ma: sma_values(&closes, config.long_ma.max(1)),
            rolling_high,
            closes,
        }
    }
}

#[derive(Debug, Clone)]
struct VolatilitySeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

/// Last index whose date is at or before `date`.
fn at_or_before(dates: &[NaiveDate], date: NaiveDate) -> Option<usize> {
    dates.partition_point(|d| *d <= date).checked_sub(1)
}

#[derive(Debug, Clone)]
pub struct RegimeFilter {
    config: RegimeConfig,
    reference: Option<ReferenceSeries>,
    volatility: Option<VolatilitySeries>,
}

impl RegimeFilter {
    /// Precompute moving averages and rolling highs. `reference` of `None` or
    /// empty makes every query fail open.
    pub fn new(
        config: RegimeConfig,
        reference: Option<&[PriceBar]>,
        volatility: Option<&[PriceBar]>,
    ) -> Self {
        let reference = reference
            .filter(|bars| !bars.is_empty())
            .map(|bars| ReferenceSeries::build(bars, &config));
        if config.enabled && reference.is_none() {
            tracing::warn!(
                symbol = %config.reference_symbol,
                "regime reference data unavailable, trading is permitted"
            );
        }
        let volatility = volatility
            .filter(|bars| !bars.is_empty())
            .map(|bars| VolatilitySeries {
                dates: bars.iter().map(PriceBar::date).collect(),
                closes: bars.iter().map(|b| b.close).collect(),
            });
        RegimeFilter {
            config,
            reference,
            volatility,
        }
    }

    pub fn disabled() -> Self {
        RegimeFilter::new(RegimeConfig::disabled(), None, None)
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn evaluate(&self, date: NaiveDate) -> RegimeSnapshot {
        if !self.config.enabled {
            return RegimeSnapshot::open(date, RegimeReason::Disabled);
        }
        let Some(reference) = self.reference.as_ref() else {
            return RegimeSnapshot::open(date, RegimeReason::RegimeDataUnavailable);
        };
        let Some(i) = at_or_before(&reference.dates, date) else {
            return RegimeSnapshot::open(date, RegimeReason::RegimeDataUnavailable);
        };

        let volatility = self.volatility.as_ref().and_then(|v| {
            at_or_before(&v.dates, date).map(|j| v.closes[j])
        });
        if let Some(vol) = volatility {
            if vol >= self.config.volatility_threshold {
                return RegimeSnapshot::blocked(
                    date,
                    RegimeLabel::Volatile,
                    RegimeReason::HighVolatility,
                );
            }
        }

        let close = reference.closes[i];
        let high = reference.rolling_high[i];
        if high > 0.0 && (high - close) / high > self.config.crash_threshold {
            return RegimeSnapshot::blocked(date, RegimeLabel::Crash, RegimeReason::MarketCrash);
        }

        let short_ma = reference.short_ma[i];
        let long_ma = reference.long_ma[i];
        if let Some(long) = long_ma {
            if close < long {
                return RegimeSnapshot::blocked(date, RegimeLabel::Bear, RegimeReason::BearMarket);
            }
        }

        let conditions = [
            short_ma.is_some_and(|s| close > s),
            long_ma.is_some_and(|l| close > l),
            matches!((short_ma, long_ma), (Some(s), Some(l)) if s > l),
            volatility.is_some_and(|v| v < self.config.volatility_threshold),
            true,
        ];
        let count = conditions.iter().filter(|&&c| c).count();

        RegimeSnapshot {
            date,
            label: RegimeLabel::Bull,
            strength: Some(RegimeStrength::from_count(count)),
            can_trade: true,
            reason: RegimeReason::Bullish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: (start + chrono::Duration::days(i as i64))
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn small_config() -> RegimeConfig {
        RegimeConfig {
            crash_lookback: 5,
            short_ma: 2,
            long_ma: 4,
            ..Default::default()
        }
    }

    #[test]
    fn disabled_always_allows() {
        let snap = RegimeFilter::disabled().evaluate(day(0));
        assert!(snap.can_trade);
        assert_eq!(snap.reason, RegimeReason::Disabled);
    }

    #[test]
    fn missing_reference_fails_open() {
        let filter = RegimeFilter::new(RegimeConfig::default(), None, None);
        let snap = filter.evaluate(day(3));
        assert!(snap.can_trade);
        assert_eq!(snap.reason, RegimeReason::RegimeDataUnavailable);
    }

    #[test]
    fn query_before_first_bar_fails_open() {
        let bars = make_bars(&[100.0; 5]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), None);
        let snap = filter.evaluate(day(-1));
        assert_eq!(snap.reason, RegimeReason::RegimeDataUnavailable);
    }

    #[test]
    fn high_volatility_takes_priority() {
        let closes = [100.0, 101.0, 102.0, 103.0, 80.0];
        let bars = make_bars(&closes);
        let vol = make_bars(&[20.0, 20.0, 20.0, 20.0, 35.0]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), Some(&vol));

        let snap = filter.evaluate(day(4));
        assert!(!snap.can_trade);
        assert_eq!(snap.reason, RegimeReason::HighVolatility);
        assert!(snap.reason.forces_exit());
    }

    #[test]
    fn crash_detected_from_rolling_high() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 85.0]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), None);

        let snap = filter.evaluate(day(4));
        assert_eq!(snap.reason, RegimeReason::MarketCrash);
        assert_eq!(snap.label, RegimeLabel::Crash);
        assert!(snap.reason.forces_exit());
    }

    #[test]
    fn drawdown_at_threshold_is_not_a_crash() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 90.0]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), None);
        assert_ne!(filter.evaluate(day(4)).reason, RegimeReason::MarketCrash);
    }

    #[test]
    fn below_long_ma_is_bear() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 95.0]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), None);

        let snap = filter.evaluate(day(4));
        assert_eq!(snap.reason, RegimeReason::BearMarket);
        assert!(!snap.can_trade);
        assert!(!snap.reason.forces_exit());
    }

    #[test]
    fn strength_counts_sub_conditions() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let vol = make_bars(&[15.0; 5]);

        let with_vol = RegimeFilter::new(small_config(), Some(&bars), Some(&vol));
        let snap = with_vol.evaluate(day(4));
        assert!(snap.can_trade);
        assert_eq!(snap.strength, Some(RegimeStrength::Strong));

        let without_vol = RegimeFilter::new(small_config(), Some(&bars), None);
        assert_eq!(
            without_vol.evaluate(day(4)).strength,
            Some(RegimeStrength::Moderate)
        );
    }

    #[test]
    fn warm_up_skips_bear_check() {
        let bars = make_bars(&[100.0, 99.0]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), None);
        let snap = filter.evaluate(day(1));
        assert!(snap.can_trade);
        assert_eq!(snap.strength, Some(RegimeStrength::Weak));
    }

    #[test]
    fn uses_last_bar_at_or_before_date() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 85.0]);
        let filter = RegimeFilter::new(small_config(), Some(&bars), None);
        assert_eq!(filter.evaluate(day(30)).reason, RegimeReason::MarketCrash);
        assert_eq!(filter.evaluate(day(3)).reason, RegimeReason::Bullish);
    }
}
