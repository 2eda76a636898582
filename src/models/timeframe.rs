use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    MN1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::MN1 => "1M",
        }
    }

    /// Nominal bar length. Monthly bars use 31 days so that fetch windows
    /// always cover the requested number of calendar months.
    pub fn as_duration(&self) -> Duration {
        match self {
            Timeframe::H1 => Duration::from_secs(3600),
            Timeframe::H4 => Duration::from_secs(14400),
            Timeframe::D1 => Duration::from_secs(86400),
            Timeframe::W1 => Duration::from_secs(604800),
            Timeframe::MN1 => Duration::from_secs(2678400),
        }
    }

    /// The native timeframe fetched from Coinbase; everything else is resampled.
    pub fn base(&self) -> Timeframe {
        match self {
            Timeframe::H1 | Timeframe::H4 => Timeframe::H1,
            Timeframe::D1 | Timeframe::W1 | Timeframe::MN1 => Timeframe::D1,
        }
    }

    /// Coinbase REST API granularity string
    pub fn coinbase_granularity(&self) -> &'static str {
        match self.base() {
            Timeframe::H1 => "ONE_HOUR",
            _ => "ONE_DAY",
        }
    }

    /// How many base candles are needed to build `limit` bars of this timeframe.
    pub fn base_bars_needed(&self, limit: usize) -> usize {
        match self {
            Timeframe::H1 | Timeframe::D1 => limit,
            Timeframe::H4 => limit * 4,
            Timeframe::W1 => limit * 7 + 7,
            Timeframe::MN1 => limit * 31 + 31,
        }
    }

    pub fn as_seconds(&self) -> u64 {
        self.as_duration().as_secs()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resampled_frames_fetch_from_base() {
        assert_eq!(Timeframe::H4.base(), Timeframe::H1);
        assert_eq!(Timeframe::W1.base(), Timeframe::D1);
        assert_eq!(Timeframe::MN1.base(), Timeframe::D1);
        assert_eq!(Timeframe::MN1.coinbase_granularity(), "ONE_DAY");
    }

    #[test]
    fn base_bars_cover_requested_limit() {
        assert_eq!(Timeframe::H4.base_bars_needed(10), 40);
        assert!(Timeframe::W1.base_bars_needed(20) >= 140);
        assert!(Timeframe::MN1.base_bars_needed(15) >= 15 * 31);
    }
}
