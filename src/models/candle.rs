use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 1970-01-01 was a Thursday; shifting by three days anchors weekly buckets on Monday.
const WEEK_ANCHOR_OFFSET_SECS: i64 = 3 * 86400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// High-low range as a percentage of the open.
    pub fn range_pct(&self) -> f64 {
        if self.open <= 0.0 {
            return 0.0;
        }
        (self.high - self.low) / self.open * 100.0
    }
}

/// Ordered (oldest first) candle history for one timeframe.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        CandleSeries::new(self.candles[start..].to_vec())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Resample to a larger fixed-length bucket (4h from 1h).
    pub fn resample(&self, bucket: Duration) -> CandleSeries {
        self.resample_anchored(bucket, 0)
    }

    /// Resample daily candles into Monday-anchored weeks.
    pub fn resample_weekly(&self) -> CandleSeries {
        self.resample_anchored(Duration::from_secs(604800), WEEK_ANCHOR_OFFSET_SECS)
    }

    fn resample_anchored(&self, bucket: Duration, offset_secs: i64) -> CandleSeries {
        if self.candles.is_empty() {
            return CandleSeries::default();
        }
        let bucket_secs = bucket.as_secs() as i64;
        self.group_by(|c| {
            let ts = c.timestamp.timestamp();
            let bucket_start = ts - (ts + offset_secs).rem_euclid(bucket_secs);
            DateTime::from_timestamp(bucket_start, 0).unwrap_or(c.timestamp)
        })
    }

    /// Resample daily candles into calendar months (UTC).
    pub fn resample_monthly(&self) -> CandleSeries {
        self.group_by(|c| {
            let ts = c.timestamp;
            Utc.with_ymd_and_hms(ts.year(), ts.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(ts)
        })
    }

    fn group_by<F>(&self, bucket_of: F) -> CandleSeries
    where
        F: Fn(&Candle) -> DateTime<Utc>,
    {
        let mut result: Vec<Candle> = Vec::new();

        for candle in &self.candles {
            let bucket_ts = bucket_of(candle);

            if let Some(last) = result.last_mut() {
                if last.timestamp == bucket_ts {
                    last.high = last.high.max(candle.high);
                    last.low = last.low.min(candle.low);
                    last.close = candle.close;
                    last.volume += candle.volume;
                    continue;
                }
            }

            result.push(Candle {
                timestamp: bucket_ts,
                ..candle.clone()
            });
        }

        CandleSeries::new(result)
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.candles[index]
    }
}

impl IntoIterator for CandleSeries {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
