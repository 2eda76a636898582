pub mod aggregator;
pub mod alerts;
pub mod blocks;
pub mod cycle;
pub mod decision;
pub mod indicators;
pub mod leverage;
pub mod normalizer;
pub mod risk;
pub mod rules;
pub mod setup;

pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
