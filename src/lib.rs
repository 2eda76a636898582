pub mod api;
pub mod config;
pub mod core;
pub mod errors;
pub mod evaluator;
pub mod exchange;
pub mod ledger;
pub mod models;
pub mod onchain;
pub mod persistence;
#[cfg(test)]
pub mod test_helpers;
