pub mod candle;
pub mod labels;
pub mod snapshot;
pub mod timeframe;

pub use candle::{Candle, CandleSeries};
pub use labels::*;
pub use snapshot::{
    AccountPosition, CycleIndicators, IndicatorSnapshot, PositionData, HEALTH_FACTOR_NO_DEBT,
};
pub use timeframe::Timeframe;
