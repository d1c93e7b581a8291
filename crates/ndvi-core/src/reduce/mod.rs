//! Temporal reduction of index series.

pub mod anomaly;
pub mod climatology;
pub mod rolling;

pub use self::anomaly::{reduce_period, PeriodStats};
pub use self::climatology::{reduce_monthly, MonthStats, MonthlyStats};
pub use self::rolling::{clear_count, median, rolling_smooth, validity, Smoothing};
