mod cache;
pub mod indicators;
mod period;
mod stock;

pub use cache::TtlCache;
pub use period::{HistoryPeriod, UnknownPeriod};
pub use stock::StockService;
