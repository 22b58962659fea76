mod indicators;
mod quote;
mod stock;
mod stock_price;

pub use indicators::*;
pub use quote::*;
pub use stock::*;
pub use stock_price::*;
