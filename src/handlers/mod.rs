mod health;
mod stocks;

pub use health::*;
pub use stocks::*;

use serde::Serialize;

/// Success envelope: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
