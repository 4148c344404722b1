use std::time::Duration;

use chrono::NaiveDate;

use crate::catalog::CatalogError;
use crate::model::{HotelId, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unknown hotel: {0}")]
    UnknownHotel(HotelId),
    /// A night was asked about that calendar provisioning never created.
    #[error("no calendar row for hotel {hotel_id} on {date}")]
    MissingDay { hotel_id: HotelId, date: NaiveDate },
    #[error("timed out after {timeout:?} waiting for the calendar lock of hotel {hotel_id}")]
    LockTimeout { hotel_id: HotelId, timeout: Duration },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    /// True for errors caused by the request itself. Everything else is a
    /// persistence failure on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::Validation(_) | EngineError::UnknownHotel(_))
    }
}
