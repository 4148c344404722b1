//! Startup data: catalog hotels and the calendar windows to provision.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::engine::{Engine, EngineError};
use crate::model::{Hotel, HotelId};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("reading seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("provisioning hotel {hotel_id}: {source}")]
    Provision {
        hotel_id: HotelId,
        #[source]
        source: EngineError,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub hotels: Vec<Hotel>,
    #[serde(default)]
    pub calendars: Vec<CalendarSeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSeed {
    #[serde(rename = "hotelID")]
    pub hotel_id: HotelId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_rooms: u32,
}

pub fn load(path: &Path) -> Result<SeedFile, SeedError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Provision every calendar window. Rows that already exist (for example
/// after a restart) keep their counters. Returns the number of rows created.
pub async fn apply(seed: &SeedFile, engine: &Engine) -> Result<usize, SeedError> {
    let mut created = 0;
    for cal in &seed.calendars {
        created += engine
            .provision_calendar(cal.hotel_id, cal.from, cal.to, cal.total_rooms)
            .await
            .map_err(|source| SeedError::Provision {
                hotel_id: cal.hotel_id,
                source,
            })?;
    }
    Ok(created)
}
