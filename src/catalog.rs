//! Read-only access to hotel metadata.
//!
//! The catalog is owned elsewhere; the engine only needs to know whether a
//! hotel exists and which hotels sit in a location.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::{Hotel, HotelId};

#[derive(Debug, thiserror::Error)]
#[error("hotel catalog unavailable: {0}")]
pub struct CatalogError(pub String);

#[async_trait]
pub trait HotelCatalog: Send + Sync {
    async fn hotel(&self, id: HotelId) -> Result<Option<Hotel>, CatalogError>;

    /// Hotels in a province/district, ascending by id.
    async fn hotels_in(&self, province: &str, district: &str) -> Result<Vec<Hotel>, CatalogError>;
}

/// Catalog held in memory, filled from the seed file at startup.
#[derive(Default)]
pub struct InMemoryCatalog {
    hotels: DashMap<HotelId, Hotel>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hotels(hotels: impl IntoIterator<Item = Hotel>) -> Self {
        let catalog = Self::new();
        for hotel in hotels {
            catalog.insert(hotel);
        }
        catalog
    }

    /// Insert or replace a hotel.
    pub fn insert(&self, hotel: Hotel) {
        self.hotels.insert(hotel.id, hotel);
    }

    pub fn hotel_count(&self) -> usize {
        self.hotels.len()
    }
}

#[async_trait]
impl HotelCatalog for InMemoryCatalog {
    async fn hotel(&self, id: HotelId) -> Result<Option<Hotel>, CatalogError> {
        Ok(self.hotels.get(&id).map(|e| e.value().clone()))
    }

    async fn hotels_in(&self, province: &str, district: &str) -> Result<Vec<Hotel>, CatalogError> {
        let province = province.trim();
        let district = district.trim();
        let mut found: Vec<Hotel> = self
            .hotels
            .iter()
            .filter(|e| e.province == province && e.district == district)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|h| h.id);
        Ok(found)
    }
}
