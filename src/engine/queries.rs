use std::collections::HashMap;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{first_saturated_night, has_saturated_night};
use super::validate::validate_location;
use super::{Engine, EngineError};

impl Engine {
    /// Earliest saturated night of `stay` for a hotel, or `None` if the
    /// whole stay can still be booked. Read-only.
    pub async fn check_range(
        &self,
        hotel_id: HotelId,
        stay: &StayRange,
    ) -> Result<Option<NaiveDate>, EngineError> {
        self.require_hotel(hotel_id).await?;
        let calendar = self.calendars.get(&hotel_id).ok_or(EngineError::MissingDay {
            hotel_id,
            date: stay.check_in(),
        })?;
        let guard = self.lock_for_read(hotel_id, calendar).await?;
        first_saturated_night(&guard, stay)
    }

    /// Hotels in a location with no saturated night during `stay`,
    /// ascending by id.
    ///
    /// Each hotel's calendar is read under its own lock in turn, so the
    /// result is a best-effort snapshot: a hotel listed here can still
    /// answer a booking with a conflict.
    pub async fn list_available_hotels(
        &self,
        province: &str,
        district: &str,
        stay: &StayRange,
    ) -> Result<Vec<Hotel>, EngineError> {
        validate_location(province, district)?;
        let candidates = self.catalog.hotels_in(province, district).await?;

        let mut available = Vec::with_capacity(candidates.len());
        for hotel in candidates {
            if let Some(calendar) = self.calendars.get(&hotel.id) {
                let guard = self.lock_for_read(hotel.id, calendar).await?;
                if has_saturated_night(&guard, stay) {
                    continue;
                }
            }
            available.push(hotel);
        }
        tracing::debug!(province, district, found = available.len(), "hotel listing");
        Ok(available)
    }

    /// Every booking made under `email`, oldest first, with hotel names.
    pub async fn booking_history(&self, email: &str) -> Result<Vec<BookingHistoryEntry>, EngineError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail.into());
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::EmailTooLong.into());
        }

        let mut names: HashMap<HotelId, String> = HashMap::new();
        let mut history = Vec::new();
        for booking in self.ledger.for_email(email) {
            let hotel_name = match names.get(&booking.hotel_id) {
                Some(name) => name.clone(),
                None => {
                    let name = match self.catalog.hotel(booking.hotel_id).await? {
                        Some(hotel) => hotel.name,
                        None => booking.hotel_id.to_string(),
                    };
                    names.insert(booking.hotel_id, name.clone());
                    name
                }
            };
            history.push(BookingHistoryEntry { booking, hotel_name });
        }
        Ok(history)
    }

    /// Existing calendar rows for the nights of `stay`.
    pub async fn calendar_days(
        &self,
        hotel_id: HotelId,
        stay: &StayRange,
    ) -> Result<Vec<AvailabilityDay>, EngineError> {
        self.require_hotel(hotel_id).await?;
        let Some(calendar) = self.calendars.get(&hotel_id) else {
            return Ok(Vec::new());
        };
        let guard = self.lock_for_read(hotel_id, calendar).await?;
        Ok(guard.rows_in(stay).collect())
    }

    pub fn booking(&self, id: &Ulid) -> Option<Booking> {
        self.ledger.get(id)
    }

    pub fn booking_count(&self) -> usize {
        self.ledger.booking_count()
    }
}
