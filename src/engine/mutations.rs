use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::availability::{first_saturated_night, missing_days};
use super::validate::{validate_request, ValidBooking};
use super::{Engine, EngineError, RequestSlot, WalCommand};

impl Engine {
    /// Check-and-commit a booking as one atomic unit under the hotel's
    /// write lock.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<BookingOutcome, EngineError> {
        let started = Instant::now();
        let result = self.try_create_booking(req).await;
        let outcome = match &result {
            Ok(BookingOutcome::Confirmed(_)) => "confirmed",
            Ok(BookingOutcome::Conflict { .. }) => "conflict",
            Err(e) if e.is_client_error() => "invalid",
            Err(_) => "error",
        };
        metrics::counter!(observability::BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn try_create_booking(&self, req: BookingRequest) -> Result<BookingOutcome, EngineError> {
        let valid = validate_request(&req)?;
        self.require_hotel(req.hotel_id).await?;

        let Some(key) = valid.request_id.clone() else {
            return self.commit_booking(&req, valid).await;
        };
        let slot = self.ledger.request_slot(key);
        self.commit_once(&req, valid, &slot).await
    }

    /// Commit under the request id's slot so retries of one request, even
    /// ones naming another hotel, resolve to a single booking.
    async fn commit_once(
        &self,
        req: &BookingRequest,
        valid: ValidBooking,
        slot: &RequestSlot<'_>,
    ) -> Result<BookingOutcome, EngineError> {
        let _held = tokio::time::timeout(self.lock_timeout, slot.acquire())
            .await
            .map_err(|_| self.lock_timeout_error(req.hotel_id))?;
        let key = slot.key();
        if let Some(existing) = self.ledger.by_request_id(key) {
            tracing::debug!(booking_id = %existing.id, request_id = %key, "duplicate booking request");
            return Ok(BookingOutcome::Confirmed(existing));
        }
        self.commit_booking(req, valid).await
    }

    async fn commit_booking(
        &self,
        req: &BookingRequest,
        valid: ValidBooking,
    ) -> Result<BookingOutcome, EngineError> {
        // No calendar at all: the first night is already missing.
        let calendar = self.calendars.get(&req.hotel_id).ok_or(EngineError::MissingDay {
            hotel_id: req.hotel_id,
            date: req.stay.check_in(),
        })?;
        let (_gate, mut guard) = self.lock_for_commit(req.hotel_id, calendar).await?;

        if let Some(date) = first_saturated_night(&guard, &req.stay)? {
            tracing::warn!(
                hotel_id = %req.hotel_id,
                check_in = %req.stay.check_in(),
                check_out = %req.stay.check_out(),
                %date,
                "booking conflict"
            );
            return Ok(BookingOutcome::Conflict { date });
        }

        let booking = Booking {
            id: Ulid::new(),
            email: valid.email,
            hotel_id: req.hotel_id,
            stay: req.stay,
            guests: valid.guests,
            total_price: valid.total_price,
            booked_at: Utc::now(),
            request_id: valid.request_id,
        };
        let event = Event::BookingCommitted {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;

        tracing::info!(
            booking_id = %booking.id,
            hotel_id = %booking.hotel_id,
            nights = booking.stay.night_count(),
            "booking committed"
        );
        Ok(BookingOutcome::Confirmed(booking))
    }

    /// Create calendar rows for `[from, to)` that do not exist yet, each
    /// with `total_rooms` free rooms. Existing rows keep their counters.
    /// Returns how many rows were created.
    pub async fn provision_calendar(
        &self,
        hotel_id: HotelId,
        from: NaiveDate,
        to: NaiveDate,
        total_rooms: u32,
    ) -> Result<usize, EngineError> {
        if total_rooms == 0 {
            return Err(ValidationError::NoRooms.into());
        }
        if from >= to {
            return Err(ValidationError::EmptyStay {
                check_in: from,
                check_out: to,
            }
            .into());
        }
        let width = (to - from).num_days();
        if width > MAX_PROVISION_DAYS {
            return Err(ValidationError::WindowTooWide(width).into());
        }
        self.require_hotel(hotel_id).await?;

        let calendar = self.calendars.get_or_create(hotel_id);
        let (_gate, mut guard) = self.lock_for_commit(hotel_id, calendar).await?;
        let days = missing_days(&guard, from, to, total_rooms);
        if days.is_empty() {
            return Ok(0);
        }
        let created = days.len();
        let event = Event::DaysProvisioned { hotel_id, days };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::gauge!(observability::CALENDAR_DAYS).increment(created as f64);
        tracing::info!(hotel_id = %hotel_id, %from, %to, total_rooms, created, "calendar provisioned");
        Ok(created)
    }

    /// Rewrite the WAL as the minimal event list that rebuilds the current
    /// state: one `DaysProvisioned` per hotel, one `BookingRestored` per
    /// booking.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Exclusive: no commit may land between the snapshot and the swap.
        let _gate = self.commit_gate.write().await;

        let mut events = Vec::new();
        for hotel_id in self.calendars.hotel_ids() {
            let Some(calendar) = self.calendars.get(&hotel_id) else {
                continue;
            };
            let guard = calendar.read().await;
            if guard.days.is_empty() {
                continue;
            }
            events.push(Event::DaysProvisioned {
                hotel_id,
                days: guard.to_days(),
            });
        }
        let mut bookings = self.ledger.all();
        bookings.sort_by_key(|b| b.id);
        events.extend(bookings.into_iter().map(|booking| Event::BookingRestored { booking }));

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;

        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    /// Number of WAL appends since the last compaction.
    pub async fn wal_appends_since_compact(&self) -> Result<u64, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))
    }
}
