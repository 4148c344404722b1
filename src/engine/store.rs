use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use ulid::Ulid;

use crate::model::*;

pub type SharedCalendar = Arc<RwLock<HotelCalendar>>;

/// Per-hotel calendars. Each calendar sits behind its own lock so bookings
/// for different hotels never wait on each other.
#[derive(Default)]
pub struct CalendarStore {
    calendars: DashMap<HotelId, SharedCalendar>,
}

impl CalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_calendars(calendars: impl IntoIterator<Item = HotelCalendar>) -> Self {
        let store = Self::new();
        for cal in calendars {
            store.calendars.insert(cal.hotel_id, Arc::new(RwLock::new(cal)));
        }
        store
    }

    pub fn get(&self, hotel_id: &HotelId) -> Option<SharedCalendar> {
        self.calendars.get(hotel_id).map(|e| e.value().clone())
    }

    pub fn get_or_create(&self, hotel_id: HotelId) -> SharedCalendar {
        self.calendars
            .entry(hotel_id)
            .or_insert_with(|| Arc::new(RwLock::new(HotelCalendar::new(hotel_id))))
            .value()
            .clone()
    }

    /// Hotel ids in ascending order.
    pub fn hotel_ids(&self) -> Vec<HotelId> {
        let mut ids: Vec<HotelId> = self.calendars.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

}

/// Append-only record of committed bookings with lookups by email and by
/// client request id.
#[derive(Default)]
pub struct BookingLedger {
    bookings: DashMap<Ulid, Booking>,
    by_email: DashMap<String, Vec<Ulid>>,
    by_request: DashMap<String, Ulid>,
    request_slots: DashMap<String, Arc<Mutex<()>>>,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, booking: Booking) {
        let id = booking.id;
        let email = booking.email.clone();
        let request_id = booking.request_id.clone();
        // Main table first so the indexes never point at a missing booking.
        self.bookings.insert(id, booking);
        self.by_email.entry(email).or_default().push(id);
        if let Some(key) = request_id {
            self.by_request.insert(key, id);
        }
    }

    pub fn get(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn by_request_id(&self, key: &str) -> Option<Booking> {
        let id = *self.by_request.get(key)?;
        self.get(&id)
    }

    /// Bookings made under `email`, oldest first.
    pub fn for_email(&self, email: &str) -> Vec<Booking> {
        let ids = self
            .by_email
            .get(email)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut found: Vec<Booking> = ids.iter().filter_map(|id| self.get(id)).collect();
        found.sort_by_key(|b| (b.booked_at, b.id));
        found
    }

    /// Every booking, oldest first.
    pub fn all(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|b| (b.booked_at, b.id));
        all
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    /// Join the lock shared by every in-flight booking attempt carrying
    /// `key`, whatever hotel it targets.
    pub fn request_slot(&self, key: String) -> RequestSlot<'_> {
        let lock = self.request_slots.entry(key.clone()).or_default().value().clone();
        RequestSlot {
            ledger: self,
            key,
            lock,
        }
    }
}

/// Handle on a request id's lock. The map entry goes away with the last
/// handle.
pub struct RequestSlot<'a> {
    ledger: &'a BookingLedger,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl RequestSlot<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for RequestSlot<'_> {
    fn drop(&mut self) {
        // Two owners left means the map and this handle.
        self.ledger
            .request_slots
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 2);
    }
}
