use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;

/// Wire and seed-file date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Malformed or logically invalid input. Never causes a mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("check-out {check_out} must be after check-in {check_in}")]
    EmptyStay {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    #[error("stay of {0} nights is too long")]
    StayTooLong(i64),
    #[error("invalid hotel id: {0}")]
    InvalidHotelId(String),
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email too long")]
    EmailTooLong,
    #[error("guest amount must be positive, got {0}")]
    InvalidGuestAmount(i64),
    #[error("total price must not be negative, got {0}")]
    NegativePrice(i64),
    #[error("request id too long")]
    RequestIdTooLong,
    #[error("{0} too long")]
    LocationTooLong(&'static str),
    #[error("total rooms must be positive")]
    NoRooms,
    #[error("provisioning window of {0} days is too wide")]
    WindowTooWide(i64),
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

// ── Identifiers ──────────────────────────────────────────────────

/// Catalog identifier of a hotel. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct HotelId(u32);

impl HotelId {
    pub fn new(raw: u32) -> Result<Self, ValidationError> {
        if raw == 0 {
            return Err(ValidationError::InvalidHotelId(raw.to_string()));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for HotelId {
    type Error = ValidationError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        let id = u32::try_from(raw).map_err(|_| ValidationError::InvalidHotelId(raw.to_string()))?;
        Self::new(id)
    }
}

impl From<HotelId> for i64 {
    fn from(id: HotelId) -> Self {
        i64::from(id.0)
    }
}

impl FromStr for HotelId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidHotelId(s.to_string()))?;
        Self::try_from(raw)
    }
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Stay window ──────────────────────────────────────────────────

/// Half-open night window `[check_in, check_out)`. The checkout date is
/// never occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, ValidationError> {
        if check_in >= check_out {
            return Err(ValidationError::EmptyStay { check_in, check_out });
        }
        let nights = (check_out - check_in).num_days();
        if nights > MAX_STAY_NIGHTS {
            return Err(ValidationError::StayTooLong(nights));
        }
        Ok(Self { check_in, check_out })
    }

    pub fn parse(check_in: &str, check_out: &str) -> Result<Self, ValidationError> {
        Self::new(parse_date(check_in)?, parse_date(check_out)?)
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn night_count(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Every occupied night, in order.
    pub fn nights(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let check_out = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < check_out)
    }

    pub fn contains_night(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }
}

// ── Calendar ─────────────────────────────────────────────────────

/// Inventory counters for one (hotel, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCount {
    pub total: u32,
    pub available: u32,
}

impl RoomCount {
    pub fn is_saturated(&self) -> bool {
        self.available == 0
    }
}

/// One calendar row, detached from its hotel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub total_rooms: u32,
    pub available_rooms: u32,
}

/// All calendar rows of one hotel, keyed by date.
#[derive(Debug, Clone)]
pub struct HotelCalendar {
    pub hotel_id: HotelId,
    pub days: BTreeMap<NaiveDate, RoomCount>,
}

impl HotelCalendar {
    pub fn new(hotel_id: HotelId) -> Self {
        Self {
            hotel_id,
            days: BTreeMap::new(),
        }
    }

    pub fn day(&self, date: NaiveDate) -> Option<RoomCount> {
        self.days.get(&date).copied()
    }

    pub fn set_day(&mut self, day: AvailabilityDay) {
        self.days.insert(
            day.date,
            RoomCount {
                total: day.total_rooms,
                available: day.available_rooms,
            },
        );
    }

    /// Existing rows whose date is a night of `stay`.
    pub fn rows_in(&self, stay: &StayRange) -> impl Iterator<Item = AvailabilityDay> + '_ {
        self.days
            .range(stay.check_in()..stay.check_out())
            .map(|(date, count)| AvailabilityDay {
                date: *date,
                total_rooms: count.total,
                available_rooms: count.available,
            })
    }

    pub fn to_days(&self) -> Vec<AvailabilityDay> {
        self.days
            .iter()
            .map(|(date, count)| AvailabilityDay {
                date: *date,
                total_rooms: count.total,
                available_rooms: count.available,
            })
            .collect()
    }
}

// ── Catalog ──────────────────────────────────────────────────────

/// Hotel metadata as the catalog hands it out. The engine only looks at
/// `id` and the location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    #[serde(rename = "hotelID")]
    pub id: HotelId,
    #[serde(rename = "hotelName")]
    pub name: String,
    pub province: String,
    pub district: String,
    pub price_per_night: u32,
    #[serde(default)]
    pub pictures: Vec<String>,
}

// ── Bookings ─────────────────────────────────────────────────────

/// A booking as submitted, before the engine has validated it.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub email: String,
    pub hotel_id: HotelId,
    pub stay: StayRange,
    pub guests: i64,
    pub total_price: i64,
    /// Client-chosen idempotency key.
    pub request_id: Option<String>,
}

/// A committed reservation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub email: String,
    pub hotel_id: HotelId,
    pub stay: StayRange,
    pub guests: u32,
    pub total_price: u64,
    pub booked_at: DateTime<Utc>,
    pub request_id: Option<String>,
}

/// The non-exceptional results of a booking attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Confirmed(Booking),
    /// Earliest night of the stay with no rooms left.
    Conflict { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingHistoryEntry {
    pub booking: Booking,
    pub hotel_name: String,
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Sets each listed row of the hotel's calendar.
    DaysProvisioned {
        hotel_id: HotelId,
        days: Vec<AvailabilityDay>,
    },
    /// Takes one room from every night of the stay and records the booking.
    BookingCommitted { booking: Booking },
    /// Records the booking without touching the calendar. Only written by
    /// compaction, whose `DaysProvisioned` already carries the counts.
    BookingRestored { booking: Booking },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn stay_nights_exclude_checkout() {
        let stay = StayRange::parse("2025-06-01", "2025-06-03").unwrap();
        let nights: Vec<_> = stay.nights().collect();
        assert_eq!(nights, vec![date("2025-06-01"), date("2025-06-02")]);
        assert_eq!(stay.night_count(), 2);
        assert!(stay.contains_night(date("2025-06-02")));
        assert!(!stay.contains_night(date("2025-06-03")));
    }

    #[test]
    fn stay_rejects_reversed_and_empty() {
        let reversed = StayRange::parse("2025-06-05", "2025-06-01");
        assert!(matches!(reversed, Err(ValidationError::EmptyStay { .. })));

        let same_day = StayRange::parse("2025-06-05", "2025-06-05");
        assert!(matches!(same_day, Err(ValidationError::EmptyStay { .. })));
    }

    #[test]
    fn stay_rejects_bad_dates() {
        assert!(matches!(
            StayRange::parse("2025-02-30", "2025-03-02"),
            Err(ValidationError::InvalidDate(_))
        ));
        assert!(matches!(
            StayRange::parse("06/01/2025", "2025-06-02"),
            Err(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn stay_length_capped() {
        let check_in = date("2025-01-01");
        let ok = StayRange::new(check_in, check_in + chrono::Days::new(MAX_STAY_NIGHTS as u64));
        assert!(ok.is_ok());
        let too_long = StayRange::new(check_in, check_in + chrono::Days::new(MAX_STAY_NIGHTS as u64 + 1));
        assert!(matches!(too_long, Err(ValidationError::StayTooLong(_))));
    }

    #[test]
    fn stay_across_month_boundary() {
        let stay = StayRange::parse("2024-02-28", "2024-03-01").unwrap();
        let nights: Vec<_> = stay.nights().collect();
        assert_eq!(nights, vec![date("2024-02-28"), date("2024-02-29")]);
    }

    #[test]
    fn hotel_id_validation() {
        assert!(HotelId::try_from(0).is_err());
        assert!(HotelId::try_from(-3).is_err());
        assert!(HotelId::try_from(i64::from(u32::MAX) + 1).is_err());
        assert_eq!(HotelId::try_from(7).unwrap().get(), 7);
        assert_eq!("12".parse::<HotelId>().unwrap().get(), 12);
        assert!("abc".parse::<HotelId>().is_err());
    }

    #[test]
    fn hotel_id_json_rejects_zero() {
        let ok: HotelId = serde_json::from_str("5").unwrap();
        assert_eq!(ok.get(), 5);
        assert!(serde_json::from_str::<HotelId>("0").is_err());
    }

    #[test]
    fn calendar_rows_in_window() {
        let mut cal = HotelCalendar::new(HotelId::new(1).unwrap());
        for (d, avail) in [("2025-06-01", 2), ("2025-06-02", 0), ("2025-06-03", 1)] {
            cal.set_day(AvailabilityDay {
                date: date(d),
                total_rooms: 2,
                available_rooms: avail,
            });
        }
        let stay = StayRange::parse("2025-06-02", "2025-06-03").unwrap();
        let rows: Vec<_> = cal.rows_in(&stay).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date("2025-06-02"));
        assert!(cal.day(date("2025-06-02")).unwrap().is_saturated());
        assert!(cal.day(date("2025-06-04")).is_none());
    }

    #[test]
    fn hotel_deserializes_from_seed_shape() {
        let json = r#"{"hotelID": 3, "hotelName": "Riverside", "province": "Chiang Mai",
            "district": "Mueang", "pricePerNight": 1200, "pictures": ["a.jpg"]}"#;
        let hotel: Hotel = serde_json::from_str(json).unwrap();
        assert_eq!(hotel.id.get(), 3);
        assert_eq!(hotel.price_per_night, 1200);
        assert_eq!(hotel.pictures, vec!["a.jpg".to_string()]);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCommitted {
            booking: Booking {
                id: Ulid::new(),
                email: "guest@example.com".into(),
                hotel_id: HotelId::new(9).unwrap(),
                stay: StayRange::parse("2025-06-01", "2025-06-03").unwrap(),
                guests: 2,
                total_price: 3000,
                booked_at: Utc::now(),
                request_id: Some("req-1".into()),
            },
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
