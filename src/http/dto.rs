//! Request and response bodies with their wire names. Dates and ids arrive
//! as raw strings and integers and are validated by the handlers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{BookingHistoryEntry, Hotel};

/// `bookingDateAndTime` may be sent but is ignored; the server stamps
/// bookings itself.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingBody {
    pub email: String,
    pub checkin_date: String,
    pub checkout_date: String,
    pub guest_amount: i64,
    #[serde(rename = "hotelID")]
    pub hotel_id: i64,
    pub total_price: i64,
    #[serde(rename = "requestID", default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub status: &'static str,
    pub res: String,
    #[serde(rename = "bookingID", skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl BookingResponse {
    pub fn success(booking_id: String) -> Self {
        Self {
            status: "success",
            res: "success".into(),
            booking_id: Some(booking_id),
            date: None,
        }
    }

    pub fn conflict(date: NaiveDate) -> Self {
        let date = date.to_string();
        Self {
            status: "conflict",
            res: date.clone(),
            booking_id: None,
            date: Some(date),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HotelListBody {
    pub province: String,
    pub district: String,
    pub checkin_date: String,
    pub checkout_date: String,
}

#[derive(Debug, Serialize)]
pub struct HotelSummary {
    #[serde(rename = "hotelID")]
    pub hotel_id: u32,
    #[serde(rename = "hotelName")]
    pub hotel_name: String,
    #[serde(rename = "picURL")]
    pub pic_url: Option<String>,
    #[serde(rename = "pricePerNight")]
    pub price_per_night: u32,
}

impl From<Hotel> for HotelSummary {
    fn from(hotel: Hotel) -> Self {
        Self {
            hotel_id: hotel.id.get(),
            pic_url: hotel.pictures.into_iter().next(),
            hotel_name: hotel.name,
            price_per_night: hotel.price_per_night,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityBody {
    #[serde(rename = "hotelID")]
    pub hotel_id: i64,
    pub checkin_date: String,
    pub checkout_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available: bool,
    pub first_saturated_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryBody {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub checkin_date: NaiveDate,
    pub checkout_date: NaiveDate,
    pub guest_amount: u32,
    pub hotel_name: String,
    pub total_price: u64,
}

impl From<BookingHistoryEntry> for HistoryItem {
    fn from(entry: BookingHistoryEntry) -> Self {
        Self {
            checkin_date: entry.booking.stay.check_in(),
            checkout_date: entry.booking.stay.check_out(),
            guest_amount: entry.booking.guests,
            hotel_name: entry.hotel_name,
            total_price: entry.booking.total_price,
        }
    }
}
