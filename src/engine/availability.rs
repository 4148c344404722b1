use chrono::NaiveDate;

use crate::model::*;

use super::EngineError;

// ── Range checks over one hotel's calendar ───────────────────────

/// Earliest saturated night of `stay`, or `None` if every night still has a
/// room.
///
/// Every night must have a row. A missing row is reported before any
/// saturation: the calendar is incomplete and must not be read as
/// unlimited availability.
pub fn first_saturated_night(
    calendar: &HotelCalendar,
    stay: &StayRange,
) -> Result<Option<NaiveDate>, EngineError> {
    if let Some(date) = stay.nights().find(|night| calendar.day(*night).is_none()) {
        return Err(EngineError::MissingDay {
            hotel_id: calendar.hotel_id,
            date,
        });
    }
    Ok(calendar
        .rows_in(stay)
        .find(|day| day.available_rooms == 0)
        .map(|day| day.date))
}

/// True if any existing row inside `stay` has no room left. Missing rows do
/// not count: this backs the listing anti-join, which only excludes hotels
/// with a saturated row.
pub fn has_saturated_night(calendar: &HotelCalendar, stay: &StayRange) -> bool {
    calendar.rows_in(stay).any(|day| day.available_rooms == 0)
}

/// Take one room from every night of `stay`.
///
/// Caller holds the write lock and has already checked that every night
/// exists and is unsaturated.
pub fn claim_nights(calendar: &mut HotelCalendar, stay: &StayRange) {
    for night in stay.nights() {
        if let Some(count) = calendar.days.get_mut(&night) {
            debug_assert!(count.available > 0, "claiming a saturated night {night}");
            count.available = count.available.saturating_sub(1);
        }
    }
}

/// Calendar rows for the window `[from, to)` that do not exist yet.
pub fn missing_days(
    calendar: &HotelCalendar,
    from: NaiveDate,
    to: NaiveDate,
    total_rooms: u32,
) -> Vec<AvailabilityDay> {
    from.iter_days()
        .take_while(|d| *d < to)
        .filter(|d| calendar.day(*d).is_none())
        .map(|date| AvailabilityDay {
            date,
            total_rooms,
            available_rooms: total_rooms,
        })
        .collect()
}
