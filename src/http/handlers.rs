use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::model::{BookingOutcome, BookingRequest, HotelId, StayRange};

use super::dto::*;
use super::error::ApiError;
use super::AppState;

pub async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<BookingBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let request = BookingRequest {
        email: body.email,
        hotel_id: HotelId::try_from(body.hotel_id)?,
        stay: StayRange::parse(&body.checkin_date, &body.checkout_date)?,
        guests: body.guest_amount,
        total_price: body.total_price,
        request_id: body.request_id,
    };

    let response = match state.engine.create_booking(request).await? {
        BookingOutcome::Confirmed(booking) => {
            (StatusCode::OK, Json(BookingResponse::success(booking.id.to_string()))).into_response()
        }
        BookingOutcome::Conflict { date } => {
            (StatusCode::CONFLICT, Json(BookingResponse::conflict(date))).into_response()
        }
    };
    Ok(response)
}

pub async fn list_hotels(
    State(state): State<AppState>,
    payload: Result<Json<HotelListBody>, JsonRejection>,
) -> Result<Json<Vec<HotelSummary>>, ApiError> {
    let Json(body) = payload?;
    let stay = StayRange::parse(&body.checkin_date, &body.checkout_date)?;
    let hotels = state
        .engine
        .list_available_hotels(&body.province, &body.district, &stay)
        .await?;
    Ok(Json(hotels.into_iter().map(HotelSummary::from).collect()))
}

pub async fn availability(
    State(state): State<AppState>,
    payload: Result<Json<AvailabilityBody>, JsonRejection>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let Json(body) = payload?;
    let hotel_id = HotelId::try_from(body.hotel_id)?;
    let stay = StayRange::parse(&body.checkin_date, &body.checkout_date)?;
    let first_saturated_date = state.engine.check_range(hotel_id, &stay).await?;
    Ok(Json(AvailabilityResponse {
        available: first_saturated_date.is_none(),
        first_saturated_date,
    }))
}

pub async fn booking_history(
    State(state): State<AppState>,
    payload: Result<Json<HistoryBody>, JsonRejection>,
) -> Result<Json<Vec<HistoryItem>>, ApiError> {
    let Json(body) = payload?;
    let history = state.engine.booking_history(&body.email).await?;
    Ok(Json(history.into_iter().map(HistoryItem::from).collect()))
}

pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
