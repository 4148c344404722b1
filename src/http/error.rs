use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::engine::EngineError;
use crate::model::ValidationError;

/// Error leaving an HTTP handler. Renders as `{error, code}` JSON.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "VALIDATION_ERROR",
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            code: "PERSISTENCE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        if err.is_client_error() {
            Self::validation(err.to_string())
        } else {
            Self::persistence(err.to_string())
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = self.code, "{}", self.message);
        } else {
            tracing::debug!(status = %self.status, code = self.code, "{}", self.message);
        }
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HotelId;
    use chrono::NaiveDate;

    #[test]
    fn engine_errors_split_by_class() {
        let unknown = ApiError::from(EngineError::UnknownHotel(HotelId::new(4).unwrap()));
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown.code(), "VALIDATION_ERROR");

        let missing = ApiError::from(EngineError::MissingDay {
            hotel_id: HotelId::new(4).unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        });
        assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(missing.code(), "PERSISTENCE_ERROR");

        let wal = ApiError::from(EngineError::WalError("disk full".into()));
        assert_eq!(wal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_error_is_bad_request() {
        let err = ApiError::from(ValidationError::EmptyEmail);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "email must not be empty");
    }
}
