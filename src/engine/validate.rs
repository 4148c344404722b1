use crate::limits::*;
use crate::model::*;

/// A booking request that passed every input check.
pub(crate) struct ValidBooking {
    pub email: String,
    pub guests: u32,
    pub total_price: u64,
    pub request_id: Option<String>,
}

pub(crate) fn validate_request(req: &BookingRequest) -> Result<ValidBooking, ValidationError> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::EmailTooLong);
    }
    let guests = u32::try_from(req.guests)
        .ok()
        .filter(|g| *g > 0)
        .ok_or(ValidationError::InvalidGuestAmount(req.guests))?;
    let total_price =
        u64::try_from(req.total_price).map_err(|_| ValidationError::NegativePrice(req.total_price))?;
    let request_id = match req.request_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(key) if key.len() > MAX_REQUEST_ID_LEN => return Err(ValidationError::RequestIdTooLong),
        Some(key) => Some(key.to_string()),
    };
    Ok(ValidBooking {
        email: email.to_string(),
        guests,
        total_price,
        request_id,
    })
}

pub(crate) fn validate_location(province: &str, district: &str) -> Result<(), ValidationError> {
    if province.len() > MAX_LOCATION_LEN {
        return Err(ValidationError::LocationTooLong("province"));
    }
    if district.len() > MAX_LOCATION_LEN {
        return Err(ValidationError::LocationTooLong("district"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookingRequest {
        BookingRequest {
            email: "  guest@example.com ".into(),
            hotel_id: HotelId::new(1).unwrap(),
            stay: StayRange::parse("2025-06-01", "2025-06-03").unwrap(),
            guests: 2,
            total_price: 2400,
            request_id: None,
        }
    }

    #[test]
    fn trims_email_and_converts_counts() {
        let valid = validate_request(&request()).unwrap();
        assert_eq!(valid.email, "guest@example.com");
        assert_eq!(valid.guests, 2);
        assert_eq!(valid.total_price, 2400);
        assert_eq!(valid.request_id, None);
    }

    #[test]
    fn rejects_bad_fields() {
        let mut req = request();
        req.email = "   ".into();
        assert_eq!(validate_request(&req).err(), Some(ValidationError::EmptyEmail));

        let mut req = request();
        req.email = "a".repeat(MAX_EMAIL_LEN + 1);
        assert_eq!(validate_request(&req).err(), Some(ValidationError::EmailTooLong));

        let mut req = request();
        req.guests = 0;
        assert_eq!(validate_request(&req).err(), Some(ValidationError::InvalidGuestAmount(0)));

        let mut req = request();
        req.guests = -1;
        assert_eq!(validate_request(&req).err(), Some(ValidationError::InvalidGuestAmount(-1)));

        let mut req = request();
        req.total_price = -5;
        assert_eq!(validate_request(&req).err(), Some(ValidationError::NegativePrice(-5)));

        let mut req = request();
        req.request_id = Some("x".repeat(MAX_REQUEST_ID_LEN + 1));
        assert_eq!(validate_request(&req).err(), Some(ValidationError::RequestIdTooLong));
    }

    #[test]
    fn blank_request_id_is_dropped() {
        let mut req = request();
        req.request_id = Some("  ".into());
        assert_eq!(validate_request(&req).unwrap().request_id, None);
    }

    #[test]
    fn location_length_capped() {
        assert!(validate_location("Bangkok", "Pathum Wan").is_ok());
        let long = "p".repeat(MAX_LOCATION_LEN + 1);
        assert_eq!(
            validate_location(&long, "x"),
            Err(ValidationError::LocationTooLong("province"))
        );
        assert_eq!(
            validate_location("x", &long),
            Err(ValidationError::LocationTooLong("district"))
        );
    }
}
