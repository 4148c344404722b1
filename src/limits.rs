//! Hard caps on request and store sizes.

/// Longest stay a single booking or range query may cover.
pub const MAX_STAY_NIGHTS: i64 = 60;

pub const MAX_EMAIL_LEN: usize = 254;

pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Longest window a single provisioning call may create rows for (~10 years).
pub const MAX_PROVISION_DAYS: i64 = 3660;

pub const MAX_LOCATION_LEN: usize = 256;
