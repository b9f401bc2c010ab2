//! Shared blocking HTTP agent setup.

use std::time::Duration;

/// Build a blocking agent with a global per-request timeout. `0` leaves the
/// transport default in place.
pub fn agent(timeout_secs: u64) -> ureq::Agent {
    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    ureq::Agent::config_builder()
        .timeout_global(timeout)
        .build()
        .into()
}

/// HTTP status behind a ureq error, if the server answered at all
pub fn status_of(err: &ureq::Error) -> Option<u16> {
    match err {
        ureq::Error::StatusCode(code) => Some(*code),
        _ => None,
    }
}

/// Whether a status means the credentials were rejected
pub fn is_auth_status(code: u16) -> bool {
    code == 401 || code == 403
}
