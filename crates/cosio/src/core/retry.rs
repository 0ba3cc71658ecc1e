use std::time::Duration;

use crate::data::DomainPolicy;

/// What to do with a received response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// The service rejected the request; retrying cannot help.
    Reject,
    Retry,
}

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cosio::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(1, Duration::from_millis(100)), Duration::from_millis(200));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Classify an HTTP exchange.
///
/// `error_body` is whether the body parsed as an `<Error>` document; it only
/// matters for success statuses of operations that report failures in the body.
pub fn classify(status: u16, error_body: bool, has_request_id: bool) -> Disposition {
    match status {
        200..=299 if !error_body => Disposition::Success,
        200..=299 if has_request_id => Disposition::Reject,
        200..=299 => Disposition::Retry,
        400..=499 => Disposition::Reject,
        _ => Disposition::Retry,
    }
}

pub fn is_redirect(status: u16) -> bool { matches!(status, 301 | 302 | 307) }

/// Decide whether the next attempt should go to the backup domain.
///
/// `status` is `None` for transport failures. Only failures that never
/// reached the service (no request id) qualify. Redirects switch at once;
/// anything else only from the last retry boundary, and only for 5xx or
/// transport failures.
pub fn should_fail_over(
    policy: &DomainPolicy,
    status: Option<u16>,
    has_request_id: bool,
    attempt: u32,
    max_retries: u32,
) -> bool {
    if !policy.fail_over || policy.fixed_host.is_some() || has_request_id {
        return false;
    }
    match status {
        Some(s) if is_redirect(s) => true,
        _ if attempt.saturating_add(1) < max_retries => false,
        Some(s) => s >= 500,
        None => true,
    }
}
