use std::time::Duration;

use vanish_blob::BlobError;

/// S3 error codes that mean "try again later".
const RETRYABLE_CODES: &[&str] = &[
    "SlowDown",
    "ServiceUnavailable",
    "InternalError",
    "RequestTimeout",
    "Throttling",
    "ThrottlingException",
];

/// Classify an SDK error into a [`BlobError`].
///
/// `code` is the service error code when S3 answered at all. Throttling and
/// server-side failures become retryable, as do timeouts and network
/// failures found in the rendered message. Anything else is a backend
/// failure.
pub fn classify_sdk_error(code: Option<&str>, error_str: &str, timeout: Duration) -> BlobError {
    if code == Some("RequestTimeout") {
        return BlobError::Timeout(timeout);
    }
    if code.is_some_and(|c| RETRYABLE_CODES.contains(&c)) {
        return BlobError::Connection(error_str.to_owned());
    }

    let lower = error_str.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        BlobError::Timeout(timeout)
    } else if [
        "dispatch failure",
        "connect",
        "dns",
        "network",
        "throttl",
        "slowdown",
        "slow down",
        "service unavailable",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        BlobError::Connection(error_str.to_owned())
    } else {
        BlobError::Backend(error_str.to_owned())
    }
}
