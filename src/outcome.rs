//! Results of passing a request through admission control.

use crate::modules::rate_limiting::RemainingTokens;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    /// One of the rate limit tiers was exhausted.
    RateLimited,
    /// No in-flight slot and no room in the queue.
    Overloaded,
    /// The handler missed its deadline.
    TimedOut,
    /// The queue was shut down before the request ran.
    Shutdown,
}

/// Structured rejection, serializable as the error body returned to clients.
///
/// ```json
/// {"error": "system is at capacity", "queue_size": 5000, "retry_after": 5.0}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    #[serde(skip)]
    pub kind: RejectionKind,

    /// Human readable reason.
    pub error: String,

    /// Queue length at rejection time (overload only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,

    /// Tier balances at rejection time (rate limiting only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_tokens: Option<RemainingTokens>,

    /// Suggested wait before retrying, serialized in seconds.
    #[serde(serialize_with = "serialize_secs")]
    pub retry_after: Duration,
}

impl Rejection {
    /// A rate limit tier had no token.
    #[must_use]
    pub fn rate_limited(remaining_tokens: RemainingTokens, retry_after: Duration) -> Self {
        Self {
            kind: RejectionKind::RateLimited,
            error: "rate limit exceeded".to_string(),
            queue_size: None,
            remaining_tokens: Some(remaining_tokens),
            retry_after,
        }
    }

    /// Neither an in-flight slot nor queue room became available.
    #[must_use]
    pub fn overloaded(queue_size: usize, retry_after: Duration) -> Self {
        Self {
            kind: RejectionKind::Overloaded,
            error: "system is at capacity".to_string(),
            queue_size: Some(queue_size),
            remaining_tokens: None,
            retry_after,
        }
    }

    /// The handler did not finish within the request timeout.
    #[must_use]
    pub fn timed_out(retry_after: Duration) -> Self {
        Self {
            kind: RejectionKind::TimedOut,
            error: "request timed out".to_string(),
            queue_size: None,
            remaining_tokens: None,
            retry_after,
        }
    }

    /// The request was still queued when the drain task stopped.
    #[must_use]
    pub fn shutdown(retry_after: Duration) -> Self {
        Self {
            kind: RejectionKind::Shutdown,
            error: "system is shutting down".to_string(),
            queue_size: None,
            remaining_tokens: None,
            retry_after,
        }
    }

    /// Retry-after in whole seconds, rounded up.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs.saturating_add(1)
        } else {
            secs
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, retry after {:.1}s",
            self.error,
            self.retry_after.as_secs_f64()
        )
    }
}

impl std::error::Error for Rejection {}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Either the handler's own response or a rejection.
///
/// Serializes untagged: a completed outcome is indistinguishable from the
/// handler's response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    /// The handler ran to completion.
    Completed(T),
    /// The request was turned away or its handler timed out.
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Completed(_) => None,
        }
    }

    /// The handler response, if the request completed.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Convert into a `Result` so rejections can be propagated with `?`.
    pub fn into_result(self) -> Result<T, Rejection> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Rejected(r) => Err(r),
        }
    }

    /// Map the completed value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Rejected(r) => Outcome::Rejected(r),
        }
    }
}

impl<T> From<Rejection> for Outcome<T> {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overload_body() {
        let rejection = Rejection::overloaded(5000, Duration::from_secs(5));
        assert_eq!(
            serde_json::to_value(&rejection).unwrap(),
            json!({"error": "system is at capacity", "queue_size": 5000, "retry_after": 5.0})
        );
    }

    #[test]
    fn test_timeout_body() {
        let rejection = Rejection::timed_out(Duration::from_millis(1500));
        assert_eq!(
            serde_json::to_value(&rejection).unwrap(),
            json!({"error": "request timed out", "retry_after": 1.5})
        );
        assert_eq!(rejection.retry_after_secs(), 2);
    }

    #[test]
    fn test_rate_limited_body() {
        let remaining = RemainingTokens {
            global: 1800,
            user_minute: 0,
            ..Default::default()
        };
        let rejection = Rejection::rate_limited(remaining, Duration::from_secs(5));
        let body = serde_json::to_value(&rejection).unwrap();

        assert_eq!(body["error"], "rate limit exceeded");
        assert_eq!(body["remaining_tokens"]["global"], 1800);
        assert_eq!(body["remaining_tokens"]["user_minute"], 0);
        assert_eq!(body["retry_after"], 5.0);
        assert!(body.get("queue_size").is_none());
    }

    #[test]
    fn test_outcome_untagged() {
        let ok: Outcome<serde_json::Value> = Outcome::Completed(json!({"status": "ok"}));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"status": "ok"}));

        let rejected: Outcome<u32> = Rejection::timed_out(Duration::from_secs(5)).into();
        assert!(rejected.is_rejected());
        assert_eq!(
            rejected.rejection().map(|r| r.kind),
            Some(RejectionKind::TimedOut)
        );
    }

    #[test]
    fn test_into_result() {
        let ok: Outcome<u32> = Outcome::Completed(7);
        assert_eq!(ok.map(|v| v * 2).into_result(), Ok(14));

        let err: Outcome<u32> = Rejection::shutdown(Duration::from_secs(5)).into();
        let rejection = err.into_result().unwrap_err();
        assert_eq!(rejection.to_string(), "system is shutting down, retry after 5.0s");
    }
}
