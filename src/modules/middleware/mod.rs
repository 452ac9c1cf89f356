//! # Middleware Module
//!
//! Front door for protected calls. Each request is checked against the
//! multi-tier rate limiter first; a denied request is answered at once and
//! never reaches the load balancer. An admitted request goes through
//! admission control, which runs it, queues it or rejects it.
//!
//! ```no_run
//! use quota_gate::modules::middleware::Middleware;
//! use quota_gate::QuotaGateConfig;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let middleware: Middleware<String, usize> = Middleware::new(QuotaGateConfig::default());
//! middleware.setup()?;
//!
//! let outcome = middleware
//!     .handle_request(
//!         "payload".to_string(),
//!         Arc::new(|req: String| async move { req.len() }),
//!         "alice",
//!         "203.0.113.7",
//!     )
//!     .await;
//! assert_eq!(outcome.completed(), Some(7));
//!
//! middleware.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod gate;
mod status;

pub use gate::Middleware;
pub use status::SystemStatus;
