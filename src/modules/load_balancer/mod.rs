//! # Load Balancer Module
//!
//! Admission control for calls to a capacity-limited upstream: a cap on
//! concurrently executing handlers, a bounded FIFO for requests that arrive
//! while every slot is taken, and a deadline on each handler.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────────────────────────────────────┐
//!              │                LoadBalancer                  │
//!  request ───▶│  slot free? ──yes──▶ execute (timeout) ──────┼──▶ Outcome
//!              │      │                    ▲                  │
//!              │      no                   │ slot             │
//!              │      ▼                    │                  │
//!              │  ┌──────────────┐   ┌─────┴────────┐         │
//!              │  │ RequestQueue │──▶│ drain task   │         │
//!              │  │  (bounded)   │   │ process_queue│         │
//!              │  └──────────────┘   └──────────────┘         │
//!              └──────────────────────────────────────────────┘
//! ```
//!
//! A queued caller waits on a oneshot channel for the outcome produced by
//! the drain task. Without a running drain task, a request that finds no
//! free slot is rejected immediately.

pub mod balancer;
pub mod config;
pub mod error;
pub mod handler;
pub mod queue;

pub use balancer::{LoadBalancer, LoadBalancerStats, QueuedRequest, SystemLoad};
pub use config::{LoadBalancerConfig, QueueConfig, TimeoutPolicy, MAX_RETRIES_LIMIT};
pub use error::{LoadBalancerError, LoadBalancerResult};
pub use handler::{Handler, HandlerFuture, SharedHandler};
pub use queue::RequestQueue;
