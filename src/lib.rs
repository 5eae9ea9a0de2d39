//! Steer - declarative reconciliation of Rancher clusters and nodes
//!
//! Steer converges Rancher-managed resources to a caller-declared desired
//! state over the Rancher v3 HTTP/JSON API. Callers say what they want
//! (`present`/`absent` for clusters, `drained`/`cordoned`/`uncordoned` for
//! nodes); the reconcilers detect current remote state, decide whether an
//! action is needed, and issue the minimal requests to converge — tolerating
//! a remote that is slow, asynchronous, or already in the target state.
//!
//! # Architecture
//!
//! Two independent reconcilers share one design pattern and one HTTP
//! collaborator:
//! - [`cluster::ClusterReconciler`] creates or deletes a cluster by name; on
//!   creation it also provisions (or reuses) a registration token.
//! - [`node::NodeReconciler`] transitions a node between active, cordoned,
//!   and drained states, polling drain completion under a deadline.
//!
//! Every reconciliation returns an [`Outcome`] — never a panic or a raw
//! error — so callers always get a structured `{failed, changed, payload}`
//! result they can act on.
//!
//! # Modules
//!
//! - [`api`] - Rancher API collaborator contract, client, and response helpers
//! - [`cluster`] - Cluster presence reconciliation and registration tokens
//! - [`node`] - Node cordon/uncordon/drain reconciliation
//! - [`outcome`] - Structured reconciliation results
//! - [`error`] - Error types for the reconciliation core

#![deny(missing_docs)]

pub mod api;
pub mod cluster;
pub mod error;
pub mod node;
pub mod outcome;

pub use error::Error;
pub use outcome::Outcome;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Centralizing these here keeps the reconcilers, client defaults, and test
// fixtures consistent.

/// Interval between node re-fetches while waiting for a drain to finish
pub const DRAIN_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Default upper bound, in seconds, on total drain polling time
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 120;

/// Default eviction grace period; -1 lets each pod use its own default
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = -1;
