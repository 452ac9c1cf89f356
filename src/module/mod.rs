//! # Module Contract
//!
//! Lifecycle interface (`init`, `start`, `stop`, `status`, `metrics`) for
//! long-lived components, with manifests describing what each provides.

mod config;
mod contract;
mod error;
mod manifest;
mod status;

pub use config::ModuleConfig;
pub use contract::{MetricsPayload, ModuleContract};
pub use error::{ModuleError, ModuleResult};
pub use manifest::{Capability, ModuleManifest, ModuleManifestBuilder, SemVer};
pub use status::ModuleStatus;
