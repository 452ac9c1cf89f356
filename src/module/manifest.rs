//! Module manifest and capability declarations.

use std::collections::HashSet;

/// Semantic version representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    /// Creates a new semantic version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Capabilities that a module can provide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Token-bucket rate limiting.
    RateLimiting,

    /// Concurrency capping and overflow queuing.
    LoadBalancing,
}

/// Manifest describing a module's identity and capabilities.
#[derive(Debug, Clone)]
pub struct ModuleManifest {
    /// Unique name of the module.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Module version.
    pub version: SemVer,

    /// Capabilities provided by this module.
    pub capabilities: HashSet<Capability>,
}

impl ModuleManifest {
    /// Creates a new module manifest builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModuleManifestBuilder {
        ModuleManifestBuilder::new(name)
    }

    /// Checks if the module has a specific capability.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Builder for creating module manifests.
#[derive(Debug)]
pub struct ModuleManifestBuilder {
    name: String,
    description: String,
    version: SemVer,
    capabilities: HashSet<Capability>,
}

impl ModuleManifestBuilder {
    /// Creates a new builder with the given module name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: SemVer::new(0, 1, 0),
            capabilities: HashSet::new(),
        }
    }

    /// Sets the module description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the module version.
    #[must_use]
    pub fn version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.version = SemVer::new(major, minor, patch);
        self
    }

    /// Adds a capability.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Builds the manifest.
    #[must_use]
    pub fn build(self) -> ModuleManifest {
        ModuleManifest {
            name: self.name,
            description: self.description,
            version: self.version,
            capabilities: self.capabilities,
        }
    }
}
