//! # Capstan Core Plugin System
//!
//! Discovers plugins, tracks which are enabled, loads and unloads the
//! capabilities they expose, and serves a permission-filtered, dispatchable
//! index of those capabilities.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`discovery`]**: Scans a plugin root and parses each plugin's manifest,
//!   isolating per-plugin failures as manifests in state `Error`.
//! - **[`loader`]**: Resolves a manifest's declared capabilities through the
//!   [`CapabilityResolver`] seam, normally a compile-time [`CapabilityCatalog`].
//! - **[`manager`]**: The [`PluginManager`] state machine. Owns the reentrant
//!   lock, the capability index and the enable/disable/refresh operations.
//! - **[`registry`]**: The [`CapabilityRegistry`] façade consumed by request
//!   layers: per-identity filtering and structured dispatch results.
//! - **[`manifest`]**: [`PluginManifest`] and [`PluginState`].
//! - **[`traits`]**: The [`Capability`] contract and [`Identity`].
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
//! - **[`version`]**: Semver parsing and constraint checks for manifests.
pub mod discovery;
pub mod error;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod traits;
pub mod version;

pub use discovery::PluginDiscovery;
pub use error::{PluginResult, PluginSystemError};
pub use loader::{CapabilityCatalog, CapabilityLoader, CapabilityResolver, ResolveError};
pub use manager::{PluginManager, RefreshReport, RegisteredCapability};
pub use manifest::{ManifestBuilder, PluginManifest, PluginState};
pub use registry::{CapabilityRegistry, DispatchResult, Outcome};
pub use traits::{Capability, CapabilityDescriptor, CapabilityError, Identity};
pub use version::VersionRange;

// Test module declaration
#[cfg(test)]
mod tests;
