//! # Capstan Core Kernel
//!
//! Application-level plumbing around the plugin system:
//!
//! - **Composition root**: [`Application`](bootstrap::Application) builds every
//!   collaborator explicitly and hands out the manager and registry.
//! - **Settings**: [`Settings`](settings::Settings), read from a config file.
//! - **Core Constants**: system-wide names and defaults in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result`.
pub mod bootstrap;
pub mod constants;
pub mod error;
pub mod settings;

pub use bootstrap::Application;
pub use error::{Error, Result};
pub use settings::Settings;
