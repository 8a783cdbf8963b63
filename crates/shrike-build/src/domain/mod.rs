//! Domain models for shrike build planning.
//!
//! - `Component`: a deployable pipeline unit with its watched paths
//! - `ComponentSet`: components keyed uniquely for one call
//! - error taxonomy shared across the crate

pub mod component;
pub mod error;

pub use component::{Component, ComponentKey, ComponentSet};
pub use error::{ConfigError, ManifestError, PathError, Result, ShrikeError};
