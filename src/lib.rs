//! Typed configuration bound from the process environment and deployment
//! descriptors.
//!
//! Derive [`Configurable`] on a struct, register it with
//! [`Config::builder`], then call [`Config::load`].

extern crate self as envbind;

pub mod cli;
pub mod config;
pub mod context;
mod error;
pub mod runtime;

pub use config::{Config, ConfigError, Configurable, Environment};
pub use context::{AppContext, Launch};
pub use envbind_derive::Configurable;
pub use error::Error;
pub use runtime::RuntimeConfig;
