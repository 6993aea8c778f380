//! mixlayer - one mixer API over several sound subsystems.
//!
//! Applications create a [`mixer::Context`], open it and read the device,
//! stream and control graph of whichever backend connected. Backends are
//! tried in priority order; the built-in Null backend keeps the API usable
//! when no sound subsystem is present.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mixlayer::mixer::{BackendRegistry, Context, State};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut context = Context::new(Arc::new(BackendRegistry::with_builtin()));
//! context.set_app_name(Some("Volume Panel"))?;
//! context.open()?;
//!
//! if context.wait_until_settled().await == State::Ready {
//!     for device in context.devices() {
//!         println!("{}", device.label());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Backend adapters built into the crate.
pub mod backends;

/// Command-line monitor.
pub mod cli;

/// Shared reactive primitives.
pub mod common;

/// Configuration schema and loading.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// The mixer object graph and backend orchestration.
pub mod mixer;

/// Logging initialization.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use crate::core::{MixerError, Result};
