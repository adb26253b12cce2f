//! # keel
//!
//! An application lifecycle kernel: a process is assembled from pluggable
//! *features* that declare ordering constraints, and the
//! [`ApplicationServer`] drives every feature through a fixed phase sequence
//! — `collect_options`, `load_options`, `validate_options`, `prepare`,
//! `start` forward, `stop` in reverse — unwinding cleanly no matter where a
//! fault occurs.
//!
//! ## Quick start
//!
//! ```no_run
//! use keel::ApplicationServer;
//! use keel::features::{ConsoleFeature, LoggerFeature};
//!
//! # async fn example() -> keel::Result<()> {
//! let mut server = ApplicationServer::builder()
//!     .name("example")
//!     .version("1.0.0")
//!     .feature(LoggerFeature::descriptor(), Box::new(LoggerFeature::new()))
//!     .feature(ConsoleFeature::descriptor(), Box::new(ConsoleFeature::new()))
//!     .build()?;
//!
//! server.run(std::env::args().collect()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle model
//!
//! - Registration populates the [`FeatureRegistry`]; duplicate names fail at
//!   registration time.
//! - The resolver computes a total order once, honoring every `starts_after`
//!   constraint; ties break by registration order, cycles abort composition.
//! - Phase traversal is phase-major: every feature completes a phase before
//!   any feature enters the next one.
//! - A feature may disable itself or a sibling during validation; disabled
//!   features skip `prepare`/`start`/`stop` but keep their slot in the order
//!   and stay valid lookup targets.
//! - A fatal error triggers a best-effort reverse `stop` of everything that
//!   completed `prepare`; `stop`-phase errors are logged, never propagated.
//! - Shutdown intent is a process-wide token: set by [`ShutdownHandle`] (or
//!   an OS signal), observed at phase boundaries and inside any blocking
//!   feature loop.

pub mod dependency;
pub mod error;
pub mod feature;
pub mod features;
pub mod options;
pub mod server;

pub use error::{Error, Result};
pub use feature::{Feature, FeatureContext, FeatureDescriptor, FeatureRegistry, FeatureState};
pub use options::{Parameter, ProgramOptions};
pub use server::{ApplicationServer, ApplicationServerBuilder, ShutdownHandle};
