//! The features shipped with keel.
//!
//! Each implements the [`Feature`](crate::Feature) lifecycle contract and is
//! registered by the composition binary (`keelsh`). They double as the
//! reference implementations for the contract: the logger shows eager
//! configuration in `load_options`, the client shows self-disablement during
//! validation, the console shows resource acquisition in `prepare`, and the
//! shell shows a blocking `start` that carries the process's useful work.

mod client;
mod config;
mod console;
mod logger;
mod shell;
mod temp;

pub use client::ClientFeature;
pub use config::ConfigFeature;
pub use console::ConsoleFeature;
pub use logger::LoggerFeature;
pub use shell::ShellFeature;
pub use temp::TempFeature;
