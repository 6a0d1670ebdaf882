//! Serial ingestion for the fire panel controller
//!
//! This module provides functionality for:
//! - Listing available serial ports (requires the `serial` feature)
//! - Reading controller output on a background thread
//! - Replaying captured output through the same path

pub mod ingest;
#[cfg(feature = "serial")]
pub mod port;
pub mod replay;
pub mod source;

pub use ingest::{LinkState, SerialIngestor};
#[cfg(feature = "serial")]
pub use port::{PortConfig, SerialConnection};
pub use replay::ReplaySource;
pub use source::ByteSource;
