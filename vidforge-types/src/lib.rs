//! Vidforge Types
//!
//! Shared type definitions for task status records and profile listings
//! used by the media task engine and its transport.

pub mod error;
pub mod schemas;
pub mod status;

pub use error::*;
pub use schemas::*;
pub use status::*;
