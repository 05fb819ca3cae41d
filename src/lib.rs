//! MIDI patchbay client
//!
//! Mirrors the port/connection graph held by a routing authority, edits it
//! through the authority, and decodes the live MIDI stream of one port.

pub mod authority;
pub mod config;
pub mod error;
pub mod graph;
pub mod midi;
pub mod monitor;
pub mod view;

pub use error::{Error, Result};
