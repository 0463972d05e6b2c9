//! Channel layer for prompt matching on PTY sessions.
//!
//! This module handles reading interactive shell output up to the device
//! prompt, including ANSI stripping.

mod buffer;
mod pty;

pub use buffer::PatternBuffer;
pub use pty::{PtyChannel, PtyConfig};
