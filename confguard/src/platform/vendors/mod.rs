//! Built-in vendor profiles.
//!
//! Prompt patterns are adapted from [scrapli](https://github.com/carlmontanari/scrapli)
//! and collapsed into one pattern per vendor covering exec and configuration modes.

pub mod arista;
pub mod cisco;
pub mod generic;
pub mod juniper;
