//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All user-facing output goes through this module so quiet and debug
//! modes behave the same in every command. Library code logs through
//! `tracing` instead.

pub mod output;
