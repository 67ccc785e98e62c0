//! CLI module for reconchain
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{parse_params, Args, Commands};
