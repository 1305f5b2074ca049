//! I/O helpers for running suites.

pub mod config;
pub mod logs;
pub mod process;
pub mod suite_file;
