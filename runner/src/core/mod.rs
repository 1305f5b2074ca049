//! Deterministic logic shared by the engine.
//!
//! Core modules are free of filesystem and process side effects. They operate
//! on in-memory trees and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod graph;
pub mod invariants;
pub mod path;
pub mod render;
