//! A symbolic execution engine for Java bytecode.
//!
//! A `vm::State` holds one branch of the execution: thread stack, heap, static store and path
//! condition. The `engine` runs instructions on it, initializing classes and throwing the
//! virtual machine's own exceptions as it goes, and asks a `DecisionOracle` which branch to
//! follow wherever the path condition leaves more than one open.

#[macro_use]
pub mod logging;

pub mod config;
pub mod engine;
pub mod model;
pub mod parser;
pub mod util;
pub mod vm;
