//! Heuristics module for the TSP.
//!
//! This module exports the construction heuristics, the local searches and
//! the evolutionary algorithms built on top of them.

pub mod construction;
pub mod local_search;
pub mod population;
pub mod operators;
pub mod genetic;

pub use construction::*;
pub use local_search::*;
pub use population::*;
pub use operators::*;
pub use genetic::*;
