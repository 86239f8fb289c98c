//! Compute module - Worker pool, reference collaborators and the evolution loop.

mod constraints;
mod cppn;
mod encoder;
mod pool;
mod population;

pub mod evolution;

pub use constraints::*;
pub use cppn::*;
pub use encoder::*;
pub use pool::*;
pub use population::*;
