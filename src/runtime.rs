//! Runtime for executing turns
//!
//! The executor owns the effect loop around the pure state machine; the
//! traits module holds the I/O seams it talks through.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{TurnError, TurnRunner, SYNTHESIS_PROMPT};
pub use traits::*;
