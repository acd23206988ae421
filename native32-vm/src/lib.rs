//! Stack bytecode interpreter for Native32 action programs.
//!
//! The VM itself is container-agnostic about rendering/audio/input: those
//! side effects go through [`Host`], which the embedding scheduler
//! implements. See [`Vm::run`] for the instruction dispatch loop.

pub mod error;
pub mod host;
pub mod value;
pub mod vm;

pub use error::VmError;
pub use host::{Host, Property};
pub use value::Value;
pub use vm::{Vm, DEFAULT_MAX_STEPS};
