//! `duh`: a toolchain for a small imperative language targeting a 16-bit
//! accumulator virtual machine. See `src/bin` directory for the executable
//! program using this library.

pub mod common;
pub mod error;
pub mod front;
pub mod middle;
pub mod back;
