//! The middle of the toolchain: lowering the AST into resolved
//! target-machine instructions (`spec.md` §4.1–§4.3).
//!
//! Forward jumps are resolved without shared mutable cells (`spec.md` DESIGN
//! NOTES, preferred option): every pseudo-instruction gets a [`address::LabelId`]
//! at creation time, jump targets reference that id through an
//! [`address::Address`], and a single pass at the end of [`compile::compile_program`]
//! (`address::assign_addresses`) turns every label and variable into a concrete
//! integer.

pub mod address;
pub mod compile;
pub mod conditionals;
pub mod expressions;
pub mod variables;
pub mod while_loops;

pub use address::{
    Address, AddressMode, LabelId, Opcode, Operand, PseudoInstruction, ResolvedInstruction,
};
pub use compile::{compile_program, Compiler};
pub use variables::{VarId, Variables};
