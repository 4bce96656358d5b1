//! Opcodes, addressing modes, and the symbolic [`Address`]/[`Operand`] types
//! that stand in for a target-machine instruction's operand until layout.
//!
//! Ported from `duh/pmc.py`'s `Address`/`Instruction` classes, but resolved
//! without a mutable cell (`spec.md` DESIGN NOTES, preferred option): instead
//! of backpatching `instr.address.value` after the fact, every
//! [`PseudoInstruction`] is built with its final symbolic target already
//! known (an [`Address::Instruction`]/[`Address::PastInstruction`] pointing
//! at a [`LabelId`]), and [`assign_addresses`] resolves every label and
//! variable to a concrete line in one pass at the end of lowering.

use derive_more::Display;

use super::variables::{VarId, Variables};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Opcode {
    #[display("NULL")]
    Null,
    #[display("STOP")]
    Stop,
    #[display("LOAD")]
    Load,
    #[display("STORE")]
    Store,
    #[display("JUMP")]
    Jump,
    #[display("JNEG")]
    Jneg,
    #[display("JZERO")]
    Jzero,
    #[display("PRINT")]
    Print,
    #[display("ADD")]
    Add,
    #[display("SUB")]
    Sub,
    #[display("SHL")]
    Shl,
    #[display("SHR")]
    Shr,
    #[display("AND")]
    And,
    #[display("OR")]
    Or,
    #[display("NOT")]
    Not,
    #[display("XOR")]
    Xor,
}

impl Opcode {
    pub fn code(self) -> u16 {
        use Opcode::*;
        match self {
            Null => 0,
            Stop => 1,
            Load => 2,
            Store => 3,
            Jump => 4,
            Jneg => 5,
            Jzero => 6,
            Print => 7,
            Add => 8,
            Sub => 9,
            Shl => 10,
            Shr => 11,
            And => 12,
            Or => 13,
            Not => 14,
            Xor => 15,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        use Opcode::*;
        Some(match code {
            0 => Null,
            1 => Stop,
            2 => Load,
            3 => Store,
            4 => Jump,
            5 => Jneg,
            6 => Jzero,
            7 => Print,
            8 => Add,
            9 => Sub,
            10 => Shl,
            11 => Shr,
            12 => And,
            13 => Or,
            14 => Not,
            15 => Xor,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    Immediate,
    Direct,
    Indirect,
    Relative,
}

impl AddressMode {
    pub fn code(self) -> u16 {
        match self {
            AddressMode::Immediate => 0,
            AddressMode::Direct => 1,
            AddressMode::Indirect => 2,
            AddressMode::Relative => 3,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => AddressMode::Immediate,
            1 => AddressMode::Direct,
            2 => AddressMode::Indirect,
            3 => AddressMode::Relative,
            _ => return None,
        })
    }

    /// One more level of indirection (`spec.md` §4.1: `@` as rvalue uses
    /// `operand.mode + 1`). Only ever applied to a literal's or a variable's
    /// own mode, so `Indirect`/`Relative` inputs are out of scope.
    pub fn one_more_indirection(self) -> AddressMode {
        match self {
            AddressMode::Immediate => AddressMode::Direct,
            AddressMode::Direct => AddressMode::Indirect,
            other => unreachable!("@ applied to an already-indirect operand: {other:?}"),
        }
    }

    pub fn listing_char(self) -> char {
        match self {
            AddressMode::Immediate => '.',
            AddressMode::Direct => '@',
            AddressMode::Indirect => '*',
            AddressMode::Relative => '+',
        }
    }
}

/// A symbolic reference to a pseudo-instruction, assigned fresh by
/// [`super::compile::Compiler::fresh_label`]. Opaque outside this module:
/// the only thing one can do with a `LabelId` is build an [`Address`] or look
/// it up in the table [`assign_addresses`] builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub(super) usize);

/// A not-yet-resolved operand value (`spec.md` §3's `Address`, minus the
/// mutable cell — see module docs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Address {
    Immediate(i32),
    Variable(VarId),
    /// The line of the instruction labeled by this id.
    Instruction(LabelId),
    /// One past the line of the instruction labeled by this id
    /// (`spec.md`'s `DependentAddress`, specialized to its one transform).
    PastInstruction(LabelId),
}

/// An [`Address`] paired with the addressing mode it is used under. Mirrors
/// `duh/pmc.py`'s `Address`, which bundles `value` and `mode` together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    pub address: Address,
    pub mode: AddressMode,
}

impl Operand {
    pub fn immediate(value: i32) -> Self {
        Operand { address: Address::Immediate(value), mode: AddressMode::Immediate }
    }

    pub fn variable(id: VarId) -> Self {
        Operand { address: Address::Variable(id), mode: AddressMode::Direct }
    }

    pub fn jump_to(label: LabelId) -> Self {
        Operand { address: Address::Instruction(label), mode: AddressMode::Immediate }
    }

    pub fn jump_past(label: LabelId) -> Self {
        Operand { address: Address::PastInstruction(label), mode: AddressMode::Immediate }
    }

    pub fn with_mode(self, mode: AddressMode) -> Self {
        Operand { mode, ..self }
    }
}

/// An instruction whose operand and own position may still refer to labels.
#[derive(Clone, Copy, Debug)]
pub struct PseudoInstruction {
    pub label: LabelId,
    pub opcode: Opcode,
    pub operand: Operand,
}

/// A fully resolved instruction, ready for encoding or listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedInstruction {
    pub line: u16,
    pub opcode: Opcode,
    pub mode: AddressMode,
    pub address: i32,
}

fn resolve(
    address: Address,
    label_line: &crate::common::Map<LabelId, u16>,
    variables: &Variables,
) -> i32 {
    match address {
        Address::Immediate(value) => value,
        Address::Variable(id) => variables
            .resolved(id)
            .expect("variable address resolved by assign_addresses before use"),
        Address::Instruction(label) => *label_line
            .get(&label)
            .expect("label resolved by assign_addresses before use") as i32,
        Address::PastInstruction(label) => {
            *label_line.get(&label).expect("label resolved by assign_addresses before use") as i32
                + 1
        }
    }
}

/// The program assembler's layout pass (`spec.md` §4.3, steps 4–5): assign
/// every instruction its line number, assign every still-unresolved variable
/// an address starting right after the code, then resolve every operand.
pub fn assign_addresses(
    instructions: Vec<PseudoInstruction>,
    variables: &mut Variables,
) -> Vec<ResolvedInstruction> {
    let mut label_line = crate::common::Map::new();
    for (line, instr) in instructions.iter().enumerate() {
        label_line.insert(instr.label, line as u16);
    }

    let mut next = instructions.len() as i32;
    for id in variables.unresolved_in_declaration_order() {
        variables.resolve(id, next);
        next += 1;
    }

    instructions
        .into_iter()
        .enumerate()
        .map(|(line, instr)| ResolvedInstruction {
            line: line as u16,
            opcode: instr.opcode,
            mode: instr.operand.mode,
            address: resolve(instr.operand.address, &label_line, variables),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_its_numeric_code() {
        for code in 0..16u16 {
            let op = Opcode::from_code(code).unwrap();
            assert_eq!(op.code(), code);
        }
    }

    #[test]
    fn address_mode_adds_one_level_of_indirection() {
        assert_eq!(AddressMode::Immediate.one_more_indirection(), AddressMode::Direct);
        assert_eq!(AddressMode::Direct.one_more_indirection(), AddressMode::Indirect);
    }
}
