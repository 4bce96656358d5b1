//! Lowering of `while` loops (`spec.md` §4.2), ported from
//! `duh/compiler/while_loops.py`.
//!
//! Unlike the `if` patterns, both while patterns always emit the full
//! decisive-jump-plus-back-jump structure, even for an empty body — an
//! empty-bodied loop like `while 1 {}` must still be a real (infinite) loop,
//! not a no-op (`spec.md` §4.2 edge cases). The original's pattern-A
//! builder skips the jump pair when the body is empty, which silently turns
//! `while (< i n) {}` into an unconditional infinite loop regardless of the
//! condition; this is corrected here (see `DESIGN.md`).

use crate::front::ast::Node;
use crate::front::lang::Operator;

use super::address::{Opcode, Operand, PseudoInstruction};
use super::compile::{compile_node, Compiler};
use super::expressions::{compile_expression, invert_comparison, transform_comparison_condition};

pub fn compile_while(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    let Node::While { cond, .. } = node else { unreachable!() };

    match cond.expression_operator() {
        Some(Operator::Lt) => compile_while_with(node, compiler, Opcode::Jneg, Pattern::A, false),
        Some(Operator::Leq) => compile_while_with(node, compiler, Opcode::Jneg, Pattern::B, false),
        Some(Operator::Gt) => compile_while_with(node, compiler, Opcode::Jneg, Pattern::A, true),
        Some(Operator::Geq) => compile_while_with(node, compiler, Opcode::Jneg, Pattern::B, true),
        Some(Operator::Eq) => compile_while_with(node, compiler, Opcode::Jzero, Pattern::A, false),
        Some(Operator::Neq) => compile_while_with(node, compiler, Opcode::Jzero, Pattern::B, false),
        _ => compile_other_op_while(node, compiler),
    }
}

enum Pattern {
    A,
    B,
}

fn compile_while_with(
    node: &Node,
    compiler: &mut Compiler,
    jump: Opcode,
    pattern: Pattern,
    invert: bool,
) -> Vec<PseudoInstruction> {
    let Node::While { cond, block } = node else { unreachable!() };
    let cond = if invert { invert_comparison(cond) } else { (**cond).clone() };

    let condition = transform_comparison_condition(&cond, compiler);
    let body = block.0.iter().flat_map(|n| compile_node(n, compiler)).collect();

    match pattern {
        Pattern::A => build_pattern_a(condition, body, jump, compiler),
        Pattern::B => build_pattern_b(condition, body, jump, compiler),
    }
}

fn compile_other_op_while(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    let Node::While { cond, block } = node else { unreachable!() };
    let condition = compile_expression(cond, compiler);
    let body = block.0.iter().flat_map(|n| compile_node(n, compiler)).collect();
    build_pattern_b(condition, body, Opcode::Jzero, compiler)
}

/// ```text
///   condition:
///   J?   -> body
///   JUMP -> endwhile
///   body:
///    <block>
///    JUMP -> condition
///   endwhile:
/// ```
fn build_pattern_a(
    condition: Vec<PseudoInstruction>,
    block: Vec<PseudoInstruction>,
    jump: Opcode,
    compiler: &mut Compiler,
) -> Vec<PseudoInstruction> {
    let mut out = condition;
    let cond_start = out[0].label;

    let jump_to_begin = compiler.emit(Opcode::Jump, Operand::jump_to(cond_start));
    let mut body = block;
    body.push(jump_to_begin);
    let body_entry = body[0].label;

    let jump_to_body = compiler.emit(jump, Operand::jump_to(body_entry));
    let jump_to_end = compiler.emit(Opcode::Jump, Operand::jump_past(body.last().unwrap().label));

    out.push(jump_to_body);
    out.push(jump_to_end);
    out.extend(body);
    out
}

/// ```text
///   condition:
///   J?   -> endwhile
///   body:
///    <block>
///    JUMP -> condition
///   endwhile:
/// ```
fn build_pattern_b(
    condition: Vec<PseudoInstruction>,
    block: Vec<PseudoInstruction>,
    jump: Opcode,
    compiler: &mut Compiler,
) -> Vec<PseudoInstruction> {
    let mut out = condition;
    let cond_start = out[0].label;

    let jump_to_begin = compiler.emit(Opcode::Jump, Operand::jump_to(cond_start));
    let mut body = block;
    body.push(jump_to_begin);

    let jump_to_end = compiler.emit(jump, Operand::jump_past(body.last().unwrap().label));
    out.push(jump_to_end);
    out.extend(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;
    use crate::middle::compile::compile_program;

    #[test]
    fn counted_loop_jumps_back_to_the_condition() {
        let program =
            parse("var i (= i 0) while (< i 3) { print i (= i (+ i 1)) }").unwrap();
        let instructions = compile_program(&program);
        let back_jumps: Vec<_> =
            instructions.iter().filter(|i| i.opcode == super::Opcode::Jump).collect();
        assert!(!back_jumps.is_empty());
        for instr in &instructions {
            assert!((instr.address as usize) <= instructions.len());
        }
    }

    #[test]
    fn empty_body_loop_still_tests_the_condition() {
        let program = parse("while (< 1 0) {}").unwrap();
        let instructions = compile_program(&program);
        // A JNEG must be present, even with nothing in the loop body: the
        // loop must be skippable, not unconditional.
        assert!(instructions.iter().any(|i| i.opcode == super::Opcode::Jneg));
    }
}
