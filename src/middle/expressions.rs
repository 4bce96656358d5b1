//! Expression lowering (`spec.md` §4.1): turns an AST expression into an
//! accumulator-oriented instruction stream, ported from
//! `duh/compiler/expressions.py`.

use crate::common::Id;
use crate::front::ast::Node;
use crate::front::lang::Operator;

use super::address::{AddressMode, Opcode, Operand, PseudoInstruction};
use super::compile::Compiler;

fn identifier_address(name: Id, compiler: &Compiler) -> Operand {
    Operand::variable(compiler.variables.address_of(name))
}

fn literal_operand(value: i64) -> Operand {
    Operand::immediate(value as i32)
}

/// Evaluate `node` and leave the result stored somewhere in memory, without
/// necessarily emitting any code: an identifier is already stored, and a
/// single-argument parenthesised expression is just unwrapped. Otherwise the
/// value is computed into the accumulator and pushed to a fresh TVS slot.
pub fn store_in_memory(node: &Node, compiler: &mut Compiler) -> (Vec<PseudoInstruction>, Operand) {
    match node {
        Node::Identifier(name) => (Vec::new(), identifier_address(*name, compiler)),
        Node::Expression(args) if args.len() == 1 => store_in_memory(&args[0], compiler),
        _ => {
            let mut instructions = compile_expression(node, compiler);
            let address = compiler.variables.tvs_push();
            let operand = Operand::variable(address);
            // STORE's own address field names the slot directly (immediate
            // mode): `memory[slot] = AC`. Storing with Direct mode instead
            // would resolve `operand = memory[slot]` and write through
            // *that* as an address (`original_source/duh/compiler/expressions.py`
            // stores with `Address.IMMEDIATE` for the same reason). The
            // slot is still handed back to callers as a Direct operand, so
            // later reads of it load `memory[slot]` as intended.
            instructions.push(compiler.emit(Opcode::Store, operand.with_mode(AddressMode::Immediate)));
            (instructions, operand)
        }
    }
}

/// Evaluate `node` and leave the result in the accumulator.
pub fn compile_expression(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    match node {
        Node::Identifier(name) => {
            let operand = identifier_address(*name, compiler);
            vec![compiler.emit(Opcode::Load, operand)]
        }
        Node::Literal(value) => {
            vec![compiler.emit(Opcode::Load, literal_operand(*value))]
        }
        Node::Expression(args) if args.len() == 1 => compile_expression(&args[0], compiler),
        Node::Expression(_) => {
            let op = node.expression_operator().expect("non-empty Expression starts with Operator");
            match op {
                Operator::Assign => compile_assignment(node, compiler),
                Operator::At => compile_dereference(node, compiler),
                Operator::Inc => compile_increment(node, compiler),
                Operator::Dec => compile_decrement(node, compiler),
                _ if op.is_unary() => store_in_ac_unary(node, compiler),
                _ => store_in_ac_binary(node, compiler),
            }
        }
        other => unreachable!("compile_expression called on a non-expression node: {other:?}"),
    }
}

fn operator_to_opcode(op: Operator) -> Opcode {
    match op {
        Operator::Add => Opcode::Add,
        Operator::Sub => Opcode::Sub,
        Operator::Shl => Opcode::Shl,
        Operator::Shr => Opcode::Shr,
        Operator::And => Opcode::And,
        Operator::Or => Opcode::Or,
        Operator::Xor => Opcode::Xor,
        Operator::Not => Opcode::Not,
        other => unreachable!("{other} has no generic arithmetic opcode"),
    }
}

/// `(op a)` for a unary operator not already handled by one of the four
/// special forms: evaluate the operand, then apply the opcode to AC.
fn store_in_ac_unary(expression: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    let args = match expression {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let op = expression.expression_operator().unwrap();
    let opcode = operator_to_opcode(op);
    let arg = &args[1];
    let (mut instructions, operand) = evaluate_argument(arg, compiler);
    instructions.push(compiler.emit(opcode, operand));
    instructions
}

/// `(op a b c …)`: fold left-associatively with `a` computed straight into
/// the accumulator and each later operand evaluated to its own slot first
/// (`spec.md` §4.1).
fn store_in_ac_binary(expression: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    let args = match expression {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let op = expression.expression_operator().unwrap();
    let opcode = operator_to_opcode(op);

    let operands = &args[1..];
    let store_in_mem_args = &operands[1..];
    let store_in_ac_arg = &operands[0];

    let mut instructions = Vec::new();
    let mut addresses = Vec::with_capacity(store_in_mem_args.len());
    for arg in store_in_mem_args {
        let (arg_instructions, address) = evaluate_argument(arg, compiler);
        instructions.extend(arg_instructions);
        addresses.push(address);
    }

    instructions.extend(compile_expression(store_in_ac_arg, compiler));

    for address in addresses {
        instructions.push(compiler.emit(opcode, address));
        compiler.variables.tvs_pop(&address.address);
    }

    instructions
}

/// Evaluates `node` for use as an operand: literals return immediately
/// without emitting anything, everything else routes through
/// [`store_in_memory`].
pub fn evaluate_argument(node: &Node, compiler: &mut Compiler) -> (Vec<PseudoInstruction>, Operand) {
    match node {
        Node::Literal(value) => (Vec::new(), literal_operand(*value)),
        _ => store_in_memory(node, compiler),
    }
}

/// `(= lhs rhs)`. Only identifiers and dereferences may be assigned to.
fn compile_assignment(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    let args = match node {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let lhs = &args[1];
    let rhs = &args[2];

    let mut instructions = Vec::new();
    let (address, mode) = match lhs {
        Node::Identifier(name) => (identifier_address(*name, compiler).address, AddressMode::Immediate),
        _ => {
            let (ref_instructions, operand) = compile_reference(lhs, compiler);
            instructions.extend(ref_instructions);
            (operand.address, AddressMode::Direct)
        }
    };

    instructions.extend(compile_expression(rhs, compiler));
    instructions.push(compiler.emit(Opcode::Store, Operand { address, mode }));
    compiler.variables.tvs_pop(&address);
    instructions
}

/// `(@ e)` used as an lvalue: `e`'s value is the address being written
/// through, so it only needs to be stored somewhere, not loaded.
fn compile_reference(node: &Node, compiler: &mut Compiler) -> (Vec<PseudoInstruction>, Operand) {
    let args = match node {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    store_in_memory(&args[1], compiler)
}

/// `(@ e)` used as an rvalue: one more level of indirection than evaluating
/// `e` directly would give (`spec.md` §4.1).
fn compile_dereference(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    let args = match node {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let (mut instructions, operand) = evaluate_argument(&args[1], compiler);
    let mode = operand.mode.one_more_indirection();
    instructions.push(compiler.emit(Opcode::Load, operand.with_mode(mode)));
    compiler.variables.tvs_pop(&operand.address);
    instructions
}

/// `++`/`--`: compute `operand ± 1` into the accumulator. Deliberately does
/// not write the result back — the source grammar has no dedicated
/// increment statement, only `(= x (++ x))`-style assignment, so a silent
/// writeback would be a second, undocumented way to mutate `x`.
fn compile_increment(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    compile_step(node, compiler, Opcode::Add)
}

fn compile_decrement(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    compile_step(node, compiler, Opcode::Sub)
}

fn compile_step(node: &Node, compiler: &mut Compiler, opcode: Opcode) -> Vec<PseudoInstruction> {
    let args = match node {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let mut instructions = compile_expression(&args[1], compiler);
    instructions.push(compiler.emit(opcode, Operand::immediate(1)));
    instructions
}

/// Rewrite a comparison into the arithmetic expression whose accumulator
/// result the control-flow lowering can branch on, then evaluate it
/// (`spec.md` §4.2).
pub fn transform_comparison_condition(node: &Node, compiler: &mut Compiler) -> Vec<PseudoInstruction> {
    compile_expression(&convert_comparison(node), compiler)
}

pub fn convert_comparison(node: &Node) -> Node {
    let args = match node {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let op = node.expression_operator().expect("convert_comparison on a non-comparison node");
    let rest = &args[1..];

    match op {
        Operator::Lt => Node::Expression(
            std::iter::once(Node::Operator(Operator::Sub)).chain(rest.iter().cloned()).collect(),
        ),
        Operator::Leq => Node::Expression(
            std::iter::once(Node::Operator(Operator::Sub))
                .chain(rest.iter().rev().cloned())
                .collect(),
        ),
        Operator::Eq | Operator::Neq => Node::Expression(
            std::iter::once(Node::Operator(Operator::Xor)).chain(rest.iter().cloned()).collect(),
        ),
        other => unreachable!("{other} is not a comparison operator"),
    }
}

/// `a > b` becomes `b < a`; `a >= b` becomes `b <= a` (`spec.md` §4.2).
pub fn invert_comparison(node: &Node) -> Node {
    let args = match node {
        Node::Expression(args) => args,
        _ => unreachable!(),
    };
    let op = node.expression_operator().expect("invert_comparison on a non-comparison node");
    let rest: Vec<Node> = args[1..].iter().rev().cloned().collect();

    let inverted_op = match op {
        Operator::Gt => Operator::Lt,
        Operator::Geq => Operator::Leq,
        other => other,
    };

    Node::Expression(std::iter::once(Node::Operator(inverted_op)).chain(rest).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;
    use crate::middle::variables::Variables;

    fn compiler_for(source: &str) -> (Compiler, Vec<Node>) {
        let program = parse(source).unwrap();
        let variables = Variables::from_program(&program);
        (Compiler::new(variables), program.0)
    }

    #[test]
    fn binary_fold_pops_every_temporary_it_pushes() {
        let (mut compiler, nodes) = compiler_for("print (+ 1 2 3)");
        let Node::Print(expr) = &nodes[0] else { panic!() };
        let before = compiler.variables.tvs_active();
        compile_expression(expr, &mut compiler);
        assert_eq!(compiler.variables.tvs_active(), before);
    }

    #[test]
    fn lt_rewrites_to_subtraction() {
        let (_, nodes) = compiler_for("if (< 1 2) print 1");
        let Node::If { cond, .. } = &nodes[0] else { panic!() };
        let rewritten = convert_comparison(cond);
        assert_eq!(rewritten.expression_operator(), Some(Operator::Sub));
    }

    #[test]
    fn leq_rewrites_with_reversed_operands() {
        let (_, nodes) = compiler_for("if (<= 1 2) print 1");
        let Node::If { cond, .. } = &nodes[0] else { panic!() };
        let rewritten = convert_comparison(cond);
        match rewritten {
            Node::Expression(args) => assert!(matches!(args[1], Node::Literal(2))),
            _ => panic!(),
        }
    }

    #[test]
    fn gt_inverts_into_lt_with_swapped_operands() {
        let (_, nodes) = compiler_for("if (> 1 2) print 1");
        let Node::If { cond, .. } = &nodes[0] else { panic!() };
        let inverted = invert_comparison(cond);
        assert_eq!(inverted.expression_operator(), Some(Operator::Lt));
        match inverted {
            Node::Expression(args) => assert!(matches!(args[1], Node::Literal(2))),
            _ => panic!(),
        }
    }
}
