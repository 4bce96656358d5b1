//! The `.pmc` textual listing format (`spec.md` §6): a header line with the
//! instruction count, then one decoded instruction per line.
//!
//! Ported from `duh/pmc.py`'s `Instruction.__str__`, which this format is
//! line-compatible with except that the addressing-mode glyph is written out
//! (`.`/`@`/`*`/`+`) instead of a numeric mode, matching `spec.md` §6's
//! `LINE: OPCODE MODE_CHAR ADDRESS` grammar.

use std::fmt::Write as _;

use crate::middle::address::ResolvedInstruction;

/// Render `instructions` as the `.pmc` listing text (`spec.md` §6).
pub fn format_listing(instructions: &[ResolvedInstruction]) -> String {
    let mut out = String::new();
    writeln!(out, "{}", instructions.len()).expect("writing to a String cannot fail");
    for instr in instructions {
        writeln!(
            out,
            "{}: {} {} {}",
            instr.line,
            instr.opcode,
            instr.mode.listing_char(),
            instr.address
        )
        .expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;
    use crate::middle::compile::compile_program;

    #[test]
    fn header_line_matches_instruction_count() {
        let program = parse("var x (= x 42) print x").unwrap();
        let instructions = compile_program(&program);
        let listing = format_listing(&instructions);
        let header: usize = listing.lines().next().unwrap().parse().unwrap();
        assert_eq!(header, instructions.len());
        assert_eq!(listing.lines().count(), instructions.len() + 1);
    }

    #[test]
    fn mode_chars_match_the_listing_grammar() {
        let program = parse("cell p 100 print (@ p)").unwrap();
        let instructions = compile_program(&program);
        let listing = format_listing(&instructions);
        assert!(listing.contains('.') || listing.contains('@'));
    }
}
