// Textual bytecode format: one instruction per line, `OPCODE [operand]`,
// `;` line comments, and `name:` labels resolved in a first pass before
// instructions are lowered in a second — the two-pass scheme `snacchus-vcpu`'s
// `vasm` crate uses, and the same shape the teacher's own (now superseded)
// `decode_word`/`filter_labels`/`lower` functions implemented for its legacy
// text format.

use std::fmt;

use crate::bytecode::{Instruction, Opcode, Operand, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssembleOptions {
    /// When false (the default), opcode mnemonics are matched
    /// case-insensitively, e.g. `push` and `PUSH` are equivalent.
    pub case_sensitive: bool,
    /// When true, an operand whose literal syntax doesn't match what the
    /// opcode expects (e.g. `JUMP "oops"`) is a hard error rather than
    /// best-effort coercion.
    pub strict_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for AssembleError {}

/// One line of source after comments are stripped and whitespace trimmed:
/// either a `name:` label, a bare opcode, or an opcode with its operand
/// text still unparsed (resolved against the label table in the second
/// pass, since a jump target is often a label that hasn't been seen yet).
enum Line<'a> {
    Label(&'a str),
    Instruction { mnemonic: &'a str, operand_text: Option<&'a str> },
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn classify(line_no: usize, raw: &str) -> Result<Option<Line<'_>>, AssembleError> {
    let text = strip_comment(raw).trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Some(name) = text.strip_suffix(':') {
        let name = name.trim();
        if name.is_empty() {
            return Err(AssembleError { line: line_no, message: "empty label name".to_string() });
        }
        return Ok(Some(Line::Label(name)));
    }
    match text.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => Ok(Some(Line::Instruction { mnemonic, operand_text: Some(rest.trim()) })),
        None => Ok(Some(Line::Instruction { mnemonic: text, operand_text: None })),
    }
}

fn resolve_opcode(mnemonic: &str, options: AssembleOptions) -> Option<Opcode> {
    if options.case_sensitive {
        // `from_mnemonic` itself upper-cases; emulate case-sensitivity by
        // requiring the source text already be upper-case.
        if mnemonic.chars().any(|c| c.is_ascii_lowercase()) {
            return None;
        }
    }
    Opcode::from_mnemonic(mnemonic)
}

fn parse_operand(line_no: usize, opcode: Opcode, text: Option<&str>, labels: &std::collections::HashMap<String, usize>, options: AssembleOptions) -> Result<Operand, AssembleError> {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        if opcode.has_operand() {
            return Err(AssembleError { line: line_no, message: format!("{} requires an operand", opcode.mnemonic()) });
        }
        return Ok(Operand::Absent);
    };
    if !opcode.has_operand() {
        if options.strict_mode {
            return Err(AssembleError { line: line_no, message: format!("{} takes no operand", opcode.mnemonic()) });
        }
        return Ok(Operand::Absent);
    }

    match opcode {
        Opcode::Jump | Opcode::JumpIfFalse => {
            if let Some(&addr) = labels.get(text) {
                return Ok(Operand::Int(addr as i64));
            }
            text.parse::<i64>().map(Operand::Int).map_err(|_| AssembleError {
                line: line_no,
                message: format!("'{}' is neither a known label nor an integer address", text),
            })
        }
        Opcode::Load | Opcode::Store | Opcode::Call => {
            let name = text.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(text);
            Ok(Operand::Str(name.to_string()))
        }
        Opcode::Push => parse_push_operand(line_no, text, options),
        _ => Ok(Operand::Absent),
    }
}

fn parse_push_operand(line_no: usize, text: &str, options: AssembleOptions) -> Result<Operand, AssembleError> {
    if let Some(inner) = text.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Ok(Operand::Str(inner.to_string()));
    }
    if text == "true" {
        return Ok(Operand::Bool(true));
    }
    if text == "false" {
        return Ok(Operand::Bool(false));
    }
    match text.parse::<f64>() {
        Ok(n) => Ok(Operand::Float(n)),
        Err(_) => {
            if options.strict_mode {
                Err(AssembleError { line: line_no, message: format!("'{}' is not a valid PUSH operand", text) })
            } else {
                Ok(Operand::Str(text.to_string()))
            }
        }
    }
}

/// First pass: walk the text counting instructions, recording each label's
/// resolved address (the index of the *next* instruction after it) so
/// forward references in `JUMP`/`JUMP_IF_FALSE` resolve in the second pass.
fn collect_labels(source: &str, options: AssembleOptions) -> Result<std::collections::HashMap<String, usize>, AssembleError> {
    let mut labels = std::collections::HashMap::new();
    let mut address = 0usize;
    for (i, raw) in source.lines().enumerate() {
        match classify(i + 1, raw)? {
            None => continue,
            Some(Line::Label(name)) => {
                if resolve_opcode(name, options).is_some() {
                    return Err(AssembleError { line: i + 1, message: format!("label '{}' conflicts with an opcode name", name) });
                }
                if labels.contains_key(name) {
                    return Err(AssembleError { line: i + 1, message: format!("duplicate label '{}'", name) });
                }
                labels.insert(name.to_string(), address);
            }
            Some(Line::Instruction { mnemonic, .. }) => {
                if resolve_opcode(mnemonic, options).is_none() {
                    return Err(AssembleError { line: i + 1, message: format!("unknown opcode '{}'", mnemonic) });
                }
                address += 1;
            }
        }
    }
    Ok(labels)
}

/// Assembles textual bytecode into a `Program`, given `AssembleOptions`.
pub fn assemble(source: &str, options: AssembleOptions) -> Result<Program, AssembleError> {
    let labels = collect_labels(source, options)?;
    let mut instructions = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let line_no = i + 1;
        match classify(line_no, raw)? {
            None | Some(Line::Label(_)) => continue,
            Some(Line::Instruction { mnemonic, operand_text }) => {
                let opcode = resolve_opcode(mnemonic, options).ok_or_else(|| AssembleError { line: line_no, message: format!("unknown opcode '{}'", mnemonic) })?;
                let operand = parse_operand(line_no, opcode, operand_text, &labels, options)?;
                instructions.push(Instruction::new(opcode, operand));
            }
        }
    }
    Ok(Program { instructions })
}

/// Disassembles a `Program` back to its textual form, one instruction per
/// line. Round-trips through `assemble` for any program that didn't rely on
/// named labels (addresses are rendered as bare integers, not reconstructed
/// label names — spec.md doesn't ask for label recovery, only that the
/// text form be re-assemblable).
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    for instr in &program.instructions {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_simple_program() {
        let source = "PUSH 5\nPUSH 3\nADD\nHALT\n";
        let program = assemble(source, AssembleOptions::default()).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(program.instructions[0].opcode, Opcode::Push);
        assert_eq!(program.instructions[0].operand, Operand::Float(5.0));
    }

    #[test]
    fn labels_resolve_to_instruction_addresses() {
        let source = "loop:\nPUSH 1\nJUMP loop\n";
        let program = assemble(source, AssembleOptions::default()).unwrap();
        assert_eq!(program.instructions[1].operand, Operand::Int(0));
    }

    #[test]
    fn forward_label_reference_resolves() {
        let source = "JUMP_IF_FALSE done\nPUSH 1\ndone:\nHALT\n";
        let program = assemble(source, AssembleOptions::default()).unwrap();
        assert_eq!(program.instructions[0].operand, Operand::Int(2));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let source = "; a comment\n\nPUSH 1 ; trailing comment\nHALT\n";
        let program = assemble(source, AssembleOptions::default()).unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn case_insensitive_by_default() {
        let program = assemble("push 1\nhalt\n", AssembleOptions::default()).unwrap();
        assert_eq!(program.instructions[0].opcode, Opcode::Push);
    }

    #[test]
    fn case_sensitive_mode_rejects_lowercase() {
        let options = AssembleOptions { case_sensitive: true, ..Default::default() };
        assert!(assemble("push 1\n", options).is_err());
        assert!(assemble("PUSH 1\n", options).is_ok());
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let err = assemble("NONSENSE\n", AssembleOptions::default()).unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn disassemble_round_trips_through_assemble() {
        let source = "PUSH 5\nPUSH 3\nADD\nHALT\n";
        let program = assemble(source, AssembleOptions::default()).unwrap();
        let text = disassemble(&program);
        let reassembled = assemble(&text, AssembleOptions::default()).unwrap();
        assert_eq!(program, reassembled);
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let source = "loop:\nPUSH 1\nloop:\nHALT\n";
        let err = assemble(source, AssembleOptions::default()).unwrap_err();
        assert!(err.message.contains("duplicate label"));
    }

    #[test]
    fn label_conflicting_with_an_opcode_name_is_an_error() {
        let source = "ADD:\nHALT\n";
        let err = assemble(source, AssembleOptions::default()).unwrap_err();
        assert!(err.message.contains("conflicts with an opcode name"));
    }

    #[test]
    fn undefined_label_is_an_error() {
        let source = "JUMP nowhere\nHALT\n";
        let err = assemble(source, AssembleOptions::default()).unwrap_err();
        assert!(err.message.contains("neither a known label"));
    }

    #[test]
    fn strict_mode_rejects_operand_on_an_operandless_opcode() {
        let options = AssembleOptions { strict_mode: true, ..Default::default() };
        assert!(assemble("HALT 1\n", options).is_err());
    }
}
