//! Assembly source line parser for labels, instructions, and directives.
//!
//! Each line is parsed on its own into a [`ParsedLine`]: an optional label
//! definition followed by an optional instruction or directive. Operand
//! kinds are checked against the core's opcode table here; label values are
//! left symbolic until pass 2.

use thiserror::Error;
use vm64_core::{OpcodeInfo, OperandKind, Register, Width};

use crate::mnemonic::{resolve_mnemonic, resolve_register, usage};

/// A numeric operand or datum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Literal value; negative literals are stored two's-complement.
    Literal(u64),
    /// Label reference, resolved to its absolute address in pass 2.
    Label(String),
}

/// A parsed instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Register selector.
    Register(Register),
    /// Immediate or address.
    Value(Value),
}

/// A parsed instruction with operands matching its opcode's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// Opcode table row for the mnemonic.
    pub info: &'static OpcodeInfo,
    /// Operands in stream order.
    pub operands: Vec<Operand>,
}

/// A parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `.org addr` - move the output position forward to `addr`.
    Org(u64),
    /// `.byte`, `.word`, `.dword`, `.qword` - emit little-endian data.
    Data {
        /// Width of each value.
        width: Width,
        /// Values in output order.
        values: Vec<Value>,
    },
}

/// The instruction or directive part of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Machine instruction.
    Instruction(ParsedInstruction),
    /// Assembler directive.
    Directive(Directive),
}

impl Statement {
    /// Bytes this statement emits.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Instruction(instruction) => instruction.info.encoded_len(),
            Self::Directive(Directive::Org(_)) => 0,
            Self::Directive(Directive::Data { width, values }) => {
                u64::from(width.bytes()) * values.len() as u64
            }
        }
    }
}

/// A single parsed source line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLine {
    /// Label defined at the start of the line.
    pub label: Option<String>,
    /// Instruction or directive following the label.
    pub statement: Option<Statement>,
}

/// Parse error with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    /// What went wrong.
    pub kind: ParseErrorKind,
}

/// Classification of parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Mnemonic not in the opcode table.
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),
    /// Directive name not recognised.
    #[error("unknown directive: .{0}")]
    UnknownDirective(String),
    /// Malformed or reserved label name.
    #[error("invalid label: {0}")]
    InvalidLabel(String),
    /// Malformed literal or operand.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// A register operand was expected.
    #[error("expected a register, found `{0}`")]
    ExpectedRegister(String),
    /// A register name appeared where a value was expected.
    #[error("expected a value, found register `{0}`")]
    UnexpectedRegister(String),
    /// Operand count does not match the opcode's shape.
    #[error("wrong number of operands, expected `{0}`")]
    OperandCount(String),
    /// Data directive without values.
    #[error("directive .{0} needs at least one value")]
    MissingValue(String),
}

/// Parses one source line. `line` is the 1-based line number used in errors.
///
/// # Errors
///
/// Returns a [`ParseError`] for malformed labels, unknown mnemonics or
/// directives, and operands that do not fit the opcode's shape.
pub fn parse_line(text: &str, line: usize) -> Result<ParsedLine, ParseError> {
    let fail = |kind| ParseError { line, kind };
    let mut rest = strip_comment(text).trim();
    let mut parsed = ParsedLine::default();

    if let Some((label, after)) = rest.split_once(':') {
        let label = label.trim();
        if !is_valid_label(label) {
            return Err(fail(ParseErrorKind::InvalidLabel(label.to_owned())));
        }
        parsed.label = Some(label.to_owned());
        rest = after.trim();
    }

    if rest.is_empty() {
        return Ok(parsed);
    }

    let statement = match rest.strip_prefix('.') {
        Some(directive) => parse_directive(directive).map(Statement::Directive),
        None => parse_instruction(rest).map(Statement::Instruction),
    };
    parsed.statement = Some(statement.map_err(fail)?);
    Ok(parsed)
}

fn strip_comment(line: &str) -> &str {
    line.find(';').map_or(line, |pos| &line[..pos])
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_label(s: &str) -> bool {
    is_identifier(s) && resolve_register(s).is_none()
}

fn split_head(text: &str) -> (&str, &str) {
    text.find(char::is_whitespace)
        .map_or((text, ""), |pos| (&text[..pos], text[pos..].trim()))
}

fn split_operands(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split(',').map(str::trim).collect()
    }
}

fn parse_directive(text: &str) -> Result<Directive, ParseErrorKind> {
    let (name, args) = split_head(text);
    let lower = name.to_ascii_lowercase();

    let width = match lower.as_str() {
        "org" => {
            return parse_literal(args)
                .map(Directive::Org)
                .ok_or_else(|| ParseErrorKind::InvalidValue(args.to_owned()));
        }
        "byte" => Width::Byte,
        "word" => Width::Word,
        "dword" => Width::Dword,
        "qword" => Width::Qword,
        _ => return Err(ParseErrorKind::UnknownDirective(name.to_owned())),
    };

    let tokens = split_operands(args);
    if tokens.is_empty() {
        return Err(ParseErrorKind::MissingValue(lower));
    }
    let values = tokens
        .into_iter()
        .map(parse_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Directive::Data { width, values })
}

fn parse_instruction(text: &str) -> Result<ParsedInstruction, ParseErrorKind> {
    let (mnemonic, args) = split_head(text);
    let info =
        resolve_mnemonic(mnemonic).ok_or_else(|| ParseErrorKind::UnknownMnemonic(mnemonic.to_owned()))?;

    let tokens = split_operands(args);
    let kinds = info.shape.operands();
    if tokens.len() != kinds.len() {
        return Err(ParseErrorKind::OperandCount(usage(info)));
    }

    let operands = tokens
        .into_iter()
        .zip(kinds)
        .map(|(token, kind)| parse_operand(token, *kind))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParsedInstruction { info, operands })
}

fn parse_operand(token: &str, kind: OperandKind) -> Result<Operand, ParseErrorKind> {
    if kind == OperandKind::Register {
        resolve_register(token)
            .map(Operand::Register)
            .ok_or_else(|| ParseErrorKind::ExpectedRegister(token.to_owned()))
    } else {
        parse_value(token).map(Operand::Value)
    }
}

fn parse_value(token: &str) -> Result<Value, ParseErrorKind> {
    if let Some(value) = parse_literal(token) {
        return Ok(Value::Literal(value));
    }
    if resolve_register(token).is_some() {
        return Err(ParseErrorKind::UnexpectedRegister(token.to_owned()));
    }
    if is_identifier(token) {
        return Ok(Value::Label(token.to_owned()));
    }
    Err(ParseErrorKind::InvalidValue(token.to_owned()))
}

/// Parses a decimal, `0x` hex or `0b` binary literal with an optional
/// leading `-` and `_` digit separators.
#[must_use]
pub fn parse_literal(token: &str) -> Option<u64> {
    let (negative, body) = token
        .strip_prefix('-')
        .map_or((false, token), |body| (true, body));
    let digits: String = body.chars().filter(|c| *c != '_').collect();

    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        (2, bin)
    } else {
        (10, digits.as_str())
    };

    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_hexdigit()) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    Some(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

#[cfg(test)]
mod tests {
    use vm64_core::{Opcode, Register, Width};

    use super::{
        parse_line, parse_literal, Directive, Operand, ParseError, ParseErrorKind, ParsedLine,
        Statement, Value,
    };

    fn instruction(line: &str) -> (Opcode, Vec<Operand>) {
        match parse_line(line, 1).unwrap().statement {
            Some(Statement::Instruction(instruction)) => {
                (instruction.info.opcode, instruction.operands)
            }
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    fn error(line: &str) -> ParseErrorKind {
        parse_line(line, 7).unwrap_err().kind
    }

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(parse_line("", 1).unwrap(), ParsedLine::default());
        assert_eq!(parse_line("   ; just a note", 1).unwrap(), ParsedLine::default());
    }

    #[test]
    fn label_alone_and_with_statement() {
        let alone = parse_line("loop:", 1).unwrap();
        assert_eq!(alone.label.as_deref(), Some("loop"));
        assert!(alone.statement.is_none());

        let with = parse_line("start: HLT ; stop", 1).unwrap();
        assert_eq!(with.label.as_deref(), Some("start"));
        assert!(matches!(with.statement, Some(Statement::Instruction(_))));
    }

    #[test]
    fn register_names_are_not_labels() {
        assert_eq!(error("r1: NOP"), ParseErrorKind::InvalidLabel("r1".into()));
        assert_eq!(error("1st: NOP"), ParseErrorKind::InvalidLabel("1st".into()));
    }

    #[test]
    fn operands_follow_the_opcode_shape() {
        assert_eq!(
            instruction("ldi r1, 0x10"),
            (
                Opcode::Ldi,
                vec![
                    Operand::Register(Register::R1),
                    Operand::Value(Value::Literal(0x10))
                ]
            )
        );
        assert_eq!(
            instruction("ADD ACC,R8"),
            (
                Opcode::Add,
                vec![Operand::Register(Register::Acc), Operand::Register(Register::R8)]
            )
        );
        assert_eq!(
            instruction("JMP target"),
            (Opcode::Jmp, vec![Operand::Value(Value::Label("target".into()))])
        );
    }

    #[test]
    fn operand_errors() {
        assert_eq!(error("FOO R1"), ParseErrorKind::UnknownMnemonic("FOO".into()));
        assert_eq!(
            error("LDI R1"),
            ParseErrorKind::OperandCount("LDI reg, imm64".into())
        );
        assert_eq!(error("LDI 5, 5"), ParseErrorKind::ExpectedRegister("5".into()));
        assert_eq!(error("JMP SP"), ParseErrorKind::UnexpectedRegister("SP".into()));
        assert_eq!(error("JMP 12zz"), ParseErrorKind::InvalidValue("12zz".into()));
    }

    #[test]
    fn errors_carry_the_line_number() {
        assert_eq!(
            parse_line(".bogus", 42),
            Err(ParseError {
                line: 42,
                kind: ParseErrorKind::UnknownDirective("bogus".into())
            })
        );
    }

    #[test]
    fn directives() {
        assert_eq!(
            parse_line(".org 0x8000", 1).unwrap().statement,
            Some(Statement::Directive(Directive::Org(0x8000)))
        );
        assert_eq!(
            parse_line(".WORD 1, end", 1).unwrap().statement,
            Some(Statement::Directive(Directive::Data {
                width: Width::Word,
                values: vec![Value::Literal(1), Value::Label("end".into())],
            }))
        );
        assert_eq!(error(".qword"), ParseErrorKind::MissingValue("qword".into()));
        assert_eq!(error(".org start"), ParseErrorKind::InvalidValue("start".into()));
    }

    #[test]
    fn statement_sizes() {
        let size = |line: &str| parse_line(line, 1).unwrap().statement.unwrap().size();
        assert_eq!(size("HLT"), 2);
        assert_eq!(size("LDI R1, 1"), 11);
        assert_eq!(size("LDBI R1, 1"), 4);
        assert_eq!(size(".dword 1, 2, 3"), 12);
        assert_eq!(size(".org 0x100"), 0);
    }

    #[test]
    fn literal_forms() {
        assert_eq!(parse_literal("42"), Some(42));
        assert_eq!(parse_literal("0xFF"), Some(0xff));
        assert_eq!(parse_literal("0b1010"), Some(10));
        assert_eq!(parse_literal("1_000"), Some(1000));
        assert_eq!(parse_literal("-1"), Some(u64::MAX));
        assert_eq!(parse_literal("0x"), None);
        assert_eq!(parse_literal("label"), None);
        assert_eq!(parse_literal("99999999999999999999"), None);
    }
}
