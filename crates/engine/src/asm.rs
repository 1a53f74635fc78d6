//! Textual form of programs.
//!
//! Each line holds one instruction, `MNEMONIC [operand]`. Operands are quoted
//! strings (`\"`, `\\`, `\n`, `\t` escapes), integers, `null`/`true`/`false`
//! values, mode names for `MODE`, `&name` output nodes and `@name` result
//! slots. Named operands are resolved through [`Bindings`].

use crate::error::FieldSearchError;
use crate::instruction::{Instruction, Opcode, Operand, ResultSlot, SearchMode};
use crate::program::Program;
use fieldsearch_core::FieldValue;
use fieldsearch_dom::{Document, NodeRef};
use pest::Parser;
use pest::error::{Error as PestError, LineColLocation};
use pest::iterators::Pair;
use std::collections::HashMap;
use thiserror::Error;

#[derive(pest_derive::Parser)]
#[grammar = "asm.pest"]
struct AsmParser;

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax { line: usize, column: usize, message: String },
    #[error("line {line}: unknown instruction '{name}'")]
    UnknownMnemonic { line: usize, name: String },
    #[error("line {line}: unexpected operand '{word}'")]
    UnknownWord { line: usize, word: String },
    #[error("line {line}: integer '{text}' does not fit in 64 bits")]
    IntegerRange { line: usize, text: String },
    #[error("line {line}: no output node bound to '&{name}'")]
    UnboundNode { line: usize, name: String },
    #[error("line {line}: no result slot bound to '@{name}'")]
    UnboundResult { line: usize, name: String },
    #[error("line {line}: {source}")]
    Instruction { line: usize, source: FieldSearchError },
}

impl From<PestError<Rule>> for AsmError {
    fn from(error: PestError<Rule>) -> Self {
        let (line, column) = match error.line_col {
            LineColLocation::Pos(position) | LineColLocation::Span(position, _) => position,
        };
        AsmError::Syntax { line, column, message: error.variant.message().into_owned() }
    }
}

/// Output nodes and result slots that `&name` / `@name` operands refer to.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    nodes: HashMap<String, NodeRef>,
    results: HashMap<String, ResultSlot>,
    placeholders: bool,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds every name that was not bound explicitly to a fresh detached
    /// node or slot. Useful for syntax checks.
    pub fn placeholders() -> Self {
        Self { placeholders: true, ..Self::default() }
    }

    pub fn with_node(mut self, name: impl Into<String>, node: NodeRef) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    pub fn with_result(mut self, name: impl Into<String>, slot: ResultSlot) -> Self {
        self.results.insert(name.into(), slot);
        self
    }

    pub fn node(&self, name: &str) -> Option<NodeRef> {
        self.nodes
            .get(name)
            .cloned()
            .or_else(|| self.placeholders.then(|| Document::new().root()))
    }

    pub fn result(&self, name: &str) -> Option<ResultSlot> {
        self.results.get(name).cloned().or_else(|| self.placeholders.then(ResultSlot::new))
    }
}

/// Parses `source` into a validated [`Program`].
pub fn assemble(source: &str, bindings: &Bindings) -> Result<Program, AsmError> {
    let mut program = Program::new();
    let Some(root) = AsmParser::parse(Rule::program, source)?.next() else {
        return Ok(program);
    };
    for line in root.into_inner().filter(|pair| pair.as_rule() == Rule::line) {
        program.push(assemble_line(line, bindings)?);
    }
    tracing::debug!(instructions = program.len(), "program assembled");
    Ok(program)
}

fn assemble_line(pair: Pair<'_, Rule>, bindings: &Bindings) -> Result<Instruction, AsmError> {
    let (line, _) = pair.line_col();
    let mut inner = pair.into_inner();
    let name = inner.next().map(|mnemonic| mnemonic.as_str()).unwrap_or_default();
    let opcode = Opcode::from_mnemonic(name)
        .ok_or_else(|| AsmError::UnknownMnemonic { line, name: name.to_owned() })?;
    let operand = match inner.next() {
        Some(operand) => assemble_operand(opcode, &operand, bindings, line)?,
        None => Operand::None,
    };
    Instruction::new(opcode, operand).map_err(|source| AsmError::Instruction { line, source })
}

fn assemble_operand(
    opcode: Opcode,
    pair: &Pair<'_, Rule>,
    bindings: &Bindings,
    line: usize,
) -> Result<Operand, AsmError> {
    // `&name`, `@name` and strings keep their payload in the first inner pair
    let payload = pair.clone().into_inner().next().map_or("", |inner| inner.as_str());
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::string => Ok(Operand::String(unescape(payload))),
        Rule::integer => text
            .parse()
            .map(Operand::Int64)
            .map_err(|_| AsmError::IntegerRange { line, text: text.to_owned() }),
        Rule::node_ref => bindings
            .node(payload)
            .map(Operand::Node)
            .ok_or_else(|| AsmError::UnboundNode { line, name: payload.to_owned() }),
        Rule::result_ref => bindings
            .result(payload)
            .map(Operand::Result)
            .ok_or_else(|| AsmError::UnboundResult { line, name: payload.to_owned() }),
        _ => match text.to_ascii_lowercase().as_str() {
            "null" => Ok(Operand::Value(FieldValue::Null)),
            "true" => Ok(Operand::Value(FieldValue::Bool(true))),
            "false" => Ok(Operand::Value(FieldValue::Bool(false))),
            _ => SearchMode::from_name(text)
                .filter(|_| opcode == Opcode::Mode)
                .map(Operand::from)
                .ok_or_else(|| AsmError::UnknownWord { line, word: text.to_owned() }),
        },
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
