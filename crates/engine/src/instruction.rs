use crate::error::FieldSearchError;
use fieldsearch_core::FieldValue;
use fieldsearch_dom::NodeRef;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operation codes understood by the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // state
    Reset,
    Mode,
    FieldName,
    FieldNameWithVars,
    LastResultToVar,

    // store probing
    SelfNode,
    Path,
    Children,
    Parents,
    Link,
    DefaultValue,
    DefaultValueOrNull,

    // output cursor
    Element,
    ChildElement,
    ParentElement,
    ElementAttr,

    // results
    Result,
    Save,
    SaveInt64,
    SaveInt64Date,
    SaveXml,

    // control flow
    Label,
    Goto,
    IfFound,
    IfNotFound,
    Warning,
}

impl Opcode {
    pub const ALL: [Opcode; 26] = [
        Opcode::Reset,
        Opcode::Mode,
        Opcode::FieldName,
        Opcode::FieldNameWithVars,
        Opcode::LastResultToVar,
        Opcode::SelfNode,
        Opcode::Path,
        Opcode::Children,
        Opcode::Parents,
        Opcode::Link,
        Opcode::DefaultValue,
        Opcode::DefaultValueOrNull,
        Opcode::Element,
        Opcode::ChildElement,
        Opcode::ParentElement,
        Opcode::ElementAttr,
        Opcode::Result,
        Opcode::Save,
        Opcode::SaveInt64,
        Opcode::SaveInt64Date,
        Opcode::SaveXml,
        Opcode::Label,
        Opcode::Goto,
        Opcode::IfFound,
        Opcode::IfNotFound,
        Opcode::Warning,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Reset => "RESET",
            Opcode::Mode => "MODE",
            Opcode::FieldName => "FIELD_NAME",
            Opcode::FieldNameWithVars => "FIELD_NAME_WITH_VARS",
            Opcode::LastResultToVar => "LAST_RESULT_TO_VAR",
            Opcode::SelfNode => "SELF",
            Opcode::Path => "PATH",
            Opcode::Children => "CHILDREN",
            Opcode::Parents => "PARENTS",
            Opcode::Link => "LINK",
            Opcode::DefaultValue => "DEFAULT_VALUE",
            Opcode::DefaultValueOrNull => "DEFAULT_VALUE_OR_NULL",
            Opcode::Element => "ELEMENT",
            Opcode::ChildElement => "CHILD_ELEMENT",
            Opcode::ParentElement => "PARENT_ELEMENT",
            Opcode::ElementAttr => "ELEMENT_ATTR",
            Opcode::Result => "RESULT",
            Opcode::Save => "SAVE",
            Opcode::SaveInt64 => "SAVE_INT64",
            Opcode::SaveInt64Date => "SAVE_INT64_DATE",
            Opcode::SaveXml => "SAVE_XML",
            Opcode::Label => "LABEL",
            Opcode::Goto => "GOTO",
            Opcode::IfFound => "IF_FOUND",
            Opcode::IfNotFound => "IF_NOT_FOUND",
            Opcode::Warning => "WARNING",
        }
    }

    /// Case-insensitive lookup by mnemonic.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// The operand whitelist. Every other combination is a `TypeMismatch`.
    pub fn accepts(self, kind: OperandKind) -> bool {
        use OperandKind as K;
        match self {
            Opcode::Reset => matches!(kind, K::None | K::Int64),
            Opcode::SelfNode | Opcode::ParentElement => kind == K::None,
            Opcode::Mode
            | Opcode::Children
            | Opcode::Label
            | Opcode::Goto
            | Opcode::IfFound
            | Opcode::IfNotFound => kind == K::Int64,
            Opcode::FieldName
            | Opcode::FieldNameWithVars
            | Opcode::LastResultToVar
            | Opcode::Path
            | Opcode::Parents
            | Opcode::Link
            | Opcode::ChildElement
            | Opcode::ElementAttr
            | Opcode::Save
            | Opcode::SaveInt64
            | Opcode::SaveInt64Date
            | Opcode::SaveXml
            | Opcode::Warning => kind == K::String,
            Opcode::DefaultValue | Opcode::DefaultValueOrNull => {
                matches!(kind, K::String | K::Int64 | K::Value)
            }
            Opcode::Element => kind == K::Node,
            Opcode::Result => kind == K::Result,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// How matches are collected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Stop the program as soon as the result is non-empty.
    #[default]
    First,
    /// Run every instruction.
    Each,
    /// Like `Each`, but collect the matching paths instead of values.
    Paths,
}

impl SearchMode {
    pub fn code(self) -> i64 {
        match self {
            SearchMode::First => 0,
            SearchMode::Each => 1,
            SearchMode::Paths => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SearchMode::First => "FIRST",
            SearchMode::Each => "EACH",
            SearchMode::Paths => "PATHS",
        }
    }

    pub fn from_name(name: &str) -> Option<SearchMode> {
        [SearchMode::First, SearchMode::Each, SearchMode::Paths]
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<i64> for SearchMode {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SearchMode::First),
            1 => Ok(SearchMode::Each),
            2 => Ok(SearchMode::Paths),
            other => Err(other),
        }
    }
}

impl From<SearchMode> for i64 {
    fn from(mode: SearchMode) -> Self {
        mode.code()
    }
}

/// Caller-owned destination filled by the `RESULT` opcode.
///
/// Clones share the same storage, so a slot embedded in a program can be read
/// by whoever built it after the run.
#[derive(Clone, Debug, Default)]
pub struct ResultSlot(Arc<Mutex<Vec<FieldValue>>>);

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current content.
    pub fn values(&self) -> Vec<FieldValue> {
        self.lock().clone()
    }

    pub fn replace(&self, values: Vec<FieldValue>) {
        *self.lock() = values;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FieldValue>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for ResultSlot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperandKind {
    None,
    String,
    Int64,
    Value,
    Node,
    Result,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandKind::None => "no",
            OperandKind::String => "string",
            OperandKind::Int64 => "int64",
            OperandKind::Value => "value",
            OperandKind::Node => "node",
            OperandKind::Result => "result",
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Operand {
    #[default]
    None,
    String(String),
    Int64(i64),
    Value(FieldValue),
    Node(NodeRef),
    Result(ResultSlot),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::None => OperandKind::None,
            Operand::String(_) => OperandKind::String,
            Operand::Int64(_) => OperandKind::Int64,
            Operand::Value(_) => OperandKind::Value,
            Operand::Node(_) => OperandKind::Node,
            Operand::Result(_) => OperandKind::Result,
        }
    }
}

impl From<()> for Operand {
    fn from((): ()) -> Self {
        Operand::None
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::String(value.to_owned())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::String(value)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Int64(value)
    }
}

impl From<SearchMode> for Operand {
    fn from(mode: SearchMode) -> Self {
        Operand::Int64(mode.code())
    }
}

impl From<FieldValue> for Operand {
    fn from(value: FieldValue) -> Self {
        Operand::Value(value)
    }
}

impl From<NodeRef> for Operand {
    fn from(node: NodeRef) -> Self {
        Operand::Node(node)
    }
}

impl From<ResultSlot> for Operand {
    fn from(slot: ResultSlot) -> Self {
        Operand::Result(slot)
    }
}

/// One validated opcode + operand pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    opcode: Opcode,
    operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: impl Into<Operand>) -> Result<Self, FieldSearchError> {
        let operand = operand.into();
        if !opcode.accepts(operand.kind()) {
            return Err(FieldSearchError::TypeMismatch {
                opcode,
                operand: format!("{} operand", operand.kind()),
            });
        }
        if let (Opcode::Mode, Operand::Int64(code)) = (opcode, &operand)
            && SearchMode::try_from(*code).is_err()
        {
            return Err(FieldSearchError::TypeMismatch {
                opcode,
                operand: format!("mode {code} (expected 0, 1 or 2)"),
            });
        }
        Ok(Self { opcode, operand })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub(crate) fn string(&self) -> &str {
        match &self.operand {
            Operand::String(value) => value,
            _ => "",
        }
    }

    pub(crate) fn int64(&self) -> i64 {
        match self.operand {
            Operand::Int64(value) => value,
            _ => 0,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        match (&self.operand, self.opcode) {
            (Operand::None, _) => Ok(()),
            (Operand::Int64(code), Opcode::Mode) => match SearchMode::try_from(*code) {
                Ok(mode) => write!(f, " {}", mode.name()),
                Err(code) => write!(f, " {code}"),
            },
            (Operand::Int64(value), _) => write!(f, " {value}"),
            (Operand::String(text), _) => write!(f, " {}", quote(text)),
            (Operand::Value(FieldValue::Null), _) => f.write_str(" null"),
            (Operand::Value(FieldValue::Bool(value)), _) => write!(f, " {value}"),
            (Operand::Value(FieldValue::Integer(value)), _) => write!(f, " {value}"),
            (Operand::Value(FieldValue::String(text)), _) => write!(f, " {}", quote(text)),
            (Operand::Node(node), _) => write!(f, " &node{}", node.id().index()),
            (Operand::Result(_), _) => f.write_str(" @result"),
        }
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
