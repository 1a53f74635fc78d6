use crate::date::{DateFormatter, UtcDateFormatter};
use crate::error::FieldSearchError;
use crate::instruction::{Instruction, Opcode, Operand, SearchMode};
use crate::limits::ExecutionLimits;
use crate::program::Program;
use fieldsearch_core::{ContentStore, FieldValue, LinkStore, SitePrefix};
use fieldsearch_dom::{MarkupError, NodeRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Parses a markup string into children of an output node.
pub trait MarkupImporter: Send + Sync {
    fn import_fragment(&self, parent: &NodeRef, markup: &str) -> Result<(), MarkupError>;
}

/// Imports through [`NodeRef::import_markup`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DomMarkupImporter;

impl MarkupImporter for DomMarkupImporter {
    fn import_fragment(&self, parent: &NodeRef, markup: &str) -> Result<(), MarkupError> {
        parent.import_markup(markup)
    }
}

/// A diagnostic raised while a program ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub path: String,
    pub field: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (path: \"{}\" and field name: \"{}\")", self.message, self.path, self.field)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOutcome {
    /// `result` as it stood when the program stopped.
    pub result: Vec<FieldValue>,
    pub warnings: Vec<Warning>,
    /// Number of instructions executed.
    pub steps: usize,
}

/// Executes [`Program`]s against a content and a link store.
///
/// The interpreter holds no per-run state; one instance can serve concurrent
/// runs as long as they write to different output documents.
#[derive(Clone)]
pub struct Interpreter {
    content: Arc<dyn ContentStore>,
    links: Arc<dyn LinkStore>,
    limits: ExecutionLimits,
    dates: Arc<dyn DateFormatter>,
    markup: Arc<dyn MarkupImporter>,
}

impl Interpreter {
    pub fn new(content: Arc<dyn ContentStore>, links: Arc<dyn LinkStore>) -> Self {
        Self {
            content,
            links,
            limits: ExecutionLimits::default(),
            dates: Arc::new(UtcDateFormatter::default()),
            markup: Arc::new(DomMarkupImporter),
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_date_formatter(mut self, formatter: Arc<dyn DateFormatter>) -> Self {
        self.dates = formatter;
        self
    }

    pub fn with_markup_importer(mut self, importer: Arc<dyn MarkupImporter>) -> Self {
        self.markup = importer;
        self
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Runs `program` to completion, or until a `FIRST` mode search produced a
    /// result.
    ///
    /// `cursor` is the initial output node; `ELEMENT` can replace it. Output
    /// written before an error stays in the document.
    pub fn run(
        &self,
        program: &Program,
        site: &SitePrefix,
        cursor: Option<NodeRef>,
    ) -> Result<RunOutcome, FieldSearchError> {
        tracing::debug!(site = %site, instructions = program.len(), "field search started");
        let mut context = ExecutionContext::new(self, site, cursor);
        let instructions = program.instructions();
        let mut steps = 0;
        let mut pc = 0;

        while let Some(instruction) = instructions.get(pc) {
            if steps >= self.limits.max_steps {
                tracing::debug!(site = %site, steps, pc, "field search diverged");
                return Err(FieldSearchError::ProgramDivergence { limit: self.limits.max_steps });
            }
            steps += 1;
            tracing::trace!(pc, %instruction, "dispatch");

            pc = match context.execute(instruction)? {
                Flow::Next => pc + 1,
                Flow::Jump(label) => program.resolve_label(label, pc)? + 1,
            };

            if context.stop_searching() {
                break;
            }
        }

        tracing::debug!(site = %site, steps, results = context.result.len(), "field search finished");
        Ok(RunOutcome { result: context.result, warnings: context.warnings, steps })
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter").field("limits", &self.limits).finish_non_exhaustive()
    }
}

enum Flow {
    Next,
    Jump(i64),
}

/// Mutable state of a single run.
pub(crate) struct ExecutionContext<'a> {
    pub(crate) interpreter: &'a Interpreter,
    pub(crate) site: &'a SitePrefix,
    pub(crate) mode: SearchMode,
    pub(crate) field_name: String,
    pub(crate) self_path: String,
    pub(crate) found: bool,
    pub(crate) result: Vec<FieldValue>,
    pub(crate) cursor: Option<NodeRef>,
    pub(crate) saved: bool,
    pub(crate) variables: HashMap<String, String>,
    pub(crate) warnings: Vec<Warning>,
}

impl<'a> ExecutionContext<'a> {
    fn new(interpreter: &'a Interpreter, site: &'a SitePrefix, cursor: Option<NodeRef>) -> Self {
        Self {
            interpreter,
            site,
            mode: SearchMode::default(),
            field_name: String::new(),
            self_path: String::new(),
            found: false,
            result: Vec::new(),
            cursor,
            saved: false,
            variables: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<Flow, FieldSearchError> {
        let opcode = instruction.opcode();
        match opcode {
            Opcode::Reset => self.reset(instruction.int64() != 0),
            Opcode::Mode => {
                self.mode = SearchMode::try_from(instruction.int64()).map_err(|code| {
                    FieldSearchError::TypeMismatch { opcode, operand: format!("mode {code}") }
                })?;
            }
            Opcode::FieldName => {
                let name = instruction.string();
                if name.is_empty() {
                    return Err(FieldSearchError::sequence("FIELD_NAME cannot be set to an empty string"));
                }
                self.field_name = name.to_owned();
            }
            Opcode::FieldNameWithVars => {
                let template = instruction.string();
                if template.is_empty() {
                    return Err(FieldSearchError::sequence(
                        "FIELD_NAME_WITH_VARS cannot be set to an empty string",
                    ));
                }
                self.field_name = expand_variables(template, &self.variables)?;
            }
            Opcode::LastResultToVar => {
                let name = instruction.string();
                let value = self.result.pop().ok_or_else(|| {
                    FieldSearchError::sequence(format!("no result to save in variable \"{name}\""))
                })?;
                self.variables.insert(name.to_owned(), value.as_text());
            }
            Opcode::SelfNode => {
                self.require_field_name(opcode)?;
                // a LINK without destination leaves no current node
                if !self.self_path.is_empty() {
                    let path = self.self_path.clone();
                    self.probe(&path)?;
                }
            }
            Opcode::Path => {
                let path = self.site.absolute(instruction.string());
                self.enter(path)?;
            }
            Opcode::Children => self.children(instruction.int64())?,
            Opcode::Parents => self.parents(instruction.string())?,
            Opcode::Link => self.link(instruction.string())?,
            Opcode::DefaultValue | Opcode::DefaultValueOrNull => {
                let value = match instruction.operand() {
                    Operand::Value(value) => value.clone(),
                    Operand::Int64(value) => FieldValue::Integer(*value),
                    Operand::String(value) => FieldValue::String(value.clone()),
                    _ => FieldValue::Null,
                };
                if !value.is_null() || opcode == Opcode::DefaultValueOrNull {
                    self.result.push(value);
                }
            }
            Opcode::Element => {
                if let Operand::Node(node) = instruction.operand() {
                    self.cursor = Some(node.clone());
                }
            }
            Opcode::ChildElement => {
                if let Some(cursor) = self.cursor.clone() {
                    let name = instruction.string();
                    if name.is_empty() {
                        self.push_warning("CHILD_ELEMENT ignored: empty element name");
                    } else {
                        self.cursor = Some(cursor.append_element(name));
                    }
                }
            }
            Opcode::ParentElement => {
                if let Some(cursor) = &self.cursor {
                    // the document node is not an element
                    self.cursor = cursor.parent().filter(NodeRef::is_element);
                }
            }
            Opcode::ElementAttr => {
                if let Some(cursor) = self.cursor.clone() {
                    let attr = instruction.string();
                    let (key, value) = attr.split_once('=').unwrap_or((attr, attr));
                    if key.is_empty() {
                        let message = format!("ELEMENT_ATTR \"{attr}\" ignored: empty attribute name");
                        self.push_warning(&message);
                    } else {
                        cursor.set_attribute(key, value);
                    }
                }
            }
            Opcode::Result => {
                if let Operand::Result(slot) = instruction.operand() {
                    slot.replace(self.result.clone());
                }
            }
            Opcode::Save | Opcode::SaveInt64 | Opcode::SaveInt64Date | Opcode::SaveXml => {
                self.save(opcode, instruction.string())?;
            }
            Opcode::Label => {}
            Opcode::Goto => return Ok(Flow::Jump(instruction.int64())),
            Opcode::IfFound if !self.result.is_empty() => return Ok(Flow::Jump(instruction.int64())),
            Opcode::IfNotFound if self.result.is_empty() => {
                return Ok(Flow::Jump(instruction.int64()));
            }
            Opcode::IfFound | Opcode::IfNotFound => {}
            Opcode::Warning => self.warning(instruction.string()),
        }
        Ok(Flow::Next)
    }

    pub(crate) fn reset(&mut self, status: bool) {
        self.saved = status;
        self.result.clear();
    }

    pub(crate) fn require_field_name(&self, opcode: Opcode) -> Result<(), FieldSearchError> {
        if self.field_name.is_empty() {
            return Err(FieldSearchError::sequence(format!(
                "{opcode} cannot be used before FIELD_NAME"
            )));
        }
        Ok(())
    }

    /// Makes `path` the current node and probes it.
    ///
    /// For a `::*` wildcard path only the node owning the wildcard is checked.
    pub(crate) fn enter(&mut self, path: String) -> Result<(), FieldSearchError> {
        self.self_path = path;
        self.found = match wildcard_base(&self.self_path) {
            Some((base, _)) => self.interpreter.content.exists(base)?,
            None => self.interpreter.content.exists(&self.self_path)?,
        };
        if !self.field_name.is_empty() && wildcard_base(&self.self_path).is_none() {
            let path = self.self_path.clone();
            self.probe(&path)?;
        }
        Ok(())
    }

    /// Looks `field_name` up on `path`, appending the value (or the path in
    /// `PATHS` mode) when present.
    pub(crate) fn probe(&mut self, path: &str) -> Result<bool, FieldSearchError> {
        let Some(value) = self.interpreter.content.get_field(path, &self.field_name)? else {
            return Ok(false);
        };
        self.found = true;
        self.result.push(match self.mode {
            SearchMode::Paths => FieldValue::String(path.to_owned()),
            SearchMode::First | SearchMode::Each => value,
        });
        Ok(true)
    }

    pub(crate) fn stop_searching(&self) -> bool {
        self.mode == SearchMode::First && !self.result.is_empty()
    }

    pub(crate) fn links(&self) -> &dyn LinkStore {
        self.interpreter.links.as_ref()
    }

    pub(crate) fn dates(&self) -> &dyn DateFormatter {
        self.interpreter.dates.as_ref()
    }

    pub(crate) fn markup(&self) -> &dyn MarkupImporter {
        self.interpreter.markup.as_ref()
    }

    pub(crate) fn push_warning(&mut self, message: &str) {
        tracing::warn!(path = %self.self_path, field = %self.field_name, "{message}");
        self.warnings.push(Warning {
            message: message.to_owned(),
            path: self.self_path.clone(),
            field: self.field_name.clone(),
        });
    }

    fn warning(&mut self, message: &str) {
        // leaves `saved` alone; only RESET and the SAVE opcodes change it
        if !self.saved {
            self.push_warning(message);
        }
    }
}

/// Splits `…/stem::*` into the owning node and the child key stem (`…/stem::`).
pub(crate) fn wildcard_base(path: &str) -> Option<(&str, &str)> {
    if !path.ends_with("::*") {
        return None;
    }
    let slash = path.rfind('/')?;
    Some((&path[..slash], &path[..path.len() - 1]))
}

fn expand_variables(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, FieldSearchError> {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(dollar) = rest.find('$') {
        expanded.push_str(&rest[..dollar]);
        let Some(body) = rest[dollar + 1..].strip_prefix('{') else {
            return Err(FieldSearchError::sequence(format!(
                "variable in field name \"{template}\" must be enclosed in {{ and }}"
            )));
        };
        let Some(end) = body.find('}') else {
            return Err(FieldSearchError::sequence(format!(
                "variable in field name \"{template}\" is not terminated by }}"
            )));
        };
        let name = &body[..end];
        let value = variables.get(name).ok_or_else(|| {
            FieldSearchError::sequence(format!("variable \"{name}\" is not defined"))
        })?;
        expanded.push_str(value);
        rest = &body[end + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://x/blog/page::*", Some(("http://x/blog", "http://x/blog/page::")))]
    #[case("http://x/blog/page", None)]
    #[case("page::*", None)]
    fn splits_wildcard_paths(#[case] path: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(wildcard_base(path), expected);
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("${lang}::title", "fr::title")]
    #[case("a${lang}b${lang}", "afrbfr")]
    fn expands_defined_variables(#[case] template: &str, #[case] expected: &str) {
        let variables = HashMap::from([("lang".to_owned(), "fr".to_owned())]);
        assert_eq!(expand_variables(template, &variables).unwrap(), expected);
    }

    #[rstest]
    #[case("$lang")]
    #[case("${lang")]
    #[case("${missing}")]
    fn rejects_malformed_or_undefined_variables(#[case] template: &str) {
        let variables = HashMap::from([("lang".to_owned(), "fr".to_owned())]);
        assert!(matches!(
            expand_variables(template, &variables),
            Err(FieldSearchError::InvalidSequence(_))
        ));
    }
}
