use crate::error::FieldSearchError;
use crate::instruction::{Instruction, Opcode, Operand};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// An append-only instruction sequence.
///
/// Programs are read-only while they run and may be executed any number of
/// times, from several threads at once.
#[derive(Clone, Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: OnceLock<HashMap<i64, Vec<usize>>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends one instruction.
    ///
    /// ```
    /// use fieldsearch_engine::{Opcode, Program};
    ///
    /// let mut program = Program::new();
    /// program
    ///     .append(Opcode::FieldName, "title")?
    ///     .append(Opcode::Path, "blog")?
    ///     .append(Opcode::SelfNode, ())?;
    /// assert_eq!(program.len(), 3);
    /// # Ok::<(), fieldsearch_engine::FieldSearchError>(())
    /// ```
    pub fn append(
        &mut self,
        opcode: Opcode,
        operand: impl Into<Operand>,
    ) -> Result<&mut Self, FieldSearchError> {
        let instruction = Instruction::new(opcode, operand)?;
        Ok(self.push(instruction))
    }

    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.labels.take();
        self.instructions.push(instruction);
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Position of the `LABEL` carrying `label`.
    pub(crate) fn resolve_label(&self, label: i64, position: usize) -> Result<usize, FieldSearchError> {
        let table = self.labels.get_or_init(|| self.label_table());
        match table.get(&label).map(Vec::as_slice) {
            Some([target]) => Ok(*target),
            Some(targets) if targets.len() > 1 => Err(FieldSearchError::sequence(format!(
                "label {label} is defined {} times",
                targets.len()
            ))),
            _ => Err(FieldSearchError::UnknownLabel { label, position }),
        }
    }

    fn label_table(&self) -> HashMap<i64, Vec<usize>> {
        let mut table: HashMap<i64, Vec<usize>> = HashMap::new();
        for (position, instruction) in self.instructions.iter().enumerate() {
            if instruction.opcode() == Opcode::Label {
                table.entry(instruction.int64()).or_default().push(position);
            }
        }
        table
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Self { instructions: iter.into_iter().collect(), labels: OnceLock::new() }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
