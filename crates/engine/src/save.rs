use crate::error::FieldSearchError;
use crate::instruction::Opcode;
use crate::interpreter::ExecutionContext;
use fieldsearch_core::FieldValue;
use fieldsearch_dom::NodeRef;

/// One `name[key=value]...` step of a `SAVE` child path.
#[derive(Debug, PartialEq, Eq)]
struct ElementStep<'a> {
    name: &'a str,
    attributes: Vec<(&'a str, &'a str)>,
}

impl ExecutionContext<'_> {
    /// Materializes the first result under the output cursor, then resets with
    /// `saved` set. Does nothing without a result or a cursor.
    pub(crate) fn save(&mut self, opcode: Opcode, child: &str) -> Result<(), FieldSearchError> {
        let (Some(cursor), Some(value)) = (self.cursor.clone(), self.result.first().cloned()) else {
            return Ok(());
        };

        match opcode {
            Opcode::SaveInt64 => {
                let number = integer(&value)?;
                cursor.append_element(child).append_text(&number.to_string());
            }
            Opcode::SaveInt64Date => {
                let number = integer(&value)?;
                let date = self.dates().format_date(number).ok_or_else(|| {
                    FieldSearchError::ValueConversion {
                        kind: value.kind_name(),
                        value: value.as_text(),
                        target: "date",
                    }
                })?;
                cursor.append_element(child).append_text(&date);
            }
            Opcode::SaveXml => {
                let target = cursor.append_element(child);
                let markup = value.as_text();
                if let Err(error) = self.markup().import_fragment(&target, &markup) {
                    self.push_warning(&format!("{child}: saved as text, markup rejected: {error}"));
                    target.append_text(&markup);
                }
            }
            _ => {
                let steps = parse_child_path(child)?;
                create_child_path(&cursor, &steps).append_text(&value.as_text());
            }
        }

        self.reset(true);
        Ok(())
    }
}

fn integer(value: &FieldValue) -> Result<i64, FieldSearchError> {
    value.as_i64().ok_or_else(|| FieldSearchError::ValueConversion {
        kind: value.kind_name(),
        value: value.as_text(),
        target: "int64",
    })
}

/// Splits `desc[type=name]/data` into element steps. A bracket group without
/// `=` is a boolean attribute (`[checked]` means `checked="checked"`).
fn parse_child_path(path: &str) -> Result<Vec<ElementStep<'_>>, FieldSearchError> {
    let mut steps = Vec::new();
    for segment in path.split('/') {
        let mut groups = segment.split('[');
        let name = groups.next().unwrap_or_default();
        let mut attributes = Vec::new();
        for group in groups {
            let Some(body) = group.strip_suffix(']') else {
                return Err(FieldSearchError::sequence(format!(
                    "invalid attribute definition in \"{segment}\", missing ']'"
                )));
            };
            attributes.push(body.split_once('=').unwrap_or((body, body)));
        }
        steps.push(ElementStep { name, attributes });
    }
    Ok(steps)
}

/// Appends the element chain and returns its innermost element.
fn create_child_path(cursor: &NodeRef, steps: &[ElementStep<'_>]) -> NodeRef {
    let mut parent = cursor.clone();
    for step in steps {
        let element = parent.append_element(step.name);
        for (key, value) in &step.attributes {
            element.set_attribute(key, value);
        }
        parent = element;
    }
    parent
}
