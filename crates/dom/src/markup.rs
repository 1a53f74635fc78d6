use crate::document::{Document, NodeRef};
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use std::str;

const WRAPPER: &str = "fieldsearch-fragment";

#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("markup is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("unknown entity reference '&{0};'")]
    UnknownEntity(String),
    #[error("unbalanced markup: element <{0}> is never closed")]
    Unclosed(String),
    #[error("unbalanced markup: content after the end of the fragment")]
    TrailingContent,
    #[error("failed to serialize document: {0}")]
    Write(String),
}

impl MarkupError {
    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        MarkupError::Write(err.to_string())
    }

    fn encoding(err: impl std::fmt::Display) -> Self {
        MarkupError::Encoding(err.to_string())
    }
}

impl NodeRef {
    /// Parses `markup` and appends the result as children of this node.
    ///
    /// A string without `<` is appended as a single text node without parsing.
    /// Otherwise the fragment may contain several top-level nodes and text; it is
    /// parsed inside a synthetic wrapper whose children land here. On error this
    /// node is left untouched.
    pub fn import_markup(&self, markup: &str) -> Result<(), MarkupError> {
        if !markup.contains('<') {
            self.append_text(markup);
            return Ok(());
        }

        let wrapped = format!("<{WRAPPER}>{markup}</{WRAPPER}>");
        let mut reader = Reader::from_str(&wrapped);
        let scratch = Document::new();
        let mut stack: Vec<NodeRef> = Vec::new();
        // the wrapper opens exactly once; the fragment may not close it early
        let mut wrapper_opened = false;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let node = match stack.last() {
                        None if !wrapper_opened => {
                            wrapper_opened = true;
                            scratch.root()
                        }
                        None => return Err(MarkupError::TrailingContent),
                        Some(parent) => append_start(parent, &start)?,
                    };
                    stack.push(node);
                }
                Event::Empty(start) => {
                    append_start(current(&stack)?, &start)?;
                }
                Event::End(_) => {
                    stack.pop().ok_or(MarkupError::TrailingContent)?;
                }
                Event::Text(text) => {
                    let raw = str::from_utf8(&text).map_err(MarkupError::encoding)?;
                    append_text_merged(current(&stack)?, raw);
                }
                Event::CData(data) => {
                    let raw = str::from_utf8(&data).map_err(MarkupError::encoding)?;
                    append_text_merged(current(&stack)?, raw);
                }
                Event::GeneralRef(reference) => {
                    let name = str::from_utf8(&reference).map_err(MarkupError::encoding)?;
                    append_text_merged(current(&stack)?, &resolve_reference(name)?);
                }
                Event::Eof => break,
                // comments, processing instructions and doctypes carry no content
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(MarkupError::Unclosed(open.name().unwrap_or_else(|| WRAPPER.to_owned())));
        }
        for child in scratch.root().children() {
            self.append_copy(&child);
        }
        Ok(())
    }
}

/// The open element content goes to; none once the wrapper has closed.
fn current(stack: &[NodeRef]) -> Result<&NodeRef, MarkupError> {
    stack.last().ok_or(MarkupError::TrailingContent)
}

fn append_start(parent: &NodeRef, start: &BytesStart<'_>) -> Result<NodeRef, MarkupError> {
    let name = str::from_utf8(start.name().as_ref()).map_err(MarkupError::encoding)?.to_owned();
    let element = parent.append_element(&name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::InvalidAttr)?;
        let key = str::from_utf8(attribute.key.as_ref()).map_err(MarkupError::encoding)?;
        let raw = str::from_utf8(&attribute.value).map_err(MarkupError::encoding)?;
        let value = unescape(raw).map_err(quick_xml::Error::Escape)?;
        element.set_attribute(key, &value);
    }
    Ok(element)
}

/// Entity references arrive as separate events; glue them to the preceding text node.
fn append_text_merged(parent: &NodeRef, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = parent.children().pop()
        && last.merge_text(text)
    {
        return;
    }
    parent.append_text(text);
}

fn resolve_reference(name: &str) -> Result<String, MarkupError> {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        return parsed
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| MarkupError::UnknownEntity(name.to_owned()));
    }
    resolve_predefined_entity(name)
        .map(str::to_owned)
        .ok_or_else(|| MarkupError::UnknownEntity(name.to_owned()))
}
