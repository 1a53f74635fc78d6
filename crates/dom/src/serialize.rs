use crate::document::{Arena, Document, NodeId, NodeKind, NodeRef};
use crate::markup::MarkupError;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;

impl Document {
    /// Serializes the whole tree (without XML declaration).
    pub fn to_xml(&self) -> Result<String, MarkupError> {
        self.root().to_xml()
    }
}

impl NodeRef {
    /// Serializes this node and its descendants. Childless elements are self-closed.
    pub fn to_xml(&self) -> Result<String, MarkupError> {
        let arena = self.document().read();
        let mut writer = Writer::new(Vec::new());
        write_node(&mut writer, &arena, self.id())?;
        String::from_utf8(writer.into_inner()).map_err(MarkupError::write)
    }
}

fn write_node<W: Write>(
    writer: &mut Writer<W>,
    arena: &Arena,
    id: NodeId,
) -> Result<(), MarkupError> {
    let node = &arena.nodes[id.index()];
    match &node.kind {
        NodeKind::Document => {
            for child in &node.children {
                write_node(writer, arena, *child)?;
            }
        }
        NodeKind::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text))).map_err(MarkupError::write)?;
        }
        NodeKind::Element { name, attributes } => {
            let mut start = BytesStart::new(name.as_str());
            for (key, value) in attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if node.children.is_empty() {
                writer.write_event(Event::Empty(start)).map_err(MarkupError::write)?;
                return Ok(());
            }
            writer.write_event(Event::Start(start)).map_err(MarkupError::write)?;
            for child in &node.children {
                write_node(writer, arena, *child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(MarkupError::write)?;
        }
    }
    Ok(())
}
