use crate::store::MemoryStore;
use fieldsearch_core::FieldValue;
use quick_xml::de::from_str;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreLoadError {
    #[error("XML parsing failed: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("unknown field type '{kind}' on field '{field}'")]
    UnknownFieldType { field: String, kind: String },
    #[error("field '{field}' value '{value}' is not a valid {kind}")]
    InvalidValue { field: String, value: String, kind: &'static str },
}

#[derive(Debug, Deserialize)]
struct XmlSite {
    #[serde(rename = "@prefix")]
    prefix: String,
    #[serde(rename = "page", default)]
    pages: Vec<XmlPage>,
    #[serde(rename = "link", default)]
    links: Vec<XmlLink>,
}

#[derive(Debug, Deserialize)]
struct XmlPage {
    #[serde(rename = "@path", default)]
    path: String,
    #[serde(rename = "field", default)]
    fields: Vec<XmlField>,
    #[serde(rename = "page", default)]
    children: Vec<XmlPage>,
}

#[derive(Debug, Deserialize)]
struct XmlField {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct XmlLink {
    #[serde(rename = "@from")]
    from: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@to")]
    to: String,
}

impl MemoryStore {
    /// Loads a site description.
    ///
    /// ```xml
    /// <site prefix="http://example.com/">
    ///   <page path="">
    ///     <field name="title">Home</field>
    ///     <page path="blog">
    ///       <field name="modified" type="int64">1700000000000000</field>
    ///     </page>
    ///   </page>
    ///   <link from="blog" name="page-type" to="types/list"/>
    /// </site>
    /// ```
    ///
    /// Nested page paths are relative to their parent page.
    pub fn from_xml(xml: &str) -> Result<Self, StoreLoadError> {
        let parsed: XmlSite = from_str(xml)?;
        let mut store = MemoryStore::new(parsed.prefix.as_str());
        for page in &parsed.pages {
            load_page(&mut store, "", page)?;
        }
        for link in &parsed.links {
            store.link(&link.from, &link.name, &link.to);
        }
        tracing::debug!(
            site = %store.site(),
            pages = store.page_count(),
            links = parsed.links.len(),
            "site description loaded"
        );
        Ok(store)
    }
}

fn load_page(store: &mut MemoryStore, base: &str, page: &XmlPage) -> Result<(), StoreLoadError> {
    let path = match (base.is_empty(), page.path.trim_matches('/')) {
        (_, "") => base.to_owned(),
        (true, own) => own.to_owned(),
        (false, own) => format!("{base}/{own}"),
    };
    store.insert_page(&path);
    for field in &page.fields {
        store.set_field(&path, &field.name, parse_field_value(field)?);
    }
    for child in &page.children {
        load_page(store, &path, child)?;
    }
    Ok(())
}

fn parse_field_value(field: &XmlField) -> Result<FieldValue, StoreLoadError> {
    let invalid = |kind: &'static str| StoreLoadError::InvalidValue {
        field: field.name.clone(),
        value: field.value.clone(),
        kind,
    };
    match field.kind.as_deref() {
        None | Some("string") => Ok(FieldValue::String(field.value.clone())),
        Some("int64") => field.value.trim().parse().map(FieldValue::Integer).map_err(|_| invalid("int64")),
        Some("bool") => field.value.trim().parse().map(FieldValue::Bool).map_err(|_| invalid("bool")),
        Some("null") => Ok(FieldValue::Null),
        Some(other) => Err(StoreLoadError::UnknownFieldType {
            field: field.name.clone(),
            kind: other.to_owned(),
        }),
    }
}
