use fieldsearch_core::{
    CHILDREN_LINK, ContentStore, FieldValue, LinkStore, PARENT_LINK, SitePrefix, StoreError,
};
use std::collections::{BTreeMap, HashMap};

type Row = BTreeMap<String, FieldValue>;

/// Pages, fields and links of one site, held in memory.
///
/// Every path argument goes through [`SitePrefix::absolute`], so callers may use
/// relative paths (`"blog/hello"`) or full keys interchangeably.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    site: SitePrefix,
    rows: BTreeMap<String, Row>,
    links: HashMap<(String, String), Vec<String>>,
}

impl MemoryStore {
    /// Creates a store holding only the home page.
    pub fn new(site: impl Into<SitePrefix>) -> Self {
        let site = site.into();
        let mut rows = BTreeMap::new();
        rows.insert(site.as_str().to_owned(), Row::new());
        Self { site, rows, links: HashMap::new() }
    }

    pub fn site(&self) -> &SitePrefix {
        &self.site
    }

    pub fn page_count(&self) -> usize {
        self.rows.len()
    }

    /// Creates the page at `path` and any missing ancestor, wiring the
    /// `children` and `parent` links. Returns the absolute key.
    pub fn insert_page(&mut self, path: &str) -> String {
        let key = self.site.absolute(path);
        if self.rows.contains_key(&key) {
            return key;
        }
        self.rows.insert(key.clone(), Row::new());

        if let Some(parent) = self.parent_key(&key) {
            let parent = self.insert_page(&parent);
            self.push_link(&parent, CHILDREN_LINK, &key);
            self.push_link(&key, PARENT_LINK, &parent);
        }
        key
    }

    /// Sets a field, creating the page when needed.
    pub fn set_field(&mut self, path: &str, field: &str, value: impl Into<FieldValue>) {
        let key = self.insert_page(path);
        if let Some(row) = self.rows.get_mut(&key) {
            row.insert(field.to_owned(), value.into());
        }
    }

    /// Adds a `name` link from `source` to `destination`.
    ///
    /// Neither end has to exist as a page.
    pub fn link(&mut self, source: &str, name: &str, destination: &str) {
        let source = self.site.absolute(source);
        let destination = self.site.absolute(destination);
        self.push_link(&source, name, &destination);
    }

    /// Chained form of [`MemoryStore::set_field`] for building fixtures.
    #[must_use]
    pub fn with_field(mut self, path: &str, field: &str, value: impl Into<FieldValue>) -> Self {
        self.set_field(path, field, value);
        self
    }

    #[must_use]
    pub fn with_page(mut self, path: &str) -> Self {
        self.insert_page(path);
        self
    }

    #[must_use]
    pub fn with_link(mut self, source: &str, name: &str, destination: &str) -> Self {
        self.link(source, name, destination);
        self
    }

    fn push_link(&mut self, source: &str, name: &str, destination: &str) {
        let targets = self.links.entry((source.to_owned(), name.to_owned())).or_default();
        if !targets.iter().any(|existing| existing == destination) {
            targets.push(destination.to_owned());
        }
    }

    /// Store keys are absolute; anything outside the site prefix is rejected.
    fn check_key(&self, path: &str) -> Result<(), StoreError> {
        match self.site.relative(path) {
            Some(_) => Ok(()),
            None => Err(StoreError::invalid_path(path)),
        }
    }

    fn parent_key(&self, key: &str) -> Option<String> {
        let relative = self.site.relative(key)?;
        if relative.is_empty() {
            return None;
        }
        let parent = relative.rfind('/').map_or("", |pos| &relative[..pos]);
        Some(format!("{}{}", self.site, parent))
    }
}

impl ContentStore for MemoryStore {
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.check_key(path)?;
        Ok(self.rows.contains_key(path))
    }

    fn get_field(&self, path: &str, field: &str) -> Result<Option<FieldValue>, StoreError> {
        self.check_key(path)?;
        Ok(self.rows.get(path).and_then(|row| row.get(field)).cloned())
    }
}

impl LinkStore for MemoryStore {
    fn find_link(&self, source: &str, name: &str) -> Result<Option<String>, StoreError> {
        self.check_key(source)?;
        Ok(self
            .links
            .get(&(source.to_owned(), name.to_owned()))
            .and_then(|targets| targets.first())
            .cloned())
    }

    fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.check_key(path)?;
        Ok(self
            .links
            .get(&(path.to_owned(), CHILDREN_LINK.to_owned()))
            .cloned()
            .unwrap_or_default())
    }
}
