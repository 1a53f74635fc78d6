//! Store traversals: descendants, ancestors and named links.

use crate::error::FieldSearchError;
use crate::instruction::Opcode;
use crate::interpreter::{ExecutionContext, wildcard_base};
use fieldsearch_core::SitePrefix;

impl ExecutionContext<'_> {
    /// Probes the descendants of the current node, level by level, down to
    /// `depth` levels below it.
    pub(crate) fn children(&mut self, depth: i64) -> Result<(), FieldSearchError> {
        if depth < 0 {
            return Err(FieldSearchError::sequence("CHILDREN expects a depth of 0 or more"));
        }
        if depth == 0 || !self.found {
            return Ok(());
        }

        let mut stem = None;
        if let Some((base, prefix)) = wildcard_base(&self.self_path) {
            let (base, prefix) = (base.to_owned(), prefix.to_owned());
            self.self_path = base;
            stem = Some(prefix);
        }

        let mut frontier = vec![self.self_path.clone()];
        for level in 1..=depth {
            let mut next = Vec::new();
            for parent in &frontier {
                for child in self.links().children(parent)? {
                    if stem.as_deref().is_some_and(|stem| !child.starts_with(stem)) {
                        continue;
                    }
                    self.probe(&child)?;
                    if self.stop_searching() {
                        return Ok(());
                    }
                    if level < depth {
                        next.push(child);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(())
    }

    /// Probes each ancestor of the current node, nearest first, down to and
    /// including `limit`.
    pub(crate) fn parents(&mut self, limit: &str) -> Result<(), FieldSearchError> {
        self.require_field_name(Opcode::Parents)?;
        if !self.found {
            return Ok(());
        }

        let mut limit = self.site.absolute(limit);
        if limit.len() > self.site.as_str().len() {
            limit.truncate(limit.trim_end_matches('/').len());
        }
        if !SitePrefix::is_descendant(&self.self_path, &limit) {
            return Ok(());
        }
        let Some(relative) = self.site.relative(&self.self_path) else {
            return Ok(());
        };

        let mut segments: Vec<String> = relative.split('/').map(str::to_owned).collect();
        while segments.pop().is_some() {
            let ancestor = format!("{}{}", self.site, segments.join("/"));
            self.probe(&ancestor)?;
            if self.stop_searching() || ancestor == limit {
                break;
            }
        }
        Ok(())
    }

    /// Moves to the destination of the unique `name` link of the current node.
    pub(crate) fn link(&mut self, name: &str) -> Result<(), FieldSearchError> {
        if !self.found {
            return Ok(());
        }
        match self.links().find_link(&self.self_path, name)? {
            Some(destination) => self.enter(destination),
            None => {
                tracing::trace!(path = %self.self_path, link = name, "no such link");
                self.self_path.clear();
                self.found = false;
                Ok(())
            }
        }
    }
}
