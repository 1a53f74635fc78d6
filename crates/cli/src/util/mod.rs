use anyhow::Context;
use std::fs;
use std::path::Path;

pub type CliResult<T> = anyhow::Result<T>;

pub fn read_source(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn plural(count: usize, word: &str) -> String {
    if count == 1 { format!("{count} {word}") } else { format!("{count} {word}s") }
}
