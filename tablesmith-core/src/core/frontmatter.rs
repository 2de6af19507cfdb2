//! Frontmatter key/value access over any [`DocumentStore`].
//!
//! Frontmatter is the block between a leading `---` line and the next `---`
//! line. Only top-level `key: value` lines are addressed; indented or `- `
//! lines that follow a key belong to that key and move with it. Values are
//! encoded and decoded as YAML scalars.

use crate::core::document::{DocumentStore, MetadataStore};
use crate::core::parser::carriage_return;
use crate::Result;

const FENCE: &str = "---";

/// Line range of the frontmatter body: `(first_line, closing_fence_line)`.
fn frontmatter_bounds(lines: &[String]) -> Option<(usize, usize)> {
    if lines.first().map(|l| l.trim_end()) != Some(FENCE) {
        return None;
    }
    let close = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim_end() == FENCE)
        .map(|(i, _)| i)?;
    Some((1, close))
}

fn key_of(line: &str) -> Option<&str> {
    if line.starts_with(|c: char| c.is_whitespace() || c == '-' || c == '#') {
        return None;
    }
    let (key, _) = line.split_once(':')?;
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

/// Lines `[start, end)` that hold `key`, including its continuation lines.
fn key_span(lines: &[String], body: (usize, usize), key: &str) -> Option<(usize, usize)> {
    let (first, close) = body;
    let start = (first..close).find(|&i| key_of(&lines[i]) == Some(key))?;
    let end = (start + 1..close)
        .find(|&i| key_of(&lines[i]).is_some())
        .unwrap_or(close);
    Some((start, end))
}

/// Encodes `value` as the YAML text that follows `key: `.
///
/// Finite numbers are written bare so they read back as numbers. Everything
/// else is a YAML string, quoted wherever a plain scalar would read as null,
/// a boolean or a number. Multi-line values become a literal block whose
/// lines are indented under the key.
fn encode_value(value: &str) -> Result<String> {
    if !value.is_empty() && value.trim() == value && value.parse::<f64>().is_ok_and(f64::is_finite) {
        return Ok(value.to_string());
    }
    let encoded = serde_yaml::to_string(value)?;
    let encoded = encoded.trim_end();
    Ok(encoded.strip_prefix("---\n").unwrap_or(encoded).to_string())
}

/// Lines of a `key: value` entry, each terminated with `cr`.
fn entry_lines(key: &str, value: &str, cr: &str) -> Result<Vec<String>> {
    let encoded = encode_value(value)?;
    Ok(format!("{key}: {encoded}")
        .split('\n')
        .map(|line| format!("{line}{cr}"))
        .collect())
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// Reads `key` from the frontmatter of `text`.
///
/// String values are decoded from YAML. Lists, maps and non-string scalars
/// come back as the text after the colon.
pub fn read_frontmatter_key(text: &str, key: &str) -> Option<String> {
    let lines = split_lines(text);
    let body = frontmatter_bounds(&lines)?;
    let (start, end) = key_span(&lines, body, key)?;
    let (_, raw) = lines[start].split_once(':')?;
    let entry = lines[start..end]
        .iter()
        .map(|l| l.trim_end_matches('\r'))
        .collect::<Vec<_>>()
        .join("\n");
    let decoded = serde_yaml::from_str::<serde_yaml::Value>(&entry)
        .ok()
        .and_then(|entry| entry.get(key).and_then(|v| v.as_str().map(str::to_string)));
    Some(decoded.unwrap_or_else(|| raw.trim().to_string()))
}

/// Returns `text` with `key` set to `value`, creating the frontmatter block
/// when the document has none. CRLF text stays CRLF.
///
/// # Errors
///
/// Returns [`TablesmithError::Yaml`](crate::TablesmithError::Yaml) if the
/// value cannot be encoded.
pub fn set_frontmatter_key(text: &str, key: &str, value: &str) -> Result<String> {
    let cr = carriage_return(text);
    let entry = entry_lines(key, value, cr)?;
    let mut lines = split_lines(text);
    match frontmatter_bounds(&lines) {
        Some(body) => {
            let (start, end) = key_span(&lines, body, key).unwrap_or((body.1, body.1));
            lines.splice(start..end, entry);
        }
        None => {
            let fence = format!("{FENCE}{cr}");
            let block = std::iter::once(fence.clone())
                .chain(entry)
                .chain(std::iter::once(fence));
            lines.splice(0..0, block);
        }
    }
    Ok(lines.join("\n"))
}

/// Returns `text` with `old_key` renamed to `new_key`. An existing
/// `new_key` is replaced.
pub fn rename_frontmatter_key(text: &str, old_key: &str, new_key: &str) -> String {
    if old_key == new_key {
        return text.to_string();
    }
    let mut lines = split_lines(text);
    let Some(body) = frontmatter_bounds(&lines) else {
        return text.to_string();
    };
    let Some((start, _)) = key_span(&lines, body, old_key) else {
        return text.to_string();
    };
    if let Some((_, value)) = lines[start].split_once(':') {
        lines[start] = format!("{new_key}:{value}");
    }
    if let Some((dup_start, dup_end)) = key_span(&lines, body, new_key).filter(|(s, _)| *s != start) {
        lines.drain(dup_start..dup_end);
    }
    lines.join("\n")
}

/// Returns `text` without `key`.
pub fn delete_frontmatter_key(text: &str, key: &str) -> String {
    let mut lines = split_lines(text);
    let Some(body) = frontmatter_bounds(&lines) else {
        return text.to_string();
    };
    if let Some((start, end)) = key_span(&lines, body, key) {
        lines.drain(start..end);
    }
    lines.join("\n")
}

/// [`MetadataStore`] that edits the frontmatter of documents in `D`.
///
/// Every mutation is one read, an in-memory edit, and one write.
#[derive(Debug, Clone)]
pub struct FrontmatterStore<D: DocumentStore> {
    documents: D,
}

impl<D: DocumentStore> FrontmatterStore<D> {
    pub fn new(documents: D) -> Self {
        Self { documents }
    }

    fn modify(&self, path: &str, edit: impl FnOnce(&str) -> Result<String>) -> Result<()> {
        let text = self.documents.read(path)?;
        let updated = edit(&text)?;
        if updated != text {
            self.documents.write(path, &updated)?;
        }
        Ok(())
    }
}

impl<D: DocumentStore> MetadataStore for FrontmatterStore<D> {
    fn read_key(&self, path: &str, key: &str) -> Result<Option<String>> {
        Ok(read_frontmatter_key(&self.documents.read(path)?, key))
    }

    fn set_key(&self, path: &str, key: &str, value: &str) -> Result<()> {
        self.modify(path, |text| set_frontmatter_key(text, key, value))
    }

    fn rename_key(&self, path: &str, old_key: &str, new_key: &str) -> Result<()> {
        self.modify(path, |text| Ok(rename_frontmatter_key(text, old_key, new_key)))
    }

    fn delete_key(&self, path: &str, key: &str) -> Result<()> {
        self.modify(path, |text| Ok(delete_frontmatter_key(text, key)))
    }
}
