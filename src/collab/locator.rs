//! Code location hints
//!
//! Maps keywords pulled from a trace log to places in the engine's source.
//! With a local checkout the files are searched directly; without one a
//! static keyword table is used.

use crate::util::truncate;
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Placeholder for keywords with no location, so output length matches input
pub const NO_MATCH: &str = "no matching code found";

/// Keywords looked for in trace logs, in reporting order
pub const TRACE_KEYWORDS: [&str; 3] = ["mapping", "type convert", "permission"];

const MAX_FILE_BYTES: u64 = 1024 * 1024;
const MAX_EXCERPT_CHARS: usize = 160;

/// Known trace keywords present in the log, deduplicated, in fixed order
pub fn extract_keywords(log_text: &str) -> Vec<String> {
    TRACE_KEYWORDS
        .iter()
        .filter(|keyword| log_text.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

/// Something that can point a keyword at source code
pub trait CodeRepository: Send + Sync {
    fn lookup_by_keyword(&self, keyword: &str, root: Option<&Path>) -> Option<String>;
}

/// Built-in keyword table for the reference engine layout
pub struct StaticCodeMap;

impl CodeRepository for StaticCodeMap {
    fn lookup_by_keyword(&self, keyword: &str, _root: Option<&Path>) -> Option<String> {
        let location = match keyword {
            "mapping" => "src/flow/mapping.js:58 - mapNodeField: (source, target) => { return target[sourceField] || 0; }",
            "type convert" => "src/form/validate.js:32 - convertFieldType: (val, type) => { return type === \"text\" ? val.toString() : Number(val); }",
            "permission" => "src/permission/filter.js:18 - checkDataPermission: (operator, data) => { return operator.roles.includes(\"admin\") ? data : {}; }",
            _ => return None,
        };
        Some(location.to_string())
    }
}

/// Searches a local checkout for the first line mentioning a keyword
pub struct LocalCodeSearch {
    ignore_dirs: Vec<String>,
}

impl Default for LocalCodeSearch {
    fn default() -> Self {
        let ignore_dirs = [
            ".git",
            "node_modules",
            "target",
            "vendor",
            "dist",
            "build",
            ".next",
            "__pycache__",
            ".venv",
            "venv",
        ]
        .iter()
        .map(|d| d.to_string())
        .collect();
        Self { ignore_dirs }
    }
}

impl LocalCodeSearch {
    fn should_ignore(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.ignore_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    fn is_likely_text_file(path: &Path) -> bool {
        const TEXT_EXTENSIONS: &[&str] = &[
            "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "java", "kt", "py", "go", "rs", "rb",
            "php", "cs", "json", "yaml", "yml", "xml", "properties", "sql",
        ];
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl CodeRepository for LocalCodeSearch {
    fn lookup_by_keyword(&self, keyword: &str, root: Option<&Path>) -> Option<String> {
        let root = root?;
        let needle = keyword.to_lowercase();
        if needle.trim().is_empty() {
            return None;
        }

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.should_ignore(e))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !Self::is_likely_text_file(entry.path()) {
                continue;
            }
            let too_large = entry
                .metadata()
                .map(|m| m.len() > MAX_FILE_BYTES)
                .unwrap_or(true);
            if too_large {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };

            if let Some((index, line)) = content
                .lines()
                .enumerate()
                .find(|(_, line)| line.to_lowercase().contains(&needle))
            {
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                return Some(format!(
                    "{}:{} - {}",
                    relative,
                    index + 1,
                    truncate(line.trim(), MAX_EXCERPT_CHARS)
                ));
            }
        }
        None
    }
}

/// Resolves keywords against a local checkout or the static table
pub struct CodeLocator {
    local: Box<dyn CodeRepository>,
    fallback: Box<dyn CodeRepository>,
}

impl Default for CodeLocator {
    fn default() -> Self {
        Self::new(Box::new(LocalCodeSearch::default()), Box::new(StaticCodeMap))
    }
}

impl CodeLocator {
    pub fn new(local: Box<dyn CodeRepository>, fallback: Box<dyn CodeRepository>) -> Self {
        Self { local, fallback }
    }

    /// One location string per keyword, in keyword order
    pub fn locate(&self, keywords: &[String], code_root: Option<&Path>) -> Vec<String> {
        keywords
            .iter()
            .map(|keyword| {
                let hit = match code_root {
                    Some(root) => self.local.lookup_by_keyword(keyword, Some(root)),
                    None => self.fallback.lookup_by_keyword(keyword, None),
                };
                hit.unwrap_or_else(|| NO_MATCH.to_string())
            })
            .collect()
    }
}
