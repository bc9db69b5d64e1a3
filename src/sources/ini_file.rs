//! INI file source.
//!
//! `[section]` entries load as `section.key`; entries before the first header
//! or under `[DEFAULT]` load as bare keys. This differs from configparser-style
//! readers, where `[DEFAULT]` options are inherited by every section and
//! entries before the first header are an error. Saving rewrites the whole
//! file, so comments do not survive a save.

use super::{file_label, read_optional, source_id_for_path, write_file};
use crate::config::{Filter, FlatMap, Source, SourceCache, retain_included, value_to_text};
use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Debug)]
pub struct IniFileSource {
    path: PathBuf,
    id: String,
    name: String,
    cache: SourceCache,
}

impl IniFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            id: source_id_for_path(&path),
            name: file_label("ini", &path),
            path,
            cache: SourceCache::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<IniDocument> {
        let content = read_optional(&self.path)?.unwrap_or_default();
        Ok(IniDocument::parse(&content))
    }
}

impl Source for IniFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> Option<&str> {
        Some(".ini")
    }

    fn load(&mut self, filter: Option<&Filter>, _depth: Option<i64>) -> Result<FlatMap> {
        let values = self.read()?.flatten();
        self.cache.replace(values.clone());
        Ok(retain_included(values, filter))
    }

    fn save(&mut self) -> Result<()> {
        let mut document = self.read()?;
        for (key, value) in self.cache.staged() {
            let (section, option) = split_key(key);
            match value {
                Some(value) => document.set(section, option, value_to_text(value)),
                None => document.remove(section, option),
            }
        }
        write_file(&self.path, &document.render())?;
        debug!(
            path = %self.path.display(),
            changes = self.cache.staged().len(),
            "Wrote ini file"
        );
        self.cache.clear_staged();
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        let values = self.read()?.flatten();
        self.cache.replace(values);
        Ok(())
    }

    fn cache(&self) -> &SourceCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut SourceCache {
        &mut self.cache
    }
}

/// `section.option` splits at the first dot; a bare key targets `DEFAULT`.
fn split_key(key: &str) -> (&str, &str) {
    key.split_once('.').unwrap_or((DEFAULT_SECTION, key))
}

#[derive(Debug)]
struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

/// Ordered sections; index 0 is always `DEFAULT`.
#[derive(Debug)]
struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    fn parse(content: &str) -> Self {
        let mut document = Self {
            sections: vec![IniSection {
                name: DEFAULT_SECTION.to_string(),
                entries: Vec::new(),
            }],
        };
        let mut current = 0;
        let mut last_option: Option<String> = None;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                last_option = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(option) = last_option.as_ref().filter(|_| line.starts_with(char::is_whitespace)) {
                if let Some(entry) = document.sections[current]
                    .entries
                    .iter_mut()
                    .find(|(k, _)| k == option)
                {
                    entry.1.push('\n');
                    entry.1.push_str(trimmed);
                }
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = document.section_index(header.trim());
                last_option = None;
                continue;
            }
            let Some(split) = trimmed.find(['=', ':']) else {
                continue;
            };
            let option = trimmed[..split].trim().to_lowercase();
            if option.is_empty() {
                continue;
            }
            let value = trimmed[split + 1..].trim().to_string();
            document.sections[current].upsert(&option, value);
            last_option = Some(option);
        }
        document
    }

    /// Index of `name`, appending an empty section when missing.
    fn section_index(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(IniSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        }
    }

    fn set(&mut self, section: &str, option: &str, value: String) {
        let index = self.section_index(section);
        self.sections[index].upsert(&option.to_lowercase(), value);
    }

    fn remove(&mut self, section: &str, option: &str) {
        let option = option.to_lowercase();
        if let Some(section) = self.sections.iter_mut().find(|s| s.name == section) {
            section.entries.retain(|(k, _)| *k != option);
        }
    }

    fn flatten(&self) -> FlatMap {
        let mut values = FlatMap::new();
        for section in &self.sections {
            for (option, value) in &section.entries {
                let key = if section.name == DEFAULT_SECTION {
                    option.clone()
                } else {
                    format!("{}.{}", section.name, option)
                };
                values.insert(key, Value::String(value.clone()));
            }
        }
        values
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if section.name == DEFAULT_SECTION && section.entries.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section.name));
            for (option, value) in &section.entries {
                out.push_str(&format!("{} = {}\n", option, value.replace('\n', "\n\t")));
            }
        }
        out
    }
}

impl IniSection {
    fn upsert(&mut self, option: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == option) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((option.to_string(), value)),
        }
    }
}
