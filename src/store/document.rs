//! INI document parsing and serialization
//!
//! Minimal model of the engine's Sandboxie.ini format: bracketed section
//! headers, `key=value` option lines, `;`/`#` comment lines. Section and key
//! order is preserved across a parse/serialize round trip; a duplicated key
//! within a section keeps the last value seen, matching how the engine itself
//! resolves duplicates.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Ordered option map for one sandbox section.
pub type SectionOptions = IndexMap<String, String>;

/// Parsed contents of an engine config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    sections: IndexMap<String, SectionOptions>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text into a document.
    pub fn parse(content: &str) -> Result<Self> {
        let mut sections: IndexMap<String, SectionOptions> = IndexMap::new();
        let mut current: Option<String> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| {
                    Error::ConfigFormat(format!("line {}: unterminated section header", idx + 1))
                })?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::ConfigFormat(format!(
                        "line {}: empty section name",
                        idx + 1
                    )));
                }
                sections.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::ConfigFormat(format!(
                    "line {}: expected key=value, got '{}'",
                    idx + 1,
                    line
                )));
            };
            let Some(section) = current.as_deref() else {
                return Err(Error::ConfigFormat(format!(
                    "line {}: option outside of any section",
                    idx + 1
                )));
            };
            sections
                .entry(section.to_string())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(Self { sections })
    }

    /// Serialize back to INI text.
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for (name, options) in &self.sections {
            out.push('[');
            out.push_str(name);
            out.push_str("]\n");
            for (key, value) in options {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    pub fn section(&self, name: &str) -> Option<&SectionOptions> {
        self.sections.get(name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Merge `options` into the named section, creating it if absent.
    /// Existing keys not named in `options` are left untouched.
    pub fn merge_section<I, K, V>(&mut self, name: &str, options: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let section = self.sections.entry(name.to_string()).or_default();
        for (key, value) in options {
            section.insert(key.into(), value.into());
        }
    }

    /// Remove a section entirely. Returns `false` if it was not present.
    pub fn remove_section(&mut self, name: &str) -> bool {
        self.sections.shift_remove(name).is_some()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}
