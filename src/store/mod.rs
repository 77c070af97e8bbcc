//! Configuration store adapter
//!
//! Reads and writes the engine's Sandboxie.ini. The file is the single source
//! of truth: every query re-reads it from disk, every mutation re-serializes
//! the whole document and writes it back. There is no locking against the
//! engine (or its control UI) editing the file concurrently; a rewrite is
//! last-writer-wins.

pub mod document;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::{Error, Result};
use document::{IniDocument, SectionOptions};

/// On-disk encoding of the engine config. Stock Sandboxie installations
/// write Sandboxie.ini as UTF-16LE with a BOM; hand-made files are usually
/// plain UTF-8. Whatever encoding is read is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IniEncoding {
    Utf8,
    Utf16Le,
}

const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];

/// Sections of Sandboxie.ini that are engine/user settings, not sandboxes.
const NON_BOX_SECTION: &str = "GlobalSettings";
const NON_BOX_PREFIX: &str = "UserSettings_";

/// Store adapter over one engine config file.
pub struct IniStore {
    path: PathBuf,
}

impl IniStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the full config document.
    pub async fn document(&self) -> Result<IniDocument> {
        Ok(self.load().await?.0)
    }

    /// Options of the named sandbox section.
    pub async fn read_sandbox_options(&self, box_name: &str) -> Result<SectionOptions> {
        let doc = self.document().await?;
        doc.section(box_name)
            .cloned()
            .ok_or_else(|| Error::SandboxNotFound(box_name.to_string()))
    }

    /// Merge `options` into the named section, creating it if absent, and
    /// persist the result immediately.
    pub async fn write_sandbox_options<I, K, V>(&self, box_name: &str, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (mut doc, encoding) = self.load().await?;
        doc.merge_section(box_name, options);
        self.save(&doc, encoding).await?;
        info!("wrote sandbox section '{}' to {}", box_name, self.path.display());
        Ok(())
    }

    /// Remove the named sandbox section entirely.
    pub async fn delete_sandbox(&self, box_name: &str) -> Result<()> {
        let (mut doc, encoding) = self.load().await?;
        if !doc.remove_section(box_name) {
            return Err(Error::SandboxNotFound(box_name.to_string()));
        }
        self.save(&doc, encoding).await?;
        info!("removed sandbox section '{}' from {}", box_name, self.path.display());
        Ok(())
    }

    /// Names of all sandbox sections, freshly read from disk. Engine-level
    /// sections (GlobalSettings, UserSettings_*) are not sandboxes and are
    /// skipped.
    pub async fn list_sandboxes(&self) -> Result<Vec<String>> {
        let doc = self.document().await?;
        Ok(doc
            .section_names()
            .filter(|name| *name != NON_BOX_SECTION && !name.starts_with(NON_BOX_PREFIX))
            .map(str::to_string)
            .collect())
    }

    async fn load(&self) -> Result<(IniDocument, IniEncoding)> {
        let bytes = fs::read(&self.path).await?;
        let (content, encoding) = decode(&bytes)?;
        debug!(
            "read {} ({} bytes, {:?})",
            self.path.display(),
            bytes.len(),
            encoding
        );
        Ok((IniDocument::parse(&content)?, encoding))
    }

    async fn save(&self, doc: &IniDocument, encoding: IniEncoding) -> Result<()> {
        let bytes = encode(&doc.to_ini_string(), encoding);
        fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<(String, IniEncoding)> {
    if bytes.starts_with(&UTF16_LE_BOM) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let content = String::from_utf16(&units)
            .map_err(|_| Error::ConfigFormat("invalid UTF-16LE content".to_string()))?;
        Ok((content, IniEncoding::Utf16Le))
    } else {
        let content = String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::ConfigFormat("invalid UTF-8 content".to_string()))?;
        Ok((content, IniEncoding::Utf8))
    }
}

fn encode(content: &str, encoding: IniEncoding) -> Vec<u8> {
    match encoding {
        IniEncoding::Utf8 => content.as_bytes().to_vec(),
        IniEncoding::Utf16Le => {
            let mut bytes = UTF16_LE_BOM.to_vec();
            for unit in content.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(content: &[u8]) -> (tempfile::TempDir, IniStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sandboxie.ini");
        std::fs::write(&path, content).unwrap();
        (dir, IniStore::new(path))
    }

    fn utf16le(content: &str) -> Vec<u8> {
        encode(content, IniEncoding::Utf16Le)
    }

    #[tokio::test]
    async fn test_create_then_read_round_trips_options() {
        let (_dir, store) = store_with(b"");
        store
            .write_sandbox_options("foo", [("Enabled", "yes"), ("AutoDelete", "no")])
            .await
            .unwrap();

        let options = store.read_sandbox_options("foo").await.unwrap();
        assert_eq!(options.get("Enabled").unwrap(), "yes");
        assert_eq!(options.get("AutoDelete").unwrap(), "no");
        assert_eq!(options.len(), 2);
    }

    #[tokio::test]
    async fn test_write_merges_into_existing_section() {
        let (_dir, store) = store_with(b"[foo]\nEnabled=no\nConfigLevel=7\n");
        store
            .write_sandbox_options("foo", [("Enabled", "yes")])
            .await
            .unwrap();

        let options = store.read_sandbox_options("foo").await.unwrap();
        assert_eq!(options.get("Enabled").unwrap(), "yes");
        assert_eq!(options.get("ConfigLevel").unwrap(), "7");
    }

    #[tokio::test]
    async fn test_read_missing_sandbox_is_not_found() {
        let (_dir, store) = store_with(b"");
        let err = store.read_sandbox_options("nope").await.unwrap_err();
        assert!(matches!(err, Error::SandboxNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_delete_missing_sandbox_is_not_found() {
        let (_dir, store) = store_with(b"[other]\nEnabled=yes\n");
        let err = store.delete_sandbox("nope").await.unwrap_err();
        assert!(matches!(err, Error::SandboxNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_keeps_other_sections() {
        let (_dir, store) = store_with(b"[a]\nEnabled=yes\n\n[b]\nEnabled=no\n");
        store.delete_sandbox("a").await.unwrap();

        assert_eq!(store.list_sandboxes().await.unwrap(), vec!["b"]);
        assert_eq!(
            store.read_sandbox_options("b").await.unwrap().get("Enabled").unwrap(),
            "no"
        );
    }

    #[tokio::test]
    async fn test_list_sandboxes_skips_engine_sections() {
        let (_dir, store) = store_with(
            b"[GlobalSettings]\nFileRootPath=C:\\Sandbox\n\n[UserSettings_0A3C9D11]\nSbieCtrl_Hide=y\n\n[A]\nEnabled=yes\n\n[B]\nEnabled=yes\n",
        );
        let boxes = store.list_sandboxes().await.unwrap();
        assert_eq!(boxes, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_utf16_config_read_and_written_back_as_utf16() {
        let (_dir, store) = store_with(&utf16le("[foo]\nEnabled=yes\n"));
        store
            .write_sandbox_options("foo", [("AutoDelete", "no")])
            .await
            .unwrap();

        let bytes = std::fs::read(store.path()).unwrap();
        assert!(bytes.starts_with(&UTF16_LE_BOM));

        let options = store.read_sandbox_options("foo").await.unwrap();
        assert_eq!(options.get("Enabled").unwrap(), "yes");
        assert_eq!(options.get("AutoDelete").unwrap(), "no");
    }

    #[test]
    fn test_document_exposes_engine_sections_too() {
        let (_dir, store) = store_with(b"[GlobalSettings]\nFileRootPath=C:\\Sandbox\n\n[A]\nEnabled=yes\n");
        let doc = tokio_test::block_on(store.document()).unwrap();
        assert!(doc.has_section("GlobalSettings"));
        assert!(doc.has_section("A"));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode(&[0x5B, 0xFF, 0x5D]).unwrap_err();
        assert!(matches!(err, Error::ConfigFormat(_)));
    }
}
