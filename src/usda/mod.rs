//! Text format (`.usda`) reader.

mod parser;
pub mod token;

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::sdf;

pub use parser::{Parser, SourceLocation};

/// Magic bytes that open a binary crate file.
const CRATE_MAGIC: &[u8] = b"PXR-USDC";

/// Parsed specs of a single text layer.
#[derive(Debug, Default)]
pub struct TextReader {
    specs: HashMap<sdf::Path, sdf::Spec>,
}

impl TextReader {
    /// Read and parse a text layer from disk.
    ///
    /// Binary crate files are refused even when named `.usd`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
        if bytes.starts_with(CRATE_MAGIC) {
            bail!("{} is a binary crate file, only text layers are supported", path.display());
        }

        let text = String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path.display()))?;
        Self::from_str(&text).with_context(|| format!("Unable to parse {}", path.display()))
    }

    /// Parse layer text, attaching the failing line to any parse error.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(data: &str) -> Result<Self> {
        let mut parser = Parser::new(data);
        match parser.parse() {
            Ok(specs) => Ok(TextReader { specs }),
            Err(err) => match parser.last_location() {
                Some(location) => Err(err.context(format!("Parse error at {location}"))),
                None => Err(err),
            },
        }
    }

    pub fn specs(&self) -> &HashMap<sdf::Path, sdf::Spec> {
        &self.specs
    }

    pub fn into_specs(self) -> HashMap<sdf::Path, sdf::Spec> {
        self.specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_crate_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.usd");
        fs::write(&path, b"PXR-USDC\x00\x00\x00\x00").unwrap();

        let err = TextReader::read(&path).unwrap_err();
        assert!(err.to_string().contains("binary crate"));
    }

    #[test]
    fn parse_errors_carry_location() {
        let err = TextReader::from_str("#usda 1.0\ndef \"A\" {\n  ] \n}\n").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 3"), "{message}");
    }

    #[test]
    fn reads_text_layer_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.usda");
        fs::write(&path, "#usda 1.0\n\ndef \"A\" {}\n").unwrap();

        let reader = TextReader::read(&path).unwrap();
        assert!(reader.specs().contains_key(&sdf::path("/A").unwrap()));
    }
}
