// src/transform/builtin.rs

//! Transform stages that can be declared in the config file.
//!
//! ```toml
//! [[mirror.site.transform]]
//! kind = "replace"
//! pattern = "__VERSION__"
//! replacement = "1.2.3"
//!
//! [[mirror.site.transform]]
//! kind = "prepend"
//! text = "/* generated */\n"
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use regex::bytes::Regex;
use serde::Deserialize;

use super::{ByteTransformer, TransformStage};
use crate::errors::{MirrorError, Result};

/// Declarative transform stage as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformConfig {
    /// Regex replace over the whole file (`$1`-style captures allowed).
    Replace { pattern: String, replacement: String },
    /// Emit `text` before the file contents.
    Prepend { text: String },
    /// Emit `text` after the file contents.
    Append { text: String },
}

impl TransformConfig {
    /// Compile this declaration into a stage.
    pub fn build(&self) -> Result<Arc<dyn TransformStage>> {
        let stage: Arc<dyn TransformStage> = match self {
            TransformConfig::Replace {
                pattern,
                replacement,
            } => Arc::new(ReplaceStage::new(pattern, replacement)?),
            TransformConfig::Prepend { text } => Arc::new(PrependStage::new(text.clone())),
            TransformConfig::Append { text } => Arc::new(AppendStage::new(text.clone())),
        };
        Ok(stage)
    }
}

/// Regex replacement. Buffers the whole file so matches may span chunks.
#[derive(Debug, Clone)]
pub struct ReplaceStage {
    regex: Regex,
    replacement: Vec<u8>,
}

impl ReplaceStage {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            MirrorError::ConfigError(format!("invalid replace pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            regex,
            replacement: replacement.as_bytes().to_vec(),
        })
    }
}

impl TransformStage for ReplaceStage {
    fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
        Ok(Box::new(ReplaceTransformer {
            regex: self.regex.clone(),
            replacement: self.replacement.clone(),
            buffer: Vec::new(),
        }))
    }
}

struct ReplaceTransformer {
    regex: Regex,
    replacement: Vec<u8>,
    buffer: Vec<u8>,
}

impl ByteTransformer for ReplaceTransformer {
    fn transform(&mut self, chunk: &[u8], _out: &mut Vec<u8>) -> io::Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        let replaced = self
            .regex
            .replace_all(&self.buffer, self.replacement.as_slice());
        out.extend_from_slice(&replaced);
        self.buffer.clear();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PrependStage {
    text: Arc<str>,
}

impl PrependStage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
        }
    }
}

impl TransformStage for PrependStage {
    fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
        Ok(Box::new(PrependTransformer {
            text: Arc::clone(&self.text),
            emitted: false,
        }))
    }
}

struct PrependTransformer {
    text: Arc<str>,
    emitted: bool,
}

impl PrependTransformer {
    fn emit_once(&mut self, out: &mut Vec<u8>) {
        if !self.emitted {
            out.extend_from_slice(self.text.as_bytes());
            self.emitted = true;
        }
    }
}

impl ByteTransformer for PrependTransformer {
    fn transform(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        self.emit_once(out);
        out.extend_from_slice(chunk);
        Ok(())
    }

    // Empty files still get the prefix.
    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.emit_once(out);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppendStage {
    text: Arc<str>,
}

impl AppendStage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
        }
    }
}

impl TransformStage for AppendStage {
    fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
        Ok(Box::new(AppendTransformer {
            text: Arc::clone(&self.text),
        }))
    }
}

struct AppendTransformer {
    text: Arc<str>,
}

impl ByteTransformer for AppendTransformer {
    fn transform(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(chunk);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(self.text.as_bytes());
        Ok(())
    }
}
