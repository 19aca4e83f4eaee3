//! Transform stages for exercising the pipeline in tests.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use globmirror::transform::{ByteTransformer, TransformStage};

/// Upper-cases ASCII bytes.
#[derive(Debug, Default)]
pub struct UpperStage;

impl TransformStage for UpperStage {
    fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
        Ok(Box::new(Upper))
    }
}

struct Upper;

impl ByteTransformer for Upper {
    fn transform(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        out.extend(chunk.iter().map(u8::to_ascii_uppercase));
        Ok(())
    }
}

/// Pass-through stage that counts how many files it was built for.
#[derive(Debug, Clone, Default)]
pub struct CountingStage {
    builds: Arc<AtomicUsize>,
}

impl CountingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl TransformStage for CountingStage {
    fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(PassThrough))
    }
}

struct PassThrough;

impl ByteTransformer for PassThrough {
    fn transform(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(chunk);
        Ok(())
    }
}

/// Fails for any file whose name contains `needle`; passes others through.
#[derive(Debug, Clone)]
pub struct FailingStage {
    needle: String,
}

impl FailingStage {
    pub fn for_names_containing(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl TransformStage for FailingStage {
    fn make_transformer(&self, source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
        let hit = source
            .file_name()
            .map(|n| n.to_string_lossy().contains(&self.needle))
            .unwrap_or(false);
        if hit {
            Ok(Box::new(FailMidStream))
        } else {
            Ok(Box::new(PassThrough))
        }
    }
}

struct FailMidStream;

impl ByteTransformer for FailMidStream {
    fn transform(&mut self, _chunk: &[u8], _out: &mut Vec<u8>) -> io::Result<()> {
        Err(io::Error::other("refusing to transform this file"))
    }
}
