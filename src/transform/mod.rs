// src/transform/mod.rs

//! Content transforms applied between reading a source file and writing its
//! destination.
//!
//! A [`TransformSpec`] is an ordered list of [`TransformStage`]s. For every
//! file, each stage produces a fresh [`ByteTransformer`]; the resulting
//! [`Pipeline`] feeds the output of stage *n* into stage *n + 1*. An empty
//! `TransformSpec` is the identity pipeline.

pub mod builtin;

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

pub use builtin::{AppendStage, PrependStage, ReplaceStage, TransformConfig};

/// Factory for per-file transformers. Implementations must be stateless
/// across files; per-invocation configuration lives in the stage itself.
pub trait TransformStage: Send + Sync + fmt::Debug {
    fn make_transformer(&self, source: &Path) -> io::Result<Box<dyn ByteTransformer>>;
}

/// Streaming byte transformer for one file.
pub trait ByteTransformer: Send {
    /// Consume one chunk of input, appending any output to `out`.
    fn transform(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> io::Result<()>;

    /// Called once at end of input; flush buffered output into `out`.
    fn finish(&mut self, _out: &mut Vec<u8>) -> io::Result<()> {
        Ok(())
    }
}

/// Ordered list of transform stages.
#[derive(Debug, Clone, Default)]
pub struct TransformSpec {
    stages: Vec<Arc<dyn TransformStage>>,
}

impl TransformSpec {
    pub fn new(stages: Vec<Arc<dyn TransformStage>>) -> Self {
        Self { stages }
    }

    pub fn push(&mut self, stage: Arc<dyn TransformStage>) {
        self.stages.push(stage);
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Build the per-file pipeline for `source`.
    pub fn build(&self, source: &Path) -> io::Result<Pipeline> {
        let transformers = self
            .stages
            .iter()
            .map(|stage| stage.make_transformer(source))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Pipeline { transformers })
    }
}

/// Composed per-file transformer chain.
pub struct Pipeline {
    transformers: Vec<Box<dyn ByteTransformer>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.transformers.len())
            .finish()
    }
}

impl Pipeline {
    pub fn is_identity(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Push one chunk of source bytes through every stage and return the
    /// bytes to write.
    pub fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<u8>> {
        let mut data = chunk.to_vec();
        for t in &mut self.transformers {
            let mut out = Vec::new();
            t.transform(&data, &mut out)?;
            data = out;
        }
        Ok(data)
    }

    /// Finish every stage in order. Whatever stage *n* flushes is still run
    /// through stages *n + 1..* before they are finished themselves.
    pub fn finish(&mut self) -> io::Result<Vec<u8>> {
        let mut carry = Vec::new();
        for t in &mut self.transformers {
            let mut out = Vec::new();
            if !carry.is_empty() {
                t.transform(&carry, &mut out)?;
            }
            t.finish(&mut out)?;
            carry = out;
        }
        Ok(carry)
    }
}
