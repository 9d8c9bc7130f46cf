//! Built-in materializers for plain files.
//!
//! Each one reads a fixed file name inside the artifact's uri directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{Materializer, Payload};
use crate::core::artifact::ArtifactView;

/// Decodes `data.txt` into a `String`
#[derive(Debug, Clone)]
pub struct TextMaterializer {
    path: PathBuf,
}

impl TextMaterializer {
    pub const IDENTIFIER: &'static str = "builtin.text";
    pub const FILE_NAME: &'static str = "data.txt";

    pub fn new(artifact: &ArtifactView) -> Self {
        Self {
            path: PathBuf::from(artifact.uri()).join(Self::FILE_NAME),
        }
    }
}

#[async_trait]
impl Materializer for TextMaterializer {
    async fn handle_input(&self) -> Result<Payload> {
        debug!(path = %self.path.display(), "Reading text artifact");
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read text artifact: {}", self.path.display()))?;
        Ok(Payload::new(content))
    }
}

/// Decodes `data.json` into a `serde_json::Value`
#[derive(Debug, Clone)]
pub struct JsonMaterializer {
    path: PathBuf,
}

impl JsonMaterializer {
    pub const IDENTIFIER: &'static str = "builtin.json";
    pub const FILE_NAME: &'static str = "data.json";

    pub fn new(artifact: &ArtifactView) -> Self {
        Self {
            path: PathBuf::from(artifact.uri()).join(Self::FILE_NAME),
        }
    }
}

#[async_trait]
impl Materializer for JsonMaterializer {
    async fn handle_input(&self) -> Result<Payload> {
        debug!(path = %self.path.display(), "Reading json artifact");
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read json artifact: {}", self.path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse json artifact: {}", self.path.display()))?;
        Ok(Payload::new(value))
    }
}

/// Reads `data.bin` as raw bytes
#[derive(Debug, Clone)]
pub struct BytesMaterializer {
    path: PathBuf,
}

impl BytesMaterializer {
    pub const IDENTIFIER: &'static str = "builtin.bytes";
    pub const FILE_NAME: &'static str = "data.bin";

    pub fn new(artifact: &ArtifactView) -> Self {
        Self {
            path: PathBuf::from(artifact.uri()).join(Self::FILE_NAME),
        }
    }
}

#[async_trait]
impl Materializer for BytesMaterializer {
    async fn handle_input(&self) -> Result<Payload> {
        let bytes = fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read binary artifact: {}", self.path.display()))?;
        Ok(Payload::new(bytes))
    }
}
