use lumen_assets::AssetError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from loading renderer inputs.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid renderer config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("image {width}x{height} does not match {len} bytes of RGBA8 data")]
    InvalidImage { width: u32, height: u32, len: usize },
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Optional passes, keyed the way application config files name them.
///
/// `sky` is the path of the sky texture; `postprocess` the path of the
/// post-process fragment shader. An absent key disables the pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sky: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postprocess: Option<String>,
}

impl RendererConfig {
    pub fn from_json(text: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn with_sky(mut self, path: impl Into<String>) -> Self {
        self.sky = Some(path.into());
        self
    }

    pub fn with_postprocess(mut self, path: impl Into<String>) -> Self {
        self.postprocess = Some(path.into());
        self
    }
}
