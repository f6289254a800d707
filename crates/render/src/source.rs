use crate::shaders;
use crate::texture::ImageData;
use std::collections::BTreeMap;

/// Resolves asset paths to shader text and decoded images.
///
/// File systems, archives and image decoders live behind this trait; the
/// renderer only ever asks for already-loaded data.
pub trait AssetSource {
    fn shader_source(&self, path: &str) -> Option<String>;
    fn image(&self, path: &str) -> Option<ImageData>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetSource {
    shaders: BTreeMap<String, String>,
    images: BTreeMap<String, ImageData>,
}

impl InMemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source holding every built-in shader under its standard path.
    pub fn with_builtin_shaders() -> Self {
        let mut source = Self::new();
        for (path, text) in shaders::BUILTIN {
            source.insert_shader(path, text);
        }
        source
    }

    pub fn insert_shader(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.shaders.insert(path.into(), text.into());
    }

    pub fn insert_image(&mut self, path: impl Into<String>, image: ImageData) {
        self.images.insert(path.into(), image);
    }

    pub fn shader_paths(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(String::as_str)
    }
}

impl AssetSource for InMemoryAssetSource {
    fn shader_source(&self, path: &str) -> Option<String> {
        self.shaders.get(path).cloned()
    }

    fn image(&self, path: &str) -> Option<ImageData> {
        self.images.get(path).cloned()
    }
}
