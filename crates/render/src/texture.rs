use crate::config::RenderError;
use crate::device::{GraphicsDevice, TextureFormat, TextureId};
use lumen_common::ViewportSize;

/// Decoded RGBA8 pixels, rows bottom-up as GL expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::InvalidImage {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Single-color image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, RenderError> {
        let count = width as usize * height as usize;
        Self::new(width, height, rgba.repeat(count))
    }

    /// Two-color checkerboard with `cell` pixel squares.
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Result<Self, RenderError> {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&color);
            }
        }
        Self::new(size, size, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Exclusively owned 2D texture.
#[derive(Debug)]
pub struct Texture2D {
    id: TextureId,
    format: TextureFormat,
    size: ViewportSize,
    levels: u32,
}

impl Texture2D {
    /// Allocate storage without pixel data, e.g. for render targets.
    pub fn empty(device: &mut dyn GraphicsDevice, format: TextureFormat, size: ViewportSize, levels: u32) -> Self {
        let id = device.create_texture();
        let levels = levels.max(1);
        device.texture_storage(id, format, levels, size.width, size.height);
        Self {
            id,
            format,
            size,
            levels,
        }
    }

    pub fn from_image(device: &mut dyn GraphicsDevice, image: &ImageData, generate_mipmap: bool) -> Self {
        let id = device.create_texture();
        let size = ViewportSize::new(image.width, image.height);
        device.texture_image(id, TextureFormat::Rgba8, size.width, size.height, Some(image.pixels()));
        let levels = if generate_mipmap {
            device.generate_mipmap(id);
            size.mip_levels()
        } else {
            1
        };
        Self {
            id,
            format: TextureFormat::Rgba8,
            size,
            levels,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice, unit: u32) {
        device.bind_texture(unit, Some(self.id));
    }

    pub fn unbind(device: &mut dyn GraphicsDevice, unit: u32) {
        device.bind_texture(unit, None);
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_texture(self.id);
    }
}
