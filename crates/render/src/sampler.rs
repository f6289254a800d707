use crate::device::{GraphicsDevice, SamplerId, SamplerParameter, TextureFilter, TextureWrap};
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Serializable sampler settings, as written in material documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SamplerDescriptor {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub max_anisotropy: Option<f32>,
    pub border_color: Option<Vec4>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
            max_anisotropy: None,
            border_color: None,
        }
    }
}

impl SamplerDescriptor {
    pub fn linear(wrap_s: TextureWrap, wrap_t: TextureWrap) -> Self {
        Self {
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            wrap_s,
            wrap_t,
            ..Self::default()
        }
    }

    pub fn parameters(&self) -> Vec<SamplerParameter> {
        let mut params = vec![
            SamplerParameter::MinFilter(self.min_filter),
            SamplerParameter::MagFilter(self.mag_filter),
            SamplerParameter::WrapS(self.wrap_s),
            SamplerParameter::WrapT(self.wrap_t),
        ];
        if let Some(anisotropy) = self.max_anisotropy {
            params.push(SamplerParameter::MaxAnisotropy(anisotropy));
        }
        if let Some(color) = self.border_color {
            params.push(SamplerParameter::BorderColor(color));
        }
        params
    }
}

/// Exclusively owned sampler object.
#[derive(Debug)]
pub struct Sampler {
    id: SamplerId,
}

impl Sampler {
    pub fn new(device: &mut dyn GraphicsDevice) -> Self {
        Self {
            id: device.create_sampler(),
        }
    }

    pub fn from_descriptor(device: &mut dyn GraphicsDevice, descriptor: &SamplerDescriptor) -> Self {
        let sampler = Self::new(device);
        for parameter in descriptor.parameters() {
            sampler.set(device, parameter);
        }
        sampler
    }

    pub fn id(&self) -> SamplerId {
        self.id
    }

    pub fn set(&self, device: &mut dyn GraphicsDevice, parameter: SamplerParameter) {
        device.sampler_parameter(self.id, parameter);
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice, unit: u32) {
        device.bind_sampler(unit, Some(self.id));
    }

    pub fn unbind(device: &mut dyn GraphicsDevice, unit: u32) {
        device.bind_sampler(unit, None);
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_sampler(self.id);
    }
}
