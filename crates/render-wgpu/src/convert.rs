//! GL-style device enums to their wgpu counterparts.

use glam::Vec4;
use lumen_render::device::{
    BlendEquation, BlendFactor, CompareFunction, Face, SamplerParameter, TextureFilter, TextureFormat,
    TextureWrap, Winding,
};

pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Depth24 => wgpu::TextureFormat::Depth24Plus,
    }
}

pub fn compare(function: CompareFunction) -> wgpu::CompareFunction {
    match function {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::Lequal => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::Notequal => wgpu::CompareFunction::NotEqual,
        CompareFunction::Gequal => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

/// wgpu has a single blend constant, so the alpha-constant factors read it too.
pub fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
    }
}

/// Min and max ignore the factors in GL; wgpu requires them to be `One`.
pub fn blend_component(equation: BlendEquation, source: BlendFactor, destination: BlendFactor) -> wgpu::BlendComponent {
    let operation = match equation {
        BlendEquation::FuncAdd => wgpu::BlendOperation::Add,
        BlendEquation::FuncSubtract => wgpu::BlendOperation::Subtract,
        BlendEquation::FuncReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendEquation::Min => wgpu::BlendOperation::Min,
        BlendEquation::Max => wgpu::BlendOperation::Max,
    };
    match equation {
        BlendEquation::Min | BlendEquation::Max => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        },
        _ => wgpu::BlendComponent {
            src_factor: blend_factor(source),
            dst_factor: blend_factor(destination),
            operation,
        },
    }
}

pub fn front_face(winding: Winding) -> wgpu::FrontFace {
    match winding {
        Winding::Ccw => wgpu::FrontFace::Ccw,
        Winding::Cw => wgpu::FrontFace::Cw,
    }
}

/// `None` for `FrontAndBack`: wgpu cannot cull both, the caller skips the draw.
pub fn cull_mode(face: Face) -> Option<wgpu::Face> {
    match face {
        Face::Front => Some(wgpu::Face::Front),
        Face::Back => Some(wgpu::Face::Back),
        Face::FrontAndBack => None,
    }
}

pub fn color_writes(mask: [bool; 4]) -> wgpu::ColorWrites {
    let channels = [
        wgpu::ColorWrites::RED,
        wgpu::ColorWrites::GREEN,
        wgpu::ColorWrites::BLUE,
        wgpu::ColorWrites::ALPHA,
    ];
    mask.iter()
        .zip(channels)
        .filter(|(enabled, _)| **enabled)
        .fold(wgpu::ColorWrites::empty(), |writes, (_, channel)| writes | channel)
}

pub fn color(value: Vec4) -> wgpu::Color {
    wgpu::Color {
        r: value.x as f64,
        g: value.y as f64,
        b: value.z as f64,
        a: value.w as f64,
    }
}

fn address_mode(wrap: TextureWrap, border_supported: bool) -> wgpu::AddressMode {
    match wrap {
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
        TextureWrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        TextureWrap::ClampToBorder if border_supported => wgpu::AddressMode::ClampToBorder,
        TextureWrap::ClampToBorder => wgpu::AddressMode::ClampToEdge,
    }
}

/// Texel filter plus the mip filter, if the GL filter samples mip levels.
fn filters(filter: TextureFilter) -> (wgpu::FilterMode, Option<wgpu::FilterMode>) {
    use wgpu::FilterMode::{Linear, Nearest};
    match filter {
        TextureFilter::Nearest => (Nearest, None),
        TextureFilter::Linear => (Linear, None),
        TextureFilter::NearestMipmapNearest => (Nearest, Some(Nearest)),
        TextureFilter::LinearMipmapNearest => (Linear, Some(Nearest)),
        TextureFilter::NearestMipmapLinear => (Nearest, Some(Linear)),
        TextureFilter::LinearMipmapLinear => (Linear, Some(Linear)),
    }
}

/// Only the three fixed border colors exist; pick the closest.
fn border_color(color: Vec4) -> wgpu::SamplerBorderColor {
    if color.w < 0.5 {
        wgpu::SamplerBorderColor::TransparentBlack
    } else if color.truncate().element_sum() > 1.5 {
        wgpu::SamplerBorderColor::OpaqueWhite
    } else {
        wgpu::SamplerBorderColor::OpaqueBlack
    }
}

/// Accumulated sampler parameters, starting from GL defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerParams {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub max_anisotropy: f32,
    pub border: Vec4,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            min_filter: TextureFilter::NearestMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
            max_anisotropy: 1.0,
            border: Vec4::ZERO,
        }
    }
}

impl SamplerParams {
    pub fn apply(&mut self, parameter: SamplerParameter) {
        match parameter {
            SamplerParameter::MinFilter(filter) => self.min_filter = filter,
            SamplerParameter::MagFilter(filter) => self.mag_filter = filter,
            SamplerParameter::WrapS(wrap) => self.wrap_s = wrap,
            SamplerParameter::WrapT(wrap) => self.wrap_t = wrap,
            SamplerParameter::MaxAnisotropy(value) => self.max_anisotropy = value,
            SamplerParameter::BorderColor(color) => self.border = color,
        }
    }

    /// Without mip filtering only level 0 is sampled. Anisotropy applies only
    /// when every filter is linear; wgpu rejects it otherwise.
    pub fn descriptor(&self, border_supported: bool) -> wgpu::SamplerDescriptor<'static> {
        let (min_filter, mip_filter) = filters(self.min_filter);
        let (mag_filter, _) = filters(self.mag_filter);
        let address_mode_u = address_mode(self.wrap_s, border_supported);
        let address_mode_v = address_mode(self.wrap_t, border_supported);
        let all_linear = min_filter == wgpu::FilterMode::Linear
            && mag_filter == wgpu::FilterMode::Linear
            && mip_filter == Some(wgpu::FilterMode::Linear);
        let anisotropy_clamp = if all_linear {
            self.max_anisotropy.clamp(1.0, 16.0) as u16
        } else {
            1
        };
        let uses_border = [address_mode_u, address_mode_v].contains(&wgpu::AddressMode::ClampToBorder);
        wgpu::SamplerDescriptor {
            label: Some("lumen sampler"),
            address_mode_u,
            address_mode_v,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter,
            min_filter,
            mipmap_filter: mip_filter.unwrap_or(wgpu::FilterMode::Nearest),
            lod_min_clamp: 0.0,
            lod_max_clamp: if mip_filter.is_some() { 32.0 } else { 0.0 },
            compare: None,
            anisotropy_clamp,
            border_color: uses_border.then(|| border_color(self.border)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lequal_maps_to_less_equal() {
        assert_eq!(compare(CompareFunction::Lequal), wgpu::CompareFunction::LessEqual);
        assert_eq!(compare(CompareFunction::Notequal), wgpu::CompareFunction::NotEqual);
    }

    #[test]
    fn min_max_blending_forces_unit_factors() {
        let component = blend_component(BlendEquation::Max, BlendFactor::SrcAlpha, BlendFactor::Zero);
        assert_eq!(component.src_factor, wgpu::BlendFactor::One);
        assert_eq!(component.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(component.operation, wgpu::BlendOperation::Max);

        let alpha = blend_component(BlendEquation::FuncAdd, BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(alpha.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(alpha.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn color_mask_selects_channels() {
        assert_eq!(color_writes([true; 4]), wgpu::ColorWrites::ALL);
        assert_eq!(color_writes([false; 4]), wgpu::ColorWrites::empty());
        assert_eq!(
            color_writes([true, false, false, true]),
            wgpu::ColorWrites::RED | wgpu::ColorWrites::ALPHA
        );
    }

    #[test]
    fn both_faces_have_no_cull_mode() {
        assert_eq!(cull_mode(Face::Back), Some(wgpu::Face::Back));
        assert_eq!(cull_mode(Face::FrontAndBack), None);
    }

    #[test]
    fn trilinear_sampler_keeps_anisotropy() {
        let mut params = SamplerParams::default();
        params.apply(SamplerParameter::MinFilter(TextureFilter::LinearMipmapLinear));
        params.apply(SamplerParameter::MaxAnisotropy(8.0));
        let descriptor = params.descriptor(false);
        assert_eq!(descriptor.anisotropy_clamp, 8);
        assert_eq!(descriptor.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.lod_max_clamp, 32.0);
    }

    #[test]
    fn nearest_sampler_drops_anisotropy_and_mips() {
        let mut params = SamplerParams::default();
        params.apply(SamplerParameter::MinFilter(TextureFilter::Nearest));
        params.apply(SamplerParameter::MaxAnisotropy(16.0));
        let descriptor = params.descriptor(false);
        assert_eq!(descriptor.anisotropy_clamp, 1);
        assert_eq!(descriptor.lod_max_clamp, 0.0);
    }

    #[test]
    fn border_clamp_falls_back_to_edge_without_the_feature() {
        let mut params = SamplerParams::default();
        params.apply(SamplerParameter::WrapS(TextureWrap::ClampToBorder));
        params.apply(SamplerParameter::BorderColor(Vec4::ONE));

        let fallback = params.descriptor(false);
        assert_eq!(fallback.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(fallback.border_color, None);

        let border = params.descriptor(true);
        assert_eq!(border.address_mode_u, wgpu::AddressMode::ClampToBorder);
        assert_eq!(border.border_color, Some(wgpu::SamplerBorderColor::OpaqueWhite));
    }
}
