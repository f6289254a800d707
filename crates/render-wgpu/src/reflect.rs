//! GLSL front end and uniform layout reflection.
//!
//! Programs address uniforms by GL-style names (`M`, `lights[2].color`,
//! `sky.top`). The sources declare them as members of `set = 0` uniform
//! blocks, so each name resolves to a byte range inside one block.

use std::collections::BTreeMap;

use lumen_render::UniformValue;
use lumen_render::device::ShaderStage;
use naga::front::glsl;
use naga::{AddressSpace, ArraySize, Handle, ScalarKind, Type, TypeInner, VectorSize};

/// Parse one GLSL stage into naga IR. The error is the front end's diagnostic.
pub fn parse_stage(stage: ShaderStage, source: &str) -> Result<naga::Module, String> {
    let stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    glsl::Frontend::default()
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| format!("{errors:?}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    fn of(inner: &TypeInner) -> Option<Self> {
        match *inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Float => Some(Self::Float),
                ScalarKind::Sint => Some(Self::Int),
                ScalarKind::Uint => Some(Self::UInt),
                _ => None,
            },
            TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
                match size {
                    VectorSize::Bi => Some(Self::Vec2),
                    VectorSize::Tri => Some(Self::Vec3),
                    VectorSize::Quad => Some(Self::Vec4),
                }
            }
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar.width == 4 => Some(Self::Mat4),
            _ => None,
        }
    }
}

/// Byte image of `value` when it matches `kind`; `None` on a type mismatch.
pub fn encode(kind: UniformKind, value: UniformValue) -> Option<Vec<u8>> {
    let bytes = match (kind, value) {
        (UniformKind::Float, UniformValue::Float(v)) => bytemuck::bytes_of(&v).to_vec(),
        (UniformKind::Int, UniformValue::Int(v)) => bytemuck::bytes_of(&v).to_vec(),
        (UniformKind::UInt, UniformValue::UInt(v)) => bytemuck::bytes_of(&v).to_vec(),
        (UniformKind::Vec2, UniformValue::Vec2(v)) => bytemuck::bytes_of(&v.to_array()).to_vec(),
        (UniformKind::Vec3, UniformValue::Vec3(v)) => bytemuck::bytes_of(&v.to_array()).to_vec(),
        (UniformKind::Vec4, UniformValue::Vec4(v)) => bytemuck::bytes_of(&v.to_array()).to_vec(),
        (UniformKind::Mat4, UniformValue::Mat4(m)) => bytemuck::bytes_of(&m.to_cols_array()).to_vec(),
        _ => return None,
    };
    Some(bytes)
}

/// Where a named uniform lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub binding: u32,
    pub offset: u32,
    pub kind: UniformKind,
}

/// Resources a linked program binds in group 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramLayout {
    /// Uniform block binding to block size in bytes.
    pub blocks: BTreeMap<u32, u32>,
    pub uniforms: BTreeMap<String, UniformSlot>,
    /// Texture name to binding.
    pub textures: BTreeMap<String, u32>,
    /// Sampler name to binding. `<texture>_sampler` pairs with `<texture>`.
    pub samplers: BTreeMap<String, u32>,
}

impl ProgramLayout {
    /// Merge the resources of every stage. A binding declared differently by
    /// two stages fails the link.
    pub fn reflect(stages: &[&naga::Module]) -> Result<Self, String> {
        let mut layout = Self::default();
        for module in stages {
            layout.add_module(module)?;
        }
        Ok(layout)
    }

    /// Sampler binding paired with the texture `name`.
    pub fn sampler_for(&self, texture: &str) -> Option<u32> {
        self.samplers.get(&format!("{texture}_sampler")).copied()
    }

    fn add_module(&mut self, module: &naga::Module) -> Result<(), String> {
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            let name = var.name.clone().unwrap_or_default();
            if binding.group != 0 {
                return Err(format!("'{name}' uses set {}; only set 0 is supported", binding.group));
            }
            match (var.space, &module.types[var.ty].inner) {
                (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                    if let Some(previous) = self.blocks.insert(binding.binding, *span) {
                        if previous != *span {
                            return Err(format!(
                                "uniform block at binding {} is declared with different sizes",
                                binding.binding
                            ));
                        }
                    }
                    for member in members {
                        if let Some(member_name) = &member.name {
                            self.flatten(module, member_name.clone(), member.ty, binding.binding, member.offset);
                        }
                    }
                }
                (AddressSpace::Handle, TypeInner::Image { .. }) => {
                    insert_resource(&mut self.textures, name, binding.binding)?;
                }
                (AddressSpace::Handle, TypeInner::Sampler { .. }) => {
                    insert_resource(&mut self.samplers, name, binding.binding)?;
                }
                _ => return Err(format!("unsupported resource '{name}'")),
            }
        }
        Ok(())
    }

    fn flatten(&mut self, module: &naga::Module, name: String, ty: Handle<Type>, binding: u32, offset: u32) {
        match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    if let Some(field) = &member.name {
                        let path = format!("{name}.{field}");
                        self.flatten(module, path, member.ty, binding, offset + member.offset);
                    }
                }
            }
            TypeInner::Array {
                base,
                size: ArraySize::Constant(count),
                stride,
            } => {
                for i in 0..count.get() {
                    self.flatten(module, format!("{name}[{i}]"), *base, binding, offset + i * stride);
                }
            }
            inner => match UniformKind::of(inner) {
                Some(kind) => {
                    self.uniforms.insert(name, UniformSlot { binding, offset, kind });
                }
                None => tracing::debug!(uniform = %name, "uniform type not settable"),
            },
        }
    }
}

fn insert_resource(map: &mut BTreeMap<String, u32>, name: String, binding: u32) -> Result<(), String> {
    match map.insert(name.clone(), binding) {
        Some(previous) if previous != binding => {
            Err(format!("'{name}' is bound at {previous} and {binding} in different stages"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use lumen_render::shaders;

    fn layout(vertex: &str, fragment: &str) -> ProgramLayout {
        let vertex = parse_stage(ShaderStage::Vertex, vertex).unwrap();
        let fragment = parse_stage(ShaderStage::Fragment, fragment).unwrap();
        ProgramLayout::reflect(&[&vertex, &fragment]).unwrap()
    }

    #[test]
    fn textured_program_layout() {
        let layout = layout(shaders::TEXTURED_VERT, shaders::TEXTURED_FRAG);
        assert_eq!(
            layout.uniforms["transform"],
            UniformSlot {
                binding: 0,
                offset: 0,
                kind: UniformKind::Mat4
            }
        );
        assert_eq!(layout.uniforms["tint"].binding, 1);
        assert_eq!(layout.uniforms["tint"].kind, UniformKind::Vec4);
        assert_eq!(layout.uniforms["alphaThreshold"].offset, 16);
        assert_eq!(layout.textures.get("tex"), Some(&2));
        assert_eq!(layout.sampler_for("tex"), Some(3));
        assert_eq!(layout.blocks.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn lit_program_flattens_light_array_and_sky() {
        let layout = layout(shaders::LIT_VERT, shaders::LIT_FRAG);
        assert_eq!(layout.uniforms["M_IT"].offset, 64);
        assert_eq!(layout.uniforms["VP"].offset, 128);
        assert_eq!(layout.uniforms["light_count"].kind, UniformKind::Int);
        assert_eq!(layout.uniforms["lights[0].type"].kind, UniformKind::Int);
        assert_eq!(layout.uniforms["lights[7].cone_angles"].kind, UniformKind::Vec2);
        assert_eq!(layout.uniforms["sky.horizon"].kind, UniformKind::Vec3);
        assert_eq!(layout.uniforms["camera_position"].kind, UniformKind::Vec3);

        let first = layout.uniforms["lights[0].color"].offset;
        let second = layout.uniforms["lights[1].color"].offset;
        assert!(second > first);
        assert!(!layout.uniforms.contains_key("lights[8].color"));
    }

    #[test]
    fn fullscreen_program_has_no_uniform_blocks() {
        let layout = layout(shaders::FULLSCREEN_VERT, shaders::GRAYSCALE_FRAG);
        assert!(layout.blocks.is_empty());
        assert!(layout.uniforms.is_empty());
        assert_eq!(layout.textures.get("tex"), Some(&2));
    }

    #[test]
    fn malformed_source_reports_an_error() {
        assert!(parse_stage(ShaderStage::Fragment, "#version 450\nvoid main( {").is_err());
    }

    #[test]
    fn conflicting_bindings_fail_the_link() {
        let vertex = parse_stage(ShaderStage::Vertex, shaders::TEXTURED_VERT).unwrap();
        let fragment = parse_stage(
            ShaderStage::Fragment,
            "#version 450\n\
             layout(set = 0, binding = 5) uniform texture2D tex;\n\
             layout(location = 0) out vec4 frag_color;\n\
             void main() { frag_color = vec4(1.0); }\n",
        )
        .unwrap();
        let textured = parse_stage(ShaderStage::Fragment, shaders::TEXTURED_FRAG).unwrap();
        assert!(ProgramLayout::reflect(&[&vertex, &textured, &fragment]).is_err());
    }

    #[test]
    fn encode_checks_the_declared_type() {
        assert_eq!(encode(UniformKind::Float, 2.0f32.into()), Some(2.0f32.to_ne_bytes().to_vec()));
        assert_eq!(encode(UniformKind::Float, 2i32.into()), None);
        assert_eq!(encode(UniformKind::Vec3, Vec3::X.into()).map(|b| b.len()), Some(12));
        assert_eq!(encode(UniformKind::Mat4, Mat4::IDENTITY.into()).map(|b| b.len()), Some(64));
    }
}
