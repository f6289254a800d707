use crate::device::GraphicsDevice;
use crate::material::{Material, MaterialDescriptor};
use crate::mesh::Mesh;
use crate::sampler::Sampler;
use crate::shader::ShaderProgram;
use crate::texture::Texture2D;
use lumen_assets::{AssetError, AssetId, AssetStore};
use lumen_ecs::{MaterialHandle, MeshHandle};

/// Name-keyed owner of every shared GPU resource a scene refers to.
///
/// Materials reference programs, textures and samplers by device name. The
/// stores are read-only from outside so removal always goes through the
/// library, which refuses to destroy anything a material still references.
#[derive(Debug, Default)]
pub struct AssetLibrary {
    shaders: AssetStore<ShaderProgram>,
    textures: AssetStore<Texture2D>,
    samplers: AssetStore<Sampler>,
    meshes: AssetStore<Mesh>,
    materials: AssetStore<Material>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shaders(&self) -> &AssetStore<ShaderProgram> {
        &self.shaders
    }

    pub fn textures(&self) -> &AssetStore<Texture2D> {
        &self.textures
    }

    pub fn samplers(&self) -> &AssetStore<Sampler> {
        &self.samplers
    }

    pub fn meshes(&self) -> &AssetStore<Mesh> {
        &self.meshes
    }

    pub fn materials(&self) -> &AssetStore<Material> {
        &self.materials
    }

    pub fn add_shader(&mut self, name: impl Into<String>, program: ShaderProgram) -> Result<AssetId, AssetError> {
        self.shaders.insert(name, program)
    }

    pub fn add_texture(&mut self, name: impl Into<String>, texture: Texture2D) -> Result<AssetId, AssetError> {
        self.textures.insert(name, texture)
    }

    pub fn add_sampler(&mut self, name: impl Into<String>, sampler: Sampler) -> Result<AssetId, AssetError> {
        self.samplers.insert(name, sampler)
    }

    pub fn add_mesh(&mut self, name: impl Into<String>, mesh: Mesh) -> Result<MeshHandle, AssetError> {
        self.meshes.insert(name, mesh).map(MeshHandle)
    }

    pub fn add_material(&mut self, name: impl Into<String>, material: Material) -> Result<MaterialHandle, AssetError> {
        self.materials.insert(name, material).map(MaterialHandle)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.0)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)
    }

    pub fn mesh_handle(&self, name: &str) -> Option<MeshHandle> {
        self.meshes.id_of(name).map(MeshHandle)
    }

    pub fn material_handle(&self, name: &str) -> Option<MaterialHandle> {
        self.materials.id_of(name).map(MaterialHandle)
    }

    /// Destroy the named program. Fails while a material draws with it.
    pub fn remove_shader(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> Result<(), AssetError> {
        let id = self.shaders.require(name)?;
        let program = lookup(&self.shaders, name)?.id();
        self.ensure_unused(name, |material| material.program == program)?;
        if let Some(shader) = self.shaders.remove(id) {
            shader.destroy(device);
        }
        Ok(())
    }

    /// Destroy the named texture. Fails while a material binds it.
    pub fn remove_texture(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> Result<(), AssetError> {
        let id = self.textures.require(name)?;
        let texture = lookup(&self.textures, name)?.id();
        self.ensure_unused(name, |material| material.uses_texture(texture))?;
        if let Some(texture) = self.textures.remove(id) {
            texture.destroy(device);
        }
        Ok(())
    }

    /// Destroy the named sampler. Fails while a material binds it.
    pub fn remove_sampler(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> Result<(), AssetError> {
        let id = self.samplers.require(name)?;
        let sampler = lookup(&self.samplers, name)?.id();
        self.ensure_unused(name, |material| material.uses_sampler(sampler))?;
        if let Some(sampler) = self.samplers.remove(id) {
            sampler.destroy(device);
        }
        Ok(())
    }

    /// Destroy the named mesh. Renderers still holding its handle skip it.
    pub fn remove_mesh(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> Result<(), AssetError> {
        let id = self.meshes.require(name)?;
        if let Some(mesh) = self.meshes.remove(id) {
            mesh.destroy(device);
        }
        Ok(())
    }

    /// Drop the named material. Renderers still holding its handle skip it.
    pub fn remove_material(&mut self, name: &str) -> Result<Material, AssetError> {
        let id = self.materials.require(name)?;
        self.materials
            .remove(id)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    fn ensure_unused(&self, name: &str, uses: impl Fn(&Material) -> bool) -> Result<(), AssetError> {
        match self.materials.iter().find(|(_, _, material)| uses(*material)) {
            Some((_, user, _)) => Err(AssetError::InUse {
                name: name.to_string(),
                user: user.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Resolve a material description against the shaders, textures and
    /// samplers already in the library. Unnamed textures or samplers stay unset.
    pub fn build_material(&self, descriptor: &MaterialDescriptor) -> Result<Material, AssetError> {
        let program = lookup(&self.shaders, descriptor.shader())?.id();
        let material = match descriptor {
            MaterialDescriptor::Material {
                pipeline_state,
                transparent,
                ..
            } => Material::new(program)
                .with_pipeline_state(*pipeline_state)
                .with_transparency(*transparent),
            MaterialDescriptor::Tinted {
                pipeline_state,
                transparent,
                tint,
                ..
            } => Material::tinted(program, *tint)
                .with_pipeline_state(*pipeline_state)
                .with_transparency(*transparent),
            MaterialDescriptor::Textured {
                pipeline_state,
                transparent,
                tint,
                alpha_threshold,
                texture,
                sampler,
                ..
            } => {
                let texture = texture
                    .as_deref()
                    .map(|name| lookup(&self.textures, name).map(Texture2D::id))
                    .transpose()?;
                let sampler = sampler
                    .as_deref()
                    .map(|name| lookup(&self.samplers, name).map(Sampler::id))
                    .transpose()?;
                Material::textured(program, *tint, *alpha_threshold, texture, sampler)
                    .with_pipeline_state(*pipeline_state)
                    .with_transparency(*transparent)
            }
        };
        Ok(material)
    }

    /// Destroy every owned GPU resource and empty the library.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        let released = self.shaders.len() + self.textures.len() + self.samplers.len() + self.meshes.len();
        // Materials hold no GPU objects of their own.
        let _ = self.materials.drain();
        for (_, mesh) in self.meshes.drain() {
            mesh.destroy(device);
        }
        for (_, sampler) in self.samplers.drain() {
            sampler.destroy(device);
        }
        for (_, texture) in self.textures.drain() {
            texture.destroy(device);
        }
        for (_, shader) in self.shaders.drain() {
            shader.destroy(device);
        }
        tracing::debug!(released, "asset library cleared");
    }
}

fn lookup<'a, T>(store: &'a AssetStore<T>, name: &str) -> Result<&'a T, AssetError> {
    store
        .get_by_name(name)
        .ok_or_else(|| AssetError::NotFound(name.to_string()))
}
