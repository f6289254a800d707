use crate::device::{GraphicsDevice, ProgramId, ShaderStage, UniformValue};
use crate::source::AssetSource;

/// Exclusively owned shader program.
///
/// Compile and link failures go to the log and are reported as `false`; the
/// program object stays valid either way and must still be destroyed.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
}

impl ShaderProgram {
    pub fn new(device: &mut dyn GraphicsDevice) -> Self {
        Self {
            id: device.create_program(),
        }
    }

    /// Build a program from a vertex and a fragment source looked up by path.
    /// Returns the program even if a stage failed; the bool says whether it linked.
    pub fn from_paths(
        device: &mut dyn GraphicsDevice,
        source: &dyn AssetSource,
        vertex_path: &str,
        fragment_path: &str,
    ) -> (Self, bool) {
        let program = Self::new(device);
        let vertex = program.attach_path(device, source, vertex_path, ShaderStage::Vertex);
        let fragment = program.attach_path(device, source, fragment_path, ShaderStage::Fragment);
        let linked = vertex && fragment && program.link(device);
        (program, linked)
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn attach(&self, device: &mut dyn GraphicsDevice, source: &str, stage: ShaderStage) -> bool {
        match device.compile_and_attach(self.id, stage, source) {
            Ok(()) => true,
            Err(log) => {
                tracing::error!(program = self.id.0, ?stage, %log, "shader compilation failed");
                false
            }
        }
    }

    /// Attach the stage stored under `path` in `source`.
    pub fn attach_path(
        &self,
        device: &mut dyn GraphicsDevice,
        source: &dyn AssetSource,
        path: &str,
        stage: ShaderStage,
    ) -> bool {
        match source.shader_source(path) {
            Some(text) => {
                let ok = self.attach(device, &text, stage);
                if !ok {
                    tracing::error!(path, "error in shader");
                }
                ok
            }
            None => {
                tracing::error!(path, "couldn't open shader source");
                false
            }
        }
    }

    pub fn link(&self, device: &mut dyn GraphicsDevice) -> bool {
        match device.link_program(self.id) {
            Ok(()) => true,
            Err(log) => {
                tracing::error!(program = self.id.0, %log, "shader link failed");
                false
            }
        }
    }

    pub fn use_program(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(self.id);
    }

    pub fn set(&self, device: &mut dyn GraphicsDevice, name: &str, value: impl Into<UniformValue>) {
        device.set_uniform(self.id, name, value.into());
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_program(self.id);
    }
}
