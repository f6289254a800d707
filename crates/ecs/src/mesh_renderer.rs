use lumen_assets::AssetId;
use serde::{Deserialize, Serialize};

/// Id of a mesh registered with the renderer's asset library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub AssetId);

/// Id of a material registered with the renderer's asset library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialHandle(pub AssetId);

/// Renderable capability: draws `mesh` with `material` at the owner's world transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshRendererComponent {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
}

impl MeshRendererComponent {
    pub fn new(mesh: MeshHandle, material: MaterialHandle) -> Self {
        Self { mesh, material }
    }
}
