use crate::device::{GraphicsDevice, MeshId};
use bytemuck::{Pod, Zeroable};

/// Interleaved vertex layout: position, RGBA8 color, texture coordinate, normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const WHITE: [u8; 4] = [255; 4];

    pub fn new(position: [f32; 3], tex_coord: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            color: Self::WHITE,
            tex_coord,
            normal,
        }
    }
}

/// Exclusively owned indexed triangle mesh.
#[derive(Debug)]
pub struct Mesh {
    id: MeshId,
    vertex_count: usize,
    element_count: usize,
}

impl Mesh {
    pub fn new(device: &mut dyn GraphicsDevice, vertices: &[Vertex], elements: &[u32]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let id = device.create_mesh(bytes, std::mem::size_of::<Vertex>(), elements);
        Self {
            id,
            vertex_count: vertices.len(),
            element_count: elements.len(),
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn draw(&self, device: &mut dyn GraphicsDevice) {
        device.draw_mesh(self.id);
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_mesh(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCommand, RecordingDevice};

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
    }

    #[test]
    fn upload_reports_counts_from_bytes() {
        let mut device = RecordingDevice::new();
        let verts = [
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0, 1.0]),
            Vertex::new([1.0, 0.0, 0.0], [1.0, 0.0], [0.0, 0.0, 1.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 1.0], [0.0, 0.0, 1.0]),
        ];
        let mesh = Mesh::new(&mut device, &verts, &[0, 1, 2]);
        let record = *device.mesh(mesh.id()).unwrap();
        assert_eq!(record.vertex_count, 3);
        assert_eq!(record.element_count, 3);

        mesh.draw(&mut device);
        assert_eq!(device.commands().last(), Some(&DeviceCommand::DrawMesh(mesh.id())));
        mesh.destroy(&mut device);
        assert_eq!(device.live_object_count(), 0);
    }
}
