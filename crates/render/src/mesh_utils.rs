//! Procedural meshes. All faces wind counter-clockwise seen from outside.

use crate::device::GraphicsDevice;
use crate::mesh::{Mesh, Vertex};
use glam::{UVec2, Vec3};
use std::f32::consts::{PI, TAU};

/// UV sphere of radius 1 with `segments.x` slices around and `segments.y` stacks.
pub fn sphere_geometry(segments: UVec2) -> (Vec<Vertex>, Vec<u32>) {
    let cols = segments.x.max(3);
    let rows = segments.y.max(2);
    let mut vertices = Vec::with_capacity(((cols + 1) * (rows + 1)) as usize);
    for i in 0..=rows {
        let v = i as f32 / rows as f32;
        let pitch = v * PI - PI / 2.0;
        for j in 0..=cols {
            let u = j as f32 / cols as f32;
            let yaw = u * TAU;
            let normal = Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), -pitch.cos() * yaw.sin());
            vertices.push(Vertex::new(normal.to_array(), [u, v], normal.to_array()));
        }
    }

    let mut elements = Vec::with_capacity((cols * rows * 6) as usize);
    for i in 0..rows {
        for j in 0..cols {
            let bottom_left = i * (cols + 1) + j;
            let bottom_right = bottom_left + 1;
            let top_left = bottom_left + cols + 1;
            let top_right = top_left + 1;
            elements.extend_from_slice(&[bottom_left, bottom_right, top_right]);
            elements.extend_from_slice(&[top_right, top_left, bottom_left]);
        }
    }
    (vertices, elements)
}

pub fn sphere(device: &mut dyn GraphicsDevice, segments: UVec2) -> Mesh {
    let (vertices, elements) = sphere_geometry(segments);
    Mesh::new(device, &vertices, &elements)
}

/// Unit cube centered at the origin, one quad per face.
pub fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let p = 0.5_f32;
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-p, -p, p], [p, -p, p], [p, p, p], [-p, p, p]]),
        ([0.0, 0.0, -1.0], [[p, -p, -p], [-p, -p, -p], [-p, p, -p], [p, p, -p]]),
        ([1.0, 0.0, 0.0], [[p, -p, p], [p, -p, -p], [p, p, -p], [p, p, p]]),
        ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p, p], [-p, p, p], [-p, p, -p]]),
        ([0.0, 1.0, 0.0], [[-p, p, p], [p, p, p], [p, p, -p], [-p, p, -p]]),
        ([0.0, -1.0, 0.0], [[-p, -p, -p], [p, -p, -p], [p, -p, p], [-p, -p, p]]),
    ];
    let corners_uv = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut elements = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        for (position, uv) in corners.into_iter().zip(corners_uv) {
            vertices.push(Vertex::new(position, uv, normal));
        }
        elements.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, elements)
}

pub fn cube(device: &mut dyn GraphicsDevice) -> Mesh {
    let (vertices, elements) = cube_geometry();
    Mesh::new(device, &vertices, &elements)
}

/// Unit quad in the XY plane facing +Z.
pub fn plane_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0], n),
        Vertex::new([0.5, -0.5, 0.0], [1.0, 0.0], n),
        Vertex::new([0.5, 0.5, 0.0], [1.0, 1.0], n),
        Vertex::new([-0.5, 0.5, 0.0], [0.0, 1.0], n),
    ];
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

pub fn plane(device: &mut dyn GraphicsDevice) -> Mesh {
    let (vertices, elements) = plane_geometry();
    Mesh::new(device, &vertices, &elements)
}
