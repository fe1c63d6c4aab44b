//! Decoded scene-graph representation
//!
//! A [`LoadedModel`] is what both format pipelines produce and what the
//! model cache stores. It owns all of its data, so `clone()` is a deep copy
//! and two viewers never share mutable state.

use crate::texture::Texture;
use glam::{Mat4, Quat, Vec3};

/// A vertex with position, normal, UV and color data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Vertex color (RGBA)
    pub color: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl Vertex {
    /// Create a new vertex with a white color
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Type of primitive to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// How to handle transparency
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

/// Material properties for PBR rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    /// Base color factor (RGBA)
    pub base_color_factor: [f32; 4],
    /// Index into [`LoadedModel::textures`]
    pub base_color_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<usize>,
    pub emissive_texture: Option<usize>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    /// Render both polygon faces
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

/// A single drawable primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitive_type: PrimitiveType,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Index into [`LoadedModel::materials`]
    pub material_index: Option<usize>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(
        name: Option<String>,
        primitive_type: PrimitiveType,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        material_index: Option<usize>,
    ) -> Self {
        Self {
            name,
            primitive_type,
            vertices,
            indices,
            material_index,
        }
    }

    /// Get the number of vertices in the mesh
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of indices in the mesh
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Spatial transform (translation, rotation, scale)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    /// Local matrix of this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            Quat::from_array(self.rotation),
            Vec3::from(self.translation),
        )
    }
}

/// A node in the scene hierarchy
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Transform,
    /// Indices into [`LoadedModel::meshes`]
    pub mesh_indices: Vec<usize>,
    /// Indices of child nodes
    pub children: Vec<usize>,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Box containing a single point
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Grow to contain `point`
    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest extent along any axis
    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    /// Bounds of the eight corners after applying `matrix`
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let mut out: Option<Aabb> = None;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            let p = matrix.transform_point3(corner);
            match out.as_mut() {
                Some(b) => b.include(p),
                None => out = Some(Aabb::from_point(p)),
            }
        }
        out.unwrap_or(*self)
    }
}

/// Represents a loaded 3D model
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadedModel {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub nodes: Vec<Node>,
    pub textures: Vec<Texture>,
    /// Nodes at the top of the displayed scene
    pub scene_roots: Vec<usize>,
}

impl LoadedModel {
    /// Root nodes to traverse; falls back to every node nobody lists as a child
    pub fn roots(&self) -> Vec<usize> {
        if !self.scene_roots.is_empty() {
            return self.scene_roots.clone();
        }
        let mut is_child = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for &child in &node.children {
                if let Some(flag) = is_child.get_mut(child) {
                    *flag = true;
                }
            }
        }
        (0..self.nodes.len()).filter(|&i| !is_child[i]).collect()
    }

    /// Visit every reachable node with its world matrix under `root`
    pub fn visit_nodes(&self, root: Mat4, mut visit: impl FnMut(&Node, Mat4)) {
        let mut stack: Vec<(usize, Mat4, usize)> = self
            .roots()
            .into_iter()
            .map(|i| (i, root, 0))
            .collect();
        let depth_limit = self.nodes.len();

        while let Some((index, parent, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                log::warn!("Node index {index} out of range");
                continue;
            };
            if depth > depth_limit {
                log::warn!("Node hierarchy deeper than node count, cycle at node {index}");
                continue;
            }
            let world = parent * node.transform.matrix();
            visit(node, world);
            for &child in &node.children {
                stack.push((child, world, depth + 1));
            }
        }
    }

    /// Bounds of all reachable geometry in model space
    ///
    /// Returns `None` when the model has no vertices.
    pub fn bounds(&self) -> Option<Aabb> {
        self.transformed_bounds(Mat4::IDENTITY)
    }

    /// Bounds of all reachable geometry with `root` applied on top
    pub fn transformed_bounds(&self, root: Mat4) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        self.visit_nodes(root, |node, world| {
            for &mesh_index in &node.mesh_indices {
                let Some(mesh) = self.meshes.get(mesh_index) else {
                    continue;
                };
                for vertex in &mesh.vertices {
                    let p = world.transform_point3(Vec3::from(vertex.position));
                    match bounds.as_mut() {
                        Some(b) => b.include(p),
                        None => bounds = Some(Aabb::from_point(p)),
                    }
                }
            }
        });
        bounds
    }

    /// Total vertex count across meshes
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(Mesh::vertex_count).sum()
    }

    /// Rough memory footprint in bytes
    pub fn estimated_size(&self) -> usize {
        let mut size = 0;
        for mesh in &self.meshes {
            size += mesh.vertices.len() * std::mem::size_of::<Vertex>();
            size += mesh.indices.len() * std::mem::size_of::<u32>();
        }
        size += self.materials.len() * std::mem::size_of::<Material>();
        size += self.nodes.len() * std::mem::size_of::<Node>();
        size += self.textures.iter().map(Texture::byte_size).sum::<usize>();
        size
    }
}

/// Smooth normals by averaging the face normals around each vertex
///
/// Vertices not referenced by any non-degenerate triangle get +Z.
pub fn generate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for chunk in indices.chunks_exact(3) {
        let [i0, i1, i2] = [chunk[0] as usize, chunk[1] as usize, chunk[2] as usize];
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            log::warn!("Invalid vertex index while generating normals");
            continue;
        }

        let v0 = Vec3::from(positions[i0]);
        let v1 = Vec3::from(positions[i1]);
        let v2 = Vec3::from(positions[i2]);
        let normal = (v1 - v0).cross(v2 - v0);

        if normal.length_squared() > 1e-12 {
            let normal = normal.normalize();
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }

    normals
        .into_iter()
        .map(|n| {
            if n.length_squared() > 1e-12 {
                n.normalize().into()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}
