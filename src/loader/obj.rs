//! OBJ + MTL model loading
//!
//! The companion material library is the model path with its `.obj`
//! extension replaced by `.mtl`. A missing or unreadable library is not an
//! error: the model loads with a default material.

use crate::error::{Result, ViewerError};
use crate::model::{
    generate_normals, AlphaMode, LoadedModel, Material, Mesh, Node, PrimitiveType, Vertex,
};
use crate::source::{resolve_sibling, strip_query, AssetSource, FetchMode};
use crate::texture::{Texture, TextureLoader};
use bytes::Bytes;
use log::{debug, warn};
use std::collections::HashMap;
use std::io::Cursor;

/// Path of the material library that accompanies `path`
pub fn companion_mtl_path(path: &str) -> String {
    let path = strip_query(path);
    let stem_len = path.len().saturating_sub(4);
    if path.len() >= 4 && path.is_char_boundary(stem_len) && path[stem_len..].eq_ignore_ascii_case(".obj")
    {
        format!("{}.mtl", &path[..stem_len])
    } else {
        format!("{path}.mtl")
    }
}

/// OBJ loader with material and texture support
#[derive(Debug, Clone, Default)]
pub struct ObjLoader {
    textures: TextureLoader,
}

impl ObjLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the OBJ at `path` and its companion material library, then parse
    pub async fn load<S: AssetSource>(&self, source: &S, path: &str) -> Result<LoadedModel> {
        let obj_data = source.fetch(path, FetchMode::Default).await?;

        let mtl_path = companion_mtl_path(path);
        let mtl_data = match source.fetch(&mtl_path, FetchMode::Default).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("No material library for {path} ({e}), using default material");
                None
            }
        };

        let (mut model, texture_refs) = self.parse(path, &obj_data, mtl_data.as_ref())?;
        self.load_textures(source, path, &mut model, texture_refs)
            .await;
        Ok(model)
    }

    /// Parse OBJ text with an optional material library
    ///
    /// Returns the model and, per material, the raw diffuse and normal
    /// texture references still to be loaded.
    fn parse(
        &self,
        path: &str,
        obj_data: &[u8],
        mtl_data: Option<&Bytes>,
    ) -> Result<(LoadedModel, Vec<TextureRefs>)> {
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };

        let (models, materials) =
            tobj::load_obj_buf(&mut Cursor::new(obj_data), &options, |_| match mtl_data {
                Some(data) => tobj::load_mtl_buf(&mut Cursor::new(data.as_ref())),
                None => Ok((Vec::new(), Default::default())),
            })?;

        if models.iter().all(|model| model.mesh.positions.is_empty()) {
            return Err(ViewerError::parse(path, "no geometry in OBJ"));
        }

        let obj_materials = match materials {
            Ok(materials) => materials,
            Err(e) => {
                warn!("Failed to parse material library for {path}: {e}");
                Vec::new()
            }
        };

        let mut texture_refs = Vec::with_capacity(obj_materials.len());
        let mut materials: Vec<Material> = obj_materials
            .iter()
            .map(|m| {
                texture_refs.push(TextureRefs {
                    diffuse: m.diffuse_texture.clone(),
                    normal: m.normal_texture.clone(),
                });
                convert_material(m)
            })
            .collect();

        let needs_default = materials.is_empty()
            || models
                .iter()
                .any(|m| m.mesh.material_id.map_or(true, |id| id >= materials.len()));
        let default_material = needs_default.then(|| {
            materials.push(Material {
                name: Some("default".to_string()),
                ..Default::default()
            });
            materials.len() - 1
        });

        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let mesh = model.mesh;
            let vertex_count = mesh.positions.len() / 3;
            let positions: Vec<[f32; 3]> = mesh
                .positions
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]])
                .collect();

            let indices = if mesh.indices.is_empty() {
                (0..vertex_count as u32).collect()
            } else {
                mesh.indices
            };

            let normals = if mesh.normals.len() >= vertex_count * 3 {
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| [n[0], n[1], n[2]])
                    .collect()
            } else {
                debug!("Generating normals for {}", model.name);
                generate_normals(&positions, &indices)
            };

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &position)| {
                    let uv = if mesh.texcoords.len() >= (i + 1) * 2 {
                        [mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1]]
                    } else {
                        [0.0, 0.0]
                    };
                    let color = if mesh.vertex_color.len() >= (i + 1) * 3 {
                        [
                            mesh.vertex_color[3 * i],
                            mesh.vertex_color[3 * i + 1],
                            mesh.vertex_color[3 * i + 2],
                            1.0,
                        ]
                    } else {
                        [1.0, 1.0, 1.0, 1.0]
                    };
                    Vertex {
                        position,
                        normal: normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
                        uv,
                        color,
                    }
                })
                .collect::<Vec<_>>();

            let material_index = match mesh.material_id {
                Some(id) if id < obj_materials.len() => Some(id),
                _ => default_material,
            };

            debug!(
                "  - OBJ group {}: {} vertices, {} indices",
                model.name,
                vertices.len(),
                indices.len()
            );
            meshes.push(Mesh::new(
                Some(model.name),
                PrimitiveType::Triangles,
                vertices,
                indices,
                material_index,
            ));
        }

        let mut nodes = vec![Node {
            name: Some(path.to_string()),
            children: (1..=meshes.len()).collect(),
            ..Default::default()
        }];
        nodes.extend(meshes.iter().enumerate().map(|(i, mesh)| Node {
            name: mesh.name.clone(),
            mesh_indices: vec![i],
            ..Default::default()
        }));

        let model = LoadedModel {
            meshes,
            materials,
            nodes,
            textures: Vec::new(),
            scene_roots: vec![0],
        };
        Ok((model, texture_refs))
    }

    /// Load referenced textures next to the model, best-effort
    async fn load_textures<S: AssetSource>(
        &self,
        source: &S,
        path: &str,
        model: &mut LoadedModel,
        refs: Vec<TextureRefs>,
    ) {
        let mut loaded: HashMap<String, Option<usize>> = HashMap::new();

        for (material_index, refs) in refs.into_iter().enumerate() {
            for (reference, is_normal) in [(refs.diffuse, false), (refs.normal, true)] {
                let Some(reference) = reference.filter(|r| !r.trim().is_empty()) else {
                    continue;
                };
                let url = resolve_sibling(path, reference.trim());

                let index = match loaded.get(&url) {
                    Some(index) => *index,
                    None => {
                        let index = self
                            .fetch_texture(source, &url)
                            .await
                            .map(|texture| {
                                model.textures.push(texture);
                                model.textures.len() - 1
                            });
                        loaded.insert(url, index);
                        index
                    }
                };

                if let Some(material) = model.materials.get_mut(material_index) {
                    if is_normal {
                        material.normal_texture = index;
                    } else {
                        material.base_color_texture = index;
                    }
                }
            }
        }
    }

    async fn fetch_texture<S: AssetSource>(&self, source: &S, url: &str) -> Option<Texture> {
        let data = match source.fetch(url, FetchMode::Default).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Texture {url} unavailable: {e}");
                return None;
            }
        };
        match self.textures.load(Some(url.to_string()), &data) {
            Ok(texture) => Some(texture),
            Err(e) => {
                warn!("Failed to decode texture {url}: {e}");
                None
            }
        }
    }
}

struct TextureRefs {
    diffuse: Option<String>,
    normal: Option<String>,
}

fn convert_material(material: &tobj::Material) -> Material {
    let diffuse = material.diffuse.unwrap_or([1.0, 1.0, 1.0]);
    let opacity = material.dissolve.unwrap_or(1.0);
    Material {
        name: Some(material.name.clone()),
        base_color_factor: [diffuse[0], diffuse[1], diffuse[2], opacity],
        metallic_factor: 0.0,
        roughness_factor: material
            .shininess
            .map_or(1.0, |s| (1.0 - s / 1000.0).clamp(0.0, 1.0)),
        alpha_mode: if opacity < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const CUBE_CORNER: &str = "mtllib corner.mtl\n\
        v 0 0 0\nv 2 0 0\nv 0 2 0\nv 0 0 2\n\
        usemtl red\n\
        f 1 2 3\nf 1 3 4\nf 1 4 2\n";

    const RED_MTL: &str = "newmtl red\nKd 1.0 0.0 0.0\nmap_Kd textures\\red.png\n";

    fn png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        let mut data = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn test_companion_mtl_path() {
        assert_eq!(companion_mtl_path("models/chair.obj"), "models/chair.mtl");
        assert_eq!(companion_mtl_path("models/CHAIR.OBJ?v=2"), "models/CHAIR.mtl");
        assert_eq!(companion_mtl_path("models/chair"), "models/chair.mtl");
    }

    #[tokio::test]
    async fn test_load_with_materials_and_texture() {
        let source = MemorySource::new()
            .with("models/corner.obj", CUBE_CORNER)
            .with("models/corner.mtl", RED_MTL)
            .with("models/red.png", png());

        let model = ObjLoader::new()
            .load(&source, "models/corner.obj")
            .await
            .unwrap();

        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].base_color_factor, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(model.materials[0].base_color_texture, Some(0));
        assert_eq!(model.textures.len(), 1);
        assert_eq!(model.meshes[0].material_index, Some(0));
        assert_eq!(model.meshes[0].index_count(), 9);
        assert!(source.requests().contains(&"models/red.png".to_string()));
    }

    #[tokio::test]
    async fn test_missing_mtl_falls_back_to_default_material() {
        let source = MemorySource::new().with("models/corner.obj", CUBE_CORNER);

        let model = ObjLoader::new()
            .load(&source, "models/corner.obj")
            .await
            .unwrap();

        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].name.as_deref(), Some("default"));
        assert_eq!(model.meshes[0].material_index, Some(0));
        assert_eq!(model.bounds().unwrap().max_dimension(), 2.0);
    }

    #[tokio::test]
    async fn test_missing_texture_leaves_material_untextured() {
        let source = MemorySource::new()
            .with("models/corner.obj", CUBE_CORNER)
            .with("models/corner.mtl", RED_MTL);

        let model = ObjLoader::new()
            .load(&source, "models/corner.obj")
            .await
            .unwrap();

        assert!(model.textures.is_empty());
        assert_eq!(model.materials[0].base_color_texture, None);
    }

    #[tokio::test]
    async fn test_generated_normals_are_unit_length() {
        let source = MemorySource::new().with("corner.obj", CUBE_CORNER);
        let model = ObjLoader::new().load(&source, "corner.obj").await.unwrap();
        for vertex in &model.meshes[0].vertices {
            let n = glam::Vec3::from(vertex.normal);
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_missing_obj_is_fetch_error() {
        let result = ObjLoader::new()
            .load(&MemorySource::new(), "models/gone.obj")
            .await;
        assert_eq!(
            result.unwrap_err().kind(),
            crate::error::ErrorKind::Fetch
        );
    }

    #[tokio::test]
    async fn test_empty_obj_is_parse_failure() {
        let source = MemorySource::new().with("empty.obj", "# nothing here\n");
        let result = ObjLoader::new().load(&source, "empty.obj").await;
        assert_eq!(
            result.unwrap_err().kind(),
            crate::error::ErrorKind::ParseFailure
        );
    }

    #[tokio::test]
    async fn test_obj_with_only_groups_is_parse_failure() {
        let source = MemorySource::new().with("hollow.obj", "o shell\ng side\n");
        let result = ObjLoader::new().load(&source, "hollow.obj").await;
        assert_eq!(
            result.unwrap_err().kind(),
            crate::error::ErrorKind::ParseFailure
        );
    }
}
