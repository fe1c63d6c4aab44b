//! glTF / GLB model loading
//!
//! The document JSON is preprocessed before validation: buffers are
//! resolved (GLB binary chunk, `data:` URIs, or sibling files fetched
//! through the [`AssetSource`]) and the compression extensions with an
//! attached handler are rewritten out of the document.

use super::decoders::{
    GeometryDecoder, TextureTranscoder, EXT_MESHOPT_COMPRESSION, KHR_DRACO_MESH_COMPRESSION,
    KHR_TEXTURE_BASISU,
};
use crate::backend::RendererCapabilities;
use crate::bootstrap::{Capability, CapabilityRegistry};
use crate::config::DecoderSources;
use crate::error::{Result, ViewerError};
use crate::model::{
    generate_normals, AlphaMode, LoadedModel, Material, Mesh, Node, PrimitiveType, Transform,
    Vertex,
};
use crate::source::{resolve_relative, AssetSource, FetchMode};
use crate::texture::{is_ktx2, Texture, TextureLoader};
use base64::Engine as _;
use log::{debug, warn};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Upper bound for a zero-filled meshopt fallback buffer
const MAX_FALLBACK_BUFFER: usize = 256 * 1024 * 1024;

#[derive(Clone, Default)]
struct Attached {
    transcoder: Option<Arc<dyn TextureTranscoder>>,
    draco: Option<Arc<dyn GeometryDecoder>>,
    meshopt: Option<Arc<dyn GeometryDecoder>>,
    basisu_stub: bool,
}

/// Which optional handlers a [`GltfLoader`] currently has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachedDecoders {
    pub ktx2: bool,
    pub draco: bool,
    pub meshopt: bool,
    /// Basis Universal textures load as empty placeholders
    pub basisu_stub: bool,
}

/// Shared glTF/GLB loader
///
/// One instance lives for the whole viewer context. Decoders are attached
/// by [`configure`](Self::configure), which is re-run on every acquisition
/// and only ever adds what is newly available.
#[derive(Default)]
pub struct GltfLoader {
    attached: RwLock<Attached>,
    textures: TextureLoader,
}

impl fmt::Debug for GltfLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GltfLoader")
            .field("attached", &self.attached())
            .finish()
    }
}

impl GltfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the attached handlers
    pub fn attached(&self) -> AttachedDecoders {
        let attached = self.attached.read();
        AttachedDecoders {
            ktx2: attached.transcoder.is_some(),
            draco: attached.draco.is_some(),
            meshopt: attached.meshopt.is_some(),
            basisu_stub: attached.basisu_stub,
        }
    }

    /// Attach whatever decoders `registry` offers that are not attached yet
    ///
    /// Order: KTX2 transcoder, Draco, meshopt (after its readiness signal).
    /// Every step is best-effort. If no transcoder ends up attached, a stub
    /// handler turns Basis Universal textures into empty placeholders; a
    /// transcoder attached later replaces it.
    pub async fn configure(
        &self,
        registry: &CapabilityRegistry,
        paths: &DecoderSources,
        capabilities: &RendererCapabilities,
    ) {
        let needs_transcoder = self.attached.read().transcoder.is_none();
        if needs_transcoder {
            if let Some(transcoder) = registry.texture_transcoder() {
                transcoder.set_transcoder_path(&paths.ktx2_transcoder_path);
                transcoder.detect_support(capabilities);
                self.attached.write().transcoder.get_or_insert(transcoder);
                debug!("Attached KTX2 transcoder");
            }
        }

        let needs_draco = self.attached.read().draco.is_none();
        if needs_draco {
            if let Some(decoder) = registry.geometry_decoder(Capability::DracoDecoder) {
                decoder.set_decoder_path(&paths.draco_decoder_path);
                self.attached.write().draco.get_or_insert(decoder);
                debug!("Attached Draco decoder");
            }
        }

        let needs_meshopt = self.attached.read().meshopt.is_none();
        if needs_meshopt {
            if let Some(decoder) = registry.geometry_decoder(Capability::MeshoptDecoder) {
                match decoder.ready().await {
                    Ok(()) => {
                        self.attached.write().meshopt.get_or_insert(decoder);
                        debug!("Attached meshopt decoder");
                    }
                    Err(e) => warn!("Meshopt decoder not ready, skipping: {e}"),
                }
            }
        }

        let mut attached = self.attached.write();
        if attached.transcoder.is_some() {
            attached.basisu_stub = false;
        } else if !attached.basisu_stub {
            attached.basisu_stub = true;
            warn!("KTX2 transcoder unavailable, {KHR_TEXTURE_BASISU} textures will be empty");
        }
    }

    /// Fetch and parse the model at `path`
    pub async fn load<S: AssetSource>(&self, source: &S, path: &str) -> Result<LoadedModel> {
        let data = source.fetch(path, FetchMode::Default).await?;
        self.parse(source, path, &data).await
    }

    /// Parse GLB or glTF JSON `data` that was fetched from `path`
    pub async fn parse<S: AssetSource>(
        &self,
        source: &S,
        path: &str,
        data: &[u8],
    ) -> Result<LoadedModel> {
        let attached = self.attached.read().clone();

        let (mut document, mut blob) = split_container(path, data)?;
        let mut buffers = resolve_buffers(source, path, &document, &mut blob, &attached).await?;
        apply_extensions(path, &mut document, &mut buffers, &attached)?;

        let json = serde_json::to_vec(&document)?;
        let gltf = gltf::Gltf::from_slice(&json)
            .map_err(|e| ViewerError::parse(path, format!("invalid glTF: {e}")))?;

        debug!(
            "Parsed {path} with {} meshes and {} materials",
            gltf.meshes().len(),
            gltf.materials().len()
        );

        let materials = read_materials(&gltf);
        let (meshes, mesh_map) = read_meshes(path, &gltf, &buffers)?;
        let nodes = read_nodes(&gltf, &mesh_map);
        let scene_roots = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .map(|scene| scene.nodes().map(|n| n.index()).collect())
            .unwrap_or_default();

        let pending = pending_images(&gltf, &buffers);
        let mut images = Vec::with_capacity(pending.len());
        for image in pending {
            images.push(self.load_image(source, path, image, &attached).await);
        }

        let textures = gltf
            .textures()
            .map(|texture| {
                images
                    .get(texture.source().index())
                    .cloned()
                    .unwrap_or_else(|| Texture::empty(texture.name().map(str::to_string)))
            })
            .collect();

        Ok(LoadedModel {
            meshes,
            materials,
            nodes,
            textures,
            scene_roots,
        })
    }

    async fn load_image<S: AssetSource>(
        &self,
        source: &S,
        path: &str,
        image: PendingImage,
        attached: &Attached,
    ) -> Texture {
        let data = match image.data {
            ImageData::Bytes(data) => Some(data),
            ImageData::Uri(uri) => match resolve_uri(source, path, &uri).await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Failed to load image {uri}: {e}");
                    None
                }
            },
            ImageData::Missing => None,
        };
        let Some(data) = data else {
            return Texture::empty(image.name);
        };

        if is_ktx2(&data) || image.mime_type.as_deref() == Some("image/ktx2") {
            return match &attached.transcoder {
                Some(transcoder) => match transcoder.transcode(&data) {
                    Ok(mut texture) => {
                        texture.name = image.name;
                        texture
                    }
                    Err(e) => {
                        warn!("KTX2 transcode failed for {:?}: {e}", image.name);
                        Texture::empty(image.name)
                    }
                },
                None => {
                    debug!("No KTX2 transcoder, {:?} left empty", image.name);
                    Texture::empty(image.name)
                }
            };
        }

        match self.textures.load(image.name.clone(), &data) {
            Ok(texture) => texture,
            Err(e) => {
                warn!("Failed to decode image {:?}: {e}", image.name);
                Texture::empty(image.name)
            }
        }
    }
}

enum ImageData {
    Bytes(Vec<u8>),
    Uri(String),
    Missing,
}

struct PendingImage {
    name: Option<String>,
    mime_type: Option<String>,
    data: ImageData,
}

fn split_container(path: &str, data: &[u8]) -> Result<(Value, Option<Vec<u8>>)> {
    if data.starts_with(b"glTF") {
        let glb = gltf::Glb::from_slice(data)?;
        let document = serde_json::from_slice(&glb.json)?;
        Ok((document, glb.bin.map(|bin| bin.into_owned())))
    } else {
        let document = serde_json::from_slice(data)
            .map_err(|e| ViewerError::parse(path, format!("invalid glTF JSON: {e}")))?;
        Ok((document, None))
    }
}

async fn resolve_buffers<S: AssetSource>(
    source: &S,
    path: &str,
    document: &Value,
    blob: &mut Option<Vec<u8>>,
    attached: &Attached,
) -> Result<Vec<Vec<u8>>> {
    let defs = document
        .get("buffers")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut buffers = Vec::with_capacity(defs.len());
    for (index, def) in defs.iter().enumerate() {
        let byte_length = def.get("byteLength").and_then(Value::as_u64).unwrap_or(0) as usize;

        let data = if let Some(uri) = def.get("uri").and_then(Value::as_str) {
            resolve_uri(source, path, uri).await?
        } else if is_meshopt_fallback(def) {
            if attached.meshopt.is_none() {
                return Err(ViewerError::parse(
                    path,
                    format!("buffer {index} needs an {EXT_MESHOPT_COMPRESSION} decoder"),
                ));
            }
            fallback_buffer(path, document, index, byte_length)?
        } else {
            blob.take().ok_or_else(|| {
                ViewerError::parse(path, format!("buffer {index} has no uri and no binary chunk"))
            })?
        };

        if data.len() < byte_length {
            return Err(ViewerError::parse(
                path,
                format!("buffer {index} has {} bytes, expected {byte_length}", data.len()),
            ));
        }
        buffers.push(data);
    }
    Ok(buffers)
}

/// Zeroed target for meshopt-decoded data
///
/// The declared length may not exceed the extent of the views into the
/// buffer nor [`MAX_FALLBACK_BUFFER`].
fn fallback_buffer(
    path: &str,
    document: &Value,
    index: usize,
    byte_length: usize,
) -> Result<Vec<u8>> {
    let extent = document
        .get("bufferViews")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|view| view.get("buffer").and_then(Value::as_u64) == Some(index as u64))
        .map(|view| {
            let offset = view.get("byteOffset").and_then(Value::as_u64).unwrap_or(0);
            let length = view.get("byteLength").and_then(Value::as_u64).unwrap_or(0);
            offset.saturating_add(length)
        })
        .max()
        .unwrap_or(0);

    if byte_length as u64 > extent || byte_length > MAX_FALLBACK_BUFFER {
        return Err(ViewerError::parse(
            path,
            format!("fallback buffer {index} declares {byte_length} bytes"),
        ));
    }

    let mut data = Vec::new();
    data.try_reserve_exact(byte_length)
        .map_err(|e| ViewerError::parse(path, format!("fallback buffer {index}: {e}")))?;
    data.resize(byte_length, 0);
    Ok(data)
}

fn is_meshopt_fallback(buffer: &Value) -> bool {
    buffer
        .pointer(&format!("/extensions/{EXT_MESHOPT_COMPRESSION}/fallback"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

async fn resolve_uri<S: AssetSource>(source: &S, path: &str, uri: &str) -> Result<Vec<u8>> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ViewerError::parse(path, "malformed data URI"))?;
        if !header.ends_with(";base64") {
            return Err(ViewerError::parse(path, "only base64 data URIs are supported"));
        }
        return base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ViewerError::parse(path, format!("bad base64 data URI: {e}")));
    }

    let url = resolve_relative(path, uri);
    Ok(source.fetch(&url, FetchMode::Default).await?.to_vec())
}

fn extension_list(document: &Value, key: &str) -> Vec<String> {
    document
        .get(key)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn apply_extensions(
    path: &str,
    document: &mut Value,
    buffers: &mut Vec<Vec<u8>>,
    attached: &Attached,
) -> Result<()> {
    let used = extension_list(document, "extensionsUsed");
    let required = extension_list(document, "extensionsRequired");
    let mut handled: HashSet<&str> = HashSet::new();

    if used.iter().any(|e| e == KHR_TEXTURE_BASISU)
        && (attached.transcoder.is_some() || attached.basisu_stub)
    {
        let count = rewrite_basisu_sources(document, attached.transcoder.is_some());
        debug!("Rewrote {count} {KHR_TEXTURE_BASISU} textures in {path}");
        handled.insert(KHR_TEXTURE_BASISU);
    }

    for decoder in [&attached.draco, &attached.meshopt].into_iter().flatten() {
        let extension = decoder.extension();
        if used.iter().any(|e| e == extension) {
            decoder.decode(document, buffers)?;
            debug!("Decoded {extension} content in {path}");
            handled.insert(extension);
        }
    }

    for extension in [KHR_DRACO_MESH_COMPRESSION, EXT_MESHOPT_COMPRESSION] {
        if required.iter().any(|e| e == extension) && !handled.contains(extension) {
            return Err(ViewerError::parse(
                path,
                format!("{extension} is required but no decoder is attached"),
            ));
        }
    }

    for key in ["extensionsUsed", "extensionsRequired"] {
        if let Some(list) = document.get_mut(key).and_then(Value::as_array_mut) {
            list.retain(|e| e.as_str().map_or(true, |name| !handled.contains(name)));
        }
    }
    Ok(())
}

/// Point textures at their Basis Universal image and drop the extension
///
/// With only the stub available, a texture that also names a regular image
/// keeps it.
fn rewrite_basisu_sources(document: &mut Value, prefer_basisu: bool) -> usize {
    let Some(textures) = document.get_mut("textures").and_then(Value::as_array_mut) else {
        return 0;
    };

    let mut count = 0;
    for texture in textures.iter_mut().filter_map(Value::as_object_mut) {
        let basisu = texture
            .get_mut("extensions")
            .and_then(Value::as_object_mut)
            .and_then(|extensions| extensions.remove(KHR_TEXTURE_BASISU));
        let Some(source) = basisu.and_then(|ext| ext.get("source").cloned()) else {
            continue;
        };
        if prefer_basisu || !texture.contains_key("source") {
            texture.insert("source".to_string(), source);
        }
        count += 1;
    }
    count
}

fn read_materials(gltf: &gltf::Gltf) -> Vec<Material> {
    gltf.materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let alpha_mode = match material.alpha_mode() {
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
            };

            Material {
                name: material.name().map(str::to_string),
                base_color_factor: pbr.base_color_factor(),
                base_color_texture: pbr.base_color_texture().map(|i| i.texture().index()),
                metallic_factor: pbr.metallic_factor(),
                roughness_factor: pbr.roughness_factor(),
                metallic_roughness_texture: pbr
                    .metallic_roughness_texture()
                    .map(|i| i.texture().index()),
                normal_texture: material.normal_texture().map(|n| n.texture().index()),
                normal_scale: material.normal_texture().map_or(1.0, |n| n.scale()),
                occlusion_texture: material.occlusion_texture().map(|o| o.texture().index()),
                emissive_texture: material.emissive_texture().map(|e| e.texture().index()),
                emissive_factor: material.emissive_factor(),
                alpha_mode,
                alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
                double_sided: material.double_sided(),
            }
        })
        .collect()
}

/// Flatten primitives into meshes
///
/// Returns the meshes and, per glTF mesh, the indices of its primitives.
fn read_meshes(
    path: &str,
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
) -> Result<(Vec<Mesh>, Vec<Vec<usize>>)> {
    let mut meshes = Vec::new();
    let mut mesh_map = Vec::with_capacity(gltf.meshes().len());

    for mesh in gltf.meshes() {
        let mut primitives = Vec::new();
        for (prim_idx, primitive) in mesh.primitives().enumerate() {
            let primitive_type = match primitive.mode() {
                gltf::mesh::Mode::Points => PrimitiveType::Points,
                gltf::mesh::Mode::Lines => PrimitiveType::Lines,
                gltf::mesh::Mode::LineLoop => {
                    warn!("Line loop primitive mode is not supported, converting to line strip");
                    PrimitiveType::LineStrip
                }
                gltf::mesh::Mode::LineStrip => PrimitiveType::LineStrip,
                gltf::mesh::Mode::Triangles => PrimitiveType::Triangles,
                gltf::mesh::Mode::TriangleStrip => PrimitiveType::TriangleStrip,
                gltf::mesh::Mode::TriangleFan => PrimitiveType::TriangleFan,
            };

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| {
                    ViewerError::parse(
                        path,
                        format!("mesh {} primitive {prim_idx} is missing positions", mesh.index()),
                    )
                })?
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let normals = match reader.read_normals() {
                Some(normals) => normals.collect(),
                None => {
                    debug!("Generating normals for mesh {} primitive {prim_idx}", mesh.index());
                    generate_normals(&positions, &indices)
                }
            };
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().collect())
                .unwrap_or_default();
            let colors: Vec<[f32; 4]> = reader
                .read_colors(0)
                .map(|c| c.into_rgba_f32().collect())
                .unwrap_or_default();

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &position)| Vertex {
                    position,
                    normal: normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                    color: colors.get(i).copied().unwrap_or([1.0, 1.0, 1.0, 1.0]),
                })
                .collect::<Vec<_>>();

            debug!(
                "  - Mesh {} primitive {prim_idx}: {} vertices, {} indices",
                mesh.index(),
                vertices.len(),
                indices.len()
            );

            primitives.push(meshes.len());
            meshes.push(Mesh::new(
                mesh.name().map(str::to_string),
                primitive_type,
                vertices,
                indices,
                primitive.material().index(),
            ));
        }
        mesh_map.push(primitives);
    }

    Ok((meshes, mesh_map))
}

fn read_nodes(gltf: &gltf::Gltf, mesh_map: &[Vec<usize>]) -> Vec<Node> {
    gltf.nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            Node {
                name: node.name().map(str::to_string),
                transform: Transform {
                    translation,
                    rotation,
                    scale,
                },
                mesh_indices: node
                    .mesh()
                    .and_then(|mesh| mesh_map.get(mesh.index()).cloned())
                    .unwrap_or_default(),
                children: node.children().map(|c| c.index()).collect(),
            }
        })
        .collect()
}

fn pending_images(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Vec<PendingImage> {
    gltf.images()
        .map(|image| {
            let name = image.name().map(str::to_string);
            match image.source() {
                gltf::image::Source::View { view, mime_type } => {
                    let start = view.offset();
                    let end = start + view.length();
                    let data = buffers
                        .get(view.buffer().index())
                        .and_then(|buffer| buffer.get(start..end))
                        .map(|bytes| ImageData::Bytes(bytes.to_vec()))
                        .unwrap_or(ImageData::Missing);
                    PendingImage {
                        name,
                        mime_type: Some(mime_type.to_string()),
                        data,
                    }
                }
                gltf::image::Source::Uri { uri, mime_type } => PendingImage {
                    name,
                    mime_type: mime_type.map(str::to_string),
                    data: ImageData::Uri(uri.to_string()),
                },
            }
        })
        .collect()
}
