//! Format dispatch and loader acquisition
//!
//! [`LoaderFactory::acquire_loader`] hands out a parser for a
//! [`ModelFormat`]. OBJ parsing is always available. glTF/GLB needs the
//! [`Capability::GltfParser`] capability; when present, the shared
//! [`GltfLoader`] is reconfigured on every acquisition so decoders that
//! became available since the last one are picked up.

pub mod decoders;
pub mod gltf;
pub mod obj;

pub use decoders::{
    DecoderError, GeometryDecoder, TextureTranscoder, EXT_MESHOPT_COMPRESSION,
    KHR_DRACO_MESH_COMPRESSION, KHR_TEXTURE_BASISU,
};
pub use gltf::{AttachedDecoders, GltfLoader};
pub use obj::{companion_mtl_path, ObjLoader};

use crate::backend::RendererCapabilities;
use crate::bootstrap::{AssetBootstrapper, Capability};
use crate::config::DecoderSources;
use crate::error::{Result, ViewerError};
use crate::model::LoadedModel;
use crate::source::{strip_query, AssetSource};
use log::warn;
use std::sync::Arc;

/// Model file formats the viewer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Obj,
    Gltf,
    Glb,
}

impl ModelFormat {
    /// Detect the format from a path's extension
    ///
    /// Case-insensitive; query string and fragment are ignored.
    pub fn from_path(path: &str) -> Result<Self> {
        let clean = strip_query(path);
        let file_name = clean.rsplit('/').next().unwrap_or(clean);
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "obj" => Ok(Self::Obj),
            "gltf" => Ok(Self::Gltf),
            "glb" => Ok(Self::Glb),
            _ => Err(ViewerError::UnsupportedFormat(path.to_string())),
        }
    }

    /// Whether this format goes through the glTF pipeline
    pub fn is_gltf_family(&self) -> bool {
        matches!(self, Self::Gltf | Self::Glb)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Gltf => "gltf",
            Self::Glb => "glb",
        }
    }
}

/// A parser ready to load one format
#[derive(Debug, Clone)]
pub enum ModelParser {
    Obj(ObjLoader),
    Gltf(Arc<GltfLoader>),
}

impl ModelParser {
    /// Fetch and decode the model at `path`
    pub async fn load<S: AssetSource>(&self, source: &S, path: &str) -> Result<LoadedModel> {
        match self {
            Self::Obj(loader) => loader.load(source, path).await,
            Self::Gltf(loader) => loader.load(source, path).await,
        }
    }

    /// Pipeline name (for debugging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Obj(_) => "OBJ+MTL",
            Self::Gltf(_) => "glTF",
        }
    }
}

/// Builds format-aware parsers wired to the available decoders
pub struct LoaderFactory<S: AssetSource> {
    bootstrapper: AssetBootstrapper<S>,
    decoders: DecoderSources,
    gltf: Arc<GltfLoader>,
    obj: ObjLoader,
}

impl<S: AssetSource> Clone for LoaderFactory<S> {
    fn clone(&self) -> Self {
        Self {
            bootstrapper: self.bootstrapper.clone(),
            decoders: self.decoders.clone(),
            gltf: self.gltf.clone(),
            obj: self.obj.clone(),
        }
    }
}

impl<S: AssetSource> LoaderFactory<S> {
    pub fn new(bootstrapper: AssetBootstrapper<S>, decoders: DecoderSources) -> Self {
        Self {
            bootstrapper,
            decoders,
            gltf: Arc::new(GltfLoader::new()),
            obj: ObjLoader::new(),
        }
    }

    /// The shared glTF loader
    pub fn gltf_loader(&self) -> &Arc<GltfLoader> {
        &self.gltf
    }

    pub fn bootstrapper(&self) -> &AssetBootstrapper<S> {
        &self.bootstrapper
    }

    /// Parser for `format`, or `None` when no parser can be resolved
    ///
    /// For glTF/GLB the KTX2 transcoder is ensured first (best-effort), then
    /// the shared loader is reconfigured against the renderer capabilities.
    pub async fn acquire_loader(
        &self,
        format: ModelFormat,
        capabilities: &RendererCapabilities,
    ) -> Option<ModelParser> {
        match format {
            ModelFormat::Obj => Some(ModelParser::Obj(self.obj.clone())),
            ModelFormat::Gltf | ModelFormat::Glb => {
                let registry = self.bootstrapper.registry();
                if !registry.is_available(Capability::GltfParser) {
                    return None;
                }

                if let Err(e) = self
                    .bootstrapper
                    .ensure_capability(Capability::Ktx2Transcoder, &self.decoders.ktx2_sources)
                    .await
                {
                    warn!("Continuing without KTX2 support: {e}");
                }

                self.gltf
                    .configure(registry, &self.decoders, capabilities)
                    .await;
                Some(ModelParser::Gltf(self.gltf.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{CapabilityHandle, CapabilityRegistry};
    use crate::source::MemorySource;
    use std::collections::HashMap;

    fn factory(source: &MemorySource, gltf_parser: bool) -> LoaderFactory<MemorySource> {
        let registry = CapabilityRegistry::new();
        if gltf_parser {
            registry.supply(Capability::GltfParser, CapabilityHandle::Builtin);
        }
        let boot = AssetBootstrapper::new(Arc::new(source.clone()), registry, HashMap::new());
        let decoders = DecoderSources {
            ktx2_sources: vec!["ktx2-a.js".into(), "ktx2-b.js".into()],
            ..Default::default()
        };
        LoaderFactory::new(boot, decoders)
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ModelFormat::from_path("a/b.obj").unwrap(), ModelFormat::Obj);
        assert_eq!(ModelFormat::from_path("B.GLB").unwrap(), ModelFormat::Glb);
        assert_eq!(
            ModelFormat::from_path("scene.gltf?v=3#top").unwrap(),
            ModelFormat::Gltf
        );
        assert!(matches!(
            ModelFormat::from_path("photo.png"),
            Err(ViewerError::UnsupportedFormat(_))
        ));
        assert!(ModelFormat::from_path("models.obj/readme").is_err());
        assert!(ModelFormat::from_path("noext").is_err());
    }

    #[tokio::test]
    async fn test_obj_needs_no_bootstrap() {
        let source = MemorySource::new();
        let parser = factory(&source, true)
            .acquire_loader(ModelFormat::Obj, &RendererCapabilities::default())
            .await;
        assert!(matches!(parser, Some(ModelParser::Obj(_))));
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_gltf_without_parser_is_none() {
        let source = MemorySource::new();
        let parser = factory(&source, false)
            .acquire_loader(ModelFormat::Glb, &RendererCapabilities::default())
            .await;
        assert!(parser.is_none());
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_gltf_acquisition_tries_ktx2_and_registers_stub() {
        let source = MemorySource::new();
        let factory = factory(&source, true);

        let parser = factory
            .acquire_loader(ModelFormat::Gltf, &RendererCapabilities::default())
            .await;

        assert!(matches!(parser, Some(ModelParser::Gltf(_))));
        assert_eq!(
            source.requests(),
            vec!["ktx2-a.js".to_string(), "ktx2-b.js".to_string()]
        );
        assert!(factory.gltf_loader().attached().basisu_stub);
    }

    #[tokio::test]
    async fn test_acquisitions_share_one_gltf_loader() {
        let source = MemorySource::new().with("ktx2-a.js", b"module".to_vec());
        let factory = factory(&source, true);
        let caps = RendererCapabilities::default();

        let first = factory.acquire_loader(ModelFormat::Glb, &caps).await;
        let second = factory.acquire_loader(ModelFormat::Gltf, &caps).await;

        match (first, second) {
            (Some(ModelParser::Gltf(a)), Some(ModelParser::Gltf(b))) => {
                assert!(Arc::ptr_eq(&a, &b))
            }
            other => panic!("unexpected parsers: {other:?}"),
        }
        assert_eq!(source.request_count("ktx2-a.js"), 1);
    }
}
