//! Optional decoder interfaces
//!
//! Compressed textures and compressed geometry are decoded by pluggable
//! components. The glTF loader works without any of them; content that
//! needs a missing decoder degrades (textures) or fails to parse (required
//! geometry compression).

use crate::backend::RendererCapabilities;
use crate::texture::Texture;
use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;

/// glTF extension carrying KTX2 / Basis Universal textures
pub const KHR_TEXTURE_BASISU: &str = "KHR_texture_basisu";
/// glTF extension carrying Draco-compressed primitives
pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
/// glTF extension carrying meshopt-compressed buffer views
pub const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";

/// Error type for decoder operations
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Decoder not ready: {0}")]
    NotReady(String),

    #[error("Unsupported input: {0}")]
    Unsupported(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Install failed: {0}")]
    Install(String),
}

/// Transcodes KTX2 / Basis Universal payloads
pub trait TextureTranscoder: Send + Sync {
    /// Location of the transcoder's support files
    fn set_transcoder_path(&self, path: &str);

    /// Pick target formats the active renderer can sample
    fn detect_support(&self, capabilities: &RendererCapabilities);

    /// Transcode one KTX2 image
    fn transcode(&self, data: &[u8]) -> Result<Texture, DecoderError>;
}

/// Expands compressed geometry inside a glTF document
pub trait GeometryDecoder: Send + Sync {
    /// The glTF extension this decoder handles
    fn extension(&self) -> &'static str;

    /// Location of the decoder's support files
    fn set_decoder_path(&self, _path: &str) {}

    /// Resolves once the decoder can be used
    fn ready(&self) -> BoxFuture<'static, Result<(), DecoderError>> {
        futures::future::ready(Ok(())).boxed()
    }

    /// Decode in place
    ///
    /// `buffers` holds the resolved data of the document's `buffers` array,
    /// index for index. A decoder that adds buffers must append to both.
    /// Uses of the extension it fully decoded must be removed from the
    /// document.
    fn decode(
        &self,
        document: &mut serde_json::Value,
        buffers: &mut Vec<Vec<u8>>,
    ) -> Result<(), DecoderError>;
}
