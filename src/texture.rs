//! Texture loading and processing

use image::ImageFormat;
use thiserror::Error;

/// Error type for texture loading operations
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Image decoding error: {0}")]
    DecodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// GPU block-compressed formats a transcoder can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedFormat {
    Bc7,
    Etc2,
    Astc4x4,
}

/// Pixel layout of a texture's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Compressed(CompressedFormat),
}

/// Represents a loaded texture
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: TextureFormat,
    pub srgb: bool,
    /// Anisotropic filtering level requested for sampling
    pub anisotropy: u8,
}

impl Texture {
    /// Texture with no image, standing in for content that could not be decoded
    pub fn empty(name: Option<String>) -> Self {
        Self {
            name,
            width: 0,
            height: 0,
            data: Vec::new(),
            format: TextureFormat::Rgba8,
            srgb: true,
            anisotropy: 1,
        }
    }

    /// Whether this is an empty placeholder
    pub fn is_placeholder(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// Decodes PNG and JPEG data into RGBA textures
#[derive(Default, Clone, Debug)]
pub struct TextureLoader;

impl TextureLoader {
    /// Create a new texture loader
    pub fn new() -> Self {
        Self
    }

    /// Decode a texture from binary data
    pub fn load(&self, name: Option<String>, data: &[u8]) -> Result<Texture, TextureError> {
        let format =
            image::guess_format(data).map_err(|e| TextureError::DecodeError(e.to_string()))?;

        match format {
            ImageFormat::Jpeg | ImageFormat::Png => {}
            _ => {
                return Err(TextureError::UnsupportedFormat(format!(
                    "Only JPG/JPEG and PNG formats are supported, got {:?}",
                    format.extensions_str()
                )))
            }
        }

        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| TextureError::DecodeError(e.to_string()))?;

        let rgba_img = img.into_rgba8();
        let (width, height) = rgba_img.dimensions();

        Ok(Texture {
            name,
            width,
            height,
            data: rgba_img.into_raw(),
            format: TextureFormat::Rgba8,
            srgb: true,
            anisotropy: 1,
        })
    }
}

/// Whether `data` starts with the KTX2 file identifier
pub fn is_ktx2(data: &[u8]) -> bool {
    const KTX2_MAGIC: [u8; 12] = [
        0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n',
    ];
    data.starts_with(&KTX2_MAGIC)
}
