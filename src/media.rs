//! Content descriptors from the slide layer
//!
//! Only `src` of `3d` items is consumed by the viewer; the other kinds are
//! parsed so a whole slide deck deserializes.

use serde::{Deserialize, Serialize};

/// Kind of a media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Youtube,
    Gif,
    #[serde(rename = "3d")]
    Model,
}

/// One media item of a slide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Path or URL
    pub src: String,
    #[serde(rename = "loop", default)]
    pub looped: bool,
}

impl MediaItem {
    pub fn is_model(&self) -> bool {
        self.kind == MediaKind::Model
    }
}

/// A slide of the exhibit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

/// Parse a slide deck from JSON
pub fn slides_from_json(data: &str) -> crate::Result<Vec<Slide>> {
    Ok(serde_json::from_str(data)?)
}

/// Distinct `3d` sources across `slides`, in order of first appearance
pub fn model_sources(slides: &[Slide]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for item in slides.iter().flat_map(|slide| &slide.media) {
        if item.is_model() && !sources.contains(&item.src) {
            sources.push(item.src.clone());
        }
    }
    sources
}
