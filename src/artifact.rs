//! Render artifact: an image produced by an external render, read-only here.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot read render {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode render {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Reference to a rendered image plus its resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderArtifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl RenderArtifact {
    /// Open a render, reading its resolution from the image header
    pub fn open(path: impl Into<PathBuf>) -> ArtifactResult<Self> {
        let path = path.into();
        if let Err(source) = fs::metadata(&path) {
            return Err(ArtifactError::Read { path, source });
        }
        let (width, height) = image::image_dimensions(&path).map_err(|source| {
            ArtifactError::Decode {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Self {
            path,
            width,
            height,
        })
    }

    /// Use a resolution supplied by the render settings instead of the header
    pub fn with_resolution(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }

    /// File name of the render, used for upload names and version codes
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "render".to_string())
    }

    /// File stem of the render
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "render".to_string())
    }

    pub fn read_bytes(&self) -> ArtifactResult<Vec<u8>> {
        fs::read(&self.path).map_err(|source| ArtifactError::Read {
            path: self.path.clone(),
            source,
        })
    }

    /// Base64 encoding of the whole file
    pub fn encode_base64(&self) -> ArtifactResult<String> {
        let bytes = self.read_bytes()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn mime_type(&self) -> &'static str {
        mime_for_path(&self.path)
    }

    /// `data:` URL embedding the image
    pub fn data_url(&self) -> ArtifactResult<String> {
        Ok(format!("data:{};base64,{}", self.mime_type(), self.encode_base64()?))
    }
}

/// MIME type from the file extension. Unknown extensions are sent as JPEG.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "exr" => "image/x-exr",
        _ => "image/jpeg",
    }
}
