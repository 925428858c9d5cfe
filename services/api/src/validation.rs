//! Upload validation
//!
//! Each wizard step accepts a fixed set of formats and sizes; role-less
//! editor uploads accept images and glTF models. Both the MIME type and the
//! file extension must agree.

use common::models::{AssetType, CardSlot};
use std::{fmt, str::FromStr};

const MB: usize = 1024 * 1024;

pub const MAX_IMAGE_BYTES: usize = 10 * MB;
pub const MAX_FINAL_BYTES: usize = 200 * MB;
pub const MAX_GENERIC_BYTES: usize = 50 * MB;

const VIDEO_MIMES: [&str; 4] = ["video/mp4", "video/webm", "video/quicktime", "video/x-matroska"];
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "webm", "mov", "mkv"];

/// Business-card wizard step an upload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRole {
    Logo,
    Card,
    Final,
}

impl UploadRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadRole::Logo => "logo",
            UploadRole::Card => "card",
            UploadRole::Final => "final",
        }
    }

    /// Card set slot filled by this step
    pub fn slot(&self) -> CardSlot {
        match self {
            UploadRole::Logo => CardSlot::Logo,
            UploadRole::Card => CardSlot::CardImage,
            UploadRole::Final => CardSlot::Video,
        }
    }

    /// Wizard page that follows this step
    pub fn next_step(&self) -> Option<UploadRole> {
        match self {
            UploadRole::Logo => Some(UploadRole::Card),
            UploadRole::Card => Some(UploadRole::Final),
            UploadRole::Final => None,
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            UploadRole::Logo | UploadRole::Card => MAX_IMAGE_BYTES,
            UploadRole::Final => MAX_FINAL_BYTES,
        }
    }
}

impl fmt::Display for UploadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logo" => Ok(UploadRole::Logo),
            "card" => Ok(UploadRole::Card),
            "final" => Ok(UploadRole::Final),
            other => Err(format!("Unknown upload role: {}", other)),
        }
    }
}

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_jpeg_or_png(mime: &str, ext: &str) -> bool {
    matches!(mime, "image/jpeg" | "image/jpg" | "image/png") && matches!(ext, "jpg" | "jpeg" | "png")
}

fn is_glb(mime: &str, ext: &str) -> bool {
    ext == "glb" && matches!(mime, "model/gltf-binary" | "application/octet-stream")
}

/// Check an upload against the rules of its step, returning the asset type to record
pub fn validate_upload(
    role: Option<UploadRole>,
    mime: &str,
    filename: &str,
    size: usize,
) -> Result<AssetType, String> {
    if size == 0 {
        return Err("Please upload a file".to_string());
    }

    let mime = mime.trim().to_ascii_lowercase();
    let ext = extension(filename);

    let max_bytes = role.map(|r| r.max_bytes()).unwrap_or(MAX_GENERIC_BYTES);
    if size > max_bytes {
        return Err(format!(
            "File is too large, the limit is {} MB",
            max_bytes / MB
        ));
    }

    match role {
        Some(UploadRole::Logo) | Some(UploadRole::Card) => {
            if is_jpeg_or_png(&mime, &ext) {
                Ok(AssetType::Image)
            } else {
                Err(format!(
                    "Only JPG and PNG formats are allowed for the {} image",
                    role.map(|r| r.as_str()).unwrap_or_default()
                ))
            }
        }
        Some(UploadRole::Final) => {
            if VIDEO_MIMES.contains(&mime.as_str()) && VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                Ok(AssetType::Video)
            } else if is_glb(&mime, &ext) {
                Ok(AssetType::ThreeDModel)
            } else {
                Err(
                    "Only video (MP4/WEBM/MOV/MKV) or GLB files are allowed for final upload"
                        .to_string(),
                )
            }
        }
        None => {
            let image = matches!(mime.as_str(), "image/jpeg" | "image/jpg" | "image/png" | "image/gif")
                && matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif");
            let model = matches!(ext.as_str(), "glb" | "gltf")
                && matches!(
                    mime.as_str(),
                    "model/gltf-binary" | "model/gltf+json" | "application/octet-stream"
                );
            if image {
                Ok(AssetType::Image)
            } else if model {
                Ok(AssetType::ThreeDModel)
            } else {
                Err("Only images or 3D models are allowed".to_string())
            }
        }
    }
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`
///
/// Directory components are dropped; an empty or dots-only result becomes `file`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}
