use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{GenericImageView, ImageFormat};

/// The user's selected image. Replaced whenever a new file is chosen,
/// discarded on cancel. Never persisted.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageAsset {
    /// Accepts raw upload bytes. The MIME type is sniffed from magic bytes;
    /// anything other than PNG/JPEG/WEBP is rejected at this boundary.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("empty image upload"));
        }
        let mime_type = detect_mime_type(&bytes)
            .ok_or_else(|| anyhow!("unsupported image format"))?
            .to_string();
        Ok(Self { bytes, mime_type })
    }

    /// Base64 encoding of the raw bytes, suitable for embedding in a JSON
    /// request payload.
    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URI for local preview rendering.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_payload())
    }

    /// Decodes the image to report its dimensions. Advisory: intake does not
    /// block on a failed decode.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let format = mime_to_format(&self.mime_type)?;
        let image = image::load_from_memory_with_format(&self.bytes, format)
            .map_err(|err| anyhow!("decode image failed: {err}"))?;
        Ok(image.dimensions())
    }
}

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Result<ImageFormat> {
    match mime_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/webp" => Ok(ImageFormat::WebP),
        _ => Err(anyhow!("unsupported mime type: {mime_type}")),
    }
}
