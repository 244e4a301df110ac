//! Noise texture for `texNoise`.
//!
//! Loaded once at startup and never changed afterwards. Looked up by file stem
//! (`noise.png`, `Noise.jpg`, ...) in the texture directory; when nothing usable is
//! there a procedural image is generated so the sampler is always bound.

use std::path::{Path, PathBuf};

use crate::error::PreviewError;
use crate::logi;

pub const PROCEDURAL_SIZE: u32 = 256;

/// Tightly packed RGBA8 pixels, bottom row first as GL expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    /// Deterministic value noise (xorshift), independent per channel.
    pub fn procedural_noise(size: u32) -> Self {
        let mut state: u32 = 0x9E37_79B9;
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for _ in 0..size * size {
            for _ in 0..3 {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                rgba.push((state >> 24) as u8);
            }
            rgba.push(255);
        }
        Self { width: size, height: size, rgba }
    }

    pub fn decode(path: &Path) -> Result<Self, PreviewError> {
        let img = image::open(path).map_err(|e| PreviewError::Texture {
            path: path.to_path_buf(),
            source: e,
        })?;
        // GL's first row is the bottom one
        let img = img.flipv().to_rgba8();
        Ok(Self { width: img.width(), height: img.height(), rgba: img.into_raw() })
    }
}

/// First file in `dir` whose stem matches `name` case-insensitively.
pub fn find_texture_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut hits: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case(name))
        })
        .collect();
    hits.sort();
    hits.into_iter().next()
}

/// Resolve the noise image: a decodable file from `dir`, else the procedural fallback.
pub fn load_noise(dir: Option<&Path>) -> Result<TextureImage, PreviewError> {
    if let Some(file) = dir.and_then(|d| find_texture_file(d, "noise")) {
        let img = TextureImage::decode(&file)?;
        logi!("TEXTURE", "texNoise <- {} ({}x{})", file.display(), img.width, img.height);
        return Ok(img);
    }
    logi!("TEXTURE", "texNoise <- procedural {0}x{0}", PROCEDURAL_SIZE);
    Ok(TextureImage::procedural_noise(PROCEDURAL_SIZE))
}
