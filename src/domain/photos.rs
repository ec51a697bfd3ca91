//! Photo directory management for the gallery.
//!
//! Captures are written as `scan_<n>.<ext>` with `n` one past the highest
//! existing index. Renames keep the file extension.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{info, warn};

const CAPTURE_PREFIX: &str = "scan_";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "ppm"];

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("photo not found: {0}")]
    NotFound(PathBuf),
    #[error("a photo named {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("invalid photo name: {0:?}")]
    InvalidName(String),
}

impl PhotoError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub path: PathBuf,
    /// File stem shown to the user
    pub name: String,
    pub modified: SystemTime,
    pub size_bytes: u64,
}

pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Open the photo directory, creating it when needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PhotoError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PhotoError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All images in the directory, newest first
    pub fn list(&self) -> Result<Vec<Photo>, PhotoError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| PhotoError::io(&self.dir, e))?;
        let mut photos = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| PhotoError::io(&self.dir, e))?;
            let path = entry.path();
            if !is_image(&path) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            photos.push(Photo {
                name: stem(&path),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size_bytes: metadata.len(),
                path,
            });
        }

        photos.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(photos)
    }

    pub fn next_capture_path(&self, extension: &str) -> Result<PathBuf, PhotoError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| PhotoError::io(&self.dir, e))?;
        let highest = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| capture_index(&e.path()))
            .max();
        let next = highest.map_or(1, |n| n + 1);
        Ok(self
            .dir
            .join(format!("{}{}.{}", CAPTURE_PREFIX, next, extension)))
    }

    pub fn save_capture(&self, bytes: &[u8], extension: &str) -> Result<PathBuf, PhotoError> {
        let path = self.next_capture_path(extension)?;
        fs::write(&path, bytes).map_err(|e| PhotoError::io(&path, e))?;
        info!("Saved capture {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Rename a photo to `new_name`, keeping its extension
    pub fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf, PhotoError> {
        let new_name = new_name.trim();
        if new_name.is_empty()
            || new_name.contains(['/', '\\'])
            || new_name == "."
            || new_name == ".."
        {
            return Err(PhotoError::InvalidName(new_name.to_string()));
        }
        if !path.is_file() {
            return Err(PhotoError::NotFound(path.to_path_buf()));
        }

        let mut target = self.dir.join(new_name);
        if let Some(ext) = path.extension() {
            target.set_extension(ext);
        }
        if target == path {
            return Ok(target);
        }
        if target.exists() {
            return Err(PhotoError::AlreadyExists(target));
        }

        fs::rename(path, &target).map_err(|e| PhotoError::io(path, e))?;
        info!("Renamed {} to {}", path.display(), target.display());
        Ok(target)
    }

    pub fn delete(&self, path: &Path) -> Result<(), PhotoError> {
        if !path.is_file() {
            return Err(PhotoError::NotFound(path.to_path_buf()));
        }
        fs::remove_file(path).map_err(|e| PhotoError::io(path, e))?;
        info!("Deleted {}", path.display());
        Ok(())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn capture_index(path: &Path) -> Option<u32> {
    if !is_image(path) {
        return None;
    }
    stem(path).strip_prefix(CAPTURE_PREFIX)?.parse().ok()
}

/// Encode a binary PPM test frame with a gradient and a marker column at
/// `heading_degrees`. Used where no camera backend exists.
pub fn placeholder_frame(width: u32, height: u32, heading_degrees: f64) -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", width, height);
    let mut bytes = Vec::with_capacity(header.len() + (width * height * 3) as usize);
    bytes.extend_from_slice(header.as_bytes());

    let marker = ((heading_degrees.rem_euclid(360.0) / 360.0) * width as f64) as u32;
    for y in 0..height {
        for x in 0..width {
            if x == marker {
                bytes.extend_from_slice(&[255, 40, 40]);
            } else {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                bytes.extend_from_slice(&[r, g, 128]);
            }
        }
    }
    bytes
}

/// Raw RGB pixels of a binary PPM frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmFrame {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

/// Parse a `P6` frame with an 8-bit max value. Comments are not supported.
pub fn decode_ppm(bytes: &[u8]) -> Option<PpmFrame> {
    let mut fields = Vec::with_capacity(4);
    let mut pos = 0;
    while fields.len() < 4 {
        while bytes.get(pos)?.is_ascii_whitespace() {
            pos += 1;
        }
        let start = pos;
        while !bytes.get(pos)?.is_ascii_whitespace() {
            pos += 1;
        }
        fields.push(std::str::from_utf8(&bytes[start..pos]).ok()?);
    }
    // Exactly one whitespace byte separates the header from the pixels
    pos += 1;

    if fields[0] != "P6" || fields[3] != "255" {
        return None;
    }
    let width: usize = fields[1].parse().ok()?;
    let height: usize = fields[2].parse().ok()?;
    let rgb = bytes.get(pos..pos + width.checked_mul(height)?.checked_mul(3)?)?;
    Some(PpmFrame {
        width,
        height,
        rgb: rgb.to_vec(),
    })
}
