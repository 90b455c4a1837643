//! Resource access seam.
//!
//! Asset files are opened through the [`Resources`] trait so the compiler
//! works against the filesystem, a virtual filesystem, or in-memory buffers
//! interchangeably. Image decoding is also behind the trait: the compiler
//! consumes decoded bitmaps and never links a codec itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CompileError, Result};

/// A decoded greyscale or RGB image.
#[derive(Debug, Clone)]
pub struct PngImage {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Channels per pixel: 1 (greyscale) or 3 (RGB).
    pub channels: usize,
    /// Row-major pixel bytes, `width * height * channels`.
    pub data: Vec<u8>,
}

/// Provider of asset bytes and image decoding.
pub trait Resources {
    /// Read the full contents of `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Decode a PNG byte stream. The default provider has no codec and
    /// reports the asset as unsupported; hosts with a decoder override this.
    fn decode_png(&self, _bytes: &[u8], path: &str) -> Result<PngImage> {
        Err(CompileError::asset(format!(
            "no PNG decoder available for '{path}'"
        )))
    }
}

/// Compose `modelfiledir + assetdir + file`, leaving absolute files alone.
#[must_use]
pub fn resolve_path(modelfiledir: &str, assetdir: &str, file: &str) -> String {
    let file_path = Path::new(file);
    if file_path.is_absolute() {
        return file.to_string();
    }
    let mut path = PathBuf::from(modelfiledir);
    path.push(assetdir);
    path.push(file);
    path.to_string_lossy().into_owned()
}

/// File stem of an asset path, used to name unnamed assets.
#[must_use]
pub fn file_stem(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory-backed resources.
#[derive(Debug, Default)]
pub struct DirResources;

impl Resources for DirResources {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(path)
            .map_err(|e| CompileError::asset(format!("could not read file '{path}': {e}")))
    }
}

/// In-memory resources keyed by path, for tests and embedded specs.
#[derive(Debug, Default)]
pub struct MemResources {
    files: HashMap<String, Vec<u8>>,
    images: HashMap<String, PngImage>,
}

impl MemResources {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register raw bytes under a path.
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    /// Register a pre-decoded image under a path. `read` will return an
    /// empty byte marker and `decode_png` the image itself.
    pub fn insert_image(&mut self, path: impl Into<String>, image: PngImage) {
        let path = path.into();
        self.files.insert(path.clone(), Vec::new());
        self.images.insert(path, image);
    }
}

impl Resources for MemResources {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CompileError::asset(format!("could not read file '{path}'")))
    }

    fn decode_png(&self, _bytes: &[u8], path: &str) -> Result<PngImage> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| CompileError::asset(format!("no PNG decoder available for '{path}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_compose() {
        let p = resolve_path("/models", "meshes", "arm.stl");
        assert_eq!(p, "/models/meshes/arm.stl");
        let p = resolve_path("", "", "arm.stl");
        assert_eq!(p, "arm.stl");
    }

    #[test]
    fn absolute_paths_pass_through() {
        let p = resolve_path("/models", "meshes", "/opt/assets/arm.stl");
        assert_eq!(p, "/opt/assets/arm.stl");
    }

    #[test]
    fn stem_names_assets() {
        assert_eq!(file_stem("meshes/left_foot.obj"), "left_foot");
        assert_eq!(file_stem("grid.png"), "grid");
    }

    #[test]
    fn mem_resources_round_trip() {
        let mut res = MemResources::new();
        res.insert("a.bin", vec![1, 2, 3]);
        assert_eq!(res.read("a.bin").unwrap(), vec![1, 2, 3]);
        assert!(res.read("b.bin").is_err());
    }

    #[test]
    fn dir_resources_read_real_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"xyz").unwrap();
        let res = DirResources;
        assert_eq!(res.read(&path.to_string_lossy()).unwrap(), b"xyz");
        assert!(res.read("definitely/missing/file").is_err());
    }
}
