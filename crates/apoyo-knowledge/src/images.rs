//! Images attached to knowledge entries.
//!
//! An entry's image lives at `<image_dir>/<key>.png`.  Absence of the file
//! simply means the entry has no image.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Extensions accepted by [`ImageLibrary::attach`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image not found: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("Unsupported image type {}: expected one of png, jpg, jpeg, gif", .0.display())]
    Unsupported(PathBuf),
    #[error("Failed to copy image to {}: {source}", dest.display())]
    Copy { dest: PathBuf, source: io::Error },
}

/// An image copied into the library under a temporary name, not yet visible
/// through [`ImageLibrary::find`].
#[derive(Debug)]
pub struct StagedImage {
    key: String,
    path: PathBuf,
}

/// Directory holding one image per key.
#[derive(Debug, Clone)]
pub struct ImageLibrary {
    dir: PathBuf,
}

impl ImageLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Conventional location of the image for `key`, whether or not it exists.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }

    /// The image for `key`, if one has been stored.
    pub fn find(&self, key: &str) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Copy `source` into the library under `key`, replacing any previous
    /// image, and return the destination path.
    pub fn attach(&self, key: &str, source: &Path) -> Result<PathBuf, ImageError> {
        let staged = self.stage(key, source)?;
        self.commit(staged)
    }

    /// Copy `source` next to the image for `key` without replacing it.
    /// Finish with [`ImageLibrary::commit`] or [`ImageLibrary::discard`].
    pub fn stage(&self, key: &str, source: &Path) -> Result<StagedImage, ImageError> {
        if !source.is_file() {
            return Err(ImageError::SourceMissing(source.to_path_buf()));
        }
        let supported = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|ok| ext.eq_ignore_ascii_case(ok)));
        if !supported {
            return Err(ImageError::Unsupported(source.to_path_buf()));
        }

        let path = self.dir.join(format!("{key}.png.tmp"));
        let copy_err = |source| ImageError::Copy {
            dest: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(copy_err)?;
        if let Err(e) = fs::copy(source, &path) {
            remove_quietly(&path);
            return Err(copy_err(e));
        }
        Ok(StagedImage {
            key: key.to_string(),
            path,
        })
    }

    /// Move a staged image into place and return its final path.
    pub fn commit(&self, staged: StagedImage) -> Result<PathBuf, ImageError> {
        let dest = self.path_for(&staged.key);
        if let Err(source) = fs::rename(&staged.path, &dest) {
            remove_quietly(&staged.path);
            return Err(ImageError::Copy { dest, source });
        }
        info!(key = %staged.key, to = %dest.display(), "Image attached");
        Ok(dest)
    }

    /// Drop a staged image, leaving any existing image for its key intact.
    pub fn discard(&self, staged: StagedImage) {
        remove_quietly(&staged.path);
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove staged image");
    }
}

impl Default for ImageLibrary {
    fn default() -> Self {
        Self::new("Imagenes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_follows_key_convention() {
        let lib = ImageLibrary::default();
        assert_eq!(lib.path_for("00110011"), PathBuf::from("Imagenes").join("00110011.png"));
    }

    #[test]
    fn find_returns_none_without_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let lib = ImageLibrary::new(dir.path());
        assert!(lib.find("00000000").is_none());
    }

    #[test]
    fn attach_copies_into_library() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let src = dir.path().join("foto.JPG");
        fs::write(&src, b"fake image bytes").unwrap();

        let lib = ImageLibrary::new(dir.path().join("Imagenes"));
        let dest = lib.attach("01010101", &src).unwrap();

        assert_eq!(dest, lib.path_for("01010101"));
        assert_eq!(fs::read(&dest).unwrap(), b"fake image bytes");
        assert_eq!(lib.find("01010101"), Some(dest));
    }

    #[test]
    fn discarded_stage_keeps_previous_image() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let lib = ImageLibrary::new(dir.path().join("Imagenes"));
        let old = dir.path().join("old.png");
        let new = dir.path().join("new.png");
        fs::write(&old, b"old").unwrap();
        fs::write(&new, b"new").unwrap();
        lib.attach("00000000", &old).unwrap();

        let staged = lib.stage("00000000", &new).unwrap();
        assert_eq!(fs::read(lib.path_for("00000000")).unwrap(), b"old");
        lib.discard(staged);

        assert_eq!(fs::read(lib.path_for("00000000")).unwrap(), b"old");
        let leftovers = fs::read_dir(lib.dir()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn attach_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let src = dir.path().join("notes.txt");
        fs::write(&src, b"text").unwrap();
        let lib = ImageLibrary::new(dir.path().join("Imagenes"));
        assert!(matches!(lib.attach("00000000", &src), Err(ImageError::Unsupported(_))));
        assert!(lib.find("00000000").is_none());
    }

    #[test]
    fn attach_rejects_missing_source() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let lib = ImageLibrary::new(dir.path());
        let err = lib.attach("00000000", &dir.path().join("ghost.png")).unwrap_err();
        assert!(matches!(err, ImageError::SourceMissing(_)));
    }
}
