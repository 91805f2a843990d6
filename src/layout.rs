use crate::error::{Result, RipError};
use crate::grid::TileCoordinate;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-disk shape of one image's output.
///
/// Without a preview, tiles sit directly under `<out>/<image>/`. With one,
/// they go to `<out>/<image>/tiles/` and the preview sits at the image root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    tiles_dir: PathBuf,
    preview: Option<PathBuf>,
}

impl OutputLayout {
    pub fn new(out_root: &Path, image: &str, preview_filename: Option<&str>) -> Self {
        let root = out_root.join(image);
        match preview_filename {
            Some(name) => Self {
                tiles_dir: root.join("tiles"),
                preview: Some(root.join(name)),
                root,
            },
            None => Self {
                tiles_dir: root.clone(),
                preview: None,
                root,
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tiles_dir(&self) -> &Path {
        &self.tiles_dir
    }

    pub fn preview_path(&self) -> Option<&Path> {
        self.preview.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    pub fn tile_file_name(coord: TileCoordinate) -> String {
        format!("{}x{}.jpeg", coord.col, coord.row)
    }

    pub fn tile_path(&self, coord: TileCoordinate) -> PathBuf {
        self.tiles_dir.join(Self::tile_file_name(coord))
    }

    /// Claims the image root atomically: a root that already exists, even
    /// one made by a concurrent run, is reported as `OutputExists` and left
    /// untouched.
    pub fn create(&self) -> Result<()> {
        if let Some(parent) = self.root.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RipError::filesystem(parent, e))?;
        }
        match std::fs::create_dir(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RipError::OutputExists(self.root.clone()));
            }
            Err(e) => return Err(RipError::filesystem(&self.root, e)),
        }
        if self.tiles_dir != self.root {
            if let Err(e) = std::fs::create_dir(&self.tiles_dir) {
                self.remove();
                return Err(RipError::filesystem(&self.tiles_dir, e));
            }
        }
        debug!("created output layout at {}", self.root.display());
        Ok(())
    }

    /// Best effort; failures are logged and otherwise ignored.
    pub fn remove(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!("could not remove {}: {e}", self.root.display());
        }
    }
}
