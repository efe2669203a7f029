use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::error::{DermaError, Result};

/// Encode `image` as PNG at `path`.
///
/// The bytes go to a hidden sibling first and are renamed into place, so a
/// reader of `path` never observes a half-written file.
pub fn write_png(image: &RgbImage, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| DermaError::write(path, e))?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| DermaError::write(path, "output path has no file name"))?;
    let mut partial_name = std::ffi::OsString::from(".");
    partial_name.push(file_name);
    partial_name.push(".partial");
    let partial = path.with_file_name(partial_name);

    if let Err(e) = image.save_with_format(&partial, ImageFormat::Png) {
        let _ = std::fs::remove_file(&partial);
        return Err(DermaError::write(path, e));
    }

    if let Err(e) = std::fs::rename(&partial, path) {
        let _ = std::fs::remove_file(&partial);
        return Err(DermaError::write(path, e));
    }

    tracing::info!("Wrote {}x{} PNG to {}", image.width(), image.height(), path.display());

    Ok(path.to_path_buf())
}
