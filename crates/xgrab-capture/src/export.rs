//! Writing captures to image files.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::types::Capture;

/// Unpack 0xAARRGGBB samples into an RGBA image.
pub fn to_rgba_image(capture: &Capture) -> Result<RgbaImage> {
    let mut bytes = Vec::with_capacity(capture.len() * 4);
    for argb in capture.pixels() {
        let [a, r, g, b] = argb.to_be_bytes();
        bytes.extend_from_slice(&[r, g, b, a]);
    }
    RgbaImage::from_raw(capture.width(), capture.height(), bytes)
        .context("Capture buffer does not match its dimensions")
}

/// Resolve where a screenshot should go. Absolute paths are kept; relative
/// ones land in `output_dir` (tilde expanded), or the temp dir when unset.
pub fn resolve_output_path(path: &str, output_dir: Option<&str>) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let base = match output_dir {
        Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
        None => std::env::temp_dir(),
    };
    base.join(path)
}

/// Save a capture; the format follows the file extension (PNG when absent).
pub fn save(capture: &Capture, path: &Path) -> Result<PathBuf> {
    let path = if path.extension().is_none() {
        path.with_extension("png")
    } else {
        path.to_path_buf()
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    to_rgba_image(capture)?
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(
        "Saved {}x{} capture to {}",
        capture.width(),
        capture.height(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transport;
    use tempfile::TempDir;

    fn sample() -> Capture {
        Capture::new(
            2,
            2,
            Transport::Direct,
            vec![0xffff_0000, 0xff00_ff00, 0xff00_00ff, 0xff12_3456],
        )
    }

    #[test]
    fn test_rgba_channel_order() {
        let image = to_rgba_image(&sample()).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0xff, 0, 0, 0xff]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0xff, 0, 0xff]);
        assert_eq!(image.get_pixel(0, 1).0, [0, 0, 0xff, 0xff]);
        assert_eq!(image.get_pixel(1, 1).0, [0x12, 0x34, 0x56, 0xff]);
    }

    #[test]
    fn test_save_adds_png_extension() {
        let dir = TempDir::new().unwrap();
        let written = save(&sample(), &dir.path().join("shots/frame")).unwrap();
        assert_eq!(written.extension().unwrap(), "png");
        let loaded = image::open(&written).unwrap().to_rgba8();
        assert_eq!(loaded, to_rgba_image(&sample()).unwrap());
    }

    #[test]
    fn test_resolve_output_path() {
        assert_eq!(
            resolve_output_path("/abs/shot.png", Some("/ignored")),
            PathBuf::from("/abs/shot.png")
        );
        assert_eq!(
            resolve_output_path("shot.png", Some("/data/captures")),
            PathBuf::from("/data/captures/shot.png")
        );
        assert_eq!(
            resolve_output_path("shot.png", None),
            std::env::temp_dir().join("shot.png")
        );
    }
}
