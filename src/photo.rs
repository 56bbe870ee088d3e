use crate::error::PhotoError;
use crate::store::OverrideStore;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSettings {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            jpeg_quality: 80,
        }
    }
}

/// Uniform factor bringing both sides within `max`; never above 1.
pub fn scale_factor(width: u32, height: u32, max: u32) -> f64 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    let max = f64::from(max);
    (max / f64::from(width)).min(max / f64::from(height)).min(1.0)
}

pub fn target_size(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = scale_factor(width, height, max);
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w, h)
}

/// Decode any supported image, downscale it and re-encode as JPEG.
pub fn reencode(raw: &[u8], settings: PhotoSettings) -> Result<Vec<u8>, PhotoError> {
    let img = image::load_from_memory(raw)?;
    let (w, h) = target_size(img.width(), img.height(), settings.max_dimension);
    let img = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, settings.jpeg_quality);
    img.to_rgb8().write_with_encoder(encoder)?;
    Ok(out)
}

/// Read a user-chosen file and store it as the override photo for `id`.
///
/// Returns the stored JPEG bytes.
pub async fn capture<S: OverrideStore>(
    store: &S,
    id: &str,
    path: &Path,
    settings: PhotoSettings,
) -> Result<Vec<u8>, PhotoError> {
    let raw = tokio::fs::read(path).await.map_err(|source| PhotoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let jpeg = reencode(&raw, settings)?;
    store.set_override(id, &jpeg).await?;
    tracing::info!(record = id, bytes = jpeg.len(), "saved user photo");
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([40, 160, 90]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn dimensions(jpeg: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_scale_factor_never_upscales() {
        assert_eq!(scale_factor(600, 400, 1200), 1.0);
        assert_eq!(scale_factor(2400, 1200, 1200), 0.5);
        assert_eq!(scale_factor(1000, 4000, 1000), 0.25);
        assert_eq!(scale_factor(0, 10, 1200), 1.0);
    }

    #[test]
    fn test_target_size_bounds_both_sides() {
        assert_eq!(target_size(3000, 2000, 1200), (1200, 800));
        assert_eq!(target_size(2000, 3000, 1200), (800, 1200));
        assert_eq!(target_size(5000, 1, 1000), (1000, 1));
    }

    #[test]
    fn test_reencode_downscales_to_jpeg() {
        let jpeg = reencode(&png(240, 120), PhotoSettings { max_dimension: 60, jpeg_quality: 80 }).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
        assert_eq!(dimensions(&jpeg), (60, 30));
    }

    #[test]
    fn test_reencode_keeps_small_images() {
        let jpeg = reencode(&png(32, 16), PhotoSettings::default()).unwrap();
        assert_eq!(dimensions(&jpeg), (32, 16));
    }

    #[test]
    fn test_reencode_rejects_garbage() {
        let err = reencode(b"definitely not an image", PhotoSettings::default()).unwrap_err();
        assert!(matches!(err, PhotoError::Image(_)));
    }

    #[tokio::test]
    async fn test_capture_persists_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bird.png");
        std::fs::write(&path, png(50, 50)).unwrap();

        let store = MemoryStore::default();
        let jpeg = capture(&store, "r1", &path, PhotoSettings::default()).await.unwrap();
        assert_eq!(store.get_override("r1").await.unwrap(), Some(jpeg));
    }

    #[tokio::test]
    async fn test_capture_surfaces_capacity_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bird.png");
        std::fs::write(&path, png(64, 64)).unwrap();

        let store = MemoryStore::new(16);
        let err = capture(&store, "r1", &path, PhotoSettings::default()).await.unwrap_err();
        assert!(matches!(err, PhotoError::Store(StoreError::CapacityExceeded { .. })));
        assert_eq!(store.get_override("r1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capture_missing_file() {
        let store = MemoryStore::default();
        let err = capture(&store, "r1", Path::new("/nonexistent/bird.jpg"), PhotoSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::Read { .. }));
    }
}
