use std::path::{Path, PathBuf};

use assetview_scene::{EnvironmentMap, FloatImage};

use crate::{AssetError, display};

/// Decode a panoramic environment image for equirectangular reflection mapping.
///
/// Any format the `image` crate understands is accepted; Radiance `.hdr` files
/// keep their full float range.
pub fn load_panorama(path: &Path) -> Result<EnvironmentMap, AssetError> {
    let image = decode(path)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width,
        height = image.height,
        "decoded panorama"
    );
    Ok(EnvironmentMap::equirectangular(image))
}

/// Decode six cube faces ordered +X, -X, +Y, -Y, +Z, -Z.
///
/// Faces must be square and share one edge length.
pub fn load_cubemap(faces: &[PathBuf; 6]) -> Result<EnvironmentMap, AssetError> {
    let decoded = [
        decode(&faces[0])?,
        decode(&faces[1])?,
        decode(&faces[2])?,
        decode(&faces[3])?,
        decode(&faces[4])?,
        decode(&faces[5])?,
    ];
    let expected = decoded[0].width;
    for (face, path) in decoded.iter().zip(faces) {
        if face.width != expected || face.height != expected {
            return Err(AssetError::CubemapFace {
                path: display(path),
                width: face.width,
                height: face.height,
                expected,
            });
        }
    }
    tracing::debug!(edge = expected, "decoded cubemap");
    Ok(EnvironmentMap::cube(decoded))
}

fn decode(path: &Path) -> Result<FloatImage, AssetError> {
    let rgb = image::open(path)
        .map_err(|source| AssetError::Image {
            path: display(path),
            source,
        })?
        .into_rgb32f();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.pixels().map(|p| p.0).collect();
    Ok(FloatImage::new(width, height, pixels))
}
