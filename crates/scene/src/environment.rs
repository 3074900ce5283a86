use std::sync::Arc;

/// Decoded RGB float image.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 3]>,
}

impl FloatImage {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 3]>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// How an environment map is sampled when used for reflections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// Single panoramic image with equirectangular reflection mapping.
    Equirectangular,
    /// Six faces ordered +X, -X, +Y, -Y, +Z, -Z.
    Cube,
}

impl std::fmt::Display for EnvironmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equirectangular => f.write_str("equirectangular"),
            Self::Cube => f.write_str("cube"),
        }
    }
}

/// A decoded environment map: one panoramic image or six cube faces.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    pub source: EnvironmentSource,
    pub faces: Vec<FloatImage>,
}

impl EnvironmentMap {
    pub fn equirectangular(image: FloatImage) -> Self {
        Self {
            source: EnvironmentSource::Equirectangular,
            faces: vec![image],
        }
    }

    pub fn cube(faces: [FloatImage; 6]) -> Self {
        Self {
            source: EnvironmentSource::Cube,
            faces: faces.into(),
        }
    }

    /// Mean radiance over every texel of every face.
    pub fn average_radiance(&self) -> [f32; 3] {
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;
        for face in &self.faces {
            for px in &face.pixels {
                for (acc, c) in sum.iter_mut().zip(px) {
                    *acc += f64::from(*c);
                }
            }
            count += face.pixels.len();
        }
        if count == 0 {
            return [0.0; 3];
        }
        sum.map(|s| (s / count as f64) as f32)
    }
}

/// The scene's active ambient lighting source.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Where the map came from, for logs and debug output.
    pub label: String,
    pub map: Arc<EnvironmentMap>,
}

impl Environment {
    pub fn new(label: impl Into<String>, map: EnvironmentMap) -> Self {
        Self {
            label: label.into(),
            map: Arc::new(map),
        }
    }

    pub fn source(&self) -> EnvironmentSource {
        self.map.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: f32) -> FloatImage {
        FloatImage::new(2, 2, vec![[value; 3]; 4])
    }

    #[test]
    fn average_over_cube_faces() {
        let map = EnvironmentMap::cube([
            solid(0.0),
            solid(1.0),
            solid(0.0),
            solid(1.0),
            solid(0.0),
            solid(1.0),
        ]);
        assert_eq!(map.source, EnvironmentSource::Cube);
        assert_eq!(map.average_radiance(), [0.5; 3]);
    }

    #[test]
    fn empty_map_averages_to_black() {
        let map = EnvironmentMap::equirectangular(FloatImage::new(0, 0, Vec::new()));
        assert_eq!(map.average_radiance(), [0.0; 3]);
    }
}
