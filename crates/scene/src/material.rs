use serde::{Deserialize, Serialize};

/// Physically based material with environment reflectance scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardMaterial {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Multiplier applied to the environment's contribution.
    pub env_map_intensity: f32,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            env_map_intensity: 1.0,
        }
    }
}

/// Surface material attached to a mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    Standard(StandardMaterial),
    /// Unlit flat color; ignores lights and environment.
    Basic { color: [f32; 4] },
}

impl Material {
    pub fn base_color(&self) -> [f32; 4] {
        match self {
            Self::Standard(m) => m.base_color,
            Self::Basic { color } => *color,
        }
    }

    /// Environment intensity, for materials that support it.
    pub fn env_map_intensity(&self) -> Option<f32> {
        match self {
            Self::Standard(m) => Some(m.env_map_intensity),
            Self::Basic { .. } => None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::Standard(StandardMaterial::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_standard_supports_env_intensity() {
        assert_eq!(Material::default().env_map_intensity(), Some(1.0));
        let basic = Material::Basic {
            color: [1.0, 0.0, 0.0, 1.0],
        };
        assert_eq!(basic.env_map_intensity(), None);
        assert_eq!(basic.base_color(), [1.0, 0.0, 0.0, 1.0]);
    }
}
