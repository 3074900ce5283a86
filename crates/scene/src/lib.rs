//! Scene state for the asset viewer.
//!
//! The scene graph owns every node the renderer draws: lights, loaded meshes and
//! their materials, plus the single active environment (ambient lighting source).
//!
//! # Invariants
//! - All mutations flow through explicit operations and are recorded as events.
//! - Traversal order is the insertion order of each node's children.
//! - At most one environment is active; a later `set_environment` replaces it.

mod camera;
mod environment;
mod geometry;
mod graph;
mod material;

pub use camera::PerspectiveCamera;
pub use environment::{Environment, EnvironmentMap, EnvironmentSource, FloatImage};
pub use geometry::Geometry;
pub use graph::{Light, LightKind, MeshNode, Node, NodeKind, SceneError, SceneEvent, SceneGraph};
pub use material::{Material, StandardMaterial};
