//! wgpu render backend for the asset viewer.
//!
//! Draws every mesh node of the scene graph with a simple physically inspired
//! model: ambient lights, up to [`MAX_POINT_LIGHTS`] point lights, and the
//! environment's average radiance scaled per material.
//!
//! # Invariants
//! - Renderer never mutates scene state.
//! - GPU buffers mirror the scene's mesh nodes; stale ones are freed on the next frame.

mod gpu;
mod shaders;

pub use gpu::{MAX_POINT_LIGHTS, WgpuRenderer};
