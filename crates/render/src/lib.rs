//! Rendering adapter: renderer-agnostic backend interface.
//!
//! # Invariants
//! - A backend never mutates the scene graph.
//! - Each frame renders whatever the scene graph holds at call time.
//! - A disposed backend refuses to render.
//!
//! The headless [`DebugTextRenderer`] implements the same trait as the GPU
//! backend, so the viewer lifecycle can be driven without a window.

mod renderer;

pub use renderer::{DebugTextRenderer, RenderBackend, RenderError};
