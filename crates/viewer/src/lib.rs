//! Asset viewer core: owns one scene for the lifetime of a mount.
//!
//! Mounting assembles the camera, lights, orbit controls and parameter panel
//! synchronously, starts the background loaders, then starts the render loop.
//! Loader results come back as [`LoadCompletion`] messages that the owner
//! feeds to [`Viewer::apply_completion`] between frames.
//!
//! # Invariants
//! - Scene mutations happen only on the thread that owns the [`Viewer`].
//! - A completion whose [`LivenessToken`] was invalidated never touches the scene.
//! - After [`Viewer::unmount`] the mount region holds neither the render surface
//!   nor the panel, and resize events are ignored.

pub mod config;
mod lifecycle;
mod loader;
mod region;
mod render_loop;
mod viewer;

pub use config::ViewerConfig;
pub use lifecycle::{LivenessToken, MountLifecycleState};
pub use loader::{ChannelSink, LoadCompletion, LoadKind, LoadResult, LoadSink, spawn_loads};
pub use region::{Element, HeadlessRegion, MountRegion};
pub use render_loop::{FrameHandle, RenderLoop};
pub use viewer::{ApplyOutcome, SceneHandle, Viewer, ViewerError};
