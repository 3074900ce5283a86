//! Interactive camera control.
//!
//! Raw window events are translated into [`PointerAction`]s by the host; the
//! [`OrbitControls`] consume actions and are advanced once per rendered frame.
//!
//! # Invariants
//! - Controls only move the camera inside [`OrbitControls::update`].
//! - Detached controls ignore every action.

pub mod action;
pub mod orbit;

pub use action::PointerAction;
pub use orbit::OrbitControls;
