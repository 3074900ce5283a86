//! Live parameter panel.
//!
//! Numeric scene properties (light intensities, environment intensity) are bound
//! to labelled controls with bounds. Setting a control clamps the value, writes
//! it onto the bound field and then runs the binding's side effect, if any.
//!
//! # Invariants
//! - A binding's target exists at the time it is bound.
//! - Values written through the panel always lie within the binding's bounds.
//! - A destroyed panel accepts no further bindings or writes.

mod panel;

pub use panel::{OnChange, PanelError, ParamBinding, ParamTarget, ParameterPanel, SceneParams};
