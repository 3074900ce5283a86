use assetview_common::NodeId;
use assetview_scene::{SceneError, SceneGraph};

/// Viewer-level parameters that are not fields of any single scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneParams {
    pub env_map_intensity: f32,
}

/// The field a control writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTarget {
    LightIntensity(NodeId),
    EnvMapIntensity,
}

/// Side effect run after a control's value has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnChange {
    /// Push `SceneParams::env_map_intensity` into every material that supports it.
    ApplyEnvMapIntensity,
}

/// A labelled, bounded numeric control.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBinding {
    pub label: String,
    pub target: ParamTarget,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub on_change: Option<OnChange>,
}

impl ParamBinding {
    pub fn new(label: impl Into<String>, target: ParamTarget, min: f32, max: f32) -> Self {
        Self {
            label: label.into(),
            target,
            min,
            max,
            step: 0.0,
            on_change: None,
        }
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn on_change(mut self, effect: OnChange) -> Self {
        self.on_change = Some(effect);
        self
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Errors from panel operations.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("panel has been destroyed")]
    Destroyed,
    #[error("no control labelled {0:?}")]
    UnknownLabel(String),
    #[error("a control labelled {0:?} already exists")]
    DuplicateLabel(String),
    #[error("control {label:?} has empty bounds [{min}, {max}]")]
    InvalidBounds { label: String, min: f32, max: f32 },
    #[error("control {0:?} was given a non-finite value")]
    NotFinite(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Panel of bound controls, owned by one mounted viewer.
#[derive(Debug, Clone)]
pub struct ParameterPanel {
    title: String,
    folder: String,
    width: f32,
    bindings: Vec<ParamBinding>,
    destroyed: bool,
}

impl ParameterPanel {
    pub fn new(title: impl Into<String>, folder: impl Into<String>, width: f32) -> Self {
        Self {
            title: title.into(),
            folder: folder.into(),
            width,
            bindings: Vec::new(),
            destroyed: false,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Register a control. The target field must already exist.
    pub fn bind(&mut self, binding: ParamBinding, scene: &SceneGraph) -> Result<(), PanelError> {
        if self.destroyed {
            return Err(PanelError::Destroyed);
        }
        if binding.min.is_nan() || binding.max.is_nan() || binding.min > binding.max {
            return Err(PanelError::InvalidBounds {
                label: binding.label,
                min: binding.min,
                max: binding.max,
            });
        }
        if self.binding(&binding.label).is_some() {
            return Err(PanelError::DuplicateLabel(binding.label));
        }
        if let ParamTarget::LightIntensity(id) = binding.target {
            let node = scene.get(id).ok_or(SceneError::NodeNotFound(id))?;
            node.as_light().ok_or(SceneError::NotALight(id))?;
        }
        tracing::debug!(label = %binding.label, min = binding.min, max = binding.max, "bound control");
        self.bindings.push(binding);
        Ok(())
    }

    fn binding(&self, label: &str) -> Option<&ParamBinding> {
        self.bindings.iter().find(|b| b.label == label)
    }

    /// Current value of a control's target field.
    pub fn value(
        &self,
        label: &str,
        scene: &SceneGraph,
        params: &SceneParams,
    ) -> Result<f32, PanelError> {
        let binding = self
            .binding(label)
            .ok_or_else(|| PanelError::UnknownLabel(label.to_string()))?;
        read(binding.target, scene, params)
    }

    /// Drive a control. The value is clamped to the binding's bounds, written to
    /// the target, then the side effect runs. Returns the value written.
    pub fn set(
        &mut self,
        label: &str,
        value: f32,
        scene: &mut SceneGraph,
        params: &mut SceneParams,
    ) -> Result<f32, PanelError> {
        if self.destroyed {
            return Err(PanelError::Destroyed);
        }
        let binding = self
            .binding(label)
            .ok_or_else(|| PanelError::UnknownLabel(label.to_string()))?;
        if !value.is_finite() {
            return Err(PanelError::NotFinite(label.to_string()));
        }
        let clamped = binding.clamp(value);

        match binding.target {
            ParamTarget::LightIntensity(id) => {
                scene.set_light_intensity(id, clamped)?;
            }
            ParamTarget::EnvMapIntensity => params.env_map_intensity = clamped,
        }
        if let Some(OnChange::ApplyEnvMapIntensity) = binding.on_change {
            let count = scene.set_env_map_intensity(params.env_map_intensity);
            tracing::trace!(count, "env intensity applied");
        }
        tracing::debug!(label, value = clamped, "parameter changed");
        Ok(clamped)
    }

    /// Release every control. Later binds and writes fail with `Destroyed`.
    pub fn destroy(&mut self) {
        self.bindings.clear();
        self.destroyed = true;
    }

    /// Draw the panel. Returns `(label, value)` for every control the user moved;
    /// the caller applies them through [`set`](Self::set).
    pub fn ui(
        &self,
        ctx: &egui::Context,
        scene: &SceneGraph,
        params: &SceneParams,
    ) -> Vec<(String, f32)> {
        let mut changes = Vec::new();
        if self.destroyed {
            return changes;
        }
        egui::Window::new(self.title.as_str())
            .default_width(self.width)
            .resizable(false)
            .show(ctx, |ui| {
                ui.collapsing(self.folder.as_str(), |ui| {
                    for binding in &self.bindings {
                        let Ok(mut value) = read(binding.target, scene, params) else {
                            continue;
                        };
                        let mut slider = egui::Slider::new(&mut value, binding.min..=binding.max)
                            .text(binding.label.as_str());
                        if binding.step > 0.0 {
                            slider = slider.step_by(f64::from(binding.step));
                        }
                        if ui.add(slider).changed() {
                            changes.push((binding.label.clone(), value));
                        }
                    }
                });
            });
        changes
    }
}

fn read(target: ParamTarget, scene: &SceneGraph, params: &SceneParams) -> Result<f32, PanelError> {
    match target {
        ParamTarget::LightIntensity(id) => {
            let node = scene.get(id).ok_or(SceneError::NodeNotFound(id))?;
            let light = node.as_light().ok_or(SceneError::NotALight(id))?;
            Ok(light.intensity)
        }
        ParamTarget::EnvMapIntensity => Ok(params.env_map_intensity),
    }
}
