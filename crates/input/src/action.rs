/// A camera-control action produced from pointer input.
///
/// Deltas are in physical pixels; the controls scale them by the viewport height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    /// Orbit around the target (primary-button drag).
    Rotate { dx: f32, dy: f32 },
    /// Dolly toward (positive) or away from (negative) the target, in wheel steps.
    Zoom(f32),
    /// Translate camera and target together (secondary-button drag).
    Pan { dx: f32, dy: f32 },
}

impl PointerAction {
    /// True when the action carries no movement.
    pub fn is_noop(&self) -> bool {
        match *self {
            Self::Rotate { dx, dy } | Self::Pan { dx, dy } => dx == 0.0 && dy == 0.0,
            Self::Zoom(delta) => delta == 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_deltas_are_noops() {
        assert!(PointerAction::Rotate { dx: 0.0, dy: 0.0 }.is_noop());
        assert!(PointerAction::Zoom(0.0).is_noop());
        assert!(!PointerAction::Pan { dx: 1.0, dy: 0.0 }.is_noop());
    }
}
