use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a viewer instance is in its single mount lifetime.
///
/// `Unmounted -> Mounted -> TearingDown`; `TearingDown` is terminal. Mounting
/// again means constructing a new viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountLifecycleState {
    Unmounted,
    Mounted,
    TearingDown,
}

impl fmt::Display for MountLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unmounted => "unmounted",
            Self::Mounted => "mounted",
            Self::TearingDown => "tearing-down",
        };
        f.write_str(s)
    }
}

/// Shared flag tying background work to the scene that started it.
///
/// Clones observe the same flag. Invalidation is one-way.
#[derive(Debug, Clone)]
pub struct LivenessToken {
    alive: Arc<AtomicBool>,
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessToken {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// True when both tokens share one flag.
    pub fn same_scene(&self, other: &LivenessToken) -> bool {
        Arc::ptr_eq(&self.alive, &other.alive)
    }
}
