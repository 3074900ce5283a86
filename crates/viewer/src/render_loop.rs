/// Handle of a scheduled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Self-rescheduling frame callback state.
///
/// Every scheduled frame's handle is kept, so [`cancel`](Self::cancel) always
/// stops the loop, whichever tick it is on.
#[derive(Debug, Default)]
pub struct RenderLoop {
    next_id: u64,
    pending: Option<FrameHandle>,
    ticks: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the first frame. Starting a running loop keeps its pending frame.
    pub fn start(&mut self) -> FrameHandle {
        if let Some(handle) = self.pending {
            return handle;
        }
        tracing::debug!("render loop started");
        self.schedule()
    }

    /// Record a completed tick and schedule the next frame. `None` once cancelled.
    pub fn reschedule(&mut self) -> Option<FrameHandle> {
        self.pending?;
        self.ticks += 1;
        Some(self.schedule())
    }

    /// Cancel the pending frame. Returns it if the loop was running.
    pub fn cancel(&mut self) -> Option<FrameHandle> {
        let handle = self.pending.take();
        if let Some(handle) = handle {
            tracing::debug!(frame = handle.id(), ticks = self.ticks, "render loop cancelled");
        }
        handle
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn schedule(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id);
        self.next_id += 1;
        self.pending = Some(handle);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedule_tracks_latest_handle() {
        let mut l = RenderLoop::new();
        let first = l.start();
        let second = l.reschedule().unwrap();
        assert_ne!(first, second);
        assert_eq!(l.pending(), Some(second));
        assert_eq!(l.ticks(), 1);
    }

    #[test]
    fn cancel_stops_after_any_number_of_ticks() {
        let mut l = RenderLoop::new();
        l.start();
        for _ in 0..5 {
            l.reschedule();
        }
        assert!(l.cancel().is_some());
        assert!(!l.is_running());
        assert_eq!(l.reschedule(), None);
        assert_eq!(l.cancel(), None);
        assert_eq!(l.ticks(), 5);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut l = RenderLoop::new();
        let a = l.start();
        assert_eq!(l.start(), a);
    }
}
