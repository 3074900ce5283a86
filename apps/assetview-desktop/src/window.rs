use std::sync::{Arc, Mutex};

use assetview_common::SurfaceSize;
use assetview_input::action::PointerAction;
use assetview_viewer::{Element, LoadCompletion, LoadSink, MountRegion};
use winit::event::{MouseButton, MouseScrollDelta};
use winit::event_loop::EventLoopProxy;
use winit::window::Window;

/// Pixels of trackpad scroll that count as one wheel step.
const PIXELS_PER_WHEEL_STEP: f32 = 50.0;

/// The application window as a mount region.
pub struct WindowRegion {
    window: Arc<Window>,
    children: Vec<Element>,
}

impl WindowRegion {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            children: Vec::new(),
        }
    }
}

impl MountRegion for WindowRegion {
    fn size(&self) -> SurfaceSize {
        let inner = self.window.inner_size();
        SurfaceSize::new(inner.width, inner.height)
    }

    fn append_child(&mut self, element: Element) {
        if self.children.contains(&element) {
            return;
        }
        tracing::debug!(?element, "attached to window");
        self.children.push(element);
        if element == Element::RenderSurface {
            self.window.set_visible(true);
        }
    }

    fn remove_child(&mut self, element: Element) -> bool {
        let before = self.children.len();
        self.children.retain(|e| *e != element);
        let removed = self.children.len() != before;
        if removed {
            tracing::debug!(?element, "detached from window");
            if element == Element::RenderSurface {
                self.window.set_visible(false);
            }
        }
        removed
    }

    fn contains(&self, element: Element) -> bool {
        self.children.contains(&element)
    }
}

/// Sends loader completions into the winit event loop as user events.
pub struct ProxySink {
    proxy: Mutex<EventLoopProxy<LoadCompletion>>,
}

impl ProxySink {
    pub fn new(proxy: EventLoopProxy<LoadCompletion>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
        }
    }
}

impl LoadSink for ProxySink {
    fn deliver(&self, completion: LoadCompletion) {
        let proxy = match self.proxy.lock() {
            Ok(proxy) => proxy,
            Err(poisoned) => poisoned.into_inner(),
        };
        if proxy.send_event(completion).is_err() {
            tracing::debug!("event loop closed; completion dropped");
        }
    }
}

/// Turns raw mouse events into orbit actions.
///
/// Primary drag rotates, secondary drag pans, the wheel zooms. `over_ui` marks
/// events egui consumed: presses there start nothing and motion yields no
/// action, but releases and the cursor anchor are always tracked.
#[derive(Debug, Default)]
pub struct PointerTracker {
    rotating: bool,
    panning: bool,
    last: Option<(f64, f64)>,
}

impl PointerTracker {
    pub fn button(&mut self, button: MouseButton, pressed: bool, over_ui: bool) {
        if pressed && over_ui {
            return;
        }
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right => self.panning = pressed,
            _ => {}
        }
    }

    pub fn moved(&mut self, x: f64, y: f64, over_ui: bool) -> Option<PointerAction> {
        let previous = self.last.replace((x, y));
        let (px, py) = previous?;
        if over_ui {
            return None;
        }
        let dx = (x - px) as f32;
        let dy = (y - py) as f32;
        if self.rotating {
            Some(PointerAction::Rotate { dx, dy })
        } else if self.panning {
            Some(PointerAction::Pan { dx, dy })
        } else {
            None
        }
    }

    pub fn left(&mut self) {
        self.last = None;
    }

    pub fn wheel(delta: MouseScrollDelta) -> PointerAction {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_WHEEL_STEP,
        };
        PointerAction::Zoom(steps)
    }
}
