use assetview_common::SurfaceSize;

/// Elements a viewer attaches to its mount region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    RenderSurface,
    ParameterPanel,
}

/// The display area a viewer attaches its output to.
pub trait MountRegion {
    /// Current size in physical pixels.
    fn size(&self) -> SurfaceSize;

    fn append_child(&mut self, element: Element);

    /// Detach `element`. Returns false if it was not attached.
    fn remove_child(&mut self, element: Element) -> bool;

    fn contains(&self, element: Element) -> bool;
}

/// In-memory mount region with a settable size.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRegion {
    size: SurfaceSize,
    children: Vec<Element>,
}

impl HeadlessRegion {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: SurfaceSize::new(width, height),
            children: Vec::new(),
        }
    }

    /// Change the region's size. Does not notify anyone; the owner forwards
    /// the resize to the viewer.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = SurfaceSize::new(width, height);
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }
}

impl MountRegion for HeadlessRegion {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn append_child(&mut self, element: Element) {
        if !self.children.contains(&element) {
            self.children.push(element);
        }
    }

    fn remove_child(&mut self, element: Element) -> bool {
        let before = self.children.len();
        self.children.retain(|e| *e != element);
        self.children.len() != before
    }

    fn contains(&self, element: Element) -> bool {
        self.children.contains(&element)
    }
}
