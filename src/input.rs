#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Press,
    Release,
    Move,
}

/// A pointer event in client coordinates, as delivered by the host window.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn press(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Press,
            x,
            y,
        }
    }

    #[allow(dead_code)]
    pub fn release(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Release,
            x,
            y,
        }
    }

    #[allow(dead_code)]
    pub fn moved(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Move,
            x,
            y,
        }
    }
}

/// Where the rendering surface sits inside the host's coordinate space.
///
/// A surface embedded in a larger layout accumulates the offsets of its
/// parents and the host's scroll position; a surface that fills its window
/// has neither. Either way this maps client coordinates onto the surface.
#[derive(Debug, Clone)]
pub struct CanvasGeometry {
    offsets: Vec<(f32, f32)>,
    scroll: (f32, f32),
    width: f32,
    height: f32,
}

impl CanvasGeometry {
    pub fn new(offsets: Vec<(f32, f32)>, scroll: (f32, f32), width: f32, height: f32) -> Self {
        Self {
            offsets,
            scroll,
            width,
            height,
        }
    }

    /// Geometry for a surface that fills the whole window.
    pub fn window(width: f32, height: f32) -> Self {
        Self::new(Vec::new(), (0.0, 0.0), width, height)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    #[allow(dead_code)]
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn origin(&self) -> (f32, f32) {
        let (mut left, mut top) = (0.0, 0.0);
        for (dx, dy) in &self.offsets {
            left += dx;
            top += dy;
        }
        (left + self.scroll.0, top - self.scroll.1)
    }

    /// Client coordinates to surface pixels, with the origin at the
    /// bottom-left so the result can index the pick target directly.
    pub fn to_surface(&self, x: f32, y: f32) -> (i32, i32) {
        let (left, top) = self.origin();
        let sx = x - left;
        let sy = self.height - (y - top);
        (sx.round() as i32, sy.round() as i32)
    }

    /// Client coordinates to normalized device coordinates in [-1, 1].
    #[allow(dead_code)]
    pub fn to_ndc(&self, x: f32, y: f32) -> (f32, f32) {
        let (left, top) = self.origin();
        let nx = 2.0 * ((x - left) - 0.5 * self.width) / self.width;
        let ny = 2.0 * (0.5 * self.height - (y - top)) / self.height;
        (nx, ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_tag_the_pointer_kind() {
        let press = PointerEvent::press(10.0, 20.0);
        assert_eq!(press.kind, PointerKind::Press);
        assert_eq!((press.x, press.y), (10.0, 20.0));
        assert_eq!(PointerEvent::release(0.0, 0.0).kind, PointerKind::Release);
        assert_eq!(PointerEvent::moved(0.0, 0.0).kind, PointerKind::Move);
    }

    #[test]
    fn window_geometry_flips_the_vertical_axis() {
        let geometry = CanvasGeometry::window(300.0, 300.0);
        assert_eq!(geometry.to_surface(150.0, 100.0), (150, 200));
        assert_eq!(geometry.to_surface(0.0, 300.0), (0, 0));
    }

    #[test]
    fn nested_offsets_and_scroll_shift_the_origin() {
        let geometry = CanvasGeometry::new(
            vec![(10.0, 20.0), (5.0, 5.0)],
            (3.0, 4.0),
            300.0,
            300.0,
        );
        // left = 10 + 5 + 3, top = 20 + 5 - 4.
        assert_eq!(geometry.to_surface(118.0, 121.0), (100, 200));
    }

    #[test]
    fn ndc_maps_center_and_corners() {
        let geometry = CanvasGeometry::window(300.0, 300.0);
        assert_eq!(geometry.to_ndc(150.0, 150.0), (0.0, 0.0));
        assert_eq!(geometry.to_ndc(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(geometry.to_ndc(300.0, 300.0), (1.0, -1.0));
    }

    #[test]
    fn resize_updates_the_mapping() {
        let mut geometry = CanvasGeometry::window(300.0, 300.0);
        geometry.resize(600.0, 300.0);
        assert_eq!(geometry.size(), (600.0, 300.0));
        assert_eq!(geometry.to_ndc(300.0, 150.0), (0.0, 0.0));
    }
}
