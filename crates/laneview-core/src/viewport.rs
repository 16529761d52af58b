//! Viewport coordinate engine: world/screen transforms, zoom, and pan.
//!
//! World coordinates are millimeters with the origin at the bottom-left and
//! Y growing upward; screen coordinates are pixels with the origin at the
//! top-left and Y growing downward. The transform is
//! `px = offset_x + x * scale`, `py = offset_y + (max_y - y) * scale` with
//! `scale = fit_scale * zoom`, where `fit_scale` makes the world rectangle
//! exactly fill the viewport at `zoom = 1`.

use serde::{Deserialize, Serialize};

use crate::WorldExtent;

/// Zoom bounds and step factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Multiplicative step for discrete zoom input (buttons, keys).
    pub key_zoom_factor: f64,
    /// Multiplicative step per wheel tick.
    pub wheel_zoom_factor: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_min: 0.25,
            zoom_max: 4.0,
            key_zoom_factor: 1.1,
            wheel_zoom_factor: 1.08,
        }
    }
}

/// Host input routed to the viewport.
///
/// A platform shell translates its native events (window resize, mouse,
/// keyboard) into these; the engine never touches an event system directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Resize { width: f64, height: f64 },
    Wheel { delta_y: f64, x: f64, y: f64 },
    PanStart { x: f64, y: f64 },
    PanMove { x: f64, y: f64 },
    PanEnd,
    Key(char),
}

#[derive(Debug, Clone, Copy)]
struct PanBaseline {
    start_x: f64,
    start_y: f64,
    offset_x: f64,
    offset_y: f64,
}

/// Read-only view of the transform for render sinks and displays.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub width: f64,
    pub height: f64,
    pub fit_scale: f64,
    pub zoom: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub panning: bool,
}

/// Bidirectional world/screen mapping plus the input handlers that mutate it.
///
/// Mutating operations return `true` when the transform changed and the host
/// should redraw. Conversions return `None` until the first layout gives the
/// viewport a positive scale.
#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewConfig,
    world: WorldExtent,
    width: f64,
    height: f64,
    fit_scale: f64,
    zoom: f64,
    offset_x: f64,
    offset_y: f64,
    pan: Option<PanBaseline>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewConfig::default(), WorldExtent::default())
    }
}

impl Viewport {
    pub fn new(config: ViewConfig, world: WorldExtent) -> Self {
        Self {
            config,
            world,
            width: 0.0,
            height: 0.0,
            fit_scale: 0.0,
            zoom: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            pan: None,
        }
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.fit_scale * self.zoom
    }

    #[inline]
    pub fn world(&self) -> WorldExtent {
        self.world
    }

    #[inline]
    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            width: self.width,
            height: self.height,
            fit_scale: self.fit_scale,
            zoom: self.zoom,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            panning: self.pan.is_some(),
        }
    }

    /// Replace the world extent (a new session was initialized) and recenter.
    pub fn set_world(&mut self, world: WorldExtent) -> bool {
        self.world = world;
        self.reset_view()
    }

    /// Map a world point to screen pixels. `None` before the first layout.
    pub fn world_to_screen(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let s = self.scale();
        if !(s > 0.0) || !s.is_finite() {
            return None;
        }
        Some((
            self.offset_x + x * s,
            self.offset_y + (self.world.max_y - y) * s,
        ))
    }

    /// Map screen pixels to a world point. Exact inverse of
    /// [`Self::world_to_screen`]; `None` before the first layout.
    pub fn screen_to_world(&self, px: f64, py: f64) -> Option<(f64, f64)> {
        let s = self.scale();
        if !(s > 0.0) || !s.is_finite() {
            return None;
        }
        Some((
            (px - self.offset_x) / s,
            self.world.max_y - (py - self.offset_y) / s,
        ))
    }

    /// Adopt new viewport dimensions, keeping the world point at the old
    /// viewport center fixed at the new center. Zoom is untouched. The first
    /// layout (no previous valid scale) centers the whole world instead.
    pub fn on_resize(&mut self, width: f64, height: f64) -> bool {
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let center = self.screen_to_world(self.width * 0.5, self.height * 0.5);
        self.width = width;
        self.height = height;
        self.fit_scale = self.compute_fit_scale();
        match center {
            Some((wx, wy)) => {
                let s = self.scale();
                self.offset_x = width * 0.5 - wx * s;
                self.offset_y = height * 0.5 - (self.world.max_y - wy) * s;
                true
            }
            None => self.reset_view(),
        }
    }

    /// Clamp `new_zoom` into the configured bounds and apply it while keeping
    /// the world point under `anchor` (default: viewport center) stationary
    /// on screen. Returns `false` when the clamped zoom equals the current
    /// one.
    pub fn set_zoom(&mut self, new_zoom: f64, anchor: Option<(f64, f64)>) -> bool {
        let clamped = new_zoom.clamp(self.config.zoom_min, self.config.zoom_max);
        if clamped == self.zoom {
            return false;
        }
        let (ax, ay) = anchor.unwrap_or((self.width * 0.5, self.height * 0.5));
        let Some((wx, wy)) = self.screen_to_world(ax, ay) else {
            // Not laid out yet; just record the zoom for the first layout.
            self.zoom = clamped;
            return false;
        };
        self.zoom = clamped;
        let s = self.scale();
        self.offset_x = ax - wx * s;
        self.offset_y = ay - (self.world.max_y - wy) * s;
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom * self.config.key_zoom_factor, None)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom / self.config.key_zoom_factor, None)
    }

    /// Wheel zoom anchored at the cursor. Scroll direction picks the side of
    /// the multiplicative step.
    pub fn handle_wheel(&mut self, delta_y: f64, x: f64, y: f64) -> bool {
        if delta_y == 0.0 {
            return false;
        }
        let factor = if delta_y > 0.0 {
            1.0 / self.config.wheel_zoom_factor
        } else {
            self.config.wheel_zoom_factor
        };
        self.set_zoom(self.zoom * factor, Some((x, y)))
    }

    /// Back to zoom 1 with the whole world rectangle centered in the
    /// viewport. Not anchor-preserving.
    pub fn reset_view(&mut self) -> bool {
        self.zoom = 1.0;
        self.fit_scale = self.compute_fit_scale();
        let s = self.scale();
        self.offset_x = (self.width - s * self.world.max_x) * 0.5;
        self.offset_y = (self.height - s * self.world.max_y) * 0.5;
        true
    }

    /// Capture the pan baseline. Subsequent [`Self::pan_to`] calls offset
    /// from this baseline, never reinterpreting mid-drag.
    pub fn begin_pan(&mut self, x: f64, y: f64) {
        self.pan = Some(PanBaseline {
            start_x: x,
            start_y: y,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        });
    }

    pub fn pan_to(&mut self, x: f64, y: f64) -> bool {
        let Some(baseline) = self.pan else {
            return false;
        };
        self.offset_x = baseline.offset_x + (x - baseline.start_x);
        self.offset_y = baseline.offset_y + (y - baseline.start_y);
        true
    }

    pub fn end_pan(&mut self) -> bool {
        self.pan.take();
        false
    }

    /// Route one host event. Key bindings follow the reference UI: `+`/`=`
    /// zoom in, `-`/`_` zoom out, `0` resets the view.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Resize { width, height } => self.on_resize(width, height),
            InputEvent::Wheel { delta_y, x, y } => self.handle_wheel(delta_y, x, y),
            InputEvent::PanStart { x, y } => {
                self.begin_pan(x, y);
                false
            }
            InputEvent::PanMove { x, y } => self.pan_to(x, y),
            InputEvent::PanEnd => self.end_pan(),
            InputEvent::Key(ch) => match ch {
                '+' | '=' => self.zoom_in(),
                '-' | '_' => self.zoom_out(),
                '0' => self.reset_view(),
                _ => false,
            },
        }
    }

    fn compute_fit_scale(&self) -> f64 {
        let world_w = self.world.max_x.max(1.0);
        let world_h = self.world.max_y.max(1.0);
        (self.width / world_w).min(self.height / world_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn laid_out_viewport() -> Viewport {
        let mut view = Viewport::new(ViewConfig::default(), WorldExtent::new(1000.0, 1000.0));
        assert!(view.on_resize(800.0, 600.0));
        view
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= EPS
    }

    #[test]
    fn transforms_unavailable_before_layout() {
        let view = Viewport::default();
        assert!(view.world_to_screen(0.0, 0.0).is_none());
        assert!(view.screen_to_world(0.0, 0.0).is_none());
    }

    #[test]
    fn fit_scale_centers_world_with_margins() {
        let view = laid_out_viewport();
        let snap = view.snapshot();
        assert!(approx_eq(snap.fit_scale, 0.6));

        // Top-left world corner (0, max_y) lands at the offset.
        let (px, py) = view.world_to_screen(0.0, 1000.0).unwrap();
        assert!(approx_eq(px, snap.offset_x));
        assert!(approx_eq(py, snap.offset_y));
        // 600x600 render rect centered horizontally, 100 px margins.
        assert!(approx_eq(snap.offset_x, 100.0));
        assert!(approx_eq(snap.offset_y, 0.0));
        let (brx, bry) = view.world_to_screen(1000.0, 0.0).unwrap();
        assert!(approx_eq(brx, 700.0));
        assert!(approx_eq(bry, 600.0));
    }

    #[test]
    fn screen_world_round_trip() {
        let mut view = laid_out_viewport();
        view.set_zoom(1.7, Some((120.0, 80.0)));
        view.begin_pan(10.0, 10.0);
        view.pan_to(57.0, -13.0);
        view.end_pan();
        for &(x, y) in &[(0.0, 0.0), (1000.0, 1000.0), (12.5, 987.25), (640.0, 3.0)] {
            let (px, py) = view.world_to_screen(x, y).unwrap();
            let (rx, ry) = view.screen_to_world(px, py).unwrap();
            assert!(approx_eq(rx, x), "x: {x} vs {rx}");
            assert!(approx_eq(ry, y), "y: {y} vs {ry}");
        }
    }

    #[test]
    fn zoom_preserves_anchor_point() {
        let mut view = laid_out_viewport();
        let anchor = (250.0, 420.0);
        let before = view.screen_to_world(anchor.0, anchor.1).unwrap();
        assert!(view.set_zoom(2.5, Some(anchor)));
        let (px, py) = view.world_to_screen(before.0, before.1).unwrap();
        assert!(approx_eq(px, anchor.0));
        assert!(approx_eq(py, anchor.1));
    }

    #[test]
    fn zoom_defaults_to_center_anchor() {
        let mut view = laid_out_viewport();
        let before = view.screen_to_world(400.0, 300.0).unwrap();
        assert!(view.set_zoom(0.5, None));
        let (px, py) = view.world_to_screen(before.0, before.1).unwrap();
        assert!(approx_eq(px, 400.0));
        assert!(approx_eq(py, 300.0));
    }

    #[test]
    fn zoom_clamps_and_reports_no_change() {
        let mut view = laid_out_viewport();
        assert!(view.set_zoom(99.0, None));
        assert!(approx_eq(view.zoom(), 4.0));
        // Already at the max; clamped value equals current zoom.
        assert!(!view.set_zoom(50.0, None));
        assert!(view.set_zoom(1e-9, None));
        assert!(approx_eq(view.zoom(), 0.25));
    }

    #[test]
    fn resize_preserves_view_center() {
        let mut view = laid_out_viewport();
        view.set_zoom(2.0, Some((100.0, 100.0)));
        let old_center = view.screen_to_world(400.0, 300.0).unwrap();
        assert!(view.on_resize(1200.0, 500.0));
        let (px, py) = view.world_to_screen(old_center.0, old_center.1).unwrap();
        assert!(approx_eq(px, 600.0));
        assert!(approx_eq(py, 250.0));
        assert!(approx_eq(view.zoom(), 2.0));
    }

    #[test]
    fn resize_recomputes_fit_scale() {
        let mut view = laid_out_viewport();
        view.on_resize(500.0, 2000.0);
        assert!(approx_eq(view.snapshot().fit_scale, 0.5));
    }

    #[test]
    fn pan_offsets_from_drag_baseline() {
        let mut view = laid_out_viewport();
        let snap = view.snapshot();
        view.begin_pan(300.0, 200.0);
        assert!(view.is_panning());
        assert!(view.pan_to(310.0, 190.0));
        // Intermediate moves accumulate from the baseline, not each other.
        assert!(view.pan_to(355.0, 230.0));
        let moved = view.snapshot();
        assert!(approx_eq(moved.offset_x, snap.offset_x + 55.0));
        assert!(approx_eq(moved.offset_y, snap.offset_y + 30.0));
        view.end_pan();
        assert!(!view.is_panning());
        assert!(!view.pan_to(400.0, 400.0));
    }

    #[test]
    fn reset_view_recenters_at_unit_zoom() {
        let mut view = laid_out_viewport();
        view.set_zoom(3.0, Some((0.0, 0.0)));
        view.begin_pan(0.0, 0.0);
        view.pan_to(-200.0, 95.0);
        view.end_pan();
        assert!(view.reset_view());
        let snap = view.snapshot();
        assert!(approx_eq(snap.zoom, 1.0));
        assert!(approx_eq(snap.offset_x, 100.0));
        assert!(approx_eq(snap.offset_y, 0.0));
    }

    #[test]
    fn key_bindings_route_to_zoom_and_reset() {
        let mut view = laid_out_viewport();
        assert!(view.handle_input(InputEvent::Key('+')));
        assert!(approx_eq(view.zoom(), 1.1));
        assert!(view.handle_input(InputEvent::Key('-')));
        assert!(approx_eq(view.zoom(), 1.0));
        assert!(view.handle_input(InputEvent::Key('0')));
        assert!(!view.handle_input(InputEvent::Key('q')));
    }

    #[test]
    fn wheel_direction_sets_zoom_sign() {
        let mut view = laid_out_viewport();
        assert!(view.handle_wheel(-120.0, 400.0, 300.0));
        assert!(view.zoom() > 1.0);
        assert!(view.handle_wheel(120.0, 400.0, 300.0));
        assert!(approx_eq(view.zoom(), 1.0));
        assert!(!view.handle_wheel(0.0, 400.0, 300.0));
    }

    #[test]
    fn set_world_recenters_for_new_session() {
        let mut view = laid_out_viewport();
        view.set_zoom(2.0, None);
        assert!(view.set_world(WorldExtent::new(100_000.0, 14_628.0)));
        let snap = view.snapshot();
        assert!(approx_eq(snap.zoom, 1.0));
        assert!(approx_eq(snap.fit_scale, 800.0 / 100_000.0));
    }
}
