//! Draggable snap sheet - a height-animated panel with scrollable content
//!
//! The sheet settles on one of N ascending snap heights. Drags past either
//! end are rubber-banded, releases project the finger velocity forward
//! before picking the nearest snap, and flinging the content past its end
//! while open collapses the sheet.

pub mod spring;

use tracing::debug;

pub use spring::{Spring, SpringConfig};

/// Fraction of an over-drag that is rendered
pub const RUBBER_BAND_FACTOR: f32 = 0.3;
/// Seconds of release velocity projected forward when choosing a snap
pub const VELOCITY_PROJECTION_SECS: f32 = 0.15;
/// Content fling speed (units/s, toward the content end) that collapses the sheet
pub const COLLAPSE_FLING_VELOCITY: f32 = 300.0;
/// How close to the content end counts as "at the end"
pub const CONTENT_END_TOLERANCE: f32 = 20.0;

/// Imperative control surface handed to whoever owns the sheet
pub trait SheetHandle {
    /// Scroll the inner content; independent of sheet height
    fn scroll_to(&mut self, offset_y: f32, animated: bool);
    /// Request a snap transition; out-of-range indices are clamped
    fn snap_to_index(&mut self, index: usize);
}

/// Fixed chrome around the scroll area
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SheetLayout {
    pub top_inset: f32,
    pub handle_height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapState {
    snap_points: Vec<f32>,
    current_index: usize,
    current_height: f32,
}

impl SnapState {
    fn new(snap_points: Vec<f32>, initial_index: usize) -> Self {
        let mut points: Vec<f32> = snap_points.into_iter().filter(|p| p.is_finite()).collect();
        points.sort_by(f32::total_cmp);
        points.dedup();
        if points.is_empty() {
            points.push(0.0);
        }
        let current_index = initial_index.min(points.len() - 1);
        let current_height = points[current_index];
        Self {
            snap_points: points,
            current_index,
            current_height,
        }
    }

    pub fn snap_points(&self) -> &[f32] {
        &self.snap_points
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    pub fn min_height(&self) -> f32 {
        self.snap_points[0]
    }

    pub fn max_height(&self) -> f32 {
        self.snap_points[self.snap_points.len() - 1]
    }

    pub fn max_index(&self) -> usize {
        self.snap_points.len() - 1
    }

    /// Index of the snap point closest to `height` (lower index on ties)
    pub fn nearest_index(&self, height: f32) -> usize {
        let mut closest = 0;
        let mut min_distance = (self.snap_points[0] - height).abs();
        for (i, point) in self.snap_points.iter().enumerate().skip(1) {
            let distance = (point - height).abs();
            if distance < min_distance {
                min_distance = distance;
                closest = i;
            }
        }
        closest
    }
}

/// Where a drag started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOrigin {
    Handle,
    /// The content area; only draggable while collapsed
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetEvent {
    /// A snap animation finished on a different index
    SnapChanged { index: usize },
    /// Content scroll offset moved
    Scrolled,
}

/// Damp the part of `proposed` that falls outside `[min, max]`
pub fn rubber_band(proposed: f32, min: f32, max: f32) -> f32 {
    if proposed < min {
        min - (min - proposed) * RUBBER_BAND_FACTOR
    } else if proposed > max {
        max + (proposed - max) * RUBBER_BAND_FACTOR
    } else {
        proposed
    }
}

#[derive(Debug, Clone, Copy)]
struct DragGesture {
    start_height: f32,
}

#[derive(Debug, Clone, Default)]
struct ScrollArea {
    offset: f32,
    content_height: f32,
    animation: Option<Spring>,
}

pub struct DraggableSnapSheet {
    snap: SnapState,
    layout: SheetLayout,
    spring: SpringConfig,
    height_animation: Option<Spring>,
    drag: Option<DragGesture>,
    /// Last index announced through `SnapChanged`
    settled_index: usize,
    scroll: ScrollArea,
    events: Vec<SheetEvent>,
}

impl DraggableSnapSheet {
    pub fn new(snap_points: Vec<f32>, initial_index: usize, layout: SheetLayout) -> Self {
        let snap = SnapState::new(snap_points, initial_index);
        Self {
            settled_index: snap.current_index,
            snap,
            layout,
            spring: SpringConfig::SHEET,
            height_animation: None,
            drag: None,
            scroll: ScrollArea::default(),
            events: Vec::new(),
        }
    }

    pub fn with_spring(mut self, spring: SpringConfig) -> Self {
        self.spring = spring;
        self
    }

    pub fn snap_state(&self) -> &SnapState {
        &self.snap
    }

    pub fn current_index(&self) -> usize {
        self.snap.current_index
    }

    pub fn current_height(&self) -> f32 {
        self.snap.current_height
    }

    pub fn layout(&self) -> SheetLayout {
        self.layout
    }

    /// Fewer than two snap points means a fixed panel
    pub fn is_draggable(&self) -> bool {
        self.snap.snap_points.len() >= 2
    }

    pub fn is_collapsed(&self) -> bool {
        self.snap.current_index == 0
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_animating(&self) -> bool {
        self.height_animation.is_some() || self.scroll.animation.is_some()
    }

    /// Content only scrolls while the sheet is open
    pub fn scroll_enabled(&self) -> bool {
        self.snap.current_index > 0
    }

    /// Height of the scroll area between the inset and the handle
    pub fn viewport_height(&self) -> f32 {
        (self.snap.current_height - self.layout.top_inset - self.layout.handle_height).max(0.0)
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll.offset
    }

    pub fn content_height(&self) -> f32 {
        self.scroll.content_height
    }

    pub fn max_scroll_offset(&self) -> f32 {
        (self.scroll.content_height - self.viewport_height()).max(0.0)
    }

    pub fn set_content_height(&mut self, height: f32) {
        self.scroll.content_height = height.max(0.0);
        let max = self.max_scroll_offset();
        if self.scroll.offset > max {
            self.scroll.offset = max;
            self.scroll.animation = None;
            self.events.push(SheetEvent::Scrolled);
        }
    }

    pub fn drain_events(&mut self) -> Vec<SheetEvent> {
        std::mem::take(&mut self.events)
    }

    // --- gestures ---

    /// Start a drag; returns false when the gesture belongs elsewhere
    pub fn begin_drag(&mut self, origin: DragOrigin) -> bool {
        if !self.is_draggable() {
            return false;
        }
        if origin == DragOrigin::Body && !self.is_collapsed() {
            return false;
        }
        self.height_animation = None;
        self.drag = Some(DragGesture {
            start_height: self.snap.current_height,
        });
        true
    }

    /// Move an active drag by `delta_y` from its start (positive grows the sheet)
    pub fn drag_to(&mut self, delta_y: f32) {
        let Some(drag) = self.drag else {
            return;
        };
        let proposed = drag.start_height + delta_y;
        self.snap.current_height =
            rubber_band(proposed, self.snap.min_height(), self.snap.max_height());
    }

    /// Finish a drag; `velocity` in units/s, positive grows the sheet
    pub fn release_drag(&mut self, velocity: f32) -> usize {
        if self.drag.take().is_none() {
            return self.snap.current_index;
        }
        let projected = self.snap.current_height + velocity * VELOCITY_PROJECTION_SECS;
        let index = self.snap.nearest_index(projected);
        debug!(
            "Sheet released at {:.1} (v={:.1}), projected {:.1} -> index {}",
            self.snap.current_height, velocity, projected, index
        );
        self.animate_to(index, velocity);
        index
    }

    /// Scroll the content by a user gesture; ignored while collapsed
    pub fn scroll_by(&mut self, delta_y: f32) -> bool {
        if !self.scroll_enabled() {
            return false;
        }
        self.scroll.animation = None;
        let target = (self.scroll.offset + delta_y).clamp(0.0, self.max_scroll_offset());
        if target != self.scroll.offset {
            self.scroll.offset = target;
            self.events.push(SheetEvent::Scrolled);
        }
        true
    }

    /// Translate the content offset by `delta_y` without animating,
    /// carrying any in-flight scroll animation along
    pub fn shift_scroll(&mut self, delta_y: f32) {
        if let Some(spring) = self.scroll.animation.as_mut() {
            spring.shift(delta_y);
            self.scroll.offset = spring.value();
        } else {
            self.scroll.offset += delta_y;
        }
        self.scroll.offset = self.scroll.offset.clamp(0.0, self.max_scroll_offset());
        self.events.push(SheetEvent::Scrolled);
    }

    /// Content drag released; a fling past the end while open collapses the sheet
    pub fn end_content_drag(&mut self, velocity: f32) -> bool {
        let at_end = self.scroll.offset >= self.max_scroll_offset() - CONTENT_END_TOLERANCE;
        if at_end && velocity > COLLAPSE_FLING_VELOCITY && self.snap.current_index > 0 {
            debug!("Content flung past end (v={:.1}), collapsing", velocity);
            self.snap_to_index(0);
            return true;
        }
        false
    }

    // --- animation ---

    fn animate_to(&mut self, index: usize, velocity: f32) {
        self.snap.current_index = index;
        let target = self.snap.snap_points[index];
        let spring = Spring::new(self.snap.current_height, target, velocity, self.spring);
        if spring.is_settled() {
            self.snap.current_height = target;
            self.height_animation = None;
            self.settle();
        } else {
            self.height_animation = Some(spring);
        }
    }

    fn settle(&mut self) {
        if self.snap.current_index != self.settled_index {
            self.settled_index = self.snap.current_index;
            debug!("Sheet settled on index {}", self.settled_index);
            self.events.push(SheetEvent::SnapChanged {
                index: self.settled_index,
            });
        }
    }

    /// Advance animations by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if let Some(spring) = self.height_animation.as_mut() {
            let done = spring.update(dt);
            self.snap.current_height = spring.value();
            if done {
                self.height_animation = None;
                self.settle();
            }
        }

        if let Some(spring) = self.scroll.animation.as_mut() {
            let done = spring.update(dt);
            self.scroll.offset = spring.value();
            if done {
                self.scroll.animation = None;
            }
            self.events.push(SheetEvent::Scrolled);
        }
    }

    /// Tick until every animation has settled (bounded)
    pub fn settle_animations(&mut self, frame_secs: f32, max_frames: usize) {
        for _ in 0..max_frames {
            if !self.is_animating() {
                break;
            }
            self.tick(frame_secs);
        }
    }
}

impl SheetHandle for DraggableSnapSheet {
    fn scroll_to(&mut self, offset_y: f32, animated: bool) {
        let target = offset_y.clamp(0.0, self.max_scroll_offset());
        if animated {
            self.scroll.animation = Some(Spring::new(self.scroll.offset, target, 0.0, self.spring));
        } else {
            self.scroll.animation = None;
            self.scroll.offset = target;
            self.events.push(SheetEvent::Scrolled);
        }
    }

    fn snap_to_index(&mut self, index: usize) {
        if !self.is_draggable() {
            return;
        }
        if self.drag.is_some() {
            debug!("Ignoring snap to {} during an active drag", index);
            return;
        }
        let index = index.min(self.snap.max_index());
        self.animate_to(index, 0.0);
    }
}
