//! Click/drag gesture interpretation.
//!
//! A pointer-down/up pair that moved less than the drag threshold is a click
//! and resolves through a point pick. Anything longer is a marquee drag and
//! resolves through a region pick over the spanned rectangle. Either way the
//! selection is replaced.

use glam::Vec2;

use crate::error::Result;
use crate::id::ObjectId;
use crate::pick::{IdSet, PickResult};
use crate::selection::{SelectionSet, SelectionState};

/// Something that can answer point and region picks.
pub trait Picker {
    /// Nearest object under a screen point.
    fn pick_point(&mut self, point: Vec2) -> Result<PickResult>;

    /// Every object visible in the rectangle spanned by two screen points.
    fn pick_region(&mut self, start: Vec2, end: Vec2) -> Result<IdSet>;

    /// Whether `id` may still be reported. Selections are filtered through
    /// this, so objects removed after being selected drop out.
    fn is_live(&self, _id: ObjectId) -> bool {
        true
    }
}

/// Pointer gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Dragging {
        start: Vec2,
        current: Vec2,
    },
}

/// What a pointer event did.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// The event does not apply in the current state.
    Ignored,
    /// A gesture is in progress; nothing was picked.
    Tracking,
    /// A click resolved through a point pick.
    Point(PickResult),
    /// A drag resolved through a region pick.
    Region(IdSet),
    /// The pick failed; the selection was cleared.
    Failed,
}

/// Gesture state machine and the selection it drives.
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    state: GestureState,
    drag_threshold: f32,
    selection: SelectionState,
}

impl Default for GestureInterpreter {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl GestureInterpreter {
    /// Creates an idle interpreter with the given click/drag threshold in pixels.
    pub fn new(drag_threshold: f32) -> Self {
        Self {
            state: GestureState::Idle,
            drag_threshold: drag_threshold.max(0.0),
            selection: SelectionState::new(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn drag_threshold(&self) -> f32 {
        self.drag_threshold
    }

    pub fn selection(&self) -> &SelectionSet {
        self.selection.get()
    }

    /// The selection restricted to identifiers `picker` still knows.
    pub fn live_selection(&self, picker: &impl Picker) -> SelectionSet {
        self.selection
            .get()
            .iter()
            .copied()
            .filter(|&id| picker.is_live(id))
            .collect()
    }

    pub fn selection_state(&self) -> &SelectionState {
        &self.selection
    }

    pub fn on_pointer_down(&mut self, point: Vec2) -> GestureOutcome {
        match self.state {
            GestureState::Idle => {
                self.state = GestureState::Dragging {
                    start: point,
                    current: point,
                };
                GestureOutcome::Tracking
            }
            GestureState::Dragging { .. } => GestureOutcome::Ignored,
        }
    }

    pub fn on_pointer_move(&mut self, point: Vec2) -> GestureOutcome {
        match &mut self.state {
            GestureState::Dragging { current, .. } => {
                *current = point;
                GestureOutcome::Tracking
            }
            GestureState::Idle => GestureOutcome::Ignored,
        }
    }

    /// Finishes the gesture and replaces the selection with its result.
    pub fn on_pointer_up(&mut self, point: Vec2, picker: &mut impl Picker) -> GestureOutcome {
        let GestureState::Dragging { start, .. } = self.state else {
            return GestureOutcome::Ignored;
        };
        self.state = GestureState::Idle;
        let end = point;

        let distance = start.distance(end);
        let outcome = if distance < self.drag_threshold {
            log::debug!("click at {end} (moved {distance:.1}px)");
            picker.pick_point(end).map(|result| {
                self.selection.replace_with(result.id.filter(|_| result.hit));
                GestureOutcome::Point(result)
            })
        } else {
            log::debug!("drag from {start} to {end}");
            picker.pick_region(start, end).map(|ids| {
                self.selection.replace(ids.clone());
                GestureOutcome::Region(ids)
            })
        };

        outcome.unwrap_or_else(|err| {
            log::warn!("pick failed, clearing selection: {err}");
            self.selection.clear();
            GestureOutcome::Failed
        })
    }
}
