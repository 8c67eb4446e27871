//! Pointer-driven selection sessions.

use pickscope_core::{
    GestureInterpreter, GestureOutcome, GestureState, ObjectId, Picker, Result, SelectionSet, Vec2,
};

use crate::picker::ScenePicker;

/// Routes raw pointer events through the gesture interpreter to a picker and
/// keeps the resulting selection.
pub struct PickSession<P: Picker = ScenePicker> {
    picker: P,
    gesture: GestureInterpreter,
}

impl PickSession<ScenePicker> {
    /// Creates a session using the picker's configured drag threshold.
    pub fn new(picker: ScenePicker) -> Self {
        let threshold = picker.options().drag_threshold;
        Self::with_threshold(picker, threshold)
    }

    /// Removes an object from the scene. It drops out of the selection too.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        self.picker.remove_object(id)
    }
}

impl<P: Picker> PickSession<P> {
    /// Creates a session with an explicit click/drag threshold in pixels.
    pub fn with_threshold(picker: P, drag_threshold: f32) -> Self {
        Self {
            picker,
            gesture: GestureInterpreter::new(drag_threshold),
        }
    }

    pub fn on_pointer_down(&mut self, point: Vec2) -> GestureOutcome {
        self.gesture.on_pointer_down(point)
    }

    pub fn on_pointer_move(&mut self, point: Vec2) -> GestureOutcome {
        self.gesture.on_pointer_move(point)
    }

    /// Ends the gesture, picks, and replaces the selection.
    pub fn on_pointer_up(&mut self, point: Vec2) -> GestureOutcome {
        self.gesture.on_pointer_up(point, &mut self.picker)
    }

    /// Current selection, without objects removed or made non-selectable
    /// since it was picked.
    pub fn get_selection(&self) -> SelectionSet {
        self.gesture.live_selection(&self.picker)
    }

    pub fn gesture_state(&self) -> GestureState {
        self.gesture.state()
    }

    pub fn picker(&self) -> &P {
        &self.picker
    }

    pub fn picker_mut(&mut self) -> &mut P {
        &mut self.picker
    }

    pub fn into_picker(self) -> P {
        self.picker
    }
}
