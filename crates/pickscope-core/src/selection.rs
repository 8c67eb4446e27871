//! Current selection.

use crate::id::ObjectId;
use crate::pick::IdSet;

/// The set of currently selected objects.
pub type SelectionSet = IdSet;

/// Selection owned by the gesture interpreter.
///
/// Every completed gesture replaces the whole set; there is no additive mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selection: SelectionSet,
    revision: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection wholesale.
    pub fn replace(&mut self, selection: SelectionSet) {
        log::debug!("selection replaced: {} object(s)", selection.len());
        self.selection = selection;
        self.revision += 1;
    }

    /// Replaces the selection with a single object, or nothing.
    pub fn replace_with(&mut self, id: Option<ObjectId>) {
        self.replace(id.into_iter().collect());
    }

    pub fn clear(&mut self) {
        self.replace(SelectionSet::new());
    }

    pub fn get(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selection.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Bumped on every replacement, including replacements with an equal set.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
