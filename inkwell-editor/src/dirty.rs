/// Tracks whether the editable fields differ from what was last persisted.
///
/// Only flips a flag; it never triggers I/O.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyTracker {
    dirty: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field update. A change counts once the session holds any text.
    pub fn observe(&mut self, changed: bool, has_text: bool) {
        if changed && has_text {
            self.dirty = true;
        }
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_with_text_marks_dirty() {
        let mut tracker = DirtyTracker::new();
        tracker.observe(true, true);
        assert!(tracker.is_dirty());
    }

    #[test]
    fn test_unchanged_value_stays_clean() {
        let mut tracker = DirtyTracker::new();
        tracker.observe(false, true);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_change_to_empty_session_stays_clean() {
        let mut tracker = DirtyTracker::new();
        tracker.observe(true, false);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_mark_clean_resets() {
        let mut tracker = DirtyTracker::new();
        tracker.observe(true, true);
        tracker.mark_clean();
        assert!(!tracker.is_dirty());
        // A later no-op observation does not bring it back.
        tracker.observe(false, true);
        assert!(!tracker.is_dirty());
    }
}
