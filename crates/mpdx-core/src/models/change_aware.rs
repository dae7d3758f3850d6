//! Field-level change tracking for synced records

use super::ChangedFieldSet;

/// Sync bookkeeping carried by every change-aware record.
///
/// `tracking` is transient: it is never persisted and defaults to off when a
/// record is loaded or decoded from a server payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeState {
    /// True until the first successful create on the server
    pub is_new: bool,
    /// Soft delete marker, pushed as a remote delete on the next sync
    pub is_deleted: bool,
    tracking: bool,
    changed: ChangedFieldSet,
}

impl ChangeState {
    /// State for a record created locally and not yet known to the server.
    #[must_use]
    pub fn new_local() -> Self {
        Self {
            is_new: true,
            ..Self::default()
        }
    }

    /// Rebuild state from stored columns.
    #[must_use]
    pub fn from_storage(is_new: bool, is_deleted: bool, changed_fields: &str) -> Self {
        Self {
            is_new,
            is_deleted,
            tracking: false,
            changed: ChangedFieldSet::parse(changed_fields),
        }
    }

    pub const fn tracking(&self) -> bool {
        self.tracking
    }

    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    pub const fn changed_fields(&self) -> &ChangedFieldSet {
        &self.changed
    }

    /// Record `field` as dirty if tracking is on.
    pub fn mark_changed(&mut self, field: &str) {
        if self.tracking {
            self.changed.insert(field);
        }
    }

    pub fn clear_changed(&mut self, field: &str) {
        self.changed.remove(field);
    }

    pub(crate) fn reset_changed(&mut self) {
        self.changed.clear();
    }

    pub(crate) fn retain_changed(&mut self, keep: impl FnMut(&str) -> bool) {
        self.changed.retain(keep);
    }

    /// New, deleted, or carrying unpushed field edits.
    pub fn is_dirty(&self) -> bool {
        self.is_new || self.is_deleted || !self.changed.is_empty()
    }
}

/// A record whose local edits are tracked per field so they can be pushed
/// to the server and survive merges with freshly fetched copies.
///
/// Concrete record types supply the two per-field resolvers:
/// [`merge_changed_field`](Self::merge_changed_field) and
/// [`does_field_match`](Self::does_field_match). Everything else is provided.
pub trait ChangeAware {
    fn change_state(&self) -> &ChangeState;

    fn change_state_mut(&mut self) -> &mut ChangeState;

    /// Take `source`'s value for `field`, going through the normal setter so
    /// the write is tracked when the value actually differs.
    fn merge_changed_field(&mut self, source: &Self, field: &str)
    where
        Self: Sized;

    /// Whether `field` on `self` already equals the value in `original`.
    ///
    /// Used after a push to drop fields the server echoed back unchanged.
    fn does_field_match(&self, original: &Self, field: &str) -> bool
    where
        Self: Sized,
    {
        let _ = (original, field);
        false
    }

    fn is_new(&self) -> bool {
        self.change_state().is_new
    }

    fn set_new(&mut self, is_new: bool) {
        self.change_state_mut().is_new = is_new;
    }

    fn is_deleted(&self) -> bool {
        self.change_state().is_deleted
    }

    fn set_deleted(&mut self, is_deleted: bool) {
        self.change_state_mut().is_deleted = is_deleted;
    }

    fn tracking_changes(&self) -> bool {
        self.change_state().tracking()
    }

    fn set_tracking_changes(&mut self, tracking: bool) {
        self.change_state_mut().set_tracking(tracking);
    }

    fn changed_fields(&self) -> &ChangedFieldSet {
        self.change_state().changed_fields()
    }

    fn has_changed_fields(&self) -> bool {
        !self.changed_fields().is_empty()
    }

    fn is_dirty(&self) -> bool {
        self.change_state().is_dirty()
    }

    fn mark_changed(&mut self, field: &str) {
        self.change_state_mut().mark_changed(field);
    }

    fn clear_changed(&mut self, field: &str) {
        self.change_state_mut().clear_changed(field);
    }

    /// Pull every field `source` has marked dirty into `self`.
    ///
    /// Tracking is forced on while the resolvers run and unconditionally
    /// turned off afterwards, even if it was on before the call. `self` ends
    /// with exactly the fields the resolvers changed marked dirty.
    fn merge_changed_fields(&mut self, source: &Self)
    where
        Self: Sized,
    {
        {
            let state = self.change_state_mut();
            state.reset_changed();
            state.set_tracking(true);
        }
        for field in source.changed_fields().iter() {
            self.merge_changed_field(source, field);
        }
        self.change_state_mut().set_tracking(false);
    }

    /// Drop every field dirty in `original` that `self` now matches.
    fn clear_changed_fields_matching(&mut self, original: &Self)
    where
        Self: Sized,
    {
        let matching: ChangedFieldSet = original
            .changed_fields()
            .iter()
            .filter(|field| self.does_field_match(original, field))
            .collect();
        if !matching.is_empty() {
            self.change_state_mut()
                .retain_changed(|field| !matching.contains(field));
        }
    }
}
