//! The element sequence: an ordered, distance-sorted set of uniquely named
//! elements behind an immutable light source.
//!
//! The source is not stored as an element. It is the axis origin, addressed
//! as [`ElementId::SOURCE`] and reported first by [`ElementSequence::snapshot`];
//! every mutation addressed to it is refused and deletion silently skips it.
//!
//! ## Ordering
//!
//! Elements are kept ascending by `distance_mm`. When an edit makes two
//! elements share a distance, the edited element keeps the side of the tied
//! element it was on before the edit, so nudging a distance back and forth
//! across a neighbour never makes the pair swap spontaneously.
//!
//! The sequence is not internally synchronised; one workspace owns one
//! sequence and serialises its edits.

use log::debug;
use thiserror::Error;

use crate::config::{ElementDefaults, SequenceSettings};
use crate::element::{ElementKind, ElementPayload, ElementRecord, RetrievalMethod};
use crate::naming::{self, NameError};

/// Display name of the light source entry.
pub const SOURCE_NAME: &str = "Source";

/// Stable handle of an element within one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// The light source at the axis origin.
    pub const SOURCE: ElementId = ElementId(0);

    pub fn is_source(self) -> bool {
        self == Self::SOURCE
    }
}

/// Errors from editing the sequence. A failed edit leaves the sequence
/// unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceError {
    #[error("Invalid name: {0}")]
    NameInvalid(NameError),

    #[error("A name '{0}' already exists.")]
    NameConflict(String),

    #[error("Unknown element {0:?}")]
    UnknownElement(ElementId),

    #[error("The light source cannot be edited")]
    SourceImmutable,

    #[error("Invalid distance: {0}")]
    InvalidDistance(f64),

    #[error("'{field}' does not apply to a {kind}")]
    WrongKind { field: &'static str, kind: ElementKind },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl From<NameError> for SequenceError {
    fn from(err: NameError) -> Self {
        match err {
            NameError::Conflict(name) => SequenceError::NameConflict(name),
            other => SequenceError::NameInvalid(other),
        }
    }
}

/// One entry of a [`snapshot`](ElementSequence::snapshot).
#[derive(Debug, Clone, PartialEq)]
pub enum AxisEntry {
    Source,
    Element { id: ElementId, record: ElementRecord },
}

impl AxisEntry {
    pub fn name(&self) -> &str {
        match self {
            AxisEntry::Source => SOURCE_NAME,
            AxisEntry::Element { record, .. } => &record.name,
        }
    }

    pub fn record(&self) -> Option<&ElementRecord> {
        match self {
            AxisEntry::Source => None,
            AxisEntry::Element { record, .. } => Some(record),
        }
    }
}

/// Ordered element container owning every [`ElementRecord`] of a workspace.
#[derive(Debug, Clone)]
pub struct ElementSequence {
    entries: Vec<(ElementId, ElementRecord)>,
    next_id: u64,
    settings: SequenceSettings,
    defaults: ElementDefaults,
}

impl Default for ElementSequence {
    fn default() -> Self {
        Self::new(SequenceSettings::default(), ElementDefaults::default())
    }
}

impl ElementSequence {
    pub fn new(settings: SequenceSettings, defaults: ElementDefaults) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            settings,
            defaults,
        }
    }

    /// Build a sequence from loaded records.
    ///
    /// Records are stably sorted by distance. Unnamed records receive a
    /// generated default name; invalid or duplicate names are rejected.
    pub fn from_records(
        records: Vec<ElementRecord>,
        settings: SequenceSettings,
        defaults: ElementDefaults,
    ) -> Result<Self, SequenceError> {
        let mut seq = Self::new(settings, defaults);
        for mut record in records {
            if !record.distance_mm.is_finite() {
                return Err(SequenceError::InvalidDistance(record.distance_mm));
            }
            if record.name.is_empty() {
                record.name = naming::generate_unique_default_name(
                    record.kind().display_name(),
                    seq.names(),
                );
            }
            naming::validate_name_against(
                &record.name,
                seq.names(),
                seq.settings.element_min_name_len,
                None,
            )?;
            record.normalize();
            let id = seq.allocate_id();
            seq.entries.push((id, record));
        }
        seq.entries
            .sort_by(|(_, a), (_, b)| a.distance_mm.total_cmp(&b.distance_mm));
        Ok(seq)
    }

    pub fn settings(&self) -> &SequenceSettings {
        &self.settings
    }

    pub fn defaults(&self) -> &ElementDefaults {
        &self.defaults
    }

    /// Number of elements, not counting the source.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementRecord> {
        self.entries.iter().find(|(eid, _)| *eid == id).map(|(_, r)| r)
    }

    /// Element position on the axis, the source being position 0.
    pub fn position(&self, id: ElementId) -> Option<usize> {
        if id.is_source() {
            return Some(0);
        }
        self.index_of(id).map(|idx| idx + 1)
    }

    pub fn id_by_name(&self, name: &str) -> Option<ElementId> {
        self.entries
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| *id)
    }

    /// Element ids in axis order, source excluded.
    pub fn ids(&self) -> Vec<ElementId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Element names in axis order, source excluded.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(_, r)| r.name.as_str())
    }

    /// Records in axis order, source excluded.
    pub fn records(&self) -> impl Iterator<Item = &ElementRecord> + '_ {
        self.entries.iter().map(|(_, r)| r)
    }

    /// Copy of the axis in order, source first.
    pub fn snapshot(&self) -> Vec<AxisEntry> {
        std::iter::once(AxisEntry::Source)
            .chain(self.entries.iter().map(|(id, record)| AxisEntry::Element {
                id: *id,
                record: record.clone(),
            }))
            .collect()
    }

    /// Append a new element of `kind` using the sequence's own defaults.
    pub fn insert(&mut self, kind: ElementKind) -> ElementId {
        let defaults = self.defaults.clone();
        self.insert_with(kind, &defaults)
    }

    /// Append a new element `default_offset_mm` past the last one, with a
    /// generated unique name.
    pub fn insert_with(&mut self, kind: ElementKind, defaults: &ElementDefaults) -> ElementId {
        let last = self.entries.last().map_or(0.0, |(_, r)| r.distance_mm);
        let distance = last + self.settings.default_offset_mm;
        let name = naming::generate_unique_default_name(kind.display_name(), self.names());
        let record = ElementRecord::new(
            name,
            distance,
            ElementPayload::default_for(kind, distance, defaults),
        );
        let id = self.allocate_id();
        debug!("insert {:?} '{}' at {:.3} mm", kind, record.name, distance);
        self.entries.push((id, record));
        id
    }

    pub fn set_name(&mut self, id: ElementId, new_name: &str) -> Result<(), SequenceError> {
        let idx = self.checked_index(id)?;
        let current = self.entries[idx].1.name.clone();
        naming::validate_name_against(
            new_name,
            self.names(),
            self.settings.element_min_name_len,
            Some(&current),
        )?;
        debug!("rename '{}' -> '{}'", current, new_name);
        self.entries[idx].1.name = new_name.to_string();
        Ok(())
    }

    /// Change an element's kind.
    ///
    /// Payload values entered under a kind are remembered and come back when
    /// the element returns to that kind. A default-generated name such as
    /// `"Aperture 2"` follows the new kind (`"Lens 2"`) when renaming is
    /// enabled and the new name is free; otherwise the name is kept.
    pub fn set_type(&mut self, id: ElementId, kind: ElementKind) -> Result<(), SequenceError> {
        let idx = self.checked_index(id)?;
        if self.entries[idx].1.kind() == kind {
            return Ok(());
        }

        let renamed = if self.settings.rename_on_type_change {
            let current = &self.entries[idx].1.name;
            naming::default_suffix(current)
                .map(|n| format!("{} {}", kind.display_name(), n))
                .filter(|desired| naming::validate_unique(desired, self.names(), Some(current)).is_ok())
        } else {
            None
        };

        let record = &mut self.entries[idx].1;
        debug!("retype '{}' {:?} -> {:?}", record.name, record.kind(), kind);
        record.change_kind(kind, &self.defaults);
        if let Some(name) = renamed {
            record.name = name;
        }
        Ok(())
    }

    /// Move an element to `new_distance` and re-sort.
    ///
    /// If another element already sits at exactly `new_distance`, the moved
    /// element is placed directly before it when it was before it prior to
    /// the edit, and directly after it otherwise. Without a tie it goes
    /// before the first element at or beyond `new_distance`.
    pub fn set_distance(&mut self, id: ElementId, new_distance: f64) -> Result<(), SequenceError> {
        if !new_distance.is_finite() {
            return Err(SequenceError::InvalidDistance(new_distance));
        }
        let from = self.checked_index(id)?;
        let (id, mut record) = self.entries.remove(from);
        record.distance_mm = new_distance;
        record.normalize();

        let to = match self
            .entries
            .iter()
            .position(|(_, r)| r.distance_mm == new_distance)
        {
            // Indices at or past `from` belonged to elements that followed
            // the edited one before it was detached.
            Some(tied) if tied >= from => tied,
            Some(tied) => tied + 1,
            None => self
                .entries
                .iter()
                .position(|(_, r)| r.distance_mm >= new_distance)
                .unwrap_or(self.entries.len()),
        };

        debug!(
            "move '{}' to {:.3} mm (index {} -> {})",
            record.name, new_distance, from, to
        );
        self.entries.insert(to, (id, record));
        Ok(())
    }

    /// Remove every listed element in one step. The source and unknown ids
    /// are skipped. Returns the number of elements removed.
    pub fn delete(&mut self, ids: &[ElementId]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(id, _)| id.is_source() || !ids.contains(id));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("deleted {removed} element(s)");
        }
        removed
    }

    // ─── Screen range ───────────────────────────────────────────────────

    pub fn set_range_enabled(&mut self, id: ElementId, enabled: bool) -> Result<(), SequenceError> {
        self.edit_payload(id, "is_range", |record| {
            let distance = record.distance_mm;
            match &mut record.payload {
                ElementPayload::Screen(screen) => {
                    screen.is_range = enabled;
                    screen.normalize(distance);
                    Ok(())
                }
                _ => Err(()),
            }
        })
    }

    /// Set the end of a screen's sweep, clamped up to the screen's distance.
    ///
    /// Opening a collapsed range gives it the default step count. While the
    /// range is disabled the end keeps tracking the screen's distance.
    pub fn set_range_end(&mut self, id: ElementId, range_end_mm: f64) -> Result<(), SequenceError> {
        if !range_end_mm.is_finite() {
            return Err(SequenceError::InvalidValue {
                field: "range_end",
                reason: format!("{range_end_mm} is not a finite distance"),
            });
        }
        let open_steps = self.defaults.screen_steps.max(1);
        self.edit_payload(id, "range_end", |record| {
            let distance = record.distance_mm;
            match &mut record.payload {
                ElementPayload::Screen(screen) => {
                    let collapsed = screen.range_end_mm == distance && screen.steps == 1;
                    screen.range_end_mm = range_end_mm;
                    if collapsed && screen.is_range && range_end_mm > distance {
                        screen.steps = open_steps;
                    }
                    screen.normalize(distance);
                    Ok(())
                }
                _ => Err(()),
            }
        })
    }

    pub fn set_steps(&mut self, id: ElementId, steps: u32) -> Result<(), SequenceError> {
        self.edit_payload(id, "steps", |record| {
            let distance = record.distance_mm;
            match &mut record.payload {
                ElementPayload::Screen(screen) => {
                    screen.steps = steps;
                    screen.normalize(distance);
                    Ok(())
                }
                _ => Err(()),
            }
        })
    }

    // ─── Payload fields ─────────────────────────────────────────────────

    pub fn set_focal_length(&mut self, id: ElementId, focal_length_mm: f64) -> Result<(), SequenceError> {
        if !focal_length_mm.is_finite() || focal_length_mm == 0.0 {
            return Err(SequenceError::InvalidValue {
                field: "focal_length",
                reason: format!("{focal_length_mm} is not a usable focal length"),
            });
        }
        self.edit_payload(id, "focal_length", |record| match &mut record.payload {
            ElementPayload::Lens(lens) => {
                lens.focal_length_mm = focal_length_mm;
                Ok(())
            }
            _ => Err(()),
        })
    }

    pub fn set_image_path(&mut self, id: ElementId, path: &str) -> Result<(), SequenceError> {
        self.edit_payload(id, "image_path", |record| match &mut record.payload {
            ElementPayload::Aperture(p) => {
                p.image_path = path.to_string();
                Ok(())
            }
            ElementPayload::TargetIntensity(p) => {
                p.image_path = path.to_string();
                Ok(())
            }
            _ => Err(()),
        })
    }

    /// Physical size of an aperture, target or retrieval support.
    pub fn set_size(&mut self, id: ElementId, width_mm: f64, height_mm: f64) -> Result<(), SequenceError> {
        for (field, value) in [("width_mm", width_mm), ("height_mm", height_mm)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SequenceError::InvalidValue {
                    field,
                    reason: format!("{value} must be a positive size"),
                });
            }
        }
        self.edit_payload(id, "size", |record| {
            let (w, h) = match &mut record.payload {
                ElementPayload::Aperture(p) => (&mut p.width_mm, &mut p.height_mm),
                ElementPayload::TargetIntensity(p) => (&mut p.width_mm, &mut p.height_mm),
                ElementPayload::ApertureResult(p) => (&mut p.width_mm, &mut p.height_mm),
                _ => return Err(()),
            };
            *w = width_mm;
            *h = height_mm;
            Ok(())
        })
    }

    pub fn set_inverted(&mut self, id: ElementId, inverted: bool) -> Result<(), SequenceError> {
        self.edit_payload(id, "is_inverted", |record| match &mut record.payload {
            ElementPayload::Aperture(p) => {
                p.is_inverted = inverted;
                Ok(())
            }
            ElementPayload::TargetIntensity(p) => {
                p.is_inverted = inverted;
                Ok(())
            }
            _ => Err(()),
        })
    }

    pub fn set_phasemask(&mut self, id: ElementId, phasemask: bool) -> Result<(), SequenceError> {
        self.edit_payload(id, "is_phasemask", |record| match &mut record.payload {
            ElementPayload::Aperture(p) => {
                p.is_phasemask = phasemask;
                Ok(())
            }
            _ => Err(()),
        })
    }

    /// Iteration budget, padding and algorithm of a retrieval plane.
    pub fn set_retrieval(
        &mut self,
        id: ElementId,
        maxiter: u32,
        padding: u32,
        method: RetrievalMethod,
    ) -> Result<(), SequenceError> {
        if maxiter == 0 {
            return Err(SequenceError::InvalidValue {
                field: "maxiter",
                reason: "at least one iteration is required".into(),
            });
        }
        self.edit_payload(id, "retrieval", |record| match &mut record.payload {
            ElementPayload::ApertureResult(p) => {
                p.maxiter = maxiter;
                p.padding = padding;
                p.method = method;
                Ok(())
            }
            _ => Err(()),
        })
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn allocate_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: ElementId) -> Option<usize> {
        self.entries.iter().position(|(eid, _)| *eid == id)
    }

    fn checked_index(&self, id: ElementId) -> Result<usize, SequenceError> {
        if id.is_source() {
            return Err(SequenceError::SourceImmutable);
        }
        self.index_of(id).ok_or(SequenceError::UnknownElement(id))
    }

    /// Apply `edit` to a copy of the record and commit it only on success.
    /// `edit` returns `Err(())` when the record's kind lacks `field`.
    fn edit_payload<F>(&mut self, id: ElementId, field: &'static str, edit: F) -> Result<(), SequenceError>
    where
        F: FnOnce(&mut ElementRecord) -> Result<(), ()>,
    {
        let idx = self.checked_index(id)?;
        let mut draft = self.entries[idx].1.clone();
        edit(&mut draft).map_err(|()| SequenceError::WrongKind {
            field,
            kind: draft.kind(),
        })?;
        self.entries[idx].1 = draft;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ScreenParams;

    fn distances(seq: &ElementSequence) -> Vec<f64> {
        seq.records().map(|r| r.distance_mm).collect()
    }

    fn names(seq: &ElementSequence) -> Vec<String> {
        seq.names().map(str::to_string).collect()
    }

    #[test]
    fn test_insert_appends_at_default_offset() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        let l = seq.insert(ElementKind::Lens);
        let s = seq.insert(ElementKind::Screen);
        assert_eq!(distances(&seq), vec![10.0, 20.0, 30.0]);
        assert_eq!(seq.get(a).unwrap().name, "Aperture 1");
        assert_eq!(seq.get(l).unwrap().payload, ElementPayload::Lens(crate::element::LensParams { focal_length_mm: 1000.0 }));
        assert_eq!(
            seq.get(s).unwrap().payload,
            ElementPayload::Screen(ScreenParams { is_range: false, range_end_mm: 30.0, steps: 1 })
        );
    }

    #[test]
    fn test_insert_after_moved_last_element() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        seq.set_distance(a, 55.0).unwrap();
        seq.insert(ElementKind::Lens);
        assert_eq!(distances(&seq), vec![55.0, 65.0]);
    }

    #[test]
    fn test_snapshot_starts_with_source() {
        let mut seq = ElementSequence::default();
        seq.insert(ElementKind::Lens);
        let snap = seq.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0], AxisEntry::Source);
        assert_eq!(snap[0].name(), SOURCE_NAME);
        assert_eq!(snap[1].name(), "Lens 1");
    }

    #[test]
    fn test_source_is_immutable() {
        let mut seq = ElementSequence::default();
        assert_eq!(seq.set_name(ElementId::SOURCE, "Laser"), Err(SequenceError::SourceImmutable));
        assert_eq!(seq.set_distance(ElementId::SOURCE, 5.0), Err(SequenceError::SourceImmutable));
        assert_eq!(seq.position(ElementId::SOURCE), Some(0));
    }

    #[test]
    fn test_tie_keeps_prior_relative_order() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        let b = seq.insert(ElementKind::Lens);
        // A was before B, so it stays before B on the tie.
        seq.set_distance(a, 20.0).unwrap();
        assert_eq!(seq.ids(), vec![a, b]);
        // B was after A, so it stays after A on the tie.
        seq.set_distance(b, 20.0).unwrap();
        assert_eq!(seq.ids(), vec![a, b]);
    }

    #[test]
    fn test_non_finite_distance_rejected() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        assert!(matches!(seq.set_distance(a, f64::NAN), Err(SequenceError::InvalidDistance(_))));
        assert_eq!(distances(&seq), vec![10.0]);
    }

    #[test]
    fn test_set_name_validation() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        seq.insert(ElementKind::Lens);
        assert_eq!(
            seq.set_name(a, "Lens 1"),
            Err(SequenceError::NameConflict("Lens 1".into()))
        );
        assert!(matches!(seq.set_name(a, "bad/name"), Err(SequenceError::NameInvalid(_))));
        assert!(matches!(seq.set_name(a, ""), Err(SequenceError::NameInvalid(_))));
        assert_eq!(names(&seq), vec!["Aperture 1", "Lens 1"]);
        seq.set_name(a, "Aperture 1").unwrap();
        seq.set_name(a, "Pinhole").unwrap();
        assert_eq!(names(&seq), vec!["Pinhole", "Lens 1"]);
    }

    #[test]
    fn test_rename_on_type_change_disabled() {
        let settings = SequenceSettings {
            rename_on_type_change: false,
            ..SequenceSettings::default()
        };
        let mut seq = ElementSequence::new(settings, ElementDefaults::default());
        let a = seq.insert(ElementKind::Aperture);
        seq.set_type(a, ElementKind::Lens).unwrap();
        assert_eq!(seq.get(a).unwrap().name, "Aperture 1");
        assert_eq!(seq.get(a).unwrap().kind(), ElementKind::Lens);
    }

    #[test]
    fn test_custom_name_survives_type_change() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        seq.set_name(a, "Pinhole").unwrap();
        seq.set_type(a, ElementKind::Screen).unwrap();
        assert_eq!(seq.get(a).unwrap().name, "Pinhole");
    }

    #[test]
    fn test_type_change_preserves_prior_values() {
        let mut seq = ElementSequence::default();
        let l = seq.insert(ElementKind::Lens);
        seq.set_focal_length(l, 75.0).unwrap();
        seq.set_type(l, ElementKind::Screen).unwrap();
        assert_eq!(seq.get(l).unwrap().name, "Screen 1");
        seq.set_type(l, ElementKind::Lens).unwrap();
        assert_eq!(seq.get(l).unwrap().name, "Lens 1");
        assert_eq!(
            seq.get(l).unwrap().payload,
            ElementPayload::Lens(crate::element::LensParams { focal_length_mm: 75.0 })
        );
    }

    #[test]
    fn test_screen_range_edits() {
        let mut seq = ElementSequence::default();
        let s = seq.insert(ElementKind::Screen);
        seq.set_range_enabled(s, true).unwrap();
        seq.set_range_end(s, 100.0).unwrap();
        assert_eq!(
            seq.get(s).unwrap().screen(),
            Some(&ScreenParams { is_range: true, range_end_mm: 100.0, steps: 10 })
        );
        seq.set_steps(s, 15).unwrap();
        assert_eq!(seq.get(s).unwrap().screen().unwrap().steps, 15);

        // Moving the screen past its end drags the end along and collapses.
        seq.set_distance(s, 120.0).unwrap();
        assert_eq!(
            seq.get(s).unwrap().screen(),
            Some(&ScreenParams { is_range: true, range_end_mm: 120.0, steps: 1 })
        );

        seq.set_range_end(s, 150.0).unwrap();
        seq.set_range_enabled(s, false).unwrap();
        assert_eq!(
            seq.get(s).unwrap().screen(),
            Some(&ScreenParams { is_range: false, range_end_mm: 120.0, steps: 1 })
        );
    }

    #[test]
    fn test_steps_floor_is_one() {
        let mut seq = ElementSequence::default();
        let s = seq.insert(ElementKind::Screen);
        seq.set_range_enabled(s, true).unwrap();
        seq.set_range_end(s, 40.0).unwrap();
        seq.set_steps(s, 0).unwrap();
        assert_eq!(seq.get(s).unwrap().screen().unwrap().steps, 1);
    }

    #[test]
    fn test_wrong_kind_leaves_state_unchanged() {
        let mut seq = ElementSequence::default();
        let l = seq.insert(ElementKind::Lens);
        let before = seq.get(l).unwrap().clone();
        assert_eq!(
            seq.set_steps(l, 5),
            Err(SequenceError::WrongKind { field: "steps", kind: ElementKind::Lens })
        );
        assert!(matches!(seq.set_image_path(l, "x.png"), Err(SequenceError::WrongKind { .. })));
        assert!(matches!(seq.set_phasemask(l, true), Err(SequenceError::WrongKind { .. })));
        assert_eq!(seq.get(l).unwrap(), &before);
    }

    #[test]
    fn test_payload_setters() {
        let mut seq = ElementSequence::default();
        let a = seq.insert(ElementKind::Aperture);
        let r = seq.insert(ElementKind::ApertureResult);
        seq.set_image_path(a, "slit.png").unwrap();
        seq.set_size(a, 2.0, 0.5).unwrap();
        seq.set_inverted(a, true).unwrap();
        seq.set_phasemask(a, true).unwrap();
        match &seq.get(a).unwrap().payload {
            ElementPayload::Aperture(p) => {
                assert_eq!(p.image_path, "slit.png");
                assert_eq!((p.width_mm, p.height_mm), (2.0, 0.5));
                assert!(p.is_inverted && p.is_phasemask);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        seq.set_retrieval(r, 50, 16, RetrievalMethod::ConjugateGradient).unwrap();
        match &seq.get(r).unwrap().payload {
            ElementPayload::ApertureResult(p) => {
                assert_eq!((p.maxiter, p.padding, p.method), (50, 16, RetrievalMethod::ConjugateGradient));
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(matches!(seq.set_size(a, -1.0, 1.0), Err(SequenceError::InvalidValue { .. })));
        assert!(matches!(seq.set_retrieval(r, 0, 0, RetrievalMethod::GerchbergSaxton), Err(SequenceError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_records_sorts_and_names() {
        let defaults = ElementDefaults::default();
        let records = vec![
            ElementRecord::new("", 30.0, ElementPayload::default_for(ElementKind::Screen, 30.0, &defaults)),
            ElementRecord::new("Slit", 10.0, ElementPayload::default_for(ElementKind::Aperture, 10.0, &defaults)),
            ElementRecord::new("", 30.0, ElementPayload::default_for(ElementKind::Screen, 30.0, &defaults)),
        ];
        let seq = ElementSequence::from_records(records, SequenceSettings::default(), defaults).unwrap();
        assert_eq!(names(&seq), vec!["Slit", "Screen 1", "Screen 2"]);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let defaults = ElementDefaults::default();
        let records = vec![
            ElementRecord::new("Twin", 10.0, ElementPayload::default_for(ElementKind::Lens, 10.0, &defaults)),
            ElementRecord::new("Twin", 20.0, ElementPayload::default_for(ElementKind::Lens, 20.0, &defaults)),
        ];
        let err = ElementSequence::from_records(records, SequenceSettings::default(), defaults).unwrap_err();
        assert_eq!(err, SequenceError::NameConflict("Twin".into()));
    }
}
