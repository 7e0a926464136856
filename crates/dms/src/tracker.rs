//! Mapping detected faces onto tracked subjects
//!
//! Faces carry no identity between frames. `Single` folds every face into
//! one universal subject. `Nearest` keeps one counter per face and matches
//! faces frame to frame by face-center distance.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::AlertTransition;
use crate::landmarks::FaceRegion;
use crate::state::DrowsinessCounter;

/// Identifier of a tracked subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject-{}", self.0)
    }
}

/// Face-to-subject policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubjectPolicy {
    /// One shared counter; every face in a frame updates it in detection order
    #[default]
    Single,
    /// One counter per face, matched by nearest face center
    Nearest {
        /// Largest center displacement (pixels) still treated as the same face
        max_match_distance: f32,
        /// Frames a subject may go unmatched while others are seen
        max_missed_frames: u32,
    },
}

#[derive(Debug, Clone)]
struct Subject {
    id: SubjectId,
    counter: DrowsinessCounter,
    last_region: Option<FaceRegion>,
    missed: u32,
}

impl Subject {
    fn new(id: SubjectId) -> Self {
        Self {
            id,
            counter: DrowsinessCounter::new(),
            last_region: None,
            missed: 0,
        }
    }
}

/// Per-subject drowsiness state
#[derive(Debug, Clone)]
pub struct SubjectRegistry {
    policy: SubjectPolicy,
    subjects: Vec<Subject>,
    next_id: u64,
}

impl SubjectRegistry {
    pub fn new(policy: SubjectPolicy) -> Self {
        let mut registry = Self {
            policy,
            subjects: Vec::new(),
            next_id: 0,
        };
        registry.reset();
        registry
    }

    /// Assign a subject to each face, in the order given.
    ///
    /// Callers skip this for frames without faces, so detection dropouts
    /// never age subjects.
    pub fn assign(&mut self, regions: &[FaceRegion]) -> Vec<SubjectId> {
        match self.policy {
            SubjectPolicy::Single => {
                if let (Some(subject), Some(region)) = (self.subjects.first_mut(), regions.last()) {
                    subject.last_region = Some(*region);
                }
                vec![SubjectId(0); regions.len()]
            }
            SubjectPolicy::Nearest { max_match_distance, .. } => {
                self.assign_nearest(regions, max_match_distance)
            }
        }
    }

    fn assign_nearest(&mut self, regions: &[FaceRegion], max_distance: f32) -> Vec<SubjectId> {
        let mut candidates = Vec::new();
        for (face, region) in regions.iter().enumerate() {
            for (slot, subject) in self.subjects.iter().enumerate() {
                if let Some(last) = subject.last_region {
                    let distance = last.center().distance(region.center());
                    if distance <= max_distance {
                        candidates.push((face, slot, distance));
                    }
                }
            }
        }
        candidates.sort_by(|a, b| a.2.total_cmp(&b.2));

        let mut face_slot: Vec<Option<usize>> = vec![None; regions.len()];
        let mut slot_taken = vec![false; self.subjects.len()];
        for (face, slot, _) in candidates {
            if face_slot[face].is_none() && !slot_taken[slot] {
                face_slot[face] = Some(slot);
                slot_taken[slot] = true;
            }
        }

        for (subject, taken) in self.subjects.iter_mut().zip(&slot_taken) {
            if !taken {
                subject.missed = subject.missed.saturating_add(1);
            }
        }

        let mut ids = Vec::with_capacity(regions.len());
        for (region, slot) in regions.iter().zip(face_slot) {
            let subject = match slot {
                Some(slot) => &mut self.subjects[slot],
                None => {
                    let id = SubjectId(self.next_id);
                    self.next_id += 1;
                    info!(subject = %id, "New subject tracked");
                    self.subjects.push(Subject::new(id));
                    let last = self.subjects.len() - 1;
                    &mut self.subjects[last]
                }
            };
            subject.last_region = Some(*region);
            subject.missed = 0;
            ids.push(subject.id);
        }
        ids
    }

    /// Drop subjects unmatched for too long. Alerting ones report a stop.
    pub fn retire_stale(&mut self) -> Vec<AlertTransition> {
        let SubjectPolicy::Nearest { max_missed_frames, .. } = self.policy else {
            return Vec::new();
        };

        let mut stopped = Vec::new();
        self.subjects.retain(|subject| {
            if subject.missed <= max_missed_frames {
                return true;
            }
            debug!(subject = %subject.id, missed = subject.missed, "Subject retired");
            if subject.counter.is_alerting() {
                stopped.push(AlertTransition::Stopped { subject: subject.id });
            }
            false
        });
        stopped
    }

    pub fn counter(&self, id: SubjectId) -> Option<&DrowsinessCounter> {
        self.subjects.iter().find(|s| s.id == id).map(|s| &s.counter)
    }

    pub fn counter_mut(&mut self, id: SubjectId) -> Option<&mut DrowsinessCounter> {
        self.subjects.iter_mut().find(|s| s.id == id).map(|s| &mut s.counter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubjectId, &DrowsinessCounter)> {
        self.subjects.iter().map(|s| (s.id, &s.counter))
    }

    pub fn any_alerting(&self) -> bool {
        self.subjects.iter().any(|s| s.counter.is_alerting())
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn policy(&self) -> SubjectPolicy {
        self.policy
    }

    /// Forget every subject
    pub fn reset(&mut self) {
        self.subjects.clear();
        self.next_id = 0;
        if self.policy == SubjectPolicy::Single {
            self.subjects.push(Subject::new(SubjectId(0)));
            self.next_id = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DmsConfig;

    fn face_at(x: f32) -> FaceRegion {
        FaceRegion::new(x, 100.0, 100.0, 100.0)
    }

    fn nearest(max_missed_frames: u32) -> SubjectRegistry {
        SubjectRegistry::new(SubjectPolicy::Nearest {
            max_match_distance: 50.0,
            max_missed_frames,
        })
    }

    #[test]
    fn test_single_policy_shares_one_subject() {
        let mut registry = SubjectRegistry::new(SubjectPolicy::Single);
        assert_eq!(registry.len(), 1);

        let ids = registry.assign(&[face_at(0.0), face_at(400.0)]);
        assert_eq!(ids, vec![SubjectId(0), SubjectId(0)]);
        assert_eq!(registry.len(), 1);
        assert!(registry.retire_stale().is_empty());
    }

    #[test]
    fn test_nearest_keeps_identity_across_frames() {
        let mut registry = nearest(5);

        let first = registry.assign(&[face_at(0.0), face_at(400.0)]);
        assert_eq!(first, vec![SubjectId(0), SubjectId(1)]);

        // Order swapped and faces drifted slightly
        let second = registry.assign(&[face_at(410.0), face_at(12.0)]);
        assert_eq!(second, vec![SubjectId(1), SubjectId(0)]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_far_face_becomes_new_subject() {
        let mut registry = nearest(5);
        registry.assign(&[face_at(0.0)]);
        let ids = registry.assign(&[face_at(300.0)]);
        assert_eq!(ids, vec![SubjectId(1)]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_counters_are_independent() {
        let config = DmsConfig { consec_frames: 2, ..Default::default() };
        let mut registry = nearest(5);
        let ids = registry.assign(&[face_at(0.0), face_at(400.0)]);

        for _ in 0..2 {
            registry.counter_mut(ids[0]).unwrap().update(0.1, &config);
            registry.counter_mut(ids[1]).unwrap().update(0.3, &config);
        }

        assert!(registry.counter(ids[0]).unwrap().is_alerting());
        assert!(!registry.counter(ids[1]).unwrap().is_alerting());
        assert!(registry.any_alerting());
    }

    #[test]
    fn test_stale_alerting_subject_reports_stop() {
        let config = DmsConfig { consec_frames: 1, ..Default::default() };
        let mut registry = nearest(1);
        let ids = registry.assign(&[face_at(0.0), face_at(400.0)]);
        registry.counter_mut(ids[1]).unwrap().update(0.1, &config);

        registry.assign(&[face_at(0.0)]);
        assert!(registry.retire_stale().is_empty());

        registry.assign(&[face_at(0.0)]);
        let stopped = registry.retire_stale();
        assert_eq!(stopped, vec![AlertTransition::Stopped { subject: SubjectId(1) }]);
        assert_eq!(registry.len(), 1);
        assert!(registry.counter(SubjectId(1)).is_none());
    }

    #[test]
    fn test_reset_restores_initial_subjects() {
        let mut single = SubjectRegistry::new(SubjectPolicy::Single);
        let config = DmsConfig::default();
        single.counter_mut(SubjectId(0)).unwrap().update(0.1, &config);
        single.reset();
        assert_eq!(single.counter(SubjectId(0)).unwrap().count(), 0);

        let mut tracked = nearest(3);
        tracked.assign(&[face_at(0.0)]);
        tracked.reset();
        assert!(tracked.is_empty());
    }
}
