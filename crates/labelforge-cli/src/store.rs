//! Storage contract and the in-memory implementation.
//!
//! The relational engine itself is an external collaborator; the pipeline
//! only needs the reads and writes declared on [`ReleaseStore`].
//! [`MemoryStore`] backs the CLI (loaded from a project snapshot file) and
//! the test harness.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use labelforge_core::{
    Annotation, ImageRecord, Release, SplitSection, TransformStatus, TransformationRecord,
};

/// Storage layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// The reads and writes the pipeline performs against the system of record.
///
/// The release record, progress, and the transforms table are mutated only
/// through this trait, and only by the orchestrator thread.
pub trait ReleaseStore: Send + Sync {
    /// Labeled images belonging to the given datasets and splits.
    fn labeled_images(
        &self,
        dataset_ids: &[String],
        splits: &[SplitSection],
    ) -> Result<Vec<ImageRecord>, StoreError>;

    /// Enabled PENDING transformation records for a release version.
    fn pending_transforms(
        &self,
        release_version: &str,
    ) -> Result<Vec<TransformationRecord>, StoreError>;

    /// Pixel-space annotations for one image.
    fn annotations_for_image(&self, image_id: &str) -> Result<Vec<Annotation>, StoreError>;

    fn create_release(&self, release: &Release) -> Result<(), StoreError>;

    fn update_release(&self, release: &Release) -> Result<(), StoreError>;

    fn get_release(&self, release_id: &str) -> Result<Option<Release>, StoreError>;

    /// Releases for a project, newest first, up to `limit`.
    fn releases_for_project(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<Release>, StoreError>;

    /// Atomically marks the given transforms COMPLETED with `release_id`.
    ///
    /// All-or-nothing: if any id is unknown or not PENDING, no row changes
    /// and the call fails.
    fn complete_transforms(&self, ids: &[String], release_id: &str) -> Result<(), StoreError>;

    fn delete_release(&self, release_id: &str) -> Result<(), StoreError>;
}

/// Serializable project snapshot: the system-of-record contents the CLI
/// loads and writes back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    /// Annotations keyed by image id.
    #[serde(default)]
    pub annotations: BTreeMap<String, Vec<Annotation>>,
    #[serde(default)]
    pub transforms: Vec<TransformationRecord>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl ProjectSnapshot {
    /// Loads a snapshot from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Backend(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| StoreError::Backend(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Writes the snapshot back as pretty JSON.
    pub fn to_file(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| StoreError::Backend(format!("cannot write {}: {}", path.display(), e)))
    }
}

/// In-memory store over a [`ProjectSnapshot`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<ProjectSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ProjectSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    /// Loads the store from a project snapshot file.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_snapshot(ProjectSnapshot::from_file(path)?))
    }

    /// Copies the current contents out as a snapshot.
    pub fn snapshot(&self) -> ProjectSnapshot {
        self.lock().clone()
    }

    /// Persists the current contents to a snapshot file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), StoreError> {
        self.snapshot().to_file(path)
    }

    pub fn add_image(&self, image: ImageRecord) {
        self.lock().images.push(image);
    }

    pub fn add_annotations(&self, image_id: impl Into<String>, annotations: Vec<Annotation>) {
        self.lock()
            .annotations
            .entry(image_id.into())
            .or_default()
            .extend(annotations);
    }

    pub fn add_transform(&self, record: TransformationRecord) {
        self.lock().transforms.push(record);
    }

    /// Current state of one transformation record (test helper).
    pub fn transform_status(&self, id: &str) -> Option<(TransformStatus, Option<String>)> {
        self.lock()
            .transforms
            .iter()
            .find(|t| t.id == id)
            .map(|t| (t.status, t.release_id.clone()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProjectSnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReleaseStore for MemoryStore {
    fn labeled_images(
        &self,
        dataset_ids: &[String],
        splits: &[SplitSection],
    ) -> Result<Vec<ImageRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .images
            .iter()
            .filter(|img| {
                img.is_labeled
                    && dataset_ids.contains(&img.dataset_id)
                    && splits.contains(&img.split_section)
            })
            .cloned()
            .collect())
    }

    fn pending_transforms(
        &self,
        release_version: &str,
    ) -> Result<Vec<TransformationRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .transforms
            .iter()
            .filter(|t| {
                t.is_enabled
                    && t.status == TransformStatus::Pending
                    && t.release_version == release_version
            })
            .cloned()
            .collect())
    }

    fn annotations_for_image(&self, image_id: &str) -> Result<Vec<Annotation>, StoreError> {
        Ok(self
            .lock()
            .annotations
            .get(image_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_release(&self, release: &Release) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.releases.iter().any(|r| r.id == release.id) {
            return Err(StoreError::Conflict(format!(
                "release {} already exists",
                release.id
            )));
        }
        inner.releases.push(release.clone());
        Ok(())
    }

    fn update_release(&self, release: &Release) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.releases.iter_mut().find(|r| r.id == release.id) {
            Some(slot) => {
                *slot = release.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("release {}", release.id))),
        }
    }

    fn get_release(&self, release_id: &str) -> Result<Option<Release>, StoreError> {
        Ok(self
            .lock()
            .releases
            .iter()
            .find(|r| r.id == release_id)
            .cloned())
    }

    fn releases_for_project(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<Release>, StoreError> {
        let inner = self.lock();
        let mut releases: Vec<Release> = inner
            .releases
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        releases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        releases.truncate(limit);
        Ok(releases)
    }

    fn complete_transforms(&self, ids: &[String], release_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();

        // Validate every row before touching any, so a partial failure
        // cannot leave orphaned COMPLETED records.
        for id in ids {
            match inner.transforms.iter().find(|t| &t.id == id) {
                None => return Err(StoreError::NotFound(format!("transform {}", id))),
                Some(t) if t.status != TransformStatus::Pending => {
                    return Err(StoreError::Conflict(format!(
                        "transform {} is not PENDING",
                        id
                    )))
                }
                Some(_) => {}
            }
        }

        for t in inner.transforms.iter_mut() {
            if ids.contains(&t.id) {
                t.status = TransformStatus::Completed;
                t.release_id = Some(release_id.to_string());
            }
        }
        Ok(())
    }

    fn delete_release(&self, release_id: &str) -> Result<(), StoreError> {
        self.lock().releases.retain(|r| r.id != release_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelforge_core::{ReleaseConfig, TaskType, TransformKind};

    fn image(id: &str, dataset: &str, split: SplitSection, labeled: bool) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            dataset_id: dataset.into(),
            dataset_name: dataset.into(),
            filename: format!("{id}.png"),
            file_path: format!("images/{id}.png"),
            width: 100,
            height: 100,
            split_section: split,
            is_labeled: labeled,
        }
    }

    #[test]
    fn test_labeled_images_filtering() {
        let store = MemoryStore::new();
        store.add_image(image("a", "ds-1", SplitSection::Train, true));
        store.add_image(image("b", "ds-1", SplitSection::Val, true));
        store.add_image(image("c", "ds-1", SplitSection::Train, false));
        store.add_image(image("d", "ds-2", SplitSection::Train, true));

        let found = store
            .labeled_images(&["ds-1".into()], &[SplitSection::Train])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn test_pending_transforms_by_version() {
        let store = MemoryStore::new();
        store.add_transform(TransformationRecord::pending(
            "t-1",
            TransformKind::Flip,
            Default::default(),
            0,
            "v1.0",
        ));
        let mut done = TransformationRecord::pending(
            "t-2",
            TransformKind::Rotate,
            Default::default(),
            1,
            "v1.0",
        );
        done.status = TransformStatus::Completed;
        store.add_transform(done);
        store.add_transform(TransformationRecord::pending(
            "t-3",
            TransformKind::Blur,
            Default::default(),
            2,
            "v2.0",
        ));

        let found = store.pending_transforms("v1.0").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "t-1");
    }

    #[test]
    fn test_complete_transforms_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.add_transform(TransformationRecord::pending(
            "t-1",
            TransformKind::Flip,
            Default::default(),
            0,
            "v1.0",
        ));

        // One unknown id fails the whole batch
        let err = store
            .complete_transforms(&["t-1".into(), "t-missing".into()], "rel-1")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(
            store.transform_status("t-1").unwrap().0,
            TransformStatus::Pending
        );

        // Valid batch completes
        store.complete_transforms(&["t-1".into()], "rel-1").unwrap();
        let (status, release_id) = store.transform_status("t-1").unwrap();
        assert_eq!(status, TransformStatus::Completed);
        assert_eq!(release_id.as_deref(), Some("rel-1"));

        // Completing twice conflicts
        let err = store
            .complete_transforms(&["t-1".into()], "rel-2")
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_release_crud_and_history() {
        let store = MemoryStore::new();
        let config = ReleaseConfig::builder("r1", "proj-1", TaskType::ObjectDetection)
            .dataset("ds-1")
            .seed(1)
            .build();
        let mut release = Release::pending(&config);
        store.create_release(&release).unwrap();
        assert!(store.create_release(&release).is_err());

        release.final_image_count = 12;
        store.update_release(&release).unwrap();
        assert_eq!(
            store
                .get_release(&release.id)
                .unwrap()
                .unwrap()
                .final_image_count,
            12
        );

        let history = store.releases_for_project("proj-1", 10).unwrap();
        assert_eq!(history.len(), 1);

        store.delete_release(&release.id).unwrap();
        assert!(store.get_release(&release.id).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = MemoryStore::new();
        store.add_image(image("a", "ds-1", SplitSection::Train, true));
        store.add_annotations(
            "a",
            vec![Annotation::Bbox(labelforge_core::BoundingBox::new(
                0.0, 0.0, 10.0, 10.0, 0, "car",
            ))],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        store.save_to_file(&path).unwrap();

        let loaded = MemoryStore::from_file(&path).unwrap();
        assert_eq!(loaded.snapshot().images.len(), 1);
        assert_eq!(loaded.annotations_for_image("a").unwrap().len(), 1);
    }
}
