use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use chrono::{DateTime, Utc};
use geo_core::{Coordinate, GeoError, PointStore, UserKey};
use tracing::debug;

use crate::{PersistenceError, PointRepository};

/// One user's stored point set plus a revision bumped on every successful write.
#[derive(Debug, Clone, Default)]
pub struct PointRecord {
    pub points: PointStore,
    pub revision: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

type SharedRecord = Arc<Mutex<PointRecord>>;

/// In-process repository with one lock per user key.
///
/// The outer map lock is only held long enough to find or create a user's
/// record; the read-modify-write itself runs under that user's mutex, so
/// writers for different users never block or overwrite each other.
#[derive(Default)]
pub struct MemoryRepository {
    records: RwLock<HashMap<UserKey, SharedRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `mutate` to the user's points while holding that user's lock.
    ///
    /// The revision is bumped only when `mutate` succeeds; on error the points
    /// are left untouched and the error is returned as
    /// [`PersistenceError::Invalid`]. Unknown users get a record only once a
    /// mutation succeeds.
    pub fn mutate<F>(&self, user: &UserKey, mutate: F) -> Result<PointRecord, PersistenceError>
    where
        F: FnOnce(&mut PointStore) -> Result<(), GeoError>,
    {
        let poisoned = || PersistenceError::Poisoned {
            user: user.to_string(),
        };
        let existing = self.records.read().map_err(|_| poisoned())?.get(user).cloned();
        let record = match existing {
            Some(record) => record,
            None => {
                let mut records = self.records.write().map_err(|_| poisoned())?;
                match records.get(user) {
                    Some(record) => record.clone(),
                    None => {
                        let mut fresh = PointRecord::default();
                        apply(user, &mut fresh, mutate)?;
                        records.insert(user.clone(), Arc::new(Mutex::new(fresh.clone())));
                        return Ok(fresh);
                    }
                }
            }
        };
        let mut guard = record.lock().map_err(|_| poisoned())?;
        apply(user, &mut guard, mutate)?;
        Ok(guard.clone())
    }

    /// Copy of the user's record; unknown users get an empty record.
    pub fn snapshot(&self, user: &UserKey) -> Result<PointRecord, PersistenceError> {
        let poisoned = || PersistenceError::Poisoned {
            user: user.to_string(),
        };
        let existing = self.records.read().map_err(|_| poisoned())?.get(user).cloned();
        match existing {
            Some(record) => Ok(record.lock().map_err(|_| poisoned())?.clone()),
            None => Ok(PointRecord::default()),
        }
    }

    pub fn revision(&self, user: &UserKey) -> Result<u64, PersistenceError> {
        Ok(self.snapshot(user)?.revision)
    }

    pub fn user_count(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }
}

fn apply<F>(user: &UserKey, record: &mut PointRecord, mutate: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut PointStore) -> Result<(), GeoError>,
{
    mutate(&mut record.points)?;
    record.revision = record.revision.saturating_add(1);
    record.updated_at = Some(Utc::now());
    debug!(
        "user {user} now has {} points (revision {})",
        record.points.len(),
        record.revision
    );
    Ok(())
}

impl PointRepository for MemoryRepository {
    fn load(&self, user: &UserKey) -> Result<Vec<Coordinate>, PersistenceError> {
        Ok(self.snapshot(user)?.points.to_ordered_sequence())
    }

    fn save(&self, user: &UserKey, points: &[Coordinate]) -> Result<(), PersistenceError> {
        self.mutate(user, |store| store.replace(points.to_vec()).map(|_| ()))?;
        Ok(())
    }
}
