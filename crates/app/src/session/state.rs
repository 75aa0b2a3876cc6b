use std::{sync::Arc, time::Instant};

use geo_core::{BoundsReport, Coordinate, GeoError, PointStore, UserKey, compute};
use point_repo::{PersistenceError, PointRepository};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error("points service unavailable; session invalidated")]
    PersistenceUnavailable(#[source] PersistenceError),
    #[error("session is invalidated; reload to continue")]
    Invalidated,
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Geo(err) => err.kind(),
            SessionError::PersistenceUnavailable(_) => "persistence_unavailable",
            SessionError::Invalidated => "invalidated",
        }
    }
}

/// Points plus the report derived from exactly those points.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub points: Vec<Coordinate>,
    pub report: BoundsReport,
}

impl Snapshot {
    fn of(store: &PointStore) -> Self {
        let points = store.to_ordered_sequence();
        let report = compute(&points);
        Self { points, report }
    }
}

/// One user's live editing session.
///
/// `persisted` mirrors the last point set the repository acknowledged. When a
/// write fails the working store rolls back to it and the session is marked
/// invalid; only a successful [`Session::rehydrate`] makes it usable again.
pub struct Session {
    user: UserKey,
    repository: Arc<dyn PointRepository>,
    store: PointStore,
    persisted: PointStore,
    valid: bool,
}

impl Session {
    /// Load the user's points from `repository` and start a session on them.
    pub fn hydrate(
        user: UserKey,
        repository: Arc<dyn PointRepository>,
    ) -> Result<Self, SessionError> {
        let points = repository
            .load(&user)
            .map_err(SessionError::PersistenceUnavailable)?;
        let store = PointStore::from_points(points)?;
        info!("session for {user} hydrated with {} points", store.len());
        Ok(Self {
            user,
            repository,
            persisted: store.clone(),
            store,
            valid: true,
        })
    }

    pub fn user(&self) -> &UserKey {
        &self.user
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn points(&self) -> &[Coordinate] {
        self.store.as_slice()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::of(&self.store)
    }

    pub fn add(&mut self, coordinate: Coordinate) -> Result<Snapshot, SessionError> {
        self.ensure_valid()?;
        self.store.add(coordinate)?;
        self.write_through()
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Snapshot, SessionError> {
        self.ensure_valid()?;
        self.store.remove_at(index)?;
        self.write_through()
    }

    /// Discard local state and reload the user's points from the repository.
    pub fn rehydrate(&mut self) -> Result<Snapshot, SessionError> {
        let points = match self.repository.load(&self.user) {
            Ok(points) => points,
            Err(err) => {
                self.valid = false;
                return Err(SessionError::PersistenceUnavailable(err));
            }
        };
        let store = PointStore::from_points(points)?;
        self.persisted = store.clone();
        self.store = store;
        self.valid = true;
        info!("session for {} rehydrated with {} points", self.user, self.store.len());
        Ok(self.snapshot())
    }

    fn ensure_valid(&self) -> Result<(), SessionError> {
        if self.valid {
            Ok(())
        } else {
            Err(SessionError::Invalidated)
        }
    }

    fn write_through(&mut self) -> Result<Snapshot, SessionError> {
        let started = Instant::now();
        let result = self.repository.save(&self.user, self.store.as_slice());
        metrics::histogram!("geomark_persistence_seconds", "op" => "save")
            .record(started.elapsed().as_secs_f64());
        match result {
            Ok(()) => {
                self.persisted = self.store.clone();
                Ok(self.snapshot())
            }
            Err(err) => {
                warn!(
                    "saving points for {} failed ({}); discarding unsaved change",
                    self.user,
                    err.kind()
                );
                self.store = self.persisted.clone();
                self.valid = false;
                Err(SessionError::PersistenceUnavailable(err))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use point_repo::MemoryRepository;

    use super::*;

    /// Repository that can be switched offline to simulate an outage.
    #[derive(Default)]
    pub(crate) struct FlakyRepository {
        pub(crate) inner: MemoryRepository,
        pub(crate) offline: AtomicBool,
    }

    impl FlakyRepository {
        fn check(&self) -> Result<(), PersistenceError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(PersistenceError::Status {
                    url: "memory://offline".into(),
                    status: 503,
                })
            } else {
                Ok(())
            }
        }
    }

    impl PointRepository for FlakyRepository {
        fn load(&self, user: &UserKey) -> Result<Vec<Coordinate>, PersistenceError> {
            self.check()?;
            self.inner.load(user)
        }

        fn save(&self, user: &UserKey, points: &[Coordinate]) -> Result<(), PersistenceError> {
            self.check()?;
            self.inner.save(user, points)
        }
    }

    pub(crate) fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat).unwrap()
    }

    pub(crate) fn user() -> UserKey {
        UserKey::new("ana").unwrap()
    }

    #[test]
    fn hydrate_seeds_from_repository() {
        let repo = Arc::new(FlakyRepository::default());
        repo.inner.save(&user(), &[c(1.0, 1.0), c(2.0, 2.0)]).unwrap();
        let session = Session::hydrate(user(), repo).unwrap();
        assert_eq!(session.points(), &[c(1.0, 1.0), c(2.0, 2.0)]);
        assert!(session.is_valid());
    }

    #[test]
    fn hydrate_fails_when_offline() {
        let repo = Arc::new(FlakyRepository::default());
        repo.offline.store(true, Ordering::SeqCst);
        let err = Session::hydrate(user(), repo).err().unwrap();
        assert_eq!(err.kind(), "persistence_unavailable");
    }

    #[test]
    fn mutations_write_through() {
        let repo = Arc::new(FlakyRepository::default());
        let mut session = Session::hydrate(user(), repo.clone()).unwrap();
        session.add(c(-10.0, -5.0)).unwrap();
        let snapshot = session.add(c(10.0, 5.0)).unwrap();
        assert_eq!(snapshot.report.area.area_square_km_rounded(), 1_574_296.3);
        assert_eq!(repo.inner.load(&user()).unwrap().len(), 2);

        session.remove_at(0).unwrap();
        assert_eq!(repo.inner.load(&user()).unwrap(), vec![c(10.0, 5.0)]);
    }

    #[test]
    fn invalid_operations_leave_session_untouched() {
        let repo = Arc::new(FlakyRepository::default());
        let mut session = Session::hydrate(user(), repo.clone()).unwrap();
        session.add(c(1.0, 1.0)).unwrap();
        assert!(matches!(
            session.remove_at(3),
            Err(SessionError::Geo(GeoError::IndexOutOfRange { index: 3, len: 1 }))
        ));
        assert_eq!(session.points(), &[c(1.0, 1.0)]);
        assert!(session.is_valid());
        assert_eq!(repo.inner.revision(&user()).unwrap(), 1);
    }

    #[test]
    fn failed_save_rolls_back_and_invalidates() {
        let repo = Arc::new(FlakyRepository::default());
        let mut session = Session::hydrate(user(), repo.clone()).unwrap();
        session.add(c(1.0, 1.0)).unwrap();

        repo.offline.store(true, Ordering::SeqCst);
        let err = session.add(c(2.0, 2.0)).unwrap_err();
        assert!(matches!(err, SessionError::PersistenceUnavailable(_)));
        assert_eq!(session.points(), &[c(1.0, 1.0)]);
        assert!(!session.is_valid());
        assert!(matches!(
            session.add(c(3.0, 3.0)),
            Err(SessionError::Invalidated)
        ));

        assert!(session.rehydrate().is_err());
        repo.offline.store(false, Ordering::SeqCst);
        let snapshot = session.rehydrate().unwrap();
        assert_eq!(snapshot.points, vec![c(1.0, 1.0)]);
        assert!(session.is_valid());
    }

    #[test]
    fn rehydrate_picks_up_writes_from_other_clients() {
        let repo = Arc::new(FlakyRepository::default());
        let mut session = Session::hydrate(user(), repo.clone()).unwrap();
        session.add(c(1.0, 1.0)).unwrap();
        repo.inner.save(&user(), &[c(5.0, 5.0), c(6.0, 6.0)]).unwrap();
        let snapshot = session.rehydrate().unwrap();
        assert_eq!(snapshot.points, vec![c(5.0, 5.0), c(6.0, 6.0)]);
    }
}
