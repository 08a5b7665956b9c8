//! Per-user processing context
//!
//! A [`Session`] owns the active point set and its stored file id. Every
//! operation holds the session lock from start to finish, so operations on one
//! session run one at a time while separate sessions proceed in parallel.

use crate::action::Action;
use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::error::{Diagnostic, ExtractionError, Result, Stage};
use crate::loader::PointLoader;
use crate::persistence::{FileId, PersistenceGateway, persist_points, persist_regions};
use crate::pipeline::{ExtractionOutput, run_operation};
use crate::scene::scene_for;
use crate::task::{self, TaskHandle};
use crate::types::Point;
use crate::visualization::VisualizationSink;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedGateway = Arc<Mutex<dyn PersistenceGateway>>;
pub type SharedSink = Arc<Mutex<dyn VisualizationSink>>;

/// State guarded by the session lock
#[derive(Debug, Default)]
pub struct SessionState {
    pub file_id: Option<FileId>,
    pub file_name: Option<String>,
    pub points: Option<Arc<[Point]>>,
    pub last_output: Option<Arc<ExtractionOutput>>,
}

/// Cheap to clone; clones share state and collaborators
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    gateway: SharedGateway,
    sink: SharedSink,
    config: Arc<PipelineConfig>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(config: PipelineConfig, gateway: SharedGateway, sink: SharedSink) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            gateway,
            sink,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn file_id(&self) -> Option<FileId> {
        lock(&self.state).file_id
    }

    pub fn points(&self) -> Option<Arc<[Point]>> {
        lock(&self.state).points.clone()
    }

    pub fn last_output(&self) -> Option<Arc<ExtractionOutput>> {
        lock(&self.state).last_output.clone()
    }

    /// Load `path`, register it with the gateway and make it the active
    /// point set
    pub fn open_file(&self, name: &str, path: &Path, loader: &dyn PointLoader) -> Result<FileId> {
        let mut state = lock(&self.state);
        let points = loader.load(path)?;
        self.activate(&mut state, name, path, points)
    }

    /// Make an in-memory point set the active one
    pub fn open_points(&self, name: &str, points: Vec<Point>) -> Result<FileId> {
        let mut state = lock(&self.state);
        self.activate(&mut state, name, Path::new(name), points)
    }

    fn activate(
        &self,
        state: &mut SessionState,
        name: &str,
        path: &Path,
        points: Vec<Point>,
    ) -> Result<FileId> {
        let file_id = lock(&*self.gateway)
            .create_file(name, path)
            .map_err(|source| ExtractionError::PersistenceFailure {
                region: None,
                source,
            })?;

        log::info!("file {} ({} points) is now active", file_id, points.len());
        state.file_id = Some(file_id);
        state.file_name = Some(name.to_string());
        state.points = Some(points.into());
        state.last_output = None;
        Ok(file_id)
    }

    /// Run `action` on the active point set, store what it stores and send
    /// its scene to the sink.
    ///
    /// A sink failure does not fail the action; it is added to the
    /// diagnostics.
    pub fn run(&self, action: Action, cancel: &CancelToken) -> Result<Arc<ExtractionOutput>> {
        let mut state = lock(&self.state);
        let (Some(points), Some(file_id)) = (state.points.clone(), state.file_id) else {
            return Err(ExtractionError::NoFileSelected);
        };

        log::info!("running {} on file {}", action, file_id);
        let params = action.params(&self.config);
        let mut output = run_operation(&points, action.operation(&self.config), &params, cancel)?;

        if action.stores_points() && self.config.persist_points {
            persist_points(&mut *lock(&*self.gateway), file_id, &points)?;
        }
        if action.stores_regions() {
            persist_regions(&mut *lock(&*self.gateway), file_id, &output.regions)?;
        }

        let scene = scene_for(&points, &output, self.config.normal_length);
        if let Err(err) = lock(&*self.sink).display(&scene) {
            log::warn!("{}", err);
            output
                .diagnostics
                .push(Diagnostic::new(Stage::Visualization, None, err.to_string()));
        }

        let output = Arc::new(output);
        state.last_output = Some(Arc::clone(&output));
        Ok(output)
    }

    /// Run `action` on a background thread
    pub fn spawn(&self, action: Action) -> Result<TaskHandle<Arc<ExtractionOutput>>> {
        let session = self.clone();
        task::spawn(action.name(), move |cancel| session.run(action, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::testdata;
    use crate::visualization::NullSink;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn session() -> (Session, Arc<Mutex<MemoryStore>>, Arc<Mutex<NullSink>>) {
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let sink = Arc::new(Mutex::new(NullSink::default()));
        let mut config = PipelineConfig::default();
        config.params.seed = Some(1);
        let session = Session::new(config, store.clone(), sink.clone());
        (session, store, sink)
    }

    #[test]
    fn test_run_without_file() {
        let (session, _, sink) = session();
        let err = session.run(Action::FindPlanes, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ExtractionError::NoFileSelected));
        assert_eq!(lock(&*sink).calls, 0);
    }

    #[test]
    fn test_open_stores_points_and_displays() {
        let (session, store, sink) = session();
        let points = testdata::uniform_cube(40, 1.0, &mut StdRng::seed_from_u64(0));
        let id = session.open_points("cube", points).unwrap();

        let out = session.run(Action::Open, &CancelToken::new()).unwrap();
        assert!(out.regions.is_empty());
        assert_eq!(lock(&*store).points(id).len(), 40);
        assert_eq!(lock(&*sink).calls, 1);
        assert_eq!(lock(&*sink).last_len, 1);
        assert!(session.last_output().is_some());
    }

    #[test]
    fn test_plane_actions_store_nothing() {
        let (session, store, _) = session();
        let points = testdata::floor_and_wall(200, 0.01, &mut StdRng::seed_from_u64(2)).unwrap();
        let id = session.open_points("room", points).unwrap();

        let out = session
            .run(Action::FindPlanes, &CancelToken::new())
            .unwrap();
        assert_eq!(out.regions.len(), 1);
        assert!(lock(&*store).polygons(id).is_empty());
        assert!(lock(&*store).points(id).is_empty());
    }

    #[test]
    fn test_spawned_runs_share_session() {
        let (session, _, sink) = session();
        let points = testdata::floor_and_wall(200, 0.01, &mut StdRng::seed_from_u64(3)).unwrap();
        session.open_points("room", points).unwrap();

        let a = session.spawn(Action::FindPlanes).unwrap();
        let b = session.spawn(Action::FindMultiplePlanes).unwrap();
        assert_eq!(a.wait().unwrap().regions.len(), 1);
        assert!(!b.wait().unwrap().regions.is_empty());
        assert_eq!(lock(&*sink).calls, 2);
    }
}
