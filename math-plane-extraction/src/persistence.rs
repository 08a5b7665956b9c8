//! Storage of files, points, region polygons and facet normals
//!
//! [`PersistenceGateway`] is the boundary to the storage engine. Writes for one
//! region are bracketed by `begin`/`commit`; a failure inside the bracket is
//! undone with `rollback`.
//!
//! Two gateways are provided: [`MemoryStore`] keeps the tables in process and
//! [`JsonStore`] additionally mirrors them to a JSON file on every commit.

use crate::error::{ExtractionError, Stage};
use crate::pipeline::RegionResult;
use crate::types::Point;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type FileId = u64;
pub type PolygonId = u64;

/// Errors raised by a persistence gateway
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no transaction in progress")]
    NoTransaction,

    #[error("a transaction is already in progress")]
    TransactionActive,

    #[error("unknown file id {0}")]
    UnknownFile(FileId),

    #[error("unknown polygon id {0}")]
    UnknownPolygon(PolygonId),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Storage boundary for extraction results
pub trait PersistenceGateway: Send {
    /// Register a point-cloud file and return its id
    fn create_file(&mut self, name: &str, path: &Path) -> Result<FileId, PersistenceError>;

    fn add_point(&mut self, file_id: FileId, x: f64, y: f64, z: f64)
    -> Result<(), PersistenceError>;

    /// Store a region polygon and return its id
    fn add_polygon(
        &mut self,
        file_id: FileId,
        facet_count: usize,
        normal: [f64; 3],
    ) -> Result<PolygonId, PersistenceError>;

    fn add_normal(
        &mut self,
        file_id: FileId,
        polygon_id: PolygonId,
        normal: [f64; 3],
    ) -> Result<(), PersistenceError>;

    fn begin(&mut self) -> Result<(), PersistenceError>;

    fn commit(&mut self) -> Result<(), PersistenceError>;

    fn rollback(&mut self) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedPoint {
    pub file_id: FileId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One accepted region with a hull
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedPolygon {
    pub id: PolygonId,
    pub file_id: FileId,
    /// Triangles of the region hull
    pub facet_count: usize,
    /// Plane normal of the region
    pub normal: [f64; 3],
}

/// Outward normal of one non-degenerate hull facet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedNormal {
    pub file_id: FileId,
    pub polygon_id: PolygonId,
    pub normal: [f64; 3],
}

/// All stored records. Tables only grow; ids are never reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub files: Vec<FileRecord>,
    pub points: Vec<PersistedPoint>,
    pub polygons: Vec<PersistedPolygon>,
    pub normals: Vec<PersistedNormal>,
    next_file_id: FileId,
    next_polygon_id: PolygonId,
}

/// Table lengths and id counters at `begin`
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    files: usize,
    points: usize,
    polygons: usize,
    normals: usize,
    next_file_id: FileId,
    next_polygon_id: PolygonId,
}

impl Tables {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            files: self.files.len(),
            points: self.points.len(),
            polygons: self.polygons.len(),
            normals: self.normals.len(),
            next_file_id: self.next_file_id,
            next_polygon_id: self.next_polygon_id,
        }
    }

    fn restore(&mut self, c: Checkpoint) {
        self.files.truncate(c.files);
        self.points.truncate(c.points);
        self.polygons.truncate(c.polygons);
        self.normals.truncate(c.normals);
        self.next_file_id = c.next_file_id;
        self.next_polygon_id = c.next_polygon_id;
    }

    fn has_file(&self, file_id: FileId) -> bool {
        self.files.iter().any(|f| f.id == file_id)
    }

    fn has_polygon(&self, polygon_id: PolygonId) -> bool {
        self.polygons.iter().any(|p| p.id == polygon_id)
    }
}

/// In-process tables. Writes outside a transaction apply immediately.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    checkpoint: Option<Checkpoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Tables) -> Self {
        Self {
            tables,
            checkpoint: None,
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn in_transaction(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.tables.files
    }

    pub fn points(&self, file_id: FileId) -> Vec<PersistedPoint> {
        self.tables
            .points
            .iter()
            .filter(|p| p.file_id == file_id)
            .copied()
            .collect()
    }

    pub fn polygons(&self, file_id: FileId) -> Vec<PersistedPolygon> {
        self.tables
            .polygons
            .iter()
            .filter(|p| p.file_id == file_id)
            .copied()
            .collect()
    }

    pub fn normals(&self, polygon_id: PolygonId) -> Vec<PersistedNormal> {
        self.tables
            .normals
            .iter()
            .filter(|n| n.polygon_id == polygon_id)
            .copied()
            .collect()
    }
}

impl PersistenceGateway for MemoryStore {
    fn create_file(&mut self, name: &str, path: &Path) -> Result<FileId, PersistenceError> {
        let id = self.tables.next_file_id;
        self.tables.next_file_id += 1;
        self.tables.files.push(FileRecord {
            id,
            name: name.to_string(),
            path: path.to_path_buf(),
        });
        Ok(id)
    }

    fn add_point(
        &mut self,
        file_id: FileId,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), PersistenceError> {
        if !self.tables.has_file(file_id) {
            return Err(PersistenceError::UnknownFile(file_id));
        }
        self.tables.points.push(PersistedPoint { file_id, x, y, z });
        Ok(())
    }

    fn add_polygon(
        &mut self,
        file_id: FileId,
        facet_count: usize,
        normal: [f64; 3],
    ) -> Result<PolygonId, PersistenceError> {
        if !self.tables.has_file(file_id) {
            return Err(PersistenceError::UnknownFile(file_id));
        }
        let id = self.tables.next_polygon_id;
        self.tables.next_polygon_id += 1;
        self.tables.polygons.push(PersistedPolygon {
            id,
            file_id,
            facet_count,
            normal,
        });
        Ok(id)
    }

    fn add_normal(
        &mut self,
        file_id: FileId,
        polygon_id: PolygonId,
        normal: [f64; 3],
    ) -> Result<(), PersistenceError> {
        if !self.tables.has_file(file_id) {
            return Err(PersistenceError::UnknownFile(file_id));
        }
        if !self.tables.has_polygon(polygon_id) {
            return Err(PersistenceError::UnknownPolygon(polygon_id));
        }
        self.tables.normals.push(PersistedNormal {
            file_id,
            polygon_id,
            normal,
        });
        Ok(())
    }

    fn begin(&mut self) -> Result<(), PersistenceError> {
        if self.checkpoint.is_some() {
            return Err(PersistenceError::TransactionActive);
        }
        self.checkpoint = Some(self.tables.checkpoint());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistenceError> {
        self.checkpoint
            .take()
            .map(|_| ())
            .ok_or(PersistenceError::NoTransaction)
    }

    fn rollback(&mut self) -> Result<(), PersistenceError> {
        let checkpoint = self
            .checkpoint
            .take()
            .ok_or(PersistenceError::NoTransaction)?;
        self.tables.restore(checkpoint);
        Ok(())
    }
}

/// [`MemoryStore`] mirrored to a JSON file.
///
/// The file is rewritten after every commit and after every write made
/// outside a transaction. Writes go to a sibling temporary file that is then
/// renamed over the target.
///
/// Every rewrite serializes all tables, so a loop of `n` writes outside a
/// transaction costs `O(n^2)` I/O. Bracket bulk writes with `begin` and
/// `commit`, as [`persist_points`] and [`persist_regions`] do, to save once.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    store: MemoryStore,
}

impl JsonStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Tables::default()
        };
        Ok(Self {
            path,
            store: MemoryStore::from_tables(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the tables
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn save(&self) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(self.store.tables())?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn autosave(&self) -> Result<(), PersistenceError> {
        if self.store.in_transaction() {
            Ok(())
        } else {
            self.save()
        }
    }
}

impl PersistenceGateway for JsonStore {
    fn create_file(&mut self, name: &str, path: &Path) -> Result<FileId, PersistenceError> {
        let id = self.store.create_file(name, path)?;
        self.autosave()?;
        Ok(id)
    }

    fn add_point(
        &mut self,
        file_id: FileId,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), PersistenceError> {
        self.store.add_point(file_id, x, y, z)?;
        self.autosave()
    }

    fn add_polygon(
        &mut self,
        file_id: FileId,
        facet_count: usize,
        normal: [f64; 3],
    ) -> Result<PolygonId, PersistenceError> {
        let id = self.store.add_polygon(file_id, facet_count, normal)?;
        self.autosave()?;
        Ok(id)
    }

    fn add_normal(
        &mut self,
        file_id: FileId,
        polygon_id: PolygonId,
        normal: [f64; 3],
    ) -> Result<(), PersistenceError> {
        self.store.add_normal(file_id, polygon_id, normal)?;
        self.autosave()
    }

    fn begin(&mut self) -> Result<(), PersistenceError> {
        self.store.begin()
    }

    fn commit(&mut self) -> Result<(), PersistenceError> {
        if !self.store.in_transaction() {
            return Err(PersistenceError::NoTransaction);
        }
        // Saved before the checkpoint is dropped so a failed write can still roll back
        self.save()?;
        self.store.commit()
    }

    fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.store.rollback()
    }
}

/// Run `writes` inside one transaction, rolling back when it fails
fn transaction<G, T, F>(gateway: &mut G, writes: F) -> Result<T, PersistenceError>
where
    G: PersistenceGateway + ?Sized,
    F: FnOnce(&mut G) -> Result<T, PersistenceError>,
{
    gateway.begin()?;
    let outcome = writes(&mut *gateway).and_then(|value| {
        gateway.commit()?;
        Ok(value)
    });
    match outcome {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(rollback_err) = gateway.rollback() {
                log::error!("rollback failed after {}: {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

/// Store every point of a file in one transaction
pub fn persist_points<G: PersistenceGateway + ?Sized>(
    gateway: &mut G,
    file_id: FileId,
    points: &[Point],
) -> Result<(), ExtractionError> {
    transaction(gateway, |g| {
        points
            .iter()
            .try_for_each(|p| g.add_point(file_id, p.x, p.y, p.z))
    })
    .map_err(|source| ExtractionError::PersistenceFailure {
        region: None,
        source,
    })?;
    log::info!("stored {} points for file {}", points.len(), file_id);
    Ok(())
}

/// Store one polygon per region with a hull, and one normal per
/// non-degenerate facet of that hull.
///
/// Each region is written in its own transaction. The first failure rolls
/// back that region and aborts the remaining ones; regions already committed
/// stay stored.
pub fn persist_regions<G: PersistenceGateway + ?Sized>(
    gateway: &mut G,
    file_id: FileId,
    regions: &[RegionResult],
) -> Result<Vec<PolygonId>, ExtractionError> {
    let mut ids = Vec::with_capacity(regions.len());

    for region in regions {
        let Some(hull) = &region.hull else {
            log::debug!("region {} has no hull; nothing stored", region.index);
            continue;
        };

        let id = transaction(gateway, |g| {
            let id = g.add_polygon(file_id, hull.num_faces(), region.plane.normal().to_array())?;
            for facet in &region.facets {
                g.add_normal(file_id, id, facet.normal.to_array())?;
            }
            Ok(id)
        })
        .map_err(|source| {
            log::error!(
                "{} for region {}: {}",
                Stage::Persistence,
                region.index,
                source
            );
            ExtractionError::PersistenceFailure {
                region: Some(region.index),
                source,
            }
        })?;

        ids.push(id);
    }

    log::info!("stored {} polygons for file {}", ids.len(), file_id);
    Ok(ids)
}
