//! Model import
//!
//! A user hands in a set of files (from a picker or a drop). The first one
//! with a model extension is the primary file; every file is registered as a
//! transient resource so the primary's references to companions (`scene.bin`,
//! textures) resolve by bare file name. Deserialization runs on the loader
//! thread; [`AssetImporter::poll`] finishes each job on the calling thread by
//! normalizing the model and inserting it into the scene. The job's resources
//! are released as soon as its result has been handled.

pub mod gltf;
pub mod loader;
pub mod normalize;
pub mod resources;

pub use self::gltf::{FetchError, Fetcher, GltfError};
pub use loader::{LoadRequest, LoadResult, ModelLoader};
pub use resources::{base_name, ResourceHandle, ResourceStore, UriResolver};

use crate::scene::{NodeId, SceneGraph, Subtree};
use glam::Vec3;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A file handed in by the user.
#[derive(Debug, Clone)]
pub struct SuppliedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SuppliedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("model")
            .to_string();
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("no model file found; select a .gltf or .glb file together with its companions")]
    NoPrimaryFile,
    #[error("failed to load {name}: {source}")]
    Deserialize {
        name: String,
        #[source]
        source: GltfError,
    },
    #[error("{name} contains no geometry to place")]
    EmptyModelScene { name: String },
    #[error("model loader is not running")]
    LoaderUnavailable,
    #[error("model container no longer exists")]
    ContainerMissing,
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Accepted primary-file extensions, without the dot.
    pub extensions: Vec<String>,
    pub target_size: f32,
    pub staging_offset: Vec3,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["gltf".to_string(), "glb".to_string()],
            target_size: 2.0,
            staging_offset: Vec3::new(0.0, 0.0, -4.0),
        }
    }
}

/// Index of the first file whose name ends in an accepted extension
/// (case-insensitive).
pub fn find_primary(files: &[SuppliedFile], extensions: &[String]) -> Option<usize> {
    files.iter().position(|file| {
        let name = base_name(&file.name);
        name.rsplit_once('.')
            .is_some_and(|(_, ext)| extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext)))
    })
}

/// One in-flight import. Owns the transient resources of its files.
struct ImportJob {
    primary: String,
    started: Instant,
    _resources: Vec<ResourceHandle>,
}

#[derive(Debug)]
pub enum ImportEvent {
    Placed {
        job: u64,
        node: NodeId,
        name: String,
        file: String,
    },
    Failed {
        job: u64,
        file: String,
        error: ImportError,
    },
}

pub struct AssetImporter {
    settings: ImportSettings,
    store: ResourceStore,
    loader: Option<ModelLoader>,
    jobs: HashMap<u64, ImportJob>,
    next_job: u64,
}

impl AssetImporter {
    pub fn new(settings: ImportSettings) -> Self {
        let store = ResourceStore::new();
        let loader = ModelLoader::new(Fetcher::new(store.clone()));
        Self {
            settings,
            store,
            loader,
            jobs: HashMap::new(),
            next_job: 1,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Transient resources currently registered across all jobs.
    pub fn resource_count(&self) -> usize {
        self.store.len()
    }

    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    /// Start importing a file set. Returns the job id.
    pub fn import(&mut self, files: Vec<SuppliedFile>) -> Result<u64, ImportError> {
        let primary =
            find_primary(&files, &self.settings.extensions).ok_or(ImportError::NoPrimaryFile)?;
        let loader = self.loader.as_ref().ok_or(ImportError::LoaderUnavailable)?;

        let job = self.next_job;
        self.next_job += 1;
        let primary_name = files[primary].name.clone();

        let mut resolver = UriResolver::new();
        let mut resources = Vec::with_capacity(files.len());
        let mut address = String::new();
        for (index, file) in files.into_iter().enumerate() {
            let handle = self.store.register(file.bytes);
            resolver.insert(&file.name, handle.address());
            if index == primary {
                address = handle.address().to_string();
            }
            resources.push(handle);
        }

        log::info!(
            "import {job}: loading {primary_name} with {} companion file(s)",
            resources.len() - 1
        );
        loader
            .submit(LoadRequest {
                job,
                address,
                resolver,
            })
            .map_err(|_| ImportError::LoaderUnavailable)?;
        self.jobs.insert(
            job,
            ImportJob {
                primary: primary_name,
                started: Instant::now(),
                _resources: resources,
            },
        );
        Ok(job)
    }

    /// Finish every job whose load has completed: post-process, normalize and
    /// insert successful models under `container`.
    pub fn poll(&mut self, scene: &mut SceneGraph, container: NodeId) -> Vec<ImportEvent> {
        let Some(loader) = self.loader.as_ref() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for LoadResult { job, outcome } in loader.drain() {
            let Some(pending) = self.jobs.remove(&job) else {
                log::warn!("dropping result for unknown import {job}");
                continue;
            };
            let file = pending.primary.clone();
            let event = match self.place(&pending, outcome, scene, container) {
                Ok((node, name)) => {
                    log::info!(
                        "import {job}: placed {file} as {name} in {:.1?}",
                        pending.started.elapsed()
                    );
                    ImportEvent::Placed {
                        job,
                        node,
                        name,
                        file,
                    }
                }
                Err(error) => {
                    log::warn!("import {job}: {error}");
                    ImportEvent::Failed { job, file, error }
                }
            };
            // Releases the job's transient resources.
            drop(pending);
            events.push(event);
        }
        events
    }

    fn place(
        &self,
        job: &ImportJob,
        outcome: Result<Subtree, GltfError>,
        scene: &mut SceneGraph,
        container: NodeId,
    ) -> Result<(NodeId, String), ImportError> {
        let mut model = match outcome {
            Ok(model) => model,
            Err(GltfError::NoScene) => {
                return Err(ImportError::EmptyModelScene {
                    name: job.primary.clone(),
                })
            }
            Err(source) => {
                return Err(ImportError::Deserialize {
                    name: job.primary.clone(),
                    source,
                })
            }
        };
        normalize::prepare_surfaces(&mut model);
        normalize::normalize(
            &mut model,
            self.settings.target_size,
            self.settings.staging_offset,
        )
        .ok_or_else(|| ImportError::EmptyModelScene {
            name: job.primary.clone(),
        })?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let name = normalize::unique_name(scene, container, stamp);
        model.name = name.clone();
        let node = scene
            .insert(container, model)
            .ok_or(ImportError::ContainerMissing)?;
        scene.set_pickable(node, true);
        Ok((node, name))
    }
}
