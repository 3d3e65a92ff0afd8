use super::gltf::{self, Fetcher, GltfError};
use super::resources::UriResolver;
use crate::scene::Subtree;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

/// One model to deserialize off the main thread.
pub struct LoadRequest {
    pub job: u64,
    pub address: String,
    pub resolver: UriResolver,
}

pub struct LoadResult {
    pub job: u64,
    pub outcome: Result<Subtree, GltfError>,
}

/// Background deserializer. Requests are processed in order on one worker
/// thread; results are collected with [`ModelLoader::drain`] from the thread
/// that owns the scene.
pub struct ModelLoader {
    tx: mpsc::Sender<LoadRequest>,
    rx: mpsc::Receiver<LoadResult>,
}

impl ModelLoader {
    pub fn new(fetcher: Fetcher) -> Option<Self> {
        let (tx, rx) = mpsc::channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::channel();
        let builder = thread::Builder::new().name("model-loader".to_string());
        match builder.spawn(move || {
            while let Ok(request) = rx.recv() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    gltf::load(&request.address, &request.resolver, &fetcher)
                }))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    log::error!("import {}: model reader panicked: {message}", request.job);
                    Err(GltfError::Panicked(message))
                });
                if result_tx
                    .send(LoadResult {
                        job: request.job,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }) {
            Ok(_) => Some(Self { tx, rx: result_rx }),
            Err(err) => {
                log::error!("failed to spawn model loader thread: {err:?}");
                None
            }
        }
    }

    pub fn submit(&self, request: LoadRequest) -> Result<(), LoadRequest> {
        self.tx.send(request).map_err(|err| err.0)
    }

    pub fn drain(&self) -> Vec<LoadResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
