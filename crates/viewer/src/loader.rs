use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use assetview_assets::{AssetError, AssetSource, MeshAsset};
use assetview_scene::EnvironmentMap;

use crate::config::ViewerConfig;
use crate::lifecycle::LivenessToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Panorama,
    Cubemap,
    Mesh,
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Panorama => "panorama",
            Self::Cubemap => "cubemap",
            Self::Mesh => "mesh",
        };
        f.write_str(s)
    }
}

/// Outcome of one background load.
#[derive(Debug)]
pub enum LoadResult {
    Panorama(Result<EnvironmentMap, AssetError>),
    Cubemap(Result<EnvironmentMap, AssetError>),
    Mesh(Result<MeshAsset, AssetError>),
}

impl LoadResult {
    pub fn kind(&self) -> LoadKind {
        match self {
            Self::Panorama(_) => LoadKind::Panorama,
            Self::Cubemap(_) => LoadKind::Cubemap,
            Self::Mesh(_) => LoadKind::Mesh,
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Self::Panorama(r) | Self::Cubemap(r) => r.is_ok(),
            Self::Mesh(r) => r.is_ok(),
        }
    }
}

/// A finished load, tagged with the liveness of the scene that requested it.
#[derive(Debug)]
pub struct LoadCompletion {
    pub token: LivenessToken,
    pub result: LoadResult,
}

impl LoadCompletion {
    pub fn new(token: LivenessToken, result: LoadResult) -> Self {
        Self { token, result }
    }

    pub fn kind(&self) -> LoadKind {
        self.result.kind()
    }
}

/// Delivers completions back to the thread that owns the viewer.
pub trait LoadSink: Send + Sync + 'static {
    fn deliver(&self, completion: LoadCompletion);
}

/// Sink backed by an `mpsc` channel.
pub struct ChannelSink {
    tx: mpsc::Sender<LoadCompletion>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::Receiver<LoadCompletion>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl LoadSink for ChannelSink {
    fn deliver(&self, completion: LoadCompletion) {
        if self.tx.send(completion).is_err() {
            tracing::debug!("completion receiver dropped");
        }
    }
}

/// Start the panorama, cubemap and mesh loads on their own threads.
///
/// Each thread delivers exactly one completion to `sink`, success or failure.
/// Returns the number of loads started.
pub fn spawn_loads(
    config: &ViewerConfig,
    source: Arc<dyn AssetSource>,
    sink: Arc<dyn LoadSink>,
    token: &LivenessToken,
) -> usize {
    let panorama = config.panorama_path().to_path_buf();
    let cubemap = config.cubemap_paths();
    let mesh = config.mesh_path().to_path_buf();

    let jobs: [(LoadKind, Box<dyn FnOnce(&dyn AssetSource) -> LoadResult + Send>); 3] = [
        (
            LoadKind::Panorama,
            Box::new(move |s| LoadResult::Panorama(s.load_panorama(&panorama))),
        ),
        (
            LoadKind::Cubemap,
            Box::new(move |s| LoadResult::Cubemap(s.load_cubemap(&cubemap))),
        ),
        (
            LoadKind::Mesh,
            Box::new(move |s| LoadResult::Mesh(s.load_mesh(&mesh))),
        ),
    ];

    let mut started = 0;
    for (kind, job) in jobs {
        let source = Arc::clone(&source);
        let sink = Arc::clone(&sink);
        let token = token.clone();
        let spawned = thread::Builder::new()
            .name(format!("assetview-load-{kind}"))
            .spawn(move || {
                let _span = tracing::debug_span!("load", %kind).entered();
                tracing::debug!("load started");
                let result = job(source.as_ref());
                tracing::debug!(ok = result.is_ok(), "load finished");
                sink.deliver(LoadCompletion::new(token, result));
            });
        match spawned {
            Ok(_) => started += 1,
            Err(err) => tracing::warn!(%kind, %err, "failed to spawn loader thread"),
        }
    }
    started
}

/// Paths a load request touches, for logging.
pub(crate) fn describe(config: &ViewerConfig, kind: LoadKind) -> PathBuf {
    match kind {
        LoadKind::Panorama => config.panorama_path().to_path_buf(),
        LoadKind::Cubemap => PathBuf::from(crate::config::CUBEMAP_DIR),
        LoadKind::Mesh => config.mesh_path().to_path_buf(),
    }
}
