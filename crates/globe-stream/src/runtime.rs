//! Task spawning and the render context handed to image layers.
//!
//! Layers never block: every fetch is wrapped in a task and handed to a
//! [`Spawn`] implementation. On native this is a Tokio runtime handle; tests
//! and embedders can supply their own executor.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::fetch::TileFetcher;

/// A boxed fire-and-forget task.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Something that can run background tasks to completion.
pub trait Spawn: Send + Sync {
    /// Spawn a background task.
    ///
    /// Tasks that produce values report them over channels.
    fn spawn(&self, task: TaskFuture);
}

/// Spawns tasks onto a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Spawn onto the given runtime.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Spawn onto the runtime the caller is running inside, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, task: TaskFuture) {
        // Detached: results travel over channels, not the join handle.
        drop(self.handle.spawn(task));
    }
}

/// Everything a layer needs to issue a request: a fetcher and a place to run
/// the fetch.
#[derive(Clone)]
pub struct RenderContext {
    fetcher: Arc<dyn TileFetcher>,
    spawner: Arc<dyn Spawn>,
}

impl RenderContext {
    /// Create a render context.
    #[must_use]
    pub fn new(fetcher: Arc<dyn TileFetcher>, spawner: Arc<dyn Spawn>) -> Self {
        Self { fetcher, spawner }
    }

    /// The fetcher used for tile downloads.
    #[must_use]
    pub fn fetcher(&self) -> &dyn TileFetcher {
        self.fetcher.as_ref()
    }

    /// The spawner shared with other collaborators.
    #[must_use]
    pub fn spawner(&self) -> Arc<dyn Spawn> {
        Arc::clone(&self.spawner)
    }

    /// Spawn a background task.
    pub fn spawn(&self, task: TaskFuture) {
        self.spawner.spawn(task);
    }
}
