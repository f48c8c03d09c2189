//! Engine context
//!
//! The context owns everything scenes share: configuration, the optional
//! render device, content, component constructors and the worker pool. It is
//! created once by the host and passed by reference to
//! [`SceneGraph::new`](crate::scene::SceneGraph::new).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::content::ContentManager;
use crate::core::EngineConfig;
use crate::ecs::ComponentFactory;
use crate::foundation::WorkerPool;
use crate::render::RenderDevice;

/// Cooperative stop signal checked by hosts between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Ticks keep running
    Active,
    /// The host should stop ticking
    Terminated,
}

/// Shared engine services
pub struct EngineContext {
    config: EngineConfig,
    device: Option<Arc<dyn RenderDevice>>,
    content: Arc<ContentManager>,
    factory: Arc<ComponentFactory>,
    workers: Arc<WorkerPool>,
    terminated: AtomicBool,
}

impl EngineContext {
    /// Create a context without a render device
    pub fn new(config: EngineConfig) -> Self {
        let workers = match config.worker_threads {
            Some(threads) => WorkerPool::new(threads),
            None => WorkerPool::default(),
        };
        log::info!("Engine context created with {} worker threads", workers.thread_count());

        Self {
            config,
            device: None,
            content: Arc::new(ContentManager::with_defaults()),
            factory: Arc::new(ComponentFactory::new()),
            workers: Arc::new(workers),
            terminated: AtomicBool::new(false),
        }
    }

    /// Attach a render device (builder)
    #[must_use]
    pub fn with_device(mut self, device: Arc<dyn RenderDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render device, if any
    pub fn device(&self) -> Option<&Arc<dyn RenderDevice>> {
        self.device.as_ref()
    }

    /// Content manager
    pub fn content(&self) -> &Arc<ContentManager> {
        &self.content
    }

    /// Component constructors
    pub fn factory(&self) -> &Arc<ComponentFactory> {
        &self.factory
    }

    /// Worker pool
    pub fn workers(&self) -> &Arc<WorkerPool> {
        &self.workers
    }

    /// Current run state
    pub fn run_state(&self) -> RunState {
        if self.terminated.load(Ordering::Acquire) {
            RunState::Terminated
        } else {
            RunState::Active
        }
    }

    /// Whether hosts should keep ticking
    pub fn is_active(&self) -> bool {
        self.run_state() == RunState::Active
    }

    /// Ask hosts to stop after the current tick
    pub fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            log::info!("Engine terminating");
        }
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("device", &self.device)
            .field("content", &self.content)
            .field("workers", &self.workers.thread_count())
            .field("run_state", &self.run_state())
            .finish_non_exhaustive()
    }
}
