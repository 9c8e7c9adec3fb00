//! Worker lifecycle: install, activate, claim, supersede.
//!
//! ```text
//! Installing ──install ok──▶ Waiting ──activate──▶ Active ──newer worker──▶ Superseded
//!     └──────install error──▶ Failed
//! ```
//!
//! Install precaches the shell all-or-nothing into the current version's
//! cache. Activation deletes every other cache this worker owns. A
//! `Registration` tracks the active and waiting workers across updates.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStorage};
use crate::config::WorkerConfig;
use crate::fetch::{fetch_with_timeout, FetchError, Fetcher};
use crate::models::{Request, RequestKey, Response};
use crate::router::FetchRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
    Superseded,
    Failed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Waiting => write!(f, "waiting"),
            WorkerState::Active => write!(f, "active"),
            WorkerState::Superseded => write!(f, "superseded"),
            WorkerState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Cache storage unavailable: {0}")]
    Storage(#[from] CacheError),

    #[error("Failed to fetch shell path {path}: {source}")]
    ShellFetch {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("Shell path {path} returned status {status}")]
    ShellStatus { path: String, status: u16 },

    #[error("Invalid shell path {path}: {reason}")]
    InvalidShellPath { path: String, reason: String },

    #[error("Cannot {action} a worker in state {state}")]
    InvalidState { action: &'static str, state: WorkerState },
}

pub struct ServiceWorker<F> {
    config: Arc<WorkerConfig>,
    storage: CacheStorage,
    fetcher: Arc<F>,
    state: WorkerState,
    controls_clients: bool,
}

impl<F: Fetcher> ServiceWorker<F> {
    pub fn new(config: WorkerConfig, storage: CacheStorage, fetcher: Arc<F>) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            fetcher,
            state: WorkerState::Installing,
            controls_clients: false,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn controls_clients(&self) -> bool {
        self.controls_clients
    }

    /// Precache the shell into the current version's cache.
    ///
    /// All shell paths are fetched concurrently. Any network failure or
    /// non-2xx status aborts the install and nothing is written.
    pub async fn install(&mut self) -> Result<(), InstallError> {
        if self.state != WorkerState::Installing {
            return Err(InstallError::InvalidState {
                action: "install",
                state: self.state,
            });
        }

        match self.precache_shell().await {
            Ok(count) => {
                info!(version = %self.config.version, entries = count, "Worker installed");
                self.state = WorkerState::Waiting;
                Ok(())
            }
            Err(e) => {
                warn!(version = %self.config.version, error = %e, "Worker install failed");
                self.state = WorkerState::Failed;
                Err(e)
            }
        }
    }

    async fn precache_shell(&self) -> Result<usize, InstallError> {
        let mut requests = Vec::with_capacity(self.config.shell.len());
        for path in &self.config.shell {
            let url = self
                .config
                .resolve(path)
                .map_err(|e| InstallError::InvalidShellPath {
                    path: path.clone(),
                    reason: format!("{:#}", e),
                })?;
            requests.push((path.clone(), Request::get(url)));
        }

        let fetches = requests.iter().map(|(_, request)| {
            fetch_with_timeout(self.fetcher.as_ref(), request, self.config.request_timeout)
        });
        let results = join_all(fetches).await;

        let mut entries: Vec<(RequestKey, Response)> = Vec::with_capacity(results.len());
        for ((path, request), result) in requests.into_iter().zip(results) {
            let response = result.map_err(|source| InstallError::ShellFetch {
                path: path.clone(),
                source,
            })?;
            if !response.is_success() {
                return Err(InstallError::ShellStatus {
                    path,
                    status: response.status,
                });
            }
            entries.push((request.key(), response));
        }

        let count = entries.len();
        let cache = self.storage.open(&self.config.cache_name())?;
        cache.put_all(entries)?;
        Ok(count)
    }

    /// Evict every other owned cache and become the active worker.
    /// Returns the names of the deleted caches.
    pub fn activate(&mut self) -> Result<Vec<String>, InstallError> {
        if self.state != WorkerState::Waiting {
            return Err(InstallError::InvalidState {
                action: "activate",
                state: self.state,
            });
        }

        let current = self.config.cache_name();
        let mut evicted = Vec::new();
        for name in self.storage.names() {
            if name != current && self.config.owns_cache(&name) {
                if self.storage.delete(&name)? {
                    debug!(cache = %name, "Evicted old cache");
                    evicted.push(name);
                }
            }
        }
        // Guarantees the current cache exists even with an empty shell
        self.storage.open(&current)?;

        self.state = WorkerState::Active;
        info!(version = %self.config.version, evicted = evicted.len(), "Worker activated");
        Ok(evicted)
    }

    /// Take control of all open clients without waiting for a reload.
    pub fn claim(&mut self) {
        if self.state == WorkerState::Active {
            self.controls_clients = true;
        }
    }

    fn supersede(&mut self) {
        self.state = WorkerState::Superseded;
        self.controls_clients = false;
    }

    /// A router serving requests with this worker's configuration.
    pub fn router(&self) -> FetchRouter<F> {
        FetchRouter::new(
            Arc::clone(&self.config),
            self.storage.clone(),
            Arc::clone(&self.fetcher),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The same version is already active.
    Unchanged { version: String },
    Activated { version: String, evicted: Vec<String> },
    /// Installed, held until `activate_waiting`.
    Waiting { version: String },
}

/// The active and waiting workers for one origin.
pub struct Registration<F> {
    storage: CacheStorage,
    fetcher: Arc<F>,
    active: Option<ServiceWorker<F>>,
    waiting: Option<ServiceWorker<F>>,
}

impl<F: Fetcher> Registration<F> {
    pub fn new(storage: CacheStorage, fetcher: Arc<F>) -> Self {
        Self {
            storage,
            fetcher,
            active: None,
            waiting: None,
        }
    }

    pub fn active(&self) -> Option<&ServiceWorker<F>> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&ServiceWorker<F>> {
        self.waiting.as_ref()
    }

    /// The worker currently controlling clients, if any.
    pub fn controller(&self) -> Option<&ServiceWorker<F>> {
        self.active.as_ref().filter(|w| w.controls_clients())
    }

    /// Install a worker for `config` and activate it when allowed.
    ///
    /// With `skip_waiting` (or no current worker) activation follows install
    /// immediately; otherwise the new worker waits.
    pub async fn register(&mut self, config: WorkerConfig) -> Result<RegistrationOutcome, InstallError> {
        if let Some(active) = &self.active {
            if active.version() == config.version {
                debug!(version = %config.version, "Worker already active");
                return Ok(RegistrationOutcome::Unchanged {
                    version: config.version,
                });
            }
        }

        let skip_waiting = config.skip_waiting;
        let mut worker = ServiceWorker::new(config, self.storage.clone(), Arc::clone(&self.fetcher));
        worker.install().await?;

        let version = worker.version().to_string();
        self.waiting = Some(worker);
        if skip_waiting || self.active.is_none() {
            let evicted = self.activate_waiting()?;
            Ok(RegistrationOutcome::Activated { version, evicted })
        } else {
            Ok(RegistrationOutcome::Waiting { version })
        }
    }

    /// Promote the waiting worker: activate it, supersede the old one, claim clients.
    pub fn activate_waiting(&mut self) -> Result<Vec<String>, InstallError> {
        let Some(mut worker) = self.waiting.take() else {
            return Ok(Vec::new());
        };

        let evicted = match worker.activate() {
            Ok(evicted) => evicted,
            Err(e) => {
                self.waiting = Some(worker);
                return Err(e);
            }
        };
        if let Some(mut previous) = self.active.take() {
            previous.supersede();
            info!(version = %previous.version(), "Worker superseded");
        }
        worker.claim();
        self.active = Some(worker);
        Ok(evicted)
    }
}

// ============================================================================
// Tests
// ============================================================================
