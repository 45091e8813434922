//! Application state management.

use crate::config::AppConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stockwatch_engine::Analyzer;
use tokio::sync::watch;

/// Application state shared across components.
pub struct AppState {
    /// Configuration.
    pub config: AppConfig,
    /// Analysis engine, shared by the scheduler and the API.
    pub analyzer: Arc<Analyzer>,
    /// Running flag.
    running: AtomicBool,
    /// Flips to true on `stop()` to wake sleeping loops.
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: AppConfig, analyzer: Arc<Analyzer>) -> Self {
        Self {
            config,
            analyzer,
            running: AtomicBool::new(false),
            shutdown: watch::Sender::new(false),
        }
    }

    /// Start the background loops.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Ask the background loops to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
    }

    /// Resolves `changed()` once `stop()` is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Thread-safe shared state.
pub type SharedState = Arc<AppState>;

/// Create shared state.
pub fn create_state(config: AppConfig, analyzer: Arc<Analyzer>) -> SharedState {
    Arc::new(AppState::new(config, analyzer))
}
