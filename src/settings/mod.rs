//! Presentational settings panel for the persistence toggle
//!
//! Mirrors the tri-state permission value plus an in-flight flag, drives
//! the negotiation on mount and on user toggle, and reports outcomes
//! through an injected notifier. Owns no UI: a frontend renders from the
//! accessors here.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::host::{StorageHost, StreamFetcher};
use crate::persistence::store::PersistenceStore;
use crate::persistence::types::{PersistenceResult, PersistenceState, PersistenceStats, Server};
use crate::persistence::{check_persistence, init_persistence};

/// Toast severity for user-visible notifications.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
}

/// User-visible notification payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

/// Sink for notifications raised by the panel.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Displayed permission value: loading until the mount-time check lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Loading,
    Known(PersistenceState),
}

pub struct PersistenceSettings {
    storage: Arc<dyn StorageHost>,
    fetcher: Arc<dyn StreamFetcher>,
    notifier: Arc<dyn Notifier>,
    server: Option<Server>,
    state: PanelState,
    stats: Option<PersistenceStats>,
    store: Option<PersistenceStore>,
    is_requesting: bool,
}

impl PersistenceSettings {
    pub fn new(
        storage: Arc<dyn StorageHost>,
        fetcher: Arc<dyn StreamFetcher>,
        notifier: Arc<dyn Notifier>,
        server: Option<Server>,
    ) -> Self {
        PersistenceSettings {
            storage,
            fetcher,
            notifier,
            server,
            state: PanelState::Loading,
            stats: None,
            store: None,
            is_requesting: false,
        }
    }

    /// Silent mount-time check: reflect the current permission state and,
    /// when already granted, resolve a store and fetch stats. Raises no
    /// notifications.
    pub async fn on_mount(&mut self) {
        let state = check_persistence(self.storage.as_ref()).await;
        self.state = PanelState::Known(state);
        if state != PersistenceState::AccessGranted {
            return;
        }
        let Some(server) = self.server.clone() else {
            return;
        };
        match init_persistence(self.storage.clone(), self.fetcher.clone(), &server).await {
            Ok(PersistenceResult::Success { store }) => {
                match store.stats().await {
                    Ok(stats) => self.stats = Some(stats),
                    Err(e) => warn!("persistence: failed to fetch stats: {}", e),
                }
                self.store = Some(store);
            }
            Ok(_) => {}
            Err(e) => warn!("persistence: mount-time init failed: {}", e),
        }
    }

    /// User-initiated toggle: request persistence (may prompt the host),
    /// notify each outcome distinctly, and refresh stats on success.
    /// Re-entrant calls are ignored while a request is in flight.
    pub async fn request_persistence(&mut self) {
        if self.is_requesting {
            return;
        }
        let Some(server) = self.server.clone() else {
            return;
        };
        self.is_requesting = true;
        match init_persistence(self.storage.clone(), self.fetcher.clone(), &server).await {
            Ok(PersistenceResult::PermissionDenied) => {
                info!("persistence: permission-denied");
                self.notifier.notify(Toast {
                    level: ToastLevel::Error,
                    message: "Persistence: permission-denied".to_string(),
                });
                self.state = PanelState::Known(PersistenceState::NoAccess);
            }
            Ok(PersistenceResult::Unsupported) => {
                info!("persistence: unsupported");
                self.notifier.notify(Toast {
                    level: ToastLevel::Error,
                    message: "Persistence: unsupported".to_string(),
                });
                self.state = PanelState::Known(PersistenceState::Unsupported);
            }
            Ok(PersistenceResult::Success { store }) => {
                self.notifier.notify(Toast {
                    level: ToastLevel::Success,
                    message: "Persistence: success".to_string(),
                });
                self.state = PanelState::Known(PersistenceState::AccessGranted);
                match store.stats().await {
                    Ok(stats) => self.stats = Some(stats),
                    Err(e) => warn!("persistence: failed to fetch stats: {}", e),
                }
                self.store = Some(store);
            }
            Err(e) => {
                warn!("persistence: request failed: {}", e);
                self.notifier.notify(Toast {
                    level: ToastLevel::Error,
                    message: e,
                });
            }
        }
        self.is_requesting = false;
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn stats(&self) -> Option<PersistenceStats> {
        self.stats
    }

    pub fn store(&self) -> Option<&PersistenceStore> {
        self.store.as_ref()
    }

    /// Checked ⇔ access granted.
    pub fn toggle_checked(&self) -> bool {
        self.state == PanelState::Known(PersistenceState::AccessGranted)
    }

    pub fn toggle_disabled(&self) -> bool {
        self.is_requesting
            || self.server.is_none()
            || self.state == PanelState::Known(PersistenceState::Unsupported)
    }

    /// Usage line for display; present only when stats are available.
    pub fn usage_line(&self) -> Option<String> {
        let stats = self.stats?;
        let percent = if stats.quota_bytes == 0 {
            0.0
        } else {
            (stats.usage_bytes as f64 / stats.quota_bytes as f64) * 100.0
        };
        Some(format!(
            "Current Usage: {:.1} of {}",
            percent,
            format_size(stats.quota_bytes)
        ))
    }
}

/// Human-readable byte size: divisor 1024, one decimal above plain bytes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
