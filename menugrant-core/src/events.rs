#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Operator-visible outcome of a session operation. Each failed operation
/// produces exactly one failure event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    RolesLoaded { count: usize },
    RolesFailed { error: String },
    TreeLoaded { role_code: String, nodes: usize, granted: usize },
    LoadDiscarded { role_code: String },
    LoadFailed { role_code: String, error: String },
    Saved { role_code: String, count: usize },
    SaveFailed { role_code: String, error: String },
    SaveRejected { reason: String },
}

impl SessionEvent {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::RolesFailed { .. }
                | Self::LoadFailed { .. }
                | Self::SaveFailed { .. }
                | Self::SaveRejected { .. }
        )
    }
}

/// Receives session events. Called after the session lock is released, so
/// implementations may call back into the session.
pub trait SessionListener: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

pub struct LoggingListener;

impl SessionListener for LoggingListener {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::RolesLoaded { count } => info!(count, "Roles loaded"),
            SessionEvent::RolesFailed { error } => warn!(error = %error, "Role directory failed"),
            SessionEvent::TreeLoaded {
                role_code,
                nodes,
                granted,
            } => info!(role = %role_code, nodes, granted, "Menu tree loaded"),
            // The session already warns with both generations.
            SessionEvent::LoadDiscarded { .. } => {}
            SessionEvent::LoadFailed { role_code, error } => {
                warn!(role = %role_code, error = %error, "Menu tree load failed")
            }
            SessionEvent::Saved { role_code, count } => {
                info!(role = %role_code, count, "Assignment saved")
            }
            SessionEvent::SaveFailed { role_code, error } => {
                warn!(role = %role_code, error = %error, "Assignment save failed")
            }
            SessionEvent::SaveRejected { reason } => {
                warn!(reason = %reason, "Assignment save rejected")
            }
        }
    }
}
