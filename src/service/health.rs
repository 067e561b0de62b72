//! Health check logic for the arcade service
//!
//! Liveness and readiness probes plus a detailed component check used by
//! the `/stats` endpoint.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Number of live game sessions
    pub active_sessions: usize,
    /// Players currently waiting in the matchmaking queue
    pub players_waiting: usize,
    /// Pending (unexpired) challenges
    pub pending_challenges: usize,
    /// Players known to the store
    pub registered_players: usize,
    /// Service uptime information
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let session_check = Self::check_session_manager(&app_state);
        if session_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if session_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(session_check);

        let queue_check = Self::check_match_queue(&app_state);
        if queue_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if queue_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(queue_check);

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle commands
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_match_queue(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let running = app_state.is_running().await;

        ComponentCheck {
            name: "service".to_string(),
            status: if running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            message: if running {
                None
            } else {
                Some("Service is not running".to_string())
            },
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_session_manager(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        // A readable session table is all we need; the count itself is
        // reported through stats
        let count = app_state.sessions().active_session_count();
        debug!(active_sessions = count, "Session manager check");

        ComponentCheck {
            name: "session_manager".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_match_queue(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        match app_state.queue().total_len() {
            Ok(waiting) => {
                debug!(players_waiting = waiting, "Match queue check");
                ComponentCheck {
                    name: "match_queue".to_string(),
                    status: HealthStatus::Healthy,
                    message: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
            Err(e) => ComponentCheck {
                name: "match_queue".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(format!("Queue inaccessible: {}", e)),
                duration_ms: start.elapsed().as_millis() as u64,
            },
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        ServiceStats {
            active_sessions: app_state.sessions().active_session_count(),
            players_waiting: app_state.queue().total_len().unwrap_or(0),
            pending_challenges: app_state.challenges().pending_count(),
            registered_players: app_state.store().player_count().unwrap_or(0),
            uptime_info: format!("started at {}", app_state.started_at()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
        assert_eq!(HealthStatus::Unhealthy.to_string(), "unhealthy");
    }

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus::Healthy;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"healthy\"");

        let parsed: HealthStatus = serde_json::from_str("\"degraded\"").unwrap();
        assert_eq!(parsed, HealthStatus::Degraded);
    }
}
