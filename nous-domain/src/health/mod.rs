//! Domain layer health check functionality
//! This module provides health check services for the gateway

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use nous_data::database::DatabasePool;
use tracing::warn;

use crate::providers::ProviderKind;

/// System health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is functioning but with reduced capability
    Degraded,
    /// Component is not functioning
    Unhealthy,
}

impl From<ComponentStatus> for SystemStatus {
    fn from(status: ComponentStatus) -> Self {
        match status {
            ComponentStatus::Healthy => SystemStatus::Healthy,
            ComponentStatus::Degraded => SystemStatus::Degraded,
            ComponentStatus::Unhealthy => SystemStatus::Unhealthy,
        }
    }
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    /// Status of the component
    pub status: ComponentStatus,
    /// Optional details about the component status
    pub details: Option<String>,
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    /// Worst status among the components
    pub status: SystemStatus,
    /// Map of component names to their health status
    pub components: HashMap<String, HealthComponent>,
}

impl SystemHealth {
    /// Build the overall health from its components
    pub fn from_components(components: HashMap<String, HealthComponent>) -> Self {
        let worst = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        Self {
            status: worst.into(),
            components,
        }
    }
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Check the status of the database
    /// Returns Ok(true) for a persistent database, Ok(false) when the
    /// gateway is running on in-memory storage, and an error if the
    /// database cannot be queried
    async fn check_database_status(&self) -> Result<bool, String>;
}

/// Health service over the cache database and the configured providers
#[derive(Debug, Clone)]
pub struct HealthService {
    pool: Option<DatabasePool>,
    providers: Vec<ProviderKind>,
}

impl HealthService {
    pub fn new(pool: Option<DatabasePool>, providers: Vec<ProviderKind>) -> Self {
        Self { pool, providers }
    }

    fn providers_component(&self) -> HealthComponent {
        if self.providers.is_empty() {
            HealthComponent {
                status: ComponentStatus::Degraded,
                details: Some("No AI providers configured, answering from templates only".to_string()),
            }
        } else {
            let names: Vec<&str> = self.providers.iter().map(|k| k.name()).collect();
            HealthComponent {
                status: ComponentStatus::Healthy,
                details: Some(format!("Configured providers: {}", names.join(", "))),
            }
        }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let database = match self.check_database_status().await {
            Ok(true) => HealthComponent {
                status: ComponentStatus::Healthy,
                details: self.pool.as_ref().map(|p| p.connection_info()),
            },
            Ok(false) => HealthComponent {
                status: ComponentStatus::Degraded,
                details: Some("Running on in-memory storage, cache will not persist".to_string()),
            },
            Err(e) => HealthComponent {
                status: ComponentStatus::Unhealthy,
                details: Some(e),
            },
        };

        let components = vec![
            ("database".to_string(), database),
            ("providers".to_string(), self.providers_component()),
        ]
        .into_iter()
        .collect();

        SystemHealth::from_components(components)
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        let Some(pool) = &self.pool else {
            return Ok(false);
        };

        match pool.ping() {
            Ok(()) => Ok(!pool.is_in_memory()),
            Err(e) => {
                warn!("Database health check failed: {}", e);
                Err(format!("Database connection error: {}", e))
            }
        }
    }
}
