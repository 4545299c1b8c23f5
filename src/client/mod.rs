//! Access to the device's monitor collections.
//!
//! The manager only needs existence checks, reads and the three mutating
//! calls, each keyed by (kind, name, partition).

pub mod rest;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error::Result;
use crate::monitor::params::MonitorKind;

pub use rest::IControlClient;

/// Monitor attributes keyed by their management API names.
pub type ApiAttributes = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait MonitorApi: Send + Sync {
    async fn exists(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<bool>;

    async fn load(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<ApiAttributes>;

    async fn create(
        &self,
        kind: MonitorKind,
        name: &str,
        partition: &str,
        attributes: ApiAttributes,
    ) -> Result<()>;

    async fn modify(
        &self,
        kind: MonitorKind,
        name: &str,
        partition: &str,
        attributes: ApiAttributes,
    ) -> Result<()>;

    async fn delete(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<()>;
}
