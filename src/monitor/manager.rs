//! Reconciles one desired monitor against the device.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::client::MonitorApi;
use crate::error::{MonitorError, Result};
use crate::monitor::args::State;
use crate::monitor::difference::{ChangeSet, Difference};
use crate::monitor::params::{Deprecation, DeviceState, MonitorKind, MonitorSpec};

/// What the run did, in the shape printed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleResult {
    pub changed: bool,
    #[serde(flatten)]
    pub values: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deprecations: Vec<Deprecation>,
}

/// The object printed in place of a result when a run fails.
pub fn failure_output(msg: &str) -> Value {
    json!({ "failed": true, "msg": msg })
}

pub struct MonitorManager<'a, C: MonitorApi + ?Sized> {
    client: &'a C,
    want: MonitorSpec,
    check_mode: bool,
    changes: ChangeSet,
}

impl<'a, C: MonitorApi + ?Sized> MonitorManager<'a, C> {
    pub fn new(client: &'a C, want: MonitorSpec, check_mode: bool) -> Self {
        Self {
            client,
            want,
            check_mode,
            changes: ChangeSet::default(),
        }
    }

    fn kind(&self) -> MonitorKind {
        self.want.kind()
    }

    pub async fn exec(mut self) -> Result<ModuleResult> {
        let outcome = match self.want.state {
            State::Present => self.present().await,
            State::Absent => self.absent().await,
        };
        let changed = outcome.map_err(|e| {
            error!(
                monitor = %self.want.name,
                partition = %self.want.partition,
                kind = %self.kind(),
                error = %e,
                "Monitor operation failed."
            );
            e
        })?;

        for deprecation in &self.want.deprecations {
            warn!(version = %deprecation.version, "{}", deprecation.msg);
        }

        Ok(ModuleResult {
            changed,
            values: self.changes.to_return(self.kind()),
            deprecations: self.want.deprecations,
        })
    }

    async fn exists(&self) -> Result<bool> {
        self.client
            .exists(self.kind(), &self.want.name, &self.want.partition)
            .await
    }

    async fn present(&mut self) -> Result<bool> {
        if self.exists().await? {
            self.update().await
        } else {
            self.create().await
        }
    }

    async fn create(&mut self) -> Result<bool> {
        self.changes = ChangeSet::for_create(&self.want)?;
        if self.check_mode {
            info!(monitor = %self.want.name, "Check mode: monitor would be created.");
            return Ok(true);
        }

        self.client
            .create(
                self.kind(),
                &self.want.name,
                &self.want.partition,
                self.changes.api_attributes(),
            )
            .await?;
        info!(monitor = %self.want.name, kind = %self.kind(), "Created monitor.");
        Ok(true)
    }

    async fn read_current_from_device(&self) -> Result<DeviceState> {
        let attributes = self
            .client
            .load(self.kind(), &self.want.name, &self.want.partition)
            .await?;
        DeviceState::from_attributes(self.kind(), &attributes)
    }

    async fn update(&mut self) -> Result<bool> {
        let have = self.read_current_from_device().await?;
        let changes = Difference::new(&self.want, &have).compute()?;
        if changes.is_empty() {
            info!(monitor = %self.want.name, "Monitor is up to date.");
            return Ok(false);
        }
        self.changes = changes;
        if self.check_mode {
            info!(monitor = %self.want.name, "Check mode: monitor would be updated.");
            return Ok(true);
        }

        self.client
            .modify(
                self.kind(),
                &self.want.name,
                &self.want.partition,
                self.changes.api_attributes(),
            )
            .await?;
        info!(monitor = %self.want.name, kind = %self.kind(), "Updated monitor.");
        Ok(true)
    }

    async fn absent(&mut self) -> Result<bool> {
        if self.exists().await? {
            return self.remove().await;
        }
        Ok(false)
    }

    async fn remove(&mut self) -> Result<bool> {
        if self.check_mode {
            info!(monitor = %self.want.name, "Check mode: monitor would be removed.");
            return Ok(true);
        }
        self.client
            .delete(self.kind(), &self.want.name, &self.want.partition)
            .await?;
        if self.exists().await? {
            return Err(MonitorError::DeleteFailed);
        }
        info!(monitor = %self.want.name, kind = %self.kind(), "Removed monitor.");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::InMemoryApi;
    use crate::monitor::args::ModuleArgs;

    fn spec(kind: MonitorKind, value: Value) -> MonitorSpec {
        let args: ModuleArgs = serde_json::from_value(value).unwrap();
        MonitorSpec::from_args(kind, &args).unwrap()
    }

    fn existing_tcp() -> InMemoryApi {
        InMemoryApi::with_monitor(
            MonitorKind::Tcp,
            "m1",
            json!({
                "defaultsFrom": "/Common/tcp",
                "destination": "*:*",
                "interval": 5,
                "timeout": 10,
                "timeUntilUp": 0,
                "send": "GET /",
                "recv": "200"
            }),
        )
    }

    #[tokio::test]
    async fn test_create_with_defaults() {
        let api = InMemoryApi::default();
        let want = spec(
            MonitorKind::Tcp,
            json!({"name": "m1", "state": "present", "send": "GET /", "receive": "200 OK"}),
        );

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert!(result.changed);
        assert_eq!(api.calls(), vec!["create tcp m1"]);
        let created = api.get(MonitorKind::Tcp, "m1").unwrap();
        assert_eq!(created["interval"], json!(5));
        assert_eq!(created["timeout"], json!(16));
        assert_eq!(created["destination"], json!("*:*"));
        assert_eq!(created["defaultsFrom"], json!("/Common/tcp"));
        assert_eq!(result.values["interval"], json!(5));
        assert_eq!(result.values["timeout"], json!(16));
        assert_eq!(result.values["parent"], json!("/Common/tcp"));
    }

    #[tokio::test]
    async fn test_create_in_check_mode_does_not_call_device() {
        let api = InMemoryApi::default();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1"}));

        let result = MonitorManager::new(&api, want, true).exec().await.unwrap();

        assert!(result.changed);
        assert!(api.calls().is_empty());
        assert!(api.get(MonitorKind::Tcp, "m1").is_none());
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "receive": "200 OK"}));

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert!(result.changed);
        assert_eq!(api.calls(), vec!["modify tcp m1"]);
        assert_eq!(Value::Object(result.values), json!({"receive": "200 OK"}));
        let stored = api.get(MonitorKind::Tcp, "m1").unwrap();
        assert_eq!(stored["recv"], json!("200 OK"));
        assert_eq!(stored["timeout"], json!(10));
    }

    #[tokio::test]
    async fn test_update_without_differences_is_unchanged() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "send": "GET /"}));

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert!(!result.changed);
        assert!(result.values.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_in_check_mode_reports_change_only() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "time_until_up": 4}));

        let result = MonitorManager::new(&api, want, true).exec().await.unwrap();

        assert!(result.changed);
        assert_eq!(result.values["time_until_up"], json!(4));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_parent_change() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "parent": "/Common/other"}));

        let err = MonitorManager::new(&api, want, false).exec().await.unwrap_err();

        assert_eq!(err.to_string(), "The parent monitor cannot be changed");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_absent_and_missing_is_noop() {
        let api = InMemoryApi::default();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "state": "absent"}));

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert!(!result.changed);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_absent_removes_existing_monitor() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "state": "absent"}));

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert!(result.changed);
        assert_eq!(api.calls(), vec!["delete tcp m1"]);
        assert!(api.get(MonitorKind::Tcp, "m1").is_none());
    }

    #[tokio::test]
    async fn test_monitor_still_present_after_delete_is_fatal() {
        let mut api = existing_tcp();
        api.ignore_deletes = true;
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "state": "absent"}));

        let err = MonitorManager::new(&api, want, false).exec().await.unwrap_err();

        assert!(matches!(err, MonitorError::DeleteFailed));
        assert_eq!(err.to_string(), "Failed to delete the monitor.");
    }

    #[tokio::test]
    async fn test_remove_in_check_mode_keeps_monitor() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "state": "absent"}));

        let result = MonitorManager::new(&api, want, true).exec().await.unwrap();

        assert!(result.changed);
        assert!(api.get(MonitorKind::Tcp, "m1").is_some());
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let api = InMemoryApi::failing("401 Unexpected Error: Authentication failed");
        let want = spec(MonitorKind::Tcp, json!({"name": "m1"}));

        let err = MonitorManager::new(&api, want, false).exec().await.unwrap_err();

        assert!(matches!(err, MonitorError::Api(_)));
        assert_eq!(err.to_string(), "401 Unexpected Error: Authentication failed");
    }

    #[tokio::test]
    async fn test_echo_monitor_lives_in_its_own_collection() {
        let api = existing_tcp();
        let want = spec(MonitorKind::TcpEcho, json!({"name": "m1", "ip": "10.1.1.1"}));

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert!(result.changed);
        assert_eq!(api.calls(), vec!["create tcp_echo m1"]);
        let created = api.get(MonitorKind::TcpEcho, "m1").unwrap();
        assert_eq!(created["destination"], json!("10.1.1.1"));
        assert_eq!(created["defaultsFrom"], json!("/Common/tcp_echo"));
        assert!(!created.contains_key("send"));
    }

    #[tokio::test]
    async fn test_create_result_serializes_flat() {
        let api = InMemoryApi::default();
        let want = spec(
            MonitorKind::Tcp,
            json!({"name": "m1", "ip": "10.0.0.1", "port": 80, "send": "GET /", "receive": "200 OK"}),
        );

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "changed": true,
                "parent": "/Common/tcp",
                "send": "GET /",
                "receive": "200 OK",
                "ip": "10.0.0.1",
                "port": 80,
                "interval": 5,
                "timeout": 16,
                "time_until_up": 0
            })
        );
    }

    #[tokio::test]
    async fn test_result_carries_deprecations_and_wildcard_port() {
        let api = InMemoryApi::default();
        let want = spec(
            MonitorKind::TcpHalfOpen,
            json!({"name": "m1", "type": "TTYPE_TCP_HALF_OPEN"}),
        );

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "changed": true,
                "parent": "/Common/tcp_half_open",
                "ip": "*",
                "port": "*",
                "interval": 5,
                "timeout": 16,
                "time_until_up": 0,
                "deprecations": [{"msg": "The type param is deprecated", "version": "2.4"}]
            })
        );
    }

    #[tokio::test]
    async fn test_unchanged_result_serializes_changed_only() {
        let api = existing_tcp();
        let want = spec(MonitorKind::Tcp, json!({"name": "m1", "send": "GET /"}));

        let result = MonitorManager::new(&api, want, false).exec().await.unwrap();

        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"changed": false}));
    }

    #[test]
    fn test_failure_output_shape() {
        assert_eq!(
            failure_output("Failed to delete the monitor."),
            json!({"failed": true, "msg": "Failed to delete the monitor."})
        );
    }
}
