use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ApiAttributes, MonitorApi};
use crate::error::{MonitorError, Result};
use crate::monitor::params::MonitorKind;

type Key = (MonitorKind, String, String);

/// In-memory device used by tests. Records every mutating call.
#[derive(Default)]
pub struct InMemoryApi {
    objects: Mutex<HashMap<Key, ApiAttributes>>,
    calls: Mutex<Vec<String>>,
    /// Acknowledge deletes without removing anything.
    pub ignore_deletes: bool,
    /// Fail every call with this message.
    pub fail_with: Option<String>,
}

impl InMemoryApi {
    pub fn with_monitor(kind: MonitorKind, name: &str, attributes: serde_json::Value) -> Self {
        let api = Self::default();
        let attributes = attributes.as_object().cloned().unwrap_or_default();
        api.objects
            .lock()
            .unwrap()
            .insert((kind, name.to_string(), "Common".to_string()), attributes);
        api
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get(&self, kind: MonitorKind, name: &str) -> Option<ApiAttributes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, name.to_string(), "Common".to_string()))
            .cloned()
    }

    fn check(&self) -> Result<()> {
        match &self.fail_with {
            Some(msg) => Err(MonitorError::Api(msg.clone())),
            None => Ok(()),
        }
    }

    fn key(kind: MonitorKind, name: &str, partition: &str) -> Key {
        (kind, name.to_string(), partition.to_string())
    }
}

#[async_trait]
impl MonitorApi for InMemoryApi {
    async fn exists(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<bool> {
        self.check()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&Self::key(kind, name, partition)))
    }

    async fn load(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<ApiAttributes> {
        self.check()?;
        self.objects
            .lock()
            .unwrap()
            .get(&Self::key(kind, name, partition))
            .cloned()
            .ok_or_else(|| MonitorError::Api(format!("01020036:3: The requested monitor ({name}) was not found.")))
    }

    async fn create(
        &self,
        kind: MonitorKind,
        name: &str,
        partition: &str,
        attributes: ApiAttributes,
    ) -> Result<()> {
        self.check()?;
        self.calls.lock().unwrap().push(format!("create {kind} {name}"));
        self.objects
            .lock()
            .unwrap()
            .insert(Self::key(kind, name, partition), attributes);
        Ok(())
    }

    async fn modify(
        &self,
        kind: MonitorKind,
        name: &str,
        partition: &str,
        attributes: ApiAttributes,
    ) -> Result<()> {
        self.check()?;
        self.calls.lock().unwrap().push(format!("modify {kind} {name}"));
        let mut objects = self.objects.lock().unwrap();
        let current = objects.entry(Self::key(kind, name, partition)).or_default();
        current.extend(attributes);
        Ok(())
    }

    async fn delete(&self, kind: MonitorKind, name: &str, partition: &str) -> Result<()> {
        self.check()?;
        self.calls.lock().unwrap().push(format!("delete {kind} {name}"));
        if !self.ignore_deletes {
            self.objects
                .lock()
                .unwrap()
                .remove(&Self::key(kind, name, partition));
        }
        Ok(())
    }
}
