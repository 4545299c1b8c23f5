//! Want-vs-have comparison.

use serde_json::{Map, Value};

use crate::client::ApiAttributes;
use crate::error::{MonitorError, Result};
use crate::monitor::params::{
    DeviceState, Destination, Field, MonitorKind, MonitorSpec, DEFAULT_INTERVAL, DEFAULT_TIMEOUT,
};

const INTERVAL_NOT_BELOW_TIMEOUT: &str = "Parameter 'interval' must be less than 'timeout'.";

/// Attribute values to push to the device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub parent: Option<String>,
    pub destination: Option<Destination>,
    pub send: Option<String>,
    pub receive: Option<String>,
    pub interval: Option<u32>,
    pub timeout: Option<u32>,
    pub time_until_up: Option<u32>,
}

impl ChangeSet {
    /// Everything needed to create `want`, with creation-time defaults filled in.
    pub fn for_create(want: &MonitorSpec) -> Result<Self> {
        let interval = want.interval.unwrap_or(DEFAULT_INTERVAL);
        let timeout = want.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if interval >= timeout {
            return Err(MonitorError::invalid(INTERVAL_NOT_BELOW_TIMEOUT));
        }

        Ok(ChangeSet {
            parent: want.effective_parent(),
            destination: want.destination(),
            send: want.send().map(str::to_string),
            receive: want.receive().map(str::to_string),
            interval: Some(interval),
            timeout: Some(timeout),
            time_until_up: want.effective_time_until_up(),
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == ChangeSet::default()
    }

    /// Payload for the create and modify calls, keyed by API attribute name.
    pub fn api_attributes(&self) -> ApiAttributes {
        let mut attrs = Map::new();
        insert(&mut attrs, "defaultsFrom", self.parent.clone());
        insert(&mut attrs, "destination", self.destination.map(|d| d.to_string()));
        insert(&mut attrs, "send", self.send.clone());
        insert(&mut attrs, "recv", self.receive.clone());
        insert(&mut attrs, "interval", self.interval);
        insert(&mut attrs, "timeout", self.timeout);
        insert(&mut attrs, "timeUntilUp", self.time_until_up);
        attrs
    }

    /// The returnable fields of `kind` that this change touches.
    pub fn to_return(&self, kind: MonitorKind) -> Map<String, Value> {
        let mut result = Map::new();
        for &key in kind.returnables() {
            let value = match key {
                "parent" => self.parent.clone().map(Value::from),
                "send" => self.send.clone().map(Value::from),
                "receive" => self.receive.clone().map(Value::from),
                "ip" => self.destination.map(|d| Value::from(d.address().to_string())),
                "port" => self.destination.and_then(|d| d.port()).map(|p| p.to_value()),
                "interval" => self.interval.map(Value::from),
                "timeout" => self.timeout.map(Value::from),
                "time_until_up" => self.time_until_up.map(Value::from),
                _ => None,
            };
            if let Some(value) = value {
                result.insert(key.to_string(), value);
            }
        }
        result
    }
}

fn insert<T: Into<Value>>(attrs: &mut ApiAttributes, key: &str, value: Option<T>) {
    if let Some(value) = value {
        attrs.insert(key.to_string(), value.into());
    }
}

/// Compares desired against live state, one updatable field at a time.
pub struct Difference<'a> {
    want: &'a MonitorSpec,
    have: &'a DeviceState,
}

impl<'a> Difference<'a> {
    pub fn new(want: &'a MonitorSpec, have: &'a DeviceState) -> Self {
        Self { want, have }
    }

    /// Builds the change set, failing on a forbidden change.
    pub fn compute(&self) -> Result<ChangeSet> {
        self.parent()?;

        let mut changes = ChangeSet::default();
        for field in self.want.kind().updatables() {
            match field {
                Field::Destination => {
                    changes.destination = changed(self.want.destination(), self.have.destination)
                }
                Field::Send => {
                    changes.send = changed(
                        self.want.send().map(str::to_string),
                        self.have.send.clone(),
                    )
                }
                Field::Receive => {
                    changes.receive = changed(
                        self.want.receive().map(str::to_string),
                        self.have.receive.clone(),
                    )
                }
                Field::Interval => changes.interval = self.interval()?,
                Field::Timeout => changes.timeout = self.timeout()?,
                Field::TimeUntilUp => {
                    changes.time_until_up =
                        changed(self.want.effective_time_until_up(), self.have.time_until_up)
                }
            }
        }
        Ok(changes)
    }

    fn parent(&self) -> Result<()> {
        if let (Some(want), Some(have)) = (&self.want.parent, &self.have.parent) {
            if want != have {
                return Err(MonitorError::invalid("The parent monitor cannot be changed"));
            }
        }
        Ok(())
    }

    fn interval(&self) -> Result<Option<u32>> {
        let Some(interval) = self.want.interval else {
            return Ok(None);
        };
        if let Some(timeout) = self.want.timeout.or(self.have.timeout) {
            if interval >= timeout {
                return Err(MonitorError::invalid(INTERVAL_NOT_BELOW_TIMEOUT));
            }
        }
        Ok(changed(Some(interval), self.have.interval))
    }

    // A lone timeout still has to stay above the interval already on the device.
    fn timeout(&self) -> Result<Option<u32>> {
        let Some(timeout) = self.want.timeout else {
            return Ok(None);
        };
        if self.want.interval.is_none() {
            if let Some(interval) = self.have.interval {
                if interval >= timeout {
                    return Err(MonitorError::invalid(INTERVAL_NOT_BELOW_TIMEOUT));
                }
            }
        }
        Ok(changed(Some(timeout), self.have.timeout))
    }
}

fn changed<T: PartialEq>(want: Option<T>, have: Option<T>) -> Option<T> {
    match want {
        Some(value) if have.as_ref() != Some(&value) => Some(value),
        _ => None,
    }
}
