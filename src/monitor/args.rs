//! Raw module arguments, as they arrive from the command line or an args file.
//!
//! Nothing here is validated; [`crate::monitor::params::MonitorSpec`] does that.

use std::fs;
use std::path::Path;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MonitorError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

#[derive(Args, Deserialize, Debug, Clone, Default)]
pub struct ModuleArgs {
    /// Monitor name.
    #[arg(long, alias = "monitor")]
    #[serde(default, alias = "monitor")]
    pub name: Option<String>,

    /// Partition holding the monitor.
    #[arg(long)]
    #[serde(default)]
    pub partition: Option<String>,

    /// Parent template. Cannot be changed once the monitor exists.
    #[arg(long)]
    #[serde(default)]
    pub parent: Option<String>,

    /// Send string for the monitor call (tcp only).
    #[arg(long)]
    #[serde(default)]
    pub send: Option<String>,

    /// Receive string for the monitor call (tcp only).
    #[arg(long)]
    #[serde(default)]
    pub receive: Option<String>,

    /// IP address part of the destination, or `*`.
    #[arg(long)]
    #[serde(default)]
    pub ip: Option<String>,

    /// Port part of the destination, or `*`.
    #[arg(long)]
    #[serde(default, deserialize_with = "string_or_number")]
    pub port: Option<String>,

    /// Seconds between probes. Must be less than `timeout`.
    #[arg(long, allow_negative_numbers = true)]
    #[serde(default)]
    pub interval: Option<i64>,

    /// Seconds the target has to respond.
    #[arg(long, allow_negative_numbers = true)]
    #[serde(default)]
    pub timeout: Option<i64>,

    /// Seconds after the first good response before the node is marked up.
    #[arg(long, allow_negative_numbers = true)]
    #[serde(default)]
    pub time_until_up: Option<i64>,

    /// Deprecated: monitor template type.
    #[arg(long = "type")]
    #[serde(default, rename = "type")]
    pub monitor_type: Option<String>,

    /// Deprecated: partition of the default parent template.
    #[arg(long)]
    #[serde(default)]
    pub parent_partition: Option<String>,

    #[arg(long, value_enum)]
    #[serde(default)]
    pub state: Option<State>,
}

impl ModuleArgs {
    /// Fills every unset field from `fallback`. Values already set here win.
    pub fn or(self, fallback: ModuleArgs) -> ModuleArgs {
        ModuleArgs {
            name: self.name.or(fallback.name),
            partition: self.partition.or(fallback.partition),
            parent: self.parent.or(fallback.parent),
            send: self.send.or(fallback.send),
            receive: self.receive.or(fallback.receive),
            ip: self.ip.or(fallback.ip),
            port: self.port.or(fallback.port),
            interval: self.interval.or(fallback.interval),
            timeout: self.timeout.or(fallback.timeout),
            time_until_up: self.time_until_up.or(fallback.time_until_up),
            monitor_type: self.monitor_type.or(fallback.monitor_type),
            parent_partition: self.parent_partition.or(fallback.parent_partition),
            state: self.state.or(fallback.state),
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Reads the JSON args file at `path`, if any, with `flags` taking precedence.
    pub fn load(flags: ModuleArgs, path: Option<&Path>) -> crate::error::Result<ModuleArgs> {
        let Some(path) = path else {
            return Ok(flags);
        };
        let contents = fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Failed to read args file at {path:?}: {e}"))
        })?;
        let from_file = Self::from_json(&contents).map_err(|e| {
            MonitorError::Config(format!("Failed to parse args file at {path:?}: {e}"))
        })?;
        Ok(flags.or(from_file))
    }
}

// Ports arrive as `80` or `"80"` or `"*"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    }))
}
