//! Normalized monitor parameters.
//!
//! [`MonitorSpec`] is the desired state built from user input, [`DeviceState`]
//! the live state read back from the device. Both share the typed
//! [`Address`], [`Port`] and [`Destination`] values so they compare directly.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApiAttributes;
use crate::error::{MonitorError, Result};
use crate::monitor::args::{ModuleArgs, State};

pub const DEFAULT_PARTITION: &str = "Common";
pub const DEFAULT_INTERVAL: u32 = 5;
pub const DEFAULT_TIMEOUT: u32 = 16;
pub const MAX_INTERVAL: i64 = 86400;
const DEPRECATED_IN: &str = "2.4";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    Tcp,
    TcpEcho,
    TcpHalfOpen,
}

/// Attributes the difference engine knows how to compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Destination,
    Send,
    Receive,
    Interval,
    Timeout,
    TimeUntilUp,
}

impl MonitorKind {
    /// Maps the deprecated `type` option. `None` selects plain TCP.
    pub fn from_type_name(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("tcp") | Some("TTYPE_TCP") => Ok(MonitorKind::Tcp),
            Some("tcp_echo") | Some("TTYPE_TCP_ECHO") => Ok(MonitorKind::TcpEcho),
            Some("tcp_half_open") | Some("TTYPE_TCP_HALF_OPEN") => Ok(MonitorKind::TcpHalfOpen),
            Some(other) => Err(MonitorError::invalid(format!(
                "Unsupported monitor type '{other}'"
            ))),
        }
    }

    fn template_name(&self) -> &'static str {
        match self {
            MonitorKind::Tcp => "tcp",
            MonitorKind::TcpEcho => "tcp_echo",
            MonitorKind::TcpHalfOpen => "tcp_half_open",
        }
    }

    pub fn default_parent(&self) -> String {
        format!("/{DEFAULT_PARTITION}/{}", self.template_name())
    }

    /// Path segment of this kind's collection in the management API.
    pub fn collection(&self) -> &'static str {
        match self {
            MonitorKind::Tcp => "tcp",
            MonitorKind::TcpEcho => "tcp-echo",
            MonitorKind::TcpHalfOpen => "tcp-half-open",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MonitorKind::Tcp => "TCP",
            MonitorKind::TcpEcho => "TCP echo",
            MonitorKind::TcpHalfOpen => "TCP half open",
        }
    }

    pub fn updatables(&self) -> &'static [Field] {
        match self {
            MonitorKind::Tcp => &[
                Field::Destination,
                Field::Send,
                Field::Receive,
                Field::Interval,
                Field::Timeout,
                Field::TimeUntilUp,
            ],
            MonitorKind::TcpEcho | MonitorKind::TcpHalfOpen => &[
                Field::Destination,
                Field::Interval,
                Field::Timeout,
                Field::TimeUntilUp,
            ],
        }
    }

    pub fn returnables(&self) -> &'static [&'static str] {
        match self {
            MonitorKind::Tcp => &[
                "parent",
                "send",
                "receive",
                "ip",
                "port",
                "interval",
                "timeout",
                "time_until_up",
            ],
            MonitorKind::TcpEcho => &["parent", "ip", "interval", "timeout", "time_until_up"],
            MonitorKind::TcpHalfOpen => &[
                "parent",
                "ip",
                "port",
                "interval",
                "timeout",
                "time_until_up",
            ],
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Address {
    Any,
    Ip(IpAddr),
}

impl Address {
    pub fn parse(value: &str) -> Result<Self> {
        if value == "*" {
            return Ok(Address::Any);
        }
        match value.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) if v4 == Ipv4Addr::UNSPECIFIED => Ok(Address::Any),
            Ok(ip) => Ok(Address::Ip(ip)),
            Err(_) => Err(MonitorError::invalid(
                "The provided 'ip' parameter is not an IP address.",
            )),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Any => f.write_str("*"),
            Address::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    Any,
    Number(u16),
}

impl Port {
    pub fn parse(value: &str) -> Result<Self> {
        if value == "*" {
            return Ok(Port::Any);
        }
        value.trim().parse::<u16>().map(Port::Number).map_err(|_| {
            MonitorError::invalid("The provided 'port' parameter must be '*' or between 0 and 65535.")
        })
    }

    pub(crate) fn to_value(self) -> Value {
        match self {
            Port::Any => Value::from("*"),
            Port::Number(n) => Value::from(n),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Any => f.write_str("*"),
            Port::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Probe target. Echo monitors have no port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Endpoint { address: Address, port: Port },
    Host(Address),
}

impl Destination {
    pub fn address(&self) -> Address {
        match self {
            Destination::Endpoint { address, .. } | Destination::Host(address) => *address,
        }
    }

    pub fn port(&self) -> Option<Port> {
        match self {
            Destination::Endpoint { port, .. } => Some(*port),
            Destination::Host(_) => None,
        }
    }

    /// Parses a destination string as the device reports it.
    ///
    /// Accepts `ip:port` split at the last `:` (so IPv6 addresses work, and
    /// this is the form `Display` writes), `addr.port`, and an optional leading
    /// `/partition/` prefix.
    pub fn parse(kind: MonitorKind, value: &str) -> Result<Self> {
        let value = value.rsplit('/').next().unwrap_or(value);
        if kind == MonitorKind::TcpEcho {
            if let Ok(address) = Address::parse(value) {
                return Ok(Destination::Host(address));
            }
        }

        for separator in [':', '.'] {
            if let Some((address, port)) = value.rsplit_once(separator) {
                if let (Ok(address), Ok(port)) = (Address::parse(address), Port::parse(port)) {
                    // Echo probes ignore any port the device reports.
                    if kind == MonitorKind::TcpEcho {
                        return Ok(Destination::Host(address));
                    }
                    return Ok(Destination::Endpoint { address, port });
                }
            }
        }
        Err(MonitorError::Api(format!(
            "Unexpected destination '{value}' reported by the device"
        )))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Endpoint { address, port } => write!(f, "{address}:{port}"),
            Destination::Host(address) => write!(f, "{address}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Deprecation {
    pub msg: String,
    pub version: String,
}

impl Deprecation {
    fn param(name: &str) -> Self {
        Self {
            msg: format!("The {name} param is deprecated"),
            version: DEPRECATED_IN.to_string(),
        }
    }
}

/// Fields only some monitor kinds carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Probe {
    Tcp {
        port: Option<Port>,
        send: Option<String>,
        receive: Option<String>,
    },
    TcpEcho,
    TcpHalfOpen {
        port: Option<Port>,
    },
}

/// Desired monitor configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorSpec {
    pub name: String,
    pub partition: String,
    pub state: State,
    /// Parent the user asked for; `None` means the kind's default.
    pub parent: Option<String>,
    pub default_parent: String,
    pub interval: Option<u32>,
    pub timeout: Option<u32>,
    pub time_until_up: Option<u32>,
    pub ip: Option<Address>,
    pub probe: Probe,
    pub deprecations: Vec<Deprecation>,
}

impl MonitorSpec {
    pub fn from_args(kind: MonitorKind, args: &ModuleArgs) -> Result<Self> {
        let name = args
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| MonitorError::invalid("missing required arguments: name"))?
            .to_string();
        let state = args.state.unwrap_or_default();
        let partition = args
            .partition
            .clone()
            .unwrap_or_else(|| DEFAULT_PARTITION.to_string());

        let mut deprecations = Vec::new();
        if args.monitor_type.is_some() {
            deprecations.push(Deprecation::param("type"));
        }
        if args.parent_partition.is_some() {
            deprecations.push(Deprecation::param("parent_partition"));
        }
        if args.parent.is_some() && args.parent_partition.is_some() {
            return Err(MonitorError::invalid(
                "parameters are mutually exclusive: parent|parent_partition",
            ));
        }

        let parent = args.parent.as_deref().map(|p| qualify_parent(&partition, p));
        let default_parent = match &args.parent_partition {
            Some(pp) => format!("/{pp}/{}", kind.template_name()),
            None => kind.default_parent(),
        };

        let probe = build_probe(kind, args)?;
        let ip = args.ip.as_deref().map(Address::parse).transpose()?;

        let spec = MonitorSpec {
            name,
            partition,
            state,
            parent,
            default_parent,
            interval: args.interval.map(validate_interval).transpose()?,
            timeout: args
                .timeout
                .map(|t| non_negative("timeout", t))
                .transpose()?,
            time_until_up: args
                .time_until_up
                .map(|t| non_negative("time_until_up", t))
                .transpose()?,
            ip,
            probe,
            deprecations,
        };

        if let Some(Address::Ip(_)) = spec.ip {
            if kind != MonitorKind::TcpEcho && matches!(spec.port(), None | Some(Port::Any)) {
                return Err(MonitorError::invalid(
                    "Specifying an IP address requires that a port number be specified",
                ));
            }
        }
        Ok(spec)
    }

    pub fn kind(&self) -> MonitorKind {
        match self.probe {
            Probe::Tcp { .. } => MonitorKind::Tcp,
            Probe::TcpEcho => MonitorKind::TcpEcho,
            Probe::TcpHalfOpen { .. } => MonitorKind::TcpHalfOpen,
        }
    }

    fn present(&self) -> bool {
        self.state == State::Present
    }

    pub fn effective_parent(&self) -> Option<String> {
        match &self.parent {
            Some(parent) => Some(parent.clone()),
            None if self.present() => Some(self.default_parent.clone()),
            None => None,
        }
    }

    pub fn effective_ip(&self) -> Option<Address> {
        match self.ip {
            None if self.present() => Some(Address::Any),
            ip => ip,
        }
    }

    pub fn port(&self) -> Option<Port> {
        let port = match &self.probe {
            Probe::Tcp { port, .. } | Probe::TcpHalfOpen { port } => *port,
            Probe::TcpEcho => return None,
        };
        match port {
            None if self.present() => Some(Port::Any),
            port => port,
        }
    }

    pub fn effective_time_until_up(&self) -> Option<u32> {
        match self.time_until_up {
            None if self.present() => Some(0),
            t => t,
        }
    }

    pub fn destination(&self) -> Option<Destination> {
        let address = self.effective_ip()?;
        match self.kind() {
            MonitorKind::TcpEcho => Some(Destination::Host(address)),
            _ => self
                .port()
                .map(|port| Destination::Endpoint { address, port }),
        }
    }

    pub fn send(&self) -> Option<&str> {
        match &self.probe {
            Probe::Tcp { send, .. } => send.as_deref(),
            _ => None,
        }
    }

    pub fn receive(&self) -> Option<&str> {
        match &self.probe {
            Probe::Tcp { receive, .. } => receive.as_deref(),
            _ => None,
        }
    }
}

fn build_probe(kind: MonitorKind, args: &ModuleArgs) -> Result<Probe> {
    let unavailable =
        |param: &str| MonitorError::invalid(format!("The '{param}' parameter is not available for {}", kind.label()));

    if kind != MonitorKind::Tcp {
        if args.send.is_some() {
            return Err(unavailable("send"));
        }
        if args.receive.is_some() {
            return Err(unavailable("receive"));
        }
    }
    if kind == MonitorKind::TcpEcho && args.port.is_some() {
        return Err(unavailable("port"));
    }

    let port = args.port.as_deref().map(Port::parse).transpose()?;
    Ok(match kind {
        MonitorKind::Tcp => Probe::Tcp {
            port,
            send: args.send.clone(),
            receive: args.receive.clone(),
        },
        MonitorKind::TcpEcho => Probe::TcpEcho,
        MonitorKind::TcpHalfOpen => Probe::TcpHalfOpen { port },
    })
}

/// Bare template names live in the monitor's partition; full paths are kept.
fn qualify_parent(partition: &str, parent: &str) -> String {
    if parent.starts_with('/') {
        parent.to_string()
    } else {
        format!("/{partition}/{parent}")
    }
}

fn validate_interval(value: i64) -> Result<u32> {
    if !(1..=MAX_INTERVAL).contains(&value) {
        return Err(MonitorError::invalid(format!(
            "Interval value must be between 1 and {MAX_INTERVAL}"
        )));
    }
    Ok(value as u32)
}

fn non_negative(param: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        MonitorError::invalid(format!("Parameter '{param}' must be a non-negative integer."))
    })
}

/// Monitor attributes as the device currently reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub parent: Option<String>,
    pub destination: Option<Destination>,
    pub send: Option<String>,
    pub receive: Option<String>,
    pub interval: Option<u32>,
    pub timeout: Option<u32>,
    pub time_until_up: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DeviceAttributes {
    defaults_from: Option<String>,
    destination: Option<String>,
    send: Option<String>,
    recv: Option<String>,
    interval: Option<u32>,
    timeout: Option<u32>,
    time_until_up: Option<u32>,
}

impl DeviceState {
    pub fn from_attributes(kind: MonitorKind, attributes: &ApiAttributes) -> Result<Self> {
        let attrs: DeviceAttributes = serde_json::from_value(Value::Object(attributes.clone()))?;
        let destination = attrs
            .destination
            .as_deref()
            .map(|d| Destination::parse(kind, d))
            .transpose()?;

        Ok(DeviceState {
            parent: attrs.defaults_from,
            destination,
            send: attrs.send,
            receive: attrs.recv,
            interval: attrs.interval,
            timeout: attrs.timeout,
            time_until_up: attrs.time_until_up,
        })
    }
}
