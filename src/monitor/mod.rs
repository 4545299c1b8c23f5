//! TCP-family health monitors: input normalization, diffing and reconciliation.

pub mod args;
pub mod difference;
pub mod dispatch;
pub mod manager;
pub mod params;

pub use args::{ModuleArgs, State};
pub use difference::{ChangeSet, Difference};
pub use dispatch::exec_module;
pub use manager::{failure_output, ModuleResult, MonitorManager};
pub use params::{Address, Destination, DeviceState, MonitorKind, MonitorSpec, Port};
