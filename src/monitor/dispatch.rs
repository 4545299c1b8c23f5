//! Entry point: resolves the monitor kind and runs its manager.

use tracing::info;

use crate::client::MonitorApi;
use crate::error::Result;
use crate::monitor::args::ModuleArgs;
use crate::monitor::manager::{ModuleResult, MonitorManager};
use crate::monitor::params::{MonitorKind, MonitorSpec};

/// Runs one request: picks the monitor kind from the deprecated `type`
/// option, normalizes the arguments for it and reconciles the device.
pub async fn exec_module<C: MonitorApi + ?Sized>(
    client: &C,
    args: &ModuleArgs,
    check_mode: bool,
) -> Result<ModuleResult> {
    let kind = MonitorKind::from_type_name(args.monitor_type.as_deref())?;
    let want = MonitorSpec::from_args(kind, args)?;
    info!(
        monitor = %want.name,
        partition = %want.partition,
        %kind,
        state = ?want.state,
        check_mode,
        "Reconciling monitor."
    );
    MonitorManager::new(client, want, check_mode).exec().await
}
