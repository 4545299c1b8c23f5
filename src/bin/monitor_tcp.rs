use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ltm_monitor_tcp::client::IControlClient;
use ltm_monitor_tcp::config::{ConnectionConfig, PartialConnectionConfig};
use ltm_monitor_tcp::error::Result;
use ltm_monitor_tcp::monitor::{exec_module, failure_output, ModuleArgs, ModuleResult};
use ltm_monitor_tcp::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Manages BIG-IP LTM tcp, tcp_echo and tcp_half_open monitors", long_about = None)]
struct Cli {
    /// Path to the connection configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// JSON file with module arguments; flags override its values
    #[arg(long = "args")]
    args_file: Option<String>,

    /// Report what would change without touching the device
    #[arg(long)]
    check: bool,

    /// Management address of the device
    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    server_port: Option<u16>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    #[arg(long)]
    validate_certs: Option<bool>,

    #[command(flatten)]
    module: ModuleArgs,
}

impl Cli {
    fn connection_overrides(&self) -> PartialConnectionConfig {
        PartialConnectionConfig {
            server: self.server.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            server_port: self.server_port,
            validate_certs: self.validate_certs,
            ..Default::default()
        }
    }

    fn module_args(&self) -> Result<ModuleArgs> {
        ModuleArgs::load(self.module.clone(), self.args_file.as_deref().map(Path::new))
    }
}

fn init_logging(log_dir: Option<&str>) {
    // Optional file log: JSON format, daily rotation
    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(rolling::daily(dir, "monitor_tcp.log"))
            .with_ansi(false)
            .json()
    });

    // stdout carries the result, so human-readable logs go to stderr
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

async fn run(cli: &Cli, config: &ConnectionConfig) -> Result<ModuleResult> {
    let args = cli.module_args()?;
    let client = IControlClient::from_config(config)?;
    exec_module(&client, &args, cli.check).await
}

fn fail(msg: &str) -> ExitCode {
    println!("{}", failure_output(msg));
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ConnectionConfig::load(cli.config.as_deref(), cli.connection_overrides()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(None);
            error!(error = %e, "Critical error loading configuration. Exiting.");
            return fail(&e.to_string());
        }
    };
    init_logging(config.log_dir.as_deref());
    info!(version = VERSION, server = %config.server, "Starting monitor_tcp.");

    match run(&cli, &config).await {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e.to_string()),
        },
        Err(e) => fail(&e.to_string()),
    }
}
