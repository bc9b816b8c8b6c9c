use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use multinode_common::{
    config::VERSION,
    get_cli_styles,
    prompt::{default_logs_datetime_format, setup_logger, LogLevel, LoggerConfig},
};
use multinode_testing_framework::{
    client::{NodeClient, NodeEndpoint, RpcNodeClient},
    config::{defaults, Backend, HarnessConfig, Suite},
    environment::TestEnvironment,
    export::export_blocks,
    network::LocalNetwork,
    scenarios::{InteractiveGate, NoGate, ScenarioExecutor, StepGate},
};

/// Multinode probe CLI configuration - wrapper for command line parsing
#[derive(Parser, Clone, Debug)]
#[command(name = "multinode-probe", version = VERSION, styles = get_cli_styles())]
#[command(about = "Acceptance probe for a multinode permissioned ledger")]
pub struct CliConfig {
    /// Suite to run
    #[clap(long, value_enum, default_value_t = Suite::MaliciousClient)]
    suite: Suite,

    /// Network to run against
    #[clap(long, value_enum, default_value_t = Backend::Rpc)]
    backend: Backend,

    /// Node client endpoint as host:port, once per node in order
    #[clap(long = "node")]
    nodes: Vec<NodeEndpoint>,

    /// Hex private key of admin@test
    #[clap(long)]
    admin_private_key: Option<String>,

    /// Domain the harness creates its accounts in
    #[clap(long, default_value_t = String::from(defaults::DOMAIN))]
    domain: String,

    /// Pause after the reachability check, in seconds
    #[clap(long)]
    settle_delay_secs: Option<u64>,

    /// Set log level
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Disable the log file
    #[clap(long)]
    disable_file_logging: bool,

    /// Disable the usage of colors in log
    #[clap(long)]
    disable_log_color: bool,

    /// Run every step without waiting for the operator
    #[clap(long)]
    disable_interactive_mode: bool,

    /// Log filename
    #[clap(long, default_value_t = String::from(defaults::FILENAME_LOG))]
    filename_log: String,

    /// Logs directory
    #[clap(long, default_value_t = String::from(defaults::LOGS_PATH))]
    logs_path: String,

    /// Directory the per node block logs are written to
    /// (default: <suite>_logs)
    #[clap(long)]
    blocks_dir: Option<String>,

    /// Do not dump the blocks of each node after the run
    #[clap(long)]
    skip_block_export: bool,

    /// Advanced: Request timeout in seconds
    #[clap(long, default_value_t = defaults::REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Advanced: Connection timeout in seconds
    #[clap(long, default_value_t = defaults::CONNECTION_TIMEOUT_SECS)]
    connection_timeout_secs: u64,

    /// Advanced: Maximum wait for a final transaction status in seconds
    #[clap(long, default_value_t = defaults::STATUS_TIMEOUT_SECS)]
    status_timeout_secs: u64,

    /// Advanced: Status polling interval in milliseconds
    #[clap(long, default_value_t = defaults::STATUS_POLL_INTERVAL_MS)]
    status_poll_interval_ms: u64,

    /// JSON File to load the configuration from
    #[clap(long)]
    config_file: Option<String>,

    /// Generate the template at the `config_file` path
    #[clap(long)]
    generate_config_template: bool,
}

impl CliConfig {
    pub fn into_harness_config(self) -> HarnessConfig {
        let defaults = HarnessConfig::default();
        HarnessConfig {
            log_level: self.log_level,
            disable_file_logging: self.disable_file_logging,
            disable_log_color: self.disable_log_color,
            disable_interactive_mode: self.disable_interactive_mode,
            filename_log: self.filename_log,
            logs_path: self.logs_path,
            suite: self.suite,
            backend: self.backend,
            nodes: if self.nodes.is_empty() {
                defaults.nodes
            } else {
                self.nodes
            },
            admin_private_key: self.admin_private_key,
            domain: self.domain,
            settle_delay_secs: self.settle_delay_secs,
            blocks_dir: self.blocks_dir,
            skip_block_export: self.skip_block_export,
            request_timeout_secs: self.request_timeout_secs,
            connection_timeout_secs: self.connection_timeout_secs,
            status_timeout_secs: self.status_timeout_secs,
            status_poll_interval_ms: self.status_poll_interval_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = CliConfig::parse();

    if let Some(path) = cli_config.config_file.as_ref() {
        if cli_config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {path}");
                eprintln!("Use a different path or remove the existing file");
                return Ok(());
            }

            HarnessConfig::generate_template(path)?;
            println!("Configuration template generated at {path}");
            println!("Edit the file and run the probe with --config-file {path}");
            return Ok(());
        }
    }

    let config = match &cli_config.config_file {
        Some(path) => HarnessConfig::from_file(path)?,
        None => {
            let mut config = cli_config.into_harness_config();
            config.finalize()?;
            config
        }
    };

    setup_logger(LoggerConfig {
        level: config.log_level,
        dir_path: &config.logs_path,
        filename_log: &config.filename_log,
        disable_file_logging: config.disable_file_logging,
        disable_colors: config.disable_log_color,
        logs_datetime_format: default_logs_datetime_format(),
    })?;

    info!("Multinode probe v{} starting...", VERSION);
    info!("Suite: {}, backend: {:?}", config.suite.name(), config.backend);

    run(config).await
}

async fn run(config: HarnessConfig) -> Result<()> {
    let admin = config.admin_keypair()?;
    let mut settings = config.suite_settings()?;

    // Keeps the in-process network alive for the whole run
    let mut local_network = None;
    let nodes: Vec<Arc<dyn NodeClient>> = match config.backend {
        Backend::Local => {
            let network = LocalNetwork::builder()
                .with_nodes(config.nodes.len())
                .with_admin_key(admin.public_key())
                .with_tcp_listeners(true)
                .build()
                .await?;
            if config.settle_delay_secs.is_none() {
                settings = settings.with_settle_delay(Duration::ZERO);
            }
            let clients = network.clients();
            local_network = Some(network);
            clients
        }
        Backend::Rpc => {
            let rpc_config = config.to_rpc_client_config();
            config
                .nodes
                .iter()
                .map(|endpoint| {
                    let client = RpcNodeClient::with_config(endpoint.clone(), rpc_config.clone())
                        .with_context(|| format!("Failed to create client for {}", endpoint))?;
                    info!("Node at {}", client.url());
                    Ok(Arc::new(client) as Arc<dyn NodeClient>)
                })
                .collect::<Result<_>>()?
        }
    };

    let env = TestEnvironment::new(settings, admin, nodes)?;
    let gate: Box<dyn StepGate> = if config.disable_interactive_mode {
        Box::new(NoGate)
    } else {
        Box::new(InteractiveGate)
    };

    let pipeline = config.suite.pipeline();
    let report = ScenarioExecutor::new(gate).execute(&pipeline, &env).await;
    report.print();

    if report.aborted {
        warn!("Run aborted, block logs are not exported");
    } else if !config.skip_block_export {
        export_blocks(env.nodes(), &config.blocks_dir()).await?;
    }

    drop(local_network);

    report.ensure_passed()?;
    info!("All steps of {} passed", report.name);
    Ok(())
}
