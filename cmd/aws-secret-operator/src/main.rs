use clap::Parser;
use pkg_api::AppState;
use pkg_api::server::{ServerConfig, start_server};
use pkg_constants::controller::DEFAULT_WORKERS;
use pkg_constants::paths::{DEFAULT_OPERATOR_CONFIG, DEFAULT_OPERATOR_DATA_DIR, DEFAULT_OPERATOR_PORT};
use pkg_constants::secretsmanager::DEFAULT_REGION;
use pkg_controllers::awssecret::AwsSecretController;
use pkg_controllers::desired::DesiredStateBuilder;
use pkg_controllers::runner::{Runner, RunnerConfig};
use pkg_metrics::MetricsRegistry;
use pkg_secrets::aws::AwsSdkBackend;
use pkg_secrets::client::SecretsManagerClient;
use pkg_secrets::{Resolver, SecretsBackend};
use pkg_state::client::StateStore;
use pkg_state::registry::Registry;
use pkg_types::config::{LogFormat, OperatorConfigFile, load_config_file};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "aws-secret-operator",
    about = "Keeps Secrets in sync with AWS Secrets Manager versions declared by AWSSecret objects"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_OPERATOR_CONFIG)]
    config: String,

    /// Port for the API, health and metrics endpoints
    #[arg(long)]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Unsigned Secrets Manager-compatible endpoint (LocalStack, a signing
    /// proxy). Without it AWS is called through the SDK with signed requests.
    #[arg(long)]
    secrets_endpoint: Option<String>,

    /// AWS region of the Secrets Manager service
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Only reconcile AWSSecrets in this namespace (empty = all)
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Number of AWSSecrets reconciled concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Log filter, e.g. `info` or `pkg_controllers=debug` (RUST_LOG wins)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<CliLogFormat>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliLogFormat {
    Text,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(f: CliLogFormat) -> Self {
        match f {
            CliLogFormat::Text => LogFormat::Text,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: OperatorConfigFile = load_config_file(&cli.config)?;

    // Merge: CLI args > config file > defaults
    let log_level = cli
        .log_level
        .or(file_cfg.log_level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = cli
        .log_format
        .map(LogFormat::from)
        .or(file_cfg.log_format)
        .unwrap_or_default();
    init_tracing(&log_level, log_format);
    info!("Config file: {}", cli.config);

    let port = cli.port.or(file_cfg.port).unwrap_or(DEFAULT_OPERATOR_PORT);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_OPERATOR_DATA_DIR.to_string());
    let region = cli
        .region
        .or(file_cfg.region)
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let secrets_endpoint = cli.secrets_endpoint.or(file_cfg.secrets_endpoint);
    let watch_namespace = cli
        .watch_namespace
        .or(file_cfg.watch_namespace)
        .filter(|ns| !ns.is_empty());
    let workers = cli
        .workers
        .or(file_cfg.workers)
        .unwrap_or(DEFAULT_WORKERS)
        .max(1);

    let (backend, secrets_target): (Arc<dyn SecretsBackend>, String) = match &secrets_endpoint {
        Some(endpoint) => {
            let client = SecretsManagerClient::new(endpoint)?;
            let target = format!("{} (unsigned)", client.endpoint());
            (Arc::new(client), target)
        }
        None => (
            Arc::new(AwsSdkBackend::for_region(&region).await),
            format!("AWS Secrets Manager in {}", region),
        ),
    };

    info!("Starting aws-secret-operator");
    info!("  Port:       {}", port);
    info!("  Data dir:   {}", data_dir);
    info!("  Secrets:    {}", secrets_target);
    info!(
        "  Namespace:  {}",
        watch_namespace.as_deref().unwrap_or("<all>")
    );
    info!("  Workers:    {}", workers);

    let store = StateStore::new(&data_dir).await?;
    let registry = Registry::new(store.clone());
    let metrics = Arc::new(MetricsRegistry::for_operator());

    let resolver = Resolver::new(backend);
    let builder = DesiredStateBuilder::new(resolver, metrics.clone());
    let controller = AwsSecretController::new(Arc::new(registry.clone()), builder, metrics.clone())
        .with_watch_namespace(watch_namespace);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = Runner::new(
        Arc::new(controller),
        store.event_log.clone(),
        RunnerConfig {
            workers,
            ..RunnerConfig::default()
        },
        metrics.clone(),
    )
    .start(shutdown_rx.clone());

    let state = AppState { registry, metrics };
    let config = ServerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], port)),
    };
    let mut server_shutdown = shutdown_rx;
    let server = tokio::spawn(start_server(config, state, async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    }));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);

    if let Err(e) = runner.await {
        warn!("Controller task ended abnormally: {}", e);
    }
    match server.await {
        Ok(Err(e)) => warn!("API server error: {:#}", e),
        Err(e) => warn!("API server task ended abnormally: {}", e),
        Ok(Ok(())) => {}
    }

    store.close().await?;
    info!("Stopped");
    Ok(())
}
