use anyhow::Context;
use hypercopy::config::{AppConfig, LoggingConfig};
use hypercopy::registry::AccountRegistry;
use hypercopy::retry::RetryPolicy;
use hypercopy::signing::NonceClock;
use hypercopy::venue::{InfoClient, InfoStateReader, StateReader, VenueHttp};
use hypercopy::Orchestrator;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Everything a command needs once configuration is loaded
pub struct Runtime {
    pub registry: Arc<AccountRegistry>,
    pub reader: Arc<dyn StateReader>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn load_config(config_dir: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_from(config_dir)
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))
}

/// Resolve credentials, connect every followed trader's sub-account and
/// wire the orchestrator.
pub async fn bootstrap(config: AppConfig) -> anyhow::Result<Runtime> {
    let credentials = config
        .credentials()
        .context("trader credentials are incomplete")?;

    let http = VenueHttp::new(
        &config.venue.api_url,
        Duration::from_millis(config.venue.request_timeout_ms),
    )?;
    let nonces = Arc::new(NonceClock::new());

    let registry = Arc::new(
        AccountRegistry::connect(credentials, http.clone(), nonces)
            .await
            .context("failed to connect trader sub-accounts")?,
    );

    let retry = RetryPolicy::from_config(&config.retry);
    let reader: Arc<dyn StateReader> =
        Arc::new(InfoStateReader::new(InfoClient::new(http), &retry));
    let orchestrator = Arc::new(Orchestrator::from_config(
        &config,
        registry.clone(),
        reader.clone(),
    ));

    Ok(Runtime {
        registry,
        reader,
        orchestrator,
    })
}

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hypercopy=debug,reqwest=warn", config.level))
    });

    // `tracing_appender::rolling::daily` panics if it cannot create the
    // initial file, so writability is checked first.
    let file_layer = config.dir.as_ref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir.display(),
                e
            );
            return None;
        }
        let test_path = log_dir.join(".hypercopy_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(log_dir, "hypercopy.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives as long as the process.
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir.display(),
                    e
                );
                None
            }
        }
    });

    let (console_text, console_json) = if config.json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init();
}
