// # zonesyncd - zone reconciliation daemon
//
// Thin integration layer: all record, scope and retry logic lives in
// zonesync-core. This binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Constructing the provider through the registry
// 4. Driving periodic reconcile passes until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Zone
// - `ZONESYNC_ROOT_DOMAIN`: Root domain that owns every service record (required)
// - `ZONESYNC_PREFIX_MODE`: Publish `service-zone.parent` instead of `service.zone.parent`
// - `ZONESYNC_PROXIED`: Route records through the provider's edge proxy; with
//   Cloudflare, also sets SSL mode `full` and Authenticated Origin Pull at startup
// - `ZONESYNC_TTL`: Record TTL in seconds (values below 60 are raised to 60)
//
// ### DNS Provider
// - `ZONESYNC_PROVIDER_TYPE`: Provider type (cloudflare, memory)
// - `ZONESYNC_PROVIDER_API_TOKEN`: API token
// - `ZONESYNC_PROVIDER_ZONE_ID`: Provider zone ID
// - `ZONESYNC_MODE`: `dry-run` to log mutations instead of sending them
//
// ### Desired state
// - `ZONESYNC_SERVICES`: Comma-separated services, each `name` or `name=ip`
// - `ZONESYNC_IPV4` / `ZONESYNC_IPV6`: Public address for apex, wildcard and
//   services without their own address
//
// ### Engine
// - `ZONESYNC_INTERVAL_SECS`: Seconds between reconcile passes
// - `ZONESYNC_MAX_RETRIES`: Retries for timed-out provider calls
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export ZONESYNC_ROOT_DOMAIN=home.example.com
// export ZONESYNC_PROVIDER_TYPE=cloudflare
// export ZONESYNC_PROVIDER_API_TOKEN=your_token
// export ZONESYNC_PROVIDER_ZONE_ID=your_zone_id
// export ZONESYNC_SERVICES=app,nas=192.168.1.20
// export ZONESYNC_IPV4=203.0.113.7
//
// zonesyncd
// ```

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::config::{
    EngineConfig, MIN_TTL_SECONDS, ProviderConfig, RetryConfig, ZoneConfig, ZoneSyncConfig,
};
use zonesync_core::engine::{DesiredState, PublicAddress, ReconcileEvent, Reconciler, ServiceTarget};
use zonesync_core::{ProviderRegistry, RecordStore, RetryPolicy, Zone};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long a cancelled run loop may take to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration, as read from the environment
#[derive(Debug)]
struct Config {
    root_domain: String,
    prefix_mode: bool,
    proxied: bool,
    ttl_seconds: u32,
    provider_type: String,
    provider_api_token: Option<String>,
    provider_zone_id: Option<String>,
    services: Vec<ServiceTarget>,
    public_address: PublicAddress,
    interval_secs: Option<u64>,
    max_retries: Option<u32>,
    log_level: String,
    /// Adjustments made while parsing, logged once tracing is up
    warnings: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut warnings = Vec::new();

        let root_domain = var("ZONESYNC_ROOT_DOMAIN")
            .filter(|value| !value.trim().is_empty())
            .context(
                "ZONESYNC_ROOT_DOMAIN is required. \
                 Set it via: export ZONESYNC_ROOT_DOMAIN=home.example.com",
            )?;

        let mut ttl_seconds = match var("ZONESYNC_TTL") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("ZONESYNC_TTL must be a number of seconds. Got: {}", value))?,
            None => ZoneConfig::new(root_domain.trim()).ttl_seconds,
        };
        if ttl_seconds < MIN_TTL_SECONDS {
            warnings.push(format!(
                "ZONESYNC_TTL {} is below the provider minimum, using {}",
                ttl_seconds, MIN_TTL_SECONDS
            ));
            ttl_seconds = MIN_TTL_SECONDS;
        }

        Ok(Self {
            root_domain: root_domain.trim().to_string(),
            prefix_mode: parse_flag("ZONESYNC_PREFIX_MODE", var("ZONESYNC_PREFIX_MODE"))?,
            proxied: parse_flag("ZONESYNC_PROXIED", var("ZONESYNC_PROXIED"))?,
            ttl_seconds,
            provider_type: var("ZONESYNC_PROVIDER_TYPE")
                .map(|value| value.trim().to_lowercase())
                .unwrap_or_else(|| "cloudflare".to_string()),
            provider_api_token: var("ZONESYNC_PROVIDER_API_TOKEN").filter(|v| !v.is_empty()),
            provider_zone_id: var("ZONESYNC_PROVIDER_ZONE_ID").filter(|v| !v.is_empty()),
            services: parse_services(&var("ZONESYNC_SERVICES").unwrap_or_default())?,
            public_address: PublicAddress::new(
                parse_optional::<Ipv4Addr>("ZONESYNC_IPV4", var("ZONESYNC_IPV4"))?,
                parse_optional::<Ipv6Addr>("ZONESYNC_IPV6", var("ZONESYNC_IPV6"))?,
            ),
            interval_secs: parse_optional("ZONESYNC_INTERVAL_SECS", var("ZONESYNC_INTERVAL_SECS"))?,
            max_retries: parse_optional("ZONESYNC_MAX_RETRIES", var("ZONESYNC_MAX_RETRIES"))?,
            log_level: var("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            warnings,
        })
    }

    /// Assemble the library configuration
    fn to_zonesync_config(&self) -> Result<ZoneSyncConfig> {
        let provider = match self.provider_type.as_str() {
            "cloudflare" => ProviderConfig::Cloudflare {
                api_token: self.provider_api_token.clone().context(
                    "ZONESYNC_PROVIDER_API_TOKEN is required for the cloudflare provider",
                )?,
                zone_id: self.provider_zone_id.clone().context(
                    "ZONESYNC_PROVIDER_ZONE_ID is required for the cloudflare provider",
                )?,
            },
            "memory" => ProviderConfig::Memory,
            other => anyhow::bail!(
                "ZONESYNC_PROVIDER_TYPE '{}' is not supported. \
                 Supported providers: cloudflare, memory",
                other
            ),
        };

        let mut retry = RetryConfig::default();
        if let Some(max_retries) = self.max_retries {
            retry.max_retries = max_retries;
        }

        let mut engine = EngineConfig::default();
        if let Some(interval) = self.interval_secs {
            engine.reconcile_interval_secs = interval;
        }

        let settings = ZoneSyncConfig {
            zone: ZoneConfig::new(self.root_domain.clone())
                .with_prefix_mode(self.prefix_mode)
                .with_proxied(self.proxied)
                .with_ttl_seconds(self.ttl_seconds),
            provider,
            retry,
            engine,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                 Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, value),
    }
}

fn parse_optional<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} is invalid ({}): {}", key, e, raw)),
    }
}

/// Parse `ZONESYNC_SERVICES`
///
/// Entries are `name` (published at the public address) or `name=ip`.
/// Repeating a name with an address of the other family gives it both.
fn parse_services(raw: &str) -> Result<Vec<ServiceTarget>> {
    let mut services: BTreeMap<String, ServiceTarget> = BTreeMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, address) = match entry.split_once('=') {
            Some((name, ip)) => {
                let ip: IpAddr = ip
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid address in ZONESYNC_SERVICES entry '{}'", entry))?;
                (name.trim(), Some(ip))
            }
            None => (entry, None),
        };

        let service = services
            .entry(name.to_string())
            .or_insert_with(|| ServiceTarget::new(name));
        match address {
            Some(IpAddr::V4(ip)) => service.ipv4 = Some(ip),
            Some(IpAddr::V6(ip)) => service.ipv6 = Some(ip),
            None => {}
        }
    }

    Ok(services.into_values().collect())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    for warning in &config.warnings {
        warn!("{}", warning);
    }

    let settings = match config.to_zonesync_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration validation error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!("Starting zonesyncd");
    info!(
        root_domain = %settings.zone.root_domain,
        prefix_mode = settings.zone.prefix_mode,
        proxied = settings.zone.proxied,
        services = config.services.len(),
        "Configuration loaded"
    );

    let (reconciler, events) = match build_reconciler(&settings) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let desired = DesiredState::new(config.services, config.public_address);
    let interval = Duration::from_secs(settings.engine.reconcile_interval_secs);

    let result = rt.block_on(async {
        configure_proxy_mode(&settings).await;

        if let Err(e) = run_daemon(reconciler, events, desired, interval).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Construct provider, record store and reconciler
fn build_reconciler(
    settings: &ZoneSyncConfig,
) -> Result<(Reconciler, mpsc::Receiver<ReconcileEvent>)> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        zonesync_provider_cloudflare::register(&registry);
    }

    let provider = registry
        .create_provider(&settings.provider)
        .with_context(|| format!("Failed to create '{}' provider", settings.provider.type_name()))?;
    info!(provider = provider.provider_name(), "Provider ready");

    let zone = Zone::new(&settings.zone)?;
    let store = RecordStore::new(provider, zone, RetryPolicy::from(&settings.retry));

    Ok(Reconciler::new(Arc::new(store), &settings.engine))
}

/// Prepare a proxied Cloudflare zone (SSL mode `full`, Authenticated Origin Pull)
///
/// Failure is logged and ignored: the token may lack zone settings
/// permissions, and records still reconcile without it. Returns whether the
/// setup was attempted.
async fn configure_proxy_mode(settings: &ZoneSyncConfig) -> bool {
    if !settings.zone.proxied {
        return false;
    }

    #[cfg(feature = "cloudflare")]
    if let ProviderConfig::Cloudflare { .. } = &settings.provider {
        use zonesync_provider_cloudflare::CloudflareProvider;

        info!("Proxied zone, configuring Cloudflare SSL mode and Authenticated Origin Pull");
        let result = match CloudflareProvider::from_config(&settings.provider) {
            Ok(provider) => provider.configure_for_proxy_mode().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to configure Cloudflare for proxy mode, continuing");
        }
        return true;
    }

    false
}

/// Run reconcile passes on an interval until a shutdown signal arrives
async fn run_daemon(
    reconciler: Reconciler,
    mut events: mpsc::Receiver<ReconcileEvent>,
    desired: DesiredState,
    interval: Duration,
) -> Result<()> {
    let cancel = CancellationToken::new();

    let signals = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Signal handling failed, shutting down: {:#}", e),
            }
            cancel.cancel();
        })
    };

    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Reconcile event");
        }
    });

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let triggers = IntervalStream::new(ticker).map(move |_| desired.clone());

    info!(interval_secs = interval.as_secs(), "Reconcile loop started");

    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { reconciler.run(triggers, &cancel).await })
    };

    // the loop ends only once cancelled; bound how long that may take
    cancel.cancelled().await;
    info!("Shutting down");
    let outcome = tokio::time::timeout(SHUTDOWN_TIMEOUT, run).await;

    signals.abort();
    drain.abort();

    match outcome {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(e)) => Err(anyhow::anyhow!("Reconcile task failed: {}", e)),
        Err(_) => Err(anyhow::anyhow!(
            "Shutdown timeout after {:?}",
            SHUTDOWN_TIMEOUT
        )),
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
