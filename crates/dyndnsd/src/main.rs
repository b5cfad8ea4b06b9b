// # dyndnsd - Dynamic DNS Refresh Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add scheduling, debouncing or DNS logic here
// - All refresh logic lives in dyndns-core
// - Configuration is via environment variables, optionally overlaid on a
//   JSON options file
//
// The dyndnsd daemon is responsible for:
// 1. Reading and validating configuration
// 2. Initializing tracing and the runtime
// 3. Wiring the LDAP connection pool and the nsupdate updater into the scheduler
// 4. Running the scheduler until SIGTERM or SIGINT
//
// ## Configuration
//
// ### Directory servers
// - `DDNS_LDAP_URIS`: Comma-separated `ldap://` URIs in failover order (required)
// - `DDNS_LDAP_CONNECT_TIMEOUT`: Per-server connect timeout in seconds
//
// ### Update target
// - `DDNS_OPTIONS_FILE`: JSON file with `dyndns_*` options (optional)
// - `DDNS_DOMAIN`: Domain the host record lives in (`dyndns_domain`)
// - `DDNS_HOSTNAME`: Host name to publish (`dyndns_hostname`)
// - `DDNS_REALM`: Kerberos realm for GSS-TSIG (`dyndns_realm`)
// - `DDNS_IFACE`: Interface whose addresses are published (`dyndns_iface`)
// - `DDNS_TTL`: Record TTL in seconds (`dyndns_ttl`)
// - `DDNS_REFRESH_INTERVAL`: Periodic refresh in seconds (`dyndns_refresh_interval`)
// - `DDNS_UPDATE`: Set to `false` to disable updates (`dyndns_update`)
//
// Environment variables win over the options file.
//
// ### Scheduler
// - `DDNS_COOLDOWN_SECS`: Debounce window in seconds
//
// ### nsupdate
// - `DDNS_NSUPDATE_PATH`: nsupdate binary
// - `DDNS_NSUPDATE_TIMEOUT`: Maximum run time of one nsupdate call in seconds
// - `DDNS_DRY_RUN`: Log updates instead of sending them
//
// ## Example
//
// ```bash
// export DDNS_LDAP_URIS=ldap://dc1.example.test,ldap://dc2.example.test
// export DDNS_DOMAIN=example.test
// export DDNS_HOSTNAME=client.example.test
// export DDNS_REALM=EXAMPLE.TEST
// export DDNS_IFACE=eth0
//
// dyndnsd
// ```

use anyhow::{Context, Result};
use dyndns_core::traits::ConfigStore;
use dyndns_core::{
    BackendStatus, DynDnsOption, DynDnsScheduler, MemoryConfigStore, SchedulerConfig,
    TokioRefreshTimer,
};
use dyndns_ldap::{LdapConnectionPool, LdapPoolConfig, LdapServer};
use dyndns_nsupdate::{NsupdateConfig, NsupdateUpdater};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time the scheduler gets to wind down after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DyndnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    ldap_uris: Vec<String>,
    connect_timeout_secs: Option<u64>,
    options_file: Option<PathBuf>,
    domain: Option<String>,
    hostname: Option<String>,
    realm: Option<String>,
    iface: Option<String>,
    ttl: Option<u32>,
    refresh_interval_secs: Option<u64>,
    update: Option<String>,
    cooldown_secs: Option<u64>,
    nsupdate_path: Option<String>,
    nsupdate_timeout_secs: Option<u64>,
    dry_run: bool,
    log_level: String,
}

/// Parse an optional numeric variable, rejecting garbage instead of
/// silently falling back to a default
fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a number. Got: '{}'", name, raw)),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, treating empty values as unset
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            ldap_uris: var("DDNS_LDAP_URIS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            connect_timeout_secs: parse_var("DDNS_LDAP_CONNECT_TIMEOUT", var("DDNS_LDAP_CONNECT_TIMEOUT"))?,
            options_file: var("DDNS_OPTIONS_FILE").map(PathBuf::from),
            domain: var("DDNS_DOMAIN"),
            hostname: var("DDNS_HOSTNAME"),
            realm: var("DDNS_REALM"),
            iface: var("DDNS_IFACE"),
            ttl: parse_var("DDNS_TTL", var("DDNS_TTL"))?,
            refresh_interval_secs: parse_var("DDNS_REFRESH_INTERVAL", var("DDNS_REFRESH_INTERVAL"))?,
            update: var("DDNS_UPDATE"),
            cooldown_secs: parse_var("DDNS_COOLDOWN_SECS", var("DDNS_COOLDOWN_SECS"))?,
            nsupdate_path: var("DDNS_NSUPDATE_PATH"),
            nsupdate_timeout_secs: parse_var("DDNS_NSUPDATE_TIMEOUT", var("DDNS_NSUPDATE_TIMEOUT"))?,
            dry_run: var("DDNS_DRY_RUN").is_some_and(|v| {
                matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
            }),
            log_level: var("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Build the option store: options file first, environment on top
    fn load_options(&self) -> Result<MemoryConfigStore> {
        let options = match &self.options_file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Cannot read DDNS_OPTIONS_FILE {}", path.display()))?;
                MemoryConfigStore::from_json(&json)
                    .with_context(|| format!("Invalid DDNS_OPTIONS_FILE {}", path.display()))?
            }
            None => MemoryConfigStore::new(),
        };

        let strings = [
            (DynDnsOption::Domain, &self.domain),
            (DynDnsOption::Hostname, &self.hostname),
            (DynDnsOption::Realm, &self.realm),
            (DynDnsOption::Iface, &self.iface),
            (DynDnsOption::Update, &self.update),
        ];
        for (option, value) in strings {
            if let Some(value) = value {
                options.set(option, value.as_str());
            }
        }
        if let Some(ttl) = self.ttl {
            options.set(DynDnsOption::Ttl, ttl);
        }
        if let Some(interval) = self.refresh_interval_secs {
            options.set(DynDnsOption::RefreshInterval, interval);
        }

        Ok(options)
    }

    /// Validate the configuration together with the merged option store
    ///
    /// This performs comprehensive validation including:
    /// - Required field presence
    /// - URI scheme and domain name format
    /// - Numeric range validation
    fn validate(&self, options: &dyn ConfigStore) -> Result<()> {
        if self.ldap_uris.is_empty() {
            anyhow::bail!(
                "DDNS_LDAP_URIS is required. \
                Set it via: export DDNS_LDAP_URIS=ldap://dc1.example.test"
            );
        }

        for uri in &self.ldap_uris {
            // The DNS server is derived from the directory URI
            if !uri.starts_with("ldap://") {
                anyhow::bail!(
                    "DDNS_LDAP_URIS entries must use the ldap:// scheme. Got: {}",
                    uri
                );
            }
            LdapServer::parse(uri).with_context(|| format!("Invalid DDNS_LDAP_URIS entry: {}", uri))?;
        }

        let update = options.get_bool(DynDnsOption::Update);
        if update.is_none() && options.get_string(DynDnsOption::Update).is_some() {
            anyhow::bail!("{} must be true or false", DynDnsOption::Update);
        }

        match options.get_string(DynDnsOption::Domain) {
            Some(domain) => validate_domain_name(&domain)
                .with_context(|| format!("Invalid {}", DynDnsOption::Domain))?,
            None => anyhow::bail!(
                "{} is required. Set it via: export DDNS_DOMAIN=example.test",
                DynDnsOption::Domain
            ),
        }

        match options.get_string(DynDnsOption::Hostname) {
            Some(hostname) => validate_domain_name(hostname.trim_end_matches('.'))
                .with_context(|| format!("Invalid {}", DynDnsOption::Hostname))?,
            None => anyhow::bail!(
                "{} is required. Set it via: export DDNS_HOSTNAME=client.example.test",
                DynDnsOption::Hostname
            ),
        }

        if let Some(ttl) = options.get_int(DynDnsOption::Ttl)
            && !(1..=86400).contains(&ttl)
        {
            anyhow::bail!("{} must be between 1 and 86400 seconds. Got: {}", DynDnsOption::Ttl, ttl);
        }

        if let Some(interval) = options.get_int(DynDnsOption::RefreshInterval)
            && !(60..=604800).contains(&interval)
        {
            anyhow::bail!(
                "{} must be between 60 and 604800 seconds. Got: {}",
                DynDnsOption::RefreshInterval,
                interval
            );
        }

        if let Some(cooldown) = self.cooldown_secs
            && !(1..=3600).contains(&cooldown)
        {
            anyhow::bail!(
                "DDNS_COOLDOWN_SECS must be between 1 and 3600 seconds. Got: {}",
                cooldown
            );
        }

        if let Some(timeout) = self.connect_timeout_secs
            && !(1..=60).contains(&timeout)
        {
            anyhow::bail!(
                "DDNS_LDAP_CONNECT_TIMEOUT must be between 1 and 60 seconds. Got: {}",
                timeout
            );
        }

        if let Some(timeout) = self.nsupdate_timeout_secs
            && !(1..=600).contains(&timeout)
        {
            anyhow::bail!(
                "DDNS_NSUPDATE_TIMEOUT must be between 1 and 600 seconds. Got: {}",
                timeout
            );
        }

        self.log_level()?;

        Ok(())
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        let config = SchedulerConfig::new();
        match self.cooldown_secs {
            Some(secs) => config.with_cooldown_secs(secs),
            None => config,
        }
    }

    fn pool_config(&self) -> LdapPoolConfig {
        let mut config = LdapPoolConfig::new(self.ldap_uris.clone());
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        config
    }

    fn nsupdate_config(&self) -> NsupdateConfig {
        let mut config = NsupdateConfig::default();
        if let Some(path) = &self.nsupdate_path {
            config.binary = path.clone();
        }
        if let Some(secs) = self.nsupdate_timeout_secs {
            config.timeout_secs = secs;
        }
        config.dry_run = self.dry_run;
        config
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    let options = match config.load_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate(&options) {
        eprintln!("Configuration validation error: {:#}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    info!("Starting dyndnsd daemon");
    info!(
        "Configuration loaded: {} LDAP server(s), {} option(s)",
        config.ldap_uris.len(),
        options.len()
    );

    // One scheduler, one timer: a single-threaded runtime is plenty
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, options).await {
            error!("Daemon error: {:#}", e);
            DyndnsExitCode::RuntimeError
        } else {
            DyndnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config, options: MemoryConfigStore) -> Result<()> {
    if options.get_bool(DynDnsOption::Update) == Some(false) {
        info!("Dynamic DNS updates are disabled, nothing to schedule");
        let signal = wait_for_shutdown().await?;
        info!("Received shutdown signal: {}", signal);
        return Ok(());
    }

    let status = BackendStatus::new();
    let pool = LdapConnectionPool::new(&config.pool_config(), status.clone())?;
    let updater = NsupdateUpdater::new(config.nsupdate_config());
    let (timer, ticks) = TokioRefreshTimer::new();

    info!(
        "Using {} LDAP server(s), nsupdate{}",
        pool.servers().len(),
        if config.dry_run { " (dry-run)" } else { "" }
    );

    let (scheduler, mut events) = DynDnsScheduler::builder()
        .connection_pool(Arc::new(pool))
        .updater(Arc::new(updater))
        .timer(Arc::new(timer))
        .options(Arc::new(options))
        .online_notifier(&status)
        .config(config.scheduler_config())
        .build()?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Scheduler event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let runner = scheduler.clone();
    let mut run = tokio::spawn(async move { runner.run_with_shutdown(ticks, Some(shutdown_rx)).await });

    tokio::select! {
        signal = wait_for_shutdown() => {
            let signal = signal?;
            info!("Received shutdown signal: {}", signal);
        }
        joined = &mut run => {
            joined.context("Scheduler task failed")??;
            anyhow::bail!("Scheduler stopped without a shutdown signal");
        }
    }

    info!("Shutting down daemon");
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, run).await {
        Ok(joined) => joined.context("Scheduler task failed")??,
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
