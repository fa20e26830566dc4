use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use armctl::client::{format_api_error, ArmClient};
use armctl::config::{Config, PollSettings};
use armctl::ops::{Mutation, Operations};
use armctl::resourceid::ids::{
    ContainerGroupId, IotHubId, KeyVaultId, NetworkProfileId, ResourceGroupId, StorageAccountId,
    SubnetId, SubscriptionId, VirtualMachineId, VirtualNetworkId,
};
use armctl::{ArmResourceId, OperationContext, ParseMode, ResourceId, Schema};

/// Parse resource identifiers and wait for management API state to converge
#[derive(Parser, Debug)]
#[command(name = "armctl", version = armctl::VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Management endpoint (overrides config and ARM_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Subscription for identifiers given from `/resourceGroups/` down
    /// (overrides config)
    #[arg(long, global = true)]
    subscription: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an identifier and print its segments as JSON
    Parse {
        id: String,
        /// Identifier shape to parse against
        #[arg(long, value_enum, default_value = "generic")]
        kind: IdKind,
        /// Accept re-cased literal segments, as echoed back by the API
        #[arg(long)]
        insensitive: bool,
    },
    /// Wait until every given resource can be read
    WaitExists {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        api_version: String,
        /// Consecutive successful reads required
        #[arg(long)]
        stabilization: Option<u32>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Milliseconds between reads
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Wait for a resource's provisioning state to reach a target
    WaitState {
        id: String,
        #[arg(long)]
        api_version: String,
        /// States that keep the wait going
        #[arg(long, value_delimiter = ',', default_value = "Creating,Updating,Accepted")]
        pending: Vec<String>,
        /// States that end the wait
        #[arg(long, value_delimiter = ',', default_value = "Succeeded")]
        target: Vec<String>,
        /// Consecutive target observations required
        #[arg(long)]
        required_hits: Option<u32>,
        /// Fail after this many consecutive "not found" reads
        #[arg(long)]
        not_found_checks: Option<u32>,
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Write the config file, applying --endpoint and --subscription
    Configure,
    /// Delete a resource and wait until it is gone
    Delete {
        id: String,
        #[arg(long)]
        api_version: String,
        /// Send the DELETE again on every poll
        #[arg(long)]
        reissue: bool,
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IdKind {
    /// Any identifier with a subscription scope
    Generic,
    Subscription,
    ResourceGroup,
    VirtualNetwork,
    Subnet,
    NetworkProfile,
    ContainerGroup,
    KeyVault,
    VirtualMachine,
    IotHub,
    StorageAccount,
}

impl IdKind {
    fn schema(self) -> Option<(&'static str, Schema)> {
        let entry = match self {
            IdKind::Generic => return None,
            IdKind::Subscription => (SubscriptionId::RESOURCE_KIND, SubscriptionId::schema()),
            IdKind::ResourceGroup => (ResourceGroupId::RESOURCE_KIND, ResourceGroupId::schema()),
            IdKind::VirtualNetwork => (VirtualNetworkId::RESOURCE_KIND, VirtualNetworkId::schema()),
            IdKind::Subnet => (SubnetId::RESOURCE_KIND, SubnetId::schema()),
            IdKind::NetworkProfile => (NetworkProfileId::RESOURCE_KIND, NetworkProfileId::schema()),
            IdKind::ContainerGroup => (ContainerGroupId::RESOURCE_KIND, ContainerGroupId::schema()),
            IdKind::KeyVault => (KeyVaultId::RESOURCE_KIND, KeyVaultId::schema()),
            IdKind::VirtualMachine => (VirtualMachineId::RESOURCE_KIND, VirtualMachineId::schema()),
            IdKind::IotHub => (IotHubId::RESOURCE_KIND, IotHubId::schema()),
            IdKind::StorageAccount => (StorageAccountId::RESOURCE_KIND, StorageAccountId::schema()),
        };
        Some(entry)
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("armctl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("armctl").join("armctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".armctl").join("armctl.log");
    }
    PathBuf::from("armctl.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_api_error(&err));
        drop(log_guard);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Some(subscription) = args.subscription {
        config.subscription_id = Some(subscription);
    }
    let subscription = config.subscription_id.clone();
    let qualified = |id: String| qualify(id, subscription.as_deref());

    match args.command {
        Command::Parse {
            id,
            kind,
            insensitive,
        } => {
            let mode = if insensitive {
                ParseMode::Insensitive
            } else {
                ParseMode::Strict
            };
            let output = describe(&qualified(id), kind, mode)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::WaitExists {
            ids,
            api_version,
            stabilization,
            timeout,
            interval_ms,
        } => {
            let ids: Vec<String> = ids.into_iter().map(qualified).collect();
            let mut settings = override_settings(&config.polling, timeout, interval_ms);
            if let Some(stabilization) = stabilization {
                settings.stabilization = stabilization;
            }
            let ops = operations(&config, args.endpoint.as_deref(), settings)?;
            let ctx = cancel_on_ctrl_c();
            ops.wait_for_all_exist(&ids, &api_version, &ctx).await?;
            for id in &ids {
                println!("{}: exists", id);
            }
        }
        Command::WaitState {
            id,
            api_version,
            pending,
            target,
            required_hits,
            not_found_checks,
            timeout,
            interval_ms,
        } => {
            let id = qualified(id);
            let mut settings = override_settings(&config.polling, timeout, interval_ms);
            if let Some(required_hits) = required_hits {
                settings.required_hits = required_hits;
            }
            if not_found_checks.is_some() {
                settings.not_found_checks = not_found_checks;
            }
            let ops = operations(&config, args.endpoint.as_deref(), settings)?;
            let ctx = cancel_on_ctrl_c();
            let body = ops
                .wait_for_state(&id, &api_version, &pending, &target, &ctx)
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Configure => {
            if let Some(endpoint) = args.endpoint {
                config.endpoint = endpoint;
            }
            match &args.config {
                Some(path) => config.save_to(path)?,
                None => config.save()?,
            }
            let path = args.config.or_else(Config::config_path);
            match path {
                Some(path) => println!("wrote {}", path.display()),
                None => println!("no config directory, nothing written"),
            }
        }
        Command::Delete {
            id,
            api_version,
            reissue,
            timeout,
            interval_ms,
        } => {
            let id = qualified(id);
            let settings = override_settings(&config.polling, timeout, interval_ms);
            let ops = operations(&config, args.endpoint.as_deref(), settings)?;
            let mutation = Mutation::for_raw_id(&id)?;
            let ctx = cancel_on_ctrl_c();
            if ops.delete(&mutation, &api_version, reissue, &ctx).await? {
                println!("{}: deleted", id);
            } else {
                println!("{}: already gone", id);
            }
        }
    }

    Ok(())
}

/// Prefix an identifier that starts at `/resourceGroups/` with the default
/// subscription. Anything else is returned untouched for the parser to judge.
fn qualify(id: String, subscription: Option<&str>) -> String {
    let Some(subscription) = subscription else {
        return id;
    };
    let path = id.strip_prefix('/').unwrap_or(&id);
    if path.starts_with("resourceGroups/") {
        return format!("/subscriptions/{}/{}", subscription, path);
    }
    id
}

/// Segments of `id` as JSON, plus the canonical form for typed shapes.
fn describe(id: &str, kind: IdKind, mode: ParseMode) -> Result<Value> {
    let Some((resource_kind, schema)) = kind.schema() else {
        let parsed = ArmResourceId::parse(id)?;
        let canonical = parsed.to_string();
        let path: Vec<Value> = parsed
            .path
            .iter()
            .map(|(key, value)| json!({ "type": key, "name": value }))
            .collect();
        return Ok(json!({
            "kind": "generic",
            "subscriptionId": parsed.subscription_id,
            "resourceGroup": parsed.resource_group,
            "provider": parsed.provider,
            "path": path,
            "canonical": canonical,
        }));
    };

    let parsed = schema.parse(id, mode)?;
    let segments: Map<String, Value> = parsed
        .values()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect();
    Ok(json!({
        "kind": resource_kind,
        "segments": segments,
        "canonical": schema.format(|name| parsed.get(name)),
    }))
}

/// Command line flags win over the config file.
fn override_settings(
    base: &PollSettings,
    timeout: Option<u64>,
    interval_ms: Option<u64>,
) -> PollSettings {
    let mut settings = base.clone();
    if let Some(timeout) = timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(interval_ms) = interval_ms {
        settings.interval_ms = interval_ms;
        settings.min_interval_ms = settings.min_interval_ms.min(interval_ms);
    }
    settings
}

fn operations(config: &Config, endpoint: Option<&str>, settings: PollSettings) -> Result<Operations> {
    let client = match endpoint {
        Some(endpoint) => ArmClient::new(endpoint, config.access_token())?,
        None => ArmClient::from_config(config)?,
    };
    tracing::info!("Using endpoint: {}", client.endpoint());
    Ok(Operations::new(client, settings))
}

/// A context cancelled by Ctrl-C. The timeout comes from the poll settings.
fn cancel_on_ctrl_c() -> OperationContext {
    let ctx = OperationContext::new();
    let token = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    ctx
}
