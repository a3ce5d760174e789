//! lmctl binary
//!
//! Entry point for the instance enable/disable workflow and its supporting
//! commands. The process exit status is the workflow status: 0 when every
//! attempted update succeeded (or nothing matched), 1 otherwise.

use anyhow::{Context, Result};
use cli::{Cli, Commands, MutationArgs, PortalArgs};
use common::{MutationAction, SecretKey};
use config::{
    generate_default_config, load_config, save_config, validate_config, ConfigOverrides, LmctlConfig,
    ValidationReport, DEFAULT_CONFIG_FILE,
};
use instances::{listing, InstanceWorkflow, WorkflowRequest};
use observability::{flush_metrics, init_logging, init_metrics, LogFormat, LogSink};
use portal_client::{ClientSettings, HttpPortalClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "lmctl";

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };

    if let Err(e) = flush_metrics() {
        warn!("{:#}", e);
    }

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let action = cli.command.action();

    match cli.command {
        Commands::Enable(args) | Commands::Disable(args) => {
            let action = action.unwrap_or_default();
            mutate_command(args, action).await
        }
        Commands::Modules {
            device,
            batch_size,
            portal,
        } => {
            let config = prepare(portal, batch_size)?;
            let client = build_client(&config)?;
            let (device, modules) =
                listing::applied_modules(&client, device.device_ref()?, config.client.batch_size).await?;

            println!("Applied modules on {} ({}):", device.label(), modules.len());
            println!("{:>10}  {:<40}  {:>9}", "ID", "NAME", "INSTANCES");
            for module in &modules {
                println!(
                    "{:>10}  {:<40}  {:>9}",
                    module.id, module.data_source_name, module.instance_number
                );
            }
            Ok(0)
        }
        Commands::Instances {
            device,
            module_id,
            filter,
            portal,
        } => {
            let config = prepare(portal, None)?;
            let client = build_client(&config)?;
            let (device, instances) =
                listing::module_instances(&client, device.device_ref()?, module_id, filter.as_deref()).await?;

            println!("Instances of module {} on {} ({}):", module_id, device.label(), instances.len());
            println!("{:>10}  {:<40}  {:>8}  {:>10}", "ID", "NAME", "ALERTING", "MONITORING");
            for instance in &instances {
                println!(
                    "{:>10}  {:<40}  {:>8}  {:>10}",
                    instance.id,
                    instance.display_name,
                    on_off(!instance.disable_alerting),
                    on_off(!instance.stop_monitoring)
                );
            }
            Ok(0)
        }
        Commands::Validate { portal } => validate_command(portal),
        Commands::Init { output } => {
            init_logging(SERVICE_NAME, LogFormat::Pretty, LogSink::Stderr)?;
            init_command(&output)?;
            Ok(0)
        }
    }
}

async fn mutate_command(args: MutationArgs, action: MutationAction) -> Result<i32> {
    let selectors = args.selectors();
    let MutationArgs {
        device,
        filter,
        alerting_only,
        batch_size,
        portal,
        ..
    } = args;

    let config = prepare(portal, batch_size)?;
    let device = device.device_ref()?;

    let mut request = WorkflowRequest::new(device, selectors)
        .with_action(action)
        .alerting_only(alerting_only)
        .with_batch_size(config.client.batch_size);
    if let Some(filter) = filter {
        request = request.with_filter(filter);
    }

    let client = build_client(&config)?;
    let metrics = client.metrics().clone();
    let workflow = InstanceWorkflow::new(Arc::new(client)).with_metrics(metrics);

    let report = workflow.run(request).await;
    info!(
        run_id = %report.run_id,
        action = %report.action,
        applied = report.applied_count(),
        failed = report.failed_count(),
        exit_code = report.exit_code(),
        "Done"
    );
    Ok(report.exit_code())
}

/// Load config, apply CLI/env overrides, start logging and metrics, and
/// refuse to continue on validation errors
fn prepare(portal: PortalArgs, batch_size: Option<u64>) -> Result<LmctlConfig> {
    let config = load_settings(portal, batch_size)?;

    let report = validate_config(&config);
    log_warnings(&report);
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!(
            "Configuration validation failed with {} error(s)",
            report.errors.len()
        );
    }

    if let Some(metrics) = &config.metrics {
        init_metrics(metrics.textfile.clone())?;
    }

    Ok(config)
}

/// Config file plus overrides, with logging installed as configured
fn load_settings(portal: PortalArgs, batch_size: Option<u64>) -> Result<LmctlConfig> {
    let mut config = read_config(portal.config.as_deref())?;

    config.apply_overrides(ConfigOverrides {
        account: portal.account,
        access_id: portal.access_id,
        access_key: portal.access_key.map(SecretKey::new),
        batch_size,
        base_url: portal.base_url,
    });

    let format = match portal.log_format {
        Some(format) => format.as_str().to_string(),
        None => config.logging.format.clone(),
    };
    let sink = match portal.log_file.or_else(|| config.logging.file.clone()) {
        Some(path) => LogSink::File(path),
        None => LogSink::Stderr,
    };
    init_logging(SERVICE_NAME, LogFormat::parse(&format).unwrap_or_default(), sink)?;
    debug!(account = %config.portal.account, "Configuration loaded");

    Ok(config)
}

/// An explicit path must exist; the default file is optional
fn read_config(path: Option<&Path>) -> Result<LmctlConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.exists() {
                load_config(&default)
            } else {
                Ok(LmctlConfig::default())
            }
        }
    }
}

fn build_client(config: &LmctlConfig) -> Result<HttpPortalClient> {
    let settings = ClientSettings {
        base_url: config.portal.rest_base_url(),
        api_version: config.portal.api_version,
        timeout: Duration::from_secs(config.client.timeout_seconds),
    };
    HttpPortalClient::new(config.portal.credentials(), settings).context("Failed to create portal client")
}

fn log_warnings(report: &ValidationReport) {
    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }
}

fn validate_command(portal: PortalArgs) -> Result<i32> {
    let config = load_settings(portal, None)?;
    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        return Ok(1);
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Account: {}", config.portal.account);
    println!("Access id: {}", config.portal.access_id);
    println!("REST root: {}", config.portal.rest_base_url());
    println!("Batch size: {}", config.client.batch_size);
    println!("Request timeout: {}s", config.client.timeout_seconds);

    Ok(0)
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Export LM_ACCOUNT, LM_ACCESS_ID and LM_ACCESS_KEY");
    println!(
        "  2. Run 'lmctl validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'lmctl enable --config {:?} --device-id <ID> --module <NAME>'",
        output_path
    );

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
