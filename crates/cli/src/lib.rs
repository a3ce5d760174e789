use clap::{Args, Parser, Subcommand, ValueEnum};
use common::{DeviceRef, ModuleSelector, MutationAction, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lmctl")]
#[command(about = "lmctl - enable or disable monitoring instances on a portal device")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn alerting (and monitoring) back on for module instances
    Enable(MutationArgs),

    /// Turn alerting (and monitoring) off for module instances
    Disable(MutationArgs),

    /// List the modules applied to a device
    Modules {
        #[command(flatten)]
        device: DeviceArgs,

        /// Page size for the listing (1-1000)
        #[arg(long)]
        batch_size: Option<u64>,

        #[command(flatten)]
        portal: PortalArgs,
    },

    /// List the instances of one applied module
    Instances {
        #[command(flatten)]
        device: DeviceArgs,

        /// Device-scoped module id
        #[arg(long)]
        module_id: u64,

        /// Filter expression, e.g. displayName~"Gi0/"
        #[arg(long)]
        filter: Option<String>,

        #[command(flatten)]
        portal: PortalArgs,
    },

    /// Validate configuration without contacting the portal
    Validate {
        #[command(flatten)]
        portal: PortalArgs,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "lmctl.yaml")]
        output: PathBuf,
    },
}

/// Exactly one way of naming the device
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct DeviceArgs {
    /// Numeric device id
    #[arg(long)]
    pub device_id: Option<u64>,

    /// Device object as JSON, e.g. '{"id": 42, "displayName": "core-sw-01"}'
    #[arg(long, value_name = "JSON")]
    pub device: Option<String>,
}

impl DeviceArgs {
    pub fn device_ref(&self) -> Result<DeviceRef> {
        match (&self.device, self.device_id) {
            (Some(json), _) => DeviceRef::from_json(json),
            (None, Some(id)) => Ok(DeviceRef::Id(id)),
            (None, None) => Err(common::Error::invalid_input(
                "either --device-id or --device is required",
            )),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MutationArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Applied module name (repeatable)
    #[arg(short, long = "module", value_name = "NAME")]
    pub modules: Vec<String>,

    /// Device-scoped applied module id (repeatable)
    #[arg(long = "module-id", value_name = "ID")]
    pub module_ids: Vec<u64>,

    /// Only update instances matching this filter expression
    #[arg(long)]
    pub filter: Option<String>,

    /// Change alerting only, leave data collection as it is
    #[arg(long)]
    pub alerting_only: bool,

    /// Page size for the applied-module listing (1-1000)
    #[arg(long)]
    pub batch_size: Option<u64>,

    #[command(flatten)]
    pub portal: PortalArgs,
}

impl MutationArgs {
    /// Names first, then ids
    pub fn selectors(&self) -> Vec<ModuleSelector> {
        self.modules
            .iter()
            .cloned()
            .map(ModuleSelector::ByName)
            .chain(self.module_ids.iter().copied().map(ModuleSelector::ById))
            .collect()
    }
}

/// Config file, credentials and output settings shared by every portal command
#[derive(Args, Debug, Clone)]
pub struct PortalArgs {
    /// Path to the configuration file [default: lmctl.yaml, if present]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Portal account name
    #[arg(long, env = "LM_ACCOUNT")]
    pub account: Option<String>,

    /// API access id
    #[arg(long, env = "LM_ACCESS_ID")]
    pub access_id: Option<String>,

    /// API access key
    #[arg(long, env = "LM_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Full REST root, overrides account and domain
    #[arg(long)]
    pub base_url: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Commands {
    /// Enable/disable direction for mutating commands
    pub fn action(&self) -> Option<MutationAction> {
        match self {
            Commands::Enable(_) => Some(MutationAction::Enable),
            Commands::Disable(_) => Some(MutationAction::Disable),
            _ => None,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
