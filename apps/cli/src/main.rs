use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rootref_core::{find_by_fs_info, Arch, DeviceRef, FsInfo, GptPartition};
use rootref_gpt::resolve_from_gpt_table;
use rootref_parser::{parse_device_ref_with, ParserConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "rootref", about = "Resolve root= style boot parameters to block devices")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Architecture used for partition autodiscovery (default: this build's target)
    #[arg(long, global = true)]
    arch: Option<String>,
    /// Fail on an empty value instead of autodiscovering the root partition
    #[arg(long, global = true)]
    no_autodetect: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ParamArgs {
    /// Boot parameter name, used in diagnostics
    #[arg(long, default_value = "root")]
    param: String,
    /// Boot parameter value, e.g. PARTUUID=<uuid>/PARTNROFF=1
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    value: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a value and print the reference
    Parse {
        #[command(flatten)]
        param: ParamArgs,
    },
    /// Resolve a GPT reference against a partition table (JSON array)
    Resolve {
        #[command(flatten)]
        param: ParamArgs,
        #[arg(long)]
        parent: String,
        #[arg(long)]
        table: PathBuf,
    },
    /// Pick a device by name or filesystem metadata from a JSON array of candidates
    Match {
        #[command(flatten)]
        param: ParamArgs,
        #[arg(long)]
        devices: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct ParseOutput {
    param: String,
    reference: DeviceRef,
    canonical: String,
}

#[derive(Debug, Serialize)]
struct DeviceOutput {
    reference: DeviceRef,
    device: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    name: String,
    #[serde(default)]
    info: Option<FsInfo>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = parser_config(cli.arch.as_deref(), !cli.no_autodetect);
    match &cli.command {
        Command::Parse { param } => {
            let reference = parse_param(&config, param)?;
            let output = ParseOutput {
                param: param.param.clone(),
                canonical: reference.to_string(),
                reference,
            };
            print_json(&output, cli.pretty)
        }
        Command::Resolve {
            param,
            parent,
            table,
        } => {
            let reference = parse_param(&config, param)?;
            let table: Vec<GptPartition> = load_json(table)?;
            let device = resolve_device(&reference, parent, &table)?;
            print_json(&DeviceOutput { reference, device }, cli.pretty)
        }
        Command::Match { param, devices } => {
            let reference = parse_param(&config, param)?;
            let candidates: Vec<Candidate> = load_json(devices)?;
            let device = match_device(&reference, &candidates)?;
            print_json(&DeviceOutput { reference, device }, cli.pretty)
        }
    }
}

fn parser_config(arch: Option<&str>, autodetect: bool) -> ParserConfig {
    let arch = arch.map(Arch::from_name).unwrap_or_else(Arch::current);
    ParserConfig::new(arch, autodetect)
}

fn parse_param(config: &ParserConfig, args: &ParamArgs) -> Result<DeviceRef> {
    Ok(parse_device_ref_with(config, &args.param, &args.value)?)
}

fn resolve_device(reference: &DeviceRef, parent: &str, table: &[GptPartition]) -> Result<String> {
    if matches!(reference, DeviceRef::FsUuid(_) | DeviceRef::FsLabel(_)) {
        bail!("{} is matched by filesystem metadata, not by partition table", reference);
    }
    let resolved = resolve_from_gpt_table(reference, parent, table);
    resolved
        .device_name()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("device {} not found on {}", reference, parent))
}

fn match_device(reference: &DeviceRef, candidates: &[Candidate]) -> Result<String> {
    if reference.is_gpt() {
        bail!("{} must be resolved against a partition table", reference);
    }
    let by_name = candidates
        .iter()
        .find(|candidate| reference.matches_name(&candidate.name))
        .map(|candidate| candidate.name.as_str());
    let by_info = || {
        find_by_fs_info(
            reference,
            candidates.iter().filter_map(|candidate| {
                candidate
                    .info
                    .as_ref()
                    .map(|info| (candidate.name.as_str(), info))
            }),
        )
    };
    by_name
        .or_else(by_info)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("device {} not found", reference))
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
