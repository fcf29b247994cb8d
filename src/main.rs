//! Command-line front end for the vcd_provider library.
//!
//! ## Usage
//!
//! 1. Create a `.env` file with your configuration (see the library docs)
//! 2. Run one of:
//!
//! ```text
//! vcd-provider resources
//! vcd-provider create vcd_disk --attrs disk.json
//! vcd-provider read vcd_disk scratch
//! echo '{"name":"scratch","size":"20GB"}' | vcd-provider update vcd_disk scratch --attrs -
//! vcd-provider delete vcd_disk scratch
//! vcd-provider data vcd_storage_profile
//! ```
//!
//! Results are printed as JSON on stdout, logs go to stderr
//! (`RUST_LOG=vcd_provider=debug` for task polling details).

#![allow(clippy::print_stdout)] // The CLI prints its results

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vcd_provider::{ResourceSchema, VcdClientConfig, VcdProvider};

#[derive(Debug, Parser)]
#[command(name = "vcd-provider", version, about = "Manage vCloud Director resources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List resource and data source types with their schemas.
    Resources,
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Subcommands that talk to vCD.
#[derive(Debug, Subcommand)]
enum RemoteCommand {
    /// Create a resource.
    Create {
        /// Resource type, e.g. `vcd_disk`.
        kind: String,
        /// JSON object of attributes, from a file or `-` for stdin.
        #[arg(long)]
        attrs: PathBuf,
    },
    /// Read a resource by id.
    Read { kind: String, id: String },
    /// Update a resource in place.
    Update {
        kind: String,
        id: String,
        #[arg(long)]
        attrs: PathBuf,
    },
    /// Delete a resource.
    Delete { kind: String, id: String },
    /// Read a data source.
    Data {
        kind: String,
        #[arg(long)]
        attrs: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Catalog {
    resources: Vec<ResourceSchema>,
    data_sources: Vec<ResourceSchema>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vcd_provider=info,warn")),
        )
        .init();

    let command = match Cli::parse().command {
        Command::Resources => return print_json(&schema_catalog()),
        Command::Remote(command) => command,
    };

    let cfg = VcdClientConfig::from_env()?;
    tracing::debug!(config = ?cfg, "configuration loaded");
    let provider = VcdProvider::connect(cfg).await?;

    let result = run(&provider, command).await;

    if let Err(e) = provider.client().disconnect().await {
        tracing::warn!(error = %e, "failed to close the vCD session");
    }
    result
}

async fn run(provider: &VcdProvider, command: RemoteCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        RemoteCommand::Create { kind, attrs } => {
            let data = provider.create(&kind, load_attrs(&attrs)?).await?;
            print_json(&data)
        }
        RemoteCommand::Read { kind, id } => {
            let data = provider.read(&kind, &id).await?;
            if !data.has_id() {
                tracing::warn!(resource = %kind, %id, "resource does not exist");
            }
            print_json(&data)
        }
        RemoteCommand::Update { kind, id, attrs } => {
            let data = provider.update(&kind, &id, load_attrs(&attrs)?).await?;
            print_json(&data)
        }
        RemoteCommand::Delete { kind, id } => {
            provider.delete(&kind, &id).await?;
            print_json(&serde_json::json!({"deleted": id}))
        }
        RemoteCommand::Data { kind, attrs } => {
            let attrs = attrs.as_deref().map(load_attrs).transpose()?.unwrap_or_default();
            let data = provider.read_data_source(&kind, attrs).await?;
            print_json(&data)
        }
    }
}

fn schema_catalog() -> Catalog {
    Catalog {
        resources: VcdProvider::resources().iter().map(|r| r.schema()).collect(),
        data_sources: VcdProvider::data_sources().iter().map(|d| d.schema()).collect(),
    }
}

/// Read a JSON object from a file, or stdin for `-`.
///
/// The output of `read` is accepted too: its `attributes` are used.
fn load_attrs(path: &std::path::Path) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };

    match serde_json::from_str(&raw)? {
        Value::Object(mut map) => match map.remove("attributes") {
            Some(Value::Object(inner)) if map.contains_key("id") => Ok(inner),
            Some(other) => {
                map.insert("attributes".to_string(), other);
                Ok(map)
            }
            None => Ok(map),
        },
        other => Err(format!("attributes must be a JSON object, got {other}").into()),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn resources_needs_no_connection_arguments() {
        let cli = Cli::try_parse_from(["vcd-provider", "resources"]).unwrap();
        assert!(matches!(cli.command, Command::Resources));
    }

    #[test]
    fn remote_subcommands_parse() {
        let cli = Cli::try_parse_from(["vcd-provider", "read", "vcd_disk", "scratch"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Remote(RemoteCommand::Read { ref kind, ref id }) if kind == "vcd_disk" && id == "scratch"
        ));

        let cli = Cli::try_parse_from(["vcd-provider", "data", "vcd_org"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Remote(RemoteCommand::Data { attrs: None, .. })
        ));

        assert!(Cli::try_parse_from(["vcd-provider", "create", "vcd_disk"]).is_err());
    }
}
