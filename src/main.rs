//! gossamer inspection CLI entry point.

mod cli;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Command};
use gossamer::{Error, convert, describe, parse_type, satisfaction, satisfaction_report};
use gossamer_runtime::RuntimeConfig;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GOSSAMER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, Error> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::from_env()?);
    };
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(RuntimeConfig::from_json(&text)?)
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");
    gossamer_runtime::init(config);

    match cli.command {
        Command::Describe { ty, against, json } => {
            let ty = parse_type(&ty)?;
            let description = describe(ty);
            let iface = against.as_deref().map(parse_type).transpose()?;
            if json {
                let mut out = description.to_json();
                if let Some(iface) = iface {
                    out["against"] = serde_json::json!({
                        "interface": iface.string(),
                        "missing": satisfaction(ty, iface)?,
                    });
                }
                println!("{out:#}");
            } else {
                print!("{description}");
                if let Some(iface) = iface {
                    println!("{}", satisfaction_report(ty, iface)?);
                }
            }
        }
        Command::Convert { from, to, literal } => {
            println!("{}", convert(parse_type(&from)?, parse_type(&to)?, &literal)?);
        }
    }
    Ok(())
}
