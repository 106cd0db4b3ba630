use std::path::PathBuf;

use axum::http::Request;
use clap::{Parser, Subcommand};
use serde_json::json;

use flow_control::config::loader::load_config;
use flow_control::context::environment::{decode, encode, EnvironmentContext};
use flow_control::routing::RuleSet;

#[derive(Parser)]
#[command(name = "flow-control-cli")]
#[command(about = "Inspect flow-control tokens and rule sets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an environment into a header token
    Encode {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        version: Option<String>,
    },
    /// Decode a header token
    Decode { token: String },
    /// Load a config file and list valid and rejected rules
    Check { config: PathBuf },
    /// Evaluate a request against the rules of a config file
    Match {
        config: PathBuf,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(short, long, default_value = "/")]
        path: String,
        /// Request header as `name=value`; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { name, version } => {
            let ctx = EnvironmentContext::new(name, version.as_deref())?;
            println!("{}", encode(&ctx));
        }
        Commands::Decode { token } => match decode(&token) {
            Some(ctx) => println!("{}", serde_json::to_string_pretty(&ctx)?),
            None => {
                eprintln!("Error: token does not decode to an environment");
                std::process::exit(1);
            }
        },
        Commands::Check { config } => {
            let config = load_config(&config)?;
            let rules = RuleSet::from_config(&config.rules);
            let valid: Vec<_> = rules
                .rules()
                .iter()
                .map(|r| json!({ "name": r.name(), "environment": r.environment() }))
                .collect();
            let report = json!({ "valid": valid, "rejected": rules.rejected() });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Match {
            config,
            method,
            path,
            headers,
        } => {
            let config = load_config(&config)?;
            let rules = RuleSet::from_config(&config.rules);

            let mut builder = Request::builder().method(method.as_str()).uri(path.as_str());
            for header in &headers {
                let (name, value) = header
                    .split_once('=')
                    .ok_or_else(|| format!("header `{}` is not name=value", header))?;
                builder = builder.header(name.trim(), value.trim());
            }
            let request = builder.body(())?;

            let decision = rules.evaluate(&request);
            let report = json!({
                "rule": decision.rule().map(|r| r.name()),
                "environment": decision.environment(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
