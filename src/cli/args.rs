//! Command-line argument parsing for reconchain

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reconchain - chain security tools into dependency-ordered workflows
#[derive(Parser, Debug)]
#[command(name = "reconchain")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered tools and whether their executables are installed
    Tools {
        /// Only tools matching this keyword
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Check the executable a tool depends on
    Check {
        /// Tool name
        tool: String,
    },

    /// Execute one tool
    Execute {
        /// Tool name
        tool: String,

        /// Parameter as key=value (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Run one tool against many targets
    Batch {
        /// Tool name
        tool: String,

        /// Targets
        #[arg(required = true)]
        targets: Vec<String>,

        /// Worker pool size
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Infer parameters from free text and run the given tools
    Infer {
        /// Free-text request, e.g. "scan example.com"
        text: String,

        /// Tool to run (repeatable); without tools the target is analysed
        #[arg(short, long = "tool")]
        tools: Vec<String>,
    },

    /// Generate a phased attack plan
    Plan {
        target: String,

        #[arg(short, long = "objective")]
        objectives: Vec<String>,
    },

    /// Build and execute an attack chain
    Chain {
        /// Target URL, domain, IP or CIDR
        target: String,

        /// Target type (url, domain, ip, network); detected when omitted
        #[arg(short = 't', long = "type", default_value = "auto")]
        target_type: String,

        /// Objective (recon, vuln, web, network, exploit, full)
        #[arg(short, long = "objective")]
        objectives: Vec<String>,

        /// Only build the chain and print suggested first steps
        #[arg(long)]
        dry_run: bool,

        /// Stream events while the chain runs
        #[arg(short, long)]
        watch: bool,
    },

    /// Display current configuration
    Config,
}

/// Split `key=value` pairs
pub fn parse_params(pairs: &[String]) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    let mut params = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Empty parameter name in '{}'", pair));
        }
        // JSON literals (numbers, arrays, booleans) pass through typed
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_chain_command() {
        let args = Args::parse_from([
            "reconchain", "chain", "example.com", "-t", "domain", "-o", "recon", "--watch",
        ]);
        match args.command {
            Commands::Chain {
                target,
                target_type,
                objectives,
                watch,
                dry_run,
            } => {
                assert_eq!(target, "example.com");
                assert_eq!(target_type, "domain");
                assert_eq!(objectives, vec!["recon"]);
                assert!(watch);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["target=10.0.0.1".into(), "ports=[22,80]".into()]).unwrap();
        assert_eq!(params["target"], "10.0.0.1");
        assert!(params["ports"].is_array());
        assert!(parse_params(&["novalue".into()]).is_err());
        assert!(parse_params(&["=x".into()]).is_err());
    }
}
