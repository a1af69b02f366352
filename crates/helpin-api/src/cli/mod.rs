//! CLI command definitions for the `helpin` binary.

pub mod quota;
pub mod token;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// AI tutor chat gateway.
#[derive(Parser)]
#[command(name = "helpin", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "HELPIN_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1", env = "HELPIN_HOST")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, default_value_t = 3000, env = "HELPIN_PORT")]
        port: u16,
    },

    /// Show the quota limits a server started now would enforce.
    Quota {
        /// Output machine-readable JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Sign a bearer credential for local testing.
    Token {
        /// Value of the `userId` claim.
        #[arg(long)]
        user_id: String,

        /// Lifetime of the token in hours.
        #[arg(long, default_value_t = 24)]
        ttl_hours: u32,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["helpin", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 3000);
            }
            _ => panic!("expected serve"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["helpin", "quota", "-vv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Quota { json } => assert!(json),
            _ => panic!("expected quota"),
        }
    }

    #[test]
    fn test_quota_takes_no_principal() {
        assert!(Cli::try_parse_from(["helpin", "quota", "--principal", "u1"]).is_err());
    }

    #[test]
    fn test_token_requires_user_id() {
        assert!(Cli::try_parse_from(["helpin", "token"]).is_err());
    }
}
