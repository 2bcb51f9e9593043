//! Terraform Provider for Cloud Avenue
//!
//! Started by Terraform with no arguments, the binary serves the plugin
//! protocol. The `schema` and `docs` subcommands export the provider schema
//! for tooling and the registry.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use terraform_provider_cloudavenue::{docs, server, CloudAvenueProvider};

#[derive(Parser)]
#[command(name = "terraform-provider-cloudavenue")]
#[command(author, version, long_about = None)]
#[command(about = "Terraform provider for Orange Business Cloud Avenue")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the plugin protocol (default, run by Terraform)
    Serve,

    /// Print the provider schema as JSON
    Schema,

    /// Generate markdown documentation
    Docs {
        /// Output directory
        #[arg(short, long, default_value = "docs")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout belongs to the handshake
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let cookie = std::env::var(server::MAGIC_COOKIE_KEY).ok();
            if let Err(e) = server::check_magic_cookie(cookie.as_deref()) {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
            info!("Starting Cloud Avenue Terraform Provider");
            server::serve(CloudAvenueProvider::new()).await
        }
        Commands::Schema => serde_json::to_string_pretty(&docs::schema_json())
            .map(|json| println!("{}", json))
            .map_err(Into::into),
        Commands::Docs { out } => docs::write_docs(&out).map(|pages| {
            println!("Wrote {} pages to {}", pages.len(), out.display());
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
