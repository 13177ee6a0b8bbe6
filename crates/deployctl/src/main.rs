//! `deployctl` drives modules described in `deploy.yaml` onto their servers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use deploy_orchestration::{DeploymentMode, ModuleType};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "deployctl")]
#[command(about = "Deploy packaged modules onto application servers")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "deploy.yaml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// List configured servers
    Servers {
        /// Output format (table or json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Deploy a module
    Deploy {
        /// Module name
        module: String,

        /// Run mode (run, debug or profile)
        #[arg(short, long, default_value = "run")]
        mode: DeploymentMode,

        /// Redeploy even if the module is up to date
        #[arg(short, long)]
        force: bool,

        /// Path appended to the client URL
        #[arg(long)]
        url_part: Option<String>,
    },

    /// Undeploy a module
    Undeploy {
        /// Module name
        module: String,

        /// Start the server if it is not running
        #[arg(long)]
        start_server: bool,
    },

    /// Regenerate the deploy script of a server
    SyncScript {
        /// Server id
        server: String,

        /// Script location
        #[arg(short, long)]
        output: PathBuf,

        /// Module type the script targets
        #[arg(long, default_value = "war")]
        module_type: ModuleType,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.config, cli.verbose);

    smol::block_on(async {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config).await,
            Commands::Servers { format } => commands::servers::run(&cli.config, &format).await,
            Commands::Deploy {
                module,
                mode,
                force,
                url_part,
            } => commands::deploy::run(&cli.config, &module, mode, force, url_part).await,
            Commands::Undeploy {
                module,
                start_server,
            } => commands::undeploy::run(&cli.config, &module, start_server).await,
            Commands::SyncScript {
                server,
                output,
                module_type,
            } => commands::sync_script::run(&cli.config, &server, &output, module_type).await,
        }
    })
}
