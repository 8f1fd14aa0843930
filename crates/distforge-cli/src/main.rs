use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use distforge_cli::commands;
use distforge_cli::commands::upgrade_config::UpgradeConfigResult;
use distforge_cli::default_registries;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "distforge", version, about = "Distribution configuration tooling")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upgrade the configuration in the config directory to the current schema.
    UpgradeConfig {
        /// Directory containing dist-plugin.yml (or the legacy dist.yml).
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,
        /// Print the upgraded configuration instead of writing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Decode and validate the current configuration.
    Verify {
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,
    },
    /// List the configured products.
    Products {
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,
    },
    /// Print the POM for a product version.
    Pom {
        #[arg(long)]
        product: String,
        #[arg(long)]
        version: String,
        #[arg(long)]
        group_id: String,
        /// Packaging type, e.g. tgz. Omitted from the POM when not set.
        #[arg(long)]
        packaging: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::UpgradeConfig {
            config_dir,
            dry_run,
        } => {
            let registries = default_registries()?;
            let result = commands::upgrade_config::run(
                commands::upgrade_config::UpgradeConfigArgs {
                    config_dir,
                    dry_run,
                },
                &registries,
            )?;
            if let UpgradeConfigResult::Upgraded { path, text } = result {
                if dry_run {
                    print!("{}", text);
                } else {
                    let name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    println!("Upgraded configuration for {}", name);
                }
            }
            Ok(())
        }
        Command::Verify { config_dir } => {
            let registries = default_registries()?;
            let report = commands::verify::run(commands::verify::VerifyArgs { config_dir }, &registries)?;
            println!(
                "OK: {} products, {} plugin configurations",
                report.products, report.plugins
            );
            Ok(())
        }
        Command::Products { config_dir } => {
            for id in commands::products::run(commands::products::ProductsArgs { config_dir })? {
                println!("{}", id);
            }
            Ok(())
        }
        Command::Pom {
            product,
            version,
            group_id,
            packaging,
        } => {
            let pom = commands::pom::run(commands::pom::PomArgs {
                product,
                version,
                group_id,
                packaging,
            })?;
            print!("{}", pom);
            Ok(())
        }
    }
}
