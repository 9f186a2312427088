mod cache;
mod commands;
mod error;
mod logging;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use vaadinctl_platform::AppPaths;
use vaadinctl_types::ReleaseType;

use crate::commands::Context;
use crate::error::AppError;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "vaadinctl")]
#[command(version, about = "Inspect the installed Vaadin version and browse available releases")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available versions
    List {
        /// Extra release channels to show next to stable releases
        #[arg(long, value_delimiter = ',')]
        include: Vec<ReleaseType>,
        /// Ignore the cached version list
        #[arg(long)]
        refresh: bool,
        /// Portal library directory used to mark the installed version
        #[arg(long)]
        lib_dir: Option<PathBuf>,
    },

    /// Print the installed framework version
    Installed {
        /// Portal library directory to scan for archives
        #[arg(long)]
        lib_dir: Option<PathBuf>,
        /// Archives to inspect instead of scanning a directory
        archives: Vec<PathBuf>,
    },

    /// Download a version's distributable
    Download {
        version: String,
        /// Target directory
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Extra release channels the version may come from
        #[arg(long, value_delimiter = ',')]
        include: Vec<ReleaseType>,
        /// Ignore the cached version list
        #[arg(long)]
        refresh: bool,
    },
}

async fn run(cli: Cli, ctx: Context) -> Result<(), AppError> {
    match cli.command {
        Command::List {
            include,
            refresh,
            lib_dir,
        } => commands::list(&ctx, &include, refresh, lib_dir).await,
        Command::Installed { lib_dir, archives } => {
            commands::installed(&ctx, lib_dir, archives).await
        }
        Command::Download {
            version,
            dir,
            include,
            refresh,
        } => commands::download(&ctx, &version, dir, &include, refresh).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("error: {}", AppError::from(error));
            return ExitCode::FAILURE;
        }
    };
    let settings = Settings::load(&paths);
    logging::init_logging(
        &paths,
        cli.debug || settings.debug_logging,
        settings.max_log_size_bytes,
    );

    match run(cli, Context { paths, settings }).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use vaadinctl_types::ReleaseType;

    use super::{Cli, Command};

    #[test]
    fn include_accepts_comma_separated_channels() {
        let cli = Cli::try_parse_from(["vaadinctl", "list", "--include", "prerelease,nightly"])
            .expect("arguments should parse");

        let Command::List { include, .. } = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(include, vec![ReleaseType::Prerelease, ReleaseType::Nightly]);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert!(Cli::try_parse_from(["vaadinctl", "list", "--include", "weekly"]).is_err());
    }

    #[test]
    fn debug_flag_is_global() {
        let cli = Cli::try_parse_from(["vaadinctl", "installed", "--debug", "vaadin-server.jar"])
            .expect("arguments should parse");

        assert!(cli.debug);
        assert!(matches!(cli.command, Command::Installed { ref archives, .. } if archives.len() == 1));
    }
}
