//! aicommit - CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aicommit::config::{self, CliOverrides};
use aicommit::console::{Console, TerminalConsole};
use aicommit::generate::{GenerateOptions, GenerateOutcome, Generator};
use aicommit::llm::DefaultAdapterFactory;
use aicommit::monitor::{GitMonitorHost, Supervisor};
use aicommit::selection::TerminalSelectionUi;

/// Log filter variable, e.g. `AICOMMIT_LOG=aicommit=debug`.
const LOG_ENV: &str = "AICOMMIT_LOG";

/// Generate commit messages with several AI backends and pick one.
#[derive(Parser, Debug)]
#[command(name = "aicommit")]
#[command(about = "Generate commit messages with several AI backends and pick one")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Locale for generated messages (e.g. en, ko, ja)
    #[arg(short, long)]
    locale: Option<String>,

    /// Number of messages to request from each backend (1-5)
    #[arg(short, long)]
    generate: Option<u8>,

    /// Files to leave out of the diff (repeatable)
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<String>,

    /// Stage all tracked modifications first
    #[arg(short, long)]
    all: bool,

    /// Commit message convention: conventional or gitmoji
    #[arg(short = 't', long = "type")]
    commit_type: Option<String>,

    /// Commit without asking for confirmation
    #[arg(short = 'y', long)]
    confirm: bool,

    /// Extra instructions passed to every backend
    #[arg(short, long)]
    prompt: Option<String>,

    /// Print the chosen message instead of committing
    #[arg(long)]
    dry_run: bool,

    /// Watch for new commits and review each one
    #[arg(short, long)]
    watch: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read or change configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the values of one or more keys
    Get { keys: Vec<String> },
    /// Set one or more key=value pairs
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            locale: self.locale.clone(),
            generate: self.generate,
            prompt: self.prompt.clone(),
            exclude: self.exclude.clone(),
            commit_type: self.commit_type.clone(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_config(action: ConfigAction) -> Result<()> {
    let path = config::config_path()?;
    match action {
        ConfigAction::Get { keys } => {
            for key in keys {
                let value = config::get_value(&path, &key)?;
                println!("{}={}", key, value.unwrap_or_default());
            }
        }
        ConfigAction::Set { pairs } => {
            let pairs = pairs
                .iter()
                .map(|p| config::parse_assignment(p))
                .collect::<Result<Vec<_>, _>>()?;
            config::set_values(&path, &pairs)
                .with_context(|| format!("Failed to update {}", path.display()))?;
            println!("✔ Updated {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let mut cli = Cli::parse();

    if let Some(Command::Config { action }) = cli.command.take() {
        return run_config(action);
    }

    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let console: Arc<dyn Console> = Arc::new(TerminalConsole::new());
    let ui = Arc::new(TerminalSelectionUi::new());
    let factory = Arc::new(DefaultAdapterFactory::new());

    if cli.watch {
        let host = GitMonitorHost::new(cwd, cli.overrides(), Arc::clone(&console), ui, factory);
        let supervisor = Supervisor::new(Arc::new(host), console);
        supervisor
            .run(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
        return Ok(());
    }

    let config = config::load(&cli.overrides())?;
    let generator = Generator {
        console: Arc::clone(&console),
        ui,
        factory,
    };
    let options = GenerateOptions {
        all: cli.all,
        yes: cli.confirm,
        dry_run: cli.dry_run,
    };

    // All-failed and no-backend runs exit non-zero here; watch mode keeps going.
    if let GenerateOutcome::Committed { id, .. } = generator.run(&cwd, &config, options).await? {
        tracing::debug!("Created commit {}", id);
    }
    Ok(())
}
