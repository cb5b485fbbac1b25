mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use browser_ai_providers::AuthMode;
use commands::Overrides;

#[derive(Parser)]
#[command(name = "browser-ai")]
#[command(about = "Natural-language browser automation over MCP", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short = 'v', long = "debug", alias = "verbose", global = true)]
    debug: bool,

    /// Playwright MCP package spec or local path (replaces the default package)
    #[arg(long, global = true)]
    playwright_path: Option<String>,

    /// Model to use (overrides config provider.model)
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the `browser_ai` tool over MCP on stdio (default)
    Serve,

    /// Authenticate with an Anthropic account via OAuth
    Auth {
        #[arg(long, value_enum, default_value_t = ModeArg::Max)]
        mode: ModeArg,
    },

    /// Remove the stored credential
    Logout,

    /// Execute a single command and print the result as JSON
    Run {
        /// Natural-language command
        #[arg(short, long)]
        message: String,

        /// Current or target URL
        #[arg(long)]
        url: Option<String>,

        /// Session ID of a previous automation
        #[arg(long)]
        session: Option<String>,
    },

    /// List the automation backend's capabilities
    Tools,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Claude Pro/Max subscription
    Max,
    /// Anthropic Console account
    Console,
}

impl From<ModeArg> for AuthMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Max => AuthMode::Max,
            ModeArg::Console => AuthMode::Console,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the MCP protocol in serve mode, so logs always go to stderr.
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let overrides = Overrides {
        playwright_path: cli.playwright_path,
        model: cli.model,
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            commands::serve::run(&overrides).await?;
        }
        Commands::Auth { mode } => {
            commands::auth::login(mode.into()).await?;
        }
        Commands::Logout => {
            commands::auth::logout()?;
        }
        Commands::Run {
            message,
            url,
            session,
        } => {
            commands::run_cmd::run(&overrides, &message, url, session).await?;
        }
        Commands::Tools => {
            commands::tools_cmd::list(&overrides).await?;
        }
    }

    Ok(())
}
