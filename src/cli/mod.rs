pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "pstk")]
#[command(about = "Patchstack - transactional patch stacks on top of git branches")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Patch selection shared by push, pop and commit
#[derive(Debug, Clone, clap::Args)]
pub struct SelectionArgs {
    /// Patch names or ranges (a..b, a.., ..b)
    pub names: Vec<String>,

    /// Number of patches
    #[arg(long, short)]
    pub number: Option<usize>,

    /// All patches
    #[arg(long, short)]
    pub all: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a patch stack on the current branch
    Init {
        /// Replace an existing stack
        #[arg(long)]
        force: bool,
    },

    /// Record the staged changes as a new top patch
    New {
        /// Patch name
        name: String,

        /// Commit message (defaults to the patch name)
        #[arg(long, short)]
        message: Option<String>,
    },

    /// List the patches of the stack
    Series {
        /// Show the subject line of each patch
        #[arg(long, short)]
        description: bool,
    },

    /// Push unapplied patches onto the stack
    Push {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Pop applied patches off the stack
    Pop {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Fold patches into the base, making them permanent
    Commit {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Turn base commits back into patches
    Uncommit {
        /// Number of commits to uncommit
        #[arg(long, short, default_value_t = 1)]
        number: usize,
    },

    /// Replace the top patch with the staged changes
    Refresh,

    /// Move the stack onto another commit
    Rebase {
        /// Commit or branch to rebase onto
        revision: String,
    },

    /// Restore the stack state from before the last commands
    Undo {
        /// Number of commands to undo
        #[arg(long, short, default_value_t = 1)]
        number: usize,
    },

    /// Reapply undone commands
    Redo {
        /// Number of undos to revert
        #[arg(long, short, default_value_t = 1)]
        number: usize,
    },

    /// Check the stack record against the repository
    Validate {
        /// Move the branch to the recorded top if a command was interrupted
        #[arg(long)]
        repair: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., stack.allow_push_conflicts)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all configuration values
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            Commands::Init { force } => commands::init::run(force).await,
            Commands::New { name, message } => commands::new::run(name, message).await,
            Commands::Series { description } => commands::series::run(description).await,
            Commands::Push { selection } => commands::push::run(selection).await,
            Commands::Pop { selection } => commands::pop::run(selection).await,
            Commands::Commit { selection } => commands::commit::run(selection).await,
            Commands::Uncommit { number } => commands::uncommit::run(number).await,
            Commands::Refresh => commands::refresh::run().await,
            Commands::Rebase { revision } => commands::rebase::run(revision).await,
            Commands::Undo { number } => commands::undo::run_undo(number).await,
            Commands::Redo { number } => commands::undo::run_redo(number).await,
            Commands::Validate { repair } => commands::validate::run(repair).await,
            Commands::Config { action } => commands::config::run(action).await,
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr);

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
