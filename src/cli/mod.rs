//! CLI module for qcrag
//!
//! Provides command-line interface parsing for the qcrag-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qcrag - Quantum Computing RAG Server
///
/// Answers quantum computing questions from a curated Q&A corpus with a
/// hosted or custom language model.
#[derive(Parser, Debug)]
#[command(
    name = "qcrag-server",
    version,
    about = "qcrag - Quantum Computing RAG Server",
    long_about = "Retrieval-augmented question answering over a quantum computing Q&A corpus.\n\n\
                  Run without arguments to start the server, or use 'init-db' and 'ingest'\n\
                  to prepare the store first.",
    after_help = "EXAMPLES:\n    \
                  qcrag-server init-db                          # Create the pgvector schema\n    \
                  qcrag-server ingest data/claude.csv=claude    # Embed and store a corpus file\n    \
                  qcrag-server ask \"What is a qubit?\"           # One question from the terminal\n    \
                  qcrag-server                                  # Start the server (requires qcrag.toml)\n    \
                  qcrag-server --config my.toml                 # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "qcrag.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Answer a single question and print the result
    Ask {
        /// The question to answer
        question: String,

        /// Print the prompt sent to the model
        #[arg(long)]
        show_prompt: bool,
    },

    /// Create the Q&A table, extension and indexes
    InitDb {
        /// Drop and recreate the table
        #[arg(long)]
        reset: bool,
    },

    /// Embed CSV corpus files and store them
    ///
    /// Each argument is FILE or FILE=SOURCE. The source label defaults to
    /// the file name without extension.
    Ingest {
        /// Corpus files to load
        #[arg(required = true)]
        files: Vec<String>,

        /// Remove all stored rows before ingesting
        #[arg(long)]
        reset: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and required environment variables
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["qcrag-server"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("qcrag.toml"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "qcrag-server",
            "ask",
            "What is entanglement?",
            "--show-prompt",
            "--config",
            "other.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(
            cli.command,
            Some(Commands::Ask {
                question: "What is entanglement?".into(),
                show_prompt: true,
            })
        );
    }

    #[test]
    fn test_ingest_requires_files() {
        assert!(Cli::try_parse_from(["qcrag-server", "ingest"]).is_err());

        let cli =
            Cli::try_parse_from(["qcrag-server", "ingest", "a.csv=claude", "b.csv", "--reset"])
                .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Ingest {
                files: vec!["a.csv=claude".into(), "b.csv".into()],
                reset: true,
            })
        );
    }

    #[test]
    fn test_init_db_reset() {
        let cli = Cli::try_parse_from(["qcrag-server", "init-db", "--reset"]).unwrap();
        assert_eq!(cli.command, Some(Commands::InitDb { reset: true }));
    }
}
