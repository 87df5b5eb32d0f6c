//! The `generate` command's argument surface.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "apollo-client-cli", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generates schema types and operation source files from config JSON.
    Generate(GenerateArgs),
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Path to the config JSON. Ignored when `--string` is also given.
    #[arg(long, default_value = "./apollo-codegen-config.json")]
    pub path: String,

    /// Inline config JSON; takes precedence over `--path` when both are given.
    #[arg(long)]
    pub string: Option<String>,

    /// Log at `debug` level instead of the default `warning`.
    #[arg(long)]
    pub verbose: bool,

    /// Download the schema before generating, per `schemaDownload` in config.
    #[arg(long = "fetch-schema")]
    pub fetch_schema: bool,

    /// Suppress the CLI/library version-pin mismatch check.
    #[arg(long = "ignore-version-mismatch")]
    pub ignore_version_mismatch: bool,
}
