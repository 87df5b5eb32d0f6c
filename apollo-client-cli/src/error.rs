//! The CLI-only error kinds (`versionMismatch`, `missingSchemaDownloadConfig`),
//! plus wrapping for config I/O failures.

use derive_more::{Display, From};

/// Errors surfaced by the `generate` command.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// Neither `--path` nor `--string` named a readable config file.
    #[display("failed to read config file {path}: {source}")]
    ConfigFileNotReadable {
        path: String,
        source: std::io::Error,
    },

    /// The config JSON did not match the documented schema.
    #[display("failed to parse config JSON: {_0}")]
    #[from]
    InvalidConfig(serde_json::Error),

    /// `--fetch-schema` was given but the config carries no
    /// `schemaDownload` block.
    #[display("Missing schema download configuration.")]
    MissingSchemaDownloadConfig,

    /// The CLI binary's own version does not match the `apollo-client-core`
    /// version pinned in the project's lockfile, and
    /// `--ignore-version-mismatch` was not given.
    #[display("apollo-client-cli {cli} does not match the apollo-client-core version pinned in Cargo.lock ({library})")]
    VersionMismatch { cli: String, library: String },
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigFileNotReadable { source, .. } => Some(source),
            Self::InvalidConfig(err) => Some(err),
            Self::MissingSchemaDownloadConfig | Self::VersionMismatch { .. } => None,
        }
    }
}
