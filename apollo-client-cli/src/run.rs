//! Implements the `generate` command's documented behavior, up to the
//! point where it would hand off to the external `GraphQLCompiler`/`IR`
//! collaborators this crate does not implement.

use std::path::Path;

use apollo_client_codegen::CodegenConfig;

use crate::cli::GenerateArgs;
use crate::error::CliError;
use crate::lockfile;

/// Resolves, parses, and validates `args` against the documented contract,
/// returning the parsed config on success.
///
/// `--string` takes precedence over `--path`; `--fetch-schema` requires a
/// `schemaDownload` block; `--ignore-version-mismatch` skips the
/// `Cargo.lock`-pinned version check against this binary's own version.
pub fn run(args: &GenerateArgs, project_root: &Path) -> Result<CodegenConfig, CliError> {
    init_logging(args.verbose);

    let config_json = match &args.string {
        Some(inline) => inline.clone(),
        None => std::fs::read_to_string(&args.path).map_err(|source| CliError::ConfigFileNotReadable {
            path: args.path.clone(),
            source,
        })?,
    };
    let config: CodegenConfig = serde_json::from_str(&config_json)?;

    if args.fetch_schema && config.schema_download.is_none() {
        return Err(CliError::MissingSchemaDownloadConfig);
    }
    if args.fetch_schema {
        tracing::info!("schemaDownload configured; handing off to the schema download collaborator");
    }

    if !args.ignore_version_mismatch {
        check_version_pin(project_root)?;
    }

    tracing::debug!(schema_namespace = %config.schema_namespace, "config parsed");
    Ok(config)
}

fn check_version_pin(project_root: &Path) -> Result<(), CliError> {
    let Some(lockfile_contents) = lockfile::read_project_lockfile(project_root).unwrap_or(None) else {
        return Ok(());
    };
    let Some(pinned) = lockfile::pinned_version(&lockfile_contents, "apollo-client-core") else {
        return Ok(());
    };
    let cli_version = env!("CARGO_PKG_VERSION");
    if pinned != cli_version {
        return Err(CliError::VersionMismatch {
            cli: cli_version.to_string(),
            library: pinned,
        });
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Maps a `generate` outcome to the documented process exit code: `0` on
/// success, non-zero on any error.
pub fn exit_code<T>(result: &Result<T, CliError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn args(path: &str) -> GenerateArgs {
        GenerateArgs {
            path: path.to_string(),
            string: None,
            verbose: false,
            fetch_schema: false,
            ignore_version_mismatch: true,
        }
    }

    fn write_temp_config(name: &str, json: &serde_json::Value) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();
        path
    }

    fn sample_config_json() -> serde_json::Value {
        serde_json::json!({
            "schemaNamespace": "MyAPI",
            "input": { "schemaPath": "schema.graphqls" },
            "output": {
                "schemaTypes": { "path": "Generated", "moduleType": "swiftPackage" }
            },
            "options": {
                "deprecatedEnumCases": "include",
                "warningsOnDeprecatedUsage": "include",
                "schemaDocumentation": "include",
                "conversionStrategies": { "enumCases": "camelCase" },
                "selectionSetInitializers": [],
                "operationDocumentFormat": "document"
            }
        })
    }

    #[test]
    fn parses_config_from_path() {
        let path = write_temp_config("apollo-client-cli-test-path.json", &sample_config_json());
        let config = run(&args(path.to_str().unwrap()), &std::env::temp_dir()).unwrap();
        assert_eq!(config.schema_namespace, "MyAPI");
    }

    #[test]
    fn inline_string_takes_precedence_over_path() {
        let mut on_disk = sample_config_json();
        on_disk["schemaNamespace"] = serde_json::json!("FromDisk");
        let path = write_temp_config("apollo-client-cli-test-precedence.json", &on_disk);

        let mut inline = sample_config_json();
        inline["schemaNamespace"] = serde_json::json!("FromString");

        let mut cli_args = args(path.to_str().unwrap());
        cli_args.string = Some(inline.to_string());

        let config = run(&cli_args, &std::env::temp_dir()).unwrap();
        assert_eq!(config.schema_namespace, "FromString");
    }

    #[test]
    fn fetch_schema_without_config_block_fails_with_documented_message() {
        let mut cli_args = args("unused.json");
        cli_args.string = Some(sample_config_json().to_string());
        cli_args.fetch_schema = true;

        let error = run(&cli_args, &std::env::temp_dir()).unwrap_err();
        assert_eq!(error.to_string(), "Missing schema download configuration.");
        assert_eq!(exit_code(&Err::<(), _>(error)), 1);
    }

    #[test]
    fn fetch_schema_with_config_block_succeeds() {
        let mut config = sample_config_json();
        config["schemaDownload"] = serde_json::json!({ "endpoint": "https://example.test/graphql" });

        let mut cli_args = args("unused.json");
        cli_args.string = Some(config.to_string());
        cli_args.fetch_schema = true;

        assert!(run(&cli_args, &std::env::temp_dir()).is_ok());
    }

    #[test]
    fn missing_config_file_is_reported_not_panicked() {
        let error = run(&args("/nonexistent/apollo-codegen-config.json"), &std::env::temp_dir()).unwrap_err();
        assert!(matches!(error, CliError::ConfigFileNotReadable { .. }));
    }

    #[test]
    fn version_mismatch_is_reported_when_not_ignored() {
        let dir = std::env::temp_dir().join("apollo-client-cli-version-mismatch-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Cargo.lock"),
            "[[package]]\nname = \"apollo-client-core\"\nversion = \"999.0.0\"\n",
        )
        .unwrap();

        let path = write_temp_config("apollo-client-cli-test-version-mismatch.json", &sample_config_json());
        let mut cli_args = args(path.to_str().unwrap());
        cli_args.ignore_version_mismatch = false;

        let error = run(&cli_args, &dir).unwrap_err();
        assert!(matches!(error, CliError::VersionMismatch { .. }));
    }

    #[test]
    fn ignore_version_mismatch_skips_the_check() {
        let dir = std::env::temp_dir().join("apollo-client-cli-version-mismatch-ignored-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Cargo.lock"),
            "[[package]]\nname = \"apollo-client-core\"\nversion = \"999.0.0\"\n",
        )
        .unwrap();

        let path = write_temp_config("apollo-client-cli-test-version-mismatch-ignored.json", &sample_config_json());
        let mut cli_args = args(path.to_str().unwrap());
        cli_args.ignore_version_mismatch = true;

        assert!(run(&cli_args, &dir).is_ok());
    }
}
