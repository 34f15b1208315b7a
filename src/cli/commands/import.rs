//! Inspect, stage and run commands

use super::{CLI_USER, Workspace, content_store};
use crate::cli::error::CliError;
use crate::export::{ReportFormat, ReportRenderer};
use crate::import::sample_keys;
use crate::importer::{ImportRequest, Importer, UploadSummary};
use crate::models::{ImportResult, Severity};
use crate::platform::MemoryNoticeSink;
use crate::validation::{UploadedFile, decode_records};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Arguments for the inspect command
#[derive(Debug, Clone)]
pub struct InspectArgs {
    pub input: PathBuf,
}

/// Arguments for the stage command
#[derive(Debug, Clone)]
pub struct StageArgs {
    pub workspace: PathBuf,
    pub input: PathBuf,
    pub record_type: String,
    /// Destination types the in-memory host offers
    pub record_types: Vec<String>,
    /// Print the upload summary as JSON
    pub json: bool,
}

/// Arguments for the run command
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub workspace: PathBuf,
    pub token: String,
    pub record_type: String,
    /// Mapping submission, JSON or YAML
    pub mapping: PathBuf,
    /// Where to write the created records as JSON
    pub output: Option<PathBuf>,
    pub format: ReportFormat,
    pub record_types: Vec<String>,
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))
}

/// Load a mapping submission from a `.json`, `.yaml` or `.yml` file.
pub fn load_mapping(path: &Path) -> Result<Value, CliError> {
    let bytes = read_file(path)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_slice(&bytes)
            .map_err(|e| CliError::InvalidMapping(path.to_path_buf(), e.to_string())),
        _ => serde_json::from_slice(&bytes)
            .map_err(|e| CliError::InvalidMapping(path.to_path_buf(), e.to_string())),
    }
}

/// Handle the inspect command: print the record count and mappable keys.
pub fn handle_inspect(args: &InspectArgs) -> Result<Vec<String>, CliError> {
    let bytes = read_file(&args.input)?;
    let records = decode_records(&bytes)?;
    let keys = sample_keys(&records);

    println!("Records: {}", records.len());
    println!("Keys ({}):", keys.len());
    for key in &keys {
        println!("  {}", key);
    }
    Ok(keys)
}

/// Handle the stage command: validate the file and stage it on disk.
pub fn handle_stage(args: &StageArgs) -> Result<UploadSummary, CliError> {
    let workspace = Workspace::load(&args.workspace)?;
    let store = content_store(&args.record_types);
    let staging = workspace.staging_store();
    let notices = MemoryNoticeSink::new();
    let importer = Importer::new(workspace.config.clone(), &store, &staging, &notices);

    if !args.input.exists() {
        return Err(CliError::FileNotFound(args.input.clone()));
    }
    let upload = UploadedFile::from_path(&args.input)
        .map_err(|e| CliError::FileReadError(args.input.clone(), e.to_string()))?;
    let summary = importer.validate_upload(CLI_USER, &upload, &args.record_type)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        println!("{}", json);
    } else {
        println!(
            "Staged {} records from {} as {}",
            summary.record_count, summary.file_name, summary.record_type_label
        );
        println!("Keys: {}", summary.keys.join(", "));
        println!("Token: {}", summary.staging_token);
    }
    Ok(summary)
}

/// Handle the run command: import staged records with a mapping file.
pub fn handle_run(args: &RunArgs) -> Result<ImportResult, CliError> {
    let workspace = Workspace::load(&args.workspace)?;
    let store = content_store(&args.record_types);
    let staging = workspace.staging_store();
    let notices = MemoryNoticeSink::new();
    let importer = Importer::new(workspace.config.clone(), &store, &staging, &notices);

    let submission = load_mapping(&args.mapping)?;
    let mapping = importer.sanitize_mapping(&submission);
    if mapping.is_empty() {
        tracing::warn!("Mapping in {} maps no fields", args.mapping.display());
    }

    let request = ImportRequest::new(&args.token, &args.record_type);
    let result = importer.process_import(CLI_USER, &request, &mapping)?;

    if let Some(output) = &args.output {
        let records = serde_json::to_string_pretty(&store.records())
            .map_err(|e| CliError::FileWriteError(output.clone(), e.to_string()))?;
        std::fs::write(output, records)
            .map_err(|e| CliError::FileWriteError(output.clone(), e.to_string()))?;
    }

    let report = ReportRenderer::new().render(&result, args.format)?;
    print!("{}", report);
    for notice in importer.drain_notices(CLI_USER) {
        if notice.severity == Severity::Success {
            println!("{}", notice.message);
        } else {
            eprintln!("{}: {}", notice.severity, notice.message);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::StagingError;
    use crate::import::ProcessError;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn stage_args(dir: &TempDir, input: PathBuf) -> StageArgs {
        StageArgs {
            workspace: dir.path().to_path_buf(),
            input,
            record_type: "post".to_string(),
            record_types: Vec::new(),
            json: false,
        }
    }

    #[test]
    fn test_inspect_lists_first_record_keys() {
        let dir = TempDir::new().unwrap();
        let input = write(dir.path(), "items.json", r#"[{"a": 1, "b": 2}, {"c": 3}]"#);

        let keys = handle_inspect(&InspectArgs { input }).unwrap();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_inspect_missing_file() {
        let result = handle_inspect(&InspectArgs {
            input: PathBuf::from("/nonexistent/items.json"),
        });
        assert!(matches!(result, Err(CliError::FileNotFound(_))));
    }

    #[test]
    fn test_stage_then_run_across_invocations() {
        let dir = TempDir::new().unwrap();
        let input = write(
            dir.path(),
            "posts.json",
            r#"[{"name": "One", "sku": "A"}, {"sku": "B"}, {"name": "Three"}]"#,
        );
        let mapping = write(
            dir.path(),
            "mapping.yaml",
            "standard:\n  title: name\ncustom:\n  - json_key: sku\n    meta_key: ref\n",
        );
        let output = dir.path().join("created.json");

        let summary = handle_stage(&stage_args(&dir, input)).unwrap();
        assert_eq!(summary.record_count, 3);

        let run = RunArgs {
            workspace: dir.path().to_path_buf(),
            token: summary.staging_token.to_string(),
            record_type: "post".to_string(),
            mapping,
            output: Some(output.clone()),
            format: ReportFormat::Text,
            record_types: Vec::new(),
        };
        let result = handle_run(&run).unwrap();
        assert_eq!(result.imported, 2);
        assert_eq!(result.skipped, 1);

        let created: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(created.as_array().map(Vec::len), Some(2));
        assert_eq!(created[0]["draft"]["meta"]["ref"], "A");

        let again = handle_run(&run);
        assert!(matches!(
            again,
            Err(CliError::Process(ProcessError::Staging(StagingError::Expired)))
        ));
    }

    #[test]
    fn test_stage_rejects_unknown_type() {
        let dir = TempDir::new().unwrap();
        let input = write(dir.path(), "posts.json", r#"[{"name": "One"}]"#);
        let mut args = stage_args(&dir, input);
        args.record_type = "product".to_string();

        assert!(matches!(handle_stage(&args), Err(CliError::Validation(_))));

        args.record_types = vec!["product".to_string()];
        assert!(handle_stage(&args).is_ok());
    }

    #[test]
    fn test_load_mapping_json_and_invalid() {
        let dir = TempDir::new().unwrap();
        let good = write(dir.path(), "m.json", r#"{"standard": {"title": "name"}}"#);
        assert_eq!(load_mapping(&good).unwrap()["standard"]["title"], "name");

        let bad = write(dir.path(), "m2.json", "{not json");
        assert!(matches!(load_mapping(&bad), Err(CliError::InvalidMapping(..))));
    }
}
