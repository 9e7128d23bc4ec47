//! File loading for the ontology, the schema bundle and workflows.
//!
//! Every read runs on a helper thread bounded by the configured timeout. A
//! read that fails or times out is reported, never retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use serde_json::Value;

use crate::config::ValidatorConfig;
use crate::context::ValidationContext;
use crate::error::LoadError;
use crate::parse::{DocumentFormat, parse_value};

const SCHEMA_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Read a file, giving up after `timeout`.
pub fn read_to_string_with_timeout(path: &Path, timeout: Duration) -> Result<String, LoadError> {
    let (tx, rx) = mpsc::channel();
    let owned = path.to_path_buf();
    std::thread::spawn(move || {
        let _ = tx.send(std::fs::read_to_string(&owned));
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        }),
        Err(_) => Err(LoadError::Timeout {
            path: path.to_path_buf(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Read and parse a YAML or JSON document.
pub fn load_document(path: &Path, timeout: Duration) -> Result<Value, LoadError> {
    let text = read_to_string_with_timeout(path, timeout)?;
    parse_value(&text, DocumentFormat::from_path(path))
        .map_err(|e| LoadError::Document(format!("{}: {e}", path.display())))
}

/// Collect schema documents from files and directories. Directory entries
/// are taken in name order; only `.json`, `.yaml` and `.yml` files are read.
/// The document id is the file name.
pub fn load_schema_bundle(
    paths: &[PathBuf],
    timeout: Duration,
) -> Result<Vec<(String, Value)>, LoadError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_schema_extension(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let id = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let document = load_document(&file, timeout)?;
        tracing::debug!(id = %id, "loaded schema document");
        documents.push((id, document));
    }
    Ok(documents)
}

fn has_schema_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SCHEMA_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Build a validation context from configuration.
pub fn load_context(config: &ValidatorConfig) -> Result<Arc<ValidationContext>, LoadError> {
    let timeout = config.load_timeout();
    let ontology_path = config.ontology.as_ref().ok_or_else(|| LoadError::Config {
        path: PathBuf::from(crate::config::DEFAULT_CONFIG_FILE),
        reason: "no ontology file configured".to_string(),
    })?;

    let mut builder = ValidationContext::builder()
        .ontology_value(load_document(ontology_path, timeout)?)
        .checkpoint_capabilities(config.safety.checkpoint_capabilities.clone());
    for (id, document) in load_schema_bundle(&config.schemas, timeout)? {
        builder = builder.schema_document(id, document);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_yaml_and_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("a.yaml");
        std::fs::write(&yaml, "x: 1\n").unwrap();
        let json = dir.path().join("b.json");
        std::fs::write(&json, "{\"y\": 2}").unwrap();
        let timeout = Duration::from_secs(5);
        assert_eq!(load_document(&yaml, timeout).unwrap()["x"], 1);
        assert_eq!(load_document(&json, timeout).unwrap()["y"], 2);
    }

    #[test]
    fn bundle_directory_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [("z.json", "{}"), ("a.yaml", "{}"), ("notes.txt", "hi")] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            write!(f, "{body}").unwrap();
        }
        let docs = load_schema_bundle(&[dir.path().to_path_buf()], Duration::from_secs(5)).unwrap();
        let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a.yaml", "z.json"]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_document(Path::new("/nonexistent/ontology.yaml"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn context_needs_an_ontology_path() {
        let err = load_context(&ValidatorConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::Config { .. }));
    }
}
