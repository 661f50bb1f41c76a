// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Document Export
//!
//! Writes documents as YAML or JSON. 3.0 documents go through one textual
//! patch after serialization: the OAuth flow key `scopes` is renamed to
//! `availableScopes`. The patch is a plain token replacement over the whole
//! output, not a structural rewrite.

use super::model::Document;
use crate::errors::ExportError;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

const DEFAULT_FILE_STEM: &str = "default";
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Yaml,
    Json,
}

impl ExportFormat {
    /// `.json` files are written as JSON, everything else as YAML.
    pub fn from_path(path: &Path) -> ExportFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Yaml,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Yaml => "yaml",
            ExportFormat::Json => "json",
        }
    }
}

/// Renames the `scopes` key of 3.0 OAuth flows.
pub fn patch_v3_scopes(text: &str, format: ExportFormat) -> String {
    match format {
        ExportFormat::Yaml => text.replace("scopes:", "availableScopes:"),
        ExportFormat::Json => text.replace("\"scopes\":", "\"availableScopes\":"),
    }
}

pub fn serialize(doc: &Document, format: ExportFormat) -> Result<String, ExportError> {
    let text = match (doc, format) {
        (Document::V2(doc), ExportFormat::Yaml) => serde_yaml::to_string(doc)?,
        (Document::V2(doc), ExportFormat::Json) => serde_json::to_string_pretty(doc)?,
        (Document::V3(doc), ExportFormat::Yaml) => serde_yaml::to_string(doc)?,
        (Document::V3(doc), ExportFormat::Json) => serde_json::to_string_pretty(doc)?,
    };

    if doc.is_v3() {
        Ok(patch_v3_scopes(&text, format))
    } else {
        Ok(text)
    }
}

pub fn to_yaml(doc: &Document) -> Result<String, ExportError> {
    serialize(doc, ExportFormat::Yaml)
}

pub fn to_json(doc: &Document) -> Result<String, ExportError> {
    serialize(doc, ExportFormat::Json)
}

/// Writes `doc` to `path` in the format given by its extension, creating
/// missing parent directories.
pub fn write_document(doc: &Document, path: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    let text = serialize(doc, ExportFormat::from_path(path))?;

    let io_error = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, text).map_err(io_error)?;

    debug!(path = %path.display(), "document written");
    Ok(path.to_path_buf())
}

/// Removes characters that are not allowed in file names. An empty result
/// becomes `default`.
pub fn sanitize_file_name(name: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| !c.is_control() && !INVALID_FILE_NAME_CHARS.contains(c))
        .collect();
    let clean = clean.trim();

    if clean.is_empty() {
        DEFAULT_FILE_STEM.to_owned()
    } else {
        clean.to_owned()
    }
}

/// A document to export. A target without a document is skipped.
pub struct ExportTarget {
    pub id: String,
    pub version: String,
    pub document: Option<Document>,
}

impl ExportTarget {
    pub fn new(id: &str, version: &str, document: Option<Document>) -> ExportTarget {
        ExportTarget {
            id: id.to_owned(),
            version: version.to_owned(),
            document,
        }
    }

    pub fn file_name(&self, format: ExportFormat) -> String {
        format!(
            "{}_{}.{}",
            sanitize_file_name(&self.id),
            sanitize_file_name(&self.version),
            format.extension()
        )
    }
}

/// Outcome of a batch export, per target id.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, ExportError)>,
}

/// Exports every target into `dir`. A failing target is logged and does not
/// stop the others.
///
/// # Returns
///
/// The report: targets without a document or whose document cannot be
/// serialized are `skipped`, targets whose file cannot be written are
/// `failed`.
pub fn export_all(
    targets: &[ExportTarget],
    dir: impl AsRef<Path>,
    format: ExportFormat,
) -> ExportReport {
    export_with(targets, dir.as_ref(), format, serialize)
}

fn export_with<F>(
    targets: &[ExportTarget],
    dir: &Path,
    format: ExportFormat,
    render: F,
) -> ExportReport
where
    F: Fn(&Document, ExportFormat) -> Result<String, ExportError>,
{
    let mut report = ExportReport::default();

    for target in targets {
        let Some(doc) = &target.document else {
            warn!(id = target.id, "no document for target, skipping");
            report.skipped.push(target.id.clone());
            continue;
        };

        let text = match render(doc, format) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    error = err.to_string(),
                    id = target.id,
                    "failure to serialize document, skipping"
                );
                report.skipped.push(target.id.clone());
                continue;
            }
        };

        let path = dir.join(target.file_name(format));
        let written = fs::create_dir_all(dir)
            .and_then(|_| fs::write(&path, text))
            .map_err(|source| ExportError::Io {
                path: path.display().to_string(),
                source,
            });

        match written {
            Ok(()) => {
                info!(id = target.id, path = %path.display(), "document exported");
                report.written.push(path);
            }
            Err(err) => {
                error!(
                    error = err.to_string(),
                    id = target.id,
                    "failure to export document"
                );
                report.failed.push((target.id.clone(), err));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asyncapi::{
            broker::BrokerDocumentBuilder,
            builder::AsyncApiBuilder,
            model::{Info, OAuthFlow, OAuthFlows, SecurityScheme},
        },
        config::{BrokerConfig, QueueConfig},
    };
    use std::cell::Cell;
    use tempfile::tempdir;

    fn v2_document() -> Document {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("q1", "ex1", "rk1"));
        BrokerDocumentBuilder::new(&cfg).build_v2().into()
    }

    fn oauth_builder() -> AsyncApiBuilder {
        AsyncApiBuilder::new(Info::new("Lights", "1.0.0")).security_scheme(
            "oauth",
            SecurityScheme::oauth2(OAuthFlows {
                implicit: Some(
                    OAuthFlow {
                        authorization_url: Some("https://example.com/api/oauth/dialog".to_owned()),
                        ..Default::default()
                    }
                    .scope("read:lights", "read lights"),
                ),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_format_from_extension() {
        let format = |path: &str| ExportFormat::from_path(Path::new(path));

        assert_eq!(format("a/b.json"), ExportFormat::Json);
        assert_eq!(format("a/b.JSON"), ExportFormat::Json);
        assert_eq!(format("a/b.yml"), ExportFormat::Yaml);
        assert_eq!(format("a/b"), ExportFormat::Yaml);
    }

    #[test]
    fn test_v3_scopes_renamed_in_place() {
        let builder = oauth_builder();
        let raw = serde_yaml::to_string(&builder.build_v3()).unwrap();
        let patched = to_yaml(&builder.build_v3().into()).unwrap();

        let raw_lines: Vec<_> = raw.lines().collect();
        let patched_lines: Vec<_> = patched.lines().collect();
        assert_eq!(raw_lines.len(), patched_lines.len());

        for (before, after) in raw_lines.iter().zip(&patched_lines) {
            if before.trim_start().starts_with("scopes:") {
                assert_eq!(*after, before.replace("scopes:", "availableScopes:"));
            } else {
                assert_eq!(before, after);
            }
        }
        assert!(patched.contains("availableScopes:"));
    }

    #[test]
    fn test_v3_scopes_renamed_in_json() {
        let json = to_json(&oauth_builder().build_v3().into()).unwrap();

        assert!(json.contains("\"availableScopes\":"));
        assert!(!json.contains("\"scopes\":"));
    }

    #[test]
    fn test_v2_scopes_untouched() {
        let yaml = to_yaml(&oauth_builder().build_v2().into()).unwrap();

        assert!(yaml.contains("scopes:"));
        assert!(!yaml.contains("availableScopes:"));
    }

    #[test]
    fn test_canonical_field_names() {
        let yaml = to_yaml(&v2_document()).unwrap();

        assert!(yaml.starts_with("asyncapi: 2.6.0\n"));
        assert!(yaml.contains("operationId: publishToq1"));
        assert!(yaml.contains("autoDelete: false"));
        assert!(!yaml.contains("bindingVersion"));
    }

    #[test]
    fn test_write_document_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("asyncapispec/nested/asyncapi.json");

        let written = write_document(&v2_document(), &path).unwrap();

        let text = fs::read_to_string(written).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["asyncapi"], "2.6.0");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("Light Measurement API"),
            "Light Measurement API"
        );
        assert_eq!(sanitize_file_name("a/b:c*?"), "abc");
        assert_eq!(sanitize_file_name(""), "default");
        assert_eq!(sanitize_file_name("<>"), "default");
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempdir().unwrap();
        // a directory where the file should go makes the write fail
        let blocked = dir.path().join("broken_1.0.0.yaml");
        fs::create_dir_all(blocked).unwrap();

        let v3 = oauth_builder().build_v3().into();
        let targets = vec![
            ExportTarget::new("broken", "1.0.0", Some(v2_document())),
            ExportTarget::new("missing", "1.0.0", None),
            ExportTarget::new("", "1.0.0", Some(v2_document())),
            ExportTarget::new("lights", "3.0.0", Some(v3)),
        ];

        let report = export_all(&targets, dir.path(), ExportFormat::Yaml);

        assert_eq!(report.skipped, vec!["missing".to_owned()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert!(matches!(report.failed[0].1, ExportError::Io { .. }));
        assert_eq!(
            report.written,
            vec![
                dir.path().join("default_1.0.0.yaml"),
                dir.path().join("lights_3.0.0.yaml"),
            ]
        );
        let lights = fs::read_to_string(dir.path().join("lights_3.0.0.yaml")).unwrap();
        assert!(lights.contains("availableScopes:"));
    }

    #[test]
    fn test_serialization_failure_is_skipped() {
        let dir = tempdir().unwrap();
        let targets = vec![
            ExportTarget::new("unrenderable", "1.0.0", Some(v2_document())),
            ExportTarget::new("lights", "2.6.0", Some(v2_document())),
        ];

        // only the first document fails to render
        let calls = Cell::new(0);
        let report = export_with(&targets, dir.path(), ExportFormat::Json, |doc, format| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                return Err(ExportError::Serialization("unsupported value".to_owned()));
            }
            serialize(doc, format)
        });

        assert_eq!(report.skipped, vec!["unrenderable".to_owned()]);
        assert!(report.failed.is_empty());
        assert_eq!(report.written, vec![dir.path().join("lights_2.6.0.json")]);
        assert!(!dir.path().join("unrenderable_1.0.0.json").exists());
    }
}
