//! Data exchanged with the runbook collaborators.
//!
//! A recording session produces [`RecordedCommand`]s; a replay session
//! consumes the [`ReplayStep`]s of a [`Runbook`].

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest file that can be attached to a recording.
pub const MAX_ATTACHMENT_SIZE: u64 = 25 * 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum AttachmentError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    #[error("{0} is a directory")]
    #[diagnostic(help("attach individual files, one at a time"))]
    Directory(PathBuf),
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("{path} is {size} bytes, larger than the 25 KiB limit")]
    TooLarge { path: PathBuf, size: u64 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file attached to a recorded command (`savvy record file <path>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub path: PathBuf,
    pub mode: u32,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl FileAttachment {
    /// Check that `path` can be attached without reading it.
    pub fn check(path: &Path) -> Result<std::fs::Metadata, AttachmentError> {
        let metadata = std::fs::metadata(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => AttachmentError::NotFound(path.to_path_buf()),
            _ => AttachmentError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        if metadata.is_dir() {
            return Err(AttachmentError::Directory(path.to_path_buf()));
        }
        match metadata.len() {
            0 => Err(AttachmentError::Empty(path.to_path_buf())),
            size if size > MAX_ATTACHMENT_SIZE => Err(AttachmentError::TooLarge {
                path: path.to_path_buf(),
                size,
            }),
            _ => Ok(metadata),
        }
    }

    /// Validate and read `path`.
    pub fn read(path: &Path) -> Result<Self, AttachmentError> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = Self::check(path)?;
        let content = std::fs::read(path).map_err(|source| AttachmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            mode: metadata.permissions().mode(),
            content,
        })
    }
}

fn is_success(code: &i32) -> bool {
    *code == 0
}

/// One captured command.
///
/// The text never changes once appended to the capture log; only the exit
/// code is filled in later, when the shell reports how the command ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedCommand {
    pub command: String,
    /// The shell prompt shown when the command was entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "is_success")]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
}

impl RecordedCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            prompt: None,
            exit_code: 0,
            file: None,
        }
    }

    pub fn with_file(command: impl Into<String>, file: FileAttachment) -> Self {
        Self {
            file: Some(file),
            ..Self::new(command)
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn failed(&self) -> bool {
        !is_success(&self.exit_code)
    }
}

/// One step of a runbook being replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReplayStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunbookError {
    #[error("failed to read runbook {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse runbook {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("runbook {0} has no steps")]
    #[diagnostic(help("add at least one entry under `steps`"))]
    Empty(PathBuf),
}

/// A titled, ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runbook {
    #[serde(default)]
    pub title: String,
    pub steps: Vec<ReplayStep>,
}

impl Runbook {
    /// Load a runbook from a JSON or YAML file (chosen by extension, JSON by default).
    pub fn load(path: &Path) -> Result<Self, RunbookError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunbookError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let runbook: Runbook = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| RunbookError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| RunbookError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        if runbook.steps.is_empty() {
            return Err(RunbookError::Empty(path.to_path_buf()));
        }
        Ok(runbook)
    }

    pub fn commands(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.command.as_str()).collect()
    }
}

/// Attachments may be binary; encode them as standard base64 like any other
/// byte payload in JSON.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_runbook() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"title":"deploy","steps":[{{"command":"make build"}},{{"command":"kubectl apply -f <file>","description":"apply"}}]}}"#
        )
        .unwrap();

        let runbook = Runbook::load(file.path()).unwrap();
        assert_eq!(runbook.title, "deploy");
        assert_eq!(runbook.commands(), vec!["make build", "kubectl apply -f <file>"]);
        assert_eq!(runbook.steps[1].description.as_deref(), Some("apply"));
    }

    #[test]
    fn test_load_yaml_runbook() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "title: setup\nsteps:\n  - command: ls\n  - command: pwd").unwrap();

        let runbook = Runbook::load(file.path()).unwrap();
        assert_eq!(runbook.commands(), vec!["ls", "pwd"]);
    }

    #[test]
    fn test_load_rejects_empty_runbook() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"title":"nothing","steps":[]}}"#).unwrap();

        let err = Runbook::load(file.path()).unwrap_err();
        assert!(matches!(err, RunbookError::Empty(_)));
    }

    #[test]
    fn test_attachment_validation() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            FileAttachment::read(&empty),
            Err(AttachmentError::Empty(_))
        ));

        let large = dir.path().join("large.txt");
        std::fs::write(&large, vec![b'x'; MAX_ATTACHMENT_SIZE as usize + 1]).unwrap();
        assert!(matches!(
            FileAttachment::read(&large),
            Err(AttachmentError::TooLarge { .. })
        ));

        assert!(matches!(
            FileAttachment::read(dir.path()),
            Err(AttachmentError::Directory(_))
        ));
        assert!(matches!(
            FileAttachment::read(&dir.path().join("missing")),
            Err(AttachmentError::NotFound(_))
        ));

        let config = dir.path().join("config.yaml");
        std::fs::write(&config, "replicas: 3\n").unwrap();
        let attachment = FileAttachment::read(&config).unwrap();
        assert_eq!(attachment.content, b"replicas: 3\n");
        assert_eq!(attachment.path, config);
    }

    #[test]
    fn test_recorded_command_serialization_skips_missing_fields() {
        let json = serde_json::to_string(&RecordedCommand::new("ls -la")).unwrap();
        assert_eq!(json, r#"{"command":"ls -la"}"#);

        let mut failed = RecordedCommand::new("false").with_prompt("$ ");
        failed.exit_code = 1;
        assert!(failed.failed());
        assert_eq!(
            serde_json::to_string(&failed).unwrap(),
            r#"{"command":"false","prompt":"$ ","exit_code":1}"#
        );
    }

    #[test]
    fn test_binary_attachment_survives_json() {
        let content = vec![0x89, b'P', b'N', b'G', 0xff, 0x00, 0xfe];
        let recorded = RecordedCommand::with_file(
            "savvy record file logo.png",
            FileAttachment {
                path: PathBuf::from("/tmp/logo.png"),
                mode: 0o644,
                content: content.clone(),
            },
        );

        let json = serde_json::to_string(&recorded).unwrap();
        assert!(json.contains(r#""content":"iVBOR/8A/g==""#), "{json}");

        let decoded: RecordedCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.file.unwrap().content, content);
    }

    #[test]
    fn test_attachment_rejects_invalid_base64() {
        let json = r#"{"path":"/tmp/a","mode":420,"content":"not base64!"}"#;
        assert!(serde_json::from_str::<FileAttachment>(json).is_err());
    }
}
