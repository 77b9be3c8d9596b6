use serde::{Deserialize, Serialize};
use std::fmt;

/// Submissions larger than this are rejected before they reach a sandbox.
pub const MAX_CONTENT_BYTES: usize = 8192;
/// Cap on the UI test-case string, measured in bytes like `content`.
pub const MAX_INPUT_BYTES: usize = 8192;

/// Languages the editor can tag a snippet with. The wire format is a bare
/// integer (C=0, Cpp=1, Java=2, Python3=3); only Java and Python3 have
/// execution backends, the rest are rejected at the API boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Language {
    #[default]
    C,
    Cpp,
    Java,
    Python3,
}

impl From<Language> for u8 {
    fn from(language: Language) -> u8 {
        match language {
            Language::C => 0,
            Language::Cpp => 1,
            Language::Java => 2,
            Language::Python3 => 3,
        }
    }
}

impl TryFrom<u8> for Language {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Language::C),
            1 => Ok(Language::Cpp),
            2 => Ok(Language::Java),
            3 => Ok(Language::Python3),
            other => Err(format!("language out of range: {}", other)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python3 => "python3",
        };
        write!(f, "{}", name)
    }
}

/// The submission envelope posted by the editor.
///
/// `input` is the raw UI test-case string (one case per line of
/// comma-separated `name=expr` assignments); the server preprocesses it
/// before staging, so it stays opaque here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub input: String,
}

/// Terminal states of a submission. Wire-stable integers: the editor
/// switches on the numeric value, so variants must never be reordered.
///
/// `NotExecuted` and `CompileTimeout` are reserved on the wire but not
/// produced by the current executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ExecutionStatus {
    NotExecuted,
    CompileError,
    CompileTimeout,
    RuntimeError,
    RuntimeTimeout,
    Successful,
}

impl From<ExecutionStatus> for u8 {
    fn from(status: ExecutionStatus) -> u8 {
        match status {
            ExecutionStatus::NotExecuted => 0,
            ExecutionStatus::CompileError => 1,
            ExecutionStatus::CompileTimeout => 2,
            ExecutionStatus::RuntimeError => 3,
            ExecutionStatus::RuntimeTimeout => 4,
            ExecutionStatus::Successful => 5,
        }
    }
}

impl TryFrom<u8> for ExecutionStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExecutionStatus::NotExecuted),
            1 => Ok(ExecutionStatus::CompileError),
            2 => Ok(ExecutionStatus::CompileTimeout),
            3 => Ok(ExecutionStatus::RuntimeError),
            4 => Ok(ExecutionStatus::RuntimeTimeout),
            5 => Ok(ExecutionStatus::Successful),
            other => Err(format!("execution status out of range: {}", other)),
        }
    }
}

/// What a submission resolves to: status, container exit code, wall-clock
/// runtime in milliseconds, and the captured output (first 8 KiB of the
/// combined stdout+stderr stream).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub status: ExecutionStatus,
    pub exit_code: i64,
    pub run_time: i64,
    pub output: String,
}

impl Verdict {
    /// Fold an infrastructure failure into the verdict shape the editor
    /// already handles. The diagnostic travels in `output`.
    pub fn infra_error(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::RuntimeError,
            exit_code: 0,
            run_time: 0,
            output: output.into(),
        }
    }
}
