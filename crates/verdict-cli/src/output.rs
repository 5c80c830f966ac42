//! How `vd` writes results and errors.
//!
//! Handlers build a serializable value and hand it to [`render_mode`] with
//! one closure for `key=value` text and one for pretty terminal output; JSON
//! is written by serde. Errors go to stderr through [`render_error`] in the
//! same mode, carrying the core `E####` code and hint when one is known.
//!
//! The mode is picked in this order: `--json`, then `FORMAT`
//! (`pretty`/`text`/`json`), then `output` from the user config, then
//! pretty on a terminal and text when stdout is piped.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use verdict_core::config::{self, ConfigError};
use verdict_core::dataset::DatasetError;
use verdict_core::error::ErrorCode;
use verdict_core::lock::LockError;
use verdict_core::navigate::NavError;
use verdict_core::reviewer::AuthError;
use verdict_core::session::{SessionError, ValidationError};
use verdict_core::store::SnapshotError;
use verdict_core::sync::SyncError;

use crate::reviewer::CredentialError;

const RULE: &str = "------------------------------------------------------------------------";
const KEY_WIDTH: usize = 14;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{RULE}")
}

/// A heading line with a rule under it.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}\n{RULE}")
}

/// `Key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let label = format!("{key}:");
    writeln!(w, "{label:<KEY_WIDTH$} {}", value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Sections and rules for a person at a terminal.
    Pretty,
    /// `key=value` lines for scripts.
    Text,
    /// One JSON document (one object per line in `vd annotate`).
    Json,
}

impl OutputMode {
    pub const fn is_pretty(self) -> bool {
        matches!(self, Self::Pretty)
    }

    fn from_resolved(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }
}

pub fn resolve_output_mode(json_flag: bool, user_output: Option<&str>) -> OutputMode {
    let format = std::env::var("FORMAT").ok();
    let resolved = config::resolve_output(
        json_flag,
        user_output,
        format.as_deref(),
        io::stdout().is_terminal(),
    );
    OutputMode::from_resolved(&resolved)
}

/// An error as the user sees it: message, remediation hint, `E####` code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// e.g. `"E3003"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
            ..Self::new(message)
        }
    }
}

/// First known core error code in an error chain.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<NavError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SessionError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<ValidationError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SnapshotError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SyncError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<DatasetError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<AuthError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<LockError>() {
            Some(e.code())
        } else {
            cause.downcast_ref::<CredentialError>().map(|e| e.code)
        }
    })
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        match error_code(err) {
            Some(code) => Self::with_code(message, code),
            None => Self::new(message),
        }
    }
}

/// [`write_mode`] to stdout.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    write_mode(&mut io::stdout().lock(), mode, value, text, pretty)
}

/// Write `value` in `mode`. JSON goes on a single line.
pub fn write_mode<T: Serialize>(
    out: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    text: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let line = serde_json::to_string(value)?;
            writeln!(out, "{line}")?;
        }
        OutputMode::Text => text(value, out)?,
        OutputMode::Pretty => pretty(value, out)?,
    }
    Ok(())
}

/// `{"error": {...}}` in JSON mode, otherwise `error[E####]: message` plus
/// an indented hint.
pub fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let line = serde_json::to_string(&serde_json::json!({ "error": error }))?;
        writeln!(out, "{line}")?;
        return Ok(());
    }
    match &error.error_code {
        Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
        None => writeln!(out, "error: {}", error.message)?,
    }
    if let Some(hint) = &error.suggestion {
        writeln!(out, "  hint: {hint}")?;
    }
    Ok(())
}

pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    write_error(&mut io::stderr().lock(), mode, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn resolved_strings_map_to_modes() {
        assert_eq!(OutputMode::from_resolved("json"), OutputMode::Json);
        assert_eq!(OutputMode::from_resolved("pretty"), OutputMode::Pretty);
        assert_eq!(OutputMode::from_resolved("text"), OutputMode::Text);
        assert!(OutputMode::Pretty.is_pretty());
    }

    #[test]
    fn json_flag_always_wins() {
        assert_eq!(resolve_output_mode(true, Some("pretty")), OutputMode::Json);
    }

    #[test]
    fn write_mode_json_is_one_line() {
        let out = capture(|w| {
            let value = serde_json::json!({"done": 1});
            write_mode(w, OutputMode::Json, &value, |_, _| Ok(()), |_, _| Ok(()))
        });
        assert_eq!(out, "{\"done\":1}\n");
    }

    #[test]
    fn write_mode_dispatches_text_and_pretty() {
        let text = capture(|w| {
            write_mode(
                w,
                OutputMode::Text,
                &1,
                |v, w| writeln!(w, "n={v}"),
                |_, w| writeln!(w, "pretty"),
            )
        });
        assert_eq!(text, "n=1\n");
        let pretty = capture(|w| {
            write_mode(
                w,
                OutputMode::Pretty,
                &1,
                |_, w| writeln!(w, "text"),
                |v, w| pretty_kv(w, "N", v.to_string()),
            )
        });
        assert!(pretty.starts_with("N:"));
    }

    #[test]
    fn cli_error_from_core_error_carries_code_and_hint() {
        let err = anyhow::Error::new(ValidationError::MissingContextualFactors);
        let cli = CliError::from(&err);
        assert_eq!(cli.message, "select at least one contextual factor");
        assert_eq!(cli.error_code.as_deref(), Some("E3003"));
        assert!(cli.suggestion.is_some());
    }

    #[test]
    fn cli_error_finds_code_through_context() {
        let err =
            anyhow::Error::new(SyncError::Unavailable("offline".into())).context("sync failed");
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E5001"));
        assert!(cli.message.starts_with("sync failed"));
    }

    #[test]
    fn unknown_errors_have_no_code() {
        let cli = CliError::from(&anyhow::anyhow!("boom"));
        assert_eq!(cli.error_code, None);
        assert_eq!(cli.message, "boom");
    }

    #[test]
    fn write_error_text_and_json() {
        let error = CliError::with_code("bad password", ErrorCode::AuthenticationFailed);
        let text = capture(|w| write_error(w, OutputMode::Text, &error));
        assert!(text.starts_with("error[E1101]: bad password"));

        let json = capture(|w| write_error(w, OutputMode::Json, &error));
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["error"]["error_code"], "E1101");
        assert_eq!(value["error"]["message"], "bad password");
    }
}
