use crate::error::InvokeError;
use crate::runner::ExecOutput;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches helm's own token-assignment diagnostic line so the value
/// can be replaced while preserving the surrounding structure.
static TOKEN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(HELM_KUBETOKEN=")([\w.-]*)(")"#).expect("valid redaction regex"));

const REDACTION_MARKER: &str = "redacted";

/// Replaces every captured token value in the text with the fixed
/// redaction marker, leaving the rest of each line intact.
pub fn redact_secrets(text: &str) -> String {
    TOKEN_LINE
        .replace_all(text, format!("${{1}}{REDACTION_MARKER}${{3}}"))
        .into_owned()
}

/// Classifies one captured execution outcome.
///
/// A non-zero (or absent) exit status is a failure carrying the
/// redacted stderr. A zero status with empty stdout but populated
/// stderr is also treated as a failure: the tool emitting errors on
/// the success channel is not trusted blindly. Everything else returns
/// the redacted stdout.
pub fn classify(output: ExecOutput) -> Result<String, InvokeError> {
    match output.status {
        Some(0) => {}
        _ => {
            return Err(InvokeError::Execution {
                stderr: redact_secrets(&output.stderr),
            })
        }
    }

    if output.stdout.is_empty() && !output.stderr.is_empty() {
        return Err(InvokeError::Execution {
            stderr: redact_secrets(&output.stderr),
        });
    }

    Ok(redact_secrets(&output.stdout))
}
