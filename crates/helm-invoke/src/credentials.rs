use crate::error::InvokeError;
use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const PEM_HEADER: &str = "-----BEGIN CERTIFICATE-----";

/// Distinguishes artifacts created within the same millisecond by
/// concurrent invocations in one process.
static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A transient on-disk credential file, exclusively owned by one
/// invocation. The file is deleted when the handle drops, on every
/// exit path of the enclosing operation.
#[derive(Debug)]
pub struct ScopedArtifact {
    path: PathBuf,
}

impl ScopedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Containing directory, the unit the mount planner works in.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .map(|name| name.to_str().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl Drop for ScopedArtifact {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            // A leftover artifact is a warning, never the invocation's
            // result; it must not mask the primary outcome.
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to delete credential artifact"
            );
        }
    }
}

/// Accepts either raw PEM text or base64-encoded PEM. Input that does
/// not start with the PEM header and does not decode as base64 is
/// rejected before any side effect.
pub fn normalize_certificate(input: &str) -> Result<String, InvokeError> {
    if input.starts_with(PEM_HEADER) {
        return Ok(input.to_string());
    }

    let decoded = Base64::decode_vec(input.trim())
        .map_err(|_| InvokeError::validation("certificate is neither PEM text nor valid base64"))?;

    String::from_utf8(decoded)
        .map_err(|_| InvokeError::validation("decoded certificate is not valid UTF-8"))
}

/// Writes the certificate to a uniquely named file under `scratch_dir`
/// with owner-read-only permissions, and returns the owning handle.
///
/// The restrictive mode is applied at creation time; the file is never
/// observable with wider permissions.
pub fn materialize(certificate: &str, scratch_dir: &Path) -> Result<ScopedArtifact, InvokeError> {
    let pem = normalize_certificate(certificate)?;

    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    let file_name = format!("cluster-ca-{}-{}.pem", Utc::now().timestamp_millis(), seq);
    let path = scratch_dir.join(file_name);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o400);

    let mut file = options.open(&path).map_err(|err| {
        InvokeError::materialization(format!(
            "failed to create credential file {}: {}",
            path.display(),
            err
        ))
    })?;

    if let Err(err) = file.write_all(pem.as_bytes()) {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(InvokeError::materialization(format!(
            "failed to write credential file {}: {}",
            path.display(),
            err
        )));
    }

    Ok(ScopedArtifact { path })
}

/// Pure JWT payload decode: returns the `sub` claim. No signature
/// verification is performed; the token is only inspected, never
/// trusted for authorization decisions here.
pub fn subject_from_token(token: &str) -> Result<String, InvokeError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| InvokeError::validation("token is not a JWT"))?;

    let raw = Base64UrlUnpadded::decode_vec(payload)
        .map_err(|_| InvokeError::validation("token payload is not valid base64url"))?;

    let claims: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|_| InvokeError::validation("token payload is not valid JSON"))?;

    match claims.get("sub").and_then(|sub| sub.as_str()) {
        Some(sub) if !sub.is_empty() => Ok(sub.to_string()),
        _ => Err(InvokeError::validation(
            "failed to extract user from token: no subject claim",
        )),
    }
}
