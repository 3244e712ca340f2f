//! Helm invocation pipeline for per-invocation cluster credentials.
//!
//! Translates loosely-structured platform parameters (certificate
//! material, bearer token, API server URL, chart location, value
//! overrides) into a correctly quoted, sandbox-scoped `docker run`
//! invocation of the helm image, executes it, and returns sanitized
//! output. Secrets travel through derived environment variables, never
//! through command text; the transient CA file is owner-read-only and
//! deleted on every exit path.

pub mod command;
pub mod config;
pub mod credentials;
pub mod error;
pub mod mounts;
pub mod ops;
pub mod params;
pub mod runner;
pub mod sanitize;

pub use command::Invocation;
pub use config::SandboxConfig;
pub use error::InvokeError;
pub use ops::{
    install, run_command, uninstall, InstallParameters, InstallRequest, RunCommandParameters,
    RunCommandRequest, UninstallParameters, UninstallRequest,
};
pub use params::{AuthParams, InstallOptions, ReleaseIdentifier};
pub use runner::{CommandRunner, ExecOutput, ShellRunner};
