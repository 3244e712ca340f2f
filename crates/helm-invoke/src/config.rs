use std::path::PathBuf;

/// Fixed sandbox settings for one invocation.
///
/// Passed in explicitly rather than read from compiled-in constants so
/// tests can substitute the image or scratch area.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Container runtime binary used to run the tool image.
    pub runtime_bin: String,
    /// Image carrying the helm executable. Its entrypoint expects bare
    /// subcommands, without a leading `helm` token.
    pub image: String,
    /// Host directory persisted across invocations and mounted at the
    /// container's home, so repo indexes and chart caches survive.
    pub helm_home: PathBuf,
    /// Writable host directory where transient credential artifacts
    /// are materialized.
    pub scratch_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime_bin: "docker".to_string(),
            image: "alpine/helm".to_string(),
            helm_home: PathBuf::from("/tmp/helmHome"),
            scratch_dir: std::env::temp_dir(),
        }
    }
}
