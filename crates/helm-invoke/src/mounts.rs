use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One host-directory-to-sandbox mapping.
///
/// `path_var` holds the host path and `mount_var` the in-sandbox path,
/// both as environment variables, so neither side ever appears
/// literally in the synthesized command text (`-v $PATH_X:$MOUNT_X`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountBinding {
    pub host_path: PathBuf,
    pub path_var: String,
    pub mount_var: String,
    pub container_path: String,
}

impl MountBinding {
    pub fn new(host_path: PathBuf) -> Self {
        let id = short_id();
        Self {
            host_path,
            path_var: format!("PATH_{}", id.to_uppercase()),
            mount_var: format!("MOUNT_POINT_{}", id.to_uppercase()),
            container_path: format!("/{id}"),
        }
    }

    /// `$MOUNT_X` text standing in for the container path.
    pub fn placeholder(&self) -> String {
        format!("${}", self.mount_var)
    }

    /// The `-v` argument value, fully indirect.
    pub fn volume_arg(&self) -> String {
        format!("${}:${}", self.path_var, self.mount_var)
    }
}

fn short_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Allocates one binding per distinct host directory, preserving the
/// order of first occurrence. Duplicate directories collapse into a
/// single binding so no two bindings reference the same host path.
pub fn plan_bindings(dirs: impl IntoIterator<Item = PathBuf>) -> Vec<MountBinding> {
    let mut seen = BTreeSet::new();
    dirs.into_iter()
        .filter(|dir| seen.insert(dir.clone()))
        .map(MountBinding::new)
        .collect()
}

/// Syntactic locality rule: a chart reference is a local filesystem
/// path if and only if it begins with `/` or `./`. Everything else is
/// a remote reference and passes through unmounted.
pub fn chart_is_local(reference: &str) -> bool {
    reference.starts_with('/') || reference.starts_with("./")
}

/// Resolves the directory to bind for a local path. A path that is an
/// existing file binds its parent, and the argument re-qualifies with
/// the basename, so the sandbox never needs file-level bind
/// granularity.
pub fn binding_target(path: &Path) -> (PathBuf, Option<String>) {
    if path.is_file() {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        (parent, basename)
    } else {
        (path.to_path_buf(), None)
    }
}

/// The argument text replacing a bound local path: the mount
/// placeholder, re-qualified with a basename when the original path
/// named a file.
pub fn placeholder_arg(binding: &MountBinding, basename: Option<&str>) -> String {
    match basename {
        Some(basename) => format!("{}/{}", binding.placeholder(), basename),
        None => binding.placeholder(),
    }
}

/// First whitespace-separated token of a raw command that looks like a
/// local path, if any. Used in passthrough mode to auto-mount a local
/// chart referenced inside the command text.
pub fn extract_local_path(command: &str) -> Option<&str> {
    command.split_whitespace().find(|token| chart_is_local(token))
}
