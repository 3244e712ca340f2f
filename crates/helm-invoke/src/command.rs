use crate::config::SandboxConfig;
use crate::mounts::MountBinding;
use std::collections::BTreeMap;

/// One composed invocation: the command text handed to the shell and
/// the environment mapping resolving every indirection variable in it.
///
/// The text is secret-free and safe to log; the environment mapping is
/// handed only to the host process spawn and must never be logged or
/// persisted.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command_text: String,
    pub env: BTreeMap<String, String>,
}

/// Composes the final sandbox command from the mapped arguments and
/// the mount plan.
///
/// Mount sources and targets ride through `$PATH_X`/`$MOUNT_X`
/// variables, secrets through their derived `KUBE_*` names; the shell
/// resolves them at spawn time. `home_mount` persists the tool's local
/// cache across invocations; a working-directory binding adds `-w`.
pub fn synthesize(
    config: &SandboxConfig,
    args: &[String],
    bindings: &[MountBinding],
    workdir: Option<&MountBinding>,
    home_mount: bool,
    direct_env: BTreeMap<String, String>,
) -> Invocation {
    let mut parts = vec![config.runtime_bin.clone(), "run".to_string(), "--rm".to_string()];

    // Mount vars are passed into the container so placeholder text in
    // the tool's own arguments resolves on the inside as well.
    for binding in bindings {
        parts.push("--env".to_string());
        parts.push(binding.mount_var.clone());
    }

    for binding in bindings {
        parts.push("-v".to_string());
        parts.push(binding.volume_arg());
    }

    if home_mount {
        parts.push("-v".to_string());
        parts.push(format!("{}:/root/", config.helm_home.display()));
    }

    if let Some(workdir) = workdir {
        parts.push("-w".to_string());
        parts.push(workdir.placeholder());
    }

    parts.push(config.image.clone());
    parts.extend(args.iter().cloned());

    let mut env = direct_env;
    for binding in bindings {
        env.insert(
            binding.path_var.clone(),
            binding.host_path.display().to_string(),
        );
        env.insert(binding.mount_var.clone(), binding.container_path.clone());
    }

    Invocation {
        command_text: parts.join(" "),
        env,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config() -> SandboxConfig {
        SandboxConfig {
            runtime_bin: "docker".to_string(),
            image: "alpine/helm".to_string(),
            helm_home: PathBuf::from("/tmp/helmHome"),
            scratch_dir: PathBuf::from("/tmp"),
        }
    }

    #[test]
    fn command_text_contains_only_indirections() {
        let binding = MountBinding::new(PathBuf::from("/tmp/creds"));
        let args = vec!["install".to_string(), "app".to_string()];
        let mut direct_env = BTreeMap::new();
        direct_env.insert("KUBE_TOKEN".to_string(), "secret-token".to_string());

        let invocation = synthesize(
            &test_config(),
            &args,
            std::slice::from_ref(&binding),
            None,
            true,
            direct_env,
        );

        assert!(invocation.command_text.starts_with("docker run --rm"));
        assert!(!invocation.command_text.contains("secret-token"));
        assert!(!invocation.command_text.contains("/tmp/creds"));
        assert!(invocation
            .command_text
            .contains(&format!("-v {}", binding.volume_arg())));
        assert!(invocation.command_text.contains("-v /tmp/helmHome:/root/"));
        assert!(invocation.command_text.contains("--env"));
        assert!(invocation.command_text.ends_with("alpine/helm install app"));

        assert_eq!(invocation.env.get("KUBE_TOKEN").unwrap(), "secret-token");
        assert_eq!(invocation.env.get(&binding.path_var).unwrap(), "/tmp/creds");
        assert_eq!(
            invocation.env.get(&binding.mount_var).unwrap(),
            &binding.container_path
        );
    }

    #[test]
    fn workdir_binding_adds_the_working_directory_flag() {
        let workdir = MountBinding::new(PathBuf::from("/work"));
        let invocation = synthesize(
            &test_config(),
            &["list".to_string()],
            std::slice::from_ref(&workdir),
            Some(&workdir),
            false,
            BTreeMap::new(),
        );

        assert!(invocation
            .command_text
            .contains(&format!("-w {}", workdir.placeholder())));
        assert!(!invocation.command_text.contains("/tmp/helmHome"));
    }
}
