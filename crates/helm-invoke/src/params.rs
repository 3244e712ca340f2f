use crate::error::InvokeError;
use serde::Deserialize;

pub const KUBE_CA_FILE_FLAG: &str = "--kube-ca-file";
pub const KUBE_TOKEN_FLAG: &str = "--kube-token";
pub const KUBE_APISERVER_FLAG: &str = "--kube-apiserver";
pub const KUBE_AS_USER_FLAG: &str = "--kube-as-user";
pub const NAMESPACE_FLAG: &str = "--namespace";

/// Bare tool name the execution image does not expect to see.
pub const HELM_CLI_NAME: &str = "helm";

/// Cluster credentials, always present as a unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthParams {
    pub certificate: String,
    pub token: String,
    pub api_server: String,
    pub as_user: String,
}

impl AuthParams {
    /// All four fields supplied yields credentials, none supplied
    /// yields `None` (ambient cluster access), anything in between is
    /// a hard validation failure.
    pub fn from_parts(
        certificate: Option<String>,
        token: Option<String>,
        api_server: Option<String>,
        as_user: Option<String>,
    ) -> Result<Option<Self>, InvokeError> {
        match (certificate, token, api_server, as_user) {
            (Some(certificate), Some(token), Some(api_server), Some(as_user)) => {
                Ok(Some(AuthParams {
                    certificate,
                    token,
                    api_server,
                    as_user,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(InvokeError::validation(
                "partial credentials supplied: certificate, token, API server and user must be provided together",
            )),
        }
    }
}

/// Exactly one of an explicit release name or the generate-name flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseIdentifier {
    Named(String),
    Generated,
}

impl ReleaseIdentifier {
    pub fn from_parts(name: Option<String>, generate: bool) -> Result<Self, InvokeError> {
        match (name, generate) {
            (Some(name), false) => Ok(ReleaseIdentifier::Named(name)),
            (None, true) => Ok(ReleaseIdentifier::Generated),
            (Some(_), true) => Err(InvokeError::validation(
                "release name and generate-name are mutually exclusive",
            )),
            (None, false) => Err(InvokeError::validation(
                "either a release name or generate-name is required",
            )),
        }
    }

    fn as_arg(&self) -> &str {
        match self {
            ReleaseIdentifier::Named(name) => name,
            ReleaseIdentifier::Generated => "--generate-name",
        }
    }
}

/// Optional installation parameters shared by install and uninstall.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    #[serde(default)]
    pub namespace: Option<String>,
    /// Ordered `key=value` overrides, each forwarded verbatim as one
    /// repeated `--set` flag.
    #[serde(default)]
    pub values: Vec<String>,
}

impl InstallOptions {
    fn push_flags(&self, args: &mut Vec<String>) {
        if let Some(namespace) = &self.namespace {
            args.push(NAMESPACE_FLAG.to_string());
            args.push(namespace.clone());
        }
        for value in &self.values {
            args.push("--set".to_string());
            args.push(value.clone());
        }
    }
}

/// The four auth flags in fixed order, each referencing its
/// indirection variable rather than a literal secret. Grouped last so
/// the sensitive tail of the argument list is easy to audit.
fn push_auth_flags(args: &mut Vec<String>) {
    for flag in [
        KUBE_CA_FILE_FLAG,
        KUBE_TOKEN_FLAG,
        KUBE_APISERVER_FLAG,
        KUBE_AS_USER_FLAG,
    ] {
        args.push(flag.to_string());
        args.push(format!("${}", env_name_for_flag(flag)));
    }
}

/// Argument list for `install`: release, chart, installation flags,
/// auth flags last. `chart_arg` is either a remote reference or a
/// mount placeholder, already resolved by the caller.
pub fn build_install_args(
    release: &ReleaseIdentifier,
    chart_arg: &str,
    options: &InstallOptions,
    with_auth: bool,
) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        release.as_arg().to_string(),
        chart_arg.to_string(),
    ];
    options.push_flags(&mut args);
    if with_auth {
        push_auth_flags(&mut args);
    }
    args
}

/// Argument list for `uninstall`: release, namespace, auth flags last.
pub fn build_uninstall_args(
    release_name: &str,
    options: &InstallOptions,
    with_auth: bool,
) -> Vec<String> {
    let mut args = vec!["uninstall".to_string(), release_name.to_string()];
    options.push_flags(&mut args);
    if with_auth {
        push_auth_flags(&mut args);
    }
    args
}

/// Derives the indirection variable name for a flag:
/// `--kube-ca-file` becomes `KUBE_CA_FILE`.
pub fn env_name_for_flag(flag: &str) -> String {
    flag.trim_start_matches('-').replace('-', "_").to_uppercase()
}

/// Strips a leading `helm` token; the execution image expects bare
/// subcommands.
pub fn strip_cli_name(command: &str) -> &str {
    let trimmed = command.trim();
    match trimmed.strip_prefix(HELM_CLI_NAME) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => trimmed,
    }
}

/// Filters the would-be-injected flags down to those the raw command
/// does not already mention. The check is plain substring containment
/// against the raw text: a flag name appearing anywhere in the
/// command, even inside a quoted value, suppresses injection. That is
/// documented behavior, kept as-is rather than upgraded to a
/// tokenizing parser.
pub fn missing_injections(
    command: &str,
    candidates: Vec<(&'static str, String)>,
) -> Vec<(&'static str, String)> {
    candidates
        .into_iter()
        .filter(|(flag, _)| !command.contains(flag))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_requires_all_or_nothing() {
        let err = AuthParams::from_parts(
            None,
            Some("tkn".to_string()),
            Some("https://cluster:6443".to_string()),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("partial credentials"));

        assert!(AuthParams::from_parts(None, None, None, None)
            .unwrap()
            .is_none());

        let auth = AuthParams::from_parts(
            Some("cert".to_string()),
            Some("tkn".to_string()),
            Some("https://cluster:6443".to_string()),
            Some("deployer".to_string()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(auth.as_user, "deployer");
    }

    #[test]
    fn release_identifier_is_exactly_one() {
        assert!(matches!(
            ReleaseIdentifier::from_parts(Some("app".to_string()), false),
            Ok(ReleaseIdentifier::Named(_))
        ));
        assert!(matches!(
            ReleaseIdentifier::from_parts(None, true),
            Ok(ReleaseIdentifier::Generated)
        ));
        assert!(ReleaseIdentifier::from_parts(Some("app".to_string()), true).is_err());
        assert!(ReleaseIdentifier::from_parts(None, false).is_err());
    }

    #[test]
    fn install_args_keep_stable_order() {
        let release = ReleaseIdentifier::Named("my-app-release".to_string());
        let options = InstallOptions {
            namespace: Some("prod".to_string()),
            values: vec!["a=1".to_string(), "b=2".to_string()],
        };
        let args = build_install_args(&release, "$MOUNT_CHART", &options, true);

        assert_eq!(
            args,
            vec![
                "install",
                "my-app-release",
                "$MOUNT_CHART",
                "--namespace",
                "prod",
                "--set",
                "a=1",
                "--set",
                "b=2",
                "--kube-ca-file",
                "$KUBE_CA_FILE",
                "--kube-token",
                "$KUBE_TOKEN",
                "--kube-apiserver",
                "$KUBE_APISERVER",
                "--kube-as-user",
                "$KUBE_AS_USER",
            ]
        );
    }

    #[test]
    fn generated_release_uses_generate_name_flag() {
        let args = build_install_args(
            &ReleaseIdentifier::Generated,
            "repo/chart",
            &InstallOptions::default(),
            false,
        );
        assert_eq!(args, vec!["install", "--generate-name", "repo/chart"]);
    }

    #[test]
    fn uninstall_args_omit_namespace_when_absent() {
        let args = build_uninstall_args("my-app-release", &InstallOptions::default(), true);
        assert_eq!(args[0], "uninstall");
        assert_eq!(args[1], "my-app-release");
        assert!(!args.contains(&NAMESPACE_FLAG.to_string()));
        assert_eq!(args[2], KUBE_CA_FILE_FLAG);
    }

    #[test]
    fn env_names_derive_from_flag_names() {
        assert_eq!(env_name_for_flag(KUBE_CA_FILE_FLAG), "KUBE_CA_FILE");
        assert_eq!(env_name_for_flag(KUBE_AS_USER_FLAG), "KUBE_AS_USER");
        assert_eq!(env_name_for_flag(NAMESPACE_FLAG), "NAMESPACE");
    }

    #[test]
    fn leading_cli_name_is_stripped() {
        assert_eq!(strip_cli_name("helm list --all"), "list --all");
        assert_eq!(strip_cli_name("list --all"), "list --all");
        // `helmfile` is not the bare CLI name.
        assert_eq!(strip_cli_name("helmfile apply"), "helmfile apply");
    }

    #[test]
    fn explicit_user_flags_are_not_reinjected() {
        let missing = missing_injections(
            "upgrade app ./chart --namespace foo",
            vec![
                (KUBE_TOKEN_FLAG, "tkn".to_string()),
                (NAMESPACE_FLAG, "bar".to_string()),
            ],
        );
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, KUBE_TOKEN_FLAG);
    }

    #[test]
    fn substring_match_suppresses_injection_even_inside_values() {
        // Documented sharp edge: the flag name inside a quoted value
        // still counts as present.
        let missing = missing_injections(
            "install app chart --set note='--namespace is set elsewhere'",
            vec![(NAMESPACE_FLAG, "prod".to_string())],
        );
        assert!(missing.is_empty());
    }
}
