use crate::command::{synthesize, Invocation};
use crate::config::SandboxConfig;
use crate::credentials::{self, ScopedArtifact};
use crate::error::InvokeError;
use crate::mounts::{
    binding_target, chart_is_local, extract_local_path, placeholder_arg, plan_bindings,
    MountBinding,
};
use crate::params::{
    build_install_args, build_uninstall_args, env_name_for_flag, missing_injections,
    strip_cli_name, AuthParams, InstallOptions, ReleaseIdentifier, KUBE_APISERVER_FLAG,
    KUBE_AS_USER_FLAG, KUBE_CA_FILE_FLAG, KUBE_TOKEN_FLAG, NAMESPACE_FLAG,
};
use crate::runner::CommandRunner;
use crate::sanitize::classify;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Validated install request.
#[derive(Debug)]
pub struct InstallRequest {
    pub auth: Option<AuthParams>,
    pub chart: String,
    pub release: ReleaseIdentifier,
    pub options: InstallOptions,
    pub working_dir: Option<PathBuf>,
}

/// Validated uninstall request.
#[derive(Debug)]
pub struct UninstallRequest {
    pub auth: Option<AuthParams>,
    pub release_name: String,
    pub options: InstallOptions,
}

/// Validated passthrough request carrying a raw subcommand string.
#[derive(Debug)]
pub struct RunCommandRequest {
    pub auth: Option<AuthParams>,
    pub command: String,
    pub namespace: Option<String>,
    pub working_dir: Option<PathBuf>,
}

/// Raw install parameters as received from the platform, camelCase
/// keys. Validation happens in [`InstallParameters::validate`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallParameters {
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_server: Option<String>,
    #[serde(default)]
    pub as_user: Option<String>,
    pub chart: String,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub generate_name: bool,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

impl InstallParameters {
    pub fn validate(self) -> Result<InstallRequest, InvokeError> {
        let auth = build_auth(self.certificate, self.token, self.api_server, self.as_user)?;
        let release = ReleaseIdentifier::from_parts(self.release_name, self.generate_name)?;
        Ok(InstallRequest {
            auth,
            chart: self.chart,
            release,
            options: InstallOptions {
                namespace: self.namespace,
                values: self.values,
            },
            working_dir: self.working_directory,
        })
    }
}

/// Raw uninstall parameters.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallParameters {
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_server: Option<String>,
    #[serde(default)]
    pub as_user: Option<String>,
    pub release_name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl UninstallParameters {
    pub fn validate(self) -> Result<UninstallRequest, InvokeError> {
        let auth = build_auth(self.certificate, self.token, self.api_server, self.as_user)?;
        Ok(UninstallRequest {
            auth,
            release_name: self.release_name,
            options: InstallOptions {
                namespace: self.namespace,
                values: Vec::new(),
            },
        })
    }
}

/// Raw passthrough parameters.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandParameters {
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_server: Option<String>,
    #[serde(default)]
    pub as_user: Option<String>,
    pub command: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

impl RunCommandParameters {
    pub fn validate(self) -> Result<RunCommandRequest, InvokeError> {
        let auth = build_auth(self.certificate, self.token, self.api_server, self.as_user)?;
        Ok(RunCommandRequest {
            auth,
            command: self.command,
            namespace: self.namespace,
            working_dir: self.working_directory,
        })
    }
}

/// The user identity may arrive explicitly or be carried by the
/// token's subject claim.
fn build_auth(
    certificate: Option<String>,
    token: Option<String>,
    api_server: Option<String>,
    as_user: Option<String>,
) -> Result<Option<AuthParams>, InvokeError> {
    let as_user = match (&token, as_user) {
        (Some(token), None) => Some(credentials::subject_from_token(token)?),
        (_, as_user) => as_user,
    };
    AuthParams::from_parts(certificate, token, api_server, as_user)
}

/// Install a chart. Returns helm's sanitized stdout.
pub fn install(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
    request: InstallRequest,
) -> Result<String, InvokeError> {
    let artifact = materialize_auth(config, request.auth.as_ref())?;

    let mut dirs = Vec::new();
    if let Some(artifact) = &artifact {
        dirs.push(artifact.directory().to_path_buf());
    }

    let chart_target = if chart_is_local(&request.chart) {
        let (dir, basename) = binding_target(Path::new(&request.chart));
        dirs.push(dir.clone());
        Some((dir, basename))
    } else {
        None
    };

    if let Some(working_dir) = &request.working_dir {
        dirs.push(working_dir.clone());
    }

    let bindings = plan_bindings(dirs);

    let chart_arg = match &chart_target {
        Some((dir, basename)) => {
            let binding = binding_for(&bindings, dir);
            placeholder_arg(binding, basename.as_deref())
        }
        None => request.chart.clone(),
    };

    let workdir_binding = request
        .working_dir
        .as_ref()
        .map(|dir| binding_for(&bindings, dir));

    let direct_env = auth_env(request.auth.as_ref(), artifact.as_ref(), &bindings);
    let args = build_install_args(
        &request.release,
        &chart_arg,
        &request.options,
        request.auth.is_some(),
    );
    let invocation = synthesize(config, &args, &bindings, workdir_binding, true, direct_env);

    execute(runner, &invocation)
}

/// Uninstall a release. No chart or cache mounts are involved.
pub fn uninstall(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
    request: UninstallRequest,
) -> Result<String, InvokeError> {
    let artifact = materialize_auth(config, request.auth.as_ref())?;

    let dirs = artifact
        .as_ref()
        .map(|artifact| artifact.directory().to_path_buf())
        .into_iter()
        .collect::<Vec<_>>();
    let bindings = plan_bindings(dirs);

    let direct_env = auth_env(request.auth.as_ref(), artifact.as_ref(), &bindings);
    let args = build_uninstall_args(&request.release_name, &request.options, request.auth.is_some());
    let invocation = synthesize(config, &args, &bindings, None, false, direct_env);

    execute(runner, &invocation)
}

/// Run an arbitrary helm subcommand string, augmenting it with any
/// auth or namespace flags the user did not already type.
pub fn run_command(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
    request: RunCommandRequest,
) -> Result<String, InvokeError> {
    let artifact = materialize_auth(config, request.auth.as_ref())?;

    let mut command = strip_cli_name(&request.command).to_string();

    let mut dirs = Vec::new();
    if let Some(artifact) = &artifact {
        dirs.push(artifact.directory().to_path_buf());
    }

    // An explicit working directory wins over inferring a chart
    // directory from the command text; only one of the two becomes the
    // command's current directory.
    let mut inferred_chart: Option<(String, PathBuf, Option<String>)> = None;
    if let Some(working_dir) = &request.working_dir {
        dirs.push(working_dir.clone());
    } else if let Some(found) = extract_local_path(&command) {
        let found = found.to_string();
        let (dir, basename) = binding_target(Path::new(&found));
        dirs.push(dir.clone());
        inferred_chart = Some((found, dir, basename));
    }

    let bindings = plan_bindings(dirs);

    if let Some((found, dir, basename)) = &inferred_chart {
        let binding = binding_for(&bindings, dir);
        let replacement = placeholder_arg(binding, basename.as_deref());
        command = command.replacen(found.as_str(), &replacement, 1);
    }

    let workdir_binding = request
        .working_dir
        .as_ref()
        .map(|dir| binding_for(&bindings, dir));

    let mut candidates: Vec<(&'static str, String)> = Vec::new();
    if let Some(auth) = &request.auth {
        let artifact = artifact
            .as_ref()
            .expect("auth present implies a materialized artifact");
        let binding = binding_for(&bindings, artifact.directory());
        candidates.push((
            KUBE_CA_FILE_FLAG,
            format!("{}/{}", binding.container_path, artifact.file_name()),
        ));
        candidates.push((KUBE_TOKEN_FLAG, auth.token.clone()));
        candidates.push((KUBE_APISERVER_FLAG, auth.api_server.clone()));
        candidates.push((KUBE_AS_USER_FLAG, auth.as_user.clone()));
    }
    if let Some(namespace) = &request.namespace {
        candidates.push((NAMESPACE_FLAG, namespace.clone()));
    }

    let mut args = vec![command];
    let mut direct_env = BTreeMap::new();
    for (flag, value) in missing_injections(&args[0], candidates) {
        let name = env_name_for_flag(flag);
        args.push(flag.to_string());
        args.push(format!("${name}"));
        direct_env.insert(name, value);
    }

    let invocation = synthesize(config, &args, &bindings, workdir_binding, true, direct_env);

    execute(runner, &invocation)
}

fn materialize_auth(
    config: &SandboxConfig,
    auth: Option<&AuthParams>,
) -> Result<Option<ScopedArtifact>, InvokeError> {
    auth.map(|auth| credentials::materialize(&auth.certificate, &config.scratch_dir))
        .transpose()
}

fn binding_for<'a>(bindings: &'a [MountBinding], dir: &Path) -> &'a MountBinding {
    bindings
        .iter()
        .find(|binding| binding.host_path == dir)
        .expect("every planned directory has a binding")
}

/// Host-side environment resolving the auth indirections: the CA file
/// rides as an in-sandbox path, the rest as literal values that never
/// enter the command text.
fn auth_env(
    auth: Option<&AuthParams>,
    artifact: Option<&ScopedArtifact>,
    bindings: &[MountBinding],
) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let (Some(auth), Some(artifact)) = (auth, artifact) {
        let binding = binding_for(bindings, artifact.directory());
        env.insert(
            env_name_for_flag(KUBE_CA_FILE_FLAG),
            format!("{}/{}", binding.container_path, artifact.file_name()),
        );
        env.insert(env_name_for_flag(KUBE_TOKEN_FLAG), auth.token.clone());
        env.insert(
            env_name_for_flag(KUBE_APISERVER_FLAG),
            auth.api_server.clone(),
        );
        env.insert(env_name_for_flag(KUBE_AS_USER_FLAG), auth.as_user.clone());
    }
    env
}

fn execute(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<String, InvokeError> {
    // The command text is secret-free by construction; the env map is
    // deliberately not logged.
    tracing::info!(command = %invocation.command_text, "executing sandboxed helm command");
    let output = runner.run(invocation)?;
    classify(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};

    fn token_for_subject(sub: &str) -> String {
        let header = Base64UrlUnpadded::encode_string(b"{\"alg\":\"none\"}");
        let payload =
            Base64UrlUnpadded::encode_string(format!("{{\"sub\":\"{sub}\"}}").as_bytes());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn install_parameters_validate_into_typed_request() {
        let params = InstallParameters {
            certificate: Some("-----BEGIN CERTIFICATE-----\nx\n-----END CERTIFICATE-----".into()),
            token: Some(token_for_subject("deployer")),
            api_server: Some("https://cluster.example:6443".into()),
            as_user: None,
            chart: "stable/nginx".into(),
            release_name: Some("web".into()),
            ..Default::default()
        };

        let request = params.validate().unwrap();
        let auth = request.auth.unwrap();
        assert_eq!(auth.as_user, "deployer");
        assert_eq!(request.release, ReleaseIdentifier::Named("web".into()));
    }

    #[test]
    fn partial_credentials_fail_validation() {
        let params = UninstallParameters {
            token: Some("tkn".into()),
            api_server: Some("https://cluster.example:6443".into()),
            as_user: Some("deployer".into()),
            release_name: "web".into(),
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("partial credentials"));
    }

    #[test]
    fn both_release_name_and_generate_name_fail_validation() {
        let params = InstallParameters {
            chart: "stable/nginx".into(),
            release_name: Some("web".into()),
            generate_name: true,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn json_parameters_deserialize_with_camel_case_keys() {
        let params: InstallParameters = serde_json::from_str(
            r#"{
                "chart": "/charts/my-app",
                "releaseName": "my-app-release",
                "namespace": "prod",
                "values": ["image.tag=1.2.3"],
                "workingDirectory": "/work"
            }"#,
        )
        .unwrap();
        assert_eq!(params.chart, "/charts/my-app");
        assert_eq!(params.release_name.as_deref(), Some("my-app-release"));
        assert_eq!(params.working_directory, Some(PathBuf::from("/work")));
    }
}
