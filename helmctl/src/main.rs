use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use helm_invoke::ops::{InstallParameters, RunCommandParameters, UninstallParameters};
use helm_invoke::{CommandRunner, SandboxConfig, ShellRunner};
use serde::Deserialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "helmctl", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

/// Per-invocation cluster credentials. Either all of them or none.
#[derive(Args)]
struct AuthArgs {
    /// Cluster CA certificate, PEM or base64-encoded PEM
    #[arg(long)]
    certificate: Option<String>,
    /// Service-account bearer token
    #[arg(long)]
    token: Option<String>,
    /// Kubernetes API server URL
    #[arg(long)]
    api_server: Option<String>,
    /// Impersonated user; defaults to the token's subject claim
    #[arg(long)]
    as_user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a chart into the target cluster
    Install {
        /// Chart reference: repo chart or local path
        #[arg(long)]
        chart: String,
        #[arg(long)]
        release_name: Option<String>,
        /// Let helm generate the release name
        #[arg(long)]
        generate_name: bool,
        #[arg(long)]
        namespace: Option<String>,
        /// Value override, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
        #[arg(long)]
        working_directory: Option<PathBuf>,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Uninstall a release
    Uninstall {
        #[arg(long)]
        release_name: String,
        #[arg(long)]
        namespace: Option<String>,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Run an arbitrary helm subcommand string
    Run {
        /// Subcommand and flags, e.g. "list --all"
        #[arg(value_name = "COMMAND", trailing_var_arg = true, required = true)]
        command: Vec<String>,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long)]
        working_directory: Option<PathBuf>,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Execute an operation described by a JSON parameter document
    Invoke {
        /// Path to the JSON document
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// JSON document form of the three operations, tagged the way the
/// platform hands parameters over.
#[derive(Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
enum OperationDoc {
    Install(InstallParameters),
    Uninstall(UninstallParameters),
    RunCommand(RunCommandParameters),
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = SandboxConfig::default();
    let runner = ShellRunner::new();

    let output = match cli.cmd {
        Commands::Install {
            chart,
            release_name,
            generate_name,
            namespace,
            values,
            working_directory,
            auth,
        } => run_install(
            &config,
            &runner,
            InstallParameters {
                certificate: auth.certificate,
                token: auth.token,
                api_server: auth.api_server,
                as_user: auth.as_user,
                chart,
                release_name,
                generate_name,
                namespace,
                values,
                working_directory,
            },
        ),
        Commands::Uninstall {
            release_name,
            namespace,
            auth,
        } => run_uninstall(
            &config,
            &runner,
            UninstallParameters {
                certificate: auth.certificate,
                token: auth.token,
                api_server: auth.api_server,
                as_user: auth.as_user,
                release_name,
                namespace,
            },
        ),
        Commands::Run {
            command,
            namespace,
            working_directory,
            auth,
        } => run_passthrough(
            &config,
            &runner,
            RunCommandParameters {
                certificate: auth.certificate,
                token: auth.token,
                api_server: auth.api_server,
                as_user: auth.as_user,
                command: command.join(" "),
                namespace,
                working_directory,
            },
        ),
        Commands::Invoke { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let doc: OperationDoc = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            match doc {
                OperationDoc::Install(params) => run_install(&config, &runner, params),
                OperationDoc::Uninstall(params) => run_uninstall(&config, &runner, params),
                OperationDoc::RunCommand(params) => run_passthrough(&config, &runner, params),
            }
        }
    };

    match output {
        Ok(stdout) => {
            print!("{stdout}");
            Ok(())
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

fn run_install(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
    params: InstallParameters,
) -> Result<String, helm_invoke::InvokeError> {
    helm_invoke::install(config, runner, params.validate()?)
}

fn run_uninstall(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
    params: UninstallParameters,
) -> Result<String, helm_invoke::InvokeError> {
    helm_invoke::uninstall(config, runner, params.validate()?)
}

fn run_passthrough(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
    params: RunCommandParameters,
) -> Result<String, helm_invoke::InvokeError> {
    helm_invoke::run_command(config, runner, params.validate()?)
}
