use crate::command::Invocation;
use crate::error::InvokeError;
use std::process::{Command, Stdio};

/// Captured output of one external execution.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
}

/// Boundary to the external process-execution primitive: command text
/// plus environment in, captured output or spawn failure out.
///
/// No timeout is imposed here; cancellation is the host platform's
/// responsibility.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecOutput, InvokeError>;
}

/// Runs the invocation through `/bin/sh -c`, which resolves the
/// `$VAR` indirections in the command text from the supplied
/// environment at spawn time.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecOutput, InvokeError> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&invocation.command_text)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| InvokeError::Spawn {
                runtime: self.shell.clone(),
                source: err,
            })?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn shell_runner_resolves_indirection_variables() {
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());
        let invocation = Invocation {
            command_text: "printf %s \"$GREETING\"".to_string(),
            env,
        };

        let output = ShellRunner::new().run(&invocation).unwrap();
        assert_eq!(output.status, Some(0));
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn non_zero_exit_is_reported_in_status() {
        let invocation = Invocation {
            command_text: "exit 3".to_string(),
            env: BTreeMap::new(),
        };
        let output = ShellRunner::new().run(&invocation).unwrap();
        assert_eq!(output.status, Some(3));
    }

    #[test]
    fn missing_shell_is_a_spawn_error() {
        let runner = ShellRunner {
            shell: "/nonexistent/shell".to_string(),
        };
        let invocation = Invocation {
            command_text: "true".to_string(),
            env: BTreeMap::new(),
        };
        assert!(matches!(
            runner.run(&invocation),
            Err(InvokeError::Spawn { .. })
        ));
    }
}
