use crate::command::Invocation;
use crate::FutureResponse;
use futures::FutureExt;
use std::io;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// What the client tool left behind once it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl TransportOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not start '{program}': {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed waiting for '{program}': {source}")]
    Wait { program: String, source: io::Error },
}

/// Runs one client invocation to completion.
///
/// Dropping the returned future before it resolves must abandon the request;
/// this is how in-flight requests are cancelled.
pub trait Transport: Send + Sync {
    fn invoke(&self, invocation: &Invocation) -> FutureResponse<TransportOutput, TransportError>;
}

/// Spawns the invocation as a child process. The child is killed if the
/// future is dropped before it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTransport;

impl ProcessTransport {
    pub fn new() -> ProcessTransport {
        ProcessTransport
    }
}

impl Transport for ProcessTransport {
    fn invoke(&self, invocation: &Invocation) -> FutureResponse<TransportOutput, TransportError> {
        let program = invocation.program.to_string_lossy().into_owned();
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        async move {
            let child = cmd.spawn().map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;
            let output = child
                .wait_with_output()
                .await
                .map_err(|source| TransportError::Wait { program, source })?;
            Ok(TransportOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn shell(script: &str) -> Invocation {
        Invocation {
            request_number: 1,
            program: "sh".into(),
            args: vec!["-c".into(), OsString::from(script)],
            trace_path: PathBuf::from("/dev/null"),
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = ProcessTransport::new()
            .invoke(&shell("printf 'Connect Time: 0.1'; exit 0"))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "Connect Time: 0.1");
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_an_error() {
        let out = ProcessTransport::new()
            .invoke(&shell("echo boom >&2; exit 35"))
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(35));
        assert_eq!(out.stderr.trim(), "boom");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let inv = Invocation {
            request_number: 1,
            program: "/definitely/not/a/tls/client".into(),
            args: vec![],
            trace_path: PathBuf::from("/dev/null"),
        };
        match ProcessTransport::new().invoke(&inv).await {
            Err(TransportError::Spawn { program, .. }) => {
                assert_eq!(program, "/definitely/not/a/tls/client")
            }
            other => panic!("expected spawn error, got {:?}", other),
        }
    }
}
