use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `-w` format understood by [`crate::WriteOut`].
pub const WRITE_OUT_FORMAT: &str = "Connect Time: %{time_connect}, TLS Handshake: %{time_appconnect}, Total Time: %{time_total}, %{http_code}\n";

/// Fixed part of the TLS client command line, shared by every request in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    pub program: PathBuf,
    pub url: String,
    /// Minimum TLS version, e.g. `1.3` becomes `--tlsv1.3`. Empty to let the tool decide.
    pub tls_version: String,
    /// Key-exchange groups offered, passed as `--curves`.
    pub curves: Option<String>,
    pub cacert: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl ClientCommand {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(program: P, url: S) -> ClientCommand {
        ClientCommand {
            program: program.into(),
            url: url.into(),
            tls_version: "1.3".into(),
            curves: None,
            cacert: None,
            extra_args: Vec::new(),
        }
    }

    /// Arguments for one request writing its trace to `trace_path`.
    pub fn args(&self, trace_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if !self.tls_version.is_empty() {
            args.push(format!("--tlsv{}", self.tls_version).into());
        }
        if let Some(curves) = &self.curves {
            args.push("--curves".into());
            args.push(curves.into());
        }
        if let Some(cacert) = &self.cacert {
            args.push("--cacert".into());
            args.push(cacert.into());
        }
        args.push("-w".into());
        args.push(WRITE_OUT_FORMAT.into());
        args.push("-s".into());
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(self.url.as_str().into());
        args.push("--trace".into());
        args.push(trace_path.into());
        args.push("-o".into());
        args.push("/dev/null".into());
        args
    }

    pub fn invocation(&self, request_number: u64, trace_path: PathBuf) -> Invocation {
        Invocation {
            request_number,
            program: self.program.clone().into_os_string(),
            args: self.args(&trace_path),
            trace_path,
        }
    }
}

/// Everything needed to run the client tool for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request_number: u64,
    pub program: OsString,
    pub args: Vec<OsString>,
    pub trace_path: PathBuf,
}
