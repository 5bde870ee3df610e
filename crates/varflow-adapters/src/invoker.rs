//! Invocación de herramientas externas como procesos de línea de comandos.
//!
//! `ToolInvoker` es la costura que los tests sustituyen por implementaciones
//! en memoria. El límite de tiempo lo aplica quien invoca
//! (`invoke_with_timeout`): al vencer, el future se descarta y el proceso
//! hijo se mata por `kill_on_drop`.
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::errors::ToolError;

/// Programa y argumentos de una invocación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(),
               args: Vec::new(),
               working_dir: None }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// Salida capturada de un proceso terminado.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// `None` si el proceso terminó por señal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convierte una salida no exitosa en `ToolError::NonZeroExit`.
    pub fn into_result(self) -> Result<ToolOutput, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::NonZeroExit { code: self.exit_code,
                                         stderr: self.stderr.trim().to_string() })
        }
    }
}

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Aplica el límite de tiempo por invocación.
pub async fn invoke_with_timeout(invoker: &dyn ToolInvoker,
                                 invocation: &ToolInvocation,
                                 timeout: Duration)
                                 -> Result<ToolOutput, ToolError> {
    match tokio::time::timeout(timeout, invoker.invoke(invocation)).await {
        Ok(result) => result,
        Err(_) => Err(ToolError::Timeout(timeout)),
    }
}

/// Invocador real basado en `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args)
               .stdin(Stdio::null())
               .stdout(Stdio::piped())
               .stderr(Stdio::piped())
               .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }
        debug!("spawning {invocation}");
        let mut child = command.spawn().map_err(|e| ToolError::Spawn { program: invocation.program.clone(),
                                                                       message: e.to_string() })?;

        let mut stdout = child.stdout.take().ok_or_else(|| ToolError::Io("stdout pipe unavailable".into()))?;
        let mut stderr = child.stderr.take().ok_or_else(|| ToolError::Io("stderr pipe unavailable".into()))?;
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = child.wait().await?;
        let stdout = stdout_task.await
                                .map_err(|e| ToolError::Io(format!("stdout reader failed: {e}")))??;
        let stderr = stderr_task.await
                                .map_err(|e| ToolError::Io(format!("stderr reader failed: {e}")))??;
        // stdout se interpreta posicionalmente; stderr sólo se muestra.
        let stdout =
            String::from_utf8(stdout).map_err(|e| ToolError::InvalidOutput(format!("stdout is not valid UTF-8: {e}")))?;
        Ok(ToolOutput { exit_code: status.code(),
                        stdout,
                        stderr: String::from_utf8_lossy(&stderr).into_owned(),
                        duration: start.elapsed() })
    }
}

/// Comprueba que un fichero de salida exista y no esté vacío.
pub async fn require_output(path: &Path) -> Result<(), ToolError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ToolError::MissingOutput(path.to_path_buf())),
    }
}
