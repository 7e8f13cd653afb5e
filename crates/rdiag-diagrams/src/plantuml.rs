//! `PlantUML` command-line renderer.
//!
//! Locates a `PlantUML` installation (native launcher or `plantuml.jar`) and
//! runs it as a child process bounded by a timeout. Each invocation drives a
//! current-thread tokio runtime, so callers stay blocking.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::consts::DEFAULT_TIMEOUT;
use crate::language::DiagramFormat;
use crate::renderer::{RenderError, Renderer};

/// Well-known native launcher locations, checked after `PATH`.
const COMMON_COMMAND_PATHS: &[&str] = &[
    "/opt/homebrew/bin/plantuml",
    "/usr/local/bin/plantuml",
    "/usr/bin/plantuml",
];

/// Well-known jar locations. Entries starting with `~/` are relative to `$HOME`.
const COMMON_JAR_PATHS: &[&str] = &[
    "plantuml.jar",
    "/usr/local/bin/plantuml.jar",
    "/usr/share/plantuml/plantuml.jar",
    "~/plantuml.jar",
    "~/bin/plantuml.jar",
];

/// Homebrew keeps the jar under a versioned directory.
const HOMEBREW_JAR_GLOB: &str = "/opt/homebrew/Cellar/plantuml/*/libexec/plantuml.jar";

/// Environment variable pointing at `plantuml.jar`.
const JAR_ENV_VAR: &str = "PLANTUML_JAR";

/// How `PlantUML` is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlantUmlCommand {
    /// Native launcher script or binary.
    Native(PathBuf),
    /// `java -jar <path>`.
    Jar(PathBuf),
}

impl PlantUmlCommand {
    /// Locate an installation.
    ///
    /// Explicit settings win; then `plantuml` on `PATH`, well-known launcher
    /// locations, well-known jar locations, and finally `$PLANTUML_JAR`.
    #[must_use]
    pub fn locate(explicit_command: Option<&Path>, explicit_jar: Option<&Path>) -> Option<Self> {
        if let Some(command) = explicit_command {
            return Some(Self::Native(command.to_path_buf()));
        }
        if let Some(jar) = explicit_jar {
            return Some(Self::Jar(jar.to_path_buf()));
        }

        if let Some(found) = find_in_path("plantuml") {
            return Some(Self::Native(found));
        }
        if let Some(found) = COMMON_COMMAND_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| is_executable(p))
        {
            return Some(Self::Native(found));
        }

        find_jar().map(Self::Jar)
    }

    /// Whether this invocation needs a Java runtime.
    #[must_use]
    pub fn needs_java(&self) -> bool {
        matches!(self, Self::Jar(_))
    }

    /// Base command, ready for `PlantUML` arguments.
    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            Self::Native(path) => Command::new(path),
            Self::Jar(jar) => {
                let mut cmd = Command::new("java");
                cmd.arg("-jar").arg(jar);
                cmd
            }
        }
    }
}

impl std::fmt::Display for PlantUmlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(path) => write!(f, "{}", path.display()),
            Self::Jar(jar) => write!(f, "java -jar {}", jar.display()),
        }
    }
}

/// [`Renderer`] backed by the `PlantUML` command line.
#[derive(Debug, Clone)]
pub struct PlantUmlRenderer {
    command: Option<PlantUmlCommand>,
    timeout: Duration,
}

impl PlantUmlRenderer {
    /// Create a renderer using the given invocation (or none, if not installed).
    #[must_use]
    pub fn new(command: Option<PlantUmlCommand>) -> Self {
        Self {
            command,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a renderer from an auto-discovered installation.
    #[must_use]
    pub fn discover(explicit_command: Option<&Path>, explicit_jar: Option<&Path>) -> Self {
        let command = PlantUmlCommand::locate(explicit_command, explicit_jar);
        match &command {
            Some(found) => tracing::info!("using PlantUML: {found}"),
            None => tracing::warn!("no PlantUML installation found"),
        }
        Self::new(command)
    }

    /// Set the timeout for a single invocation.
    ///
    /// Default is 30 seconds.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The invocation in use, if any.
    #[must_use]
    pub fn plantuml(&self) -> Option<&PlantUmlCommand> {
        self.command.as_ref()
    }

    fn installed(&self) -> Result<&PlantUmlCommand, RenderError> {
        self.command.as_ref().ok_or(RenderError::NotInstalled)
    }
}

impl Renderer for PlantUmlRenderer {
    /// Pipe the source through `PlantUML` and write the image ourselves.
    ///
    /// `-pipe` ignores any name given after `@startuml`, so the artifact is
    /// always `output_dir/<source stem>.<format>`. Nothing is written unless
    /// the process exits successfully within the timeout.
    fn render(
        &self,
        source_path: &Path,
        output_dir: &Path,
        format: DiagramFormat,
    ) -> Result<(), RenderError> {
        let plantuml = self.installed()?;
        let stem = source_path.file_stem().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no file name in {}", source_path.display()),
            )
        })?;
        let source = std::fs::read(source_path)?;

        let mut cmd = plantuml.command();
        cmd.arg(format_flag(format)).arg("-pipe");

        tracing::debug!(?cmd, source = %source_path.display(), "running PlantUML");
        let image = run_with_timeout(cmd, self.timeout, Some(&source))?.into_stdout()?;
        if image.is_empty() {
            tracing::warn!("PlantUML produced no output for {}", source_path.display());
            return Ok(());
        }

        std::fs::create_dir_all(output_dir)?;
        let target = output_dir.join(format!("{}.{}", stem.to_string_lossy(), format.as_str()));
        let mut staged = tempfile::NamedTempFile::new_in(output_dir)?;
        staged.write_all(&image)?;
        staged.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn check_syntax(&self, source: &str) -> Result<(), RenderError> {
        let plantuml = self.installed()?;

        let mut file = tempfile::Builder::new()
            .prefix("rdiag-")
            .suffix(".puml")
            .tempfile()?;
        file.write_all(source.as_bytes())?;
        file.flush()?;

        let mut cmd = plantuml.command();
        cmd.arg("-syntax").arg(file.path());
        run_with_timeout(cmd, self.timeout, None)?.into_stdout()?;
        Ok(())
    }
}

fn format_flag(format: DiagramFormat) -> &'static str {
    match format {
        DiagramFormat::Png => "-tpng",
        DiagramFormat::Svg => "-tsvg",
    }
}

/// Captured result of a finished child process.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ProcessOutput {
    /// Stdout of a successful run.
    ///
    /// A non-zero exit maps to [`RenderError::Failed`] carrying stderr, else
    /// stdout, else a placeholder.
    fn into_stdout(self) -> Result<Vec<u8>, RenderError> {
        if self.status.success() {
            return Ok(self.stdout);
        }
        let stdout = String::from_utf8_lossy(&self.stdout);
        let message = [self.stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("Unknown error")
            .to_owned();
        Err(RenderError::Failed {
            code: self.status.code(),
            message,
        })
    }
}

/// Run a command to completion, killing it once `timeout` has elapsed.
///
/// `input`, when given, is written to the child's stdin. The child is also
/// killed when collecting its output fails.
pub(crate) fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    input: Option<&[u8]>,
) -> Result<ProcessOutput, RenderError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RenderError::Spawn {
            program: program.clone(),
            source,
        })?;

        let err = match tokio::time::timeout(timeout, collect_output(&mut child, input)).await {
            Ok(Ok(output)) => return Ok(output),
            Ok(Err(e)) => RenderError::Io(e),
            Err(_) => {
                tracing::warn!("{program} exceeded {timeout:?}, killing it");
                RenderError::Timeout(timeout)
            }
        };
        if let Err(e) = child.kill().await {
            tracing::warn!("failed to kill {program}: {e}");
        }
        Err(err)
    })
}

/// Feed stdin while draining both output pipes, so neither side can block.
async fn collect_output(child: &mut Child, input: Option<&[u8]>) -> io::Result<ProcessOutput> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            // The child may exit without reading everything
            if let Err(e) = stdin.write_all(input).await
                && e.kind() != io::ErrorKind::BrokenPipe
            {
                return Err(e);
            }
        }
        Ok(())
    };

    let (fed, stdout, stderr, status) =
        tokio::join!(feed, read_pipe(stdout), read_pipe(stderr), child.wait());
    let status = status?;
    fed?;

    Ok(ProcessOutput {
        status,
        stdout: stdout?,
        stderr: String::from_utf8_lossy(&stderr?).into_owned(),
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Search `PATH` for an executable.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn find_jar() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);

    let fixed = COMMON_JAR_PATHS.iter().find_map(|p| {
        let path = match p.strip_prefix("~/") {
            Some(rest) => home.as_ref()?.join(rest),
            None => PathBuf::from(p),
        };
        path.is_file().then_some(path)
    });
    if fixed.is_some() {
        return fixed;
    }

    if let Some(found) = glob::glob(HOMEBREW_JAR_GLOB)
        .ok()
        .and_then(|mut paths| paths.find_map(Result::ok))
    {
        return Some(found);
    }

    std::env::var_os(JAR_ENV_VAR)
        .map(PathBuf::from)
        .filter(|p| p.is_file())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
