/// Script runner
///
/// Expands the invocation template and runs it through the shell in the
/// figures directory. Output streams are inherited so the build log shows
/// whatever the generator prints.
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{FigureError, FigureResult};
use crate::logging::{operations, services, status};

/// Runs a generator script to produce `figure`
pub trait Runner {
    fn run(&self, script: &str, figure: &str) -> FigureResult<()>;
}

/// Settings for [`ShellRunner`]
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Template with `{script}` and `{figure}` placeholders
    pub script_cmd: String,
    /// Working directory of the script (the figures directory)
    pub working_dir: PathBuf,
    /// Passed through to script failures for the reporting layer
    pub exception_file: Option<PathBuf>,
    /// Search paths appended after `$HOME/bin`
    pub extra_path: Vec<PathBuf>,
}

/// Runs generator scripts through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    settings: RunnerSettings,
    path: OsString,
}

impl ShellRunner {
    /// Build a runner from the ambient environment. `HOME` must be set.
    pub fn from_env(settings: RunnerSettings) -> FigureResult<Self> {
        let home = std::env::var_os("HOME")
            .ok_or_else(|| FigureError::Config("HOME is not set".to_string()))?;
        let current = std::env::var_os("PATH").unwrap_or_default();
        Self::with_home(settings, Path::new(&home), &current)
    }

    fn with_home(settings: RunnerSettings, home: &Path, current: &OsString) -> FigureResult<Self> {
        let mut paths: Vec<PathBuf> = std::env::split_paths(current).collect();
        paths.push(home.join("bin"));
        paths.extend(settings.extra_path.iter().cloned());

        let path = std::env::join_paths(paths)
            .map_err(|e| FigureError::Config(format!("Invalid search path: {e}")))?;

        Ok(Self { settings, path })
    }

    /// The `PATH` scripts run with
    pub fn search_path(&self) -> &OsString {
        &self.path
    }

    fn shell_command(&self, command_line: &str) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command_line);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command_line);
            cmd
        };

        cmd.current_dir(&self.settings.working_dir);
        cmd.env("PATH", &self.path);
        cmd
    }
}

impl Runner for ShellRunner {
    fn run(&self, script: &str, figure: &str) -> FigureResult<()> {
        let command_line = expand_template(&self.settings.script_cmd, script, figure);
        let start = Instant::now();

        info!(
            service = services::RUNNER,
            operation = operations::RUN,
            script = script,
            figure = figure,
            "running figure script: {}",
            command_line
        );

        let fail = |source: io::Error| {
            FigureError::script_failed(
                script,
                figure,
                self.settings.exception_file.clone(),
                source,
            )
        };

        let exit = self.shell_command(&command_line).status().map_err(fail)?;

        if !exit.success() {
            return Err(fail(io::Error::other(format!(
                "`{command_line}` exited with {exit}"
            ))));
        }

        debug!(
            service = services::RUNNER,
            operation = operations::RUN,
            status = status::SUCCESS,
            script = script,
            duration_ms = start.elapsed().as_millis() as u64,
            "figure script completed"
        );

        Ok(())
    }
}

/// Substitute `{script}` and `{figure}` in `template`
pub fn expand_template(template: &str, script: &str, figure: &str) -> String {
    template
        .replace("{script}", script)
        .replace("{figure}", figure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings(dir: &Path, script_cmd: &str) -> RunnerSettings {
        RunnerSettings {
            script_cmd: script_cmd.to_string(),
            working_dir: dir.to_path_buf(),
            exception_file: Some(dir.join("exception.log")),
            extra_path: vec![],
        }
    }

    #[test]
    fn test_expand_template() {
        assert_eq!(
            expand_template("python {script} --out {figure}", "plot.py", "a.pdf"),
            "python plot.py --out a.pdf"
        );
        assert_eq!(expand_template("make", "plot.py", "a.pdf"), "make");
    }

    #[test]
    fn test_search_path_appends_home_bin() {
        let temp = TempDir::new().unwrap();
        let mut runner_settings = settings(temp.path(), "true");
        runner_settings.extra_path = vec![PathBuf::from("/opt/tex/bin")];

        let runner = ShellRunner::with_home(
            runner_settings,
            Path::new("/home/author"),
            &OsString::from("/usr/bin"),
        )
        .unwrap();

        let paths: Vec<PathBuf> = std::env::split_paths(runner.search_path()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/usr/bin"),
                PathBuf::from("/home/author/bin"),
                PathBuf::from("/opt/tex/bin"),
            ]
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_requires_home() {
        let home = std::env::var_os("HOME");
        std::env::remove_var("HOME");

        let result = ShellRunner::from_env(settings(Path::new("."), "true"));

        if let Some(home) = home {
            std::env::set_var("HOME", home);
        }
        assert!(matches!(result, Err(FigureError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_in_working_dir() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::with_home(
            settings(temp.path(), "echo {script} > {figure}"),
            temp.path(),
            &std::env::var_os("PATH").unwrap_or_default(),
        )
        .unwrap();

        runner.run("plot.py", "a.txt").unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("a.txt")).unwrap().trim(),
            "plot.py"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_script_execution_error() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::with_home(
            settings(temp.path(), "exit 3"),
            temp.path(),
            &std::env::var_os("PATH").unwrap_or_default(),
        )
        .unwrap();

        let err = runner.run("plot.py", "a.pdf").unwrap_err();
        let failure = err.script_failure().expect("script failure");
        assert_eq!(failure.script, "plot.py");
        assert_eq!(
            failure.exception_file,
            Some(temp.path().join("exception.log"))
        );
        assert!(failure.source.to_string().contains("exit"));
    }

    #[test]
    fn test_missing_working_dir_is_script_execution_error() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::with_home(
            settings(&temp.path().join("missing"), "true"),
            temp.path(),
            &std::env::var_os("PATH").unwrap_or_default(),
        )
        .unwrap();

        let err = runner.run("plot.py", "a.pdf").unwrap_err();
        assert!(matches!(err, FigureError::ScriptExecution(_)));
    }
}
