//! Error types surfaced by the figure cache.
//!
//! Only failures that abort a request live here. An unreadable manifest is
//! not an error: the manifest store logs it and reports `NotFound`.

use std::path::PathBuf;
use thiserror::Error;

/// Rule name reported with script failures.
pub const FIGURE_RULE: &str = "figure";

pub type FigureResult<T> = Result<T, FigureError>;

#[derive(Error, Debug)]
pub enum FigureError {
    #[error("Cache entry '{name}' vanished from {} before it could be taken", .cache_dir.display())]
    CacheConsistency { name: String, cache_dir: PathBuf },

    #[error("Script '{script}' did not produce declared output '{name}' in {}", .dir.display())]
    MissingOutput {
        script: String,
        name: String,
        dir: PathBuf,
    },

    #[error("{0}")]
    ScriptExecution(Box<ScriptFailure>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Context attached to a failed generator script run.
///
/// Carries what the outer reporting layer needs to render a message; nothing
/// here is formatted for users.
#[derive(Debug)]
pub struct ScriptFailure {
    pub script: String,
    pub rule_name: String,
    pub brief: String,
    pub context: String,
    pub exception_file: Option<PathBuf>,
    pub source: std::io::Error,
}

impl std::fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.brief, self.source)
    }
}

impl FigureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a spawn or exit failure of `script` while producing `figure`.
    pub fn script_failed(
        script: &str,
        figure: &str,
        exception_file: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::ScriptExecution(Box::new(ScriptFailure {
            script: script.to_string(),
            rule_name: FIGURE_RULE.to_string(),
            brief: format!("An error occurred while running figure script {script}"),
            context: format!(
                "figcache attempted to run the script {script} to produce the figure file \
                 {figure}, but an error occurred. Please search the logs above for the \
                 detailed error message."
            ),
            exception_file,
            source,
        }))
    }

    /// Script failure details, if this is one.
    pub fn script_failure(&self) -> Option<&ScriptFailure> {
        match self {
            Self::ScriptExecution(failure) => Some(failure),
            _ => None,
        }
    }
}

impl std::error::Error for ScriptFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_failed_carries_context() {
        let err = FigureError::script_failed(
            "plot.py",
            "a.pdf",
            Some(PathBuf::from("/tmp/exc.log")),
            std::io::Error::other("exit status: 1"),
        );

        let failure = err.script_failure().unwrap();
        assert_eq!(failure.script, "plot.py");
        assert_eq!(failure.rule_name, "figure");
        assert!(failure.brief.contains("plot.py"));
        assert!(failure.context.contains("a.pdf"));
        assert_eq!(failure.exception_file, Some(PathBuf::from("/tmp/exc.log")));
        assert_eq!(
            err.to_string(),
            "An error occurred while running figure script plot.py: exit status: 1"
        );
    }

    #[test]
    fn test_other_errors_have_no_script_failure() {
        let err = FigureError::MissingOutput {
            script: "plot.py".to_string(),
            name: "c.pdf".to_string(),
            dir: PathBuf::from("/figures"),
        };
        assert!(err.script_failure().is_none());
        assert!(err.to_string().contains("c.pdf"));
    }
}
