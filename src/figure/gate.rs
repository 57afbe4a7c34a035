/// Execution gate
///
/// Decides, for one requested figure, whether its generator script has to run
/// or whether the figure can be served from the sibling cache.
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::cache::{PutMode, SiblingCache};
use super::lock::OwnerLock;
use super::manifest::ManifestStore;
use super::runner::Runner;
use crate::error::{FigureError, FigureResult};
use crate::logging::{operations, services, status};

/// One figure requested by the build graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureRequest {
    /// File name of the owning generator script
    pub script: String,
    /// Bare file name of the requested figure
    pub figure: String,
    /// Number of outputs the calling build step declares
    pub declared_outputs: usize,
}

impl FigureRequest {
    pub fn new(script: impl Into<String>, figure: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            figure: figure.into(),
            declared_outputs: 1,
        }
    }

    pub fn with_declared_outputs(mut self, declared_outputs: usize) -> Self {
        self.declared_outputs = declared_outputs;
        self
    }
}

/// What the gate did for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Script ran without touching the sibling cache
    SingleOutput,
    /// Figure restored from the sibling cache; script not run
    CacheHit,
    /// Script ran and its other outputs were cached
    CacheMiss {
        copied: Vec<String>,
        moved: Vec<String>,
    },
}

impl GateOutcome {
    pub fn ran_script(&self) -> bool {
        !matches!(self, Self::CacheHit)
    }
}

/// Explicit locations and limits for the gate
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Destination directory of every figure
    pub figures_dir: PathBuf,
    /// Maximum wait for another request of the same script
    pub lock_timeout: Duration,
    pub exception_file: Option<PathBuf>,
}

pub struct ExecutionGate<R: Runner> {
    manifest: ManifestStore,
    cache: SiblingCache,
    runner: R,
    settings: GateSettings,
}

impl<R: Runner> ExecutionGate<R> {
    pub fn new(
        manifest: ManifestStore,
        cache: SiblingCache,
        runner: R,
        settings: GateSettings,
    ) -> Self {
        Self {
            manifest,
            cache,
            runner,
            settings,
        }
    }

    pub fn cache(&self) -> &SiblingCache {
        &self.cache
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Satisfy one figure request
    pub fn request(&self, request: &FigureRequest) -> FigureResult<GateOutcome> {
        let declared = self.manifest.lookup_owner(&request.script);
        let others: Vec<String> = declared
            .outputs()
            .iter()
            .filter(|name| **name != request.figure)
            .cloned()
            .collect();

        // The build step handles multiple outputs itself, or there are none
        if others.is_empty() || request.declared_outputs > 1 {
            self.runner.run(&request.script, &request.figure)?;
            info!(
                service = services::GATE,
                operation = operations::REQUEST,
                status = status::SINGLE,
                script = %request.script,
                figure = %request.figure,
                "figure generated"
            );
            return Ok(GateOutcome::SingleOutput);
        }

        let _lock = OwnerLock::acquire(
            self.cache.root(),
            &request.script,
            self.settings.lock_timeout,
            self.settings.exception_file.as_deref(),
        )?;

        let figures_dir = &self.settings.figures_dir;

        if self.cache.has(&request.figure) {
            self.cache.take(&request.figure, figures_dir)?;
            info!(
                service = services::GATE,
                operation = operations::REQUEST,
                status = status::HIT,
                script = %request.script,
                figure = %request.figure,
                "figure served from sibling cache"
            );
            return Ok(GateOutcome::CacheHit);
        }

        // Partition by what the destination holds before the run
        let (copied, moved): (Vec<String>, Vec<String>) = others
            .into_iter()
            .partition(|name| figures_dir.join(name).exists());

        self.runner.run(&request.script, &request.figure)?;

        if let Some(missing) = copied
            .iter()
            .chain(moved.iter())
            .find(|name| !figures_dir.join(name).is_file())
        {
            return Err(missing_output(&request.script, missing, figures_dir));
        }

        for name in &copied {
            self.cache
                .put(&request.script, name, figures_dir, PutMode::Copy)?;
        }
        for name in &moved {
            self.cache
                .put(&request.script, name, figures_dir, PutMode::Move)?;
        }

        info!(
            service = services::GATE,
            operation = operations::REQUEST,
            status = status::MISS,
            script = %request.script,
            figure = %request.figure,
            copied = copied.len(),
            moved = moved.len(),
            "figure generated, sibling outputs cached"
        );

        Ok(GateOutcome::CacheMiss { copied, moved })
    }
}

fn missing_output(script: &str, name: &str, dir: &Path) -> FigureError {
    FigureError::MissingOutput {
        script: script.to_string(),
        name: name.to_string(),
        dir: dir.to_path_buf(),
    }
}
