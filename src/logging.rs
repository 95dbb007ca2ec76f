//! Per-run logging.
//!
//! A [`RunLog`] mirrors log records to stderr and to a
//! timestamped file in the output folder. It is not installed
//! process wide: the run executes inside [`RunLog::scope`], so
//! consecutive runs (see `reflectance-batch`) each get their
//! own file.

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use chrono::Utc;
use tracing::{dispatcher, info, Dispatch};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

pub struct RunLog {
    dispatch: Dispatch,
    path: PathBuf,
}

impl RunLog {
    /// Create `calibration_<UTC time>.log` in `output_dir`.
    /// Verbosity follows `RUST_LOG`, `info` by default.
    pub fn create(output_dir: &Path) -> Result<Self> {
        let path = output_dir.join(format!(
            "calibration_{}.log",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let file = File::create(&path)?;

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let console = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        let log_file = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file));

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .with(log_file);

        Ok(RunLog {
            dispatch: Dispatch::new(subscriber),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with this log receiving every record emitted
    /// on the current thread.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }
}

/// Wall time of one pipeline stage, logged when finished.
pub struct StageTimer {
    name: &'static str,
    start: Instant,
}

impl StageTimer {
    pub fn start(name: &'static str) -> Self {
        StageTimer {
            name,
            start: Instant::now(),
        }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!("{:<15} done in {:.3?}", format!("[{}]", self.name), elapsed);
        elapsed
    }
}
