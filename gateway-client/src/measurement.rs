//! Wall-clock timing of submission attempts.
//!
//! Every attempt appends one line with the elapsed seconds to an
//! append-only file. The append happens on every exit path of the timed
//! work, including panics and cancellation.

use std::{
    fs::OpenOptions,
    future::Future,
    io::{self, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub operation: String,
    pub elapsed: Duration,
}

impl Measurement {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

#[derive(Error, Debug)]
#[error("Failed to append {} measurement to {}: {source}", .measurement.operation, .path.display())]
pub struct MeasurementError {
    pub measurement: Measurement,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone)]
pub struct MeasurementLog {
    path: PathBuf,
}

impl MeasurementLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MeasurementLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the elapsed seconds as one line.
    ///
    /// The line goes out in a single `write_all` on a file opened in append
    /// mode, so concurrent writers do not interleave partial lines.
    pub fn append(&self, measurement: &Measurement) -> Result<(), MeasurementError> {
        let line = format!("{}\n", measurement.elapsed_seconds());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|source| MeasurementError {
                measurement: measurement.clone(),
                path: self.path.clone(),
                source,
            })
    }
}

/// Records a measurement when stopped, or when dropped without being stopped.
struct Stopwatch<'a> {
    label: &'a str,
    log: &'a MeasurementLog,
    start: Instant,
    stopped: bool,
}

impl<'a> Stopwatch<'a> {
    fn start(label: &'a str, log: &'a MeasurementLog) -> Self {
        Stopwatch {
            label,
            log,
            start: Instant::now(),
            stopped: false,
        }
    }

    fn stop(&mut self) -> Result<Measurement, MeasurementError> {
        self.stopped = true;
        let measurement = Measurement {
            operation: self.label.to_owned(),
            elapsed: self.start.elapsed(),
        };
        self.log.append(&measurement)?;
        debug!(
            "{} took {:.3}s, appended to {}",
            measurement.operation,
            measurement.elapsed_seconds(),
            self.log.path().display()
        );
        Ok(measurement)
    }
}

impl Drop for Stopwatch<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(e) = self.stop() {
                error!("{e}");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimedInvoker {
    log: MeasurementLog,
}

impl TimedInvoker {
    pub fn new(log: MeasurementLog) -> Self {
        TimedInvoker { log }
    }

    pub fn log(&self) -> &MeasurementLog {
        &self.log
    }

    /// Runs `work` and appends its wall-clock duration to the log.
    ///
    /// The work's output is returned untouched, so a failed attempt is
    /// measured first and then handed back to the caller. A failed append is
    /// returned alongside the output instead of replacing it.
    pub async fn invoke<F, T>(
        &self,
        label: &str,
        work: F,
    ) -> (T, Result<Measurement, MeasurementError>)
    where
        F: Future<Output = T>,
    {
        let mut stopwatch = Stopwatch::start(label, &self.log);
        let output = work.await;
        let measurement = stopwatch.stop();
        (output, measurement)
    }
}
