use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use super::{RegistryError, RegistryResult};

/// Handle to the JSON log file of the current run.
///
/// The subscriber is installed before the run directory exists; events
/// emitted before [`RunLog::attach`] only reach stderr.
#[derive(Clone, Default)]
pub struct RunLog {
    file: Arc<Mutex<Option<File>>>,
}

impl RunLog {
    /// Start appending JSON events to `path`.
    pub fn attach(&self, path: &Path) -> RegistryResult<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *lock(&self.file)? = Some(file);
        Ok(())
    }
}

/// Install stderr logging (`RUST_LOG`, default `info`) and the JSON file
/// layer fed through the returned handle.
pub fn init_logging() -> RegistryResult<RunLog> {
    let log = RunLog::default();
    let shared = Arc::clone(&log.file);
    let make_writer = BoxMakeWriter::new(move || SharedWriter {
        file: Arc::clone(&shared),
    });

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(make_writer)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stderr)
        .with(json)
        .try_init()
        .map_err(|err| RegistryError::Logging(err.to_string()))?;

    Ok(log)
}

struct SharedWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock(&self.file)?.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.file)?.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn lock(file: &Mutex<Option<File>>) -> io::Result<MutexGuard<'_, Option<File>>> {
    file.lock()
        .map_err(|_| io::Error::other("failed to lock log file"))
}
