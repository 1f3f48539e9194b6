#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use sysproxy_platform::AppPaths;

/// Appends to the log file, reopening it if it was deleted while running.
struct ResilientFileWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ResilientFileWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn with_file<T>(&self, action: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.path.exists() || guard.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *guard = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }
        match guard.as_mut() {
            Some(file) => action(file),
            None => Err(io::Error::other("log file not available")),
        }
    }
}

impl Write for ResilientFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(Write::flush)
    }
}

/// Drops the older half of the log once it grows past `max_log_size`,
/// cutting at a line boundary. Returns whether the file was rewritten.
fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) -> io::Result<bool> {
    let size = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_log_size {
        return Ok(false);
    }

    let contents = std::fs::read(log_path)?;
    let midpoint = contents.len() / 2;
    let cut = match contents[midpoint..].iter().position(|&b| b == b'\n') {
        Some(offset) => midpoint + offset + 1,
        None => midpoint,
    };
    std::fs::write(log_path, &contents[cut..])?;
    Ok(true)
}

/// Installs the global logger: a file under the data directory, plus the
/// terminal in debug builds. Safe to call more than once.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) {
    let Ok(paths) = AppPaths::new() else {
        return;
    };
    let _ = paths.ensure_dirs();
    let log_path = paths.log_file();

    let trimmed = trim_log_file_if_oversized(&log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("sysproxy")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    if let Ok(writer) = ResilientFileWriter::new(log_path.clone()) {
        loggers.push(WriteLogger::new(LevelFilter::Debug, config, writer));
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }

    set_logging_enabled(debug_enabled);

    match trimmed {
        Ok(true) => log::info!("Trimmed {} to its newest half", log_path.display()),
        Ok(false) => {}
        Err(e) => log::warn!("Could not trim {}: {e}", log_path.display()),
    }
    log::debug!("Logging to {}", log_path.display());
}

pub fn set_logging_enabled(enabled: bool) {
    if enabled {
        log::set_max_level(LevelFilter::Debug);
    } else {
        log::set_max_level(LevelFilter::Warn);
    }
}
