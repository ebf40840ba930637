use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
    fn debug_log(&self, message: &str);
}

/// Logger handle shared between the resolver, strategies and the binder.
pub type SharedLogger = Arc<dyn Logger>;

pub fn null_logger() -> SharedLogger {
    Arc::new(NullLogger)
}

#[derive(Debug)]
pub struct FileLogger {
    log_file: String,
    debug: bool,
}

impl FileLogger {
    pub fn new(log_file: &str, debug: bool) -> std::io::Result<Self> {
        if let Some(parent) = Path::new(log_file).parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(FileLogger {
            log_file: log_file.to_string(),
            debug,
        })
    }

    fn write_to_file(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        writeln!(file, "{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
    }
}

impl Logger for FileLogger {
    fn log(&self, message: &str) {
        if let Err(e) = self.write_to_file(message) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }

    fn debug_log(&self, message: &str) {
        if self.debug {
            if let Err(e) = self.write_to_file(&format!("[DEBUG] {}", message)) {
                eprintln!("Failed to write debug log: {}", e);
            }
        }
    }
}

/// Writes to stderr so stdout stays clean for command output.
#[derive(Debug, Default)]
pub struct ConsoleLogger {
    debug: bool,
}

impl ConsoleLogger {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        eprintln!("{}: {}", Local::now().format("%H:%M:%S"), message);
    }

    fn debug_log(&self, message: &str) {
        if self.debug {
            eprintln!("{}: [DEBUG] {}", Local::now().format("%H:%M:%S"), message);
        }
    }
}

#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _message: &str) {}
    fn debug_log(&self, _message: &str) {}
}

/// Keeps messages in memory; handy for asserting on log output.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn push(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}

impl Logger for MemoryLogger {
    fn log(&self, message: &str) {
        self.push(message.to_string());
    }

    fn debug_log(&self, message: &str) {
        self.push(format!("[DEBUG] {}", message));
    }
}

// MultiLogger allows logging to multiple destinations
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<SharedLogger>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, logger: SharedLogger) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl Logger for MultiLogger {
    fn log(&self, message: &str) {
        for logger in &self.loggers {
            logger.log(message);
        }
    }

    fn debug_log(&self, message: &str) {
        for logger in &self.loggers {
            logger.debug_log(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_logger_skips_debug_unless_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("kube-connect.log");
        let logger = FileLogger::new(path.to_str().unwrap(), false).unwrap();

        logger.log("resolved context dev");
        logger.debug_log("hidden");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("resolved context dev"));
        assert!(!contents.contains("hidden"));
    }

    #[test]
    fn multi_logger_fans_out() {
        let first = Arc::new(MemoryLogger::new());
        let second = Arc::new(MemoryLogger::new());
        let multi = MultiLogger::new()
            .add(first.clone())
            .add(second.clone());

        multi.log("hello");
        multi.debug_log("details");

        assert_eq!(first.entries(), vec!["hello", "[DEBUG] details"]);
        assert_eq!(second.entries(), first.entries());
    }
}
