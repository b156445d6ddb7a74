//! Process logging with per-run capture.
//!
//! `init` installs an `env_logger` logger (default filter `info`, `RUST_LOG` overrides)
//! wrapped in a tee. While a [`RunLog`] is open, every record that passes the filter is
//! also appended to that file as `<unix-seconds> - <LEVEL> - <message>`.
//!
//! One run log is open at a time; opening another replaces the current one. A replaced
//! handle no longer owns the writer, so dropping it leaves the newer log open.

use env_logger::Env;
use log::{Log, Metadata, Record};
use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

struct ActiveLog {
    id: u64,
    writer: LineWriter<File>,
}

static RUN_LOG: Mutex<Option<ActiveLog>> = Mutex::new(None);
static NEXT_RUN_LOG_ID: AtomicU64 = AtomicU64::new(1);

struct TeeLogger {
    inner: env_logger::Logger,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);
        capture(record);
    }

    fn flush(&self) {
        self.inner.flush();
        if let Ok(mut guard) = RUN_LOG.lock() {
            if let Some(active) = guard.as_mut() {
                let _ = active.writer.flush();
            }
        }
    }
}

/// Install the process logger. Later calls are no-ops.
pub fn init() {
    let inner = env_logger::Builder::from_env(Env::default().default_filter_or("info")).build();
    let max_level = inner.filter();
    if log::set_boxed_logger(Box::new(TeeLogger { inner })).is_ok() {
        log::set_max_level(max_level);
    }
}

fn format_line(record: &Record<'_>) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{} - {} - {}\n", secs, record.level(), record.args())
}

fn capture(record: &Record<'_>) {
    let Ok(mut guard) = RUN_LOG.lock() else {
        return;
    };
    if let Some(active) = guard.as_mut() {
        let _ = active.writer.write_all(format_line(record).as_bytes());
    }
}

/// Scoped run log. The file is truncated on open and released on drop.
#[derive(Debug)]
pub struct RunLog {
    id: u64,
    path: PathBuf,
}

impl RunLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let id = NEXT_RUN_LOG_ID.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = RUN_LOG.lock() {
            *guard = Some(ActiveLog {
                id,
                writer: LineWriter::new(file),
            });
        }
        Ok(Self {
            id,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Ok(mut guard) = RUN_LOG.lock() {
            if guard.as_ref().is_some_and(|active| active.id == self.id) {
                if let Some(mut active) = guard.take() {
                    let _ = active.writer.flush();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn records_are_captured_while_open() {
        let _guard = LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("run.log");
        {
            let run_log = RunLog::open(&path).unwrap();
            assert_eq!(run_log.path(), path.as_path());
            capture(
                &Record::builder()
                    .args(format_args!("frame_0001: perception degraded"))
                    .level(Level::Warn)
                    .build(),
            );
        }
        capture(
            &Record::builder()
                .args(format_args!("after close"))
                .level(Level::Info)
                .build(),
        );

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let parts: Vec<&str> = lines[0].splitn(3, " - ").collect();
        assert!(parts[0].parse::<u64>().is_ok());
        assert_eq!(parts[1], "WARN");
        assert_eq!(parts[2], "frame_0001: perception degraded");
    }

    #[test]
    fn dropping_a_replaced_log_keeps_the_newer_one_open() {
        let _guard = LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let first_path = dir.path().join("first.log");
        let second_path = dir.path().join("second.log");

        let first = RunLog::open(&first_path).unwrap();
        let second = RunLog::open(&second_path).unwrap();
        drop(first);
        capture(
            &Record::builder()
                .args(format_args!("frame_0002: styled"))
                .level(Level::Info)
                .build(),
        );
        drop(second);

        assert_eq!(std::fs::read_to_string(&first_path).unwrap(), "");
        let text = std::fs::read_to_string(&second_path).unwrap();
        assert!(text.ends_with(" - INFO - frame_0002: styled\n"), "{}", text);
    }

    #[test]
    fn open_truncates_previous_run() {
        let _guard = LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "stale\n").unwrap();
        drop(RunLog::open(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
