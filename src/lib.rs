pub mod agent_core;
pub mod config;
pub mod inference;
pub mod sandbox;
pub mod server;

use std::path::{Path, PathBuf};

/// Database row id of a user. Also names the user's sandbox directory.
pub type UserId = i64;

/// Number of rotated `server.log.N` files kept.
const LOG_FILES_KEPT: u32 = 3;

/// Path of the active log file under `data_dir`.
pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("logs").join("server.log")
}

/// Initialize the tracing subscriber: structured logs to
/// `<data_dir>/logs/server.log` plus human-readable output on stderr.
///
/// On each startup:
/// 1. Rotates existing logs (server.log → server.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh server.log with a line-flushing writer for crash resilience.
/// 3. Logs a startup banner with the data directory and log path.
pub fn init_tracing(data_dir: &Path) -> std::io::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let log_path = log_path(data_dir);
    if let Some(log_dir) = log_path.parent() {
        std::fs::create_dir_all(log_dir)?;
    }

    // Rotate: server.log.2 → .3, .1 → .2, server.log → .1
    rotate_log_file(&log_path, LOG_FILES_KEPT);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sandchat=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(FlushingWriter::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    // Startup banner makes it easy to find the right log file
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %data_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== sandchat starting ==="
    );
    Ok(())
}

/// Rotate log files: `server.log` → `server.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so
/// each log line is on disk immediately.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_rotate_keeps_last_three() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("server.log");

        for generation in 0..5 {
            std::fs::write(&base, format!("gen {generation}")).unwrap();
            rotate_log_file(&base, 3);
        }

        assert!(!base.exists());
        let read = |n: u32| std::fs::read_to_string(format!("{}.{n}", base.display())).unwrap();
        assert_eq!(read(1), "gen 4");
        assert_eq!(read(2), "gen 3");
        assert_eq!(read(3), "gen 2");
        assert!(!dir.path().join("server.log.4").exists());
    }

    #[test]
    fn test_log_path_is_under_data_dir() {
        let data_dir = Path::new("/var/lib/sandchat");
        assert_eq!(
            log_path(data_dir),
            PathBuf::from("/var/lib/sandchat/logs/server.log")
        );
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);

        writer.write_all(b"line one\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line one\n");
    }
}
