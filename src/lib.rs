pub mod agent_core;
pub mod capabilities;
pub mod inference;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Rotate `agent.log` once it grows past this many bytes.
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated files kept next to `agent.log`.
const KEPT_LOG_FILES: u32 = 3;

const DEFAULT_LOG_FILTER: &str = "chatpilot=info,warn";

/// Return the platform-standard data directory for ChatPilot.
///
/// - macOS: `~/Library/Application Support/com.chatpilot.app/`
/// - Linux: `$XDG_DATA_HOME/com.chatpilot.app/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.chatpilot/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.chatpilot.app");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chatpilot")
}

/// Initialize the tracing subscriber.
///
/// Logs go to `<data_dir>/logs/agent.log` through a line-flushing writer,
/// rotating first when the file is over 10 MB. When the log file cannot be
/// opened, logs go to stderr instead. `RUST_LOG` overrides the default
/// filter. Fails only if a global subscriber is already installed.
pub fn init_tracing() -> std::io::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let log_dir = data_dir().join("logs");
    let log_path = log_dir.join("agent.log");

    let installed = match open_log_file(&log_path) {
        Ok(file) => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(FlushingWriter::new(file))
            .with_ansi(false)
            .with_target(true)
            .try_init(),
        Err(e) => {
            eprintln!("chatpilot: cannot open {}: {e}; logging to stderr", log_path.display());
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
        }
    };
    installed.map_err(|e| std::io::Error::other(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== ChatPilot starting ==="
    );
    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    rotate_if_oversized(path, MAX_LOG_BYTES, KEPT_LOG_FILES)?;
    OpenOptions::new().create(true).append(true).open(path)
}

/// Rotate `agent.log` → `agent.log.1` → `.2` … when it exceeds `max_bytes`.
///
/// The oldest file beyond `keep` is deleted. Returns whether a rotation happened.
fn rotate_if_oversized(base_path: &Path, max_bytes: u64, keep: u32) -> std::io::Result<bool> {
    let size = match std::fs::metadata(base_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_bytes {
        return Ok(false);
    }

    let numbered = |i: u32| PathBuf::from(format!("{}.{i}", base_path.display()));
    let _ = std::fs::remove_file(numbered(keep));
    for i in (1..keep).rev() {
        let from = numbered(i);
        if from.exists() {
            std::fs::rename(&from, numbered(i + 1))?;
        }
    }
    std::fs::rename(base_path, numbered(1))?;
    Ok(true)
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// Log lines reach the disk immediately, so nothing is lost on a crash.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
