use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use once_cell::sync::OnceCell;

static LOG_FILE: OnceCell<PathBuf> = OnceCell::new();

/// Log file location under the user's local data directory
fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tonescope")
        .join("logs")
        .join("tonescope.log")
}

/// Writes every record to stderr and appends it to the log file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(path: &PathBuf) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging. `RUST_LOG` overrides the default `info` filter.
///
/// With `to_file`, records are also appended to [`log_file_path`]. If the
/// file cannot be opened, logging falls back to stderr only.
pub fn init_logging(to_file: bool) {
    init_with_log_file(to_file.then(default_log_path));
}

fn init_with_log_file(log_path: Option<PathBuf>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    let mut file_error = None;
    let mut active_path = None;
    if let Some(path) = log_path {
        match open_log_file(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
                active_path = Some(path);
            }
            Err(e) => file_error = Some((path, e)),
        }
    }

    if builder.try_init().is_err() {
        // Already initialized (tests, or a host that set its own logger)
        return;
    }
    if let Some(path) = active_path {
        let _ = LOG_FILE.set(path);
    }

    if let Some((path, e)) = file_error {
        log::warn!("Could not open log file {}: {}", path.display(), e);
    }
    log::info!("tonescope {} started", crate::VERSION);
}

/// Path of the log file, when file logging is active
pub fn log_file_path() -> Option<&'static PathBuf> {
    LOG_FILE.get()
}
