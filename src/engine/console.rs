//! Operator-facing run log
//!
//! Every line goes to the console and to `run.txt` from a single call site,
//! so the two sinks always agree on ordering. The file copy has ANSI escapes
//! stripped, and transient progress lines (anything carrying the
//! clear-line escape, or blank once escapes are removed) stay on screen only.

use regex::Regex;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

static ANSI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

pub const CLEAR_LINE: &str = "\x1b[2K";
pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";
pub const RESET: &str = "\x1b[0m";

pub const RUN_LOG_FILE: &str = "run.txt";

pub fn strip_ansi(text: &str) -> String {
    ANSI_REGEX.replace_all(text, "").into_owned()
}

/// The stripped form of `line` destined for `run.txt`, or `None` when the
/// line is transient or blank
pub fn file_form(line: &str) -> Option<String> {
    if line.contains(CLEAR_LINE) {
        return None;
    }
    let stripped = strip_ansi(line);
    if stripped.trim().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

struct Sinks {
    console: Box<dyn Write + Send>,
    file: Option<BufWriter<File>>,
    status_active: bool,
}

pub struct RunLog {
    sinks: Mutex<Sinks>,
    path: Option<PathBuf>,
}

impl RunLog {
    pub fn new(console: Box<dyn Write + Send>, file: Option<(File, PathBuf)>) -> Self {
        let (file, path) = match file {
            Some((file, path)) => (Some(BufWriter::new(file)), Some(path)),
            None => (None, None),
        };
        Self {
            sinks: Mutex::new(Sinks {
                console,
                file,
                status_active: false,
            }),
            path,
        }
    }

    /// Console on stdout, file at `<data_dir>/run.txt`
    pub fn create(data_dir: &Path) -> io::Result<Self> {
        Self::with_console(Box::new(io::stdout()), data_dir)
    }

    pub fn with_console(console: Box<dyn Write + Send>, data_dir: &Path) -> io::Result<Self> {
        let path = data_dir.join(RUN_LOG_FILE);
        let file = File::create(&path)?;
        Ok(Self::new(console, Some((file, path))))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sinks> {
        // A panic while holding the lock leaves plain buffers behind; keep logging
        self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write one line to both sinks
    pub fn line(&self, text: &str) {
        let mut sinks = self.lock();
        if sinks.status_active {
            let _ = write!(sinks.console, "\r{}", CLEAR_LINE);
            sinks.status_active = false;
        }
        let _ = writeln!(sinks.console, "{}", text);
        let _ = sinks.console.flush();

        if let Some(stripped) = file_form(text) {
            if let Some(file) = sinks.file.as_mut() {
                let _ = writeln!(file, "{}", stripped);
                let _ = file.flush();
            }
        }
    }

    /// Multi-line text, one `line` call per line
    pub fn block(&self, text: &str) {
        for l in text.lines() {
            self.line(l);
        }
    }

    /// Overwrite the transient status line in place (console only)
    pub fn status(&self, text: &str) {
        let mut sinks = self.lock();
        let _ = write!(sinks.console, "\r{}{}", CLEAR_LINE, text);
        let _ = sinks.console.flush();
        sinks.status_active = true;
    }

    pub fn clear_status(&self) {
        let mut sinks = self.lock();
        if sinks.status_active {
            let _ = write!(sinks.console, "\r{}", CLEAR_LINE);
            let _ = sinks.console.flush();
            sinks.status_active = false;
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut sinks = self.lock();
        sinks.console.flush()?;
        if let Some(file) = sinks.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// In-memory console for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
