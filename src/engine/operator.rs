//! Operator control of a running run
//!
//! Pressing `s` or `S` asks the executor to stop after the current activity.
//! Keys are read on a dedicated thread; the executor only polls a flag at
//! activity boundaries, so a stop request never interrupts a job mid-flight.

use std::io::{IsTerminal, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared stop/cancel flags for one run
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stop_requested: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graceful stop: finish the current activity, then halt
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Hard cancel: activities that have not yet reached their remote call give up
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.request_stop();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub fn is_stop_key(byte: u8) -> bool {
    matches!(byte, b's' | b'S')
}

/// Feed raw input bytes to the signal; returns true once a stop key was seen
pub fn scan_for_stop(bytes: &[u8], signal: &StopSignal) -> bool {
    if bytes.iter().copied().any(is_stop_key) {
        signal.request_stop();
        true
    } else {
        false
    }
}

/// Keeps stdin in single-keystroke mode until dropped
pub struct KeyListener {
    #[cfg(unix)]
    saved: Option<nix::sys::termios::Termios>,
}

impl KeyListener {
    /// Start watching stdin for stop keys.
    ///
    /// Returns `None` when stdin is not a terminal (piped or redirected input),
    /// in which case stop keys are simply not available for this run.
    pub fn spawn(signal: StopSignal) -> Option<Self> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            debug!("stdin is not a terminal; stop key disabled");
            return None;
        }

        let listener = Self {
            #[cfg(unix)]
            saved: enter_single_key_mode(&stdin),
        };

        let spawned = std::thread::Builder::new()
            .name("yematch-keys".to_string())
            .spawn(move || {
                let mut buf = [0u8; 16];
                let mut input = std::io::stdin();
                loop {
                    match input.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if scan_for_stop(&buf[..n], &signal) {
                                break;
                            }
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("Could not start key listener: {}", e);
            return None;
        }

        Some(listener)
    }
}

#[cfg(unix)]
fn enter_single_key_mode(stdin: &std::io::Stdin) -> Option<nix::sys::termios::Termios> {
    use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};

    let saved = match tcgetattr(stdin) {
        Ok(t) => t,
        Err(e) => {
            warn!("Cannot read terminal settings: {}", e);
            return None;
        }
    };
    let mut raw = saved.clone();
    raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
    if let Err(e) = tcsetattr(stdin, SetArg::TCSANOW, &raw) {
        warn!("Cannot switch terminal to single-key mode: {}", e);
        return None;
    }
    Some(saved)
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(saved) = self.saved.take() {
            let stdin = std::io::stdin();
            let _ = nix::sys::termios::tcsetattr(
                &stdin,
                nix::sys::termios::SetArg::TCSANOW,
                &saved,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_keys() {
        assert!(is_stop_key(b's'));
        assert!(is_stop_key(b'S'));
        assert!(!is_stop_key(b'q'));
        assert!(!is_stop_key(b'\n'));
    }

    #[test]
    fn test_scan_sets_flag() {
        let signal = StopSignal::new();
        assert!(!scan_for_stop(b"abc\n", &signal));
        assert!(!signal.stop_requested());
        assert!(scan_for_stop(b"xS", &signal));
        assert!(signal.stop_requested());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_cancel_implies_stop() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        clone.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.stop_requested());
    }
}
