use std::io::Write;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use lumiere_core::Notifier;

/// Rings the terminal bell and, when speech is on, hands text to the
/// platform's speech command.
#[derive(Debug, Default)]
pub struct TerminalNotifier {
    speech: AtomicBool,
}

impl TerminalNotifier {
    pub fn set_speech(&self, enabled: bool) {
        self.speech.store(enabled, Ordering::Relaxed);
    }
}

impl Notifier for TerminalNotifier {
    fn chime(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }

    fn speak(&self, text: &str) {
        if !self.speech.load(Ordering::Relaxed) {
            return;
        }
        let program = if cfg!(target_os = "macos") { "say" } else { "espeak" };
        let spawned = tokio::process::Command::new(program)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(err) = spawned {
            tracing::debug!(program, %err, "speech unavailable");
        }
    }
}
