/// Audible and spoken cues. Front ends decide what a chime sounds like.
pub trait Notifier: Send + Sync {
    fn chime(&self);
    fn speak(&self, text: &str);
}

/// Logs instead of making noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn chime(&self) {
        tracing::debug!("chime");
    }

    fn speak(&self, text: &str) {
        tracing::debug!(%text, "speak");
    }
}
