/// Severity of a user-facing notice. Notices never enter the transcript;
/// the UI decides how to surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }
}

/// Fire-and-forget notification sink. The session controller raises short,
/// non-technical notices through this; nothing is returned to it.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that forwards notices over a channel to the event loop, which
/// renders the latest one in the status line.
pub struct ChannelNotifier {
    tx: tokio::sync::mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}
