use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn phase(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub name: String,
    pub received: u64,
    pub total: Option<u64>,
    pub done: bool,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    fn transfer(&self, _progress: TransferProgress) {}
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}
