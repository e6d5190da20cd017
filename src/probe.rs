use std::time::Duration;

/// Summary of a buffer passing a probed pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub pts: Option<Duration>,
    pub duration: Option<Duration>,
    pub size: usize,
}

/// Observer for buffers reaching the audio or video sink.
///
/// `on_buffer` runs on a streaming thread. While flushing, the probe should
/// drop what it sees; the session flushes video probes whenever the sink is torn
/// down and resumes them once data flows again.
pub trait BufferProbe: Send + Sync {
    fn on_buffer(&self, buffer: &BufferInfo);
    fn start_flushing(&self);
    fn stop_flushing(&self);
}
