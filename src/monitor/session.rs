use crate::capture::FrameSource;
use crate::secondary::SecondarySampler;
use tokio::time::Instant;

/// Mutable per-location state, owned by exactly one monitor
pub struct StreamSession {
    /// At most one live capture handle
    source: Option<Box<dyn FrameSource>>,
    /// Successful reads since the monitor started; survives reconnects
    frame_count: u64,
    /// Frame count and time of the previous evaluation tick
    last_tick: Option<(u64, Instant)>,
    pub(super) secondary: Option<SecondarySampler>,
}

impl StreamSession {
    pub fn new(secondary: Option<SecondarySampler>) -> Self {
        Self {
            source: None,
            frame_count: 0,
            last_tick: None,
            secondary,
        }
    }

    /// Install a freshly opened handle. The previous one must already be released.
    pub fn attach(&mut self, source: Box<dyn FrameSource>) {
        debug_assert!(self.source.is_none());
        self.source = Some(source);
    }

    /// Drop the capture handle
    pub fn release(&mut self) {
        self.source = None;
    }

    pub fn source_mut(&mut self) -> Option<&mut Box<dyn FrameSource>> {
        self.source.as_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    /// Count one successful read and return the new counter value
    pub fn record_frame(&mut self) -> u64 {
        self.frame_count += 1;
        self.frame_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Record a tick at the current frame count; returns the evaluation rate
    /// in frames per second since the previous tick, if there was one
    pub fn record_tick(&mut self) -> Option<f64> {
        let now = Instant::now();
        let rate = self.last_tick.and_then(|(frames, at)| {
            let elapsed = now.duration_since(at).as_secs_f64();
            (elapsed > 0.0).then(|| (self.frame_count - frames) as f64 / elapsed)
        });
        self.last_tick = Some((self.frame_count, now));
        rate
    }
}
