//! Focus event sources
//!
//! A source turns the OS notion of "the foreground window changed" into
//! [`FocusEvent`]s pushed into the service queue. The event-driven source
//! lives in the listener crate; the polling fallback is platform-agnostic and
//! lives here on top of a [`ForegroundProbe`].

use crate::service::{Command, CommandSender};
use crate::{CancelToken, FocusEvent};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Focus source already running")]
    AlreadyRunning,
    #[error("Failed to start focus source: {0}")]
    StartFailed(String),
}

/// Where a focus source delivers its events
#[derive(Debug, Clone)]
pub struct FocusSink {
    commands: CommandSender,
}

impl FocusSink {
    pub fn new(commands: CommandSender) -> Self {
        Self { commands }
    }

    /// Deliver one event. Returns false once the consumer is gone.
    pub fn emit(&self, event: FocusEvent) -> bool {
        self.commands.send(Command::Focus(event))
    }
}

/// Producer of foreground-change events
pub trait FocusSource: Send {
    /// Begin delivering events into `sink`
    fn start(&mut self, sink: FocusSink) -> Result<(), SourceError>;

    /// Stop delivering events. Synchronous and idempotent.
    fn stop(&mut self);

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// One-shot query of the current foreground window
pub trait ForegroundProbe: Send + Sync {
    fn foreground(&self) -> Option<FocusEvent>;
}

/// Fallback source: probes the foreground window on a fixed interval and
/// emits only when it changed since the previous probe.
pub struct PollingSource<P: ForegroundProbe + 'static> {
    probe: Arc<P>,
    interval: Duration,
    token: Option<CancelToken>,
    handle: Option<JoinHandle<()>>,
}

impl<P: ForegroundProbe + 'static> PollingSource<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        Self {
            probe: Arc::new(probe),
            interval,
            token: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    fn run(probe: Arc<P>, interval: Duration, token: CancelToken, sink: FocusSink) {
        let mut last: Option<FocusEvent> = None;

        while !token.is_cancelled() {
            if let Some(event) = probe.foreground() {
                if last != Some(event) {
                    last = Some(event);
                    if !sink.emit(event) {
                        debug!("Focus consumer closed, stopping poll loop");
                        break;
                    }
                }
            }

            // Woken early by `stop`
            thread::park_timeout(interval);
        }
    }
}

impl<P: ForegroundProbe + 'static> FocusSource for PollingSource<P> {
    fn start(&mut self, sink: FocusSink) -> Result<(), SourceError> {
        if self.handle.is_some() {
            return Err(SourceError::AlreadyRunning);
        }

        let token = CancelToken::new();
        let probe = Arc::clone(&self.probe);
        let interval = self.interval;
        let thread_token = token.clone();

        let handle = thread::Builder::new()
            .name("taskhide-poll".to_string())
            .spawn(move || Self::run(probe, interval, thread_token, sink))
            .map_err(|e| SourceError::StartFailed(e.to_string()))?;

        info!("Polling foreground window every {:?}", self.interval);
        self.token = Some(token);
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("Poll thread panicked");
            }
            info!("Foreground polling stopped");
        }
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

impl<P: ForegroundProbe + 'static> Drop for PollingSource<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::CommandSender;
    use crate::testing::ScriptedProbe;
    use crate::WindowHandle;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;
    use std::time::Instant;

    fn focus_events(rx: &mpsc::Receiver<Command>) -> Vec<FocusEvent> {
        rx.try_iter()
            .filter_map(|c| match c {
                Command::Focus(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_emits_only_on_change() {
        let a = FocusEvent::new(WindowHandle(1), 10);
        let b = FocusEvent::new(WindowHandle(2), 20);
        let probe = ScriptedProbe::new(vec![Some(a), Some(a), None, Some(a), Some(b), Some(b)]);
        let drained = probe.drained();

        let (tx, rx) = mpsc::channel();
        let mut source = PollingSource::new(probe, Duration::from_millis(1));
        source.start(FocusSink::new(CommandSender::new(tx))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !drained.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        source.stop();

        assert_eq!(focus_events(&rx), vec![a, b]);
    }

    #[test]
    fn test_stop_is_synchronous_and_idempotent() {
        let probe = ScriptedProbe::new(vec![]);
        let (tx, _rx) = mpsc::channel();
        let mut source = PollingSource::new(probe, Duration::from_secs(60));
        source.start(FocusSink::new(CommandSender::new(tx))).unwrap();
        assert!(source.is_running());

        let started = Instant::now();
        source.stop();
        source.stop();
        assert!(!source.is_running());
        // The long interval does not delay shutdown
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_double_start_rejected() {
        let (tx, _rx) = mpsc::channel();
        let mut source = PollingSource::new(ScriptedProbe::new(vec![]), Duration::from_millis(10));
        source.start(FocusSink::new(CommandSender::new(tx.clone()))).unwrap();
        assert!(matches!(
            source.start(FocusSink::new(CommandSender::new(tx))),
            Err(SourceError::AlreadyRunning)
        ));
    }
}
