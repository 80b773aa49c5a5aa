//! Live channel manager — one self-healing push subscription at a time.
//!
//! The manager probes the endpoint, opens the subscription and forwards
//! decoded push events. Connection errors are retried with exponential
//! backoff; once the failure budget of the target is spent the manager
//! falls back and the orchestrator switches to polling. It never re-arms
//! itself after falling back.
//!
//! I/O runs in a spawned task that reports through the [`Inbox`]; every
//! report carries the generation it was started under, and reports from an
//! older generation are discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;

use signage_domain::error::SignageError;
use signage_domain::id::VersionToken;
use signage_domain::push::PushEvent;

use crate::ports::{LiveTarget, PushMessage, PushTransport};
use crate::scheduled_task::ScheduledTask;
use crate::signal::{Inbox, Signal};

/// First reconnect delay.
pub const RECONNECT_BASE: Duration = Duration::from_secs(2);
/// Longest reconnect delay.
pub const RECONNECT_CAP: Duration = Duration::from_secs(60);
/// Failures tolerated on a pairing target (one retry).
pub const PAIRING_MAX_FAILURES: u32 = 2;
/// Failures tolerated on any other target.
pub const MAX_FAILURES: u32 = 5;

/// Where the manager stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Probing,
    Connected,
    Retrying,
    FellBack,
}

/// Report from the connection task.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened,
    Message(PushMessage),
    /// Probe failed or push is not supported for the target.
    Unsupported,
    Failed(SignageError),
}

/// What the orchestrator should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOutput {
    Connected,
    Retrying { attempt: u32, delay: Duration },
    /// Push is given up for this target; poll instead.
    FellBack,
    Push(PushEvent),
}

/// Reconnect delay after `failures` consecutive failures.
#[must_use]
pub fn reconnect_delay(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    RECONNECT_BASE
        .saturating_mul(1 << exponent)
        .min(RECONNECT_CAP)
}

/// Owns the live subscription.
pub struct LiveChannel<T> {
    transport: Arc<T>,
    inbox: Inbox,
    target: Option<LiveTarget>,
    state: ChannelState,
    generation: u64,
    failures: u32,
    last_token: Option<VersionToken>,
    task: ScheduledTask,
}

impl<T: PushTransport + 'static> LiveChannel<T> {
    #[must_use]
    pub fn new(transport: Arc<T>, inbox: Inbox) -> Self {
        Self {
            transport,
            inbox,
            target: None,
            state: ChannelState::Idle,
            generation: 0,
            failures: 0,
            last_token: None,
            task: ScheduledTask::idle(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    #[must_use]
    pub fn target(&self) -> Option<&LiveTarget> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Close the current subscription and open one for `target`.
    ///
    /// The prior connection and its reconnect timer are cancelled before
    /// this returns; counters and the duplicate filter start over.
    #[tracing::instrument(skip_all, fields(live_target = %target))]
    pub fn switch(&mut self, target: LiveTarget) {
        self.reset();
        self.state = ChannelState::Probing;
        tracing::info!(generation = self.generation, "opening live channel");
        self.task = ScheduledTask::spawn(connect(
            Arc::clone(&self.transport),
            self.inbox.clone(),
            self.generation,
            target.clone(),
            true,
        ));
        self.target = Some(target);
    }

    /// Close the subscription. Idempotent.
    pub fn stop(&mut self) {
        if self.state != ChannelState::Idle {
            tracing::debug!(generation = self.generation, "closing live channel");
        }
        self.reset();
        self.target = None;
        self.state = ChannelState::Idle;
    }

    fn reset(&mut self) {
        self.task.cancel();
        self.generation += 1;
        self.failures = 0;
        self.last_token = None;
    }

    /// Apply a report from the connection task.
    pub fn handle(&mut self, generation: u64, event: ChannelEvent) -> Option<ChannelOutput> {
        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                "dropping report from stale channel"
            );
            return None;
        }
        match event {
            ChannelEvent::Opened => {
                tracing::info!(live_target = ?self.target, "live channel connected");
                self.state = ChannelState::Connected;
                self.failures = 0;
                Some(ChannelOutput::Connected)
            }
            ChannelEvent::Message(message) => self.accept(&message),
            ChannelEvent::Unsupported => Some(self.fall_back()),
            ChannelEvent::Failed(err) => Some(self.on_failure(&err)),
        }
    }

    fn accept(&mut self, message: &PushMessage) -> Option<ChannelOutput> {
        let event = match PushEvent::decode(&message.event, &message.data) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(event = %message.event, error = %err, "ignoring malformed push message");
                return None;
            }
        };
        if let Some(version) = event.version() {
            if self.last_token.as_ref() == Some(version) {
                tracing::debug!(%version, "ignoring duplicate push message");
                return None;
            }
            self.last_token = Some(version.clone());
        }
        Some(ChannelOutput::Push(event))
    }

    fn on_failure(&mut self, err: &SignageError) -> ChannelOutput {
        self.failures += 1;
        let limit = match &self.target {
            Some(target) if target.is_pairing() => PAIRING_MAX_FAILURES,
            _ => MAX_FAILURES,
        };
        if self.failures >= limit {
            tracing::warn!(failures = self.failures, error = %err, "live channel exhausted its retries");
            return self.fall_back();
        }
        let Some(target) = self.target.clone() else {
            return self.fall_back();
        };

        let delay = reconnect_delay(self.failures);
        tracing::warn!(attempt = self.failures, retry_in = ?delay, error = %err, "live channel failed");
        self.state = ChannelState::Retrying;
        self.task = ScheduledTask::after(
            delay,
            connect(
                Arc::clone(&self.transport),
                self.inbox.clone(),
                self.generation,
                target,
                false,
            ),
        );
        ChannelOutput::Retrying {
            attempt: self.failures,
            delay,
        }
    }

    fn fall_back(&mut self) -> ChannelOutput {
        tracing::info!(live_target = ?self.target, "live channel fell back to polling");
        self.task.cancel();
        // reports already queued by the cancelled task must not count
        self.generation += 1;
        self.state = ChannelState::FellBack;
        ChannelOutput::FellBack
    }
}

async fn connect<T: PushTransport>(
    transport: Arc<T>,
    inbox: Inbox,
    generation: u64,
    target: LiveTarget,
    probe: bool,
) {
    let report = |event| inbox.send(Signal::Channel { generation, event });

    if probe {
        match transport.probe(&target).await {
            Ok(true) => {}
            Ok(false) => {
                report(ChannelEvent::Unsupported);
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "live channel probe failed");
                report(ChannelEvent::Unsupported);
                return;
            }
        }
    }

    let mut stream = match transport.open(&target).await {
        Ok(stream) => stream,
        Err(err) => {
            report(ChannelEvent::Failed(err));
            return;
        }
    };
    report(ChannelEvent::Opened);

    while let Some(item) = stream.next().await {
        match item {
            Ok(message) => report(ChannelEvent::Message(message)),
            Err(err) => {
                report(ChannelEvent::Failed(err));
                return;
            }
        }
    }
    report(ChannelEvent::Failed(SignageError::network(
        std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "push stream closed"),
    )));
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_domain::id::{DeviceId, PairingCode};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_stream::Stream;

    type MessageStream = Pin<Box<dyn Stream<Item = Result<PushMessage, SignageError>> + Send>>;

    enum Open {
        Refuse,
        /// Deliver the messages, then stay open.
        Hold(Vec<PushMessage>),
        /// Deliver the messages, then drop the connection.
        Drop(Vec<PushMessage>),
    }

    // ── Scripted transport ─────────────────────────────────────────

    struct ScriptedTransport {
        supported: bool,
        script: Mutex<VecDeque<Open>>,
        opens: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(supported: bool, script: Vec<Open>) -> Arc<Self> {
            Arc::new(Self {
                supported,
                script: Mutex::new(script.into()),
                opens: AtomicUsize::new(0),
            })
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    fn offline() -> SignageError {
        SignageError::network(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "offline",
        ))
    }

    impl PushTransport for ScriptedTransport {
        type Stream = MessageStream;

        fn probe(
            &self,
            _target: &LiveTarget,
        ) -> impl Future<Output = Result<bool, SignageError>> + Send {
            let supported = self.supported;
            async move { Ok(supported) }
        }

        fn open(
            &self,
            _target: &LiveTarget,
        ) -> impl Future<Output = Result<Self::Stream, SignageError>> + Send {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Open::Refuse);
            async move {
                match next {
                    Open::Refuse => Err(offline()),
                    Open::Hold(messages) => {
                        let stream = tokio_stream::iter(messages.into_iter().map(Ok))
                            .chain(tokio_stream::pending());
                        Ok(Box::pin(stream) as MessageStream)
                    }
                    Open::Drop(messages) => {
                        let stream = tokio_stream::iter(messages.into_iter().map(Ok));
                        Ok(Box::pin(stream) as MessageStream)
                    }
                }
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn state(version: &str) -> PushMessage {
        PushMessage::new(
            "state",
            format!(r#"{{"schedule":{{}},"settings":{{}},"version":"{version}"}}"#),
        )
    }

    /// Feed signals back into the channel until it stays quiet for a while.
    async fn drive(
        channel: &mut LiveChannel<ScriptedTransport>,
        rx: &mut UnboundedReceiver<Signal>,
    ) -> Vec<ChannelOutput> {
        let mut outputs = Vec::new();
        while let Ok(Some(signal)) =
            tokio::time::timeout(Duration::from_secs(600), rx.recv()).await
        {
            if let Signal::Channel { generation, event } = signal {
                outputs.extend(channel.handle(generation, event));
            }
        }
        outputs
    }

    fn retries(outputs: &[ChannelOutput]) -> Vec<Duration> {
        outputs
            .iter()
            .filter_map(|o| match o {
                ChannelOutput::Retrying { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect()
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[test]
    fn should_double_reconnect_delay_up_to_cap() {
        let delays: Vec<u64> = (1..=7).map(|n| reconnect_delay(n).as_secs()).collect();
        assert_eq!(delays, [2, 4, 8, 16, 32, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fall_back_after_five_failures_on_global_target() {
        let transport = ScriptedTransport::new(true, vec![]);
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        let outputs = drive(&mut channel, &mut rx).await;

        assert_eq!(
            retries(&outputs),
            [2, 4, 8, 16].map(Duration::from_secs).to_vec()
        );
        assert_eq!(outputs.last(), Some(&ChannelOutput::FellBack));
        assert_eq!(channel.state(), ChannelState::FellBack);
        assert_eq!(transport.opens(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_reconnect_after_falling_back() {
        let transport = ScriptedTransport::new(true, vec![]);
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        drive(&mut channel, &mut rx).await;
        let opens = transport.opens();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(transport.opens(), opens);
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_pairing_target_a_single_retry() {
        let transport = ScriptedTransport::new(true, vec![]);
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Pairing(PairingCode::new("K7Q2")));
        let outputs = drive(&mut channel, &mut rx).await;

        assert_eq!(retries(&outputs).len(), 1);
        assert_eq!(outputs.last(), Some(&ChannelOutput::FellBack));
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fall_back_immediately_when_unsupported() {
        let transport = ScriptedTransport::new(false, vec![]);
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        let outputs = drive(&mut channel, &mut rx).await;

        assert_eq!(outputs, [ChannelOutput::FellBack]);
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_forward_each_version_once_and_skip_malformed() {
        let transport = ScriptedTransport::new(
            true,
            vec![Open::Hold(vec![
                state("v1"),
                state("v1"),
                PushMessage::new("state", "{oops"),
                PushMessage::new("heartbeat", "{}"),
                state("v2"),
            ])],
        );
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        let outputs = drive(&mut channel, &mut rx).await;

        let versions: Vec<&str> = outputs
            .iter()
            .filter_map(|o| match o {
                ChannelOutput::Push(PushEvent::State(s)) => Some(s.version.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(outputs[0], ChannelOutput::Connected);
        assert_eq!(versions, ["v1", "v2"]);
        assert_eq!(channel.state(), ChannelState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reset_failures_after_successful_open() {
        let transport =
            ScriptedTransport::new(true, vec![Open::Refuse, Open::Drop(vec![state("v1")])]);
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        let outputs = drive(&mut channel, &mut rx).await;

        // one failure, a successful open, then five more failures
        assert_eq!(
            retries(&outputs),
            [2, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
        );
        assert_eq!(transport.opens(), 6);
        assert_eq!(outputs.last(), Some(&ChannelOutput::FellBack));
    }

    #[tokio::test(start_paused = true)]
    async fn should_discard_reports_from_previous_target() {
        let transport = ScriptedTransport::new(
            true,
            vec![Open::Hold(vec![state("v1")]), Open::Hold(vec![state("v1")])],
        );
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        let first = channel.generation();
        tokio::time::sleep(Duration::from_millis(10)).await;
        channel.switch(LiveTarget::Device(DeviceId::new("dev-1")));

        let mut outputs = Vec::new();
        while let Ok(Some(signal)) =
            tokio::time::timeout(Duration::from_secs(60), rx.recv()).await
        {
            if let Signal::Channel { generation, event } = signal {
                let output = channel.handle(generation, event);
                if generation == first {
                    assert!(output.is_none());
                }
                outputs.extend(output);
            }
        }

        // the duplicate filter restarted with the new target
        assert_eq!(
            outputs.iter().filter(|o| matches!(o, ChannelOutput::Push(_))).count(),
            1
        );
        assert_eq!(
            channel.target(),
            Some(&LiveTarget::Device(DeviceId::new("dev-1")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_become_idle_on_stop() {
        let transport = ScriptedTransport::new(true, vec![Open::Hold(vec![])]);
        let (inbox, mut rx) = Inbox::channel();
        let mut channel = LiveChannel::new(Arc::clone(&transport), inbox);

        channel.switch(LiveTarget::Global);
        channel.stop();
        channel.stop();
        let outputs = drive(&mut channel, &mut rx).await;

        assert!(outputs.is_empty());
        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(channel.target().is_none());
    }
}
