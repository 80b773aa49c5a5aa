//! Orchestrator — owns every component and applies signals one at a time.
//!
//! All state lives in [`Orchestrator`]. Timers and I/O run in spawned
//! tasks that only report back through the [`Inbox`]; nothing else touches
//! the components, so two orchestrators in one process never share state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use signage_domain::error::{SignageError, ValidationError};
use signage_domain::id::{DeviceId, PairingCode, VersionToken};
use signage_domain::push::{ConfigSnapshot, DeviceResolution, DeviceSnapshot, PushEvent};
use signage_domain::queue::QueueItem;
use signage_domain::settings::Region;
use signage_domain::time::{LocalTime, local_now, now};

use crate::audio::BackgroundAudio;
use crate::automation_engine::AutomationEngine;
use crate::event_bus::{Connectivity, InProcessEventBus, OrchestratorEvent};
use crate::live_channel::{ChannelOutput, ChannelState, LiveChannel};
use crate::pairing_flow::{PairingEvent, PairingFlow, PairingStep};
use crate::playback::{PlaybackController, StartAt};
use crate::poller::{Poller, PollerConfig};
use crate::ports::{
    AudioSink, ConfigSource, LiveTarget, LocalStateStore, PairingApi, Preloader, PushTransport,
    Renderer,
};
use crate::reconciler::{ApplyOutcome, FetchTicket, Reconciler};
use crate::scheduled_task::ScheduledTask;
use crate::signal::{Inbox, Signal};
use crate::{queue_builder, region_scheduler};

/// Orchestrator timing and behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    /// Pair unconfigured terminals instead of showing the global configuration.
    pub pairing_enabled: bool,
    /// Configuration polling once the live channel gave up.
    pub config_poll: PollerConfig,
    /// Pairing status polling once the pairing channel gave up.
    pub pairing_poll: PollerConfig,
    pub heartbeat_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pairing_enabled: true,
            config_poll: PollerConfig::default(),
            pairing_poll: PollerConfig {
                interval: Duration::from_secs(5),
                max_interval: Duration::from_secs(60),
                ..PollerConfig::default()
            },
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    /// Check both poller configurations and the heartbeat interval.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.config_poll.validate()?;
        self.pairing_poll.validate()?;
        if self.heartbeat_interval.is_zero() {
            return Err(ValidationError::OutOfRange {
                field: "heartbeat_interval",
                constraint: "greater than zero",
            });
        }
        Ok(())
    }
}

/// Where the terminal gets its configuration from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Starting,
    /// Unbound terminal showing the global configuration.
    Global,
    /// Bound terminal showing its device configuration.
    Device(DeviceId),
    /// Waiting for an administrator to bind the shown code.
    Pairing,
}

/// Source of the local wall-clock time used for automation rules.
pub type Clock = Box<dyn Fn() -> LocalTime + Send + Sync>;

/// The terminal's coordinator.
pub struct Orchestrator<N, L, R, P, A> {
    config: OrchestratorConfig,
    network: Arc<N>,
    store: L,
    renderer: Arc<R>,
    preloader: Arc<P>,
    events: InProcessEventBus,
    inbox: Inbox,
    signals: mpsc::UnboundedReceiver<Signal>,
    mode: Mode,
    reconciler: Reconciler,
    automation: AutomationEngine,
    left: PlaybackController<R, P>,
    right: PlaybackController<R, P>,
    audio: BackgroundAudio<A>,
    channel: LiveChannel<N>,
    pairing: PairingFlow<N>,
    poller: Poller,
    fetch: ScheduledTask,
    heartbeat: ScheduledTask,
    heartbeat_now: ScheduledTask,
    clock: Clock,
}

impl<N, L, R, P, A> Orchestrator<N, L, R, P, A>
where
    N: ConfigSource + PairingApi + PushTransport + 'static,
    L: LocalStateStore,
    R: Renderer,
    P: Preloader,
    A: AudioSink,
{
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        network: Arc<N>,
        store: L,
        renderer: Arc<R>,
        preloader: Arc<P>,
        sink: Arc<A>,
        events: InProcessEventBus,
    ) -> Self {
        let (inbox, signals) = Inbox::channel();
        let controller = |region| {
            PlaybackController::new(
                region,
                Arc::clone(&renderer),
                Arc::clone(&preloader),
                inbox.clone(),
                events.clone(),
            )
        };
        let left = controller(Region::Left);
        let right = controller(Region::Right);
        Self {
            config,
            left,
            right,
            channel: LiveChannel::new(Arc::clone(&network), inbox.clone()),
            pairing: PairingFlow::new(Arc::clone(&network), inbox.clone()),
            network,
            store,
            renderer,
            preloader,
            events,
            inbox,
            signals,
            mode: Mode::Starting,
            reconciler: Reconciler::new(),
            automation: AutomationEngine::new(),
            audio: BackgroundAudio::new(sink),
            poller: Poller::default(),
            fetch: ScheduledTask::idle(),
            heartbeat: ScheduledTask::idle(),
            heartbeat_now: ScheduledTask::idle(),
            clock: Box::new(local_now),
        }
    }

    /// Replace the wall clock automation rules are evaluated against.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> LocalTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn events(&self) -> &InProcessEventBus {
        &self.events
    }

    #[must_use]
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    #[must_use]
    pub fn committed_version(&self) -> Option<&VersionToken> {
        self.reconciler.committed().map(|baseline| &baseline.version)
    }

    #[must_use]
    pub fn region(&self, region: Region) -> &PlaybackController<R, P> {
        match region {
            Region::Left => &self.left,
            Region::Right => &self.right,
        }
    }

    /// Pick the mode from the persisted state and start it.
    #[tracing::instrument(skip_all)]
    pub async fn start(&mut self) {
        let device_id = match self.store.load_device_id().await {
            Ok(device_id) => device_id,
            Err(err) => {
                tracing::warn!(error = %err, "cannot read device identity");
                None
            }
        };
        match device_id {
            Some(device_id) => self.enter_device(device_id, false),
            None if self.config.pairing_enabled => self.enter_pairing().await,
            None => self.enter_global(),
        }
    }

    /// Wait for the next signal and apply it. Returns `false` once the
    /// inbox is closed.
    pub async fn step(&mut self) -> bool {
        match self.signals.recv().await {
            Some(signal) => {
                self.apply(signal).await;
                true
            }
            None => false,
        }
    }

    /// Start, then apply signals until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                running = self.step() => {
                    if !running {
                        break;
                    }
                }
            }
        }
        self.shutdown();
    }

    /// Stop every channel, timer and slide.
    pub fn shutdown(&mut self) {
        self.reset_session();
        self.left.stop(&mut self.audio);
        self.right.stop(&mut self.audio);
        self.audio.stop();
        tracing::info!("orchestrator stopped");
    }

    /// Apply one signal.
    pub async fn apply(&mut self, signal: Signal) {
        match signal {
            Signal::Channel { generation, event } => {
                if let Some(output) = self.channel.handle(generation, event) {
                    self.on_channel(output).await;
                }
            }
            Signal::Fetched { ticket, snapshot } => {
                if self.mode == Mode::Global {
                    self.commit(snapshot, ticket);
                }
            }
            Signal::DeviceResolved { ticket, snapshot } => self.on_device_snapshot(snapshot, ticket),
            Signal::DeviceUnbound => self.on_device_unbound().await,
            Signal::FetchFailed => self
                .events
                .publish(OrchestratorEvent::Connectivity(Connectivity::Offline)),
            Signal::Pairing { generation, event } => {
                let step = self.pairing.handle(generation, event, now());
                self.on_pairing_step(step).await;
            }
            Signal::Slide(signal) => {
                let controller = match signal.region {
                    Region::Left => &mut self.left,
                    Region::Right => &mut self.right,
                };
                controller.handle(signal, &mut self.audio);
            }
            Signal::AutomationTick => self.on_automation_tick(),
        }
    }

    // ── Modes ──

    fn enter_global(&mut self) {
        self.reset_session();
        self.set_mode(Mode::Global);
        self.channel.switch(LiveTarget::Global);
        self.fetch_now();
    }

    fn enter_device(&mut self, device_id: DeviceId, heartbeat_now: bool) {
        self.reset_session();
        self.renderer.show_pairing(None);
        self.set_mode(Mode::Device(device_id.clone()));
        self.start_heartbeat(device_id.clone(), heartbeat_now);
        self.channel.switch(LiveTarget::Device(device_id));
        self.fetch_now();
    }

    async fn enter_pairing(&mut self) {
        self.reset_session();
        self.left.stop(&mut self.audio);
        self.right.stop(&mut self.audio);
        self.audio.stop();
        self.set_mode(Mode::Pairing);
        let stored = match self.store.load_pairing().await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "cannot read pending pairing code");
                None
            }
        };
        let step = self.pairing.begin(stored, now());
        self.on_pairing_step(step).await;
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            tracing::info!(?mode, "mode changed");
            self.events
                .publish(OrchestratorEvent::ModeChanged(mode.clone()));
        }
        self.mode = mode;
    }

    /// Drop everything tied to the current mode, synchronously.
    fn reset_session(&mut self) {
        self.channel.stop();
        self.poller.stop();
        self.fetch.cancel();
        self.heartbeat.cancel();
        self.heartbeat_now.cancel();
        self.pairing.stop();
        self.automation.stop();
        self.reconciler.clear();
    }

    // ── Configuration ──

    async fn on_channel(&mut self, output: ChannelOutput) {
        match output {
            ChannelOutput::Connected => {
                self.poller.stop();
                self.events
                    .publish(OrchestratorEvent::Connectivity(Connectivity::Live));
            }
            ChannelOutput::Retrying { attempt, delay } => {
                self.events
                    .publish(OrchestratorEvent::Connectivity(Connectivity::Retrying {
                        attempt,
                        delay,
                    }));
            }
            ChannelOutput::FellBack => {
                self.events
                    .publish(OrchestratorEvent::Connectivity(Connectivity::Polling));
                self.start_polling();
            }
            ChannelOutput::Push(event) => self.on_push(event).await,
        }
    }

    async fn on_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::State(snapshot) if self.mode == Mode::Global => {
                let ticket = self.reconciler.tickets().next();
                self.commit(snapshot, ticket);
            }
            PushEvent::Device(DeviceResolution::Found(snapshot)) => {
                let ticket = self.reconciler.tickets().next();
                self.on_device_snapshot(snapshot, ticket);
            }
            PushEvent::Device(DeviceResolution::NotFound) if matches!(self.mode, Mode::Device(_)) => {
                // only a 404 from resolve unbinds the terminal
                tracing::info!(mode = ?self.mode, "push reports device not found, resolving");
                self.fetch_now();
            }
            PushEvent::Pair(status) if self.mode == Mode::Pairing => {
                let step = self.pairing.handle(
                    self.pairing.generation(),
                    PairingEvent::Status(status),
                    now(),
                );
                self.on_pairing_step(step).await;
            }
            other => {
                tracing::debug!(event = ?other, mode = ?self.mode, "push event does not apply");
            }
        }
    }

    fn on_device_snapshot(&mut self, snapshot: DeviceSnapshot, ticket: FetchTicket) {
        match &self.mode {
            Mode::Device(device_id) if *device_id == snapshot.device_id => {
                self.commit(snapshot.config, ticket);
            }
            mode => {
                tracing::debug!(device_id = %snapshot.device_id, ?mode, "ignoring device configuration");
            }
        }
    }

    async fn on_device_unbound(&mut self) {
        let Mode::Device(device_id) = &self.mode else {
            return;
        };
        tracing::warn!(%device_id, "device is no longer bound, pairing again");
        if let Err(err) = self.store.save_device_id(None).await {
            tracing::warn!(error = %err, "cannot clear device identity");
        }
        if self.config.pairing_enabled {
            self.enter_pairing().await;
        } else {
            self.enter_global();
        }
    }

    /// Run a snapshot through the reconciler and, when it commits, rebase
    /// automation and rebuild both regions.
    fn commit(&mut self, snapshot: ConfigSnapshot, ticket: FetchTicket) {
        let start = if self.reconciler.committed().is_some() {
            StartAt::Current
        } else {
            StartAt::Beginning
        };
        let baseline = match self.reconciler.apply(snapshot, ticket) {
            Ok(ApplyOutcome::Committed(baseline)) => baseline,
            Ok(ApplyOutcome::Unchanged | ApplyOutcome::Stale) => return,
            Err(err) => {
                tracing::warn!(error = %err, "discarding configuration, keeping the last good one");
                return;
            }
        };
        self.events.publish(OrchestratorEvent::Committed {
            version: baseline.version.clone(),
        });

        self.automation.rebase(baseline);
        let change = self.automation.tick((self.clock)());
        if !change.is_empty() {
            self.events
                .publish(OrchestratorEvent::AutomationChanged(change));
        }
        self.automation.restart_tick(&self.inbox);

        self.refresh_presentation();
        self.rebuild(start);
    }

    fn on_automation_tick(&mut self) {
        let change = self.automation.tick((self.clock)());
        if change.is_empty() {
            return;
        }
        self.events
            .publish(OrchestratorEvent::AutomationChanged(change));
        if change.style || change.audio {
            self.refresh_presentation();
        }
        if change.schedule {
            self.rebuild(StartAt::Beginning);
        }
    }

    fn refresh_presentation(&mut self) {
        let settings = self.automation.settings();
        self.renderer.apply_theme(settings);
        self.audio.update(&settings.audio);
    }

    fn rebuild(&mut self, start: StartAt) {
        let settings = self.automation.settings();
        let master = queue_builder::build(self.automation.schedule(), settings);
        let urls: Vec<&str> = master
            .items
            .iter()
            .filter_map(QueueItem::preload_url)
            .collect();
        self.preloader.preload_many(&urls);

        for region in Region::ALL {
            let queue = region_scheduler::schedule(&master, &settings.display, region);
            let fixed_dwell = settings.display.page(region).fixed_dwell();
            tracing::debug!(%region, len = queue.len(), "region queue rebuilt");
            let controller = match region {
                Region::Left => &mut self.left,
                Region::Right => &mut self.right,
            };
            controller.replace_queue(queue, fixed_dwell, start, &mut self.audio);
        }
    }

    // ── Background work ──

    fn fetch_now(&mut self) {
        let network = Arc::clone(&self.network);
        let inbox = self.inbox.clone();
        let ticket = self.reconciler.tickets().next();
        self.fetch = match &self.mode {
            Mode::Global => ScheduledTask::spawn(async move {
                if let Err(err) = fetch_global(network, inbox, ticket).await {
                    tracing::warn!(error = %err, "initial configuration fetch failed");
                }
            }),
            Mode::Device(device_id) => {
                let device_id = device_id.clone();
                ScheduledTask::spawn(async move {
                    if let Err(err) = resolve_device(network, inbox, ticket, device_id).await {
                        tracing::warn!(error = %err, "initial device resolve failed");
                    }
                })
            }
            Mode::Starting | Mode::Pairing => ScheduledTask::idle(),
        };
    }

    fn start_polling(&mut self) {
        let network = Arc::clone(&self.network);
        let inbox = self.inbox.clone();
        let tickets = self.reconciler.tickets();
        self.poller = match &self.mode {
            Mode::Global => Poller::start(self.config.config_poll, move || {
                fetch_global(Arc::clone(&network), inbox.clone(), tickets.next())
            }),
            Mode::Device(device_id) => {
                let device_id = device_id.clone();
                Poller::start(self.config.config_poll, move || {
                    resolve_device(
                        Arc::clone(&network),
                        inbox.clone(),
                        tickets.next(),
                        device_id.clone(),
                    )
                })
            }
            Mode::Pairing => {
                let Some(state) = self.pairing.current() else {
                    return;
                };
                let code = state.code.clone();
                let generation = self.pairing.generation();
                Poller::start(self.config.pairing_poll, move || {
                    poll_pairing(Arc::clone(&network), inbox.clone(), generation, code.clone())
                })
            }
            Mode::Starting => return,
        };
        tracing::info!(mode = ?self.mode, "polling started");
    }

    fn start_heartbeat(&mut self, device_id: DeviceId, immediate: bool) {
        let network = Arc::clone(&self.network);
        let beat = move || {
            let network = Arc::clone(&network);
            let device_id = device_id.clone();
            async move {
                if let Err(err) = network.heartbeat(&device_id).await {
                    tracing::warn!(%device_id, error = %err, "heartbeat failed");
                }
            }
        };
        if immediate {
            self.heartbeat_now = ScheduledTask::spawn(beat());
        }
        self.heartbeat = ScheduledTask::every(self.config.heartbeat_interval, beat);
    }

    // ── Pairing ──

    async fn on_pairing_step(&mut self, step: PairingStep) {
        match step {
            PairingStep::Idle | PairingStep::Requesting => {}
            PairingStep::Waiting(state) => {
                if let Err(err) = self.store.save_pairing(Some(&state)).await {
                    tracing::warn!(error = %err, "cannot persist pairing code");
                }
                self.renderer.show_pairing(Some(&state));
                self.events
                    .publish(OrchestratorEvent::PairingCode(state.code.clone()));
                self.poller.stop();
                self.channel.switch(LiveTarget::Pairing(state.code));
            }
            PairingStep::Paired(device_id) => {
                if let Err(err) = self.store.save_device_id(Some(&device_id)).await {
                    tracing::warn!(error = %err, "cannot persist device identity");
                }
                if let Err(err) = self.store.save_pairing(None).await {
                    tracing::warn!(error = %err, "cannot clear pairing code");
                }
                self.enter_device(device_id, true);
            }
        }
    }
}

async fn fetch_global<N: ConfigSource>(
    network: Arc<N>,
    inbox: Inbox,
    ticket: FetchTicket,
) -> Result<(), SignageError> {
    match network.fetch_global().await {
        Ok(snapshot) => {
            inbox.send(Signal::Fetched { ticket, snapshot });
            Ok(())
        }
        Err(err) => {
            inbox.send(Signal::FetchFailed);
            Err(err)
        }
    }
}

async fn resolve_device<N: ConfigSource>(
    network: Arc<N>,
    inbox: Inbox,
    ticket: FetchTicket,
    device_id: DeviceId,
) -> Result<(), SignageError> {
    match network.resolve_device(&device_id).await {
        Ok(snapshot) => {
            inbox.send(Signal::DeviceResolved { ticket, snapshot });
            Ok(())
        }
        Err(err @ SignageError::DeviceUnbound { .. }) => {
            inbox.send(Signal::DeviceUnbound);
            Err(err)
        }
        Err(err) => {
            inbox.send(Signal::FetchFailed);
            Err(err)
        }
    }
}

async fn poll_pairing<N: PairingApi>(
    network: Arc<N>,
    inbox: Inbox,
    generation: u64,
    code: PairingCode,
) -> Result<(), SignageError> {
    let status = network.poll_pairing(&code).await?;
    inbox.send(Signal::Pairing {
        generation,
        event: PairingEvent::Status(status),
    });
    Ok(())
}
