//! Playback event orchestration.
//!
//! The session state machine at the center of the crate: consumes playback
//! engine notices and a periodic progress tick, decides which tracking
//! beacons and verification events fire, in what order, exactly once.
//!
//! All session-state mutation happens on one control timeline — either the
//! caller driving the handler methods directly, or the `run` loop
//! serializing ticks and signals onto a single task. Beacon delivery and
//! verification calls never block that timeline.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::beacon::BeaconDispatcher;
use crate::error::{AdError, Result};
use crate::models::{AdCreative, PlaybackSessionState, Quartile};
use crate::playback::{LinkOpener, MediaPlayer, PlayerNotice};
use crate::quartile;
use crate::verification::VerificationSession;

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Progress poll interval
    pub poll_interval: Duration,

    /// Capacity of the transition broadcast channel
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            event_capacity: 64,
        }
    }
}

/// External signal consumed by the control loop
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// Notification forwarded from the playback engine
    Player(PlayerNotice),

    /// User-initiated play/pause toggle
    UserPlayPause,

    /// User-initiated mute/unmute toggle
    MuteToggle,

    /// User tapped the creative
    Click,

    /// The player surface became visible or hidden
    VisibilityChanged(bool),

    /// Tear the session down
    Release,
}

/// Session transition published to observers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Loaded,
    QuartileReached(Quartile),
    Completed,
    Paused { user: bool },
    Resumed { user: bool },
    VolumeChanged(f32),
    Clicked,
    Fatal(String),
    Released,
}

/// The playback measurement state machine.
///
/// Owns the `PlaybackSessionState` exclusively; no other component reads or
/// writes it. The ad creative is immutable and shared.
pub struct PlaybackOrchestrator {
    creative: Arc<AdCreative>,
    player: Arc<dyn MediaPlayer>,
    verification: Arc<dyn VerificationSession>,
    opener: Arc<dyn LinkOpener>,
    beacons: BeaconDispatcher,
    config: OrchestratorConfig,
    session: PlaybackSessionState,
    fatal: Option<String>,
    released: bool,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl PlaybackOrchestrator {
    pub fn new(
        creative: Arc<AdCreative>,
        player: Arc<dyn MediaPlayer>,
        verification: Arc<dyn VerificationSession>,
        opener: Arc<dyn LinkOpener>,
        beacons: BeaconDispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            creative,
            player,
            verification,
            opener,
            beacons,
            config,
            session: PlaybackSessionState::new(),
            fatal: None,
            released: false,
            events_tx,
        }
    }

    /// Subscribe to session transitions
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Snapshot of the current session state
    pub fn session(&self) -> PlaybackSessionState {
        self.session
    }

    /// The fatal error that terminated the session, if any
    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    /// Start a fresh measurement session: reset all per-load state, start
    /// the verification session, and hand the primary rendition to the
    /// player. This is the only place session state resets — a loop-restart
    /// never does.
    pub async fn load(&mut self) -> Result<()> {
        let rendition = self
            .creative
            .primary_rendition()
            .ok_or_else(|| AdError::Other("ad creative has no media renditions".to_string()))?
            .clone();

        self.session = PlaybackSessionState::new();
        self.fatal = None;
        self.released = false;

        self.verification.start_session().await;

        let caption_url = rendition
            .caption_url
            .as_ref()
            .or(self.creative.closed_caption_url.as_ref());
        self.player.load(&rendition.url, caption_url).await;
        self.player.play().await;

        Ok(())
    }

    /// Dispatch one signal on the control timeline
    pub async fn on_signal(&mut self, signal: ControlSignal) {
        match signal {
            ControlSignal::Player(notice) => self.on_player_notice(notice).await,
            ControlSignal::UserPlayPause => self.on_user_play_pause().await,
            ControlSignal::MuteToggle => self.on_mute_toggle().await,
            ControlSignal::Click => self.on_click().await,
            ControlSignal::VisibilityChanged(visible) => {
                self.on_visibility_changed(visible).await
            }
            ControlSignal::Release => self.release().await,
        }
    }

    /// Handle a playback engine notification
    pub async fn on_player_notice(&mut self, notice: PlayerNotice) {
        if self.halted() {
            return;
        }

        match notice {
            PlayerNotice::Ready => self.on_ready().await,
            PlayerNotice::Buffering => self.verification.buffer_start().await,
            PlayerNotice::Ended | PlayerNotice::LoopTransition => self.on_completed().await,
            PlayerNotice::VolumeChanged(level) => {
                // Engine-side sync only; beacons fire on the toggle path
                self.session.muted = level == 0.0;
            }
            PlayerNotice::Fatal(reason) => {
                log::error!("Fatal playback error: {reason}");
                self.fatal = Some(reason.clone());
                self.emit(SessionEvent::Fatal(reason));
            }
        }
    }

    async fn on_ready(&mut self) {
        if !self.session.loaded_fired {
            // Impression beacons first, then verification loaded, then
            // verification impression. Downstream measurement depends on
            // this order.
            for url in &self.creative.impression_urls {
                self.beacons.dispatch(url, "impression");
            }
            self.verification.loaded().await;
            self.verification.impression_occurred().await;
            self.session.loaded_fired = true;
            self.emit(SessionEvent::Loaded);
        }

        // Unconditional on every ready, not gated by the once-per-load flag;
        // downstream measurement counts on seeing it each time.
        self.verification.buffer_finish().await;
    }

    /// One progress poll: classify the current position and fire the
    /// quartile event when the bucket advances past the watermark.
    pub async fn on_progress_tick(&mut self) {
        if self.halted() {
            return;
        }

        let duration_ms = self.player.duration_ms().await;
        if duration_ms <= 0 {
            return;
        }
        let position_ms = self.player.position_ms().await;

        let current = quartile::classify(position_ms, duration_ms);
        // Strictly-greater ordinal check: quartiles already reached (or
        // passed on a bucket skip) never re-fire, including after a
        // loop-restart.
        if current > self.session.highest_quartile {
            log::debug!("Quartile reached: {current} ({position_ms}/{duration_ms}ms)");
            self.session.highest_quartile = current;
            self.send_quartile(current, duration_ms).await;
            self.emit(SessionEvent::QuartileReached(current));
        }
    }

    async fn send_quartile(&mut self, quartile: Quartile, duration_ms: i64) {
        if let Some(event) = quartile.beacon_event() {
            self.beacon(event);
        }
        match quartile {
            Quartile::Start => {
                self.verification
                    .start(duration_ms, self.current_volume())
                    .await
            }
            Quartile::First => self.verification.first_quartile().await,
            Quartile::Second => self.verification.midpoint().await,
            Quartile::Third => self.verification.third_quartile().await,
            Quartile::Unknown | Quartile::Complete => (),
        }
    }

    /// Completion handler, reached from either an end-of-stream or a
    /// loop-transition notice — whichever lands first wins; the other is a
    /// no-op. The restart that follows must not reset any session state.
    async fn on_completed(&mut self) {
        if self.session.complete_fired {
            return;
        }
        self.session.complete_fired = true;
        self.session.highest_quartile = Quartile::Complete;

        self.beacon("complete");
        self.verification.complete().await;
        self.emit(SessionEvent::Completed);

        self.player.seek_to(0).await;
        self.player.play().await;
    }

    /// User-initiated play/pause toggle. Fires pause/resume events only
    /// once playback has meaningfully started (some quartile reached); the
    /// engine command is issued either way.
    pub async fn on_user_play_pause(&mut self) {
        if self.halted() {
            return;
        }

        let started = self.session.highest_quartile > Quartile::Unknown;
        if self.session.user_paused {
            self.player.play().await;
            if started {
                self.beacon("resume");
                self.verification.resume().await;
                self.emit(SessionEvent::Resumed { user: true });
            }
            self.session.user_paused = false;
        } else {
            self.player.pause().await;
            if started {
                self.beacon("pause");
                self.verification.pause().await;
                self.emit(SessionEvent::Paused { user: true });
            }
            self.session.user_paused = true;
        }
    }

    /// Visibility-driven pause/resume. Commands the engine and notifies the
    /// verification session, but never fires a tracking beacon: visibility
    /// gating is not a user action for measurement purposes.
    pub async fn on_visibility_changed(&mut self, visible: bool) {
        if self.halted() {
            return;
        }

        if visible {
            self.player.play().await;
            self.verification.resume().await;
            self.emit(SessionEvent::Resumed { user: false });
        } else {
            self.player.pause().await;
            self.verification.pause().await;
            self.emit(SessionEvent::Paused { user: false });
        }
    }

    /// Mute/unmute toggle. Fires on every toggle, not once per load.
    pub async fn on_mute_toggle(&mut self) {
        if self.halted() {
            return;
        }

        let muted = !self.session.muted;
        self.session.muted = muted;
        let level = if muted { 0.0 } else { 1.0 };

        self.player.set_volume(level).await;
        self.beacon(if muted { "mute" } else { "unmute" });
        self.verification.volume_change(level).await;
        self.emit(SessionEvent::VolumeChanged(level));
    }

    /// Click on the creative. With a click-through URL: click-tracking
    /// beacons, URL hand-off, and the verification interaction call.
    /// Without one, the click is reinterpreted as a play/pause toggle.
    pub async fn on_click(&mut self) {
        if self.halted() {
            return;
        }

        match self.creative.click_through_url.clone() {
            Some(destination) => {
                for url in &self.creative.click_tracking_urls {
                    self.beacons.dispatch(url, "clickTracking");
                }
                self.opener.open(&destination);
                self.verification.click_interaction().await;
                self.emit(SessionEvent::Clicked);
            }
            None => self.on_user_play_pause().await,
        }
    }

    /// Tear the session down: cancel every in-flight and pending-retry
    /// beacon, stop the verification session, discard session state. No
    /// beacon or verification call fires afterward.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.beacons.cancel_all();
        self.verification.stop_session().await;
        self.session = PlaybackSessionState::new();
        self.emit(SessionEvent::Released);
    }

    /// Drive the control timeline until released: a periodic progress tick
    /// plus externally fed signals, serialized onto this single task.
    ///
    /// Returns `Err(PlaybackFatal)` when the session hit a fatal playback
    /// error before release. A fatal error stops polling but keeps the loop
    /// alive so release can still tear the session down.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<ControlSignal>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_progress_tick().await,
                signal = signals.recv() => {
                    // A dropped sender tears the session down like Release
                    let signal = signal.unwrap_or(ControlSignal::Release);
                    let releasing = signal == ControlSignal::Release;
                    self.on_signal(signal).await;
                    if releasing {
                        return match self.fatal.take() {
                            Some(reason) => Err(AdError::PlaybackFatal(reason)),
                            None => Ok(()),
                        };
                    }
                }
            }
        }
    }

    /// Move the orchestrator onto its own task and return a signal handle
    /// plus the task's join handle.
    pub fn spawn(mut self) -> (OrchestratorHandle, tokio::task::JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::channel(32);
        let join = tokio::spawn(async move { self.run(rx).await });
        (OrchestratorHandle { tx }, join)
    }

    fn halted(&self) -> bool {
        self.released || self.fatal.is_some()
    }

    fn current_volume(&self) -> f32 {
        if self.session.muted { 0.0 } else { 1.0 }
    }

    /// Fire the tracking beacon for an event name. A missing URL skips the
    /// beacon silently; the paired verification call still happens.
    fn beacon(&self, event: &str) {
        match self.creative.tracking_url(event) {
            Some(url) => self.beacons.dispatch(url, event),
            None => log::debug!("No {event} tracking URL; skipping beacon"),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Cloneable sender half used to feed signals into a running control loop
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<ControlSignal>,
}

impl OrchestratorHandle {
    /// Forward a playback engine notification
    pub async fn notify(&self, notice: PlayerNotice) {
        self.send(ControlSignal::Player(notice)).await;
    }

    pub async fn user_play_pause(&self) {
        self.send(ControlSignal::UserPlayPause).await;
    }

    pub async fn mute_toggle(&self) {
        self.send(ControlSignal::MuteToggle).await;
    }

    pub async fn click(&self) {
        self.send(ControlSignal::Click).await;
    }

    pub async fn visibility_changed(&self, visible: bool) {
        self.send(ControlSignal::VisibilityChanged(visible)).await;
    }

    pub async fn release(&self) {
        self.send(ControlSignal::Release).await;
    }

    async fn send(&self, signal: ControlSignal) {
        if self.tx.send(signal).await.is_err() {
            log::debug!("Control loop gone; dropping signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::DispatcherConfig;
    use crate::models::MediaRendition;
    use crate::testing::{MockOpener, MockPlayer, MockTransport, MockVerification, VerificationCall};
    use std::collections::HashMap;
    use tokio::time::advance;
    use url::Url;

    const DURATION_MS: i64 = 10_000;

    struct Harness {
        orchestrator: PlaybackOrchestrator,
        player: Arc<MockPlayer>,
        verification: Arc<MockVerification>,
        transport: Arc<MockTransport>,
        opener: Arc<MockOpener>,
    }

    impl Harness {
        fn session_quartile(&self) -> Quartile {
            self.orchestrator.session().highest_quartile
        }
    }

    fn tracking_url(event: &str) -> (String, Url) {
        (
            event.to_string(),
            Url::parse(&format!("https://track.example.com/{event}")).unwrap(),
        )
    }

    fn creative() -> AdCreative {
        let tracking_events: HashMap<String, Url> = [
            tracking_url("start"),
            tracking_url("firstQuartile"),
            tracking_url("midpoint"),
            tracking_url("thirdQuartile"),
            tracking_url("complete"),
            tracking_url("pause"),
            tracking_url("resume"),
            tracking_url("mute"),
            tracking_url("unmute"),
        ]
        .into_iter()
        .collect();

        AdCreative {
            media_renditions: vec![MediaRendition {
                url: Url::parse("https://cdn.example.com/ad.mp4").unwrap(),
                width: Some(640),
                height: Some(360),
                mime_type: Some("video/mp4".to_string()),
                caption_url: None,
            }],
            duration_label: Some("00:00:10".to_string()),
            impression_urls: vec![
                Url::parse("https://track.example.com/imp1").unwrap(),
                Url::parse("https://track.example.com/imp2").unwrap(),
            ],
            error_urls: Vec::new(),
            click_tracking_urls: vec![Url::parse("https://track.example.com/click").unwrap()],
            tracking_events,
            click_through_url: Some(Url::parse("https://advertiser.example.com/go").unwrap()),
            closed_caption_url: None,
            verification: None,
        }
    }

    fn harness_with(creative: AdCreative) -> Harness {
        let player = Arc::new(MockPlayer::new());
        let verification = Arc::new(MockVerification::new());
        let transport = Arc::new(MockTransport::new());
        let opener = Arc::new(MockOpener::new());
        let beacons = BeaconDispatcher::new(transport.clone(), &DispatcherConfig::default());

        let orchestrator = PlaybackOrchestrator::new(
            Arc::new(creative),
            player.clone(),
            verification.clone(),
            opener.clone(),
            beacons,
            OrchestratorConfig::default(),
        );

        Harness {
            orchestrator,
            player,
            verification,
            transport,
            opener,
        }
    }

    fn harness() -> Harness {
        harness_with(creative())
    }

    /// Let spawned beacon tasks drain (paused clock steps through backoffs)
    async fn flush_beacons() {
        for _ in 0..8 {
            advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }
    }

    /// Drive a progress tick at the given position
    async fn tick_at(harness: &mut Harness, position_ms: i64) {
        harness.player.set_position(position_ms).await;
        harness.orchestrator.on_progress_tick().await;
    }

    async fn start_playback(harness: &mut Harness) {
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ready)
            .await;
        // Past 1% so Start fires
        tick_at(harness, 1_000).await;
    }

    #[tokio::test(start_paused = true)]
    async fn load_starts_session_and_player() {
        let mut harness = harness();
        harness.orchestrator.load().await.unwrap();

        assert_eq!(
            harness.verification.calls().await,
            vec![VerificationCall::StartSession]
        );
        let commands = harness.player.commands().await;
        assert!(matches!(
            &commands[0],
            crate::testing::PlayerCommand::Load { uri, .. }
                if uri.as_str() == "https://cdn.example.com/ad.mp4"
        ));
        assert_eq!(commands[1], crate::testing::PlayerCommand::Play);
    }

    #[tokio::test(start_paused = true)]
    async fn load_fails_without_renditions() {
        let mut harness = harness_with(AdCreative::empty());
        assert!(harness.orchestrator.load().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn impression_fires_once_buffer_finish_every_ready() {
        let mut harness = harness();
        harness.orchestrator.load().await.unwrap();

        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ready)
            .await;
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ready)
            .await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/imp1").await, 1);
        assert_eq!(harness.transport.attempts_to("/imp2").await, 1);
        assert_eq!(
            harness.verification.count(&VerificationCall::Loaded).await,
            1
        );
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::ImpressionOccurred)
                .await,
            1
        );
        // The buffer-finish call is not gated by the once-per-load flag
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::BufferFinish)
                .await,
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_ordering_is_loaded_then_impression() {
        let mut harness = harness();
        harness.orchestrator.load().await.unwrap();
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ready)
            .await;

        let calls = harness.verification.calls().await;
        assert_eq!(
            calls,
            vec![
                VerificationCall::StartSession,
                VerificationCall::Loaded,
                VerificationCall::ImpressionOccurred,
                VerificationCall::BufferFinish,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quartiles_fire_in_order_with_watermark() {
        let mut harness = harness();
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();

        tick_at(&mut harness, 0).await; // Unknown
        tick_at(&mut harness, 1_000).await; // Start
        tick_at(&mut harness, 1_000).await; // duplicate tick, no re-fire
        tick_at(&mut harness, 2_600).await; // First
        tick_at(&mut harness, 5_100).await; // Second
        tick_at(&mut harness, 7_600).await; // Third
        tick_at(&mut harness, 7_700).await; // still Third
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/start").await, 1);
        assert_eq!(harness.transport.attempts_to("/firstQuartile").await, 1);
        assert_eq!(harness.transport.attempts_to("/midpoint").await, 1);
        assert_eq!(harness.transport.attempts_to("/thirdQuartile").await, 1);
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::Start {
                    duration_ms: DURATION_MS,
                    volume: 1.0
                })
                .await,
            1
        );
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::FirstQuartile)
                .await,
            1
        );
        assert_eq!(harness.session_quartile(), Quartile::Third);
    }

    #[tokio::test(start_paused = true)]
    async fn start_reports_duration_in_milliseconds() {
        let mut harness = harness();
        harness.player.set_duration(30_000).await;
        harness.orchestrator.load().await.unwrap();
        tick_at(&mut harness, 3_000).await;

        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::Start {
                    duration_ms: 30_000,
                    volume: 1.0
                })
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_skip_fires_only_the_new_bucket() {
        let mut harness = harness();
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();

        // A fast-loading short video: the first poll already sits in First
        tick_at(&mut harness, 2_600).await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/start").await, 0);
        assert_eq!(harness.transport.attempts_to("/firstQuartile").await, 1);
        assert_eq!(harness.session_quartile(), Quartile::First);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_fires_exactly_once_across_both_triggers() {
        let mut harness = harness();
        start_playback(&mut harness).await;

        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ended)
            .await;
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::LoopTransition)
            .await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/complete").await, 1);
        assert_eq!(
            harness.verification.count(&VerificationCall::Complete).await,
            1
        );
        // Restart issued once: seek to zero and continue playing
        assert_eq!(
            harness
                .player
                .count(&crate::testing::PlayerCommand::SeekTo(0))
                .await,
            1
        );
        assert_eq!(harness.session_quartile(), Quartile::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_transition_alone_completes() {
        let mut harness = harness();
        start_playback(&mut harness).await;

        harness
            .orchestrator
            .on_player_notice(PlayerNotice::LoopTransition)
            .await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/complete").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_event_refires_on_post_completion_sweep() {
        let mut harness = harness();
        start_playback(&mut harness).await;
        tick_at(&mut harness, 2_600).await;
        tick_at(&mut harness, 5_100).await;
        tick_at(&mut harness, 7_600).await;
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ended)
            .await;
        flush_beacons().await;
        let beacons_before = harness.transport.attempt_count().await;
        let calls_before = harness.verification.calls().await.len();

        // Full second sweep after the loop-restart
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ready)
            .await;
        for position in [0, 1_000, 2_600, 5_100, 7_600, 9_900] {
            tick_at(&mut harness, position).await;
        }
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::LoopTransition)
            .await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempt_count().await, beacons_before);
        // Only the unconditional buffer-finish accompanies the second ready
        let new_calls: Vec<_> = harness.verification.calls().await[calls_before..].to_vec();
        assert_eq!(new_calls, vec![VerificationCall::BufferFinish]);
    }

    #[tokio::test(start_paused = true)]
    async fn user_pause_resume_fires_beacons_after_start() {
        let mut harness = harness();
        start_playback(&mut harness).await;

        harness.orchestrator.on_user_play_pause().await; // pause
        harness.orchestrator.on_user_play_pause().await; // resume
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/pause").await, 1);
        assert_eq!(harness.transport.attempts_to("/resume").await, 1);
        assert_eq!(harness.verification.count(&VerificationCall::Pause).await, 1);
        assert_eq!(
            harness.verification.count(&VerificationCall::Resume).await,
            1
        );
        assert_eq!(
            harness
                .player
                .count(&crate::testing::PlayerCommand::Pause)
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pause_before_any_quartile_is_silent() {
        let mut harness = harness();
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();

        harness.orchestrator.on_user_play_pause().await;
        harness.orchestrator.on_user_play_pause().await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/pause").await, 0);
        assert_eq!(harness.transport.attempts_to("/resume").await, 0);
        assert_eq!(harness.verification.count(&VerificationCall::Pause).await, 0);
        assert_eq!(
            harness.verification.count(&VerificationCall::Resume).await,
            0
        );
        // The engine is still commanded either way
        assert_eq!(
            harness
                .player
                .count(&crate::testing::PlayerCommand::Pause)
                .await,
            1
        );
        assert_eq!(
            harness
                .player
                .count(&crate::testing::PlayerCommand::Play)
                .await,
            2 // load() + resume
        );
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_cycle_never_fires_beacons() {
        let mut harness = harness();
        start_playback(&mut harness).await;
        flush_beacons().await;
        let beacons_before = harness.transport.attempt_count().await;

        harness.orchestrator.on_visibility_changed(false).await;
        harness.orchestrator.on_visibility_changed(true).await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempt_count().await, beacons_before);
        assert_eq!(harness.verification.count(&VerificationCall::Pause).await, 1);
        assert_eq!(
            harness.verification.count(&VerificationCall::Resume).await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mute_toggle_fires_every_time() {
        let mut harness = harness();
        start_playback(&mut harness).await;

        harness.orchestrator.on_mute_toggle().await; // mute
        harness.orchestrator.on_mute_toggle().await; // unmute
        harness.orchestrator.on_mute_toggle().await; // mute again
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/mute").await, 2);
        assert_eq!(harness.transport.attempts_to("/unmute").await, 1);
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::VolumeChange(0.0))
                .await,
            2
        );
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::VolumeChange(1.0))
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn muted_start_reports_zero_volume() {
        let mut harness = harness();
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();
        harness.orchestrator.on_mute_toggle().await;
        tick_at(&mut harness, 1_000).await;

        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::Start {
                    duration_ms: DURATION_MS,
                    volume: 0.0
                })
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn click_with_destination_tracks_and_opens() {
        let mut harness = harness();
        start_playback(&mut harness).await;

        harness.orchestrator.on_click().await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/click").await, 1);
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::ClickInteraction)
                .await,
            1
        );
        assert_eq!(
            harness.opener.opened(),
            vec![Url::parse("https://advertiser.example.com/go").unwrap()]
        );
        // Not reinterpreted as a pause
        assert_eq!(
            harness
                .player
                .count(&crate::testing::PlayerCommand::Pause)
                .await,
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn click_without_destination_toggles_playback() {
        let mut base = creative();
        base.click_through_url = None;
        let mut harness = harness_with(base);
        start_playback(&mut harness).await;

        harness.orchestrator.on_click().await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/click").await, 0);
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::ClickInteraction)
                .await,
            0
        );
        assert_eq!(harness.transport.attempts_to("/pause").await, 1);
        assert!(harness.orchestrator.session().user_paused);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_beacon_url_still_makes_verification_call() {
        let mut base = creative();
        base.tracking_events.remove("midpoint");
        let mut harness = harness_with(base);
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();

        tick_at(&mut harness, 5_100).await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/midpoint").await, 0);
        assert_eq!(
            harness.verification.count(&VerificationCall::Midpoint).await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn release_cancels_pending_beacon_retries() {
        let mut harness = harness();
        harness
            .transport
            .script_responses([Ok(503), Ok(503), Ok(503)])
            .await;
        start_playback(&mut harness).await;

        // First attempt fails, 1s retry timer arms
        advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        let before = harness.transport.attempt_count().await;

        harness.orchestrator.release().await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempt_count().await, before);
        assert_eq!(
            harness
                .verification
                .count(&VerificationCall::StopSession)
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_events_after_release() {
        let mut harness = harness();
        start_playback(&mut harness).await;
        harness.orchestrator.release().await;
        flush_beacons().await;
        let beacons_before = harness.transport.attempt_count().await;
        let calls_before = harness.verification.calls().await.len();

        tick_at(&mut harness, 7_600).await;
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ended)
            .await;
        harness.orchestrator.on_user_play_pause().await;
        harness.orchestrator.on_mute_toggle().await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempt_count().await, beacons_before);
        assert_eq!(harness.verification.calls().await.len(), calls_before);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_terminal() {
        let mut harness = harness();
        start_playback(&mut harness).await;
        let mut events = harness.orchestrator.subscribe();

        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Fatal("decoder died".to_string()))
            .await;
        flush_beacons().await;
        let beacons_before = harness.transport.attempt_count().await;

        // Polling and user actions are dead after the fatal notice
        tick_at(&mut harness, 7_600).await;
        harness.orchestrator.on_user_play_pause().await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempt_count().await, beacons_before);
        assert_eq!(harness.orchestrator.fatal(), Some("decoder died"));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Fatal("decoder died".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_load_rearms_after_completion() {
        let mut harness = harness();
        start_playback(&mut harness).await;
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ended)
            .await;
        flush_beacons().await;
        assert_eq!(harness.transport.attempts_to("/complete").await, 1);

        harness.orchestrator.load().await.unwrap();
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ready)
            .await;
        tick_at(&mut harness, 1_000).await;
        harness
            .orchestrator
            .on_player_notice(PlayerNotice::Ended)
            .await;
        flush_beacons().await;

        assert_eq!(harness.transport.attempts_to("/start").await, 2);
        assert_eq!(harness.transport.attempts_to("/complete").await, 2);
        assert_eq!(harness.transport.attempts_to("/imp1").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_polls_and_releases() {
        let mut harness = harness();
        harness.player.set_duration(DURATION_MS).await;
        harness.player.set_position(1_000).await;
        harness.orchestrator.load().await.unwrap();

        let transport = harness.transport.clone();
        let verification = harness.verification.clone();
        let (handle, join) = harness.orchestrator.spawn();

        // Let the poll task observe the position a few times
        for _ in 0..5 {
            advance(Duration::from_millis(100)).await;
            tokio::task::yield_now().await;
        }
        handle.release().await;
        let result = join.await.unwrap();
        flush_beacons().await;

        assert!(result.is_ok());
        assert_eq!(transport.attempts_to("/start").await, 1);
        assert_eq!(verification.count(&VerificationCall::StopSession).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_surfaces_fatal_on_release() {
        let mut harness = harness();
        harness.player.set_duration(DURATION_MS).await;
        harness.orchestrator.load().await.unwrap();

        let (handle, join) = harness.orchestrator.spawn();
        handle
            .notify(PlayerNotice::Fatal("network gone".to_string()))
            .await;
        handle.release().await;

        let result = join.await.unwrap();
        assert!(matches!(result, Err(AdError::PlaybackFatal(reason)) if reason == "network gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn volume_changed_notice_syncs_without_events() {
        let mut harness = harness();
        start_playback(&mut harness).await;
        flush_beacons().await;
        let beacons_before = harness.transport.attempt_count().await;
        let calls_before = harness.verification.calls().await.len();

        harness
            .orchestrator
            .on_player_notice(PlayerNotice::VolumeChanged(0.0))
            .await;
        flush_beacons().await;

        assert!(harness.orchestrator.session().muted);
        assert_eq!(harness.transport.attempt_count().await, beacons_before);
        assert_eq!(harness.verification.calls().await.len(), calls_before);
    }
}
