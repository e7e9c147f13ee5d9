use crate::{
    auto_start::{
        AbortReason, AutoStartController, CountdownAction, CountdownToken, GuardContext,
        StartDecision,
    },
    auto_stop::{AutoStopController, AutoStopStatus, StopTrigger},
    error::{Result, TrainerError},
    handle::HandleStateMachine,
    protocol::{self, Notification},
    rep_counter::RepCounter,
    types::{
        ColorScheme, ControllerConfig, HandleState, RepCount, RepEvent, RepNotification,
        RepRanges, TelemetrySample, WorkoutParameters,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, Mutex},
    time::Instant,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Write side of the link to the trainer
///
/// Implemented over whatever radio stack the application uses. Frames passed
/// to [`Transport::write`] go to [`crate::COMMAND_CHAR_UUID`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Write one command frame
    ///
    /// # Errors
    ///
    /// Returns a transport error if the frame could not be delivered:
    /// [`TrainerError::WriteFailed`], [`TrainerError::Disconnected`] once the
    /// link is gone, or [`TrainerError::Io`]. The session never retries.
    async fn write(&self, frame: Bytes) -> Result<()>;
}

/// Session-level workout state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkoutState {
    /// Nothing configured
    #[default]
    Idle,
    /// Parameters set, waiting for a start
    Configured,
    /// Handle detection armed, waiting for a grab
    WaitingForGrab,
    /// Auto-start countdown running
    Countdown,
    /// Set in progress
    Active,
    /// Set ended
    Stopped,
}

impl fmt::Display for WorkoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Configured => write!(f, "Configured"),
            Self::WaitingForGrab => write!(f, "Waiting For Grab"),
            Self::Countdown => write!(f, "Countdown"),
            Self::Active => write!(f, "Active"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Why a set ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// [`TrainerSession::stop_workout`] was called
    Manual,
    /// Working rep target reached
    RepTargetReached,
    /// Hands-free stop fired
    AutoStop(StopTrigger),
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::RepTargetReached => write!(f, "rep target reached"),
            Self::AutoStop(trigger) => write!(f, "auto-stop ({trigger})"),
        }
    }
}

/// Event emitted to the application
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Decoded telemetry sample with derived velocities
    Telemetry(TelemetrySample),
    /// Rep lifecycle event
    Rep(RepEvent),
    /// Rep count after a rep notification was processed
    RepCount(RepCount),
    /// Handle detection changed state
    HandleStateChanged(HandleState),
    /// Seconds left in the auto-start countdown
    CountdownTick {
        /// Seconds remaining
        remaining: u8,
    },
    /// Auto-start countdown cancelled because the handles were released
    CountdownCancelled,
    /// Countdown elapsed but the final guard refused to start
    AutoStartAborted(AbortReason),
    /// START was written
    WorkoutStarted,
    /// STOP was written
    WorkoutStopped {
        /// Why the set ended
        cause: StopCause,
    },
    /// Machine reported that it released the load
    DeloadOccurred,
    /// A write issued by a countdown or watchdog task failed
    ///
    /// Writes made from an application call return their error directly and
    /// are not reported here.
    CommandFailed {
        /// Command that was being written
        command: &'static str,
        /// Transport error, rendered
        error: String,
    },
}

#[derive(Debug, Default)]
struct SessionState {
    params: Option<WorkoutParameters>,
    workout_state: WorkoutState,
    rep_counter: RepCounter,
    handle: HandleStateMachine,
    auto_start: AutoStartController,
    auto_stop: AutoStopController,
    last_sample: Option<TelemetrySample>,
    epoch: u64,
    deloaded: bool,
}

impl SessionState {
    fn new(config: ControllerConfig) -> Self {
        Self {
            rep_counter: RepCounter::with_config(config.rep_counter),
            handle: HandleStateMachine::with_config(config.handle),
            auto_start: AutoStartController::with_config(config.auto_start),
            auto_stop: AutoStopController::with_config(config.auto_stop),
            ..Self::default()
        }
    }

    fn auto_stop_applies(&self) -> bool {
        self.params.is_some_and(|params| params.is_unlimited())
    }

    fn auto_start_requested(&self) -> bool {
        self.params.is_some_and(|params| params.auto_start)
    }

    fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Drives one trainer from its notification stream
///
/// All component state sits behind one lock, so notifications, timers and
/// application calls are applied one at a time. Writes that depend on a
/// decision (START after a countdown, STOP after auto-stop) happen while that
/// lock is held.
///
/// # Examples
///
/// ```no_run
/// use bytes::Bytes;
/// use vitruvian_link::session::{TrainerSession, Transport};
/// use vitruvian_link::{ControllerConfig, WorkoutParameters};
///
/// struct Radio;
///
/// #[async_trait::async_trait]
/// impl Transport for Radio {
///     async fn write(&self, _frame: Bytes) -> vitruvian_link::Result<()> {
///         // hand the frame to the BLE stack
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (session, mut events) = TrainerSession::new(Radio, ControllerConfig::default());
///     session.initialize().await?;
///     session.configure(WorkoutParameters::default()).await?;
///     session.start_workout().await?;
///
///     while let Some(event) = events.recv().await {
///         println!("{event:?}");
///     }
///     Ok(())
/// }
/// ```
pub struct TrainerSession<T: Transport> {
    transport: Arc<T>,
    state: Arc<Mutex<SessionState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    origin: Instant,
}

impl<T: Transport> Clone for TrainerSession<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            origin: self.origin,
        }
    }
}

impl<T: Transport> TrainerSession<T> {
    /// Create a session and the receiver for its events
    pub fn new(
        transport: T,
        config: ControllerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(SessionState::new(config))),
            events,
            origin: Instant::now(),
        };
        (session, receiver)
    }

    /// Transport in use
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Milliseconds since the session was created
    ///
    /// Telemetry timestamps passed to [`TrainerSession::handle_telemetry`] must
    /// use this clock so they line up with the auto-stop watchdog.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Send the INIT/reset frame
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the write fails.
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing trainer");
        self.write(protocol::encode_init()).await
    }

    /// Set parameters for the next set
    ///
    /// Counts are cleared; range of motion from earlier sets is kept.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::InvalidParameters`] if validation fails, or
    /// [`TrainerError::InvalidState`] while a set is active.
    pub async fn configure(&self, params: WorkoutParameters) -> Result<()> {
        params.validate()?;

        let mut state = self.state.lock().await;
        if state.workout_state == WorkoutState::Active {
            return Err(TrainerError::InvalidState {
                state: state.workout_state.to_string(),
            });
        }

        state.params = Some(params);
        state.rep_counter.configure_from(&params);
        state.rep_counter.reset_counts_only();
        state.auto_stop.reset();
        state.auto_start.disarm();
        state.handle.disable();
        state.bump_epoch();
        state.workout_state = WorkoutState::Configured;

        info!(
            mode = %params.mode,
            weight_kg = params.weight_per_cable_kg,
            reps = params.reps,
            "Workout configured"
        );
        Ok(())
    }

    /// Write the configuration frame followed by START
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::NotConfigured`] before [`TrainerSession::configure`],
    /// [`TrainerError::InvalidState`] if a set is already active, or the
    /// transport's error.
    pub async fn start_workout(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.auto_start.disarm();
        self.launch(&mut state).await
    }

    /// Write the primary STOP frame and end the set
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the write fails.
    pub async fn stop_workout(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.auto_start.disarm();
        state.handle.disable();
        self.finish(&mut state, StopCause::Manual).await
    }

    /// Write the soft stop that also clears a fault/blink state
    ///
    /// Does not change the workout state.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the write fails.
    pub async fn official_stop(&self) -> Result<()> {
        info!("Sending official stop");
        self.write(protocol::encode_official_stop()).await
    }

    /// Write an LED colour scheme
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the write fails.
    pub async fn set_color_scheme(&self, scheme: &ColorScheme) -> Result<()> {
        self.write(protocol::encode_color_scheme(scheme)).await
    }

    /// Arm handle detection, and hands-free start when configured
    ///
    /// Returns `false` if the call was debounced. Range of motion is kept.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::NotConfigured`] before [`TrainerSession::configure`]
    /// or [`TrainerError::InvalidState`] while a set is active.
    pub async fn enable_just_lift_waiting_mode(&self) -> Result<bool> {
        let now = self.now_ms();
        let mut state = self.state.lock().await;

        if state.params.is_none() {
            return Err(TrainerError::NotConfigured);
        }
        if state.workout_state == WorkoutState::Active {
            return Err(TrainerError::InvalidState {
                state: state.workout_state.to_string(),
            });
        }

        if !state.handle.enable(now) {
            return Ok(false);
        }

        if state.auto_start_requested() {
            state.auto_start.arm();
        }
        state.rep_counter.reset_counts_only();
        state.auto_stop.reset();
        state.workout_state = WorkoutState::WaitingForGrab;
        self.emit(SessionEvent::HandleStateChanged(state.handle.state()));
        Ok(true)
    }

    /// Stop handle detection and cancel any countdown
    pub async fn disable_handle_detection(&self) {
        let mut state = self.state.lock().await;
        state.handle.disable();
        state.auto_start.disarm();
        if matches!(
            state.workout_state,
            WorkoutState::WaitingForGrab | WorkoutState::Countdown
        ) {
            state.workout_state = WorkoutState::Configured;
        }
    }

    /// Decode and apply one notification
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::Decode`] for undecodable bytes or an unknown
    /// characteristic, or an error from a write the notification triggered.
    pub async fn handle_notification(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let notification = Notification::decode(characteristic, data, self.now_ms())
            .map_err(|error| {
                debug!(%characteristic, len = data.len(), %error, "Rejected notification");
                error
            })?;

        match notification {
            Notification::Telemetry(sample) => self.handle_telemetry(sample).await,
            Notification::Reps(reps) => self.handle_rep_notification(reps).await,
        }
    }

    /// Apply one telemetry sample
    ///
    /// # Errors
    ///
    /// Returns the transport's error if auto-stop fired and STOP could not be
    /// written.
    pub async fn handle_telemetry(&self, sample: TelemetrySample) -> Result<()> {
        let mut state = self.state.lock().await;

        let sample = match state.last_sample {
            Some(previous) => sample.with_velocity_from(&previous),
            None => TelemetrySample {
                velocity_a: 0.0,
                velocity_b: 0.0,
                ..sample
            },
        };
        state.last_sample = Some(sample);

        if state.workout_state == WorkoutState::Active {
            state
                .rep_counter
                .observe_position(sample.position_a, sample.position_b);
        }
        if matches!(
            state.workout_state,
            WorkoutState::WaitingForGrab | WorkoutState::Countdown
        ) {
            state
                .rep_counter
                .update_position_ranges_continuously(sample.position_a, sample.position_b);
        }

        let deloaded = sample.status.deload_occurred();
        if deloaded && !state.deloaded {
            warn!("Trainer reported deload");
            self.emit(SessionEvent::DeloadOccurred);
        }
        state.deloaded = deloaded;

        if let Some(handle_state) = state.handle.process(&sample) {
            self.emit(SessionEvent::HandleStateChanged(handle_state));
            let epoch = state.epoch;
            match state.auto_start.on_handle_state(handle_state, epoch) {
                Some(CountdownAction::Begin(token)) => {
                    state.workout_state = WorkoutState::Countdown;
                    self.spawn_countdown(
                        token,
                        state.auto_start.countdown_seconds(),
                        state.auto_start.tick_interval_ms(),
                    );
                }
                Some(CountdownAction::Cancel) => {
                    state.workout_state = WorkoutState::WaitingForGrab;
                    self.emit(SessionEvent::CountdownCancelled);
                }
                None => {}
            }
        }

        self.emit(SessionEvent::Telemetry(sample));

        if state.workout_state == WorkoutState::Active && state.auto_stop_applies() {
            let SessionState {
                auto_stop,
                rep_counter,
                ..
            } = &mut *state;
            if let Some(trigger) = auto_stop.process(&sample, rep_counter) {
                return self.finish(&mut state, StopCause::AutoStop(trigger)).await;
            }
        }

        Ok(())
    }

    /// Apply one rep notification
    ///
    /// Ignored outside an active set.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the rep target was reached and STOP
    /// could not be written.
    pub async fn handle_rep_notification(&self, notification: RepNotification) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.workout_state != WorkoutState::Active {
            debug!(state = %state.workout_state, "Ignoring rep notification outside a set");
            return Ok(());
        }

        let position_b = notification
            .position_b
            .or_else(|| state.last_sample.map(|sample| sample.position_b))
            .unwrap_or_default();
        let events = state
            .rep_counter
            .process(&notification, notification.position_a, position_b);

        let completed = events
            .iter()
            .any(|event| matches!(event, RepEvent::WorkoutComplete { .. }));
        for event in events {
            self.emit(SessionEvent::Rep(event));
        }
        self.emit(SessionEvent::RepCount(state.rep_counter.rep_count()));

        if completed {
            return self.finish(&mut state, StopCause::RepTargetReached).await;
        }
        Ok(())
    }

    /// Pump a notification stream until it ends
    ///
    /// Undecodable notifications are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the first transport error raised while applying a notification.
    pub async fn run<S>(&self, stream: S) -> Result<()>
    where
        S: Stream<Item = (Uuid, Bytes)> + Send,
    {
        let mut stream = std::pin::pin!(stream);
        while let Some((characteristic, data)) = stream.next().await {
            match self.handle_notification(characteristic, &data).await {
                Ok(()) => {}
                Err(error) if error.is_recoverable() => {
                    debug!(%error, "Skipping notification");
                }
                Err(error) => {
                    error!(%error, "Notification pump stopped");
                    return Err(error);
                }
            }
        }
        info!("Notification stream ended");
        Ok(())
    }

    /// Current rep count
    pub async fn rep_count(&self) -> RepCount {
        self.state.lock().await.rep_counter.rep_count()
    }

    /// Current range of motion
    pub async fn rep_ranges(&self) -> RepRanges {
        self.state.lock().await.rep_counter.rep_ranges()
    }

    /// Current handle detection state
    pub async fn handle_state(&self) -> HandleState {
        self.state.lock().await.handle.state()
    }

    /// Current workout state
    pub async fn workout_state(&self) -> WorkoutState {
        self.state.lock().await.workout_state
    }

    /// Progress of the leading auto-stop trigger
    pub async fn auto_stop_status(&self) -> AutoStopStatus {
        self.state.lock().await.auto_stop.status()
    }

    async fn write(&self, frame: Bytes) -> Result<()> {
        debug!("Writing frame: {:02X?}", frame.as_ref());
        self.transport.write(frame).await.map_err(|error| {
            error!(%error, "Frame write failed");
            error
        })
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    async fn launch(&self, state: &mut SessionState) -> Result<()> {
        let params = state.params.ok_or(TrainerError::NotConfigured)?;
        if state.workout_state == WorkoutState::Active {
            return Err(TrainerError::InvalidState {
                state: state.workout_state.to_string(),
            });
        }

        self.write(protocol::encode_workout_config(&params)).await?;
        self.write(protocol::encode_start()).await?;

        state.handle.disable();
        state.rep_counter.reset_counts_only();
        state.auto_stop.reset();
        state.bump_epoch();
        state.workout_state = WorkoutState::Active;
        info!(mode = %params.mode, "Workout started");
        self.emit(SessionEvent::WorkoutStarted);

        if state.auto_stop_applies() {
            self.spawn_watchdog(state.epoch, state.auto_stop.watchdog_interval_ms());
        }
        Ok(())
    }

    async fn finish(&self, state: &mut SessionState, cause: StopCause) -> Result<()> {
        self.write(protocol::encode_stop()).await?;

        state.bump_epoch();
        state.workout_state = WorkoutState::Stopped;
        info!(%cause, "Workout stopped");
        self.emit(SessionEvent::WorkoutStopped { cause });
        Ok(())
    }

    fn spawn_countdown(&self, token: CountdownToken, seconds: u8, tick_interval_ms: u64) {
        let session = self.clone();

        tokio::spawn(async move {
            for remaining in (1..=seconds).rev() {
                if !session.state.lock().await.auto_start.is_current(token) {
                    debug!(generation = token.generation(), "Countdown no longer active");
                    return;
                }
                session.emit(SessionEvent::CountdownTick { remaining });
                tokio::time::sleep(Duration::from_millis(tick_interval_ms)).await;
            }

            let mut state = session.state.lock().await;
            let context = GuardContext {
                handle_state: state.handle.state(),
                auto_start_enabled: state.auto_start_requested(),
                session_epoch: state.epoch,
            };

            match state.auto_start.on_countdown_elapsed(token, context) {
                StartDecision::Launch => {
                    if let Err(error) = session.launch(&mut state).await {
                        error!(%error, "Auto-start could not start the workout");
                        // Wait for the handles to be put down and grabbed again
                        state.auto_start.arm();
                        state.workout_state = WorkoutState::WaitingForGrab;
                        session.emit(SessionEvent::CommandFailed {
                            command: "start",
                            error: error.to_string(),
                        });
                    }
                }
                StartDecision::Abort(AbortReason::Superseded) => {}
                StartDecision::Abort(reason) => {
                    if state.workout_state == WorkoutState::Countdown {
                        state.workout_state = WorkoutState::WaitingForGrab;
                    }
                    session.emit(SessionEvent::AutoStartAborted(reason));
                }
            }
        });
    }

    fn spawn_watchdog(&self, epoch: u64, interval_ms: u64) {
        let session = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                interval.tick().await;

                let mut state = session.state.lock().await;
                if state.epoch != epoch || state.workout_state != WorkoutState::Active {
                    debug!("Auto-stop watchdog finished");
                    return;
                }

                if let Some(trigger) = state.auto_stop.poll(session.now_ms()) {
                    let cause = StopCause::AutoStop(trigger);
                    if let Err(error) = session.finish(&mut state, cause).await {
                        error!(%error, "Auto-stop could not stop the workout");
                        session.emit(SessionEvent::CommandFailed {
                            command: "stop",
                            error: error.to_string(),
                        });
                    }
                    return;
                }
            }
        });
    }
}
