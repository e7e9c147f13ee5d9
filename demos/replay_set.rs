use bytes::Bytes;
use futures::stream;
use tracing::{info, warn};
use vitruvian_link::{
    protocol,
    session::{SessionEvent, TrainerSession, Transport},
    types::MachineRepCounters,
    ControllerConfig, ProgramMode, RepNotification, Result, StatusFlags, TelemetrySample,
    WorkoutMode, WorkoutParameters, MONITOR_CHAR_UUID, REPS_CHAR_UUID,
};

/// Prints every frame instead of sending it
struct ConsoleTransport;

#[async_trait::async_trait]
impl Transport for ConsoleTransport {
    async fn write(&self, frame: Bytes) -> Result<()> {
        info!("➡️  {} bytes: {:02X?}", frame.len(), frame.as_ref());
        Ok(())
    }
}

fn telemetry(timestamp_ms: u64, position: f32) -> TelemetrySample {
    TelemetrySample {
        timestamp_ms,
        ticks: u32::try_from(timestamp_ms / 10).unwrap_or(u32::MAX),
        position_a: position,
        position_b: position,
        load_a: 12.0,
        load_b: 12.0,
        velocity_a: 0.0,
        velocity_b: 0.0,
        status: StatusFlags::default(),
    }
}

fn reps(up: u16, down: u16, warmup: u16, working: u16, position: f32) -> RepNotification {
    RepNotification {
        up,
        down,
        position_a: position,
        position_b: Some(position),
        machine: Some(MachineRepCounters {
            warmup_count: warmup,
            warmup_target: 2,
            working_count: working,
            working_target: 3,
            range_top: 550.0,
            range_bottom: 20.0,
        }),
    }
}

/// A recorded set: two warm-up reps, then three working reps
fn recording() -> Vec<(uuid::Uuid, Bytes)> {
    let monitor = |t: u64, position: f32| {
        (MONITOR_CHAR_UUID, protocol::encode_telemetry(&telemetry(t, position)))
    };
    let counters = |up: u16, down: u16, done: u16, position: f32| {
        let notification = reps(up, down, done.min(2), done.saturating_sub(2), position);
        (REPS_CHAR_UUID, protocol::encode_rep_notification(&notification))
    };

    let mut frames = vec![counters(0, 0, 0, 20.0)];
    let mut t = 0;
    for rep in 1..=5u16 {
        for step in (0..10u8).chain((0..=10u8).rev()) {
            t += 100;
            frames.push(monitor(t, 20.0 + 53.0 * f32::from(step)));
            if step == 10 {
                frames.push(counters(rep, rep - 1, rep - 1, 550.0));
            }
        }
        frames.push(counters(rep, rep, rep, 20.0));
    }
    frames
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🏋️ Vitruvian Link Replay Example");

    let (session, mut events) = TrainerSession::new(ConsoleTransport, ControllerConfig::default());

    let params = WorkoutParameters {
        mode: WorkoutMode::Program(ProgramMode::Pump),
        weight_per_cable_kg: 12.0,
        reps: 3,
        warmup_reps: 2,
        ..WorkoutParameters::default()
    };

    session.initialize().await?;
    session.configure(params).await?;
    session.start_workout().await?;

    session.run(stream::iter(recording())).await?;

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Rep(rep) => info!("🔁 {:?}", rep),
            SessionEvent::RepCount(count) => info!(
                "📊 warm-up {} | working {} | pending {}",
                count.warmup_reps, count.working_reps, count.has_pending_rep
            ),
            SessionEvent::WorkoutStopped { cause } => info!("🛑 Set ended: {}", cause),
            SessionEvent::Telemetry(_) => {}
            other => warn!("{:?}", other),
        }
    }

    let ranges = session.rep_ranges().await;
    info!(
        "📏 Cable A range: {:?} - {:?} mm",
        ranges.a.min_pos, ranges.a.max_pos
    );

    Ok(())
}
