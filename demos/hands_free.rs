use bytes::Bytes;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use vitruvian_link::{
    session::{SessionEvent, TrainerSession, Transport},
    AutoStartConfig, ControllerConfig, Result, StatusFlags, TelemetrySample, WorkoutParameters,
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

async fn hold(
    session: &TrainerSession<ConsoleTransport>,
    position: f32,
    duration_ms: u64,
) -> Result<()> {
    for _ in 0..duration_ms / 50 {
        session
            .handle_telemetry(TelemetrySample {
                timestamp_ms: session.now_ms(),
                ticks: 0,
                position_a: position,
                position_b: 0.0,
                load_a: 0.0,
                load_b: 0.0,
                velocity_a: 0.0,
                velocity_b: 0.0,
                status: StatusFlags::default(),
            })
            .await?;
        sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🙌 Vitruvian Link Hands-Free Example");

    let config = ControllerConfig {
        auto_start: AutoStartConfig {
            countdown_seconds: 3,
            ..AutoStartConfig::default()
        },
        ..ControllerConfig::default()
    };
    let (session, mut events) = TrainerSession::new(ConsoleTransport, config);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Telemetry(_) => {}
                SessionEvent::CountdownTick { remaining } => info!("⏳ {}", remaining),
                other => info!("📣 {:?}", other),
            }
        }
    });

    session
        .configure(WorkoutParameters {
            is_just_lift: true,
            auto_start: true,
            weight_per_cable_kg: 15.0,
            ..WorkoutParameters::default()
        })
        .await?;
    session.enable_just_lift_waiting_mode().await?;

    info!("Handles at rest");
    hold(&session, 1.0, 500).await?;

    info!("Picking up the handles");
    hold(&session, 40.0, 100).await?;
    hold(&session, 120.0, 100).await?;
    hold(&session, 400.0, 3_500).await?;

    info!("Setting the handles down");
    hold(&session, 2.0, 3_000).await?;

    info!("Final state: {}", session.workout_state().await);
    sleep(Duration::from_millis(100)).await;
    printer.abort();

    Ok(())
}
