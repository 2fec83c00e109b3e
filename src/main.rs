//! Helios recording-buffer and playback daemon

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use flume::bounded;
use helios::display::{DisplaySink, MappedRegisters, NullDisplay};
use helios::{CaptureEvent, Config, PlaybackDriver, SegmentMeta, VideoState};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("helios=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Helios launching...");

    let config = Config::default();
    let state = Arc::new(VideoState::new(&config.buffer));

    // Fall back to a null sink when the register window is absent
    // (development hosts, CI).
    let sink: Box<dyn DisplaySink> = match MappedRegisters::open(&config.display) {
        Ok(regs) => Box::new(regs),
        Err(e) => {
            warn!(error = %e, "display registers unavailable, running headless");
            Box::new(NullDisplay)
        }
    };

    let driver = PlaybackDriver::spawn(Arc::clone(&state), sink, &config.playback);

    // Capture-completion events arrive here from the sequencer
    // collaborator; until it is wired up, feed a simulated trigger.
    let (tx, rx) = bounded::<CaptureEvent>(4);

    let producer = {
        let frame_size = config.buffer.frame_size;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let event = CaptureEvent {
                start: 0,
                end: frame_size * 239,
                last: frame_size * 239,
                meta: SegmentMeta {
                    exposure: 50_000,
                    interval: 100_000,
                    timebase: 100_000_000,
                },
            };
            if tx.send_async(event).await.is_err() {
                error!("capture event channel closed");
            }
        })
    };

    let consumer = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                // Bookkeeping loss only; the frames are still in DRAM.
                if state.record(event).is_ok() {
                    let segments = state.with_segments(helios::overlay::list_segments);
                    tracing::debug!(?segments, "recording layout");
                }
            }
        })
    };

    // Review loop at 30 fps until interrupted.
    driver.set(0, 30);

    tokio::signal::ctrl_c().await?;
    info!(status = ?state.status(), stats = ?driver.stats(), "Helios shutting down");

    producer.abort();
    consumer.abort();
    driver.shutdown().await;
    Ok(())
}
