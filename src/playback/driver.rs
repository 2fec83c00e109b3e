//! Timer-driven playback cursor
//!
//! The driver owns a periodic tick that advances the logical playback
//! position, resolves it to a physical frame address and pushes the
//! result to the display hardware. Reprogramming (position, rate, loop
//! limit) arrives over a command channel and replaces the running timer
//! in place; there is never a queued tick to reconcile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::display::DisplaySink;
use crate::state::VideoState;
use crate::PlaybackConfig;

/// Where the transport lands once a bounded playback runs out of laps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    /// Freeze on the current frame.
    Pause,
    /// Return the display to the live sensor feed.
    Live,
}

/// Loop policy, orthogonal to the playback rate.
///
/// `Bounded` covers both "play once" (`wraps == 1`) and "loop N times"
/// transports: after the cursor has crossed the wrap boundary `wraps`
/// times the driver freezes and, if asked, hands the display back to
/// live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackLimit {
    Continuous,
    Bounded { wraps: u32, then: EndAction },
}

/// Commands accepted by the driver task.
#[derive(Debug, Clone, Copy)]
pub enum PlaybackCommand {
    /// Park the cursor at `position` and play at `rate` frames/second
    /// (negative for reverse, 0 to freeze while keeping the display
    /// synced).
    Set { position: u64, rate: i32 },
    Limit(PlaybackLimit),
    Shutdown,
}

#[derive(Default)]
struct Stats {
    ticks: AtomicU64,
    wraps: AtomicU64,
    resolve_misses: AtomicU64,
}

/// Handle to the spawned playback task.
pub struct PlaybackDriver {
    commands: flume::Sender<PlaybackCommand>,
    stats: Arc<CachePadded<Stats>>,
    task: JoinHandle<()>,
}

impl PlaybackDriver {
    pub fn spawn(state: Arc<VideoState>, sink: Box<dyn DisplaySink>, cfg: &PlaybackConfig) -> Self {
        let (tx, rx) = flume::bounded(cfg.command_depth);
        let stats = Arc::new(CachePadded::new(Stats::default()));
        let task = DriverTask {
            state,
            sink,
            stats: Arc::clone(&stats),
            refresh_hz: cfg.refresh_hz.max(1),
            rate: 0,
            divisor: 0,
            limit: PlaybackLimit::Continuous,
        };
        let task = tokio::spawn(task.run(rx));
        Self {
            commands: tx,
            stats,
            task,
        }
    }

    /// Reprogram position and rate; replaces the running timer.
    pub fn set(&self, position: u64, rate: i32) {
        self.send(PlaybackCommand::Set { position, rate });
    }

    pub fn set_limit(&self, limit: PlaybackLimit) {
        self.send(PlaybackCommand::Limit(limit));
    }

    fn send(&self, cmd: PlaybackCommand) {
        if let Err(e) = self.commands.try_send(cmd) {
            warn!(error = %e, "playback command dropped");
        }
    }

    /// (ticks, wraps, resolve misses)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.ticks.load(Ordering::Relaxed),
            self.stats.wraps.load(Ordering::Relaxed),
            self.stats.resolve_misses.load(Ordering::Relaxed),
        )
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send_async(PlaybackCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

struct DriverTask {
    state: Arc<VideoState>,
    sink: Box<dyn DisplaySink>,
    stats: Arc<CachePadded<Stats>>,
    refresh_hz: u32,
    rate: i32,
    /// Frames advanced per tick; 0 while frozen.
    divisor: u64,
    limit: PlaybackLimit,
}

impl DriverTask {
    async fn run(mut self, commands: flume::Receiver<PlaybackCommand>) {
        let mut interval = self.program(0);
        info!(refresh_hz = self.refresh_hz, "playback driver started");
        loop {
            tokio::select! {
                cmd = commands.recv_async() => match cmd {
                    Ok(PlaybackCommand::Set { position, rate }) => {
                        {
                            let mut inner = self.state.lock();
                            inner.position = position;
                            inner.rate = rate;
                        }
                        interval = self.program(rate);
                        debug!(position, rate, divisor = self.divisor, "playback reprogrammed");
                    }
                    Ok(PlaybackCommand::Limit(limit)) => self.limit = limit,
                    Ok(PlaybackCommand::Shutdown) | Err(_) => break,
                },
                _ = interval.tick() => {
                    if self.tick() {
                        // Bounded playback ran out of laps: freeze, but
                        // keep ticking at the refresh cap so the display
                        // stays synced.
                        self.state.lock().rate = 0;
                        interval = self.program(0);
                    }
                }
            }
        }
        info!("playback driver stopped");
    }

    /// Map a signed frame rate onto a timer period and per-tick step.
    ///
    /// Ticks are capped at the display refresh rate: above the cap each
    /// tick advances `ceil(|rate| / refresh)` frames instead of ticking
    /// faster; below it the period stretches to `1/|rate|` and each tick
    /// advances one frame. Rate 0 keeps the cap-rate tick with no
    /// advance so the display hardware is continuously re-synced.
    fn program(&mut self, rate: i32) -> Interval {
        self.rate = rate;
        let hz = self.refresh_hz;
        let period = if rate == 0 {
            self.divisor = 0;
            Duration::from_secs(1) / hz
        } else {
            let abs = rate.unsigned_abs();
            if abs <= hz {
                self.divisor = 1;
                Duration::from_secs_f64(1.0 / f64::from(abs))
            } else {
                self.divisor = u64::from(abs.div_ceil(hz));
                Duration::from_secs(1) / hz
            }
        };
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    /// One display refresh. Returns true when a bounded playback just
    /// used its last wrap and the transport must freeze.
    fn tick(&mut self) -> bool {
        let t0 = Instant::now();
        let mut wrapped = false;

        // Locked section: advance and resolve only. The hardware write
        // happens after the lock is dropped.
        let address = {
            let mut inner = self.state.lock();
            let total = inner.segments.total_frames();
            if total == 0 {
                inner.segments.rec_start()
            } else {
                if self.divisor > 0 {
                    if self.rate > 0 {
                        let next = inner.position + self.divisor;
                        wrapped = next >= total;
                        inner.position = next % total;
                    } else {
                        let step = self.divisor % total;
                        wrapped = step > inner.position;
                        inner.position = (inner.position + total - step) % total;
                    }
                }
                match inner.segments.resolve(inner.position) {
                    Some(resolved) => resolved.address,
                    None => {
                        self.stats.resolve_misses.fetch_add(1, Ordering::Relaxed);
                        inner.segments.rec_start()
                    }
                }
            }
        };

        self.sink.write_frame(address);

        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        metrics::histogram!("playback_tick_us").record(t0.elapsed().as_micros() as f64);

        if !wrapped {
            return false;
        }
        self.stats.wraps.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("playback_wraps").increment(1);

        if let PlaybackLimit::Bounded { wraps, then } = &mut self.limit {
            *wraps = wraps.saturating_sub(1);
            if *wraps == 0 {
                let then = *then;
                self.limit = PlaybackLimit::Continuous;
                debug!(?then, "bounded playback finished");
                if then == EndAction::Live {
                    self.sink.show_live();
                }
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Period/divisor mapping only; the tick behavior itself is covered
    // by the integration tests with a virtual clock.

    fn task() -> DriverTask {
        DriverTask {
            state: Arc::new(VideoState::new(&crate::BufferConfig::default())),
            sink: Box::new(crate::display::NullDisplay),
            stats: Arc::new(CachePadded::new(Stats::default())),
            refresh_hz: 60,
            rate: 0,
            divisor: 0,
            limit: PlaybackLimit::Continuous,
        }
    }

    #[tokio::test]
    async fn rate_above_cap_steps_multiple_frames() {
        let mut t = task();
        let iv = t.program(120);
        assert_eq!(t.divisor, 2);
        assert_eq!(iv.period(), Duration::from_secs(1) / 60);
        t.program(-120);
        assert_eq!(t.divisor, 2);
        t.program(61);
        assert_eq!(t.divisor, 2);
    }

    #[tokio::test]
    async fn rate_below_cap_stretches_the_period() {
        let mut t = task();
        let iv = t.program(10);
        assert_eq!(t.divisor, 1);
        assert_eq!(iv.period(), Duration::from_secs_f64(0.1));
    }

    #[tokio::test]
    async fn frozen_rate_keeps_ticking_without_advance() {
        let mut t = task();
        let iv = t.program(0);
        assert_eq!(t.divisor, 0);
        assert_eq!(iv.period(), Duration::from_secs(1) / 60);
    }
}
