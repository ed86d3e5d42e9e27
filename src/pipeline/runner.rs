//! Real-time runner: capture thread feeding a processing thread.
//!
//! The capture thread never waits on processing. Live frames are handed over
//! with `try_send` into a small bounded queue; when the queue is full the
//! frame is dropped and counted. The processing thread additionally drops
//! frames that have waited longer than a few frame durations, so latency
//! cannot grow without bound. File sources are paced by the queue instead
//! and never dropped.

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::error::{PitchError, Result};
use crate::pipeline::error::{FaultReporter, FrameFault, LogReporter};
use crate::pipeline::orchestrator::PitchPipeline;
use crate::pipeline::session::SessionSummary;
use crate::pipeline::stats::StatsHandle;
use crate::pipeline::types::AudioFrame;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Configuration for the runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Frames buffered between capture and processing.
    pub queue_capacity: usize,
    /// Live frames older than this many frame durations are dropped.
    pub max_frame_age_frames: u32,
    /// Sleep between polls when a live source has no frame ready.
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            max_frame_age_frames: defaults::MAX_FRAME_AGE_FRAMES,
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(PitchError::invalid(
                "runner.queue_capacity",
                "must be at least 1",
            ));
        }
        if self.max_frame_age_frames == 0 {
            return Err(PitchError::invalid(
                "runner.max_frame_age_frames",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Frame accounting of a running session.
///
/// Once the runner has finished, `frames_captured` equals
/// `frames_processed + dropped_frames + stale_frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunnerStats {
    pub frames_captured: u64,
    pub frames_processed: u64,
    /// Dropped at capture because the queue was full.
    pub dropped_frames: u64,
    /// Dropped before processing because they were too old.
    pub stale_frames: u64,
    /// Processed, but slower than real time.
    pub overruns: u64,
}

#[derive(Debug, Default)]
struct RunnerCounters {
    frames_captured: AtomicU64,
    frames_processed: AtomicU64,
    dropped_frames: AtomicU64,
    stale_frames: AtomicU64,
    overruns: AtomicU64,
}

impl RunnerCounters {
    fn snapshot(&self) -> RunnerStats {
        RunnerStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            stale_frames: self.stale_frames.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running pipeline.
pub struct RunnerHandle {
    /// Flag to signal shutdown
    running: Arc<AtomicBool>,
    counters: Arc<RunnerCounters>,
    stats: StatsHandle,
    capture: Option<JoinHandle<()>>,
    processing: Option<JoinHandle<SessionSummary>>,
}

impl RunnerHandle {
    /// Stops capture, lets queued frames drain and returns the session summary.
    ///
    /// Returns `None` if the processing thread panicked.
    pub fn stop(self) -> Option<SessionSummary> {
        self.running.store(false, Ordering::SeqCst);
        self.join()
    }

    /// Waits for a finite source to run out, then returns the session summary.
    pub fn wait(self) -> Option<SessionSummary> {
        self.join()
    }

    fn join(mut self) -> Option<SessionSummary> {
        if let Some(capture) = self.capture.take()
            && capture.join().is_err()
        {
            tracing::error!("capture thread panicked");
        }

        let summary = match self.processing.take()?.join() {
            Ok(summary) => summary,
            Err(_) => {
                tracing::error!("processing thread panicked");
                return None;
            }
        };

        let runner = self.counters.snapshot();
        Some(SessionSummary {
            dropped_frames: runner.dropped_frames + runner.stale_frames,
            ..summary
        })
    }

    /// Returns true while capture is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle to the pipeline's statistics.
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn runner_stats(&self) -> RunnerStats {
        self.counters.snapshot()
    }
}

/// Drives a [`PitchPipeline`] from an [`AudioSource`] on two threads.
pub struct PipelineRunner {
    config: RunnerConfig,
    reporter: Arc<dyn FaultReporter>,
}

impl PipelineRunner {
    /// Creates a new runner with the default fault reporter.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom fault reporter.
    pub fn with_fault_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Starts the source and both threads.
    ///
    /// Fails if the configuration is invalid, the source cannot start, or
    /// the source's sample rate differs from the pipeline's.
    pub fn start(
        self,
        pipeline: PitchPipeline,
        mut source: Box<dyn AudioSource>,
    ) -> Result<RunnerHandle> {
        self.config.validate()?;
        source.start()?;

        let expected = pipeline.config().sample_rate;
        if source.sample_rate() != expected {
            let actual = source.sample_rate();
            if let Err(e) = source.stop() {
                tracing::warn!("failed to stop audio source: {}", e);
            }
            return Err(PitchError::AudioFormatMismatch {
                expected: format!("{} Hz", expected),
                actual: format!("{} Hz", actual),
            });
        }

        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(RunnerCounters::default());
        let stats = pipeline.stats_handle();
        let (frame_tx, frame_rx) = bounded(self.config.queue_capacity);

        tracing::debug!(
            queue = self.config.queue_capacity,
            finite = source.is_finite(),
            "pipeline runner starting"
        );

        let paced = source.is_finite();
        let capture = CaptureLoop {
            source,
            frame_tx,
            running: Arc::clone(&running),
            counters: Arc::clone(&counters),
            reporter: Arc::clone(&self.reporter),
            poll_interval: self.config.poll_interval,
        };
        let capture_handle = thread::spawn(move || capture.run());

        let processing = ProcessingLoop {
            pipeline,
            frame_rx,
            counters: Arc::clone(&counters),
            reporter: Arc::clone(&self.reporter),
            max_frame_age_frames: self.config.max_frame_age_frames,
            poll_interval: self.config.poll_interval,
            paced,
        };
        let processing_handle = thread::spawn(move || processing.run());

        Ok(RunnerHandle {
            running,
            counters,
            stats,
            capture: Some(capture_handle),
            processing: Some(processing_handle),
        })
    }
}

struct CaptureLoop {
    source: Box<dyn AudioSource>,
    frame_tx: Sender<AudioFrame>,
    running: Arc<AtomicBool>,
    counters: Arc<RunnerCounters>,
    reporter: Arc<dyn FaultReporter>,
    poll_interval: Duration,
}

impl CaptureLoop {
    fn run(mut self) {
        let finite = self.source.is_finite();
        let mut consecutive_errors: u32 = 0;

        while self.running.load(Ordering::SeqCst) {
            let frame = match self.source.read_frame() {
                Ok(frame) => {
                    consecutive_errors = 0;
                    frame
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        let fault = FrameFault::Fatal(format!(
                            "audio capture failed {consecutive_errors} times in a row: {e}"
                        ));
                        self.reporter.report("capture", &fault);
                        break;
                    }
                    self.reporter
                        .report("capture", &FrameFault::Capture(e.to_string()));
                    thread::sleep(self.poll_interval);
                    continue;
                }
            };

            let Some(frame) = frame else {
                if finite {
                    // File source exhausted.
                    break;
                }
                thread::sleep(self.poll_interval);
                continue;
            };

            self.counters.frames_captured.fetch_add(1, Ordering::Relaxed);
            if !self.hand_over(frame, finite) {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.source.stop() {
            tracing::warn!("failed to stop audio capture: {}", e);
        }
        // Dropping the sender lets the processing thread drain and exit.
    }

    /// Queues one frame. Returns false once the processing side is gone.
    fn hand_over(&self, frame: AudioFrame, finite: bool) -> bool {
        if finite {
            let mut pending = frame;
            // Backpressure, but keep honouring stop requests.
            loop {
                match self.frame_tx.send_timeout(pending, self.poll_interval) {
                    Ok(()) => return true,
                    Err(crossbeam_channel::SendTimeoutError::Timeout(frame)) => {
                        if !self.running.load(Ordering::SeqCst) {
                            self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                            return false;
                        }
                        pending = frame;
                    }
                    Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                        self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                }
            }
        }

        match self.frame_tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                self.reporter.report(
                    "capture",
                    &FrameFault::QueueFull {
                        sequence: frame.sequence(),
                    },
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

struct ProcessingLoop {
    pipeline: PitchPipeline,
    frame_rx: Receiver<AudioFrame>,
    counters: Arc<RunnerCounters>,
    reporter: Arc<dyn FaultReporter>,
    max_frame_age_frames: u32,
    poll_interval: Duration,
    /// Frames come from a file paced by the queue, not a real-time clock.
    paced: bool,
}

impl ProcessingLoop {
    fn run(mut self) -> SessionSummary {
        loop {
            let frame = match self.frame_rx.recv_timeout(self.poll_interval * 20) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.handle(frame);
        }

        tracing::debug!(
            frames = self.counters.frames_processed.load(Ordering::Relaxed),
            "processing thread finished"
        );
        self.pipeline.session_summary()
    }

    fn handle(&mut self, frame: AudioFrame) {
        let budget = frame.duration();
        let age = frame.captured_at().elapsed();
        let max_age = budget * self.max_frame_age_frames;

        if !self.paced && !budget.is_zero() && age > max_age {
            self.counters.stale_frames.fetch_add(1, Ordering::Relaxed);
            self.reporter.report(
                "process",
                &FrameFault::Stale {
                    sequence: frame.sequence(),
                    age,
                },
            );
            return;
        }

        let started = Instant::now();
        self.pipeline.process_frame(&frame);
        let elapsed = started.elapsed();
        self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);

        if !self.paced && elapsed > budget {
            self.counters.overruns.fetch_add(1, Ordering::Relaxed);
            self.reporter.report(
                "process",
                &FrameFault::Overrun {
                    sequence: frame.sequence(),
                    elapsed,
                    budget,
                },
            );
        }
    }
}
