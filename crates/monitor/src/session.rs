//! The per-frame processing loop
//!
//! acquire -> resize -> grayscale -> landmarks -> EAR -> state machine -> alert dispatch,
//! repeated until the source runs dry or the stop signal is raised. The
//! stop signal is only checked between frames.

use std::io::Write;
use std::time::{Duration, Instant};

use alerting::{Alert, AlertConfig, AlertDispatcher, DispatchStats};
use camera_capture::{CameraConfig, FrameSource, VideoFrame};
use dms::{
    AlertTransition, DrowsinessMonitor, DrowsinessState, FrameAnalysis, LandmarkProvider,
    MonitorStats,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::MonitorError;

/// How long shutdown waits for an in-flight playback
const PLAYBACK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SourceExhausted,
    Cancelled,
}

/// End-of-session report
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub stop_reason: StopReason,
    pub elapsed_secs: f64,
    pub subjects: usize,
    pub alert_active_at_exit: bool,
    pub monitor: MonitorStats,
    pub dispatch: DispatchStats,
}

/// Wires a landmark provider, the drowsiness monitor and the alert dispatcher
pub struct MonitorSession {
    monitor: DrowsinessMonitor,
    provider: Box<dyn LandmarkProvider + Send>,
    dispatcher: AlertDispatcher,
    alerting: AlertConfig,
    camera: CameraConfig,
    realtime: bool,
    analysis_out: Option<Box<dyn Write + Send>>,
}

impl MonitorSession {
    pub fn new(
        monitor: DrowsinessMonitor,
        provider: Box<dyn LandmarkProvider + Send>,
        dispatcher: AlertDispatcher,
        alerting: AlertConfig,
        camera: CameraConfig,
    ) -> Self {
        Self {
            monitor,
            provider,
            dispatcher,
            alerting,
            camera,
            realtime: false,
            analysis_out: None,
        }
    }

    /// Pace frames at the camera FPS
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Write every [`FrameAnalysis`] as one JSON line
    pub fn with_analysis_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.analysis_out = Some(out);
        self
    }

    /// Run until the source is exhausted or `shutdown` turns true
    pub async fn run<S>(
        &mut self,
        source: &mut S,
        shutdown: watch::Receiver<bool>,
    ) -> Result<SessionSummary, MonitorError>
    where
        S: FrameSource + ?Sized,
    {
        self.camera.validate()?;
        let started = Instant::now();
        let interval = Duration::from_nanos(self.camera.frame_interval_ns());
        let mut stop_reason = StopReason::SourceExhausted;

        info!("Starting drowsiness detection");

        loop {
            if *shutdown.borrow() {
                info!("Stop requested");
                stop_reason = StopReason::Cancelled;
                break;
            }

            let tick = Instant::now();
            let Some(frame) = source.next_frame()? else {
                info!("Frame source exhausted");
                break;
            };

            let frame = frame
                .resize(self.camera.width, self.camera.height)
                .to_gray_frame();
            self.step(&frame)?;

            if self.realtime {
                let spent = tick.elapsed();
                if spent < interval {
                    tokio::time::sleep(interval - spent).await;
                }
            } else {
                tokio::task::yield_now().await;
            }
        }

        if let Some(out) = self.analysis_out.as_mut() {
            out.flush()?;
        }
        if !self.dispatcher.wait_idle(PLAYBACK_DRAIN_TIMEOUT).await {
            warn!("Alert playback still running at shutdown");
        }

        let summary = SessionSummary {
            stop_reason,
            elapsed_secs: started.elapsed().as_secs_f64(),
            subjects: self.monitor.subject_count(),
            alert_active_at_exit: self.monitor.is_alerting(),
            monitor: self.monitor.stats().clone(),
            dispatch: self.dispatcher.stats(),
        };
        info!(
            frames = summary.monitor.frames,
            alerts = summary.monitor.alerts_started,
            "Session finished"
        );
        Ok(summary)
    }

    /// Process one frame
    pub fn step(&mut self, frame: &VideoFrame) -> Result<FrameAnalysis, MonitorError> {
        let analysis = self.monitor.analyze(self.provider.as_mut(), frame)?;

        let mut triggered = false;
        for transition in &analysis.transitions {
            match transition {
                AlertTransition::Started { subject, .. } => {
                    self.dispatcher.trigger_alert(self.alert_for(&subject.to_string(), frame));
                    triggered = true;
                }
                AlertTransition::Stopped { subject } => {
                    self.dispatcher.clear(&subject.to_string());
                }
            }
        }

        if self.alerting.repeat_while_alerting && !triggered {
            if let Some(reading) = analysis
                .readings
                .iter()
                .find(|r| r.state == DrowsinessState::Alerting)
            {
                let outcome = self
                    .dispatcher
                    .trigger_alert(self.alert_for(&reading.subject.to_string(), frame));
                debug!(?outcome, "Repeat alert");
            }
        }

        if let Some(out) = self.analysis_out.as_mut() {
            serde_json::to_writer(&mut *out, &analysis)?;
            writeln!(out)?;
        }

        Ok(analysis)
    }

    fn alert_for(&self, source: &str, frame: &VideoFrame) -> Alert {
        Alert::new(source, self.alerting.message.clone(), frame.timestamp_ns)
    }

    pub fn monitor(&self) -> &DrowsinessMonitor {
        &self.monitor
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }
}
