use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::FrameStats;

const ROLLING_WINDOW_DURATION: Duration = Duration::from_secs(1);
const MAX_ROLLING_WINDOW_SAMPLE_COUNT: usize = 4_096;

/// Render-step metrics of one blur filter.
///
/// Available when the `render_metrics` feature is enabled. Rolling values cover
/// frames that rendered within the last second; skipped frames only count
/// towards `skipped_frame_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetrics {
    pub rendered_frame_count: u64,
    pub skipped_frame_count: u64,
    pub rolling_one_second_frame_count: usize,
    pub rolling_one_second_pass_count: u64,
    pub rolling_one_second_average_render_duration: Duration,
    pub last_frame: Option<FrameStats>,
}

#[derive(Debug, Clone, Copy)]
struct FrameSample {
    finished_at: Instant,
    render_duration: Duration,
    passes: u32,
}

#[derive(Debug)]
pub(super) struct BlurMetricsTracker {
    rendered_frame_count: u64,
    skipped_frame_count: u64,
    last_frame: Option<FrameStats>,
    rolling_window_samples: VecDeque<FrameSample>,
    rolling_window_total_duration: Duration,
    rolling_window_total_passes: u64,
}

impl Default for BlurMetricsTracker {
    fn default() -> Self {
        Self {
            rendered_frame_count: 0,
            skipped_frame_count: 0,
            last_frame: None,
            rolling_window_samples: VecDeque::new(),
            rolling_window_total_duration: Duration::ZERO,
            rolling_window_total_passes: 0,
        }
    }
}

impl BlurMetricsTracker {
    fn remove_oldest_rolling_sample(&mut self) {
        if let Some(oldest_sample) = self.rolling_window_samples.pop_front() {
            self.rolling_window_total_duration = self
                .rolling_window_total_duration
                .saturating_sub(oldest_sample.render_duration);
            self.rolling_window_total_passes = self
                .rolling_window_total_passes
                .saturating_sub(u64::from(oldest_sample.passes));
        }
    }

    fn prune_rolling_window(&mut self, now: Instant) {
        while let Some(oldest_sample) = self.rolling_window_samples.front() {
            let sample_age = now.saturating_duration_since(oldest_sample.finished_at);
            if sample_age <= ROLLING_WINDOW_DURATION {
                break;
            }

            self.remove_oldest_rolling_sample();
        }
    }

    pub(super) fn record_frame(
        &mut self,
        started_at: Instant,
        finished_at: Instant,
        stats: Option<&FrameStats>,
    ) {
        let Some(stats) = stats else {
            self.skipped_frame_count += 1;
            return;
        };

        if self.rolling_window_samples.len() == MAX_ROLLING_WINDOW_SAMPLE_COUNT {
            self.remove_oldest_rolling_sample();
        }

        let render_duration = finished_at.saturating_duration_since(started_at);
        self.rendered_frame_count += 1;
        self.last_frame = Some(*stats);
        self.rolling_window_samples.push_back(FrameSample {
            finished_at,
            render_duration,
            passes: stats.passes,
        });
        self.rolling_window_total_duration += render_duration;
        self.rolling_window_total_passes += u64::from(stats.passes);

        self.prune_rolling_window(finished_at);
    }

    pub(super) fn snapshot(&self) -> FrameMetrics {
        let rolling_frame_count = self.rolling_window_samples.len();
        let rolling_average = if rolling_frame_count == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(
                self.rolling_window_total_duration.as_secs_f64() / rolling_frame_count as f64,
            )
        };

        FrameMetrics {
            rendered_frame_count: self.rendered_frame_count,
            skipped_frame_count: self.skipped_frame_count,
            rolling_one_second_frame_count: rolling_frame_count,
            rolling_one_second_pass_count: self.rolling_window_total_passes,
            rolling_one_second_average_render_duration: rolling_average,
            last_frame: self.last_frame,
        }
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::BlurMetricsTracker;
    use crate::effect::ProgramId;
    use crate::renderer::FrameStats;

    fn stats(passes: u32) -> FrameStats {
        FrameStats {
            program: ProgramId::Box1d,
            passes,
        }
    }

    #[test]
    fn tracker_starts_empty() {
        let metrics = BlurMetricsTracker::default().snapshot();

        assert_eq!(metrics.rendered_frame_count, 0);
        assert_eq!(metrics.rolling_one_second_frame_count, 0);
        assert_eq!(
            metrics.rolling_one_second_average_render_duration,
            Duration::ZERO
        );
        assert_eq!(metrics.last_frame, None);
    }

    #[test]
    fn skipped_frames_stay_out_of_the_rolling_window() {
        let mut tracker = BlurMetricsTracker::default();
        let started_at = Instant::now();
        tracker.record_frame(started_at, started_at + Duration::from_millis(1), None);

        let metrics = tracker.snapshot();
        assert_eq!(metrics.skipped_frame_count, 1);
        assert_eq!(metrics.rendered_frame_count, 0);
        assert_eq!(metrics.rolling_one_second_frame_count, 0);
    }

    #[test]
    fn rolling_window_keeps_only_the_last_second() {
        let mut tracker = BlurMetricsTracker::default();
        let first_started_at = Instant::now();
        let second_started_at = first_started_at + Duration::from_millis(500);
        let third_started_at = first_started_at + Duration::from_millis(1_300);

        tracker.record_frame(
            first_started_at,
            first_started_at + Duration::from_millis(10),
            Some(&stats(2)),
        );
        tracker.record_frame(
            second_started_at,
            second_started_at + Duration::from_millis(20),
            Some(&stats(4)),
        );
        tracker.record_frame(
            third_started_at,
            third_started_at + Duration::from_millis(30),
            Some(&stats(6)),
        );

        let metrics = tracker.snapshot();
        assert_eq!(metrics.rendered_frame_count, 3);
        assert_eq!(metrics.rolling_one_second_frame_count, 2);
        assert_eq!(metrics.rolling_one_second_pass_count, 10);
        assert_eq!(
            metrics.rolling_one_second_average_render_duration,
            Duration::from_millis(25)
        );
        assert_eq!(metrics.last_frame, Some(stats(6)));
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = BlurMetricsTracker::default();
        let started_at = Instant::now();
        tracker.record_frame(
            started_at,
            started_at + Duration::from_millis(16),
            Some(&stats(2)),
        );

        tracker.reset();

        assert_eq!(tracker.snapshot(), Default::default());
    }
}
