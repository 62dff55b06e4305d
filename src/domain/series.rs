// Time-windowed sample buffer backing one sparkline
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Shortest retention window accepted.
pub const MIN_WINDOW_SECS: u64 = 30;

/// Upper bound on retained samples regardless of window and poll interval.
pub const DEFAULT_SAMPLE_CAP: usize = 720;

const DEGENERATE_RANGE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: Instant,
    /// `None` marks "unavailable at this tick" and renders as a gap.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderGeometry {
    pub segments: Vec<Segment>,
    pub latest_point: Option<Point>,
    pub value_range: Option<ValueRange>,
    /// Seconds of history mapped onto the horizontal axis.
    pub time_span: f64,
}

impl RenderGeometry {
    fn empty() -> Self {
        Self {
            segments: Vec::new(),
            latest_point: None,
            value_range: None,
            time_span: 0.0,
        }
    }
}

/// Ordered (timestamp, value) samples for one metric of one device.
///
/// Samples are only ever appended. Pruning drops samples older than the
/// window but always keeps the newest one, and the length never exceeds the
/// hard cap.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    samples: VecDeque<Sample>,
    window: Duration,
    cap: usize,
    dirty: bool,
}

impl TimeSeriesBuffer {
    pub fn new(window_secs: u64) -> Self {
        Self::with_cap(window_secs, DEFAULT_SAMPLE_CAP)
    }

    pub fn with_cap(window_secs: u64, cap: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            window: Duration::from_secs(window_secs.max(MIN_WINDOW_SECS)),
            cap: cap.max(1),
            dirty: false,
        }
    }

    /// Append a sample stamped `now`. Non-finite values are stored as gaps.
    pub fn push_at(&mut self, value: Option<f64>, now: Instant) {
        let value = value.filter(|v| v.is_finite());
        // Keep timestamps non-decreasing even if the caller's clock is not.
        let timestamp = match self.samples.back() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        self.samples.push_back(Sample { timestamp, value });
        self.prune(now);
        while self.samples.len() > self.cap {
            self.samples.pop_front();
        }
        self.dirty = true;
    }

    pub fn set_window_seconds(&mut self, seconds: u64) {
        self.set_window_seconds_at(seconds, Instant::now());
    }

    pub fn set_window_seconds_at(&mut self, seconds: u64, now: Instant) {
        self.window = Duration::from_secs(seconds.max(MIN_WINDOW_SECS));
        self.prune(now);
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.dirty = true;
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Returns whether the buffer changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.samples.len() > 1 {
            match self.samples.front() {
                Some(oldest) if oldest.timestamp < cutoff => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Plot coordinates for the current contents. Pure: same contents and
    /// dimensions always give the same geometry.
    pub fn compute_render_geometry(&self, width: f64, height: f64, padding: f64) -> RenderGeometry {
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return RenderGeometry::empty();
        };

        let mut finite = self.samples.iter().filter_map(|s| s.value);
        let Some(first) = finite.next() else {
            return RenderGeometry::empty();
        };
        let (mut min, mut max) = finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if max - min < DEGENERATE_RANGE {
            min -= 1.0;
            max += 1.0;
        }
        let range = max - min;

        // While warming up the observed span fills the width; afterwards the
        // trailing window is mapped.
        let observed = newest.timestamp.duration_since(oldest.timestamp).as_secs_f64();
        let window = self.window.as_secs_f64();
        let (span_start, span_len) = if observed < window {
            (0.0, observed)
        } else {
            (observed - window, window)
        };

        let inner_width = (width - 2.0 * padding).max(0.0);
        let inner_height = (height - 2.0 * padding).max(0.0);

        let mut segments = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        let mut latest_point = None;

        for sample in &self.samples {
            let Some(value) = sample.value else {
                if !current.is_empty() {
                    segments.push(Segment {
                        points: std::mem::take(&mut current),
                    });
                }
                continue;
            };

            let offset = sample.timestamp.duration_since(oldest.timestamp).as_secs_f64();
            let frac = if span_len > 0.0 {
                ((offset - span_start) / span_len).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let point = Point {
                x: padding + frac * inner_width,
                y: padding + ((max - value) / range) * inner_height,
            };
            current.push(point);
            latest_point = Some(point);
        }
        if !current.is_empty() {
            segments.push(Segment { points: current });
        }

        RenderGeometry {
            segments,
            latest_point,
            value_range: Some(ValueRange { min, max }),
            time_span: span_len,
        }
    }
}
