use std::collections::VecDeque;
use std::time::Instant;

/// Rolling-window FPS and per-frame latency, display-only diagnostics.
pub struct PerformanceMonitor {
    window: usize,
    frame_times: VecDeque<Instant>,
    processing_ms: VecDeque<f64>,
    frame_start: Option<Instant>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::with_window(30)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            window,
            frame_times: VecDeque::with_capacity(window),
            processing_ms: VecDeque::with_capacity(window),
            frame_start: None,
        }
    }

    pub fn start_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Returns this frame's processing time in milliseconds.
    pub fn end_frame(&mut self) -> f64 {
        let Some(start) = self.frame_start.take() else {
            return 0.0;
        };
        let now = Instant::now();
        let elapsed_ms = now.duration_since(start).as_secs_f64() * 1000.0;

        if self.processing_ms.len() == self.window {
            self.processing_ms.pop_front();
        }
        self.processing_ms.push_back(elapsed_ms);
        if self.frame_times.len() == self.window {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(now);

        elapsed_ms
    }

    pub fn fps(&self) -> f64 {
        if self.frame_times.len() < 2 {
            return 0.0;
        }
        let span = self
            .frame_times
            .back()
            .zip(self.frame_times.front())
            .map(|(last, first)| last.duration_since(*first).as_secs_f64())
            .unwrap_or(0.0);
        if span > 0.0 {
            self.frame_times.len() as f64 / span
        } else {
            0.0
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.processing_ms.is_empty() {
            return 0.0;
        }
        self.processing_ms.iter().sum::<f64>() / self.processing_ms.len() as f64
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
