use crate::config::{FilterKind, SmoothingConfig};
use crate::Delta;

/// Raw mapped delta in, smoothed delta out. Implementations keep whatever
/// internal state they need; `reset` runs whenever the tracker
/// re-initializes, so filters are drop-in interchangeable.
pub trait MotionFilter {
    fn apply(&mut self, raw: Delta) -> Delta;
    fn reset(&mut self);
}

pub fn create_filter(config: &SmoothingConfig) -> Box<dyn MotionFilter> {
    match config.filter {
        FilterKind::Ema => Box::new(EmaFilter::new(config.alpha)),
        FilterKind::Kalman => Box::new(KalmanFilter::new(
            config.process_noise,
            config.measurement_noise,
        )),
    }
}

/// Exponential moving average: state <- alpha * raw + (1 - alpha) * state.
/// With alpha = 1 the filter is a pass-through.
pub struct EmaFilter {
    alpha: f64,
    state: Delta,
}

impl EmaFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            state: Delta::ZERO,
        }
    }
}

impl MotionFilter for EmaFilter {
    fn apply(&mut self, raw: Delta) -> Delta {
        self.state = Delta {
            dx: self.alpha * raw.dx + (1.0 - self.alpha) * self.state.dx,
            dy: self.alpha * raw.dy + (1.0 - self.alpha) * self.state.dy,
        };
        self.state
    }

    fn reset(&mut self) {
        self.state = Delta::ZERO;
    }
}

/// Constant-velocity Kalman filter, one independent axis filter per
/// dimension with dt fixed at one frame.
pub struct KalmanFilter {
    x: AxisKalman,
    y: AxisKalman,
}

impl KalmanFilter {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            x: AxisKalman::new(process_noise, measurement_noise),
            y: AxisKalman::new(process_noise, measurement_noise),
        }
    }
}

impl MotionFilter for KalmanFilter {
    fn apply(&mut self, raw: Delta) -> Delta {
        Delta {
            dx: self.x.step(raw.dx),
            dy: self.y.step(raw.dy),
        }
    }

    fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

/// State [value, rate], F = [[1, 1], [0, 1]], H = [1, 0].
struct AxisKalman {
    value: f64,
    rate: f64,
    p: [[f64; 2]; 2],
    q: f64,
    r: f64,
}

impl AxisKalman {
    fn new(q: f64, r: f64) -> Self {
        Self {
            value: 0.0,
            rate: 0.0,
            p: [[1.0, 0.0], [0.0, 1.0]],
            q,
            r,
        }
    }

    fn step(&mut self, measurement: f64) -> f64 {
        // predict
        self.value += self.rate;
        let [[p00, p01], [p10, p11]] = self.p;
        let p00 = p00 + p01 + p10 + p11 + self.q * 0.25;
        let p01 = p01 + p11 + self.q * 0.5;
        let p10 = p10 + p11 + self.q * 0.5;
        let p11 = p11 + self.q;

        // update
        let innovation = measurement - self.value;
        let s = p00 + self.r;
        let k0 = p00 / s;
        let k1 = p10 / s;
        self.value += k0 * innovation;
        self.rate += k1 * innovation;
        self.p = [
            [(1.0 - k0) * p00, (1.0 - k0) * p01],
            [p10 - k1 * p00, p11 - k1 * p01],
        ];
        self.value
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.rate = 0.0;
        self.p = [[1.0, 0.0], [0.0, 1.0]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmoothingConfig;

    const INPUT: Delta = Delta { dx: 8.0, dy: -2.0 };

    #[test]
    fn ema_alpha_one_is_pass_through() {
        let mut filter = EmaFilter::new(1.0);
        for _ in 0..5 {
            assert_eq!(filter.apply(INPUT), INPUT);
        }
    }

    #[test]
    fn ema_is_idempotent_once_converged() {
        let mut filter = EmaFilter::new(0.3);
        filter.state = INPUT;
        for _ in 0..5 {
            let smoothed = filter.apply(INPUT);
            assert!((smoothed.dx - INPUT.dx).abs() < 1e-12);
            assert!((smoothed.dy - INPUT.dy).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_converges_toward_constant_input() {
        let mut filter = EmaFilter::new(0.3);
        let mut last = Delta::ZERO;
        for _ in 0..50 {
            last = filter.apply(INPUT);
        }
        assert!((last.dx - INPUT.dx).abs() < 1e-3);
        assert!((last.dy - INPUT.dy).abs() < 1e-3);
    }

    #[test]
    fn ema_first_output_is_scaled_input() {
        let mut filter = EmaFilter::new(0.25);
        let smoothed = filter.apply(INPUT);
        assert_eq!(smoothed, Delta { dx: 2.0, dy: -0.5 });
    }

    #[test]
    fn ema_reset_clears_state() {
        let mut filter = EmaFilter::new(0.5);
        filter.apply(INPUT);
        filter.reset();
        assert_eq!(filter.apply(Delta::ZERO), Delta::ZERO);
    }

    #[test]
    fn kalman_converges_toward_constant_input() {
        let mut filter = KalmanFilter::new(0.05, 4.0);
        let mut last = Delta::ZERO;
        for _ in 0..100 {
            last = filter.apply(INPUT);
        }
        assert!((last.dx - INPUT.dx).abs() < 0.1, "dx = {}", last.dx);
        assert!((last.dy - INPUT.dy).abs() < 0.1, "dy = {}", last.dy);
    }

    #[test]
    fn kalman_is_deterministic() {
        let mut a = KalmanFilter::new(0.05, 4.0);
        let mut b = KalmanFilter::new(0.05, 4.0);
        for i in 0..20 {
            let raw = Delta {
                dx: (i % 7) as f64,
                dy: (i % 3) as f64 - 1.0,
            };
            assert_eq!(a.apply(raw), b.apply(raw));
        }
    }

    #[test]
    fn kalman_reset_matches_a_fresh_filter() {
        let mut used = KalmanFilter::new(0.05, 4.0);
        for _ in 0..10 {
            used.apply(INPUT);
        }
        used.reset();

        let mut fresh = KalmanFilter::new(0.05, 4.0);
        for _ in 0..5 {
            assert_eq!(used.apply(INPUT), fresh.apply(INPUT));
        }
    }

    #[test]
    fn factory_selects_the_configured_filter() {
        let mut config = SmoothingConfig::default();
        config.alpha = 1.0;
        let mut filter = create_filter(&config);
        // alpha = 1 EMA passes raw input through
        assert_eq!(filter.apply(INPUT), INPUT);

        config.filter = FilterKind::Kalman;
        let mut filter = create_filter(&config);
        // the Kalman variant always damps the first sample
        assert_ne!(filter.apply(INPUT), INPUT);
    }
}
