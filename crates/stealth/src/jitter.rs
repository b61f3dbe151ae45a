//! Humanized motion and timing. Pointer paths follow a cubic Bezier
//! with randomized control points instead of a straight line; typing
//! delays vary per character with extra dwell after punctuation.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitterConfig {
    /// Number of interpolation steps along a pointer path.
    pub steps: usize,
    /// Target pointer speed in pixels per second; drives per-step delay.
    pub speed_px_per_sec: f64,
    /// Base inter-key delay in milliseconds.
    pub typing_base_ms: u64,
    /// Variance scale, 0.0 (robotic) to 1.0 (maximally human).
    pub humanization: f64,
    /// Clamp applied to every generated delay.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Maximum perpendicular offset for Bezier control points, as a
    /// fraction of the path length.
    pub curve_ratio: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            speed_px_per_sec: 900.0,
            typing_base_ms: 70,
            humanization: 0.6,
            min_delay_ms: 4,
            max_delay_ms: 350,
            curve_ratio: 0.25,
        }
    }
}

impl JitterConfig {
    fn clamp_delay(&self, ms: f64) -> u64 {
        (ms.round().max(0.0) as u64).clamp(self.min_delay_ms, self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    pub x: f64,
    pub y: f64,
    pub delay_ms: u64,
}

fn cubic_bezier(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    let x = u * u * u * p0.0 + 3.0 * u * u * t * p1.0 + 3.0 * u * t * t * p2.0 + t * t * t * p3.0;
    let y = u * u * u * p0.1 + 3.0 * u * u * t * p1.1 + 3.0 * u * t * t * p2.1 + t * t * t * p3.1;
    (x, y)
}

/// Curved pointer path from `from` to `to` with per-step delays.
///
/// Control points sit near one third and two thirds of the straight
/// segment, displaced by a random perpendicular offset so repeated
/// moves between the same points never trace the same curve.
pub fn pointer_path(from: (f64, f64), to: (f64, f64), config: &JitterConfig) -> Vec<PathStep> {
    let mut rng = rand::thread_rng();
    let steps = config.steps.max(2);

    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let length = (dx * dx + dy * dy).sqrt();
    let max_offset = (length * config.curve_ratio).max(1.0);

    let offset1: f64 = rng.gen_range(-max_offset..=max_offset);
    let offset2: f64 = rng.gen_range(-max_offset..=max_offset);

    // Unit perpendicular to the straight segment.
    let (px, py) = if length > f64::EPSILON {
        (-dy / length, dx / length)
    } else {
        (0.0, 1.0)
    };

    let c1 = (from.0 + dx / 3.0 + px * offset1, from.1 + dy / 3.0 + py * offset1);
    let c2 = (from.0 + dx * 2.0 / 3.0 + px * offset2, from.1 + dy * 2.0 / 3.0 + py * offset2);

    let total_ms = length / config.speed_px_per_sec * 1000.0;
    let base_step_ms = total_ms / steps as f64;

    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let (x, y) = cubic_bezier(from, c1, c2, to, t);
            let wobble = 1.0 + rng.gen_range(-0.4..=0.4) * config.humanization;
            PathStep {
                x,
                y,
                delay_ms: config.clamp_delay(base_step_ms * wobble),
            }
        })
        .collect()
}

fn needs_extra_dwell(ch: char) -> bool {
    ch.is_ascii_punctuation() || (!ch.is_ascii_alphanumeric() && !ch.is_whitespace())
}

/// Per-character delays for typing `text`, clamped to the configured
/// range. Punctuation and special characters get extra dwell, scaled
/// by the humanization level.
pub fn typing_delays(text: &str, config: &JitterConfig) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    let base = config.typing_base_ms as f64;

    text.chars()
        .map(|ch| {
            let variance = base * config.humanization * rng.gen_range(-0.5..=1.0);
            let extra = if needs_extra_dwell(ch) {
                base * (0.5 + config.humanization)
            } else {
                0.0
            };
            config.clamp_delay(base + variance + extra)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_starts_and_ends_on_targets() {
        let config = JitterConfig::default();
        let path = pointer_path((10.0, 20.0), (400.0, 300.0), &config);

        assert_eq!(path.len(), config.steps + 1);
        let first = path.first().unwrap();
        let last = path.last().unwrap();
        assert!((first.x - 10.0).abs() < 1e-6 && (first.y - 20.0).abs() < 1e-6);
        assert!((last.x - 400.0).abs() < 1e-6 && (last.y - 300.0).abs() < 1e-6);
    }

    #[test]
    fn path_is_not_a_straight_line() {
        let config = JitterConfig::default();
        // With random control offsets at least one midpoint should sit
        // off the straight segment across a few attempts.
        let deviated = (0..5).any(|_| {
            let path = pointer_path((0.0, 0.0), (1000.0, 0.0), &config);
            path.iter().any(|step| step.y.abs() > 1.0)
        });
        assert!(deviated);
    }

    #[test]
    fn delays_are_clamped() {
        let config = JitterConfig {
            min_delay_ms: 10,
            max_delay_ms: 30,
            ..JitterConfig::default()
        };
        for step in pointer_path((0.0, 0.0), (5000.0, 5000.0), &config) {
            assert!((10..=30).contains(&step.delay_ms));
        }
        for delay in typing_delays("hello, world! #42", &config) {
            assert!((10..=30).contains(&delay));
        }
    }

    #[test]
    fn punctuation_gets_extra_dwell() {
        let config = JitterConfig {
            humanization: 0.0,
            min_delay_ms: 0,
            max_delay_ms: 10_000,
            ..JitterConfig::default()
        };
        // With zero humanization the variance term vanishes, so the
        // punctuation dwell is deterministic.
        let delays = typing_delays("a!", &config);
        assert!(delays[1] > delays[0]);
    }
}
