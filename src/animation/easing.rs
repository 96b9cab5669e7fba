//! Easing functions reshaping the gradient between two keys.
//!
//! Every easing is defined by its "ease in" core on `[0, 1]`; the mode derives
//! the ease-out and ease-in-out variants from it.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EasingMode {
    #[default]
    EaseIn,
    EaseOut,
    EaseInOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EasingKind {
    Circle,
    Back { amplitude: f32 },
    Bounce { bounces: f32, bounciness: f32 },
    Cubic,
    Elastic { oscillations: f32, springiness: f32 },
    Exponential { exponent: f32 },
    Power { power: f32 },
    Quadratic,
    Quartic,
    Quintic,
    Sine,
    /// Cubic bezier through `(0,0)`, `(x1,y1)`, `(x2,y2)`, `(1,1)`.
    Bezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EasingFunction {
    pub kind: EasingKind,
    pub mode: EasingMode,
}

impl EasingFunction {
    #[must_use]
    pub const fn new(kind: EasingKind, mode: EasingMode) -> Self {
        Self { kind, mode }
    }

    #[must_use]
    pub fn ease(&self, gradient: f32) -> f32 {
        match self.mode {
            EasingMode::EaseIn => self.ease_in_core(gradient),
            EasingMode::EaseOut => 1.0 - self.ease_in_core(1.0 - gradient),
            EasingMode::EaseInOut => {
                if gradient >= 0.5 {
                    (1.0 - self.ease_in_core((1.0 - gradient) * 2.0)) * 0.5 + 0.5
                } else {
                    self.ease_in_core(gradient * 2.0) * 0.5
                }
            }
        }
    }

    fn ease_in_core(&self, gradient: f32) -> f32 {
        match self.kind {
            EasingKind::Circle => {
                let g = gradient.clamp(0.0, 1.0);
                1.0 - (1.0 - g * g).sqrt()
            }
            EasingKind::Back { amplitude } => {
                let num = amplitude.max(0.0);
                gradient.powi(3) - gradient * num * (PI * gradient).sin()
            }
            EasingKind::Bounce {
                bounces,
                bounciness,
            } => bounce(gradient, bounces, bounciness),
            EasingKind::Cubic => gradient * gradient * gradient,
            EasingKind::Elastic {
                oscillations,
                springiness,
            } => {
                let oscillations = oscillations.max(0.0);
                let springiness = springiness.max(0.0);
                let base = if springiness == 0.0 {
                    gradient
                } else {
                    ((springiness * gradient).exp() - 1.0) / (springiness.exp() - 1.0)
                };
                base * ((TAU * oscillations + FRAC_PI_2) * gradient).sin()
            }
            EasingKind::Exponential { exponent } => {
                if exponent <= 0.0 {
                    gradient
                } else {
                    ((exponent * gradient).exp() - 1.0) / (exponent.exp() - 1.0)
                }
            }
            EasingKind::Power { power } => gradient.powf(power.max(0.0)),
            EasingKind::Quadratic => gradient * gradient,
            EasingKind::Quartic => gradient.powi(4),
            EasingKind::Quintic => gradient.powi(5),
            EasingKind::Sine => 1.0 - (FRAC_PI_2 * (1.0 - gradient)).sin(),
            EasingKind::Bezier { x1, y1, x2, y2 } => bezier(gradient, x1, y1, x2, y2),
        }
    }
}

fn bounce(gradient: f32, bounces: f32, bounciness: f32) -> f32 {
    let y = bounces.max(0.0);
    let bounciness = if bounciness <= 1.0 { 1.001 } else { bounciness };

    let num9 = bounciness.powf(y);
    let num5 = 1.0 - bounciness;
    let num4 = (1.0 - num9) / num5 + num9 * 0.5;
    let num15 = gradient * num4;
    let num65 = (-num15 * (1.0 - bounciness) + 1.0).ln() / bounciness.ln();
    let num3 = num65.floor();
    let num13 = num3 + 1.0;
    let num8 = (1.0 - bounciness.powf(num3)) / (num5 * num4);
    let num12 = (1.0 - bounciness.powf(num13)) / (num5 * num4);
    let num7 = (num8 + num12) * 0.5;
    let num6 = gradient - num7;
    let num2 = num7 - num8;
    (-(1.0 / bounciness).powf(y - num3) / (num2 * num2)) * (num6 - num2) * (num6 + num2)
}

/// Solves the bezier for `x == t` with a few Newton steps, then evaluates y.
fn bezier(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let f0 = 1.0 - 3.0 * x2 + 3.0 * x1;
    let f1 = 3.0 * x2 - 6.0 * x1;
    let f2 = 3.0 * x1;

    let mut refined = t;
    for _ in 0..5 {
        let r2 = refined * refined;
        let r3 = r2 * refined;
        let x = f0 * r3 + f1 * r2 + f2 * refined;
        let slope = 1.0 / (3.0 * f0 * r2 + 2.0 * f1 * refined + f2);
        refined -= (x - t) * slope;
        refined = refined.clamp(0.0, 1.0);
    }

    let inv = 1.0 - refined;
    3.0 * inv * inv * refined * y1 + 3.0 * inv * refined * refined * y2 + refined.powi(3)
}
