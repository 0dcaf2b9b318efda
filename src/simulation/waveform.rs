// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Waveform generators
//!
//! Every simulated memory cell is driven by one [`Waveform`]. The waveform
//! kinds fall into two classes:
//!
//! * **Time-pure** (`fixed`, `sine`, `sawtooth`, `triangle`, `noise`,
//!   `status_flags`, `exponential_decay`, `step_sequence`): the value only
//!   depends on the elapsed time since the scenario started. These are
//!   computed on every read and never touched by the scheduler.
//! * **Stateful** (`random_walk`, `counter`, `square`, `random`): the value
//!   depends on the previous tick. Only the scheduler advances them.
//!
//! All kinds go through [`Waveform::next`], which maps
//! `(elapsed, state, params)` to `(value, new_state)`.
//!
//! ## Pseudo-random kinds
//!
//! `noise` and the fault bit of `status_flags` draw from an RNG seeded with
//! the store seed, the cell and the evaluation instant (millisecond
//! resolution for `noise`, second resolution for the fault bit). Two reads at
//! the same instant therefore agree while successive instants get fresh
//! samples. `random_walk` and `random` draw from the scheduler RNG.
//!
//! ## Example scenario entries
//!
//! ```json
//! {"addr": 0, "wave": "sine", "min": 20, "max": 80, "period": 300}
//! {"addr": 1, "wave": "random_walk", "min": 450, "max": 550, "step": 5}
//! {"addr": 2, "type": "BOOL", "wave": "square", "on": 5, "off": 5}
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;

use super::value::{CellValue, ValueKind};

/// Parameters shared by the periodic waves (`sine`, `sawtooth`, `triangle`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicParams {
    pub min: f64,
    pub max: f64,
    /// Period in seconds
    pub period: f64,
    /// Phase offset in degrees, only used by `sine`.
    ///
    /// The default of -90° starts the wave at `min` at t = 0.
    #[serde(default = "default_sine_phase")]
    pub phase: f64,
}

fn default_sine_phase() -> f64 {
    -90.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedParams {
    pub value: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    pub base: f64,
    #[serde(default = "default_noise_amplitude")]
    pub amplitude: f64,
}

fn default_noise_amplitude() -> f64 {
    1.0
}

/// Bit layout of a synthesised status byte.
///
/// The defaults reproduce a permanently running device with a blinking
/// warning lamp, rare transient faults and a ready bit that drops while a
/// fault is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusFlagsParams {
    pub running_bit: u8,
    /// Seconds the running bit stays set
    pub running_on: f64,
    /// Seconds the running bit stays cleared (0 = always running)
    pub running_off: f64,
    pub warning_bit: u8,
    pub warning_on: f64,
    pub warning_off: f64,
    pub fault_bit: u8,
    /// Probability that the fault bit is set during any given second
    pub fault_probability: f64,
    /// Set whenever no fault is active, `None` disables it
    pub ready_bit: Option<u8>,
}

impl Default for StatusFlagsParams {
    fn default() -> Self {
        Self {
            running_bit: 0,
            running_on: 10.0,
            running_off: 0.0,
            warning_bit: 1,
            warning_on: 5.0,
            warning_off: 5.0,
            fault_bit: 2,
            fault_probability: 0.05,
            ready_bit: Some(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayParams {
    pub initial: f64,
    pub target: f64,
    /// Time constant in seconds
    pub time_constant: f64,
    /// Seconds before the decay starts, `initial` is held until then
    #[serde(default)]
    pub start_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    pub values: Vec<f64>,
    /// Duration of each step in seconds
    pub durations: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomWalkParams {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Starting point, midpoint of `[min, max]` when absent
    #[serde(default)]
    pub initial: Option<f64>,
}

impl RandomWalkParams {
    /// Range the walk may commit for `kind`.
    ///
    /// Integer kinds narrow `[min, max]` to the whole numbers inside it, so a
    /// truncated sample never falls below `min`.
    pub fn bounds(&self, kind: ValueKind) -> (f64, f64) {
        if kind == ValueKind::Real {
            (self.min, self.max)
        } else {
            (self.min.ceil(), self.max.floor())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterParams {
    /// Largest value before wrapping to 0, the kind maximum when absent
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareParams {
    /// Seconds spent true
    pub on: f64,
    /// Seconds spent false
    pub off: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomParams {
    /// Per-tick probability of toggling the coil
    pub probability: f64,
    #[serde(default)]
    pub initial: bool,
}

/// Waveform kind of a cell together with its own parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "wave", rename_all = "snake_case")]
pub enum Waveform {
    Fixed(FixedParams),
    Sine(PeriodicParams),
    Sawtooth(PeriodicParams),
    Triangle(PeriodicParams),
    Noise(NoiseParams),
    StatusFlags(StatusFlagsParams),
    ExponentialDecay(DecayParams),
    StepSequence(StepParams),
    RandomWalk(RandomWalkParams),
    Counter(CounterParams),
    Square(SquareParams),
    Random(RandomParams),
}

/// Generator state carried between scheduler ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeneratorState {
    /// Time-pure waveforms keep nothing
    Stateless,
    RandomWalk { last: f64 },
    /// Value emitted on the next tick
    Counter { next: u64 },
    /// Current phase and the elapsed second at which it began. The cycle
    /// position is only recomputed once that phase has run out.
    Square { phase: bool, since: f64 },
    Random { current: bool },
}

/// Inputs of one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    /// Time since the scenario was activated
    pub elapsed: Duration,
    /// Seed of the owning store
    pub seed: u64,
    /// Stable identifier of the evaluated cell
    pub cell_key: u64,
}

impl EvalContext {
    pub fn new(elapsed: Duration, seed: u64, cell_key: u64) -> Self {
        Self {
            elapsed,
            seed,
            cell_key,
        }
    }

    fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// RNG that yields the same stream for every evaluation falling into the
    /// same `quantum_ms` window of this cell
    fn instant_rng(&self, quantum_ms: u64, salt: u64) -> StdRng {
        let window = self.elapsed.as_millis() as u64 / quantum_ms.max(1);
        let mixed = self.seed
            ^ self.cell_key.rotate_left(17)
            ^ window.wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ salt;
        StdRng::seed_from_u64(mixed)
    }
}

/// True during the first `on` seconds of every `on + off` cycle
fn square_phase(elapsed: f64, on: f64, off: f64) -> bool {
    square_state(elapsed, on, off).0
}

/// Phase at `elapsed` and the second at which that phase began
fn square_state(elapsed: f64, on: f64, off: f64) -> (bool, f64) {
    let period = on + off;
    if period <= 0.0 {
        return (false, elapsed);
    }
    let position = elapsed % period;
    let cycle_start = elapsed - position;
    if position < on {
        (true, cycle_start)
    } else {
        (false, cycle_start + on)
    }
}

impl Waveform {
    /// Name used in scenario files and log lines
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Fixed(_) => "fixed",
            Waveform::Sine(_) => "sine",
            Waveform::Sawtooth(_) => "sawtooth",
            Waveform::Triangle(_) => "triangle",
            Waveform::Noise(_) => "noise",
            Waveform::StatusFlags(_) => "status_flags",
            Waveform::ExponentialDecay(_) => "exponential_decay",
            Waveform::StepSequence(_) => "step_sequence",
            Waveform::RandomWalk(_) => "random_walk",
            Waveform::Counter(_) => "counter",
            Waveform::Square(_) => "square",
            Waveform::Random(_) => "random",
        }
    }

    /// Stateful waveforms are advanced by the scheduler only
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            Waveform::RandomWalk(_) | Waveform::Counter(_) | Waveform::Square(_) | Waveform::Random(_)
        )
    }

    /// Value and generator state of a freshly loaded cell
    pub fn initial(&self, kind: ValueKind, ctx: &EvalContext) -> (CellValue, GeneratorState) {
        match self {
            Waveform::RandomWalk(p) => {
                let (lo, hi) = p.bounds(kind);
                let start = p.initial.unwrap_or((p.min + p.max) / 2.0);
                let value = kind.coerce(start.max(lo).min(hi));
                (
                    value,
                    GeneratorState::RandomWalk {
                        last: value.as_f64(),
                    },
                )
            }
            Waveform::Counter(_) => (kind.coerce(0.0), GeneratorState::Counter { next: 0 }),
            Waveform::Square(p) => {
                let (phase, since) = square_state(ctx.seconds(), p.on, p.off);
                (CellValue::Bool(phase), GeneratorState::Square { phase, since })
            }
            Waveform::Random(p) => (
                CellValue::Bool(p.initial),
                GeneratorState::Random { current: p.initial },
            ),
            _ => (self.evaluate(kind, ctx), GeneratorState::Stateless),
        }
    }

    /// Compute the next value of the cell.
    ///
    /// Time-pure kinds ignore `state` and `rng`. Stateful kinds fail when
    /// `state` does not belong to them.
    pub fn next<R: Rng>(
        &self,
        kind: ValueKind,
        ctx: &EvalContext,
        state: &GeneratorState,
        rng: &mut R,
    ) -> Result<(CellValue, GeneratorState), String> {
        match (self, state) {
            (Waveform::RandomWalk(p), GeneratorState::RandomWalk { last }) => {
                let delta = if p.step > 0.0 {
                    rng.random_range(-1.0f64..=1.0) * p.step
                } else {
                    0.0
                };
                let (lo, hi) = p.bounds(kind);
                let value = kind.coerce((last + delta).max(lo).min(hi));
                Ok((
                    value,
                    GeneratorState::RandomWalk {
                        last: value.as_f64(),
                    },
                ))
            }
            (Waveform::Counter(p), GeneratorState::Counter { next }) => {
                let max = self.counter_max(p, kind);
                let current = (*next).min(max);
                let following = if current >= max { 0 } else { current + 1 };
                Ok((
                    kind.coerce(current as f64),
                    GeneratorState::Counter { next: following },
                ))
            }
            (Waveform::Square(p), GeneratorState::Square { phase, since }) => {
                let elapsed = ctx.seconds();
                let held = if *phase { p.on } else { p.off };
                if *since <= elapsed && elapsed < *since + held {
                    return Ok((CellValue::Bool(*phase), state.clone()));
                }
                let (current, since) = square_state(elapsed, p.on, p.off);
                Ok((
                    CellValue::Bool(current),
                    GeneratorState::Square {
                        phase: current,
                        since,
                    },
                ))
            }
            (Waveform::Random(p), GeneratorState::Random { current }) => {
                let flipped = if rng.random_bool(p.probability.clamp(0.0, 1.0)) {
                    !*current
                } else {
                    *current
                };
                Ok((
                    CellValue::Bool(flipped),
                    GeneratorState::Random { current: flipped },
                ))
            }
            (w, _) if !w.is_stateful() => Ok((self.evaluate(kind, ctx), GeneratorState::Stateless)),
            (w, other) => Err(format!(
                "waveform '{}' cannot advance from state {:?}",
                w.name(),
                other
            )),
        }
    }

    /// Value of a time-pure waveform at `ctx.elapsed`.
    ///
    /// For stateful kinds this returns the value the cell would start with.
    pub fn evaluate(&self, kind: ValueKind, ctx: &EvalContext) -> CellValue {
        let t = ctx.seconds();
        match self {
            Waveform::Fixed(p) => kind.validate(&p.value).unwrap_or_else(|_| kind.zero()),
            Waveform::Sine(p) => {
                let angle = 2.0 * PI * t / p.period + p.phase.to_radians();
                kind.coerce(p.min + (p.max - p.min) / 2.0 * (1.0 + angle.sin()))
            }
            Waveform::Sawtooth(p) => {
                kind.coerce(p.min + (p.max - p.min) * (t % p.period) / p.period)
            }
            Waveform::Triangle(p) => {
                let position = (t % p.period) / p.period;
                let normalized = if position < 0.5 {
                    position * 2.0
                } else {
                    2.0 - position * 2.0
                };
                kind.coerce(p.min + (p.max - p.min) * normalized)
            }
            Waveform::Noise(p) => {
                let mut rng = ctx.instant_rng(1, 0);
                let sample = rng.random_range(-1.0f64..=1.0);
                kind.coerce(p.base + p.amplitude * sample)
            }
            Waveform::StatusFlags(p) => kind.coerce(status_byte(p, ctx) as f64),
            Waveform::ExponentialDecay(p) => {
                let since_start = t - p.start_offset;
                if since_start < 0.0 {
                    return kind.coerce(p.initial);
                }
                let decay = (-since_start / p.time_constant).exp();
                kind.coerce(p.target + (p.initial - p.target) * decay)
            }
            Waveform::StepSequence(p) => {
                let total: f64 = p.durations.iter().sum();
                if p.values.is_empty() || total <= 0.0 {
                    return kind.zero();
                }
                let position = t % total;
                let mut cumulative = 0.0;
                for (value, duration) in p.values.iter().zip(&p.durations) {
                    cumulative += duration;
                    if position < cumulative {
                        return kind.coerce(*value);
                    }
                }
                kind.coerce(p.values[p.values.len() - 1])
            }
            Waveform::RandomWalk(_)
            | Waveform::Counter(_)
            | Waveform::Square(_)
            | Waveform::Random(_) => self.initial(kind, ctx).0,
        }
    }

    fn counter_max(&self, p: &CounterParams, kind: ValueKind) -> u64 {
        match p.max {
            Some(max) => max.max(0.0) as u64,
            None if kind.fits_register() || kind == ValueKind::DInt || kind == ValueKind::DWord => {
                kind.range().1 as u64
            }
            None => u16::MAX as u64,
        }
    }

    /// Check the parameters against each other and against the cell kind
    pub fn validate(&self, kind: ValueKind) -> Result<(), String> {
        let numeric = |name: &str| -> Result<(), String> {
            if kind.is_numeric() {
                Ok(())
            } else {
                Err(format!("waveform '{}' needs a numeric type, got {}", name, kind))
            }
        };
        let (lo, hi) = kind.range();
        let within = |label: &str, v: f64| -> Result<(), String> {
            if !v.is_finite() || v < lo || v > hi {
                Err(format!("{} = {} does not fit {}", label, v, kind))
            } else {
                Ok(())
            }
        };

        match self {
            Waveform::Fixed(p) => kind
                .validate(&p.value)
                .map(|_| ())
                .map_err(|e| format!("fixed value: {}", e)),
            Waveform::Sine(p) | Waveform::Sawtooth(p) | Waveform::Triangle(p) => {
                numeric(self.name())?;
                if p.min > p.max {
                    return Err(format!("min {} is greater than max {}", p.min, p.max));
                }
                if !(p.period > 0.0) {
                    return Err(format!("period must be positive, got {}", p.period));
                }
                if !p.phase.is_finite() {
                    return Err("phase must be finite".to_string());
                }
                within("min", p.min)?;
                within("max", p.max)
            }
            Waveform::Noise(p) => {
                numeric(self.name())?;
                if !(p.amplitude >= 0.0) {
                    return Err(format!("amplitude must be >= 0, got {}", p.amplitude));
                }
                within("base", p.base)
            }
            Waveform::StatusFlags(p) => {
                if !matches!(kind, ValueKind::Byte | ValueKind::Word | ValueKind::Int) {
                    return Err(format!("status_flags needs BYTE, INT or WORD, got {}", kind));
                }
                let bits = (kind.byte_width() * 8) as u8;
                let mut used = vec![p.running_bit, p.warning_bit, p.fault_bit];
                used.extend(p.ready_bit);
                if let Some(bit) = used.iter().find(|b| **b >= bits) {
                    return Err(format!("status bit {} does not fit {}", bit, kind));
                }
                if !(0.0..=1.0).contains(&p.fault_probability) {
                    return Err(format!(
                        "fault_probability must be within [0, 1], got {}",
                        p.fault_probability
                    ));
                }
                if p.running_on < 0.0
                    || p.running_off < 0.0
                    || p.warning_on < 0.0
                    || p.warning_off < 0.0
                {
                    return Err("status_flags durations must be >= 0".to_string());
                }
                Ok(())
            }
            Waveform::ExponentialDecay(p) => {
                numeric(self.name())?;
                if !(p.time_constant > 0.0) {
                    return Err(format!(
                        "time_constant must be positive, got {}",
                        p.time_constant
                    ));
                }
                within("initial", p.initial)?;
                within("target", p.target)
            }
            Waveform::StepSequence(p) => {
                numeric(self.name())?;
                if p.values.is_empty() || p.values.len() != p.durations.len() {
                    return Err(format!(
                        "step_sequence needs as many durations as values ({} vs {})",
                        p.values.len(),
                        p.durations.len()
                    ));
                }
                if p.durations.iter().any(|d| *d < 0.0) || p.durations.iter().sum::<f64>() <= 0.0 {
                    return Err("step_sequence durations must be >= 0 with a positive total".to_string());
                }
                p.values.iter().try_for_each(|v| within("step value", *v))
            }
            Waveform::RandomWalk(p) => {
                numeric(self.name())?;
                if p.min > p.max {
                    return Err(format!("min {} is greater than max {}", p.min, p.max));
                }
                if !(p.step >= 0.0) {
                    return Err(format!("step must be >= 0, got {}", p.step));
                }
                within("min", p.min)?;
                within("max", p.max)?;
                let (lo, hi) = p.bounds(kind);
                if lo > hi {
                    return Err(format!(
                        "[{}, {}] holds no whole number for {}",
                        p.min, p.max, kind
                    ));
                }
                if let Some(initial) = p.initial {
                    if initial < p.min || initial > p.max {
                        return Err(format!(
                            "initial {} is outside [{}, {}]",
                            initial, p.min, p.max
                        ));
                    }
                }
                Ok(())
            }
            Waveform::Counter(p) => {
                numeric(self.name())?;
                if let Some(max) = p.max {
                    if max < 0.0 {
                        return Err(format!("counter max must be >= 0, got {}", max));
                    }
                    within("max", max)?;
                }
                Ok(())
            }
            Waveform::Square(p) => {
                if kind != ValueKind::Bool {
                    return Err(format!("square needs BOOL, got {}", kind));
                }
                if p.on < 0.0 || p.off < 0.0 || p.on + p.off <= 0.0 {
                    return Err(format!(
                        "square needs on, off >= 0 with on + off > 0 (on={}, off={})",
                        p.on, p.off
                    ));
                }
                Ok(())
            }
            Waveform::Random(p) => {
                if kind != ValueKind::Bool {
                    return Err(format!("random needs BOOL, got {}", kind));
                }
                if !(0.0..=1.0).contains(&p.probability) {
                    return Err(format!(
                        "probability must be within [0, 1], got {}",
                        p.probability
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Assemble the status byte for the current second
fn status_byte(p: &StatusFlagsParams, ctx: &EvalContext) -> u32 {
    let t = ctx.seconds();
    let mut value = 0u32;
    let running = p.running_off <= 0.0 || square_phase(t, p.running_on, p.running_off);
    if running {
        value |= 1 << p.running_bit;
    }
    if square_phase(t, p.warning_on, p.warning_off) {
        value |= 1 << p.warning_bit;
    }
    let fault = ctx.instant_rng(1000, 0xFA17).random_bool(p.fault_probability.clamp(0.0, 1.0));
    if fault {
        value |= 1 << p.fault_bit;
    } else if let Some(bit) = p.ready_bit {
        value |= 1 << bit;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ctx(seconds: f64) -> EvalContext {
        EvalContext::new(Duration::from_secs_f64(seconds), 42, 7)
    }

    fn sine(min: f64, max: f64, period: f64) -> Waveform {
        Waveform::Sine(PeriodicParams {
            min,
            max,
            period,
            phase: default_sine_phase(),
        })
    }

    #[test]
    fn test_sine_quarter_phase() {
        let wave = sine(0.0, 100.0, 60.0);
        let at = |s| wave.evaluate(ValueKind::Real, &ctx(s)).as_f64();
        assert_abs_diff_eq!(at(0.0), 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(at(15.0), 50.0, epsilon = 1e-4);
        assert_abs_diff_eq!(at(30.0), 100.0, epsilon = 1e-4);
        assert_abs_diff_eq!(at(60.0), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_sine_zero_phase_matches_plain_formula() {
        let wave = Waveform::Sine(PeriodicParams {
            min: 0.0,
            max: 100.0,
            period: 60.0,
            phase: 0.0,
        });
        assert_abs_diff_eq!(wave.evaluate(ValueKind::Real, &ctx(0.0)).as_f64(), 50.0, epsilon = 1e-4);
        assert_abs_diff_eq!(wave.evaluate(ValueKind::Real, &ctx(15.0)).as_f64(), 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_sawtooth_wraps() {
        let wave = Waveform::Sawtooth(PeriodicParams {
            min: 0.0,
            max: 10.0,
            period: 10.0,
            phase: 0.0,
        });
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(3.0)), CellValue::Integer(3));
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(10.0)), CellValue::Integer(0));
        assert_abs_diff_eq!(wave.evaluate(ValueKind::Real, &ctx(3.0)).as_f64(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_triangle_peaks_at_half_period() {
        let wave = Waveform::Triangle(PeriodicParams {
            min: 0.0,
            max: 100.0,
            period: 20.0,
            phase: 0.0,
        });
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(10.0)), CellValue::Integer(100));
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(15.0)), CellValue::Integer(50));
    }

    #[test]
    fn test_noise_is_idempotent_at_same_instant() {
        let wave = Waveform::Noise(NoiseParams {
            base: 120.5,
            amplitude: 2.0,
        });
        let first = wave.evaluate(ValueKind::Real, &ctx(12.345));
        let second = wave.evaluate(ValueKind::Real, &ctx(12.345));
        assert_eq!(first, second);
        let v = first.as_f64();
        assert!((118.5..=122.5).contains(&v), "noise sample {} out of band", v);
    }

    #[test]
    fn test_status_flags_layout() {
        let wave = Waveform::StatusFlags(StatusFlagsParams {
            fault_probability: 0.0,
            ..Default::default()
        });
        // warning lamp on during the first five seconds of each ten
        assert_eq!(wave.evaluate(ValueKind::Byte, &ctx(1.0)), CellValue::Integer(0b1011));
        assert_eq!(wave.evaluate(ValueKind::Byte, &ctx(6.0)), CellValue::Integer(0b1001));

        let faulty = Waveform::StatusFlags(StatusFlagsParams {
            fault_probability: 1.0,
            ..Default::default()
        });
        assert_eq!(faulty.evaluate(ValueKind::Byte, &ctx(6.0)), CellValue::Integer(0b0101));
    }

    #[test]
    fn test_counter_wraps_after_max() {
        let wave = Waveform::Counter(CounterParams { max: Some(5.0) });
        let mut rng = StdRng::seed_from_u64(1);
        let (_, mut state) = wave.initial(ValueKind::Word, &ctx(0.0));
        let mut seen = Vec::new();
        for _ in 0..7 {
            let (value, next) = wave.next(ValueKind::Word, &ctx(0.0), &state, &mut rng).unwrap();
            seen.push(value.as_f64() as i64);
            state = next;
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn test_random_walk_stays_bounded() {
        let wave = Waveform::RandomWalk(RandomWalkParams {
            min: 0.0,
            max: 100.0,
            step: 5.0,
            initial: Some(2.0),
        });
        let mut rng = StdRng::seed_from_u64(99);
        let (mut previous, mut state) = wave.initial(ValueKind::Real, &ctx(0.0));
        for _ in 0..5000 {
            let (value, next) = wave.next(ValueKind::Real, &ctx(0.0), &state, &mut rng).unwrap();
            let v = value.as_f64();
            assert!((0.0..=100.0).contains(&v));
            assert!((v - previous.as_f64()).abs() <= 5.0);
            previous = value;
            state = next;
        }
    }

    #[test]
    fn test_random_walk_on_integer_cell_respects_fractional_bounds() {
        let wave = Waveform::RandomWalk(RandomWalkParams {
            min: 0.5,
            max: 3.5,
            step: 1.0,
            initial: Some(0.6),
        });
        let mut rng = StdRng::seed_from_u64(7);
        let (first, mut state) = wave.initial(ValueKind::Word, &ctx(0.0));
        assert_eq!(first, CellValue::Integer(1));
        for _ in 0..500 {
            let (value, next) = wave.next(ValueKind::Word, &ctx(0.0), &state, &mut rng).unwrap();
            let v = value.as_f64();
            assert!((1.0..=3.0).contains(&v), "{} escaped [0.5, 3.5]", v);
            state = next;
        }

        let narrow = Waveform::RandomWalk(RandomWalkParams {
            min: 0.2,
            max: 0.8,
            step: 0.1,
            initial: None,
        });
        assert!(narrow.validate(ValueKind::Word).is_err());
        assert!(narrow.validate(ValueKind::Real).is_ok());
    }

    #[test]
    fn test_sine_on_word_cell_hits_midpoint() {
        let wave = sine(0.0, 100.0, 60.0);
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(15.0)), CellValue::Integer(50));
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(45.0)), CellValue::Integer(50));
        assert_eq!(wave.evaluate(ValueKind::Word, &ctx(0.0)), CellValue::Integer(0));
    }

    #[test]
    fn test_square_phase_and_transition_cache() {
        let wave = Waveform::Square(SquareParams { on: 2.0, off: 3.0 });
        let mut rng = StdRng::seed_from_u64(1);
        let (value, state) = wave.initial(ValueKind::Bool, &ctx(0.0));
        assert_eq!(value, CellValue::Bool(true));
        let (value, state) = wave.next(ValueKind::Bool, &ctx(2.5), &state, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(false));
        assert_eq!(state, GeneratorState::Square { phase: false, since: 2.0 });
        let (value, state) = wave.next(ValueKind::Bool, &ctx(4.0), &state, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(false));
        assert_eq!(state, GeneratorState::Square { phase: false, since: 2.0 });
        let (value, state) = wave.next(ValueKind::Bool, &ctx(5.5), &state, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(true));
        assert_eq!(state, GeneratorState::Square { phase: true, since: 5.0 });
    }

    #[test]
    fn test_square_serves_cached_phase_until_it_runs_out() {
        let wave = Waveform::Square(SquareParams { on: 2.0, off: 3.0 });
        let mut rng = StdRng::seed_from_u64(1);
        // a state whose phase contradicts the cycle is trusted while it lasts
        let cached = GeneratorState::Square { phase: true, since: 3.0 };
        let (value, state) = wave.next(ValueKind::Bool, &ctx(4.0), &cached, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(true));
        assert_eq!(state, cached);

        // once it has run out the cycle position decides again
        let (value, state) = wave.next(ValueKind::Bool, &ctx(5.5), &cached, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(true));
        assert_eq!(state, GeneratorState::Square { phase: true, since: 5.0 });
    }

    #[test]
    fn test_square_after_long_gap() {
        let wave = Waveform::Square(SquareParams { on: 2.0, off: 3.0 });
        let mut rng = StdRng::seed_from_u64(1);
        let (_, state) = wave.initial(ValueKind::Bool, &ctx(0.0));
        assert_eq!(state, GeneratorState::Square { phase: true, since: 0.0 });
        let (value, state) = wave.next(ValueKind::Bool, &ctx(12.5), &state, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(false));
        assert_eq!(state, GeneratorState::Square { phase: false, since: 12.0 });
    }

    #[test]
    fn test_random_toggles_with_certainty() {
        let wave = Waveform::Random(RandomParams {
            probability: 1.0,
            initial: false,
        });
        let mut rng = StdRng::seed_from_u64(3);
        let (_, state) = wave.initial(ValueKind::Bool, &ctx(0.0));
        let (value, state) = wave.next(ValueKind::Bool, &ctx(1.0), &state, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(true));
        let (value, _) = wave.next(ValueKind::Bool, &ctx(2.0), &state, &mut rng).unwrap();
        assert_eq!(value, CellValue::Bool(false));
    }

    #[test]
    fn test_mismatched_state_is_rejected() {
        let wave = Waveform::Counter(CounterParams { max: None });
        let mut rng = StdRng::seed_from_u64(3);
        let result = wave.next(ValueKind::Word, &ctx(1.0), &GeneratorState::Stateless, &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn test_decay_and_steps() {
        let decay = Waveform::ExponentialDecay(DecayParams {
            initial: 100.0,
            target: 20.0,
            time_constant: 10.0,
            start_offset: 5.0,
        });
        assert_abs_diff_eq!(decay.evaluate(ValueKind::Real, &ctx(2.0)).as_f64(), 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(
            decay.evaluate(ValueKind::Real, &ctx(15.0)).as_f64(),
            20.0 + 80.0 * (-1.0f64).exp(),
            epsilon = 1e-3
        );

        let steps = Waveform::StepSequence(StepParams {
            values: vec![200.0, 350.0, 300.0],
            durations: vec![60.0, 120.0, 180.0],
        });
        assert_eq!(steps.evaluate(ValueKind::Word, &ctx(30.0)), CellValue::Integer(200));
        assert_eq!(steps.evaluate(ValueKind::Word, &ctx(100.0)), CellValue::Integer(350));
        assert_eq!(steps.evaluate(ValueKind::Word, &ctx(370.0)), CellValue::Integer(200));
    }

    #[test]
    fn test_validation_rules() {
        assert!(sine(10.0, 0.0, 60.0).validate(ValueKind::Word).is_err());
        assert!(sine(0.0, 10.0, 0.0).validate(ValueKind::Word).is_err());
        assert!(sine(0.0, 70000.0, 10.0).validate(ValueKind::Word).is_err());
        assert!(sine(0.0, 10.0, 60.0).validate(ValueKind::Bool).is_err());
        assert!(sine(0.0, 10.0, 60.0).validate(ValueKind::Word).is_ok());
        assert!(Waveform::Square(SquareParams { on: 0.0, off: 0.0 })
            .validate(ValueKind::Bool)
            .is_err());
        assert!(Waveform::Square(SquareParams { on: 1.0, off: 1.0 })
            .validate(ValueKind::Word)
            .is_err());
        assert!(Waveform::Random(RandomParams {
            probability: 1.5,
            initial: false
        })
        .validate(ValueKind::Bool)
        .is_err());
        assert!(Waveform::Fixed(FixedParams {
            value: CellValue::Bool(true)
        })
        .validate(ValueKind::Word)
        .is_err());
    }

    #[test]
    fn test_deserialize_tagged_waveform() {
        let wave: Waveform =
            serde_json::from_str(r#"{"wave": "random_walk", "min": 450, "max": 550, "step": 5}"#)
                .unwrap();
        assert_eq!(
            wave,
            Waveform::RandomWalk(RandomWalkParams {
                min: 450.0,
                max: 550.0,
                step: 5.0,
                initial: None
            })
        );
        let flags: Waveform = serde_json::from_str(r#"{"wave": "status_flags"}"#).unwrap();
        assert_eq!(flags, Waveform::StatusFlags(StatusFlagsParams::default()));
    }
}
