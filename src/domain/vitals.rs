//! Vitals engine: projects the event log onto the four gauges.
//!
//! [`VitalsEngine::compute`] is a pure function of the event log, the
//! dog's [`LifeStage`] and "now". It keeps no state between calls, so the
//! caller can re-run it on every mutation and on every timer tick.
//!
//! Per gauge, the most recent qualifying event inside a 12 hour trailing
//! window is found:
//!
//! | Gauge   | Reset by      | Rule (h = hours since event, m = multiplier) |
//! |---------|---------------|-----------------------------------------------|
//! | tummy   | `food`        | `max(5, 100 - 15·h·m)`                        |
//! | tank    | `water`       | `max(5, 100 - 20·h·m)`                        |
//! | energy  | `walk`        | `max(10, 100 - 8·h·m)`                        |
//! | urgency | `pee`, `poop` | `min(1, h / urgency_hours)`                   |
//!
//! A gauge with no qualifying event falls back to
//! [`StatsSnapshot::BASELINE`]. Urgency then gets a bump when the dog ate
//! or drank after its last potty event.

use super::{DogEvent, EventType, LifeStage, StatsSnapshot};

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: i64 = 60_000;

/// Linear decay from 100 toward a floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeDecay {
    /// Points lost per hour for an adult dog.
    pub per_hour: f64,
    /// Lowest value the gauge decays to.
    pub floor: f64,
}

impl GaugeDecay {
    fn apply(&self, hours_since: f64, multiplier: f64) -> f64 {
        (100.0 - hours_since * self.per_hour * multiplier).max(self.floor)
    }
}

/// Tunable constants of the vitals model.
///
/// The coupling thresholds are empirical; they live here rather than
/// inline so they can be revisited without touching the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalsTuning {
    /// Trailing window; older events are ignored.
    pub window_ms: i64,
    /// Values used when a gauge has no qualifying event.
    pub baseline: StatsSnapshot,
    /// Fullness decay.
    pub tummy: GaugeDecay,
    /// Hydration decay.
    pub tank: GaugeDecay,
    /// Energy decay.
    pub energy: GaugeDecay,
    /// Time after a meal before it adds to urgency.
    pub food_coupling_ms: i64,
    /// Urgency added by a meal newer than the last potty event.
    pub food_coupling_bump: f64,
    /// Time after drinking before it adds to urgency.
    pub water_coupling_ms: i64,
    /// Urgency added by drinking newer than the last potty event.
    pub water_coupling_bump: f64,
}

impl VitalsTuning {
    /// Overrides the coupling thresholds, in minutes.
    #[must_use]
    pub const fn with_coupling_minutes(mut self, food: i64, water: i64) -> Self {
        self.food_coupling_ms = food * MS_PER_MINUTE;
        self.water_coupling_ms = water * MS_PER_MINUTE;
        self
    }
}

impl Default for VitalsTuning {
    fn default() -> Self {
        Self {
            window_ms: 12 * 60 * MS_PER_MINUTE,
            baseline: StatsSnapshot::BASELINE,
            tummy: GaugeDecay {
                per_hour: 15.0,
                floor: 5.0,
            },
            tank: GaugeDecay {
                per_hour: 20.0,
                floor: 5.0,
            },
            energy: GaugeDecay {
                per_hour: 8.0,
                floor: 10.0,
            },
            food_coupling_ms: 30 * MS_PER_MINUTE,
            food_coupling_bump: 0.15,
            water_coupling_ms: 18 * MS_PER_MINUTE,
            water_coupling_bump: 0.10,
        }
    }
}

/// Timestamps of the most recent qualifying event per gauge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Latest {
    food: Option<i64>,
    water: Option<i64>,
    walk: Option<i64>,
    potty: Option<i64>,
}

impl Latest {
    fn scan<'a>(events: impl IntoIterator<Item = &'a DogEvent>) -> Self {
        let mut latest = Self::default();
        for event in events {
            let slot = match event.event_type {
                EventType::Food => &mut latest.food,
                EventType::Water => &mut latest.water,
                EventType::Walk => &mut latest.walk,
                EventType::Pee | EventType::Poop => &mut latest.potty,
                EventType::HealthCheck => continue,
            };
            *slot = Some(slot.map_or(event.timestamp, |t| t.max(event.timestamp)));
        }
        latest
    }
}

/// Stateless projection from event log to [`StatsSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VitalsEngine {
    tuning: VitalsTuning,
}

impl VitalsEngine {
    /// Creates an engine with the given tuning.
    #[must_use]
    pub const fn new(tuning: VitalsTuning) -> Self {
        Self { tuning }
    }

    /// Returns the engine's tuning.
    #[must_use]
    pub const fn tuning(&self) -> &VitalsTuning {
        &self.tuning
    }

    /// Computes the gauges at `now_ms`.
    ///
    /// `events` may be empty, unordered and contain events outside the
    /// window or in the future; those are ignored. The result is the same
    /// for any ordering of the same events.
    #[must_use]
    pub fn compute(&self, events: &[DogEvent], life_stage: LifeStage, now_ms: i64) -> StatsSnapshot {
        let t = &self.tuning;
        let window_start = now_ms.saturating_sub(t.window_ms);
        let latest = Latest::scan(
            events
                .iter()
                .filter(|e| e.timestamp >= window_start && e.timestamp <= now_ms),
        );

        let multiplier = life_stage.decay_multiplier();
        let hours = |ts: i64| hours_since(now_ms, ts);

        let tummy = latest.food.map_or(f64::from(t.baseline.tummy), |ts| {
            t.tummy.apply(hours(ts), multiplier)
        });
        let tank = latest.water.map_or(f64::from(t.baseline.tank), |ts| {
            t.tank.apply(hours(ts), multiplier)
        });
        let energy = latest.walk.map_or(f64::from(t.baseline.energy), |ts| {
            t.energy.apply(hours(ts), multiplier)
        });

        let mut urgency = latest.potty.map_or(t.baseline.urgency, |ts| {
            (hours(ts) / life_stage.urgency_hours()).min(1.0)
        });
        if newer_than_potty(latest.food, latest.potty, now_ms, t.food_coupling_ms) {
            urgency = (urgency + t.food_coupling_bump).min(1.0);
        }
        if newer_than_potty(latest.water, latest.potty, now_ms, t.water_coupling_ms) {
            urgency = (urgency + t.water_coupling_bump).min(1.0);
        }

        StatsSnapshot {
            tummy: round_gauge(tummy),
            tank: round_gauge(tank),
            energy: round_gauge(energy),
            urgency: round_urgency(urgency),
        }
    }
}

/// Elapsed hours, with clock skew clamped to zero.
fn hours_since(now_ms: i64, ts: i64) -> f64 {
    now_ms.saturating_sub(ts).max(0) as f64 / MS_PER_HOUR
}

/// `true` if `intake` happened after the last potty event (or there is
/// none in the window) and at least `threshold_ms` ago.
fn newer_than_potty(intake: Option<i64>, potty: Option<i64>, now_ms: i64, threshold_ms: i64) -> bool {
    let Some(intake) = intake else {
        return false;
    };
    potty.is_none_or(|p| intake > p) && now_ms.saturating_sub(intake) >= threshold_ms
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_gauge(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn round_urgency(value: f64) -> f64 {
    ((value.clamp(0.0, 1.0)) * 100.0).round() / 100.0
}
