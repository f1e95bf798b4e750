use std::fmt;

use serde::Serialize;

use super::metadata::ItemMetadata;

/// Published playback speeds, in half-speed steps (3 means 1.5x).
const SPEED_HALF_STEPS: [u64; 14] = [3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

pub const SPEED_MULTIPLIERS: [f64; 14] = [
    1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0, 7.5, 8.0,
];

/// `floor(seconds / (half_steps / 2))`, computed on integers.
pub fn scaled_seconds(seconds: u64, half_steps: u64) -> u64 {
    seconds.saturating_mul(2) / half_steps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationBreakdown {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl DurationBreakdown {
    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for DurationBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = |value: u64, name: &str| {
            if value == 1 {
                format!("{value} {name}")
            } else {
                format!("{value} {name}s")
            }
        };
        write!(
            f,
            "{} {} {}",
            unit(self.hours, "hour"),
            unit(self.minutes, "minute"),
            unit(self.seconds, "second")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedTotal {
    pub speed: f64,
    pub seconds: u64,
}

impl SpeedTotal {
    pub fn breakdown(&self) -> DurationBreakdown {
        DurationBreakdown::from_seconds(self.seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationTotals {
    pub base_seconds: u64,
    pub per_speed: Vec<SpeedTotal>,
}

impl DurationTotals {
    pub fn breakdown(&self) -> DurationBreakdown {
        DurationBreakdown::from_seconds(self.base_seconds)
    }

    pub fn at_speed(&self, speed: f64) -> Option<u64> {
        self.per_speed
            .iter()
            .find(|total| (total.speed - speed).abs() < f64::EPSILON)
            .map(|total| total.seconds)
    }
}

/// Durations come from mirrors unchecked, so totals stop at `u64::MAX`.
fn saturating_total(seconds: impl Iterator<Item = u64>) -> u64 {
    seconds.fold(0, u64::saturating_add)
}

/// Sums the durations of the items that resolved. Every speed total truncates
/// each item before summing, so rounding loss grows with the item count.
pub fn aggregate(items: &[Option<ItemMetadata>]) -> DurationTotals {
    let durations: Vec<u64> = items
        .iter()
        .flatten()
        .map(|item| item.duration_seconds)
        .collect();

    let per_speed = SPEED_HALF_STEPS
        .iter()
        .zip(SPEED_MULTIPLIERS)
        .map(|(&half_steps, speed)| SpeedTotal {
            speed,
            seconds: saturating_total(
                durations
                    .iter()
                    .map(|&seconds| scaled_seconds(seconds, half_steps)),
            ),
        })
        .collect();

    DurationTotals {
        base_seconds: saturating_total(durations.iter().copied()),
        per_speed,
    }
}
