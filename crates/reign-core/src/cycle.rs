//! Cycle arithmetic and the wall clock.
//!
//! A world's regeneration ticks are anchored to `cycle_started_at`: the
//! next tick is the first multiple of the cycle duration after the anchor
//! that lies strictly in the future. All derivations use checked
//! arithmetic and fall back to `now + duration` rather than overflowing.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use reign_types::World;

/// Shortest delay ever handed to a timer.
pub const MIN_TICK_DELAY: Duration = Duration::from_secs(1);

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + core::fmt::Debug {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `at`.
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(at),
        }
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    /// Move forward by `by`. Saturates at the largest representable time.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        let step = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        *now = now.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// The world's cycle length. Zero is treated as one second.
pub fn cycle_duration(world: &World) -> Duration {
    Duration::from_secs(u64::from(world.cycle_duration_in_seconds.max(1)))
}

fn cycle_millis(world: &World) -> i64 {
    i64::from(world.cycle_duration_in_seconds.max(1)).saturating_mul(1000)
}

/// When the world's next regeneration tick is due.
///
/// `anchor + duration * (floor((now - anchor) / duration) + 1)`. A world
/// without an anchor ticks one full duration from `now`.
pub fn next_tick_at(world: &World, now: DateTime<Utc>) -> DateTime<Utc> {
    let period_ms = cycle_millis(world);
    let fallback = TimeDelta::try_milliseconds(period_ms)
        .and_then(|period| now.checked_add_signed(period))
        .unwrap_or(now);
    let Some(anchor) = world.cycle_started_at else {
        return fallback;
    };

    let elapsed_ms = now.signed_duration_since(anchor).num_milliseconds();
    elapsed_ms
        .checked_div_euclid(period_ms)
        .and_then(|cycles_passed| cycles_passed.checked_add(1))
        .and_then(|cycles| cycles.checked_mul(period_ms))
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|offset| anchor.checked_add_signed(offset))
        .unwrap_or(fallback)
}

/// How long to wait before the world's next tick.
///
/// Never shorter than [`MIN_TICK_DELAY`].
pub fn next_tick_delay(world: &World, now: DateTime<Utc>) -> Duration {
    clamp_delay(next_tick_at(world, now).signed_duration_since(now))
}

fn clamp_delay(delay: TimeDelta) -> Duration {
    match delay.to_std() {
        Ok(d) if !d.is_zero() => d,
        _ => MIN_TICK_DELAY,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::TimeZone;
    use reign_types::{BoardType, WorldId};

    use super::*;

    pub(crate) fn world_with_cycle(seconds: u32, anchor: Option<DateTime<Utc>>) -> World {
        World {
            id: WorldId::new(),
            slug: "cycle".to_owned(),
            name: "cycle".to_owned(),
            owner_id: None,
            board_type: BoardType::Square,
            board_size: 2,
            is_public: true,
            max_players: 6,
            max_teams: 6,
            min_teams: 2,
            max_team_size: 3,
            min_team_size: 1,
            allow_player_team_creation: true,
            cycle_duration_in_seconds: seconds,
            action_points_per_cycle: 1,
            max_action_points: 3,
            cycle_started_at: anchor,
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn mid_cycle_ticks_at_next_boundary() {
        let world = world_with_cycle(60, Some(t0()));
        let now = t0() + TimeDelta::seconds(90);
        assert_eq!(next_tick_at(&world, now), t0() + TimeDelta::seconds(120));
        assert_eq!(next_tick_delay(&world, now), Duration::from_secs(30));
    }

    #[test]
    fn exact_boundary_waits_a_full_cycle() {
        let world = world_with_cycle(60, Some(t0()));
        let now = t0() + TimeDelta::seconds(120);
        assert_eq!(next_tick_at(&world, now), t0() + TimeDelta::seconds(180));
    }

    #[test]
    fn many_missed_cycles_skip_ahead() {
        let world = world_with_cycle(3600, Some(t0()));
        let now = t0() + TimeDelta::hours(50) + TimeDelta::minutes(15);
        assert_eq!(next_tick_at(&world, now), t0() + TimeDelta::hours(51));
    }

    #[test]
    fn missing_anchor_ticks_one_duration_from_now() {
        let world = world_with_cycle(60, None);
        assert_eq!(next_tick_at(&world, t0()), t0() + TimeDelta::seconds(60));
    }

    #[test]
    fn future_anchor_waits_for_anchor() {
        let world = world_with_cycle(60, Some(t0() + TimeDelta::seconds(30)));
        assert_eq!(next_tick_at(&world, t0()), t0() + TimeDelta::seconds(30));
    }

    #[test]
    fn non_positive_delay_is_clamped() {
        assert_eq!(clamp_delay(TimeDelta::zero()), MIN_TICK_DELAY);
        assert_eq!(clamp_delay(TimeDelta::seconds(-5)), MIN_TICK_DELAY);
        assert_eq!(
            clamp_delay(TimeDelta::milliseconds(250)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(t0());
        assert_eq!(clock.now(), t0());
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), t0() + TimeDelta::seconds(5));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }
}
