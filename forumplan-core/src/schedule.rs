//! Spreads a week's posts over days and times, and cycles topics and
//! subreddits in a per-calendar shuffled order.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::seq::SliceRandom;
use rand::Rng;

pub const DAYS_IN_WEEK: u32 = 7;
/// Posting window, hours in `[FIRST_HOUR, LAST_HOUR)`.
pub const FIRST_HOUR: u32 = 9;
pub const LAST_HOUR: u32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot {
    pub day_offset: u32,
    pub hour: u32,
    pub minute: u32,
}

impl Slot {
    pub fn at(&self, week_start: NaiveDate) -> NaiveDateTime {
        week_start.and_time(NaiveTime::MIN)
            + Duration::days(i64::from(self.day_offset))
            + Duration::hours(i64::from(self.hour))
            + Duration::minutes(i64::from(self.minute))
    }
}

/// Day offsets for `count` posts: the week's days repeated by doubling
/// until long enough, truncated and sorted.
pub fn day_offsets(count: usize) -> Vec<u32> {
    let mut days: Vec<u32> = (0..DAYS_IN_WEEK).collect();
    while days.len() < count {
        days.extend_from_within(..);
    }
    days.truncate(count);
    days.sort_unstable();
    days
}

pub fn plan_slots<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Slot> {
    day_offsets(count)
        .into_iter()
        .map(|day_offset| Slot {
            day_offset,
            hour: rng.gen_range(FIRST_HOUR..LAST_HOUR),
            minute: rng.gen_range(0..60),
        })
        .collect()
}

/// Cyclic selection over a list shuffled once.
#[derive(Debug, Clone)]
pub struct RoundRobin<'a, T> {
    items: Vec<&'a T>,
}

impl<'a, T> RoundRobin<'a, T> {
    pub fn shuffled<R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> Self {
        let mut items: Vec<&'a T> = items.iter().collect();
        items.shuffle(rng);
        Self { items }
    }

    /// Item for position `index`, wrapping around. `None` if the list is empty.
    pub fn get(&self, index: usize) -> Option<&'a T> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.items[index % self.items.len()])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn fewer_posts_than_days_take_the_first_days() {
        assert_eq!(day_offsets(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(day_offsets(7), vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn high_volume_repeats_early_days_first() {
        assert_eq!(day_offsets(10), vec![0, 0, 1, 1, 2, 2, 3, 4, 5, 6]);

        let twenty = day_offsets(20);
        assert_eq!(twenty.len(), 20);
        let mut per_day: HashMap<u32, usize> = HashMap::new();
        for day in &twenty {
            *per_day.entry(*day).or_default() += 1;
        }
        assert_eq!(per_day[&0], 3);
        assert_eq!(per_day[&5], 3);
        assert_eq!(per_day[&6], 2);
        assert!(twenty.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn slots_stay_inside_the_posting_window() {
        let mut rng = StdRng::seed_from_u64(42);
        let slots = plan_slots(50, &mut rng);
        assert_eq!(slots.len(), 50);
        for slot in slots {
            assert!(slot.day_offset < DAYS_IN_WEEK);
            assert!((FIRST_HOUR..LAST_HOUR).contains(&slot.hour));
            assert!(slot.minute < 60);
        }
    }

    #[test]
    fn slot_resolves_against_week_start() {
        let monday = NaiveDate::from_ymd_opt(2026, 10, 26).unwrap();
        let slot = Slot {
            day_offset: 2,
            hour: 14,
            minute: 5,
        };
        assert_eq!(
            slot.at(monday),
            NaiveDate::from_ymd_opt(2026, 10, 28)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap()
        );
    }

    #[test]
    fn round_robin_covers_evenly() {
        let mut rng = StdRng::seed_from_u64(3);
        let subs = ["a", "b"];
        let rr = RoundRobin::shuffled(&subs, &mut rng);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..20 {
            *counts.entry(*rr.get(i).unwrap()).or_default() += 1;
        }
        assert_eq!(counts["a"], 10);
        assert_eq!(counts["b"], 10);
    }

    #[test]
    fn round_robin_over_nothing_is_none() {
        let mut rng = StdRng::seed_from_u64(3);
        let empty: [u8; 0] = [];
        let rr = RoundRobin::shuffled(&empty, &mut rng);
        assert!(rr.is_empty());
        assert_eq!(rr.get(4), None);
    }
}
