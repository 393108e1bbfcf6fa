//! Giveaway winner selection.

use poise::serenity_prelude::UserId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::models::Entry;

/// Pick up to `count` distinct winners.
///
/// Every entry contributes its participant to the pool, so a participant with
/// a normal and a bonus entry appears twice. The pool is shuffled uniformly and
/// walked in order, keeping each participant's first occurrence. More entries
/// mean better odds, never a second slot. With fewer distinct participants
/// than `count`, all of them win.
pub fn draw_winners<R: Rng + ?Sized>(entries: &[Entry], count: usize, rng: &mut R) -> Vec<UserId> {
    let mut pool: Vec<UserId> = entries.iter().map(|e| e.user_id).collect();
    pool.shuffle(rng);

    let mut seen = HashSet::new();
    let mut winners = Vec::with_capacity(count.min(pool.len()));
    for user_id in pool {
        if winners.len() >= count {
            break;
        }
        if seen.insert(user_id) {
            winners.push(user_id);
        }
    }
    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(user: u64, kind: EntryKind) -> Entry {
        Entry {
            user_id: UserId::new(user),
            kind,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_double_entry_never_takes_two_slots() {
        let a = UserId::new(1);
        let b = UserId::new(2);
        let entries = vec![
            entry(1, EntryKind::Normal),
            entry(2, EntryKind::Normal),
            entry(2, EntryKind::Bonus),
        ];

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let winners = draw_winners(&entries, 2, &mut rng);
            let set: HashSet<UserId> = winners.iter().copied().collect();
            assert_eq!(winners.len(), 2);
            assert_eq!(set, HashSet::from([a, b]));
        }
    }

    #[test]
    fn test_no_duplicates_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        for round in 0..100u64 {
            let entries: Vec<Entry> = (0..(round % 13))
                .flat_map(|u| {
                    let mut e = vec![entry(u + 1, EntryKind::Normal)];
                    if u % 3 == 0 {
                        e.push(entry(u + 1, EntryKind::Bonus));
                    }
                    e
                })
                .collect();
            let distinct: HashSet<UserId> = entries.iter().map(|e| e.user_id).collect();
            let count = (round % 7) as usize + 1;

            let winners = draw_winners(&entries, count, &mut rng);
            let unique: HashSet<UserId> = winners.iter().copied().collect();

            assert_eq!(unique.len(), winners.len());
            assert!(winners.len() <= count);
            assert_eq!(winners.len(), count.min(distinct.len()));
            assert!(unique.is_subset(&distinct));
        }
    }

    #[test]
    fn test_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(draw_winners(&[], 3, &mut rng).is_empty());
    }

    #[test]
    fn test_same_seed_same_result() {
        let entries: Vec<Entry> = (1..=10).map(|u| entry(u, EntryKind::Normal)).collect();
        let first = draw_winners(&entries, 3, &mut StdRng::seed_from_u64(42));
        let second = draw_winners(&entries, 3, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_double_entry_improves_odds() {
        // A holds two entries, B and C one each, single winner
        let entries = vec![
            entry(1, EntryKind::Normal),
            entry(1, EntryKind::Bonus),
            entry(2, EntryKind::Normal),
            entry(3, EntryKind::Normal),
        ];
        let mut rng = StdRng::seed_from_u64(2024);
        let mut wins = [0u32; 4];
        let rounds = 20_000;
        for _ in 0..rounds {
            let winner = draw_winners(&entries, 1, &mut rng)[0];
            wins[winner.get() as usize] += 1;
        }

        // Expected shares: A 1/2, B 1/4, C 1/4
        assert!(wins[1] > wins[2]);
        assert!(wins[1] > wins[3]);
        let share_a = wins[1] as f64 / rounds as f64;
        assert!((share_a - 0.5).abs() < 0.03, "share_a = {}", share_a);
    }
}
