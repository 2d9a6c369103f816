use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Picks up to `count` distinct winners among `entrants`. Entrants that are
/// also in `preferred` are drawn first; remaining slots are filled uniformly
/// from everyone else.
pub fn draw_winners<R: Rng + ?Sized>(
    entrants: &HashSet<serenity::UserId>,
    preferred: &HashSet<serenity::UserId>,
    count: usize,
    rng: &mut R,
) -> Vec<serenity::UserId> {
    let mut favoured: Vec<_> = entrants.intersection(preferred).copied().collect();
    let mut others: Vec<_> = entrants.difference(preferred).copied().collect();
    // Stable input order so a seeded rng gives reproducible draws.
    favoured.sort_unstable();
    others.sort_unstable();

    let count = count.min(entrants.len());

    favoured.shuffle(rng);
    let mut winners: Vec<_> = favoured.into_iter().take(count).collect();

    if winners.len() < count {
        others.shuffle(rng);
        let missing = count - winners.len();
        winners.extend(others.into_iter().take(missing));
    }

    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(range: std::ops::Range<u64>) -> HashSet<serenity::UserId> {
        range.map(serenity::UserId::new).collect()
    }

    #[test]
    fn draws_unique_winners_from_entrants() {
        let entrants = ids(1..21);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let winners = draw_winners(&entrants, &HashSet::new(), 5, &mut rng);
            assert_eq!(winners.len(), 5);
            let unique: HashSet<_> = winners.iter().copied().collect();
            assert_eq!(unique.len(), 5);
            assert!(unique.is_subset(&entrants));
        }
    }

    #[test]
    fn count_is_capped_by_entrants() {
        let mut rng = StdRng::seed_from_u64(7);
        let winners = draw_winners(&ids(1..4), &HashSet::new(), 10, &mut rng);
        assert_eq!(winners.len(), 3);
        assert!(draw_winners(&HashSet::new(), &ids(1..4), 3, &mut rng).is_empty());
    }

    #[test]
    fn preferred_entrants_win_first() {
        let entrants = ids(1..31);
        let preferred = ids(10..13);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let winners = draw_winners(&entrants, &preferred, 5, &mut rng);
            assert_eq!(winners.len(), 5);
            let picked: HashSet<_> = winners.iter().copied().collect();
            assert!(preferred.is_subset(&picked));
            assert!(winners[..3].iter().all(|id| preferred.contains(id)));
        }
    }

    #[test]
    fn preferred_non_entrants_are_ignored() {
        let entrants = ids(1..6);
        let preferred = ids(100..103);
        let mut rng = StdRng::seed_from_u64(1);
        let winners = draw_winners(&entrants, &preferred, 2, &mut rng);
        assert!(winners.iter().all(|id| entrants.contains(id)));
    }

    #[test]
    fn more_preferred_than_slots_stays_within_preferred() {
        let entrants = ids(1..11);
        let preferred = ids(1..6);
        let mut rng = StdRng::seed_from_u64(3);
        let winners = draw_winners(&entrants, &preferred, 2, &mut rng);
        assert!(winners.iter().all(|id| preferred.contains(id)));
    }
}
