use crate::services::storage::Document;
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted attribution bookkeeping for one guild.
///
/// Invariant: `net_invites[inviter]` equals the number of entries of
/// `member_to_inviter` pointing at `inviter`, and zero counters are not
/// stored.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildInviteStats {
    #[serde(default)]
    pub member_to_inviter: HashMap<u64, u64>,
    #[serde(default)]
    pub net_invites: HashMap<u64, u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InviteStatsFile {
    #[serde(default)]
    pub guilds: HashMap<u64, GuildInviteStats>,
}

impl Document for InviteStatsFile {
    const VERSION: u32 = 1;
}

/// What a join did to the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credit {
    First,
    Changed { previous: serenity::UserId },
    Unchanged,
}

impl GuildInviteStats {
    pub fn credit_join(&mut self, member: serenity::UserId, inviter: serenity::UserId) -> Credit {
        let previous = self.member_to_inviter.insert(member.get(), inviter.get());
        match previous {
            Some(previous) if previous == inviter.get() => Credit::Unchanged,
            Some(previous) => {
                self.decrement(previous);
                *self.net_invites.entry(inviter.get()).or_insert(0) += 1;
                Credit::Changed {
                    previous: serenity::UserId::new(previous),
                }
            }
            None => {
                *self.net_invites.entry(inviter.get()).or_insert(0) += 1;
                Credit::First
            }
        }
    }

    /// Drops the member's attribution, returning who had been credited.
    pub fn debit_leave(&mut self, member: serenity::UserId) -> Option<serenity::UserId> {
        let inviter = self.member_to_inviter.remove(&member.get())?;
        self.decrement(inviter);
        Some(serenity::UserId::new(inviter))
    }

    fn decrement(&mut self, inviter: u64) {
        if let Some(count) = self.net_invites.get_mut(&inviter) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.net_invites.remove(&inviter);
            }
        }
    }

    pub fn net(&self, inviter: serenity::UserId) -> u64 {
        self.net_invites.get(&inviter.get()).copied().unwrap_or(0)
    }

    pub fn inviter_of(&self, member: serenity::UserId) -> Option<serenity::UserId> {
        self.member_to_inviter
            .get(&member.get())
            .map(|id| serenity::UserId::new(*id))
    }

    /// Inviters by descending net count, ties by id.
    pub fn leaderboard(&self, limit: usize) -> Vec<(serenity::UserId, u64)> {
        let mut rows: Vec<_> = self
            .net_invites
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, count)| (*id, *count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows.into_iter()
            .take(limit)
            .map(|(id, count)| (serenity::UserId::new(id), count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn uid(id: u64) -> serenity::UserId {
        serenity::UserId::new(id)
    }

    fn assert_consistent(stats: &GuildInviteStats) {
        let mut expected: HashMap<u64, u64> = HashMap::new();
        for inviter in stats.member_to_inviter.values() {
            *expected.entry(*inviter).or_insert(0) += 1;
        }
        assert_eq!(stats.net_invites, expected);
    }

    #[test]
    fn join_and_leave_adjust_the_inviter() {
        let mut stats = GuildInviteStats::default();
        assert_eq!(stats.credit_join(uid(1), uid(100)), Credit::First);
        assert_eq!(stats.credit_join(uid(2), uid(100)), Credit::First);
        assert_eq!(stats.net(uid(100)), 2);

        assert_eq!(stats.debit_leave(uid(1)), Some(uid(100)));
        assert_eq!(stats.net(uid(100)), 1);
        assert_eq!(stats.debit_leave(uid(1)), None);
        assert_eq!(stats.net(uid(100)), 1);
    }

    #[test]
    fn rejoin_with_same_inviter_is_a_no_op() {
        let mut stats = GuildInviteStats::default();
        stats.credit_join(uid(1), uid(100));
        assert_eq!(stats.credit_join(uid(1), uid(100)), Credit::Unchanged);
        assert_eq!(stats.net(uid(100)), 1);
    }

    #[test]
    fn inviter_change_moves_the_credit() {
        let mut stats = GuildInviteStats::default();
        stats.credit_join(uid(1), uid(100));
        assert_eq!(
            stats.credit_join(uid(1), uid(200)),
            Credit::Changed { previous: uid(100) }
        );
        assert_eq!(stats.net(uid(100)), 0);
        assert_eq!(stats.net(uid(200)), 1);
        assert_eq!(stats.inviter_of(uid(1)), Some(uid(200)));
        assert_consistent(&stats);
    }

    #[test]
    fn counters_match_attributions_over_random_histories() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut stats = GuildInviteStats::default();

        for _ in 0..5_000 {
            let member = uid(rng.random_range(1..40));
            if rng.random_bool(0.6) {
                stats.credit_join(member, uid(rng.random_range(100..106)));
            } else {
                stats.debit_leave(member);
            }
            assert_consistent(&stats);
        }
    }

    #[test]
    fn leaderboard_orders_by_count_then_id() {
        let mut stats = GuildInviteStats::default();
        stats.credit_join(uid(1), uid(300));
        stats.credit_join(uid(2), uid(200));
        stats.credit_join(uid(3), uid(200));
        stats.credit_join(uid(4), uid(100));

        assert_eq!(
            stats.leaderboard(10),
            vec![(uid(200), 2), (uid(100), 1), (uid(300), 1)]
        );
        assert_eq!(stats.leaderboard(1), vec![(uid(200), 2)]);
    }

    #[test]
    fn stale_zero_counters_are_not_listed() {
        let mut stats = GuildInviteStats::default();
        stats.net_invites.insert(5, 0);
        assert!(stats.leaderboard(10).is_empty());
        stats.decrement(5);
        assert_eq!(stats.net(uid(5)), 0);
    }
}
