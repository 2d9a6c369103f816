use super::stats::{Credit, GuildInviteStats, InviteStatsFile};
use crate::services::storage::JsonStore;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteUse {
    pub uses: u64,
    pub inviter_id: Option<serenity::UserId>,
}

/// Invite code to use count, for one guild.
pub type Snapshot = HashMap<String, InviteUse>;

/// How a member got into the guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinSource {
    Invite {
        code: String,
        inviter_id: Option<serenity::UserId>,
    },
    Vanity {
        code: String,
    },
    Unknown,
}

impl JoinSource {
    pub fn inviter_id(&self) -> Option<serenity::UserId> {
        match self {
            JoinSource::Invite { inviter_id, .. } => *inviter_id,
            _ => None,
        }
    }
}

/// Compare invite uses before and after a join to find the invite that was used.
///
/// Codes missing from `before` count as unused so a freshly created invite
/// can still be detected. Codes are scanned in sorted order.
pub fn find_used_invite(before: &Snapshot, after: &Snapshot) -> Option<(String, InviteUse)> {
    let mut codes: Vec<&String> = after.keys().collect();
    codes.sort();

    codes.into_iter().find_map(|code| {
        let current = after.get(code)?;
        let previous = before.get(code).map_or(0, |old| old.uses);
        (current.uses > previous).then(|| (code.clone(), *current))
    })
}

pub fn build_snapshot(invites: &[serenity::RichInvite]) -> Snapshot {
    invites
        .iter()
        .map(|invite| {
            (
                invite.code.to_string(),
                InviteUse {
                    uses: u64::from(invite.uses),
                    inviter_id: invite.inviter.as_ref().map(|user| user.id),
                },
            )
        })
        .collect()
}

pub struct InviteTracker {
    snapshots: DashMap<serenity::GuildId, Snapshot>,
    join_locks: DashMap<serenity::GuildId, Arc<tokio::sync::Mutex<()>>>,
    store: JsonStore<InviteStatsFile>,
}

impl InviteTracker {
    pub fn new(path: PathBuf) -> Self {
        Self {
            snapshots: DashMap::new(),
            join_locks: DashMap::new(),
            store: JsonStore::load(path),
        }
    }

    /// Re-lists the guild's invites and replaces its snapshot. On failure
    /// (usually missing Manage Server) the previous snapshot stays.
    pub async fn refresh(&self, http: &serenity::Http, guild_id: serenity::GuildId) -> Option<Snapshot> {
        match http.get_guild_invites(guild_id).await {
            Ok(invites) => {
                let snapshot = build_snapshot(&invites);
                debug!("Snapshot of {} invite(s) for guild {}", snapshot.len(), guild_id);
                self.snapshots.insert(guild_id, snapshot.clone());
                Some(snapshot)
            }
            Err(e) => {
                warn!("Failed to fetch invites for guild {}: {:?}", guild_id, e);
                None
            }
        }
    }

    pub fn snapshot(&self, guild_id: serenity::GuildId) -> Option<Snapshot> {
        self.snapshots.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn forget(&self, guild_id: serenity::GuildId) {
        self.snapshots.remove(&guild_id);
        self.join_locks.remove(&guild_id);
    }

    /// Joins of one guild are handled one at a time so each diff sees the
    /// snapshot left by the previous join.
    pub fn join_lock(&self, guild_id: serenity::GuildId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.join_locks.entry(guild_id).or_default().value())
    }

    /// Works out how a member joined given the snapshots around the join.
    pub async fn attribute(
        &self,
        http: &serenity::Http,
        guild_id: serenity::GuildId,
        before: &Snapshot,
        after: &Snapshot,
    ) -> JoinSource {
        if let Some((code, used)) = find_used_invite(before, after) {
            let inviter_id = match used.inviter_id {
                Some(id) => Some(resolve_inviter(http, guild_id, id).await),
                None => None,
            };
            return JoinSource::Invite { code, inviter_id };
        }

        match http.get_guild(guild_id).await {
            Ok(guild) => match guild.vanity_url_code {
                Some(code) => JoinSource::Vanity { code },
                None => JoinSource::Unknown,
            },
            Err(e) => {
                debug!("Could not check vanity URL of guild {}: {:?}", guild_id, e);
                JoinSource::Unknown
            }
        }
    }

    pub fn record_join(
        &self,
        guild_id: serenity::GuildId,
        member: serenity::UserId,
        inviter: serenity::UserId,
    ) -> Credit {
        self.store.update(|file| {
            file.guilds
                .entry(guild_id.get())
                .or_default()
                .credit_join(member, inviter)
        })
    }

    pub fn record_leave(
        &self,
        guild_id: serenity::GuildId,
        member: serenity::UserId,
    ) -> Option<serenity::UserId> {
        let attributed = self.store.read(|file| {
            file.guilds
                .get(&guild_id.get())
                .and_then(|stats| stats.inviter_of(member))
                .is_some()
        });
        if !attributed {
            return None;
        }
        self.store.update(|file| {
            file.guilds
                .get_mut(&guild_id.get())
                .and_then(|stats| stats.debit_leave(member))
        })
    }

    fn with_stats<R>(&self, guild_id: serenity::GuildId, f: impl FnOnce(&GuildInviteStats) -> R) -> R {
        self.store.read(|file| match file.guilds.get(&guild_id.get()) {
            Some(stats) => f(stats),
            None => f(&GuildInviteStats::default()),
        })
    }

    pub fn net_invites(&self, guild_id: serenity::GuildId, inviter: serenity::UserId) -> u64 {
        self.with_stats(guild_id, |stats| stats.net(inviter))
    }

    pub fn inviter_of(&self, guild_id: serenity::GuildId, member: serenity::UserId) -> Option<serenity::UserId> {
        self.with_stats(guild_id, |stats| stats.inviter_of(member))
    }

    pub fn leaderboard(&self, guild_id: serenity::GuildId, limit: usize) -> Vec<(serenity::UserId, u64)> {
        self.with_stats(guild_id, |stats| stats.leaderboard(limit))
    }
}

/// Looks the inviter up as a guild member, then as a user. Either way the
/// invite's own inviter id is what gets credited; the lookups only feed
/// the log line.
async fn resolve_inviter(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    inviter_id: serenity::UserId,
) -> serenity::UserId {
    let name = match http.get_member(guild_id, inviter_id).await {
        Ok(member) => Some(member.display_name().to_string()),
        Err(_) => http.get_user(inviter_id).await.ok().map(|user| user.name),
    };
    match name {
        Some(name) => info!("Resolved inviter {} ({}) in guild {}", name, inviter_id, guild_id),
        None => debug!("Inviter {} of guild {} is no longer reachable", inviter_id, guild_id),
    }
    inviter_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, u64, Option<u64>)]) -> Snapshot {
        entries
            .iter()
            .map(|(code, uses, inviter)| {
                (
                    code.to_string(),
                    InviteUse {
                        uses: *uses,
                        inviter_id: inviter.map(serenity::UserId::new),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn detects_the_invite_whose_uses_grew() {
        let before = snapshot(&[("aaa", 3, Some(1)), ("bbb", 5, Some(2))]);
        let after = snapshot(&[("aaa", 3, Some(1)), ("bbb", 6, Some(2))]);
        let (code, used) = find_used_invite(&before, &after).unwrap();
        assert_eq!(code, "bbb");
        assert_eq!(used.inviter_id, Some(serenity::UserId::new(2)));
    }

    #[test]
    fn new_codes_count_from_zero() {
        let before = snapshot(&[("aaa", 3, Some(1))]);
        let after = snapshot(&[("aaa", 3, Some(1)), ("fresh", 1, Some(7))]);
        let (code, _) = find_used_invite(&before, &after).unwrap();
        assert_eq!(code, "fresh");
    }

    #[test]
    fn unused_fresh_codes_are_not_matches() {
        let before = snapshot(&[("aaa", 3, Some(1))]);
        let after = snapshot(&[("aaa", 3, Some(1)), ("fresh", 0, Some(7))]);
        assert_eq!(find_used_invite(&before, &after), None);
    }

    #[test]
    fn no_change_means_no_invite() {
        let before = snapshot(&[("aaa", 3, Some(1))]);
        assert_eq!(find_used_invite(&before, &before.clone()), None);
        assert_eq!(find_used_invite(&Snapshot::new(), &Snapshot::new()), None);
    }

    #[test]
    fn ties_resolve_to_the_first_code() {
        let before = snapshot(&[("b", 1, None), ("a", 1, None)]);
        let after = snapshot(&[("b", 2, None), ("a", 2, None)]);
        assert_eq!(find_used_invite(&before, &after).unwrap().0, "a");
    }

    #[test]
    fn join_and_leave_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invite_stats.json");
        let guild = serenity::GuildId::new(10);
        let (member, inviter) = (serenity::UserId::new(1), serenity::UserId::new(2));

        let tracker = InviteTracker::new(path.clone());
        assert_eq!(tracker.record_join(guild, member, inviter), Credit::First);
        drop(tracker);

        let tracker = InviteTracker::new(path);
        assert_eq!(tracker.net_invites(guild, inviter), 1);
        assert_eq!(tracker.inviter_of(guild, member), Some(inviter));
        assert_eq!(tracker.record_leave(guild, member), Some(inviter));
        assert_eq!(tracker.net_invites(guild, inviter), 0);
        assert_eq!(tracker.record_leave(guild, member), None);
    }

    #[test]
    fn join_source_exposes_the_inviter() {
        let source = JoinSource::Invite {
            code: "abc".into(),
            inviter_id: Some(serenity::UserId::new(3)),
        };
        assert_eq!(source.inviter_id(), Some(serenity::UserId::new(3)));
        assert_eq!(JoinSource::Vanity { code: "x".into() }.inviter_id(), None);
    }
}
