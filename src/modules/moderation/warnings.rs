use crate::services::storage::{Document, JsonStore};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub reason: String,
    pub moderator_id: u64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WarningsFile {
    /// guild id -> member id -> warnings, oldest first
    #[serde(default)]
    pub guilds: HashMap<u64, HashMap<u64, Vec<Warning>>>,
}

impl Document for WarningsFile {
    const VERSION: u32 = 1;
}

pub struct WarningService {
    store: JsonStore<WarningsFile>,
}

impl WarningService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            store: JsonStore::load(path),
        }
    }

    /// Records a warning and returns the member's new total.
    pub fn add(&self, guild_id: serenity::GuildId, user_id: serenity::UserId, warning: Warning) -> usize {
        self.store.update(|file| {
            let list = file
                .guilds
                .entry(guild_id.get())
                .or_default()
                .entry(user_id.get())
                .or_default();
            list.push(warning);
            list.len()
        })
    }

    pub fn list(&self, guild_id: serenity::GuildId, user_id: serenity::UserId) -> Vec<Warning> {
        self.store.read(|file| {
            file.guilds
                .get(&guild_id.get())
                .and_then(|members| members.get(&user_id.get()))
                .cloned()
                .unwrap_or_default()
        })
    }

    /// The `limit` most recent warnings, newest first, with the total count.
    pub fn recent(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        limit: usize,
    ) -> (Vec<Warning>, usize) {
        let all = self.list(guild_id, user_id);
        let total = all.len();
        (all.into_iter().rev().take(limit).collect(), total)
    }

    /// Removes the most recent warning.
    pub fn remove_last(&self, guild_id: serenity::GuildId, user_id: serenity::UserId) -> Option<Warning> {
        self.store.update(|file| {
            let members = file.guilds.get_mut(&guild_id.get())?;
            let list = members.get_mut(&user_id.get())?;
            let removed = list.pop();
            if list.is_empty() {
                members.remove(&user_id.get());
            }
            removed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(reason: &str) -> Warning {
        Warning {
            reason: reason.to_string(),
            moderator_id: 1,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn warnings_accumulate_and_unwarn_removes_the_latest() {
        let dir = tempfile::tempdir().unwrap();
        let service = WarningService::new(dir.path().join("warnings.json"));
        let (guild, user) = (serenity::GuildId::new(1), serenity::UserId::new(2));

        assert_eq!(service.add(guild, user, warning("spam")), 1);
        assert_eq!(service.add(guild, user, warning("caps")), 2);

        assert_eq!(service.remove_last(guild, user).unwrap().reason, "caps");
        let left = service.list(guild, user);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].reason, "spam");

        assert!(service.remove_last(guild, user).is_some());
        assert!(service.remove_last(guild, user).is_none());
        assert!(service.list(guild, user).is_empty());
    }

    #[test]
    fn recent_is_newest_first_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let service = WarningService::new(dir.path().join("warnings.json"));
        let (guild, user) = (serenity::GuildId::new(1), serenity::UserId::new(2));

        for i in 0..7 {
            service.add(guild, user, warning(&format!("w{i}")));
        }
        let (recent, total) = service.recent(guild, user, 5);
        assert_eq!(total, 7);
        let reasons: Vec<_> = recent.iter().map(|w| w.reason.as_str()).collect();
        assert_eq!(reasons, ["w6", "w5", "w4", "w3", "w2"]);
    }

    #[test]
    fn warnings_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnings.json");
        let (guild, user) = (serenity::GuildId::new(1), serenity::UserId::new(2));

        WarningService::new(path.clone()).add(guild, user, warning("spam"));
        assert_eq!(WarningService::new(path).list(guild, user).len(), 1);
    }
}
