use crate::services::settings::{PanelSettings, ReactionRoleSettings};
use crate::services::storage::{Document, JsonStore};
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Gender,
    Age,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Gender, Slot::Age];
}

/// Which messages carry the two panels.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRoleFile {
    #[serde(default)]
    pub gender_message_id: Option<u64>,
    #[serde(default)]
    pub age_message_id: Option<u64>,
}

impl Document for ReactionRoleFile {
    const VERSION: u32 = 1;
}

impl ReactionRoleFile {
    fn slot_mut(&mut self, slot: Slot) -> &mut Option<u64> {
        match slot {
            Slot::Gender => &mut self.gender_message_id,
            Slot::Age => &mut self.age_message_id,
        }
    }

    fn slot(&self, slot: Slot) -> Option<u64> {
        match slot {
            Slot::Gender => self.gender_message_id,
            Slot::Age => self.age_message_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Grant,
    Revoke,
}

/// The change needed so the member ends up holding (`grant`) or not
/// holding the role. `None` when nothing has to happen.
pub fn plan_role_change(
    current: &[serenity::RoleId],
    role: serenity::RoleId,
    grant: bool,
) -> Option<RoleChange> {
    match (grant, current.contains(&role)) {
        (true, false) => Some(RoleChange::Grant),
        (false, true) => Some(RoleChange::Revoke),
        _ => None,
    }
}

fn strip_variation(emoji: &str) -> &str {
    emoji.trim_end_matches('\u{fe0f}')
}

/// Compares a reaction with a configured emoji. Custom emojis match by name.
pub fn emoji_matches(reaction: &serenity::ReactionType, configured: &str) -> bool {
    let configured = strip_variation(configured);
    match reaction {
        serenity::ReactionType::Unicode(value) => strip_variation(value) == configured,
        serenity::ReactionType::Custom {
            name: Some(name), ..
        } => name == configured,
        _ => false,
    }
}

pub struct ReactionRoleService {
    settings: Option<ReactionRoleSettings>,
    store: JsonStore<ReactionRoleFile>,
}

impl ReactionRoleService {
    pub fn new(settings: Option<ReactionRoleSettings>, path: PathBuf) -> Self {
        Self {
            settings,
            store: JsonStore::load(path),
        }
    }

    pub fn panel(&self, slot: Slot) -> Option<&PanelSettings> {
        let settings = self.settings.as_ref()?;
        Some(match slot {
            Slot::Gender => &settings.gender,
            Slot::Age => &settings.age,
        })
    }

    pub fn bind(&self, slot: Slot, message_id: serenity::MessageId) {
        self.store
            .update(|file| *file.slot_mut(slot) = Some(message_id.get()));
    }

    pub fn message_id(&self, slot: Slot) -> Option<serenity::MessageId> {
        self.store
            .read(|file| file.slot(slot))
            .map(serenity::MessageId::new)
    }

    /// The role bound to `emoji` on `message_id`, if that message is a panel.
    pub fn resolve(
        &self,
        message_id: serenity::MessageId,
        emoji: &serenity::ReactionType,
    ) -> Option<serenity::RoleId> {
        let slot = Slot::ALL
            .into_iter()
            .find(|slot| self.message_id(*slot) == Some(message_id))?;
        self.panel(slot)?
            .options
            .iter()
            .find(|option| emoji_matches(emoji, &option.emoji))
            .map(|option| serenity::RoleId::new(option.role_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::settings::RoleOption;

    fn panel(first: (&str, u64), second: (&str, u64)) -> PanelSettings {
        PanelSettings {
            title: "title".into(),
            description: "description".into(),
            image_url: None,
            colour: 0,
            options: [
                RoleOption {
                    emoji: first.0.into(),
                    role_id: first.1,
                },
                RoleOption {
                    emoji: second.0.into(),
                    role_id: second.1,
                },
            ],
        }
    }

    fn settings() -> ReactionRoleSettings {
        ReactionRoleSettings {
            gender: panel(("👕", 1), ("👗", 2)),
            age: panel(("⛏", 3), ("🔞", 4)),
        }
    }

    fn unicode(value: &str) -> serenity::ReactionType {
        serenity::ReactionType::Unicode(value.to_string())
    }

    #[test]
    fn role_changes_are_idempotent() {
        let role = serenity::RoleId::new(5);
        let held = [role];
        assert_eq!(plan_role_change(&[], role, true), Some(RoleChange::Grant));
        assert_eq!(plan_role_change(&held, role, true), None);
        assert_eq!(plan_role_change(&held, role, false), Some(RoleChange::Revoke));
        assert_eq!(plan_role_change(&[], role, false), None);
    }

    #[test]
    fn emoji_comparison_ignores_variation_selector() {
        assert!(emoji_matches(&unicode("⛏️"), "⛏"));
        assert!(emoji_matches(&unicode("⛏"), "⛏️"));
        assert!(!emoji_matches(&unicode("🔞"), "⛏"));
    }

    #[test]
    fn bindings_resolve_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reaction_roles.json");

        let service = ReactionRoleService::new(Some(settings()), path.clone());
        service.bind(Slot::Gender, serenity::MessageId::new(100));
        service.bind(Slot::Age, serenity::MessageId::new(200));
        drop(service);

        let service = ReactionRoleService::new(Some(settings()), path);
        let gender = serenity::MessageId::new(100);
        let age = serenity::MessageId::new(200);
        assert_eq!(service.resolve(gender, &unicode("👗")), Some(serenity::RoleId::new(2)));
        assert_eq!(service.resolve(age, &unicode("⛏")), Some(serenity::RoleId::new(3)));
        assert_eq!(service.resolve(age, &unicode("👗")), None);
        assert_eq!(service.resolve(serenity::MessageId::new(300), &unicode("👕")), None);
    }

    #[test]
    fn rebinding_replaces_the_panel_message() {
        let dir = tempfile::tempdir().unwrap();
        let service = ReactionRoleService::new(Some(settings()), dir.path().join("rr.json"));
        service.bind(Slot::Gender, serenity::MessageId::new(100));
        service.bind(Slot::Gender, serenity::MessageId::new(101));
        assert_eq!(service.resolve(serenity::MessageId::new(100), &unicode("👕")), None);
        assert_eq!(
            service.resolve(serenity::MessageId::new(101), &unicode("👕")),
            Some(serenity::RoleId::new(1))
        );
    }

    #[test]
    fn unconfigured_service_binds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let service = ReactionRoleService::new(None, dir.path().join("rr.json"));
        service.bind(Slot::Age, serenity::MessageId::new(1));
        assert!(service.panel(Slot::Age).is_none());
        assert_eq!(service.resolve(serenity::MessageId::new(1), &unicode("🔞")), None);
    }
}
