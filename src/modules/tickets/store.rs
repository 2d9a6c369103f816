use super::presets::{PresetText, TicketPreset};
use crate::services::storage::{Document, JsonStore};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Channel holding the "create ticket" panel.
    pub channel_id: u64,
    pub category_id: u64,
    #[serde(default)]
    pub support_role_id: Option<u64>,
    #[serde(default)]
    pub admin_role_id: Option<u64>,
    #[serde(default)]
    pub designer_role_id: Option<u64>,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub max_tickets: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub embed_title: String,
    #[serde(default)]
    pub embed_description: String,
    pub preset: TicketPreset,
    pub setup_by: u64,
    pub setup_at: DateTime<Utc>,
}

impl TicketConfig {
    pub fn staff_roles(&self) -> Vec<serenity::RoleId> {
        [self.support_role_id, self.admin_role_id, self.designer_role_id]
            .into_iter()
            .flatten()
            .map(serenity::RoleId::new)
            .collect()
    }

    /// Restores blank fields to the custom defaults. Returns the names of
    /// the fields that changed.
    pub fn fill_defaults(&mut self, text: &PresetText) -> Vec<&'static str> {
        let mut changed = vec![];
        if self.welcome_message.trim().is_empty() {
            self.welcome_message = text.welcome.clone();
            changed.push("welcome_message");
        }
        if self.embed_title.trim().is_empty() {
            self.embed_title = text.title.clone();
            changed.push("embed_title");
        }
        if self.embed_description.trim().is_empty() {
            self.embed_description = text.description.clone();
            changed.push("embed_description");
        }
        if self.max_tickets == 0 {
            self.max_tickets = 1;
            changed.push("max_tickets");
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub number: u64,
    pub channel_id: u64,
    pub creator_id: u64,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    #[serde(default)]
    pub closed_by: Option<u64>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GuildTickets {
    #[serde(default)]
    pub config: Option<TicketConfig>,
    /// Keyed by channel name, `ticket-<n>`.
    #[serde(default)]
    pub tickets: BTreeMap<String, TicketRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TicketsFile {
    #[serde(default)]
    pub guilds: HashMap<u64, GuildTickets>,
}

impl Document for TicketsFile {
    const VERSION: u32 = 1;
}

pub fn ticket_name(number: u64) -> String {
    format!("ticket-{number}")
}

pub fn parse_ticket_number(name: &str) -> Option<u64> {
    name.strip_prefix("ticket-")?.parse().ok()
}

/// Highest ticket number used in any guild, plus one.
pub fn next_ticket_number(file: &TicketsFile) -> u64 {
    file.guilds
        .values()
        .flat_map(|guild| guild.tickets.iter())
        .map(|(name, record)| parse_ticket_number(name).unwrap_or(record.number))
        .max()
        .unwrap_or(0)
        + 1
}

/// Open tickets of `creator` whose channel still exists.
pub fn open_ticket_count<'a>(
    records: impl IntoIterator<Item = &'a TicketRecord>,
    creator: serenity::UserId,
    channel_exists: impl Fn(serenity::ChannelId) -> bool,
) -> usize {
    records
        .into_iter()
        .filter(|record| record.creator_id == creator.get())
        .filter(|record| record.status == TicketStatus::Open)
        .filter(|record| channel_exists(serenity::ChannelId::new(record.channel_id)))
        .count()
}

/// Whether a member with `open` live tickets must be refused a new one.
pub fn at_cap(open: usize, max_tickets: u32) -> bool {
    open >= max_tickets as usize
}

/// Staff are members with Manage Channels or one of the configured roles.
pub fn is_staff(
    permissions: serenity::Permissions,
    member_roles: &[serenity::RoleId],
    config: Option<&TicketConfig>,
) -> bool {
    if permissions.manage_channels() || permissions.administrator() {
        return true;
    }
    config.is_some_and(|config| {
        config
            .staff_roles()
            .iter()
            .any(|role| member_roles.contains(role))
    })
}

fn member_access() -> serenity::Permissions {
    serenity::Permissions::VIEW_CHANNEL
        | serenity::Permissions::SEND_MESSAGES
        | serenity::Permissions::READ_MESSAGE_HISTORY
        | serenity::Permissions::ATTACH_FILES
}

pub fn member_overwrite(user_id: serenity::UserId) -> serenity::PermissionOverwrite {
    serenity::PermissionOverwrite {
        allow: member_access(),
        deny: serenity::Permissions::empty(),
        kind: serenity::PermissionOverwriteType::Member(user_id),
    }
}

/// Overwrites of a new ticket channel: hidden from @everyone, open to the
/// creator, the bot and the configured staff roles.
pub fn ticket_overwrites(
    guild_id: serenity::GuildId,
    bot_id: serenity::UserId,
    creator: serenity::UserId,
    config: &TicketConfig,
) -> Vec<serenity::PermissionOverwrite> {
    let everyone = serenity::RoleId::new(guild_id.get());
    let staff = member_access() | serenity::Permissions::MANAGE_MESSAGES;

    let mut overwrites = vec![
        serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: serenity::Permissions::VIEW_CHANNEL,
            kind: serenity::PermissionOverwriteType::Role(everyone),
        },
        member_overwrite(creator),
        serenity::PermissionOverwrite {
            allow: staff | serenity::Permissions::MANAGE_CHANNELS,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Member(bot_id),
        },
    ];

    let roles = [
        (config.support_role_id, staff),
        (config.designer_role_id, staff),
        (config.admin_role_id, staff | serenity::Permissions::MANAGE_CHANNELS),
    ];
    for (role_id, allow) in roles {
        if let Some(role_id) = role_id {
            overwrites.push(serenity::PermissionOverwrite {
                allow,
                deny: serenity::Permissions::empty(),
                kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(role_id)),
            });
        }
    }

    overwrites
}

pub struct TicketService {
    store: JsonStore<TicketsFile>,
    next_number: Mutex<u64>,
}

impl TicketService {
    pub fn new(path: PathBuf) -> Self {
        let store = JsonStore::load(path);
        let next_number = store.read(next_ticket_number);
        Self {
            store,
            next_number: Mutex::new(next_number),
        }
    }

    pub fn config(&self, guild_id: serenity::GuildId) -> Option<TicketConfig> {
        self.store
            .read(|file| file.guilds.get(&guild_id.get()).and_then(|g| g.config.clone()))
    }

    pub fn set_config(&self, guild_id: serenity::GuildId, config: TicketConfig) {
        self.store.update(|file| {
            file.guilds.entry(guild_id.get()).or_default().config = Some(config);
        });
    }

    pub fn update_config<R>(
        &self,
        guild_id: serenity::GuildId,
        f: impl FnOnce(&mut TicketConfig) -> R,
    ) -> Option<R> {
        self.store.update(|file| {
            file.guilds
                .get_mut(&guild_id.get())
                .and_then(|guild| guild.config.as_mut())
                .map(f)
        })
    }

    /// Hands out ticket numbers; never returns the same number twice in a
    /// process, even before the record is saved.
    pub fn allocate_number(&self) -> u64 {
        let from_file = self.store.read(next_ticket_number);
        let mut next = self.next_number.lock().unwrap_or_else(PoisonError::into_inner);
        let number = (*next).max(from_file);
        *next = number + 1;
        number
    }

    pub fn open_count(
        &self,
        guild_id: serenity::GuildId,
        creator: serenity::UserId,
        channel_exists: impl Fn(serenity::ChannelId) -> bool,
    ) -> usize {
        self.store.read(|file| {
            file.guilds
                .get(&guild_id.get())
                .map_or(0, |guild| open_ticket_count(guild.tickets.values(), creator, &channel_exists))
        })
    }

    pub fn record(&self, guild_id: serenity::GuildId, record: TicketRecord) {
        self.store.update(|file| {
            file.guilds
                .entry(guild_id.get())
                .or_default()
                .tickets
                .insert(ticket_name(record.number), record);
        });
    }

    pub fn find_by_channel(
        &self,
        guild_id: serenity::GuildId,
        channel_id: serenity::ChannelId,
    ) -> Option<TicketRecord> {
        self.store.read(|file| {
            file.guilds.get(&guild_id.get()).and_then(|guild| {
                guild
                    .tickets
                    .values()
                    .find(|record| record.channel_id == channel_id.get())
                    .cloned()
            })
        })
    }

    /// Marks the ticket of `channel_id` closed. Returns its number.
    pub fn mark_closed(
        &self,
        guild_id: serenity::GuildId,
        channel_id: serenity::ChannelId,
        closed_by: serenity::UserId,
    ) -> Option<u64> {
        self.store.update(|file| {
            let record = file
                .guilds
                .get_mut(&guild_id.get())?
                .tickets
                .values_mut()
                .find(|record| record.channel_id == channel_id.get())?;
            record.status = TicketStatus::Closed;
            record.closed_by = Some(closed_by.get());
            record.closed_at = Some(Utc::now());
            Some(record.number)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TicketConfig {
        TicketConfig {
            channel_id: 1,
            category_id: 2,
            support_role_id: Some(10),
            admin_role_id: Some(11),
            designer_role_id: None,
            welcome_message: "hi".into(),
            max_tickets: 1,
            image_url: None,
            embed_title: "title".into(),
            embed_description: "desc".into(),
            preset: TicketPreset::Custom,
            setup_by: 99,
            setup_at: Utc::now(),
        }
    }

    fn record(number: u64, channel: u64, creator: u64) -> TicketRecord {
        TicketRecord {
            number,
            channel_id: channel,
            creator_id: creator,
            created_at: Utc::now(),
            status: TicketStatus::Open,
            closed_by: None,
            closed_at: None,
        }
    }

    #[test]
    fn numbers_continue_after_the_global_maximum() {
        let mut file = TicketsFile::default();
        assert_eq!(next_ticket_number(&file), 1);

        file.guilds.entry(1).or_default().tickets.insert(ticket_name(4), record(4, 40, 7));
        file.guilds.entry(2).or_default().tickets.insert(ticket_name(9), record(9, 90, 7));
        assert_eq!(next_ticket_number(&file), 10);
        assert_eq!(parse_ticket_number("ticket-12"), Some(12));
        assert_eq!(parse_ticket_number("general"), None);
    }

    #[test]
    fn cap_counts_open_tickets_with_live_channels() {
        let creator = serenity::UserId::new(7);
        let mut closed = record(3, 30, 7);
        closed.status = TicketStatus::Closed;
        let records = [record(1, 10, 7), record(2, 20, 7), closed, record(4, 40, 8)];

        let all_exist = |_: serenity::ChannelId| true;
        assert_eq!(open_ticket_count(&records, creator, all_exist), 2);

        let deleted_20 = |id: serenity::ChannelId| id.get() != 20;
        assert_eq!(open_ticket_count(&records, creator, deleted_20), 1);
    }

    #[test]
    fn closing_frees_a_slot() {
        let dir = tempfile::tempdir().unwrap();
        let service = TicketService::new(dir.path().join("tickets.json"));
        let guild = serenity::GuildId::new(1);
        let creator = serenity::UserId::new(7);

        let number = service.allocate_number();
        service.record(guild, record(number, 50, 7));
        assert_eq!(service.open_count(guild, creator, |_| true), 1);

        assert_eq!(
            service.mark_closed(guild, serenity::ChannelId::new(50), serenity::UserId::new(3)),
            Some(number)
        );
        assert_eq!(service.open_count(guild, creator, |_| true), 0);

        let closed = service.find_by_channel(guild, serenity::ChannelId::new(50)).unwrap();
        assert_eq!(closed.closed_by, Some(3));
        assert!(closed.closed_at.is_some());
    }

    #[test]
    fn a_member_at_the_cap_is_refused_until_a_ticket_goes_away() {
        let dir = tempfile::tempdir().unwrap();
        let service = TicketService::new(dir.path().join("tickets.json"));
        let guild = serenity::GuildId::new(1);
        let creator = serenity::UserId::new(7);
        let max_tickets = 2;

        service.record(guild, record(service.allocate_number(), 50, 7));
        assert!(!at_cap(service.open_count(guild, creator, |_| true), max_tickets));
        service.record(guild, record(service.allocate_number(), 51, 7));
        service.record(guild, record(service.allocate_number(), 60, 8));
        assert!(at_cap(service.open_count(guild, creator, |_| true), max_tickets));

        // A deleted channel no longer counts against the cap.
        let live = |id: serenity::ChannelId| id.get() != 51;
        assert!(!at_cap(service.open_count(guild, creator, live), max_tickets));

        service.mark_closed(guild, serenity::ChannelId::new(50), creator);
        assert!(!at_cap(service.open_count(guild, creator, |_| true), max_tickets));
        service.record(guild, record(service.allocate_number(), 52, 7));
        assert!(at_cap(service.open_count(guild, creator, |_| true), max_tickets));
    }

    #[test]
    fn allocated_numbers_are_unique_and_persisted_ones_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        let guild = serenity::GuildId::new(1);

        let service = TicketService::new(path.clone());
        let first = service.allocate_number();
        let second = service.allocate_number();
        assert_ne!(first, second);
        service.record(guild, record(second, 5, 1));
        drop(service);

        let service = TicketService::new(path);
        assert_eq!(service.allocate_number(), second + 1);
    }

    #[test]
    fn staff_is_manage_channels_or_configured_role() {
        let config = config();
        let none = serenity::Permissions::empty();
        assert!(is_staff(serenity::Permissions::MANAGE_CHANNELS, &[], None));
        assert!(is_staff(none, &[serenity::RoleId::new(11)], Some(&config)));
        assert!(!is_staff(none, &[serenity::RoleId::new(12)], Some(&config)));
        assert!(!is_staff(none, &[serenity::RoleId::new(10)], None));
    }

    #[test]
    fn overwrites_hide_the_channel_from_everyone() {
        let guild = serenity::GuildId::new(500);
        let overwrites = ticket_overwrites(guild, serenity::UserId::new(1), serenity::UserId::new(7), &config());

        let everyone = overwrites
            .iter()
            .find(|o| o.kind == serenity::PermissionOverwriteType::Role(serenity::RoleId::new(500)))
            .unwrap();
        assert!(everyone.deny.view_channel());

        let creator = overwrites
            .iter()
            .find(|o| o.kind == serenity::PermissionOverwriteType::Member(serenity::UserId::new(7)))
            .unwrap();
        assert!(creator.allow.view_channel() && creator.allow.send_messages());

        let admin = overwrites
            .iter()
            .find(|o| o.kind == serenity::PermissionOverwriteType::Role(serenity::RoleId::new(11)))
            .unwrap();
        assert!(admin.allow.manage_channels());
        // support + admin + everyone + creator + bot, designer is unset
        assert_eq!(overwrites.len(), 5);
    }

    #[test]
    fn fix_restores_blank_fields() {
        let mut config = config();
        config.welcome_message = "  ".into();
        config.max_tickets = 0;
        let text = PresetText {
            title: "T".into(),
            description: "D".into(),
            welcome: "W".into(),
        };
        assert_eq!(config.fill_defaults(&text), vec!["welcome_message", "max_tickets"]);
        assert_eq!(config.welcome_message, "W");
        assert_eq!(config.max_tickets, 1);
        assert!(config.fill_defaults(&text).is_empty());
    }
}
