use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Process-wide bot settings, read once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the JSON state files.
    pub data_dir: PathBuf,
    /// Audit log channel for moderation and ticket actions.
    pub log_channel_id: Option<u64>,
    pub welcome: Option<WelcomeSettings>,
    pub reaction_roles: Option<ReactionRoleSettings>,
    pub giveaways: GiveawaySettings,
    pub tickets: TicketSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_channel_id: None,
            welcome: None,
            reaction_roles: None,
            giveaways: GiveawaySettings::default(),
            tickets: TicketSettings::default(),
        }
    }
}

impl Settings {
    /// Reads the TOML settings file. A missing file falls back to defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Settings file {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WelcomeSettings {
    pub channel_id: u64,
    /// Role granted to every member on arrival.
    pub member_role_id: Option<u64>,
    pub banner_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionRoleSettings {
    pub gender: PanelSettings,
    pub age: PanelSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelSettings {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(default = "default_panel_colour")]
    pub colour: u32,
    pub options: [RoleOption; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleOption {
    pub emoji: String,
    pub role_id: u64,
}

fn default_panel_colour() -> u32 {
    0x3498db
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GiveawaySettings {
    pub entry_emoji: String,
    pub max_winners: u32,
    pub claim_timeout_secs: u64,
    pub countdown_interval_secs: u64,
}

impl Default for GiveawaySettings {
    fn default() -> Self {
        Self {
            entry_emoji: "🎉".to_string(),
            max_winners: 25,
            claim_timeout_secs: 3600,
            countdown_interval_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketSettings {
    pub close_delay_secs: u64,
    pub max_tickets_limit: u32,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self {
            close_delay_secs: 5,
            max_tickets_limit: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.giveaways.max_winners, 25);
        assert_eq!(settings.giveaways.entry_emoji, "🎉");
        assert_eq!(settings.tickets.close_delay_secs, 5);
        assert!(settings.welcome.is_none());
    }

    #[test]
    fn reaction_role_panels_need_two_options() {
        let ok = r#"
            [reaction_roles.gender]
            title = "Gender"
            description = "Pick one"
            options = [{ emoji = "👕", role_id = 1 }, { emoji = "👗", role_id = 2 }]

            [reaction_roles.age]
            title = "Age"
            description = "Pick one"
            colour = 0xe74c3c
            options = [{ emoji = "⛏", role_id = 3 }, { emoji = "🔞", role_id = 4 }]
        "#;
        let settings: Settings = toml::from_str(ok).unwrap();
        let panels = settings.reaction_roles.unwrap();
        assert_eq!(panels.age.colour, 0xe74c3c);
        assert_eq!(panels.gender.colour, 0x3498db);
        assert_eq!(panels.gender.options[1].role_id, 2);

        let short = ok.replace(r#", { emoji = "👗", role_id = 2 }"#, "");
        assert!(toml::from_str::<Settings>(&short).is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("bot.toml")).unwrap();
        assert!(settings.log_channel_id.is_none());
    }
}
