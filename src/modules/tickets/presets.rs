use crate::services::localization::L10nProxy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, poise::ChoiceParameter)]
#[serde(rename_all = "snake_case")]
pub enum TicketPreset {
    #[name = "Default"]
    Default,
    #[name = "General support"]
    Support,
    #[name = "Graphic design"]
    Graphism,
    #[name = "Administration"]
    Admin,
    #[name = "Custom"]
    Custom,
}

/// Localized texts a preset contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetText {
    pub title: String,
    pub description: String,
    pub welcome: String,
}

/// Cosmetic fields as given to `/ticket setup`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cosmetics {
    pub title: Option<String>,
    pub description: Option<String>,
    pub welcome: Option<String>,
    pub image_url: Option<String>,
    pub max_tickets: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCosmetics {
    pub title: String,
    pub description: String,
    pub welcome: String,
    pub image_url: Option<String>,
    pub max_tickets: u32,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TicketPreset {
    pub const ALL: [TicketPreset; 5] = [
        TicketPreset::Default,
        TicketPreset::Support,
        TicketPreset::Graphism,
        TicketPreset::Admin,
        TicketPreset::Custom,
    ];

    pub fn id(self) -> &'static str {
        match self {
            TicketPreset::Default => "default",
            TicketPreset::Support => "support",
            TicketPreset::Graphism => "graphism",
            TicketPreset::Admin => "admin",
            TicketPreset::Custom => "custom",
        }
    }

    pub fn image_url(self) -> Option<&'static str> {
        match self {
            TicketPreset::Support => Some("https://i.imgur.com/8tBXd6L.png"),
            TicketPreset::Graphism => Some("https://i.imgur.com/JQ7X8Yq.png"),
            TicketPreset::Admin => Some("https://i.imgur.com/2X8YqJQ.png"),
            TicketPreset::Default | TicketPreset::Custom => None,
        }
    }

    pub fn text(self, l10n: &L10nProxy<'_>) -> PresetText {
        let id = self.id();
        PresetText {
            title: l10n.t(&format!("ticket-preset-{id}-title"), None),
            description: l10n.t(&format!("ticket-preset-{id}-description"), None),
            welcome: l10n.t(&format!("ticket-preset-{id}-welcome"), None),
        }
    }

    /// Fills whatever the user left out from the preset. The `default`
    /// preset raises a cap of 1 to 3.
    pub fn resolve(self, given: Cosmetics, text: PresetText) -> ResolvedCosmetics {
        let max_tickets = match (self, given.max_tickets) {
            (TicketPreset::Default, 1) => 3,
            (_, max) => max,
        };
        ResolvedCosmetics {
            title: non_blank(given.title).unwrap_or(text.title),
            description: non_blank(given.description).unwrap_or(text.description),
            welcome: non_blank(given.welcome).unwrap_or(text.welcome),
            image_url: non_blank(given.image_url).or_else(|| self.image_url().map(str::to_string)),
            max_tickets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> PresetText {
        PresetText {
            title: "T".into(),
            description: "D".into(),
            welcome: "W".into(),
        }
    }

    #[test]
    fn preset_fills_only_missing_fields() {
        let given = Cosmetics {
            title: Some("Mine".into()),
            description: Some("   ".into()),
            welcome: None,
            image_url: None,
            max_tickets: 2,
        };
        let resolved = TicketPreset::Support.resolve(given, text());
        assert_eq!(resolved.title, "Mine");
        assert_eq!(resolved.description, "D");
        assert_eq!(resolved.welcome, "W");
        assert_eq!(resolved.image_url.as_deref(), TicketPreset::Support.image_url());
        assert_eq!(resolved.max_tickets, 2);
    }

    #[test]
    fn default_preset_raises_a_cap_of_one() {
        let given = Cosmetics {
            max_tickets: 1,
            ..Cosmetics::default()
        };
        assert_eq!(TicketPreset::Default.resolve(given.clone(), text()).max_tickets, 3);
        assert_eq!(TicketPreset::Custom.resolve(given, text()).max_tickets, 1);

        let five = Cosmetics {
            max_tickets: 5,
            ..Cosmetics::default()
        };
        assert_eq!(TicketPreset::Default.resolve(five, text()).max_tickets, 5);
    }

    #[test]
    fn custom_preset_has_no_image() {
        let resolved = TicketPreset::Custom.resolve(Cosmetics::default(), text());
        assert!(resolved.image_url.is_none());
    }

    #[test]
    fn preset_ids_round_trip_through_serde() {
        for preset in TicketPreset::ALL {
            let json = serde_json::to_string(&preset).unwrap();
            assert_eq!(json, format!("\"{}\"", preset.id()));
        }
    }
}
