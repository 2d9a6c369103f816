use crate::Error;
use crate::services::localization::ContextL10nExt;
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Info,
    Audit,
}

impl LogLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            LogLevel::Info => "ℹ️",
            LogLevel::Audit => "📝",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            LogLevel::Info => 0x3498db,  // Blue
            LogLevel::Audit => 0x95a5a6, // Gray
        }
    }
}

/// Posts audit entries to the configured log channel.
pub struct LoggerService {
    channel_id: Option<serenity::ChannelId>,
}

impl LoggerService {
    pub fn new(channel_id: Option<u64>) -> Self {
        Self {
            channel_id: channel_id.map(serenity::ChannelId::new),
        }
    }

    /// Logs a structured message to the audit channel. Does nothing when no
    /// channel is configured.
    pub async fn log_action(
        &self,
        http: &serenity::Http,
        level: LogLevel,
        title: &str,
        desc: &str,
        fields: Vec<(String, String)>,
    ) -> Result<(), Error> {
        let Some(channel_id) = self.channel_id else {
            return Ok(());
        };

        let mut embed = serenity::CreateEmbed::new()
            .title(format!("{} {}", level.icon(), title))
            .description(desc)
            .colour(level.color())
            .timestamp(serenity::Timestamp::now());

        for (name, value) in fields {
            embed = embed.field(name, value, true);
        }

        channel_id
            .send_message(
                http,
                serenity::CreateMessage::new()
                    .embed(embed)
                    .allowed_mentions(serenity::CreateAllowedMentions::new()),
            )
            .await?;

        Ok(())
    }

    /// Helper to log an event from a command context
    pub async fn log_context(
        &self,
        ctx: &crate::Context<'_>,
        level: LogLevel,
        title: &str,
        desc: &str,
        additional_fields: Vec<(String, String)>,
    ) -> Result<(), Error> {
        let l10n = ctx.l10n_guild();
        let mut fields = vec![
            (
                l10n.t("log-field-moderator", None),
                format!("<@{}>", ctx.author().id.get()),
            ),
            (
                l10n.t("log-field-channel", None),
                format!("<#{}>", ctx.channel_id().get()),
            ),
        ];

        fields.extend(additional_fields);

        self.log_action(ctx.http(), level, title, desc, fields).await
    }
}
