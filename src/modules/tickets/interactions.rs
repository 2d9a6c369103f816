use super::store::{at_cap, is_staff, ticket_name, ticket_overwrites, TicketConfig, TicketRecord, TicketStatus};
use crate::services::discord::{is_not_found, mention_user};
use crate::services::localization::L10nProxy;
use crate::services::logger::LogLevel;
use crate::{Data, Error};
use chrono::Utc;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

pub const CREATE_BUTTON: &str = "ticket_create";
pub const CLOSE_BUTTON: &str = "ticket_close";

pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    match interaction.data.custom_id.as_str() {
        CREATE_BUTTON => create_ticket(ctx, interaction, data).await,
        CLOSE_BUTTON => close_from_button(ctx, interaction, data).await,
        other => {
            warn!("Unknown ticket interaction: {}", other);
            Ok(())
        }
    }
}

/// The ticket creator or staff may close a ticket.
pub fn can_close(
    permissions: serenity::Permissions,
    member_roles: &[serenity::RoleId],
    user_id: serenity::UserId,
    config: Option<&TicketConfig>,
    record: &TicketRecord,
) -> bool {
    record.creator_id == user_id.get() || is_staff(permissions, member_roles, config)
}

pub fn close_button(l10n: &L10nProxy<'_>) -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![serenity::CreateButton::new(CLOSE_BUTTON)
        .label(l10n.t("ticket-close-button", None))
        .emoji('🔒')
        .style(serenity::ButtonStyle::Danger)])
}

async fn edit_reply(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    content: String,
) -> Result<(), Error> {
    interaction
        .edit_response(ctx, serenity::EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn category_exists(http: &serenity::Http, category_id: serenity::ChannelId) -> bool {
    match http.get_channel(category_id).await {
        Ok(serenity::Channel::Guild(channel)) => channel.kind == serenity::ChannelType::Category,
        Ok(_) => false,
        Err(e) => {
            if !is_not_found(&e) {
                warn!("Failed to look up ticket category {}: {:?}", category_id, e);
            }
            false
        }
    }
}

async fn create_ticket(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };
    interaction.defer_ephemeral(ctx).await?;

    let l10n = data.l10n.get_proxy(&interaction.locale);
    let creator = interaction.user.id;

    let Some(config) = data.tickets.config(guild_id) else {
        return edit_reply(ctx, interaction, l10n.t("ticket-error-not-configured", None)).await;
    };
    let category_id = serenity::ChannelId::new(config.category_id);
    if !category_exists(&ctx.http, category_id).await {
        return edit_reply(ctx, interaction, l10n.t("ticket-error-category", None)).await;
    }

    let live: HashSet<serenity::ChannelId> = ctx
        .http
        .get_channels(guild_id)
        .await?
        .into_iter()
        .map(|channel| channel.id)
        .collect();
    let open = data
        .tickets
        .open_count(guild_id, creator, |id| live.contains(&id));
    if at_cap(open, config.max_tickets) {
        let mut args = FluentArgs::new();
        args.set("max", config.max_tickets);
        return edit_reply(ctx, interaction, l10n.t("ticket-error-limit", Some(&args))).await;
    }

    let number = data.tickets.allocate_number();
    let name = ticket_name(number);
    let bot_id = ctx.cache.current_user().id;

    let builder = serenity::CreateChannel::new(name.clone())
        .kind(serenity::ChannelType::Text)
        .category(category_id)
        .topic(format!("{} ({})", interaction.user.name, creator))
        .permissions(ticket_overwrites(guild_id, bot_id, creator, &config))
        .audit_log_reason("Ticket opened");
    let channel = guild_id.create_channel(ctx, builder).await?;

    data.tickets.record(
        guild_id,
        TicketRecord {
            number,
            channel_id: channel.id.get(),
            creator_id: creator.get(),
            created_at: Utc::now(),
            status: TicketStatus::Open,
            closed_by: None,
            closed_at: None,
        },
    );
    info!("Opened {} ({}) for {} in guild {}", name, channel.id, creator, guild_id);

    let guild_l10n = data.l10n.get_proxy(&crate::services::localization::guild_locale(ctx, guild_id));
    let mut embed = serenity::CreateEmbed::new()
        .title(config.embed_title.clone())
        .description(config.welcome_message.clone())
        .colour(0x2ecc71)
        .timestamp(serenity::Timestamp::now());
    if let Some(url) = &config.image_url {
        embed = embed.thumbnail(url);
    }

    let staff_pings: Vec<String> = config
        .staff_roles()
        .iter()
        .map(|role| format!("<@&{}>", role.get()))
        .collect();
    let content = format!("{} {}", mention_user(creator), staff_pings.join(" "));

    channel
        .id
        .send_message(
            ctx,
            serenity::CreateMessage::new()
                .content(content.trim_end().to_string())
                .embed(embed)
                .components(vec![close_button(&guild_l10n)]),
        )
        .await?;

    let mut args = FluentArgs::new();
    args.set("channel", format!("<#{}>", channel.id.get()));
    edit_reply(ctx, interaction, l10n.t("ticket-created", Some(&args))).await?;

    let mut fields = FluentArgs::new();
    fields.set("number", number);
    fields.set("user", mention_user(creator));
    data.logger
        .log_action(
            &ctx.http,
            LogLevel::Info,
            &guild_l10n.t("ticket-log-opened-title", None),
            &guild_l10n.t("ticket-log-opened", Some(&fields)),
            vec![],
        )
        .await?;

    Ok(())
}

async fn close_from_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };
    let l10n = data.l10n.get_proxy(&interaction.locale);
    let channel_id = interaction.channel_id;

    let reply = |content: String, ephemeral: bool| {
        serenity::CreateInteractionResponse::Message(
            serenity::CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(ephemeral),
        )
    };

    let Some(record) = data.tickets.find_by_channel(guild_id, channel_id) else {
        interaction
            .create_response(ctx, reply(l10n.t("ticket-error-not-ticket", None), true))
            .await?;
        return Ok(());
    };

    let (permissions, roles) = match &interaction.member {
        Some(member) => (
            member.permissions.unwrap_or(serenity::Permissions::empty()),
            member.roles.clone(),
        ),
        None => (serenity::Permissions::empty(), vec![]),
    };
    let config = data.tickets.config(guild_id);
    if !can_close(permissions, &roles, interaction.user.id, config.as_ref(), &record) {
        interaction
            .create_response(ctx, reply(l10n.t("ticket-error-not-allowed", None), true))
            .await?;
        return Ok(());
    }

    interaction
        .create_response(ctx, reply(closing_notice(data, &l10n, interaction.user.id), false))
        .await?;

    finish_close(ctx, data, guild_id, channel_id, interaction.user.id).await
}

pub fn closing_notice(data: &Data, l10n: &L10nProxy<'_>, closer: serenity::UserId) -> String {
    let mut args = FluentArgs::new();
    args.set("user", mention_user(closer));
    args.set("seconds", data.settings.tickets.close_delay_secs);
    l10n.t("ticket-closing", Some(&args))
}

/// Waits out the close delay, then records the closure and deletes the
/// channel. A channel that is already gone counts as deleted.
pub async fn finish_close(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
    closer: serenity::UserId,
) -> Result<(), Error> {
    tokio::time::sleep(Duration::from_secs(data.settings.tickets.close_delay_secs)).await;

    let number = data.tickets.mark_closed(guild_id, channel_id, closer);

    match channel_id.delete(ctx).await {
        Ok(_) => {}
        Err(e) if is_not_found(&e) => {}
        Err(e) => return Err(e.into()),
    }
    info!("Closed ticket channel {} in guild {} by {}", channel_id, guild_id, closer);

    let l10n = data.l10n.get_proxy(&crate::services::localization::guild_locale(ctx, guild_id));
    let mut args = FluentArgs::new();
    args.set("number", number.map_or_else(|| "?".to_string(), |n| n.to_string()));
    args.set("user", mention_user(closer));
    data.logger
        .log_action(
            &ctx.http,
            LogLevel::Audit,
            &l10n.t("ticket-log-closed-title", None),
            &l10n.t("ticket-log-closed", Some(&args)),
            vec![],
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::tickets::presets::TicketPreset;

    fn record(creator: u64) -> TicketRecord {
        TicketRecord {
            number: 1,
            channel_id: 10,
            creator_id: creator,
            created_at: Utc::now(),
            status: TicketStatus::Open,
            closed_by: None,
            closed_at: None,
        }
    }

    fn config() -> TicketConfig {
        TicketConfig {
            channel_id: 1,
            category_id: 2,
            support_role_id: Some(30),
            admin_role_id: None,
            designer_role_id: None,
            welcome_message: String::new(),
            max_tickets: 1,
            image_url: None,
            embed_title: String::new(),
            embed_description: String::new(),
            preset: TicketPreset::Support,
            setup_by: 1,
            setup_at: Utc::now(),
        }
    }

    #[test]
    fn creator_and_staff_may_close() {
        let none = serenity::Permissions::empty();
        let creator = serenity::UserId::new(7);
        let stranger = serenity::UserId::new(8);
        let config = config();

        assert!(can_close(none, &[], creator, Some(&config), &record(7)));
        assert!(!can_close(none, &[], stranger, Some(&config), &record(7)));
        assert!(can_close(none, &[serenity::RoleId::new(30)], stranger, Some(&config), &record(7)));
        assert!(can_close(
            serenity::Permissions::MANAGE_CHANNELS,
            &[],
            stranger,
            None,
            &record(7)
        ));
    }
}
