use super::duration_parser::{format_duration, parse_duration};
use super::render;
use super::service::Giveaway;
use crate::services::discord::{mention_users, parse_id};
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use chrono::Utc;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![gw()]
}

/// Manage giveaways
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "MANAGE_GUILD",
    subcommands("create", "fast", "end", "edit", "start", "strat", "list")
)]
pub async fn gw(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn reply_ephemeral(ctx: Context<'_>, content: String) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Validates the winner count against the configured maximum, replying on
/// failure.
async fn check_winners(ctx: Context<'_>, winners: u32) -> Result<bool, Error> {
    let max = ctx.data().giveaways.settings().max_winners;
    if (1..=max).contains(&winners) {
        return Ok(true);
    }
    let mut args = FluentArgs::new();
    args.set("max", max);
    reply_ephemeral(ctx, ctx.l10n_user().t("gw-error-winners", Some(&args))).await?;
    Ok(false)
}

/// Resolves which giveaway a command acts on: the explicit message id, or
/// the most recent one running in the invoking channel.
async fn resolve_target(
    ctx: Context<'_>,
    message_id: Option<String>,
) -> Result<Option<serenity::MessageId>, Error> {
    let giveaways = &ctx.data().giveaways;
    let target = match message_id {
        Some(raw) => parse_id(&raw)
            .map(serenity::MessageId::new)
            .filter(|id| giveaways.get(*id).is_some_and(|g| Some(g.guild_id) == ctx.guild_id())),
        None => giveaways.latest_in_channel(ctx.channel_id()),
    };

    if target.is_none() {
        reply_ephemeral(ctx, ctx.l10n_user().t("gw-error-not-found", None)).await?;
    }
    Ok(target)
}

async fn launch(
    ctx: Context<'_>,
    prize: String,
    duration: String,
    winners: u32,
    image: Option<String>,
    fast: bool,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let now = Utc::now();
    let Some(ends_at) = parse_duration(&duration).and_then(|length| now.checked_add_signed(length)) else {
        reply_ephemeral(ctx, ctx.l10n_user().t("gw-error-duration", None)).await?;
        return Ok(());
    };
    if !check_winners(ctx, winners).await? {
        return Ok(());
    }

    let data = ctx.data();
    let giveaway = Giveaway {
        guild_id,
        channel_id: ctx.channel_id(),
        host_id: ctx.author().id,
        prize,
        created_at: now,
        ends_at,
        winners,
        entrants: HashSet::new(),
        preferred: HashSet::new(),
        forced_winners: None,
        fast,
        image_url: image,
        locale: ctx.l10n_guild().locale().to_string(),
        render_lock: Arc::default(),
    };

    let embed = {
        let l10n = data.l10n.get_proxy(&giveaway.locale);
        render::active_embed(&giveaway, &l10n, &data.giveaways.settings().entry_emoji, now)
    };
    let handle = ctx.send(poise::CreateReply::default().embed(embed)).await?;
    let message = handle.message().await?;
    let message_id = message.id;

    if let Err(e) = message
        .react(ctx.http(), data.giveaways.entry_reaction())
        .await
    {
        warn!("Failed to add entry reaction to giveaway {}: {:?}", message_id, e);
    }

    info!(
        "Giveaway {} started in guild {} by {} for {}",
        message_id,
        guild_id,
        ctx.author().id,
        format_duration(ends_at - now)
    );

    let http = Arc::clone(&ctx.serenity_context().http);
    data.giveaways.insert(message_id, giveaway);
    data.giveaways.schedule(Arc::clone(&http), message_id);
    data.giveaways.spawn_countdown(http, message_id);

    Ok(())
}

/// Start a giveaway
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn create(
    ctx: Context<'_>,
    #[description = "What the winners get"] prize: String,
    #[description = "How long it runs, e.g. 1d2h30m"] duration: String,
    #[description = "Number of winners"]
    #[min = 1]
    winners: u32,
    #[description = "Image shown in the announcement"] image: Option<String>,
) -> Result<(), Error> {
    launch(ctx, prize, duration, winners, image, false).await
}

/// Start a giveaway that winners must claim by direct message
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn fast(
    ctx: Context<'_>,
    #[description = "What the winners get"] prize: String,
    #[description = "How long it runs, e.g. 10m"] duration: String,
    #[description = "Number of winners"]
    #[min = 1]
    winners: u32,
    #[description = "Image shown in the announcement"] image: Option<String>,
) -> Result<(), Error> {
    launch(ctx, prize, duration, winners, image, true).await
}

/// End a giveaway now
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn end(
    ctx: Context<'_>,
    #[description = "Announcement message id (defaults to the latest in this channel)"]
    message_id: Option<String>,
) -> Result<(), Error> {
    let Some(target) = resolve_target(ctx, message_id).await? else {
        return Ok(());
    };

    let giveaways = &ctx.data().giveaways;
    giveaways.update(target, |giveaway| giveaway.ends_at = Utc::now());
    giveaways.schedule(Arc::clone(&ctx.serenity_context().http), target);

    reply_ephemeral(ctx, ctx.l10n_user().t("gw-end-success", None)).await
}

/// Change a running giveaway
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn edit(
    ctx: Context<'_>,
    #[description = "New prize"] prize: Option<String>,
    #[description = "New duration, counted from now"] duration: Option<String>,
    #[description = "New number of winners"]
    #[min = 1]
    winners: Option<u32>,
    #[description = "New image URL"] image: Option<String>,
    #[description = "Announcement message id (defaults to the latest in this channel)"]
    message_id: Option<String>,
) -> Result<(), Error> {
    let l10n = ctx.l10n_user();
    if prize.is_none() && duration.is_none() && winners.is_none() && image.is_none() {
        return reply_ephemeral(ctx, l10n.t("gw-edit-nothing", None)).await;
    }

    let ends_at = match duration.as_deref().map(|raw| {
        parse_duration(raw).and_then(|length| Utc::now().checked_add_signed(length))
    }) {
        Some(None) => return reply_ephemeral(ctx, l10n.t("gw-error-duration", None)).await,
        Some(Some(ends_at)) => Some(ends_at),
        None => None,
    };
    if let Some(count) = winners {
        if !check_winners(ctx, count).await? {
            return Ok(());
        }
    }
    let Some(target) = resolve_target(ctx, message_id).await? else {
        return Ok(());
    };

    let giveaways = &ctx.data().giveaways;
    let updated = giveaways.update(target, |giveaway| {
        if let Some(prize) = prize {
            giveaway.prize = prize;
        }
        if let Some(ends_at) = ends_at {
            giveaway.ends_at = ends_at;
        }
        if let Some(count) = winners {
            giveaway.winners = count;
        }
        if let Some(url) = image {
            giveaway.image_url = Some(url);
        }
    });
    if updated.is_none() {
        return reply_ephemeral(ctx, l10n.t("gw-error-not-found", None)).await;
    }

    let http = Arc::clone(&ctx.serenity_context().http);
    if ends_at.is_some() {
        giveaways.schedule(Arc::clone(&http), target);
    }
    if let Err(e) = giveaways.refresh(&http, target).await {
        warn!("Failed to re-render giveaway {} after edit: {:?}", target, e);
    }

    info!("Giveaway {} edited by {}", target, ctx.author().id);
    reply_ephemeral(ctx, l10n.t("gw-edit-success", None)).await
}

fn collect_users(
    first: serenity::UserId,
    rest: [Option<serenity::UserId>; 4],
) -> Vec<serenity::UserId> {
    let mut seen = HashSet::new();
    std::iter::once(first)
        .chain(rest.into_iter().flatten())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Pick the winners yourself and end the giveaway
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Winner"] user1: serenity::User,
    #[description = "Winner"] user2: Option<serenity::User>,
    #[description = "Winner"] user3: Option<serenity::User>,
    #[description = "Winner"] user4: Option<serenity::User>,
    #[description = "Winner"] user5: Option<serenity::User>,
    #[description = "Announcement message id (defaults to the latest in this channel)"]
    message_id: Option<String>,
) -> Result<(), Error> {
    let Some(target) = resolve_target(ctx, message_id).await? else {
        return Ok(());
    };
    let chosen = collect_users(
        user1.id,
        [user2, user3, user4, user5].map(|user| user.map(|u| u.id)),
    );

    let giveaways = &ctx.data().giveaways;
    giveaways.update(target, |giveaway| {
        giveaway.entrants = chosen.iter().copied().collect();
        giveaway.forced_winners = Some(chosen.clone());
        giveaway.ends_at = Utc::now();
    });
    giveaways.schedule(Arc::clone(&ctx.serenity_context().http), target);

    info!("Giveaway {} ended with hand-picked winners by {}", target, ctx.author().id);

    let mut args = FluentArgs::new();
    args.set("winners", mention_users(&chosen));
    reply_ephemeral(ctx, ctx.l10n_user().t("gw-start-success", Some(&args))).await
}

/// Quietly favour some entrants in the draw
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn strat(
    ctx: Context<'_>,
    #[description = "Favoured entrant"] user1: serenity::User,
    #[description = "Favoured entrant"] user2: Option<serenity::User>,
    #[description = "Favoured entrant"] user3: Option<serenity::User>,
    #[description = "Favoured entrant"] user4: Option<serenity::User>,
    #[description = "Favoured entrant"] user5: Option<serenity::User>,
    #[description = "Announcement message id (defaults to the latest in this channel)"]
    message_id: Option<String>,
) -> Result<(), Error> {
    let Some(target) = resolve_target(ctx, message_id).await? else {
        return Ok(());
    };
    let chosen = collect_users(
        user1.id,
        [user2, user3, user4, user5].map(|user| user.map(|u| u.id)),
    );
    let count = chosen.len();

    if !ctx.data().giveaways.set_preferred(target, chosen) {
        return reply_ephemeral(ctx, ctx.l10n_user().t("gw-error-not-found", None)).await;
    }

    let mut args = FluentArgs::new();
    args.set("count", count);
    reply_ephemeral(ctx, ctx.l10n_user().t("gw-strat-success", Some(&args))).await
}

/// List the giveaways running in this server
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();
    let running = ctx.data().giveaways.list_guild(guild_id);

    if running.is_empty() {
        return reply_ephemeral(ctx, l10n.t("gw-list-empty", None)).await;
    }

    let lines: Vec<String> = running
        .iter()
        .map(|(message_id, giveaway)| {
            let mut args = FluentArgs::new();
            args.set("prize", giveaway.prize.as_str());
            args.set("timestamp", giveaway.ends_at.timestamp().to_string());
            args.set("entrants", giveaway.entrants.len());
            args.set("winners", giveaway.winners);
            args.set(
                "link",
                format!(
                    "https://discord.com/channels/{}/{}/{}",
                    guild_id.get(),
                    giveaway.channel_id.get(),
                    message_id.get()
                ),
            );
            l10n.t("gw-list-line", Some(&args))
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title(l10n.t("gw-list-title", None))
        .description(lines.join("\n"))
        .colour(0x5865f2);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> serenity::UserId {
        serenity::UserId::new(id)
    }

    #[test]
    fn collected_users_are_deduplicated_in_order() {
        let ids = collect_users(user(3), [Some(user(1)), None, Some(user(3)), Some(user(2))]);
        assert_eq!(
            ids,
            vec![
                serenity::UserId::new(3),
                serenity::UserId::new(1),
                serenity::UserId::new(2)
            ]
        );
    }
}
