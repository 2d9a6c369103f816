use super::{audit, ensure_can_act, reason_or_default, reply_ephemeral};
use crate::services::discord::{is_not_found, mention_user, parse_id};
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use tracing::info;

/// Ban a user from the server
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[description = "Reason for the ban"] reason: Option<String>,
    #[description = "Days of messages to delete"]
    #[min = 0]
    #[max = 7]
    delete_days: Option<u8>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    if !ensure_can_act(ctx, user.id).await? {
        return Ok(());
    }
    let reason = reason_or_default(ctx, reason);
    let delete_days = delete_days.unwrap_or(0).min(7);

    guild_id
        .ban_with_reason(ctx.http(), user.id, delete_days, &reason)
        .await?;
    info!("{} banned {} from guild {}", ctx.author().id, user.id, guild_id);

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));
    args.set("reason", reason.clone());
    ctx.say(ctx.l10n_user().t("mod-ban-success", Some(&args)))
        .await?;

    let l10n = ctx.l10n_guild();
    audit(
        ctx,
        "mod-log-ban-title",
        user.id,
        &reason,
        vec![(l10n.t("log-field-delete-days", None), delete_days.to_string())],
    )
    .await
}

/// Lift a ban
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "ID of the banned user"] user_id: String,
    #[description = "Reason for the unban"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();
    let Some(user_id) = parse_id(&user_id).map(serenity::UserId::new) else {
        return reply_ephemeral(ctx, l10n.t("mod-error-invalid-id", None)).await;
    };
    let reason = reason_or_default(ctx, reason);

    match guild_id.unban(ctx.http(), user_id).await {
        Ok(()) => {}
        Err(e) if is_not_found(&e) => {
            return reply_ephemeral(ctx, l10n.t("mod-error-not-banned", None)).await;
        }
        Err(e) => return Err(e.into()),
    }
    info!("{} unbanned {} in guild {}", ctx.author().id, user_id, guild_id);

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user_id));
    ctx.say(l10n.t("mod-unban-success", Some(&args))).await?;

    audit(ctx, "mod-log-unban-title", user_id, &reason, vec![]).await
}
