use super::{audit, ensure_can_act, reason_or_default};
use crate::services::discord::mention_user;
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use tracing::info;

/// Kick a member from the server
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: serenity::User,
    #[description = "Reason for the kick"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    if !ensure_can_act(ctx, user.id).await? {
        return Ok(());
    }
    let reason = reason_or_default(ctx, reason);

    guild_id
        .kick_with_reason(ctx.http(), user.id, &reason)
        .await?;
    info!("{} kicked {} from guild {}", ctx.author().id, user.id, guild_id);

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));
    args.set("reason", reason.clone());
    ctx.say(ctx.l10n_user().t("mod-kick-success", Some(&args)))
        .await?;

    audit(ctx, "mod-log-kick-title", user.id, &reason, vec![]).await
}
