use super::{audit, ensure_can_act, reason_or_default, reply_ephemeral};
use crate::modules::giveaways::duration_parser::{format_duration, parse_duration};
use crate::services::discord::mention_user;
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use chrono::{Duration, Utc};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use tracing::info;

/// Longest timeout Discord accepts.
pub fn max_timeout() -> Duration {
    Duration::days(28)
}

/// Time a member out
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Member to mute"] user: serenity::User,
    #[description = "How long, e.g. 10m, 2h, 1d (max 28d)"] duration: String,
    #[description = "Reason for the mute"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();

    let Some(length) = parse_duration(&duration).filter(|d| *d <= max_timeout()) else {
        return reply_ephemeral(ctx, l10n.t("mod-error-invalid-duration", None)).await;
    };
    if !ensure_can_act(ctx, user.id).await? {
        return Ok(());
    }
    let reason = reason_or_default(ctx, reason);

    let mut member = guild_id.member(ctx.http(), user.id).await?;
    let until = serenity::Timestamp::from(Utc::now() + length);
    member
        .disable_communication_until_datetime(ctx.http(), until)
        .await?;
    info!("{} muted {} in guild {} for {}", ctx.author().id, user.id, guild_id, format_duration(length));

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));
    args.set("duration", format_duration(length));
    args.set("reason", reason.clone());
    ctx.say(l10n.t("mod-mute-success", Some(&args))).await?;

    let duration_field = (ctx.l10n_guild().t("log-field-duration", None), format_duration(length));
    audit(ctx, "mod-log-mute-title", user.id, &reason, vec![duration_field]).await
}

/// Lift a member's timeout
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "Member to unmute"] user: serenity::User,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();

    let mut member = guild_id.member(ctx.http(), user.id).await?;
    let now = Utc::now().timestamp();
    let muted = member
        .communication_disabled_until
        .is_some_and(|until| until.unix_timestamp() > now);
    if !muted {
        let mut args = FluentArgs::new();
        args.set("user", mention_user(user.id));
        return reply_ephemeral(ctx, l10n.t("mod-error-not-muted", Some(&args))).await;
    }
    member.enable_communication(ctx.http()).await?;
    info!("{} unmuted {} in guild {}", ctx.author().id, user.id, guild_id);

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));
    ctx.say(l10n.t("mod-unmute-success", Some(&args))).await?;

    let reason = reason_or_default(ctx, None);
    audit(ctx, "mod-log-unmute-title", user.id, &reason, vec![]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_capped_at_28_days() {
        let within = parse_duration("27d23h").unwrap();
        let over = parse_duration("29d").unwrap();
        assert!(within <= max_timeout());
        assert!(over > max_timeout());
        assert_eq!(parse_duration("28d"), Some(max_timeout()));
    }
}
