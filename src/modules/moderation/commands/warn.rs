use super::{audit, reason_or_default, reply_ephemeral};
use crate::modules::moderation::warnings::Warning;
use crate::services::discord::mention_user;
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use chrono::Utc;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;

const SHOWN_WARNINGS: usize = 5;

/// Warn a member
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Reason for the warning"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    if user.bot || user.id == ctx.author().id {
        return reply_ephemeral(ctx, ctx.l10n_user().t("mod-error-self", None)).await;
    }
    let reason = reason_or_default(ctx, reason);

    let total = ctx.data().warnings.add(
        guild_id,
        user.id,
        Warning {
            reason: reason.clone(),
            moderator_id: ctx.author().id.get(),
            issued_at: Utc::now(),
        },
    );

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));
    args.set("reason", reason.clone());
    args.set("count", total);
    ctx.say(ctx.l10n_user().t("mod-warn-success", Some(&args)))
        .await?;

    let count_field = (ctx.l10n_guild().t("log-field-warnings", None), total.to_string());
    audit(ctx, "mod-log-warn-title", user.id, &reason, vec![count_field]).await
}

/// Show a member's latest warnings
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();
    let (recent, total) = ctx.data().warnings.recent(guild_id, user.id, SHOWN_WARNINGS);

    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));
    args.set("count", total);

    if recent.is_empty() {
        return reply_ephemeral(ctx, l10n.t("mod-warnings-empty", Some(&args))).await;
    }

    let lines: Vec<String> = recent
        .iter()
        .map(|warning| {
            let mut line = FluentArgs::new();
            line.set("timestamp", warning.issued_at.timestamp().to_string());
            line.set("moderator", mention_user(serenity::UserId::new(warning.moderator_id)));
            line.set("reason", warning.reason.clone());
            l10n.t("mod-warnings-line", Some(&line))
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title(l10n.t("mod-warnings-title", Some(&args)))
        .description(lines.join("\n"))
        .colour(0xf1c40f);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Remove a member's latest warning
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn unwarn(
    ctx: Context<'_>,
    #[description = "Member whose latest warning is removed"] user: serenity::User,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();
    let mut args = FluentArgs::new();
    args.set("user", mention_user(user.id));

    let Some(removed) = ctx.data().warnings.remove_last(guild_id, user.id) else {
        return reply_ephemeral(ctx, l10n.t("mod-warnings-empty", Some(&args))).await;
    };

    args.set("reason", removed.reason.clone());
    ctx.say(l10n.t("mod-unwarn-success", Some(&args))).await?;

    audit(ctx, "mod-log-unwarn-title", user.id, &removed.reason, vec![]).await
}
