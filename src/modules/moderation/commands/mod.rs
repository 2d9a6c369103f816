pub mod ban;
pub mod clear;
pub mod kick;
pub mod mute;
pub mod warn;

pub use ban::*;
pub use clear::*;
pub use kick::*;
pub use mute::*;
pub use warn::*;

use super::hierarchy;
use crate::services::discord::mention_user;
use crate::services::localization::ContextL10nExt;
use crate::services::logger::LogLevel;
use crate::{Context, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;

pub(crate) async fn reply_ephemeral(ctx: Context<'_>, content: String) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Runs the hierarchy check and explains a refusal to the invoker.
/// Returns whether the action may go ahead.
pub(crate) async fn ensure_can_act(ctx: Context<'_>, target: serenity::UserId) -> Result<bool, Error> {
    match hierarchy::check_target(ctx, target).await {
        Ok(()) => Ok(true),
        Err(refusal) => {
            reply_ephemeral(ctx, ctx.l10n_user().t(refusal.key(), None)).await?;
            Ok(false)
        }
    }
}

pub(crate) fn reason_or_default(ctx: Context<'_>, reason: Option<String>) -> String {
    reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| ctx.l10n_guild().t("mod-no-reason", None))
}

/// Writes a moderation action to the audit channel.
pub(crate) async fn audit(
    ctx: Context<'_>,
    title_key: &str,
    target: serenity::UserId,
    reason: &str,
    extra: Vec<(String, String)>,
) -> Result<(), Error> {
    let l10n = ctx.l10n_guild();
    let mut args = FluentArgs::new();
    args.set("user", mention_user(target));
    args.set("moderator", mention_user(ctx.author().id));

    let mut fields = vec![(l10n.t("log-field-reason", None), reason.to_string())];
    fields.extend(extra);

    ctx.data()
        .logger
        .log_context(
            &ctx,
            LogLevel::Audit,
            &l10n.t(title_key, None),
            &l10n.t("mod-log-desc", Some(&args)),
            fields,
        )
        .await
}
