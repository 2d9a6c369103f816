use super::reply_ephemeral;
use crate::services::localization::ContextL10nExt;
use crate::services::logger::LogLevel;
use crate::{Context, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use tracing::info;

/// Discord refuses to bulk delete messages older than this.
const BULK_DELETE_MAX_AGE_SECS: i64 = 14 * 24 * 60 * 60;

pub fn bulk_deletable(created_at: i64, now: i64) -> bool {
    now - created_at < BULK_DELETE_MAX_AGE_SECS
}

/// Delete recent messages in this channel
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "Number of messages to delete"]
    #[min = 1]
    #[max = 100]
    amount: u8,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let l10n = ctx.l10n_user();
    let channel_id = ctx.channel_id();

    let now = chrono::Utc::now().timestamp();
    let messages = channel_id
        .messages(ctx.http(), serenity::GetMessages::new().limit(amount.clamp(1, 100)))
        .await?;
    let total = messages.len();
    let ids: Vec<serenity::MessageId> = messages
        .iter()
        .filter(|message| bulk_deletable(message.timestamp.unix_timestamp(), now))
        .map(|message| message.id)
        .collect();

    match ids.as_slice() {
        [] => {}
        [single] => channel_id.delete_message(ctx.http(), *single).await?,
        _ => channel_id.delete_messages(ctx.http(), &ids).await?,
    }
    info!("{} cleared {} message(s) in {}", ctx.author().id, ids.len(), channel_id);

    let mut args = FluentArgs::new();
    args.set("count", ids.len());
    args.set("skipped", total - ids.len());
    let summary = l10n.t("mod-clear-success", Some(&args));
    reply_ephemeral(ctx, summary.clone()).await?;

    ctx.data()
        .logger
        .log_context(
            &ctx,
            LogLevel::Info,
            &ctx.l10n_guild().t("mod-log-clear-title", None),
            &summary,
            vec![],
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_older_than_two_weeks_are_skipped() {
        let now = 2_000_000_000;
        assert!(bulk_deletable(now - 60, now));
        assert!(bulk_deletable(now - BULK_DELETE_MAX_AGE_SECS + 1, now));
        assert!(!bulk_deletable(now - BULK_DELETE_MAX_AGE_SECS, now));
        assert!(!bulk_deletable(now - 30 * 24 * 60 * 60, now));
    }
}
