use crate::services::discord::mention_user;
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![invites()]
}

/// View invite statistics
#[poise::command(slash_command, guild_only, subcommands("stats", "leaderboard"))]
pub async fn invites(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// View invite statistics for a user
#[poise::command(slash_command, guild_only)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let l10n = ctx.l10n_user();
    let tracker = &ctx.data().invites;

    let mut args = FluentArgs::new();
    args.set("user", mention_user(target.id));
    args.set("count", tracker.net_invites(guild_id, target.id));

    let mut description = l10n.t("invites-stats-count", Some(&args));
    description.push('\n');
    match tracker.inviter_of(guild_id, target.id) {
        Some(inviter) => {
            args.set("inviter", mention_user(inviter));
            description.push_str(&l10n.t("invites-stats-invited-by", Some(&args)));
        }
        None => description.push_str(&l10n.t("invites-stats-invited-by-unknown", Some(&args))),
    }

    let embed = serenity::CreateEmbed::new()
        .title(l10n.t("invites-stats-title", None))
        .description(description)
        .thumbnail(target.face())
        .colour(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// View server invite leaderboard
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Number of users to show (default: 10)"]
    #[min = 1]
    #[max = 25]
    limit: Option<u32>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let l10n = ctx.l10n_user();
    let limit = usize::try_from(limit.unwrap_or(10)).unwrap_or(10);
    let rows = ctx.data().invites.leaderboard(guild_id, limit);

    let description = if rows.is_empty() {
        l10n.t("invites-leaderboard-empty", None)
    } else {
        rows.iter()
            .enumerate()
            .map(|(rank, (user_id, count))| {
                let mut args = FluentArgs::new();
                args.set("rank", rank + 1);
                args.set("user", mention_user(*user_id));
                args.set("count", *count);
                l10n.t("invites-leaderboard-line", Some(&args))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut title_args = FluentArgs::new();
    title_args.set("limit", limit);

    let embed = serenity::CreateEmbed::new()
        .title(l10n.t("invites-leaderboard-title", Some(&title_args)))
        .description(description)
        .colour(0xf1c40f);

    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .allowed_mentions(serenity::CreateAllowedMentions::new()),
    )
    .await?;
    Ok(())
}
