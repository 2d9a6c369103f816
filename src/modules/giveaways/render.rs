use super::duration_parser::format_duration;
use super::service::Giveaway;
use crate::services::discord::{mention_user, mention_users};
use crate::services::localization::L10nProxy;
use chrono::{DateTime, Utc};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;

const ACTIVE_COLOUR: u32 = 0x5865f2;
const ENDED_COLOUR: u32 = 0x2ecc71;
const EMPTY_COLOUR: u32 = 0xe74c3c;

fn base(giveaway: &Giveaway, title: String, description: String, colour: u32) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(colour);
    if let Some(url) = &giveaway.image_url {
        embed = embed.image(url);
    }
    embed
}

/// Announcement shown while the giveaway runs, with a live end marker.
pub fn active_embed(
    giveaway: &Giveaway,
    l10n: &L10nProxy<'_>,
    entry_emoji: &str,
    now: DateTime<Utc>,
) -> serenity::CreateEmbed {
    let remaining = (giveaway.ends_at - now).max(chrono::Duration::zero());

    let mut args = FluentArgs::new();
    args.set("emoji", entry_emoji);
    args.set("prize", giveaway.prize.as_str());
    args.set("timestamp", giveaway.ends_at.timestamp().to_string());
    args.set("remaining", format_duration(remaining));
    args.set("winners", giveaway.winners);
    args.set("host", mention_user(giveaway.host_id));

    let title_key = if giveaway.fast {
        "gw-embed-title-fast"
    } else {
        "gw-embed-title"
    };

    base(
        giveaway,
        l10n.t(title_key, Some(&args)),
        l10n.t("gw-embed-active", Some(&args)),
        ACTIVE_COLOUR,
    )
    .footer(serenity::CreateEmbedFooter::new(l10n.t("gw-embed-footer", Some(&args))))
    .timestamp(serenity::Timestamp::from(giveaway.ends_at))
}

pub fn ended_embed(
    giveaway: &Giveaway,
    winners: &[serenity::UserId],
    l10n: &L10nProxy<'_>,
    entry_emoji: &str,
) -> serenity::CreateEmbed {
    let mut args = FluentArgs::new();
    args.set("emoji", entry_emoji);
    args.set("prize", giveaway.prize.as_str());
    args.set("winners", mention_users(winners));
    args.set("host", mention_user(giveaway.host_id));

    base(
        giveaway,
        l10n.t("gw-embed-ended-title", Some(&args)),
        l10n.t("gw-embed-ended", Some(&args)),
        ENDED_COLOUR,
    )
}

pub fn no_winner_embed(
    giveaway: &Giveaway,
    l10n: &L10nProxy<'_>,
    entry_emoji: &str,
) -> serenity::CreateEmbed {
    let mut args = FluentArgs::new();
    args.set("emoji", entry_emoji);
    args.set("prize", giveaway.prize.as_str());

    base(
        giveaway,
        l10n.t("gw-embed-empty-title", Some(&args)),
        l10n.t("gw-embed-empty", Some(&args)),
        EMPTY_COLOUR,
    )
}
