use super::stats::Credit;
use super::tracking::JoinSource;
use crate::modules::welcome;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move { handle_event(ctx, event, data).await })
}

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildCreate { guild, .. } => {
            data.invites.refresh(&ctx.http, guild.id).await;
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            data.invites.forget(incomplete.id);
        }
        serenity::FullEvent::InviteCreate { data: invite } => {
            if let Some(guild_id) = invite.guild_id {
                debug!("Invite {} created in guild {}", invite.code, guild_id);
                data.invites.refresh(&ctx.http, guild_id).await;
            }
        }
        serenity::FullEvent::InviteDelete { data: invite } => {
            if let Some(guild_id) = invite.guild_id {
                debug!("Invite {} deleted in guild {}", invite.code, guild_id);
                data.invites.refresh(&ctx.http, guild_id).await;
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            handle_member_join(ctx, new_member, data).await?;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if let Some(inviter) = data.invites.record_leave(*guild_id, user.id) {
                info!(
                    "Member {} left guild {}, debited inviter {}",
                    user.id, guild_id, inviter
                );
            }
        }
        _ => {}
    }

    Ok(())
}

async fn handle_member_join(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    let guild_id = member.guild_id;
    let tracker = &data.invites;

    let source = {
        let lock = tracker.join_lock(guild_id);
        let _guard = lock.lock().await;

        let before = tracker.snapshot(guild_id).unwrap_or_default();
        match tracker.refresh(&ctx.http, guild_id).await {
            Some(after) => tracker.attribute(&ctx.http, guild_id, &before, &after).await,
            None => JoinSource::Unknown,
        }
    };

    match &source {
        JoinSource::Invite {
            code,
            inviter_id: Some(inviter),
        } => {
            let credit = tracker.record_join(guild_id, member.user.id, *inviter);
            info!(
                "Member {} joined guild {} with invite {} from {} ({:?})",
                member.user.id, guild_id, code, inviter, credit
            );
            if let Credit::Changed { previous } = credit {
                debug!("Attribution of {} moved from {} to {}", member.user.id, previous, inviter);
            }
        }
        JoinSource::Invite { code, inviter_id: None } => {
            info!(
                "Member {} joined guild {} with invite {} that has no inviter",
                member.user.id, guild_id, code
            );
        }
        JoinSource::Vanity { code } => {
            info!("Member {} joined guild {} through vanity URL {}", member.user.id, guild_id, code);
        }
        JoinSource::Unknown => {
            info!("Member {} joined guild {} through an unknown invite", member.user.id, guild_id);
        }
    }

    welcome::events::greet(ctx, data, member, &source).await
}
