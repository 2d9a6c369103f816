use super::state::{plan_role_change, RoleChange};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        match event {
            serenity::FullEvent::ReactionAdd { add_reaction } => {
                apply(ctx, add_reaction, data, true).await
            }
            serenity::FullEvent::ReactionRemove { removed_reaction } => {
                apply(ctx, removed_reaction, data, false).await
            }
            _ => Ok(()),
        }
    })
}

async fn apply(
    ctx: &serenity::Context,
    reaction: &serenity::Reaction,
    data: &Data,
    grant: bool,
) -> Result<(), Error> {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return Ok(());
    };
    let Some(role_id) = data
        .reaction_roles
        .resolve(reaction.message_id, &reaction.emoji)
    else {
        return Ok(());
    };
    if user_id == ctx.cache.current_user().id {
        return Ok(());
    }

    let roles = match &reaction.member {
        Some(member) => member.roles.clone(),
        None => ctx.http.get_member(guild_id, user_id).await?.roles,
    };

    match plan_role_change(&roles, role_id, grant) {
        Some(RoleChange::Grant) => {
            ctx.http
                .add_member_role(guild_id, user_id, role_id, Some("Reaction role"))
                .await?;
            info!("Granted role {} to {} in guild {}", role_id, user_id, guild_id);
        }
        Some(RoleChange::Revoke) => {
            ctx.http
                .remove_member_role(guild_id, user_id, role_id, Some("Reaction role"))
                .await?;
            info!("Revoked role {} from {} in guild {}", role_id, user_id, guild_id);
        }
        None => debug!("Role {} of {} already up to date", role_id, user_id),
    }

    Ok(())
}
