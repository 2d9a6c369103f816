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
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Some(user_id) = entrant(ctx, add_reaction, data) {
                if data.giveaways.add_entrant(add_reaction.message_id, user_id) {
                    debug!("{} entered giveaway {}", user_id, add_reaction.message_id);
                }
            }
        }
        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            if let Some(user_id) = entrant(ctx, removed_reaction, data) {
                if data.giveaways.remove_entrant(removed_reaction.message_id, user_id) {
                    debug!("{} left giveaway {}", user_id, removed_reaction.message_id);
                }
            }
        }
        serenity::FullEvent::Message { new_message } => {
            if new_message.guild_id.is_none() && !new_message.author.bot {
                if let Some(giveaway) = data.giveaways.resolve_claim(new_message.author.id) {
                    info!("{} claimed giveaway {}", new_message.author.id, giveaway);
                }
            }
        }
        _ => {}
    }

    Ok(())
}

/// The reacting user when the reaction is an entry on a running giveaway.
fn entrant(
    ctx: &serenity::Context,
    reaction: &serenity::Reaction,
    data: &Data,
) -> Option<serenity::UserId> {
    if !data.giveaways.is_active(reaction.message_id) {
        return None;
    }
    if !reaction.emoji.unicode_eq(&data.giveaways.settings().entry_emoji) {
        return None;
    }
    let user_id = reaction.user_id?;
    let is_bot = reaction
        .member
        .as_ref()
        .map(|member| member.user.bot)
        .unwrap_or(false);
    if is_bot || user_id == ctx.cache.current_user().id {
        return None;
    }
    Some(user_id)
}
