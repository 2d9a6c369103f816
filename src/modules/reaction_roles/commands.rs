use super::state::Slot;
use crate::services::localization::ContextL10nExt;
use crate::services::settings::PanelSettings;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![role()]
}

fn panel_embed(panel: &PanelSettings) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(&panel.title)
        .description(&panel.description)
        .colour(panel.colour);
    if let Some(url) = &panel.image_url {
        embed = embed.image(url);
    }
    embed
}

async fn add_reactions(ctx: Context<'_>, message: &serenity::Message, panel: &PanelSettings) {
    for option in &panel.options {
        let reaction = serenity::ReactionType::Unicode(option.emoji.clone());
        if let Err(e) = message.react(ctx, reaction).await {
            warn!("Failed to add {} to panel {}: {:?}", option.emoji, message.id, e);
        }
    }
}

/// Post the reaction-role panels in this channel
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    default_member_permissions = "MANAGE_ROLES"
)]
pub async fn role(ctx: Context<'_>) -> Result<(), Error> {
    let service = &ctx.data().reaction_roles;
    let (Some(gender), Some(age)) = (service.panel(Slot::Gender), service.panel(Slot::Age)) else {
        ctx.send(
            poise::CreateReply::default()
                .content(ctx.l10n_user().t("role-not-configured", None))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let handle = ctx
        .send(poise::CreateReply::default().embed(panel_embed(gender)))
        .await?;
    let gender_message = handle.message().await?.into_owned();
    add_reactions(ctx, &gender_message, gender).await;
    service.bind(Slot::Gender, gender_message.id);

    let age_message = ctx
        .channel_id()
        .send_message(ctx, serenity::CreateMessage::new().embed(panel_embed(age)))
        .await?;
    add_reactions(ctx, &age_message, age).await;
    service.bind(Slot::Age, age_message.id);

    info!(
        "Reaction-role panels posted in channel {} ({}, {})",
        ctx.channel_id(),
        gender_message.id,
        age_message.id
    );
    Ok(())
}
