use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

/// Framework-level event hook: core handling first, then every module
/// handler in its own task.
pub async fn dispatch(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    // 1. Core / Service handling
    match event {
        serenity::FullEvent::Ready { data_about_bot, .. } => {
            info!(
                "Logged in as {} ({}) in {} guild(s)",
                data_about_bot.user.name,
                data_about_bot.user.id,
                data_about_bot.guilds.len()
            );
            for guild in &data_about_bot.guilds {
                register_guild_commands(ctx, framework, guild.id).await;
            }
        }
        serenity::FullEvent::GuildCreate { guild, is_new, .. } => {
            if is_new.unwrap_or(false) {
                info!("Joined new guild: {} ({})", guild.name, guild.id);
                register_guild_commands(ctx, framework, guild.id).await;
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            info!("Left guild: {}", incomplete.id);
        }
        serenity::FullEvent::InteractionCreate { interaction, .. } => {
            handle_interactions(ctx, interaction, data);
        }
        _ => {}
    }

    // 2. Systematic Module Dispatch
    // The event is cloned once into an Arc so every spawned task can share it.
    let event_arc = Arc::new(event.clone());

    for (module_id, handler) in data.event_handlers.iter().copied() {
        let ctx = ctx.clone();
        let event_arc = event_arc.clone();
        let data = data.clone();

        tokio::spawn(async move {
            if let Err(e) = handler(&ctx, &event_arc, &data).await {
                error!("Error in event handler for module {}: {:?}", module_id, e);
            }
        });
    }

    Ok(())
}

async fn register_guild_commands(
    ctx: &serenity::Context,
    framework: poise::FrameworkContext<'_, Data, Error>,
    guild_id: serenity::GuildId,
) {
    let commands = &framework.options().commands;
    match poise::builtins::register_in_guild(ctx, commands, guild_id).await {
        Ok(()) => info!("Registered {} commands in guild {}", commands.len(), guild_id),
        Err(e) => error!("Failed to register commands in guild {}: {:?}", guild_id, e),
    }
}

fn handle_interactions(ctx: &serenity::Context, interaction: &serenity::Interaction, data: &Data) {
    if let serenity::Interaction::Component(component_interaction) = interaction {
        let custom_id = &component_interaction.data.custom_id;
        if !custom_id.starts_with("ticket_") {
            return;
        }

        let data = data.clone();
        let ctx = ctx.clone();
        let component_interaction = component_interaction.clone();

        tokio::spawn(async move {
            if let Err(e) = crate::modules::tickets::interactions::handle_interaction(
                &ctx,
                &component_interaction,
                &data,
            )
            .await
            {
                error!("Error handling ticket interaction: {:?}", e);
            }
        });
    }
}
