use crate::services::localization::ContextL10nExt;
use crate::{Context, Data, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use tracing::info;

/// `/name description` lines for the commands of one module, subcommands
/// expanded.
pub fn command_lines(commands: &[poise::Command<Data, Error>], category: &str) -> Vec<String> {
    fn walk(command: &poise::Command<Data, Error>, prefix: &str, out: &mut Vec<String>) {
        let name = format!("{prefix}{}", command.name);
        if command.subcommands.is_empty() {
            let description = command.description.as_deref().unwrap_or_default();
            out.push(format!("`/{name}` {description}").trim_end().to_string());
        } else {
            for sub in &command.subcommands {
                walk(sub, &format!("{name} "), out);
            }
        }
    }

    let mut lines = vec![];
    for command in commands
        .iter()
        .filter(|c| c.category.as_deref() == Some(category))
    {
        walk(command, "", &mut lines);
    }
    lines
}

/// List the bot's modules and commands
#[poise::command(slash_command, guild_only)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let l10n = ctx.l10n_user();
    let commands = &ctx.framework().options().commands;

    let mut embed = serenity::CreateEmbed::new()
        .title(l10n.t("help-title", None))
        .description(l10n.t("help-description", None))
        .colour(0x5865f2);

    for definition in ctx.data().module_definitions.iter() {
        let lines = command_lines(commands, definition.id);
        let body = if lines.is_empty() {
            l10n.t(definition.desc_key, None)
        } else {
            format!("{}\n{}", l10n.t(definition.desc_key, None), lines.join("\n"))
        };
        embed = embed.field(l10n.t(definition.name_key, None), body, false);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum SyncScope {
    #[name = "guild"]
    Guild,
    #[name = "global"]
    Global,
}

/// Re-register the slash commands
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn sync(
    ctx: Context<'_>,
    #[description = "Where to register the commands"] scope: Option<SyncScope>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let commands = &ctx.framework().options().commands;
    let scope = scope.unwrap_or(SyncScope::Guild);

    match scope {
        SyncScope::Guild => {
            let Some(guild_id) = ctx.guild_id() else {
                return Ok(());
            };
            poise::builtins::register_in_guild(ctx.http(), commands, guild_id).await?;
            info!("Synced {} command(s) in guild {}", commands.len(), guild_id);
        }
        SyncScope::Global => {
            poise::builtins::register_globally(ctx.http(), commands).await?;
            info!("Synced {} command(s) globally", commands.len());
        }
    }

    let mut args = FluentArgs::new();
    args.set("count", commands.len());
    let key = match scope {
        SyncScope::Guild => "sync-guild-success",
        SyncScope::Global => "sync-global-success",
    };
    ctx.send(
        poise::CreateReply::default()
            .content(ctx.l10n_user().t(key, Some(&args)))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_are_expanded_per_module() {
        let commands = crate::modules::commands();
        let giveaways = command_lines(&commands, "giveaways");
        assert!(giveaways.iter().any(|line| line.starts_with("`/gw create`")));
        assert!(giveaways.iter().any(|line| line.starts_with("`/gw list`")));
        assert!(!giveaways.iter().any(|line| line.starts_with("`/gw`")));

        let general = command_lines(&commands, "general");
        assert!(general.iter().any(|line| line.starts_with("`/help`")));
        assert!(command_lines(&commands, "welcome").is_empty());
    }
}
