use anyhow::Context as _;
use clap::Parser as _;
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod modules;
mod services;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Publish commands. If no guild ID is provided, publish globally.
    #[arg(long, num_args = 0..)]
    publish: Option<Vec<u64>>,

    /// Clear all commands instead of publishing them.
    #[arg(long)]
    clear: bool,

    /// Path to the TOML settings file.
    #[arg(long, default_value = "bot.toml")]
    config: PathBuf,

    /// Directory containing the Fluent locale folders.
    #[arg(long, default_value = "locales")]
    locales: PathBuf,
}

// Custom user data passed to all command functions
#[derive(Clone)]
pub struct Data {
    pub settings: Arc<services::settings::Settings>,
    pub l10n: Arc<services::localization::LocalizationManager>,
    pub logger: Arc<services::logger::LoggerService>,
    pub giveaways: Arc<modules::giveaways::service::GiveawayService>,
    pub invites: Arc<modules::invite_tracking::tracking::InviteTracker>,
    pub reaction_roles: Arc<modules::reaction_roles::state::ReactionRoleService>,
    pub tickets: Arc<modules::tickets::store::TicketService>,
    pub warnings: Arc<modules::moderation::warnings::WarningService>,
    pub module_definitions: Arc<Vec<modules::ModuleDefinition>>,
    pub event_handlers: Arc<Vec<(&'static str, modules::EventHandler)>>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

impl Data {
    fn new(settings: services::settings::Settings, locales: &std::path::Path) -> Self {
        let settings = Arc::new(settings);
        let l10n = Arc::new(services::localization::LocalizationManager::new(locales));

        Self {
            logger: Arc::new(services::logger::LoggerService::new(settings.log_channel_id)),
            giveaways: Arc::new(modules::giveaways::service::GiveawayService::new(
                settings.giveaways.clone(),
                l10n.clone(),
            )),
            invites: Arc::new(modules::invite_tracking::tracking::InviteTracker::new(
                settings.data_file("invite_stats.json"),
            )),
            reaction_roles: Arc::new(modules::reaction_roles::state::ReactionRoleService::new(
                settings.reaction_roles.clone(),
                settings.data_file("reaction_roles.json"),
            )),
            tickets: Arc::new(modules::tickets::store::TicketService::new(
                settings.data_file("tickets.json"),
            )),
            warnings: Arc::new(modules::moderation::warnings::WarningService::new(
                settings.data_file("warnings.json"),
            )),
            module_definitions: Arc::new(modules::definitions()),
            event_handlers: Arc::new(modules::event_handlers()),
            settings,
            l10n,
        }
    }
}

/// Reads the bot token from the environment, falling back to `token.txt`.
fn load_token() -> anyhow::Result<String> {
    if let Ok(token) = std::env::var("DISCORD_TOKEN") {
        info!("Using token from DISCORD_TOKEN");
        return Ok(token);
    }

    let token = std::fs::read_to_string("token.txt")
        .context("DISCORD_TOKEN is not set and token.txt could not be read")?;
    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("token.txt is empty");
    }
    info!("Using token from token.txt");
    Ok(token)
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command /{}: {:?}", ctx.command().qualified_name, error);
            let l10n = ctx.data().l10n.get_proxy(ctx.locale().unwrap_or(
                services::localization::FALLBACK_LOCALE,
            ));
            let reply = poise::CreateReply::default()
                .content(l10n.t("error-generic", None))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to report command error: {:?}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {:?}", e);
            }
        }
    }
}

async fn publish_commands(
    token: &str,
    guild_ids: Vec<u64>,
    clear: bool,
    commands: &[poise::Command<Data, Error>],
) -> anyhow::Result<()> {
    let http = serenity::HttpBuilder::new(token).build();
    let bot_user = http
        .get_current_user()
        .await
        .context("Failed to fetch bot user info")?;
    let application_id = bot_user.id;

    info!("Fetched Application ID: {}", application_id);

    let http = Arc::new(
        serenity::HttpBuilder::new(token)
            .application_id(serenity::ApplicationId::new(application_id.get()))
            .build(),
    );

    let empty_commands: Vec<poise::Command<Data, Error>> = vec![];
    let commands = if clear { &empty_commands[..] } else { commands };

    if guild_ids.is_empty() {
        if clear {
            info!("Clearing commands globally...");
        } else {
            info!("Registering commands globally...");
        }

        if let Err(e) = poise::builtins::register_globally(&http, commands).await {
            error!("Failed to register commands globally: {}", e);
        } else {
            info!("Global command operation successful");
        }
    } else {
        for guild_id in guild_ids {
            if clear {
                info!("Clearing commands in guild {}...", guild_id);
            } else {
                info!("Registering commands in guild {}...", guild_id);
            }

            if let Err(e) =
                poise::builtins::register_in_guild(&http, commands, serenity::GuildId::new(guild_id))
                    .await
            {
                error!("Failed to register commands in guild {}: {}", guild_id, e);
            } else {
                info!("Guild command operation successful for guild {}", guild_id);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting guildkeeper...");

    let settings = services::settings::Settings::load(&args.config)
        .context("Failed to load settings")?;
    let token = load_token()?;

    let commands = modules::commands();

    // Handle command registration if requested
    if let Some(publish_args) = args.publish {
        publish_commands(&token, publish_args, args.clear, &commands).await?;
        return Ok(());
    }

    let data = Data::new(settings, &args.locales);

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_INVITES
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            event_handler: |ctx, event, framework, data| {
                Box::pin(services::event_manager::dispatch(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |_ctx, _ready, _framework| Box::pin(async move { Ok(data) }))
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .context("Failed to create client")?;

    info!("Bot is ready!");
    client.start_autosharded().await.context("Client error")?;

    Ok(())
}
