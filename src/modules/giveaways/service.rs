use super::draw::draw_winners;
use super::duration_parser::format_duration;
use super::render;
use crate::services::discord::{is_not_found, mention_user, mention_users};
use crate::services::localization::LocalizationManager;
use crate::services::settings::GiveawaySettings;
use crate::Error;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// A running giveaway. The announcement message id is the key it is stored
/// under in [`GiveawayService`].
#[derive(Debug, Clone)]
pub struct Giveaway {
    pub guild_id: serenity::GuildId,
    pub channel_id: serenity::ChannelId,
    pub host_id: serenity::UserId,
    pub prize: String,
    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub winners: u32,
    pub entrants: HashSet<serenity::UserId>,
    pub preferred: HashSet<serenity::UserId>,
    /// Set by `/gw start`: these users win and no draw happens.
    pub forced_winners: Option<Vec<serenity::UserId>>,
    pub fast: bool,
    pub image_url: Option<String>,
    /// Guild locale captured at creation, used for every later render.
    pub locale: String,
    /// Serializes edits of the announcement message.
    pub render_lock: Arc<tokio::sync::Mutex<()>>,
}

struct PendingClaim {
    giveaway: serenity::MessageId,
    winners: HashSet<serenity::UserId>,
    tx: oneshot::Sender<serenity::UserId>,
}

pub struct GiveawayService {
    settings: GiveawaySettings,
    l10n: Arc<LocalizationManager>,
    active: DashMap<serenity::MessageId, Giveaway>,
    timers: DashMap<serenity::MessageId, AbortHandle>,
    claims: Mutex<Vec<PendingClaim>>,
}

impl GiveawayService {
    pub fn new(settings: GiveawaySettings, l10n: Arc<LocalizationManager>) -> Self {
        Self {
            settings,
            l10n,
            active: DashMap::new(),
            timers: DashMap::new(),
            claims: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &GiveawaySettings {
        &self.settings
    }

    pub fn entry_reaction(&self) -> serenity::ReactionType {
        serenity::ReactionType::Unicode(self.settings.entry_emoji.clone())
    }

    pub fn insert(&self, message_id: serenity::MessageId, giveaway: Giveaway) {
        self.active.insert(message_id, giveaway);
    }

    pub fn get(&self, message_id: serenity::MessageId) -> Option<Giveaway> {
        self.active.get(&message_id).map(|entry| entry.clone())
    }

    pub fn is_active(&self, message_id: serenity::MessageId) -> bool {
        self.active.contains_key(&message_id)
    }

    pub fn update<R>(
        &self,
        message_id: serenity::MessageId,
        f: impl FnOnce(&mut Giveaway) -> R,
    ) -> Option<R> {
        self.active
            .get_mut(&message_id)
            .map(|mut entry| f(entry.value_mut()))
    }

    /// Most recently created giveaway still running in `channel_id`.
    pub fn latest_in_channel(&self, channel_id: serenity::ChannelId) -> Option<serenity::MessageId> {
        self.active
            .iter()
            .filter(|entry| entry.channel_id == channel_id)
            .max_by_key(|entry| (entry.created_at, *entry.key()))
            .map(|entry| *entry.key())
    }

    /// Running giveaways of a guild, soonest to end first.
    pub fn list_guild(&self, guild_id: serenity::GuildId) -> Vec<(serenity::MessageId, Giveaway)> {
        let mut giveaways: Vec<_> = self
            .active
            .iter()
            .filter(|entry| entry.guild_id == guild_id)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        giveaways.sort_by_key(|(id, giveaway)| (giveaway.ends_at, *id));
        giveaways
    }

    pub fn add_entrant(&self, message_id: serenity::MessageId, user_id: serenity::UserId) -> bool {
        self.update(message_id, |giveaway| giveaway.entrants.insert(user_id))
            .unwrap_or(false)
    }

    pub fn remove_entrant(&self, message_id: serenity::MessageId, user_id: serenity::UserId) -> bool {
        self.update(message_id, |giveaway| giveaway.entrants.remove(&user_id))
            .unwrap_or(false)
    }

    /// Replaces the favoured entrants; a later pick overrides the earlier one.
    pub fn set_preferred(
        &self,
        message_id: serenity::MessageId,
        chosen: Vec<serenity::UserId>,
    ) -> bool {
        self.update(message_id, |giveaway| giveaway.preferred = chosen.into_iter().collect())
            .is_some()
    }

    /// (Re)arms the completion timer from the record's current end time,
    /// aborting the previous timer if there was one.
    pub fn schedule(self: &Arc<Self>, http: Arc<serenity::Http>, message_id: serenity::MessageId) {
        let Some(ends_at) = self.active.get(&message_id).map(|entry| entry.ends_at) else {
            return;
        };
        let delay = (ends_at - Utc::now()).to_std().unwrap_or_default();

        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached: aborting a stale timer must not interrupt a completion.
            tokio::spawn(async move {
                if let Err(e) = service.complete(&http, message_id).await {
                    error!("Failed to complete giveaway {}: {:?}", message_id, e);
                }
            });
        });

        if let Some(previous) = self.timers.insert(message_id, task.abort_handle()) {
            previous.abort();
        }
        debug!("Giveaway {} scheduled to end in {:?}", message_id, delay);
    }

    /// Re-renders the announcement every `countdown_interval_secs` until the
    /// giveaway leaves the active set.
    pub fn spawn_countdown(self: &Arc<Self>, http: Arc<serenity::Http>, message_id: serenity::MessageId) {
        let service = Arc::clone(self);
        let interval = StdDuration::from_secs(self.settings.countdown_interval_secs.max(1));

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !service.is_active(message_id) {
                    break;
                }
                match service.refresh(&http, message_id).await {
                    Ok(()) => {}
                    Err(e) if is_not_found(&e) => {
                        warn!("Announcement of giveaway {} is gone, dropping it", message_id);
                        service.discard(message_id);
                        break;
                    }
                    Err(e) => debug!("Countdown render of {} skipped: {:?}", message_id, e),
                }
            }
        });
    }

    /// Renders the live announcement. Does nothing once the giveaway ended.
    pub async fn refresh(
        &self,
        http: &serenity::Http,
        message_id: serenity::MessageId,
    ) -> Result<(), serenity::Error> {
        let Some(render_lock) = self.active.get(&message_id).map(|g| Arc::clone(&g.render_lock)) else {
            return Ok(());
        };
        let _guard = render_lock.lock().await;

        let Some(giveaway) = self.get(message_id) else {
            return Ok(());
        };
        let embed = {
            let l10n = self.l10n.get_proxy(&giveaway.locale);
            render::active_embed(&giveaway, &l10n, &self.settings.entry_emoji, Utc::now())
        };

        giveaway
            .channel_id
            .edit_message(http, message_id, serenity::EditMessage::new().embed(embed))
            .await
            .map(|_| ())
    }

    /// Forgets a giveaway without drawing.
    pub fn discard(&self, message_id: serenity::MessageId) {
        self.active.remove(&message_id);
        if let Some((_, timer)) = self.timers.remove(&message_id) {
            timer.abort();
        }
        self.cancel_claim(message_id);
    }

    /// Ends a giveaway: draws (unless winners were forced), renders the final
    /// embed and announces the result. Only the caller that removes the
    /// record from the active set gets to run this.
    pub async fn complete(&self, http: &serenity::Http, message_id: serenity::MessageId) -> Result<(), Error> {
        let Some((_, mut giveaway)) = self.active.remove(&message_id) else {
            debug!("Giveaway {} already completed", message_id);
            return Ok(());
        };
        self.timers.remove(&message_id);

        let render_lock = Arc::clone(&giveaway.render_lock);
        let guard = render_lock.lock().await;

        let winners = match giveaway.forced_winners.take() {
            Some(forced) => forced,
            None => {
                match self.fetch_entrants(http, message_id, &giveaway).await {
                    Ok(users) => giveaway.entrants.extend(users),
                    Err(e) if is_not_found(&e) => {
                        warn!("Giveaway {} was deleted before it ended", message_id);
                        return Ok(());
                    }
                    Err(e) => warn!("Could not re-sync entrants of giveaway {}: {:?}", message_id, e),
                }
                let count = usize::try_from(giveaway.winners).unwrap_or(usize::MAX);
                let mut rng = rand::rng();
                draw_winners(&giveaway.entrants, &giveaway.preferred, count, &mut rng)
            }
        };

        let entry_emoji = self.settings.entry_emoji.as_str();

        if winners.is_empty() {
            let embed = {
                let l10n = self.l10n.get_proxy(&giveaway.locale);
                render::no_winner_embed(&giveaway, &l10n, entry_emoji)
            };
            giveaway
                .channel_id
                .edit_message(http, message_id, serenity::EditMessage::new().embed(embed))
                .await?;
            info!("Giveaway {} ended without entrants", message_id);
            return Ok(());
        }

        let (embed, announcement) = {
            let l10n = self.l10n.get_proxy(&giveaway.locale);
            let mut args = FluentArgs::new();
            args.set("emoji", entry_emoji);
            args.set("winners", mention_users(&winners));
            args.set("prize", giveaway.prize.as_str());
            let key = if giveaway.fast {
                "gw-announce-fast"
            } else {
                "gw-announce-winners"
            };
            (
                render::ended_embed(&giveaway, &winners, &l10n, entry_emoji),
                l10n.t(key, Some(&args)),
            )
        };

        if let Err(e) = giveaway
            .channel_id
            .edit_message(http, message_id, serenity::EditMessage::new().embed(embed))
            .await
        {
            warn!("Failed to render final embed of giveaway {}: {:?}", message_id, e);
        }
        drop(guard);

        info!(
            "Giveaway {} ended with {} winner(s) out of {} entrant(s)",
            message_id,
            winners.len(),
            giveaway.entrants.len()
        );

        let claim = giveaway
            .fast
            .then(|| self.register_claim(message_id, winners.iter().copied().collect()));

        if let Err(e) = giveaway
            .channel_id
            .send_message(http, serenity::CreateMessage::new().content(announcement))
            .await
        {
            self.cancel_claim(message_id);
            return Err(e.into());
        }

        let Some(rx) = claim else {
            return Ok(());
        };

        let started = Utc::now();
        let timeout = StdDuration::from_secs(self.settings.claim_timeout_secs);
        let outcome = tokio::time::timeout(timeout, rx).await;
        self.cancel_claim(message_id);

        let content = {
            let l10n = self.l10n.get_proxy(&giveaway.locale);
            match outcome {
                Ok(Ok(user_id)) => {
                    let mut args = FluentArgs::new();
                    args.set("user", mention_user(user_id));
                    args.set("elapsed", format_duration(Utc::now() - started));
                    info!("Giveaway {} claimed by {}", message_id, user_id);
                    l10n.t("gw-claim-success", Some(&args))
                }
                _ => {
                    info!("Giveaway {} was not claimed in time", message_id);
                    l10n.t("gw-claim-timeout", None)
                }
            }
        };

        giveaway
            .channel_id
            .send_message(http, serenity::CreateMessage::new().content(content))
            .await?;

        Ok(())
    }

    async fn fetch_entrants(
        &self,
        http: &serenity::Http,
        message_id: serenity::MessageId,
        giveaway: &Giveaway,
    ) -> Result<Vec<serenity::UserId>, serenity::Error> {
        const PAGE: u8 = 100;
        let mut users = vec![];
        let reaction = self.entry_reaction();
        let mut after: Option<u64> = None;

        loop {
            let page = http
                .get_reaction_users(giveaway.channel_id, message_id, &reaction, PAGE, after)
                .await?;
            let full = page.len() == usize::from(PAGE);
            after = page.last().map(|user| user.id.get());
            users.extend(page.into_iter().filter(|user| !user.bot).map(|user| user.id));
            if !full {
                break;
            }
        }

        Ok(users)
    }

    fn register_claim(
        &self,
        message_id: serenity::MessageId,
        winners: HashSet<serenity::UserId>,
    ) -> oneshot::Receiver<serenity::UserId> {
        let (tx, rx) = oneshot::channel();
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingClaim {
                giveaway: message_id,
                winners,
                tx,
            });
        rx
    }

    fn cancel_claim(&self, message_id: serenity::MessageId) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|claim| claim.giveaway != message_id);
    }

    /// Called for every direct message: if `user_id` won a fast giveaway
    /// still waiting for a claim, that claim is resolved.
    pub fn resolve_claim(&self, user_id: serenity::UserId) -> Option<serenity::MessageId> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        let index = claims.iter().position(|claim| claim.winners.contains(&user_id))?;
        let claim = claims.swap_remove(index);
        claim.tx.send(user_id).ok()?;
        Some(claim.giveaway)
    }
}
