use crate::modules::invite_tracking::tracking::JoinSource;
use crate::services::discord::mention_user;
use crate::services::localization::guild_locale;
use crate::{Data, Error};
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        if let serenity::FullEvent::GuildMemberAddition { new_member } = event {
            grant_member_role(ctx, new_member, data).await?;
        }
        Ok(())
    })
}

async fn grant_member_role(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    let Some(role_id) = data
        .settings
        .welcome
        .as_ref()
        .and_then(|welcome| welcome.member_role_id)
        .map(serenity::RoleId::new)
    else {
        return Ok(());
    };

    if !needs_role(&member.roles, role_id) {
        return Ok(());
    }

    match ctx
        .http
        .add_member_role(member.guild_id, member.user.id, role_id, Some("Member role"))
        .await
    {
        Ok(()) => info!("Granted member role {} to {}", role_id, member.user.id),
        Err(e) => warn!(
            "Failed to grant member role {} to {} in guild {}: {:?}",
            role_id, member.user.id, member.guild_id, e
        ),
    }
    Ok(())
}

/// Posts the greeting once the invite tracker has attributed the join.
pub async fn greet(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
    source: &JoinSource,
) -> Result<(), Error> {
    let Some(settings) = data.settings.welcome.as_ref() else {
        return Ok(());
    };
    let channel_id = serenity::ChannelId::new(settings.channel_id);

    let inviter = source.inviter_id();
    let net = inviter.map(|id| data.invites.net_invites(member.guild_id, id));

    let (embed, fallback) = {
        let l10n = data.l10n.get_proxy(&guild_locale(ctx, member.guild_id));
        let unknown = l10n.t("welcome-unknown", None);

        let mut args = FluentArgs::new();
        args.set("member", mention_user(member.user.id));
        args.set("inviter", inviter.map(mention_user).unwrap_or_else(|| unknown.clone()));
        args.set(
            "count",
            net.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string()),
        );

        let mut embed = serenity::CreateEmbed::new()
            .title(l10n.t("welcome-title", None))
            .colour(0x000000)
            .field(l10n.t("welcome-field-member", None), mention_user(member.user.id), true)
            .field(
                l10n.t("welcome-field-inviter", None),
                inviter.map(mention_user).unwrap_or(unknown),
                true,
            )
            .field(
                l10n.t("welcome-field-invites", None),
                net.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string()),
                true,
            );
        if let Some(url) = &settings.banner_url {
            embed = embed.image(url);
        }

        let fallback_key = if net.is_some() {
            "welcome-fallback-with-count"
        } else {
            "welcome-fallback"
        };
        (embed, l10n.t(fallback_key, Some(&args)))
    };

    let sent = channel_id
        .send_message(ctx, serenity::CreateMessage::new().embed(embed))
        .await;

    if let Err(e) = sent {
        warn!("Welcome embed failed in channel {}: {:?}", channel_id, e);
        if let Err(e) = channel_id
            .send_message(ctx, serenity::CreateMessage::new().content(fallback))
            .await
        {
            warn!("Welcome fallback failed in channel {}: {:?}", channel_id, e);
        }
    }

    Ok(())
}

/// Every joiner, bots included, gets the member role unless they hold it.
fn needs_role(held: &[serenity::RoleId], role_id: serenity::RoleId) -> bool {
    !held.contains(&role_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_role_is_granted_unless_already_held() {
        let role = serenity::RoleId::new(5);
        assert!(needs_role(&[], role));
        assert!(needs_role(&[serenity::RoleId::new(6)], role));
        assert!(!needs_role(&[serenity::RoleId::new(6), role], role));
    }
}
