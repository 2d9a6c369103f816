use crate::Context;
use poise::serenity_prelude as serenity;

/// Why a moderation action on a member is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    SelfTarget,
    Owner,
    Hierarchy,
}

impl Refusal {
    pub fn key(self) -> &'static str {
        match self {
            Refusal::SelfTarget => "mod-error-self",
            Refusal::Owner => "mod-error-owner",
            Refusal::Hierarchy => "mod-error-hierarchy",
        }
    }
}

/// Role standing of the two members involved in an action.
#[derive(Debug, Clone, Copy)]
pub struct Standing {
    pub moderator: serenity::UserId,
    pub target: serenity::UserId,
    pub owner: serenity::UserId,
    /// Highest role position, 0 when the member only has @everyone.
    pub moderator_top: u16,
    pub target_top: u16,
}

pub fn check(standing: &Standing) -> Result<(), Refusal> {
    if standing.moderator == standing.target {
        return Err(Refusal::SelfTarget);
    }
    if standing.target == standing.owner {
        return Err(Refusal::Owner);
    }
    if standing.moderator == standing.owner {
        return Ok(());
    }
    if standing.target_top >= standing.moderator_top {
        return Err(Refusal::Hierarchy);
    }
    Ok(())
}

fn top_position(guild: &serenity::Guild, roles: &[serenity::RoleId]) -> u16 {
    roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Checks whether the invoker may act on `target`. A target that is not a
/// member (already left) can only fail the self and owner checks.
pub async fn check_target(ctx: Context<'_>, target: serenity::UserId) -> Result<(), Refusal> {
    let moderator_roles = ctx
        .author_member()
        .await
        .map(|member| member.roles.clone())
        .unwrap_or_default();
    let target_roles = match ctx.guild_id() {
        Some(guild_id) => guild_id
            .member(ctx, target)
            .await
            .map(|member| member.roles)
            .unwrap_or_default(),
        None => vec![],
    };

    let standing = {
        let Some(guild) = ctx.guild() else {
            return Err(Refusal::Hierarchy);
        };
        Standing {
            moderator: ctx.author().id,
            target,
            owner: guild.owner_id,
            moderator_top: top_position(&guild, &moderator_roles),
            target_top: top_position(&guild, &target_roles),
        }
    };
    check(&standing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(moderator_top: u16, target_top: u16) -> Standing {
        Standing {
            moderator: serenity::UserId::new(1),
            target: serenity::UserId::new(2),
            owner: serenity::UserId::new(9),
            moderator_top,
            target_top,
        }
    }

    #[test]
    fn target_must_rank_below_the_moderator() {
        assert_eq!(check(&standing(5, 3)), Ok(()));
        assert_eq!(check(&standing(5, 5)), Err(Refusal::Hierarchy));
        assert_eq!(check(&standing(0, 0)), Err(Refusal::Hierarchy));
    }

    #[test]
    fn self_and_owner_are_protected() {
        let mut own = standing(5, 0);
        own.target = own.moderator;
        assert_eq!(check(&own), Err(Refusal::SelfTarget));

        let mut owner = standing(50, 0);
        owner.target = owner.owner;
        assert_eq!(check(&owner), Err(Refusal::Owner));
    }

    #[test]
    fn the_owner_outranks_everyone() {
        let mut by_owner = standing(0, 10);
        by_owner.moderator = by_owner.owner;
        assert_eq!(check(&by_owner), Ok(()));
    }
}
