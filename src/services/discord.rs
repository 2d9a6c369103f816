use poise::serenity_prelude as serenity;

/// True when the platform answered 404: the channel, message or member is
/// already gone.
pub fn is_not_found(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(http_error) => {
            http_error.status_code().map(|status| status.as_u16()) == Some(404)
        }
        _ => false,
    }
}

pub fn mention_user(user_id: serenity::UserId) -> String {
    format!("<@{}>", user_id.get())
}

pub fn mention_users(user_ids: &[serenity::UserId]) -> String {
    user_ids
        .iter()
        .map(|id| mention_user(*id))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a snowflake typed by a user in a string option.
pub fn parse_id(raw: &str) -> Option<u64> {
    raw.trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>')
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
}
