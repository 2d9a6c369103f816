use fluent::{FluentArgs, FluentResource};
use fluent_bundle::bundle::FluentBundle;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use unic_langid::LanguageIdentifier;

// We use the concurrent memoizer to ensure thread safety (Sync + Send)
type ConcurrentBundle = FluentBundle<FluentResource, intl_memoizer::concurrent::IntlLangMemoizer>;

pub const FALLBACK_LOCALE: &str = "en-US";

pub struct LocalizationManager {
    bundles: HashMap<LanguageIdentifier, ConcurrentBundle>,
    fallback: LanguageIdentifier,
}

impl LocalizationManager {
    /// Loads every `<locale>/*.ftl` file found under `dir`.
    pub fn new(dir: &Path) -> Self {
        let mut manager = Self::empty();

        let Ok(entries) = fs::read_dir(dir) else {
            error!("Locales directory {} not readable", dir.display());
            return manager;
        };

        for entry in entries.flatten() {
            if !entry.file_type().map_or(false, |t| t.is_dir()) {
                continue;
            }
            let locale_name = entry.file_name().to_string_lossy().into_owned();
            let Ok(files) = fs::read_dir(entry.path()) else {
                continue;
            };
            for file in files.flatten() {
                if file.path().extension().map_or(false, |ext| ext == "ftl") {
                    if let Ok(content) = fs::read_to_string(file.path()) {
                        manager.add_source(&locale_name, content);
                    }
                }
            }
            info!("Loaded locale: {}", locale_name);
        }

        manager
    }

    fn empty() -> Self {
        Self {
            bundles: HashMap::new(),
            fallback: FALLBACK_LOCALE.parse().unwrap_or_default(),
        }
    }

    /// Parses `content` and adds it to the bundle of `locale`.
    pub fn add_source(&mut self, locale: &str, content: String) {
        let Ok(lang_id) = locale.parse::<LanguageIdentifier>() else {
            error!("Ignoring resource for invalid locale {}", locale);
            return;
        };

        let bundle = self.bundles.entry(lang_id.clone()).or_insert_with(|| {
            let mut bundle = ConcurrentBundle::new_concurrent(vec![lang_id]);
            // Isolation marks would break mentions such as <@id>.
            bundle.set_use_isolating(false);
            bundle
        });

        // Entries that fail to parse are skipped; the rest of the file is kept.
        let resource = match FluentResource::try_new(content) {
            Ok(resource) => resource,
            Err((resource, errors)) => {
                for err in errors {
                    error!("Error parsing resource for {}: {:?}", locale, err);
                }
                resource
            }
        };
        if let Err(errors) = bundle.add_resource(resource) {
            for err in errors {
                error!("Error adding resource for {}: {:?}", locale, err);
            }
        }
    }

    pub fn translate(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        let bundle = locale
            .parse::<LanguageIdentifier>()
            .ok()
            .and_then(|lang_id| self.bundles.get(&lang_id))
            .filter(|bundle| bundle.has_message(key))
            .or_else(|| self.bundles.get(&self.fallback));

        if let Some(bundle) = bundle {
            if let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) {
                let mut errors = vec![];
                return bundle
                    .format_pattern(pattern, args, &mut errors)
                    .into_owned();
            }
        }

        key.to_string()
    }

    pub fn get_proxy(&self, locale: &str) -> L10nProxy<'_> {
        L10nProxy {
            manager: self,
            locale: locale.to_string(),
        }
    }
}

/// A proxy for translation that holds a reference to the manager and a specific locale
pub struct L10nProxy<'a> {
    manager: &'a LocalizationManager,
    locale: String,
}

impl<'a> L10nProxy<'a> {
    pub fn t(&self, key: &str, args: Option<&FluentArgs>) -> String {
        self.manager.translate(&self.locale, key, args)
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
}

/// Locale of a cached guild, for output that has no invoking user.
pub fn guild_locale(ctx: &serenity::Context, guild_id: serenity::GuildId) -> String {
    ctx.cache
        .guild(guild_id)
        .map(|guild| guild.preferred_locale.clone())
        .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
}

/// Helper trait to add localization to the Poise context
pub trait ContextL10nExt {
    fn l10n_guild(&self) -> L10nProxy<'_>;
    fn l10n_user(&self) -> L10nProxy<'_>;
    fn l10n_user_option(&self) -> Option<L10nProxy<'_>>;
}

impl ContextL10nExt for crate::Context<'_> {
    fn l10n_guild(&self) -> L10nProxy<'_> {
        let guild_locale = self.guild().map(|guild| guild.preferred_locale.clone());
        guild_locale
            .map(|locale| self.data().l10n.get_proxy(&locale))
            .or_else(|| self.l10n_user_option())
            .unwrap_or_else(|| self.data().l10n.get_proxy(FALLBACK_LOCALE))
    }

    fn l10n_user_option(&self) -> Option<L10nProxy<'_>> {
        self.locale().map(|locale| self.data().l10n.get_proxy(locale))
    }

    fn l10n_user(&self) -> L10nProxy<'_> {
        self.l10n_user_option()
            .unwrap_or_else(|| self.l10n_guild())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn manager() -> LocalizationManager {
        let mut manager = LocalizationManager::empty();
        manager.add_source("en-US", "hello = Hello { $userId }!\nonly-en = English".into());
        manager.add_source("fr-FR", "hello = Bonjour <@{ $userId }> !".into());
        manager
    }

    #[test]
    fn formats_with_arguments_without_isolation_marks() {
        let mut args = FluentArgs::new();
        args.set("userId", 42u64);
        assert_eq!(manager().translate("fr-FR", "hello", Some(&args)), "Bonjour <@42> !");
    }

    #[test]
    fn falls_back_to_english_then_to_key() {
        let manager = manager();
        assert_eq!(manager.translate("fr-FR", "only-en", None), "English");
        assert_eq!(manager.translate("de", "only-en", None), "English");
        assert_eq!(manager.translate("fr-FR", "missing-key", None), "missing-key");
    }

    #[test]
    fn a_broken_entry_does_not_drop_the_rest_of_the_file() {
        let mut manager = LocalizationManager::empty();
        manager.add_source(
            "en-US",
            "before = Before\nbroken =\n    **bold**\nafter = After".into(),
        );
        assert_eq!(manager.translate("en-US", "before", None), "Before");
        assert_eq!(manager.translate("en-US", "after", None), "After");
    }

    #[test]
    fn multiline_embed_text_keeps_its_lines() {
        let mut manager = LocalizationManager::empty();
        manager.add_source("en-US", "embed = **{ $prize }**\n    Hosted by { $host }".into());
        let mut args = FluentArgs::new();
        args.set("prize", "Nitro");
        args.set("host", "<@1>");
        assert_eq!(
            manager.translate("en-US", "embed", Some(&args)),
            "**Nitro**\nHosted by <@1>"
        );
    }

    fn keys(path: PathBuf) -> BTreeSet<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|line| line.chars().next().map_or(false, |c| c.is_ascii_lowercase()))
            .filter_map(|line| line.split_once(" =").map(|(key, _)| key.trim().to_string()))
            .collect()
    }

    #[test]
    fn shipped_locales_have_the_same_keys() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("locales");
        let en = keys(root.join("en-US").join("main.ftl"));
        let fr = keys(root.join("fr-FR").join("main.ftl"));
        assert!(!en.is_empty());
        assert_eq!(en, fr);

        for locale in ["en-US", "fr-FR"] {
            let content = fs::read_to_string(root.join(locale).join("main.ftl")).unwrap();
            if let Err((_, errors)) = FluentResource::try_new(content) {
                panic!("{locale} does not parse: {errors:?}");
            }
        }

        let manager = LocalizationManager::new(&root);
        for key in &en {
            assert_ne!(&manager.translate("fr-FR", key, None), key, "{key} did not resolve");
        }
    }
}
