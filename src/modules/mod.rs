pub mod general;
pub mod giveaways;
pub mod invite_tracking;
pub mod moderation;
pub mod reaction_roles;
pub mod tickets;
pub mod welcome;

use crate::{Data, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    pub id: &'static str,
    pub name_key: &'static str,
    pub desc_key: &'static str,
}

pub type EventHandler = for<'a> fn(
    &'a serenity::Context,
    &'a serenity::FullEvent,
    &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>>;

pub struct Module {
    pub definition: ModuleDefinition,
    pub commands: Vec<poise::Command<Data, Error>>,
    pub event_handlers: Vec<EventHandler>,
}

pub fn get_modules() -> Vec<Module> {
    vec![
        giveaways::module(),
        invite_tracking::module(),
        welcome::module(),
        reaction_roles::module(),
        tickets::module(),
        moderation::module(),
        general::module(),
    ]
}

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    let mut all_commands = vec![];

    for mut module in get_modules() {
        let category = module.definition.id;
        for command in &mut module.commands {
            command.category = Some(category.into());
        }
        all_commands.extend(module.commands);
    }

    all_commands
}

pub fn definitions() -> Vec<ModuleDefinition> {
    get_modules().into_iter().map(|m| m.definition).collect()
}

pub fn event_handlers() -> Vec<(&'static str, EventHandler)> {
    get_modules()
        .into_iter()
        .flat_map(|m| {
            let id = m.definition.id;
            m.event_handlers.into_iter().map(move |h| (id, h))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn command_names_are_unique_and_categorized() {
        let commands = commands();
        let mut names = HashSet::new();
        for command in &commands {
            assert!(names.insert(command.name.clone()), "duplicate /{}", command.name);
            assert!(command.category.is_some());
        }
        for expected in ["gw", "invites", "role", "ticket", "warn", "help", "sync"] {
            assert!(names.contains(expected), "missing /{expected}");
        }
    }

    #[test]
    fn module_ids_are_unique() {
        let ids: HashSet<_> = definitions().iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), get_modules().len());
    }
}
