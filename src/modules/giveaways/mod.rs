pub mod commands;
pub mod draw;
pub mod duration_parser;
pub mod events;
pub mod render;
pub mod service;

use crate::modules::{Module, ModuleDefinition};

pub const DEFINITION: ModuleDefinition = ModuleDefinition {
    id: "giveaways",
    name_key: "module-giveaways-name",
    desc_key: "module-giveaways-desc",
};

pub fn module() -> Module {
    Module {
        definition: DEFINITION,
        commands: commands::commands(),
        event_handlers: vec![events::handler],
    }
}
