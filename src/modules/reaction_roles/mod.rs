pub mod commands;
pub mod events;
pub mod state;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "reaction_roles",
            name_key: "module-reaction-roles-name",
            desc_key: "module-reaction-roles-desc",
        },
        commands: commands::commands(),
        event_handlers: vec![events::handler],
    }
}
