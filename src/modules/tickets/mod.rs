pub mod commands;
pub mod interactions;
pub mod presets;
pub mod store;

use crate::modules::{Module, ModuleDefinition};

pub const DEFINITION: ModuleDefinition = ModuleDefinition {
    id: "tickets",
    name_key: "module-tickets-name",
    desc_key: "module-tickets-desc",
};

pub fn module() -> Module {
    Module {
        definition: DEFINITION,
        commands: commands::commands(),
        event_handlers: vec![],
    }
}
