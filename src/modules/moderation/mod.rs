pub mod commands;
pub mod hierarchy;
pub mod warnings;

use crate::modules::{Module, ModuleDefinition};

pub const DEFINITION: ModuleDefinition = ModuleDefinition {
    id: "moderation",
    name_key: "module-moderation-name",
    desc_key: "module-moderation-desc",
};

pub fn module() -> Module {
    Module {
        definition: DEFINITION,
        commands: vec![
            commands::clear(),
            commands::kick(),
            commands::ban(),
            commands::unban(),
            commands::warn(),
            commands::warnings(),
            commands::unwarn(),
            commands::mute(),
            commands::unmute(),
        ],
        event_handlers: vec![],
    }
}
