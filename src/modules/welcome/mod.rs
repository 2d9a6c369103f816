pub mod events;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "welcome",
            name_key: "module-welcome-name",
            desc_key: "module-welcome-desc",
        },
        commands: vec![],
        event_handlers: vec![events::handler],
    }
}
