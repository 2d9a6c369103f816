pub mod commands;

use crate::modules::{Module, ModuleDefinition};

pub const DEFINITION: ModuleDefinition = ModuleDefinition {
    id: "general",
    name_key: "module-general-name",
    desc_key: "module-general-desc",
};

pub fn module() -> Module {
    Module {
        definition: DEFINITION,
        commands: vec![commands::help(), commands::sync()],
        event_handlers: vec![],
    }
}
