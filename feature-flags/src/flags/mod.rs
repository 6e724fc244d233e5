pub mod boolean_coercion;
pub mod flag_cache;
pub mod flag_context;
pub mod flag_definitions;
pub mod flag_manager;
pub mod flag_matching;
