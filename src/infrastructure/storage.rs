use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

pub const KEY_TASKS: &str = "zenflow_tasks_v2";
pub const KEY_LAST_VISIT: &str = "zenflow_last_visit";
pub const KEY_HISTORY: &str = "zenflow_history";
pub const KEY_SCHULTE_HISTORY: &str = "zenflow_schulte_history";
pub const KEY_TIMER_SETTINGS: &str = "zenflow_timer_settings";
pub const KEY_THEME: &str = "zenflow_theme";
pub const KEY_COLOR_MODE: &str = "zenflow_mode";
pub const KEY_AI_SETTINGS: &str = "zenflow_ai_settings";
pub const KEY_LAST_ANALYZED: &str = "zenflow_last_analyzed";

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
