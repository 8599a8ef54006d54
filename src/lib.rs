pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::advisor::{advisor_for_settings, Advisor};
pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::commands::{
    add_subtask_impl, ai_settings_impl, appearance_impl, clear_completed_tasks_impl,
    clear_focus_target_impl, click_schulte_cell_impl, create_task_impl, delete_task_impl,
    end_day_review_impl, flush_state_impl, list_tasks_impl, regenerate_schulte_impl,
    reset_timer_impl, schulte_focus_analysis_impl, schulte_history_impl, schulte_state_impl,
    session_history_impl, set_color_mode_impl, set_focus_target_impl, set_theme_impl,
    switch_timer_mode_impl, task_priority_suggestion_impl, tick_timer_impl, timer_settings_impl,
    timer_state_impl, toggle_subtask_impl, toggle_task_impl, toggle_timer_impl,
    update_ai_settings_impl, update_timer_duration_impl, AppState, AppearanceResponse,
    NowProvider, SchulteClickResponse, SchulteStateResponse, TimerStateResponse,
    TimerTickResponse,
};
pub use application::schulte::{
    SchulteClick, SchulteRound, SchulteStatus, SCHULTE_CELL_COUNT, SCHULTE_GRID_SIZE,
};
pub use application::timer::{CompletedFocusSession, PomodoroTimer};
pub use domain::models::{
    AiProvider, AiSettings, ColorMode, DayRecord, FocusTarget, Priority, SchulteResult, Subtask,
    Task, Theme, TimerMode, TimerSettings,
};
pub use infrastructure::chat_client::{
    ChatCompletionClient, ChatCompletionRequest, ReqwestChatCompletionClient,
};
pub use infrastructure::error::InfraError;
pub use infrastructure::snapshot_store::{
    InMemorySnapshotStore, SnapshotStore, SqliteSnapshotStore,
};
