use crate::application::advisor::{
    advisor_for_settings, fallback_priorities, ANALYSIS_ERROR_FALLBACK, ANALYSIS_NO_RECORDS,
    REVIEW_ERROR_FALLBACK,
};
use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::schulte::{SchulteClick, SchulteRound, SCHULTE_GRID_SIZE};
use crate::application::timer::PomodoroTimer;
use crate::domain::models::{
    AiProvider, AiSettings, ColorMode, DayRecord, FocusTarget, Priority, SchulteResult, Subtask,
    Task, Theme, TimerMode, TimerSettings,
};
use crate::infrastructure::chat_client::{ChatCompletionClient, ReqwestChatCompletionClient};
use crate::infrastructure::config::load_advisor_endpoints;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::snapshot_store::{SnapshotStore, SqliteSnapshotStore};
use crate::infrastructure::storage::{
    KEY_AI_SETTINGS, KEY_COLOR_MODE, KEY_HISTORY, KEY_LAST_ANALYZED, KEY_LAST_VISIT,
    KEY_SCHULTE_HISTORY, KEY_TASKS, KEY_THEME, KEY_TIMER_SETTINGS,
};
use chrono::{DateTime, Local, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const REVIEW_NO_TASKS_MESSAGE: &str = "当前还没有待办任务，先写下你的目标吧！";
const REVIEW_UNCHANGED_MESSAGE: &str = "任务状态未变更，无需重复分析。继续加油！";
const REVIEW_MISSING_KEY_MESSAGE: &str = "请先在设置中配置并开启 AI 密钥。";
const ANALYSIS_MISSING_KEY_MESSAGE: &str = "请先在设置中配置 AI。";
const RECENT_SCHULTE_RESULTS: usize = 5;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub type NowProvider = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    store: Arc<dyn SnapshotStore>,
    chat_client: Arc<dyn ChatCompletionClient>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
    clock: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store: Arc<dyn SnapshotStore> =
            Arc::new(SqliteSnapshotStore::new(bootstrap.database_path.clone()));
        let chat_client: Arc<dyn ChatCompletionClient> =
            Arc::new(ReqwestChatCompletionClient::new());
        Self::from_parts(bootstrap, store, chat_client, Arc::new(Local::now))
    }

    pub fn with_store(
        workspace_root: PathBuf,
        store: Arc<dyn SnapshotStore>,
        chat_client: Arc<dyn ChatCompletionClient>,
        clock: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Self::from_parts(bootstrap, store, chat_client, clock)
    }

    fn from_parts(
        bootstrap: BootstrapResult,
        store: Arc<dyn SnapshotStore>,
        chat_client: Arc<dyn ChatCompletionClient>,
        clock: NowProvider,
    ) -> Result<Self, InfraError> {
        let runtime = RuntimeState::load(store.as_ref())?;
        let state = Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            store,
            chat_client,
            runtime: Mutex::new(runtime),
            log_guard: Mutex::new(()),
            clock,
        };
        state.clear_completed_on_new_day()?;
        Ok(state)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    // Runs before the first command. The marker is written unconditionally so
    // the next launch compares against the day this one started.
    fn clear_completed_on_new_day(&self) -> Result<(), InfraError> {
        let today = day_key(self.now());
        let previous_visit: Option<String> = read_snapshot(self.store.as_ref(), KEY_LAST_VISIT)?;

        if previous_visit.is_some_and(|visit| visit != today) {
            let mut runtime = lock_runtime(self)?;
            let before = runtime.tasks.len();
            runtime.tasks.retain(|task| !task.completed);
            let removed = before - runtime.tasks.len();
            if removed > 0 {
                self.save_tasks(&runtime)?;
                drop(runtime);
                self.log_info(
                    "startup",
                    &format!("cleared {removed} completed tasks from an earlier day"),
                );
            }
        }

        write_snapshot(self.store.as_ref(), KEY_LAST_VISIT, &today)
    }

    fn save_tasks(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(self.store.as_ref(), KEY_TASKS, &runtime.tasks)
    }

    fn save_history(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(self.store.as_ref(), KEY_HISTORY, &runtime.history)
    }

    fn save_schulte_history(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(
            self.store.as_ref(),
            KEY_SCHULTE_HISTORY,
            &runtime.schulte_history,
        )
    }

    fn save_timer_settings(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(self.store.as_ref(), KEY_TIMER_SETTINGS, &runtime.timer_settings)
    }

    fn save_theme(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(self.store.as_ref(), KEY_THEME, &runtime.theme)
    }

    fn save_color_mode(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(self.store.as_ref(), KEY_COLOR_MODE, &runtime.color_mode)
    }

    fn save_ai_settings(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        write_snapshot(self.store.as_ref(), KEY_AI_SETTINGS, &runtime.ai_settings)
    }
}

#[derive(Debug)]
struct RuntimeState {
    tasks: Vec<Task>,
    history: Vec<DayRecord>,
    schulte_history: Vec<SchulteResult>,
    timer_settings: TimerSettings,
    theme: Theme,
    color_mode: ColorMode,
    ai_settings: AiSettings,
    last_analyzed_fingerprint: Option<String>,
    focus_target: Option<FocusTarget>,
    timer: PomodoroTimer,
    schulte: SchulteRound,
}

impl RuntimeState {
    fn load(store: &dyn SnapshotStore) -> Result<Self, InfraError> {
        let tasks: Vec<Task> = read_snapshot(store, KEY_TASKS)?.unwrap_or_default();
        let history: Vec<DayRecord> = read_snapshot(store, KEY_HISTORY)?.unwrap_or_default();
        let schulte_history: Vec<SchulteResult> =
            read_snapshot(store, KEY_SCHULTE_HISTORY)?.unwrap_or_default();
        let timer_settings: TimerSettings =
            read_snapshot(store, KEY_TIMER_SETTINGS)?.unwrap_or_default();
        let theme: Theme = read_snapshot(store, KEY_THEME)?.unwrap_or_default();
        let color_mode: ColorMode = read_snapshot(store, KEY_COLOR_MODE)?.unwrap_or_default();
        let ai_settings: AiSettings = read_snapshot(store, KEY_AI_SETTINGS)?.unwrap_or_default();
        let last_analyzed_fingerprint: Option<String> =
            read_snapshot(store, KEY_LAST_ANALYZED)?;
        let timer = PomodoroTimer::new(&timer_settings);

        Ok(Self {
            tasks,
            history,
            schulte_history,
            timer_settings,
            theme,
            color_mode,
            ai_settings,
            last_analyzed_fingerprint,
            focus_target: None,
            timer,
            schulte: SchulteRound::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerStateResponse {
    pub mode: String,
    pub seconds_left: u32,
    pub is_active: bool,
    pub sessions_completed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_target: Option<FocusTarget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerTickResponse {
    pub timer: TimerStateResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_focus_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchulteStateResponse {
    pub grid: Vec<u8>,
    pub next_number: u8,
    pub status: String,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchulteClickResponse {
    pub round: SchulteStateResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SchulteResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppearanceResponse {
    pub theme: String,
    pub color_mode: String,
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.tasks.clone())
}

pub fn create_task_impl(
    state: &AppState,
    text: String,
    priority: Option<String>,
    tags: Option<Vec<String>>,
) -> Result<Task, InfraError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task text must not be empty".to_string(),
        ));
    }

    let priority = match priority.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => parse_priority(raw)?,
        None => Priority::Medium,
    };
    let tags = tags
        .unwrap_or_default()
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>();

    let task = Task {
        id: next_id("tsk"),
        text: text.to_string(),
        completed: false,
        created_at: state.now().with_timezone(&Utc),
        completed_at: None,
        priority,
        tags,
        subtasks: Vec::new(),
        focus_seconds: 0,
    };

    {
        let mut runtime = lock_runtime(state)?;
        runtime.tasks.push(task.clone());
        state.save_tasks(&runtime)?;
    }

    state.log_info("create_task", &format!("created task_id={}", task.id));
    Ok(task)
}

pub fn toggle_task_impl(state: &AppState, task_id: String) -> Result<Task, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task_id must not be empty".to_string(),
        ));
    }

    let now = state.now();
    let mut runtime = lock_runtime(state)?;
    let Some(index) = runtime.tasks.iter().position(|task| task.id == task_id) else {
        return Err(InfraError::InvalidConfig(format!("task not found: {task_id}")));
    };

    let completed = {
        let task = &mut runtime.tasks[index];
        task.completed = !task.completed;
        task.completed_at = task.completed.then(|| now.with_timezone(&Utc));
        task.completed
    };

    let today = day_key(now);
    if completed {
        day_record_mut(&mut runtime.history, &today).tasks_completed += 1;
    } else if let Some(record) = runtime.history.iter_mut().find(|record| record.date == today) {
        record.tasks_completed = record.tasks_completed.saturating_sub(1);
    }

    state.save_tasks(&runtime)?;
    state.save_history(&runtime)?;
    let updated = runtime.tasks[index].clone();
    drop(runtime);

    state.log_info(
        "toggle_task",
        &format!("toggled task_id={task_id} completed={completed}"),
    );
    Ok(updated)
}

pub fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let before = runtime.tasks.len();
    runtime.tasks.retain(|task| task.id != task_id);
    if runtime.tasks.len() == before {
        return Ok(false);
    }
    if runtime
        .focus_target
        .as_ref()
        .is_some_and(|target| target.depends_on(task_id))
    {
        runtime.focus_target = None;
    }
    state.save_tasks(&runtime)?;
    drop(runtime);

    state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    Ok(true)
}

pub fn add_subtask_impl(
    state: &AppState,
    task_id: String,
    text: String,
) -> Result<Task, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task_id must not be empty".to_string(),
        ));
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(InfraError::InvalidConfig(
            "subtask text must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let Some(task) = runtime.tasks.iter_mut().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidConfig(format!("task not found: {task_id}")));
    };
    task.subtasks.push(Subtask {
        id: next_id("sub"),
        text: text.to_string(),
        completed: false,
    });
    let updated = task.clone();
    state.save_tasks(&runtime)?;
    drop(runtime);

    state.log_info("add_subtask", &format!("added subtask to task_id={task_id}"));
    Ok(updated)
}

pub fn toggle_subtask_impl(
    state: &AppState,
    task_id: String,
    subtask_id: String,
) -> Result<Task, InfraError> {
    let task_id = task_id.trim();
    let subtask_id = subtask_id.trim();
    if task_id.is_empty() || subtask_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task_id and subtask_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let Some(task) = runtime.tasks.iter_mut().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidConfig(format!("task not found: {task_id}")));
    };
    let Some(subtask) = task
        .subtasks
        .iter_mut()
        .find(|subtask| subtask.id == subtask_id)
    else {
        return Err(InfraError::InvalidConfig(format!(
            "subtask not found: {subtask_id}"
        )));
    };
    subtask.completed = !subtask.completed;
    let updated = task.clone();
    state.save_tasks(&runtime)?;
    drop(runtime);

    state.log_info("toggle_subtask", &format!("toggled subtask_id={subtask_id}"));
    Ok(updated)
}

pub fn clear_completed_tasks_impl(state: &AppState) -> Result<usize, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let before = runtime.tasks.len();
    runtime.tasks.retain(|task| !task.completed);
    let removed = before - runtime.tasks.len();
    if removed == 0 {
        return Ok(0);
    }
    clear_dangling_focus_target(&mut runtime);
    state.save_tasks(&runtime)?;
    drop(runtime);

    state.log_info(
        "clear_completed_tasks",
        &format!("removed {removed} completed tasks"),
    );
    Ok(removed)
}

pub fn set_focus_target_impl(
    state: &AppState,
    task_id: String,
    subtask_id: Option<String>,
) -> Result<FocusTarget, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let Some(task) = runtime.tasks.iter().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidConfig(format!("task not found: {task_id}")));
    };

    let target = match subtask_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(subtask_id) => {
            let Some(subtask) = task
                .subtasks
                .iter()
                .find(|subtask| subtask.id == subtask_id)
            else {
                return Err(InfraError::InvalidConfig(format!(
                    "subtask not found: {subtask_id}"
                )));
            };
            FocusTarget::Subtask {
                id: subtask.id.clone(),
                parent_id: task.id.clone(),
                text: subtask.text.clone(),
            }
        }
        None => FocusTarget::Task {
            id: task.id.clone(),
            text: task.text.clone(),
        },
    };

    runtime.focus_target = Some(target.clone());
    drop(runtime);

    state.log_info(
        "set_focus_target",
        &format!("focus target set for task_id={task_id}"),
    );
    Ok(target)
}

pub fn clear_focus_target_impl(state: &AppState) -> Result<(), InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.focus_target = None;
    drop(runtime);

    state.log_info("clear_focus_target", "focus target cleared");
    Ok(())
}

pub fn timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_timer_state_response(&runtime))
}

pub fn toggle_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let running = runtime.timer.toggle();
    let response = to_timer_state_response(&runtime);
    drop(runtime);

    state.log_info(
        "toggle_timer",
        if running { "timer started" } else { "timer paused" },
    );
    Ok(response)
}

pub fn reset_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let settings = runtime.timer_settings;
    runtime.timer.reset(&settings);
    let response = to_timer_state_response(&runtime);
    drop(runtime);

    state.log_info("reset_timer", "timer reset to full duration");
    Ok(response)
}

pub fn switch_timer_mode_impl(
    state: &AppState,
    mode: String,
) -> Result<TimerStateResponse, InfraError> {
    let mode = parse_timer_mode(&mode)?;
    let mut runtime = lock_runtime(state)?;
    let settings = runtime.timer_settings;
    runtime.timer.switch_mode(&settings, mode);
    let response = to_timer_state_response(&runtime);
    drop(runtime);

    state.log_info(
        "switch_timer_mode",
        &format!("switched to {}", mode.as_str()),
    );
    Ok(response)
}

pub fn tick_timer_impl(state: &AppState) -> Result<TimerTickResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let settings = runtime.timer_settings;
    let completed = runtime.timer.tick(&settings);
    let completed_focus_minutes = completed.as_ref().map(|session| session.minutes);
    if let Some(session) = completed {
        apply_focus_session(state, &mut runtime, f64::from(session.minutes))?;
    }
    let response = TimerTickResponse {
        timer: to_timer_state_response(&runtime),
        completed_focus_minutes,
    };
    drop(runtime);

    if let Some(minutes) = completed_focus_minutes {
        state.log_info(
            "tick_timer",
            &format!("work session completed, credited {minutes} minutes"),
        );
    }
    Ok(response)
}

pub fn timer_settings_impl(state: &AppState) -> Result<TimerSettings, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.timer_settings)
}

pub fn update_timer_duration_impl(
    state: &AppState,
    mode: String,
    minutes: String,
) -> Result<TimerSettings, InfraError> {
    let mode = parse_timer_mode(&mode)?;
    let requested = parse_requested_minutes(&minutes);

    let mut runtime = lock_runtime(state)?;
    runtime.timer_settings.set_minutes(mode, requested);
    let settings = runtime.timer_settings;
    runtime.timer.apply_settings(&settings);
    state.save_timer_settings(&runtime)?;
    drop(runtime);

    state.log_info(
        "update_timer_duration",
        &format!(
            "set {} duration to {} minutes",
            mode.as_str(),
            settings.minutes_for(mode)
        ),
    );
    Ok(settings)
}

pub fn schulte_state_impl(state: &AppState) -> Result<SchulteStateResponse, InfraError> {
    let now = state.now().with_timezone(&Utc);
    let runtime = lock_runtime(state)?;
    Ok(to_schulte_state_response(&runtime, now))
}

pub fn regenerate_schulte_impl(state: &AppState) -> Result<SchulteStateResponse, InfraError> {
    let now = state.now().with_timezone(&Utc);
    let mut runtime = lock_runtime(state)?;
    runtime.schulte = SchulteRound::new();
    let response = to_schulte_state_response(&runtime, now);
    drop(runtime);

    state.log_info("regenerate_schulte", "generated a fresh grid");
    Ok(response)
}

pub fn click_schulte_cell_impl(
    state: &AppState,
    number: u8,
) -> Result<SchulteClickResponse, InfraError> {
    let now = state.now().with_timezone(&Utc);
    let mut runtime = lock_runtime(state)?;
    let result = match runtime.schulte.click(number, now) {
        SchulteClick::Finished { time_taken } => {
            let result = SchulteResult {
                id: next_id("sch"),
                finished_at: now,
                time_taken,
                grid_size: SCHULTE_GRID_SIZE,
            };
            runtime.schulte_history.push(result.clone());
            state.save_schulte_history(&runtime)?;
            Some(result)
        }
        SchulteClick::Advanced { .. } | SchulteClick::Ignored => None,
    };
    let response = SchulteClickResponse {
        round: to_schulte_state_response(&runtime, now),
        result: result.clone(),
    };
    drop(runtime);

    if let Some(result) = result {
        state.log_info(
            "click_schulte_cell",
            &format!("round finished in {} seconds", result.time_taken),
        );
    }
    Ok(response)
}

pub fn schulte_history_impl(state: &AppState) -> Result<Vec<SchulteResult>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.schulte_history.clone())
}

pub fn session_history_impl(state: &AppState) -> Result<Vec<DayRecord>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.history.clone())
}

pub fn appearance_impl(state: &AppState) -> Result<AppearanceResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_appearance_response(&runtime))
}

pub fn set_theme_impl(state: &AppState, theme: String) -> Result<AppearanceResponse, InfraError> {
    let theme = parse_theme(&theme)?;
    let mut runtime = lock_runtime(state)?;
    runtime.theme = theme;
    state.save_theme(&runtime)?;
    let response = to_appearance_response(&runtime);
    drop(runtime);

    state.log_info("set_theme", &format!("theme set to {}", theme.as_str()));
    Ok(response)
}

pub fn set_color_mode_impl(
    state: &AppState,
    mode: String,
) -> Result<AppearanceResponse, InfraError> {
    let mode = parse_color_mode(&mode)?;
    let mut runtime = lock_runtime(state)?;
    runtime.color_mode = mode;
    state.save_color_mode(&runtime)?;
    let response = to_appearance_response(&runtime);
    drop(runtime);

    state.log_info("set_color_mode", &format!("color mode set to {}", mode.as_str()));
    Ok(response)
}

pub fn ai_settings_impl(state: &AppState) -> Result<AiSettings, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.ai_settings.clone())
}

pub fn update_ai_settings_impl(
    state: &AppState,
    provider: Option<String>,
    api_key: Option<String>,
) -> Result<AiSettings, InfraError> {
    let mut runtime = lock_runtime(state)?;
    if let Some(provider) = provider {
        runtime.ai_settings.provider = parse_ai_provider(&provider)?;
    }
    // A key submitted together with a provider switch lands on the new provider.
    if let Some(api_key) = api_key {
        let provider = runtime.ai_settings.provider;
        runtime.ai_settings.set_key(provider, api_key.trim());
    }
    state.save_ai_settings(&runtime)?;
    let updated = runtime.ai_settings.clone();
    drop(runtime);

    state.log_info("update_ai_settings", "updated AI provider settings");
    Ok(updated)
}

pub async fn end_day_review_impl(state: &AppState) -> Result<String, InfraError> {
    let (tasks, ai_settings, previous_fingerprint) = {
        let runtime = lock_runtime(state)?;
        (
            runtime.tasks.clone(),
            runtime.ai_settings.clone(),
            runtime.last_analyzed_fingerprint.clone(),
        )
    };

    if tasks.is_empty() {
        return Ok(REVIEW_NO_TASKS_MESSAGE.to_string());
    }

    let fingerprint = task_fingerprint(&tasks)?;
    if previous_fingerprint.as_deref() == Some(fingerprint.as_str()) {
        return Ok(REVIEW_UNCHANGED_MESSAGE.to_string());
    }

    let endpoints = load_advisor_endpoints(state.config_dir());
    let Some(advisor) =
        advisor_for_settings(&ai_settings, &endpoints, Arc::clone(&state.chat_client))
    else {
        return Ok(REVIEW_MISSING_KEY_MESSAGE.to_string());
    };

    let review = match advisor.end_day_review(&tasks).await {
        Ok(review) => {
            state.log_info("end_day_review", "generated end of day review");
            review
        }
        Err(error) => {
            state.log_error("end_day_review", &error.to_string());
            REVIEW_ERROR_FALLBACK.to_string()
        }
    };

    // The fingerprint marks the attempt, not the outcome; a failed call is not
    // retried until the task list changes.
    commit_fingerprint(state, &fingerprint)?;
    Ok(review)
}

pub async fn task_priority_suggestion_impl(state: &AppState) -> Result<Vec<String>, InfraError> {
    let (tasks, ai_settings) = {
        let runtime = lock_runtime(state)?;
        (runtime.tasks.clone(), runtime.ai_settings.clone())
    };

    if tasks.iter().all(|task| task.completed) {
        return Ok(Vec::new());
    }

    let endpoints = load_advisor_endpoints(state.config_dir());
    let Some(advisor) =
        advisor_for_settings(&ai_settings, &endpoints, Arc::clone(&state.chat_client))
    else {
        return Err(InfraError::InvalidConfig(
            "no API key configured for the selected AI provider".to_string(),
        ));
    };

    match advisor.task_priority_suggestion(&tasks).await {
        Ok(priorities) => {
            state.log_info(
                "task_priority_suggestion",
                &format!("suggested {} priorities", priorities.len()),
            );
            Ok(priorities)
        }
        Err(error) => {
            state.log_error("task_priority_suggestion", &error.to_string());
            Ok(fallback_priorities(&tasks))
        }
    }
}

pub async fn schulte_focus_analysis_impl(state: &AppState) -> Result<String, InfraError> {
    let (results, ai_settings) = {
        let runtime = lock_runtime(state)?;
        (
            recent_schulte_results(&runtime.schulte_history),
            runtime.ai_settings.clone(),
        )
    };

    if results.is_empty() {
        return Ok(ANALYSIS_NO_RECORDS.to_string());
    }

    let endpoints = load_advisor_endpoints(state.config_dir());
    let Some(advisor) =
        advisor_for_settings(&ai_settings, &endpoints, Arc::clone(&state.chat_client))
    else {
        return Ok(ANALYSIS_MISSING_KEY_MESSAGE.to_string());
    };

    match advisor.schulte_focus_analysis(&results).await {
        Ok(analysis) => {
            state.log_info("schulte_focus_analysis", "generated focus analysis");
            Ok(analysis)
        }
        Err(error) => {
            state.log_error("schulte_focus_analysis", &error.to_string());
            Ok(ANALYSIS_ERROR_FALLBACK.to_string())
        }
    }
}

pub fn flush_state_impl(state: &AppState) -> Result<(), InfraError> {
    let runtime = lock_runtime(state)?;
    state.save_tasks(&runtime)?;
    state.save_history(&runtime)?;
    state.save_schulte_history(&runtime)?;
    state.save_timer_settings(&runtime)?;
    state.save_theme(&runtime)?;
    state.save_color_mode(&runtime)?;
    state.save_ai_settings(&runtime)?;
    if let Some(fingerprint) = runtime.last_analyzed_fingerprint.as_deref() {
        write_snapshot(state.store.as_ref(), KEY_LAST_ANALYZED, fingerprint)?;
    }
    drop(runtime);

    state.log_info("flush_state", "flushed all snapshots");
    Ok(())
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn to_timer_state_response(runtime: &RuntimeState) -> TimerStateResponse {
    TimerStateResponse {
        mode: runtime.timer.mode().as_str().to_string(),
        seconds_left: runtime.timer.seconds_left(),
        is_active: runtime.timer.is_active(),
        sessions_completed: runtime.timer.sessions_completed(),
        focus_target: runtime.focus_target.clone(),
    }
}

fn to_schulte_state_response(runtime: &RuntimeState, now: DateTime<Utc>) -> SchulteStateResponse {
    SchulteStateResponse {
        grid: runtime.schulte.grid().to_vec(),
        next_number: runtime.schulte.next_number(),
        status: runtime.schulte.status().as_str().to_string(),
        elapsed_seconds: runtime.schulte.elapsed_seconds(now),
    }
}

fn to_appearance_response(runtime: &RuntimeState) -> AppearanceResponse {
    AppearanceResponse {
        theme: runtime.theme.as_str().to_string(),
        color_mode: runtime.color_mode.as_str().to_string(),
    }
}

fn day_key(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn day_record_mut<'a>(history: &'a mut Vec<DayRecord>, date: &str) -> &'a mut DayRecord {
    let index = match history.iter().position(|record| record.date == date) {
        Some(index) => index,
        None => {
            history.push(DayRecord::new(date));
            history.len() - 1
        }
    };
    &mut history[index]
}

fn effective_minutes(minutes: f64) -> Option<u32> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }
    let rounded_up = minutes.ceil() as u32;
    Some(rounded_up.max(1))
}

fn parse_requested_minutes(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(minutes) = trimmed.parse::<i64>() {
        return minutes;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|minutes| minutes.is_finite())
        .map_or(1, |minutes| minutes.trunc() as i64)
}

fn apply_focus_session(
    state: &AppState,
    runtime: &mut RuntimeState,
    minutes: f64,
) -> Result<(), InfraError> {
    let Some(effective) = effective_minutes(minutes) else {
        return Ok(());
    };

    let today = day_key(state.now());
    day_record_mut(&mut runtime.history, &today).minutes += effective;

    let credited_task_id = runtime
        .focus_target
        .as_ref()
        .map(|target| target.credited_task_id().to_string());
    let mut task_credited = false;
    if let Some(credited_task_id) = credited_task_id {
        if let Some(task) = runtime
            .tasks
            .iter_mut()
            .find(|task| task.id == credited_task_id)
        {
            task.focus_seconds += u64::from(effective) * 60;
            task_credited = true;
        }
    }

    state.save_history(runtime)?;
    if task_credited {
        state.save_tasks(runtime)?;
    }
    Ok(())
}

fn clear_dangling_focus_target(runtime: &mut RuntimeState) {
    let Some(target) = runtime.focus_target.as_ref() else {
        return;
    };
    let credited = target.credited_task_id();
    if !runtime.tasks.iter().any(|task| task.id == credited) {
        runtime.focus_target = None;
    }
}

#[derive(Serialize)]
struct FingerprintEntry<'a> {
    id: &'a str,
    text: &'a str,
    completed: bool,
}

fn task_fingerprint(tasks: &[Task]) -> Result<String, InfraError> {
    let entries = tasks
        .iter()
        .map(|task| FingerprintEntry {
            id: &task.id,
            text: &task.text,
            completed: task.completed,
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_string(&entries)?)
}

fn commit_fingerprint(state: &AppState, fingerprint: &str) -> Result<(), InfraError> {
    {
        let mut runtime = lock_runtime(state)?;
        runtime.last_analyzed_fingerprint = Some(fingerprint.to_string());
    }
    write_snapshot(state.store.as_ref(), KEY_LAST_ANALYZED, fingerprint)
}

fn recent_schulte_results(history: &[SchulteResult]) -> Vec<SchulteResult> {
    history[history.len().saturating_sub(RECENT_SCHULTE_RESULTS)..].to_vec()
}

fn read_snapshot<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<T>, InfraError> {
    let Some(raw) = store.read(key)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_snapshot<T: Serialize + ?Sized>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> Result<(), InfraError> {
    let raw = serde_json::to_string(value)?;
    store.write(key, &raw)
}

fn parse_timer_mode(raw: &str) -> Result<TimerMode, InfraError> {
    TimerMode::parse(raw)
        .ok_or_else(|| InfraError::InvalidConfig(format!("unsupported timer mode: {raw}")))
}

fn parse_priority(raw: &str) -> Result<Priority, InfraError> {
    Priority::parse(raw)
        .ok_or_else(|| InfraError::InvalidConfig(format!("unsupported priority: {raw}")))
}

fn parse_ai_provider(raw: &str) -> Result<AiProvider, InfraError> {
    AiProvider::parse(raw)
        .ok_or_else(|| InfraError::InvalidConfig(format!("unsupported AI provider: {raw}")))
}

fn parse_theme(raw: &str) -> Result<Theme, InfraError> {
    Theme::parse(raw).ok_or_else(|| InfraError::InvalidConfig(format!("unsupported theme: {raw}")))
}

fn parse_color_mode(raw: &str) -> Result<ColorMode, InfraError> {
    ColorMode::parse(raw)
        .ok_or_else(|| InfraError::InvalidConfig(format!("unsupported color mode: {raw}")))
}
