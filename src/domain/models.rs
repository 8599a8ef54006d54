use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl Subtask {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "subtask.id")?;
        validate_non_empty(&self.text, "subtask.text")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub subtasks: Vec<Subtask>,
    pub focus_seconds: u64,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.text, "task.text")?;
        if self.completed != self.completed_at.is_some() {
            return Err("task.completed_at must be set exactly when task.completed".to_string());
        }
        for tag in &self.tags {
            validate_non_empty(tag, "task.tags[]")?;
        }
        for subtask in &self.subtasks {
            subtask.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FocusTarget {
    Task { id: String, text: String },
    Subtask { id: String, parent_id: String, text: String },
}

impl FocusTarget {
    pub fn credited_task_id(&self) -> &str {
        match self {
            FocusTarget::Task { id, .. } => id,
            FocusTarget::Subtask { parent_id, .. } => parent_id,
        }
    }

    pub fn depends_on(&self, task_id: &str) -> bool {
        match self {
            FocusTarget::Task { id, .. } => id == task_id,
            FocusTarget::Subtask { id, parent_id, .. } => id == task_id || parent_id == task_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayRecord {
    pub date: String,
    pub minutes: u32,
    pub tasks_completed: u32,
}

impl DayRecord {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            minutes: 0,
            tasks_completed: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "day_record.date")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Work => "work",
            TimerMode::ShortBreak => "short_break",
            TimerMode::LongBreak => "long_break",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "work" => Some(TimerMode::Work),
            "short_break" | "short-break" => Some(TimerMode::ShortBreak),
            "long_break" | "long-break" => Some(TimerMode::LongBreak),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSettings {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
}

impl TimerSettings {
    pub const MIN_MINUTES: u32 = 1;
    pub const MAX_MINUTES: u32 = 120;

    pub fn minutes_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    pub fn seconds_for(&self, mode: TimerMode) -> u32 {
        self.minutes_for(mode) * 60
    }

    pub fn clamp_minutes(requested: i64) -> u32 {
        requested.clamp(i64::from(Self::MIN_MINUTES), i64::from(Self::MAX_MINUTES)) as u32
    }

    pub fn set_minutes(&mut self, mode: TimerMode, requested: i64) {
        let minutes = Self::clamp_minutes(requested);
        match mode {
            TimerMode::Work => self.work_minutes = minutes,
            TimerMode::ShortBreak => self.short_break_minutes = minutes,
            TimerMode::LongBreak => self.long_break_minutes = minutes,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (field_name, minutes) in [
            ("timer_settings.work_minutes", self.work_minutes),
            ("timer_settings.short_break_minutes", self.short_break_minutes),
            ("timer_settings.long_break_minutes", self.long_break_minutes),
        ] {
            if !(Self::MIN_MINUTES..=Self::MAX_MINUTES).contains(&minutes) {
                return Err(format!(
                    "{field_name} must be between {} and {}",
                    Self::MIN_MINUTES,
                    Self::MAX_MINUTES
                ));
            }
        }
        Ok(())
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchulteResult {
    pub id: String,
    pub finished_at: DateTime<Utc>,
    pub time_taken: f64,
    pub grid_size: u8,
}

impl SchulteResult {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "schulte_result.id")?;
        if !self.time_taken.is_finite() || self.time_taken < 0.0 {
            return Err("schulte_result.time_taken must be >= 0".to_string());
        }
        if self.grid_size == 0 {
            return Err("schulte_result.grid_size must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    DeepSeek,
    Glm,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::DeepSeek => "deepseek",
            AiProvider::Glm => "glm",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(AiProvider::Gemini),
            "deepseek" => Some(AiProvider::DeepSeek),
            "glm" => Some(AiProvider::Glm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub gemini_key: String,
    pub deepseek_key: String,
    pub glm_key: String,
}

impl AiSettings {
    pub fn key_for(&self, provider: AiProvider) -> &str {
        match provider {
            AiProvider::Gemini => &self.gemini_key,
            AiProvider::DeepSeek => &self.deepseek_key,
            AiProvider::Glm => &self.glm_key,
        }
    }

    pub fn set_key(&mut self, provider: AiProvider, key: impl Into<String>) {
        let key = key.into();
        match provider {
            AiProvider::Gemini => self.gemini_key = key,
            AiProvider::DeepSeek => self.deepseek_key = key,
            AiProvider::Glm => self.glm_key = key,
        }
    }

    pub fn active_key(&self) -> Option<&str> {
        let key = self.key_for(self.provider).trim();
        if key.is_empty() { None } else { Some(key) }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProvider::Gemini,
            gemini_key: String::new(),
            deepseek_key: String::new(),
            glm_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Minimalist,
    Youthful,
    Business,
    Nature,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Minimalist => "minimalist",
            Theme::Youthful => "youthful",
            Theme::Business => "business",
            Theme::Nature => "nature",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minimalist" => Some(Theme::Minimalist),
            "youthful" => Some(Theme::Youthful),
            "business" => Some(Theme::Business),
            "nature" => Some(Theme::Nature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(ColorMode::Light),
            "dark" => Some(ColorMode::Dark),
            _ => None,
        }
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_task() -> Task {
        Task {
            id: "tsk-1".to_string(),
            text: "Draft the launch checklist".to_string(),
            completed: false,
            created_at: fixed_time("2026-02-16T08:00:00Z"),
            completed_at: None,
            priority: Priority::Medium,
            tags: vec!["launch".to_string()],
            subtasks: vec![Subtask {
                id: "sub-1".to_string(),
                text: "List blockers".to_string(),
                completed: true,
            }],
            focus_seconds: 1500,
        }
    }

    fn sample_day_record() -> DayRecord {
        DayRecord {
            date: "2026-02-16".to_string(),
            minutes: 50,
            tasks_completed: 2,
        }
    }

    fn sample_schulte_result() -> SchulteResult {
        SchulteResult {
            id: "sch-1".to_string(),
            finished_at: fixed_time("2026-02-16T09:30:00Z"),
            time_taken: 27.46,
            grid_size: 5,
        }
    }

    fn sample_ai_settings() -> AiSettings {
        AiSettings {
            provider: AiProvider::DeepSeek,
            gemini_key: String::new(),
            deepseek_key: "sk-test".to_string(),
            glm_key: String::new(),
        }
    }

    #[test]
    fn task_validate_accepts_valid_task() {
        assert!(sample_task().validate().is_ok());
    }

    #[test]
    fn task_validate_rejects_blank_text() {
        let mut task = sample_task();
        task.text = "   ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_requires_completion_timestamp_pairing() {
        let mut task = sample_task();
        task.completed = true;
        assert!(task.validate().is_err());

        task.completed_at = Some(fixed_time("2026-02-16T12:00:00Z"));
        assert!(task.validate().is_ok());

        task.completed = false;
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_blank_subtask_text() {
        let mut task = sample_task();
        task.subtasks[0].text = String::new();
        assert!(task.validate().is_err());
    }

    #[test]
    fn focus_target_credits_parent_task_for_subtasks() {
        let direct = FocusTarget::Task {
            id: "tsk-1".to_string(),
            text: "Draft the launch checklist".to_string(),
        };
        let nested = FocusTarget::Subtask {
            id: "sub-1".to_string(),
            parent_id: "tsk-1".to_string(),
            text: "List blockers".to_string(),
        };

        assert_eq!(direct.credited_task_id(), "tsk-1");
        assert_eq!(nested.credited_task_id(), "tsk-1");
        assert!(direct.depends_on("tsk-1"));
        assert!(nested.depends_on("tsk-1"));
        assert!(!nested.depends_on("tsk-2"));
    }

    #[test]
    fn timer_settings_default_durations() {
        let settings = TimerSettings::default();
        assert_eq!(settings.minutes_for(TimerMode::Work), 25);
        assert_eq!(settings.minutes_for(TimerMode::ShortBreak), 5);
        assert_eq!(settings.minutes_for(TimerMode::LongBreak), 15);
        assert_eq!(settings.seconds_for(TimerMode::Work), 1500);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn timer_settings_validate_rejects_out_of_range() {
        let mut settings = TimerSettings::default();
        settings.work_minutes = 0;
        assert!(settings.validate().is_err());
        settings.work_minutes = 121;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn day_record_validate_rejects_bad_date() {
        let mut record = sample_day_record();
        record.date = "16/02/2026".to_string();
        assert!(record.validate().is_err());
    }

    #[test]
    fn schulte_result_validate_rejects_negative_time() {
        let mut result = sample_schulte_result();
        result.time_taken = -0.5;
        assert!(result.validate().is_err());
    }

    #[test]
    fn ai_settings_active_key_tracks_selected_provider() {
        let mut settings = sample_ai_settings();
        assert_eq!(settings.active_key(), Some("sk-test"));

        settings.provider = AiProvider::Gemini;
        assert_eq!(settings.active_key(), None);

        settings.set_key(AiProvider::Gemini, "  g-key  ");
        assert_eq!(settings.active_key(), Some("g-key"));
    }

    #[test]
    fn string_names_parse_back_to_variants() {
        for mode in [TimerMode::Work, TimerMode::ShortBreak, TimerMode::LongBreak] {
            assert_eq!(TimerMode::parse(mode.as_str()), Some(mode));
        }
        for priority in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(Priority::parse(priority.as_str()), Some(priority));
        }
        for provider in [AiProvider::Gemini, AiProvider::DeepSeek, AiProvider::Glm] {
            assert_eq!(AiProvider::parse(provider.as_str()), Some(provider));
        }
        for theme in [Theme::Minimalist, Theme::Youthful, Theme::Business, Theme::Nature] {
            assert_eq!(Theme::parse(theme.as_str()), Some(theme));
        }
        for mode in [ColorMode::Light, ColorMode::Dark] {
            assert_eq!(ColorMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(TimerMode::parse("sleep"), None);
        assert_eq!(AiProvider::parse(""), None);
    }

    #[test]
    fn focus_target_serializes_with_type_tag() {
        let target = FocusTarget::Subtask {
            id: "sub-1".to_string(),
            parent_id: "tsk-1".to_string(),
            text: "List blockers".to_string(),
        };
        let encoded = serde_json::to_string(&target).expect("serialize focus target");
        assert!(encoded.contains("\"type\":\"subtask\""));
        assert!(encoded.contains("\"parent_id\":\"tsk-1\""));
    }

    proptest! {
        #[test]
        fn set_minutes_always_lands_in_supported_range(requested in any::<i64>()) {
            let mut settings = TimerSettings::default();
            settings.set_minutes(TimerMode::Work, requested);

            let expected = requested.clamp(1, 120) as u32;
            prop_assert_eq!(settings.work_minutes, expected);
            prop_assert!(settings.validate().is_ok());
        }
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let task = sample_task();
        let record = sample_day_record();
        let result = sample_schulte_result();
        let ai_settings = sample_ai_settings();
        let timer_settings = TimerSettings::default();

        let task_roundtrip: Task =
            serde_json::from_str(&serde_json::to_string(&task).expect("serialize task"))
                .expect("deserialize task");
        let record_roundtrip: DayRecord =
            serde_json::from_str(&serde_json::to_string(&record).expect("serialize record"))
                .expect("deserialize record");
        let result_roundtrip: SchulteResult =
            serde_json::from_str(&serde_json::to_string(&result).expect("serialize result"))
                .expect("deserialize result");
        let ai_roundtrip: AiSettings = serde_json::from_str(
            &serde_json::to_string(&ai_settings).expect("serialize ai settings"),
        )
        .expect("deserialize ai settings");
        let timer_roundtrip: TimerSettings = serde_json::from_str(
            &serde_json::to_string(&timer_settings).expect("serialize timer settings"),
        )
        .expect("deserialize timer settings");

        assert_eq!(task_roundtrip, task);
        assert_eq!(record_roundtrip, record);
        assert_eq!(result_roundtrip, result);
        assert_eq!(ai_roundtrip, ai_settings);
        assert_eq!(timer_roundtrip, timer_settings);
    }
}
