use crate::domain::models::{AiProvider, AiSettings, SchulteResult, Task};
use crate::infrastructure::chat_client::{ChatCompletionClient, ChatCompletionRequest};
use crate::infrastructure::config::AdvisorEndpoints;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::sync::Arc;

pub const GEMINI_CHAT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
pub const DEEPSEEK_CHAT_ENDPOINT: &str = "https://api.deepseek.com/v1/chat/completions";
pub const GLM_CHAT_ENDPOINT: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

pub const GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const GLM_MODEL: &str = "glm-4";

pub const REVIEW_EMPTY_FALLBACK: &str = "保持动力，明天又是新的一天！";
pub const REVIEW_ERROR_FALLBACK: &str = "今天辛苦了！休息好，明天再继续。";
pub const ANALYSIS_NO_RECORDS: &str = "暂无最近练习记录。";
pub const ANALYSIS_EMPTY_FALLBACK: &str = "保持练习，专注力会持续提升！";
pub const ANALYSIS_ERROR_FALLBACK: &str = "练习是提升专注力的关键，继续加油！";

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn end_day_review(&self, tasks: &[Task]) -> Result<String, InfraError>;
    async fn task_priority_suggestion(&self, tasks: &[Task]) -> Result<Vec<String>, InfraError>;
    async fn schulte_focus_analysis(&self, results: &[SchulteResult])
        -> Result<String, InfraError>;
}

// Transport and payload failures bubble up as InfraError; the command layer
// logs them and substitutes the per-operation fallback copy. Content shaping
// (blank replies, unparsable lists) is handled here.
pub fn advisor_for_settings(
    settings: &AiSettings,
    endpoints: &AdvisorEndpoints,
    client: Arc<dyn ChatCompletionClient>,
) -> Option<Box<dyn Advisor>> {
    let api_key = settings.active_key()?.to_string();
    let override_endpoint = endpoints.endpoint_for(settings.provider);

    Some(match settings.provider {
        AiProvider::Gemini => Box::new(GeminiAdvisor::with_endpoint(
            override_endpoint.unwrap_or(GEMINI_CHAT_ENDPOINT),
            api_key,
            client,
        )),
        AiProvider::DeepSeek => Box::new(DeepSeekAdvisor::with_endpoint(
            override_endpoint.unwrap_or(DEEPSEEK_CHAT_ENDPOINT),
            api_key,
            client,
        )),
        AiProvider::Glm => Box::new(GlmAdvisor::with_endpoint(
            override_endpoint.unwrap_or(GLM_CHAT_ENDPOINT),
            api_key,
            client,
        )),
    })
}

pub fn fallback_priorities(tasks: &[Task]) -> Vec<String> {
    unfinished_titles(tasks).into_iter().take(3).collect()
}

pub struct GeminiAdvisor {
    endpoint: String,
    api_key: String,
    client: Arc<dyn ChatCompletionClient>,
}

impl GeminiAdvisor {
    pub fn new(api_key: impl Into<String>, client: Arc<dyn ChatCompletionClient>) -> Self {
        Self::with_endpoint(GEMINI_CHAT_ENDPOINT, api_key, client)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        client: Arc<dyn ChatCompletionClient>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, InfraError> {
        self.client
            .complete(ChatCompletionRequest {
                endpoint: self.endpoint.clone(),
                api_key: self.api_key.clone(),
                model: GEMINI_MODEL.to_string(),
                prompt,
            })
            .await
    }
}

#[async_trait]
impl Advisor for GeminiAdvisor {
    async fn end_day_review(&self, tasks: &[Task]) -> Result<String, InfraError> {
        let prompt = english_review_prompt(tasks, "Respond in Chinese as requested by context.");
        let content = self.complete(prompt).await?;
        Ok(non_blank_or(content, REVIEW_EMPTY_FALLBACK))
    }

    async fn task_priority_suggestion(&self, tasks: &[Task]) -> Result<Vec<String>, InfraError> {
        let unfinished = unfinished_titles(tasks);
        if unfinished.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = priority_prompt(&unfinished, "Return as a simple JSON list of strings.");
        let content = self.complete(prompt).await?;
        Ok(extract_priority_list(&content)
            .unwrap_or_else(|| unfinished.into_iter().take(3).collect()))
    }

    async fn schulte_focus_analysis(
        &self,
        results: &[SchulteResult],
    ) -> Result<String, InfraError> {
        if results.is_empty() {
            return Ok(ANALYSIS_NO_RECORDS.to_string());
        }
        let content = self.complete(schulte_prompt(results)).await?;
        Ok(non_blank_or(content, ANALYSIS_EMPTY_FALLBACK))
    }
}

pub struct DeepSeekAdvisor {
    endpoint: String,
    api_key: String,
    client: Arc<dyn ChatCompletionClient>,
}

impl DeepSeekAdvisor {
    pub fn new(api_key: impl Into<String>, client: Arc<dyn ChatCompletionClient>) -> Self {
        Self::with_endpoint(DEEPSEEK_CHAT_ENDPOINT, api_key, client)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        client: Arc<dyn ChatCompletionClient>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, InfraError> {
        self.client
            .complete(ChatCompletionRequest {
                endpoint: self.endpoint.clone(),
                api_key: self.api_key.clone(),
                model: DEEPSEEK_MODEL.to_string(),
                prompt,
            })
            .await
    }
}

#[async_trait]
impl Advisor for DeepSeekAdvisor {
    async fn end_day_review(&self, tasks: &[Task]) -> Result<String, InfraError> {
        let content = self.complete(chinese_review_prompt(tasks)).await?;
        Ok(non_blank_or(content, REVIEW_EMPTY_FALLBACK))
    }

    async fn task_priority_suggestion(&self, tasks: &[Task]) -> Result<Vec<String>, InfraError> {
        let unfinished = unfinished_titles(tasks);
        if unfinished.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = priority_prompt(&unfinished, "Return ONLY a JSON list of strings.");
        let content = self.complete(prompt).await?;
        Ok(extract_priority_list(&content)
            .unwrap_or_else(|| unfinished.into_iter().take(3).collect()))
    }

    async fn schulte_focus_analysis(
        &self,
        results: &[SchulteResult],
    ) -> Result<String, InfraError> {
        if results.is_empty() {
            return Ok(ANALYSIS_NO_RECORDS.to_string());
        }
        let content = self.complete(schulte_prompt(results)).await?;
        Ok(non_blank_or(content, ANALYSIS_EMPTY_FALLBACK))
    }
}

pub struct GlmAdvisor {
    endpoint: String,
    api_key: String,
    client: Arc<dyn ChatCompletionClient>,
}

impl GlmAdvisor {
    pub fn new(api_key: impl Into<String>, client: Arc<dyn ChatCompletionClient>) -> Self {
        Self::with_endpoint(GLM_CHAT_ENDPOINT, api_key, client)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        client: Arc<dyn ChatCompletionClient>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, InfraError> {
        self.client
            .complete(ChatCompletionRequest {
                endpoint: self.endpoint.clone(),
                api_key: self.api_key.clone(),
                model: GLM_MODEL.to_string(),
                prompt,
            })
            .await
    }
}

#[async_trait]
impl Advisor for GlmAdvisor {
    async fn end_day_review(&self, tasks: &[Task]) -> Result<String, InfraError> {
        let prompt = english_review_prompt(tasks, "Respond in Chinese (Simplified).");
        let content = self.complete(prompt).await?;
        Ok(non_blank_or(content, REVIEW_EMPTY_FALLBACK))
    }

    async fn task_priority_suggestion(&self, tasks: &[Task]) -> Result<Vec<String>, InfraError> {
        let unfinished = unfinished_titles(tasks);
        if unfinished.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = priority_prompt(&unfinished, "Return ONLY a JSON list of strings.");
        let content = self.complete(prompt).await?;
        Ok(extract_priority_list(&content)
            .unwrap_or_else(|| unfinished.into_iter().take(3).collect()))
    }

    async fn schulte_focus_analysis(
        &self,
        results: &[SchulteResult],
    ) -> Result<String, InfraError> {
        if results.is_empty() {
            return Ok(ANALYSIS_NO_RECORDS.to_string());
        }
        let content = self.complete(schulte_prompt(results)).await?;
        Ok(non_blank_or(content, ANALYSIS_EMPTY_FALLBACK))
    }
}

fn unfinished_titles(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .filter(|task| !task.completed)
        .map(|task| task.text.clone())
        .collect()
}

fn chinese_review_prompt(tasks: &[Task]) -> String {
    let completed = tasks.iter().filter(|task| task.completed).count();
    let unfinished = unfinished_titles(tasks);
    format!(
        "用户当天的任务执行情况如下:\n\
         总计任务: {}\n\
         已完成: {}\n\
         未完成: {}\n\
         未完成列表: {}\n\n\
         请以此为据进行智能分析:\n\
         1. 任务评价: 对已完成的工作给予肯定或客观评价。\n\
         2. 进度分析: 分析当前任务分配的合理性或紧迫度。\n\
         3. 安排建议: 针对未完成任务，给出接下来的行动建议或明天的安排。\n\n\
         要求: 语气极简、专业且有启发性。总字数控制在 100 字以内。必须使用中文回答。",
        tasks.len(),
        completed,
        unfinished.len(),
        unfinished.join(", ")
    )
}

fn english_review_prompt(tasks: &[Task], language_note: &str) -> String {
    let completed = tasks.iter().filter(|task| task.completed).count();
    let unfinished = unfinished_titles(tasks);
    format!(
        "The user is ending their day.\n\
         Completed tasks: {}\n\
         Unfinished tasks: {}\n\
         Unfinished task list: {}\n\n\
         Provide a concise, encouraging review (2-3 sentences).\n\
         If there are unfinished tasks, gently suggest how to tackle them tomorrow.\n\
         Keep it motivational and professional. {language_note}",
        completed,
        unfinished.len(),
        unfinished.join(", ")
    )
}

fn priority_prompt(unfinished: &[String], format_instruction: &str) -> String {
    format!(
        "Given these tasks: {}, suggest the top 3 priorities to focus on first to maximize productivity. {format_instruction}",
        unfinished.join(", ")
    )
}

fn schulte_prompt(results: &[SchulteResult]) -> String {
    let stats = results
        .iter()
        .map(|result| {
            format!(
                "{} {}秒",
                result.finished_at.format("%Y-%m-%d"),
                result.time_taken
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "用户最近的舒尔特方格练习记录如下:\n\
         {stats}\n\n\
         请分析用户的专注力状态:\n\
         1. 趋势分析: 时间是变快了还是变慢了？\n\
         2. 专注力评价: 根据时间判断当前的专注程度（平均 20-30 秒为优秀）。\n\
         3. 练习建议: 给出简洁的练习建议。\n\n\
         要求: 语气极简、专业且有启发性。总字数控制在 100 字以内。必须使用中文回答。"
    )
}

fn non_blank_or(content: String, fallback: &str) -> String {
    if content.trim().is_empty() {
        fallback.to_string()
    } else {
        content
    }
}

fn extract_priority_list(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Vec<String>>(&text[start..=end]).ok()
}
