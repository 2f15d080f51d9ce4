//! LLM 服务 - 业务能力层
//!
//! 在 `TextGenerator` 之上统一处理超时和重试，分组、评分、总结都通过它调用模型。

use crate::clients::{ChatMessage, TextGenerator};
use crate::config::Config;
use crate::error::LlmError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// LLM 服务
#[derive(Clone)]
pub struct LlmService {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
    request_timeout: Duration,
    max_attempts: usize,
    retry_delay: Duration,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self {
            generator,
            temperature: config.llm_temperature,
            request_timeout: Duration::from_secs(config.llm_timeout_secs),
            max_attempts: config.llm_max_attempts.max(1),
            retry_delay: Duration::from_secs(2),
        }
    }

    /// 自定义超时和重试参数
    pub fn with_limits(
        generator: Arc<dyn TextGenerator>,
        request_timeout: Duration,
        max_attempts: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            generator,
            temperature: 0.1,
            request_timeout,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 去掉首尾空白的回复文本（可能为空）；所有尝试都失败时返回最后一次的错误
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys_msg) = system_message {
            messages.push(ChatMessage::system(sys_msg));
        }
        messages.push(ChatMessage::user(user_message));

        debug!(
            "调用 LLM，模型: {}，用户消息长度: {} 字符",
            self.model_name(),
            user_message.chars().count()
        );

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                sleep(self.retry_delay).await;
            }

            let call = self.generator.generate(&messages, self.temperature);
            let error = match timeout(self.request_timeout, call).await {
                Ok(Ok(text)) => return Ok(text.trim().to_string()),
                Ok(Err(e)) => e,
                Err(_) => LlmError::Timeout {
                    model: self.model_name().to_string(),
                    seconds: self.request_timeout.as_secs(),
                },
            };

            warn!(
                "LLM 调用失败 (尝试 {}/{}): {}",
                attempt, self.max_attempts, error
            );
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| LlmError::EmptyContent {
            model: self.model_name().to_string(),
        }))
    }
}
