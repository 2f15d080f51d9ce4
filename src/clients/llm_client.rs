//! 文本生成客户端
//!
//! `TextGenerator` 是与外部大模型交互的唯一接口：有序的角色消息进，一段文本出，
//! 可能失败。`OpenAiTextGenerator` 通过 `async-openai` 调用任何兼容 OpenAI 的服务
//! （通义千问、豆包、Gemini 代理等）。

use crate::config::Config;
use crate::error::LlmError;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// 一条对话消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 外部文本生成能力
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 发送消息列表，返回完整的回复文本
    async fn generate(&self, messages: &[ChatMessage], temperature: f32)
        -> Result<String, LlmError>;

    /// 模型名称（用于日志和错误信息）
    fn model_name(&self) -> &str;
}

/// 基于 async-openai 的文本生成客户端
pub struct OpenAiTextGenerator {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    stream: bool,
}

impl OpenAiTextGenerator {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
            stream: config.llm_stream,
        }
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut request_messages = Vec::with_capacity(messages.len());

        for message in messages {
            let built = match message.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(message.content.as_str())
                        .build()
                        .map_err(LlmError::request_build)?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(message.content.as_str())
                        .build()
                        .map_err(LlmError::request_build)?,
                ),
            };
            request_messages.push(built);
        }

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(request_messages)
            .temperature(temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(LlmError::request_build)
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<String, LlmError> {
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::api_call_failed(&self.model_name, e)
        })?;

        first_choice_content(&response, &self.model_name)
    }

    /// 流式调用，把所有片段拼接成一段文本
    async fn complete_streamed(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<String, LlmError> {
        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| LlmError::api_call_failed(&self.model_name, e))?;

        let mut text = String::new();
        let mut fragments = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::api_call_failed(&self.model_name, e))?;
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content {
                    text.push_str(&content);
                    fragments += 1;
                }
            }
        }
        debug!("流式响应共 {} 个片段", fragments);

        Ok(text)
    }
}

/// 取第一个候选的文本；候选存在但没有内容时视为空回复
fn first_choice_content(
    response: &CreateChatCompletionResponse,
    model: &str,
) -> Result<String, LlmError> {
    match response.choices.first() {
        Some(choice) => Ok(choice.message.content.clone().unwrap_or_default()),
        None => Err(LlmError::EmptyContent {
            model: model.to_string(),
        }),
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);

        let request = self.build_request(messages, temperature)?;
        let content = if self.stream {
            self.complete_streamed(request).await?
        } else {
            self.complete(request).await?
        };

        debug!("LLM API 调用成功");
        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
