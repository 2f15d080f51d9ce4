use serde::Serialize;

/// 进度事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Warning,
    Error,
    Success,
}

/// 进度事件，序列化为一行 JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

impl ProgressEvent {
    fn with_kind(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            results_count: None,
            output_file: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_kind(EventKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_kind(EventKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_kind(EventKind::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_kind(EventKind::Success, message)
    }

    /// 附带结果统计（用于批改完成事件）
    pub fn with_results(mut self, count: usize, output_file: impl Into<String>) -> Self {
        self.results_count = Some(count);
        self.output_file = Some(output_file.into());
        self
    }

    /// 序列化为一行 JSON（带换行）
    pub fn to_json_line(&self) -> String {
        let mut line = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"事件序列化失败"}"#.to_string());
        line.push('\n');
        line
    }
}
