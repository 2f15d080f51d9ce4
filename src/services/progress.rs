//! 进度事件输出 - 业务能力层
//!
//! 所有组件只通过 `ProgressSink::emit` 报告进度，不直接写控制台。

use crate::models::{EventKind, ProgressEvent};
use std::io::Write;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// 进度事件接收方
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn info(&self, message: String) {
        self.emit(ProgressEvent::info(message));
    }

    fn warning(&self, message: String) {
        self.emit(ProgressEvent::warning(message));
    }

    fn error(&self, message: String) {
        self.emit(ProgressEvent::error(message));
    }
}

/// 通过 tracing 输出进度（默认的终端模式）
#[derive(Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event.kind {
            EventKind::Info => info!("{}", event.message),
            EventKind::Warning => warn!("⚠️ {}", event.message),
            EventKind::Error => error!("❌ {}", event.message),
            EventKind::Success => info!("✅ {}", event.message),
        }
    }
}

/// 以换行分隔的 JSON 输出进度，适合流式转发给调用方
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ProgressSink for JsonLinesSink<W> {
    fn emit(&self, event: ProgressEvent) {
        let line = event.to_json_line();
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = writer.write_all(line.as_bytes());
        if let Err(e) = written.and_then(|_| writer.flush()) {
            warn!("进度事件写入失败: {}", e);
        }
    }
}

/// 把事件保存在内存中，供调用方事后检查
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 指定类别的事件消息
    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message)
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
