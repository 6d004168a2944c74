use serde::{Deserialize, Serialize};

/// 推送给消费方的流式事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// 进度日志
    Log { msg: String },
    /// 文档片段（Markdown）
    Content { md: String },
    /// 保活，不携带数据
    #[serde(skip)]
    KeepAlive,
    /// 终止事件
    Done,
}

const SSE_DATA_PREFIX: &str = "data: ";
const SSE_KEEP_ALIVE: &str = ": keep-alive\n\n";

impl StreamEvent {
    pub fn log(msg: impl Into<String>) -> Self {
        StreamEvent::Log { msg: msg.into() }
    }

    pub fn content(md: impl Into<String>) -> Self {
        StreamEvent::Content { md: md.into() }
    }

    /// 渲染为一条SSE消息
    pub fn to_sse(&self) -> String {
        if let StreamEvent::KeepAlive = self {
            return SSE_KEEP_ALIVE.to_string();
        }
        // 以上变体都可以序列化，失败时退化为日志事件
        let payload = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"type\":\"log\",\"msg\":{}}}",
                serde_json::Value::String(format!("事件序列化失败: {}", e))
            )
        });
        format!("{}{}\n\n", SSE_DATA_PREFIX, payload)
    }

    /// 解析一条SSE消息，保活注释解析为 `KeepAlive`
    pub fn parse_sse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.starts_with(':') {
            return Some(StreamEvent::KeepAlive);
        }
        let payload = trimmed.strip_prefix(SSE_DATA_PREFIX.trim_end())?;
        serde_json::from_str(payload.trim()).ok()
    }

    pub fn is_content(&self) -> bool {
        matches!(self, StreamEvent::Content { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            StreamEvent::log("🚀 启动").to_sse(),
            "data: {\"type\":\"log\",\"msg\":\"🚀 启动\"}\n\n"
        );
        assert_eq!(
            StreamEvent::content("## 绪论\n\n").to_sse(),
            "data: {\"type\":\"content\",\"md\":\"## 绪论\\n\\n\"}\n\n"
        );
        assert_eq!(StreamEvent::Done.to_sse(), "data: {\"type\":\"done\"}\n\n");
        assert_eq!(StreamEvent::KeepAlive.to_sse(), ": keep-alive\n\n");
    }

    #[test]
    fn test_parse_sse() {
        let event = StreamEvent::content("正文[1]");
        assert_eq!(StreamEvent::parse_sse(&event.to_sse()), Some(event));
        assert_eq!(
            StreamEvent::parse_sse(": keep-alive\n\n"),
            Some(StreamEvent::KeepAlive)
        );
        assert_eq!(
            StreamEvent::parse_sse("data: {\"type\":\"done\"}"),
            Some(StreamEvent::Done)
        );
        assert_eq!(StreamEvent::parse_sse("garbage"), None);
        assert_eq!(StreamEvent::parse_sse("data: {\"type\":\"unknown\"}"), None);
    }
}
