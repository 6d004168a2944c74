use crate::generator::events::StreamEvent;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const PAPER_FILENAME: &str = "paper.md";
pub const TRANSCRIPT_FILENAME: &str = "events.log";

/// 按到达顺序拼装流式输出的文档
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    title: String,
    fragments: Vec<String>,
    transcript: Vec<String>,
}

impl DocumentAssembler {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// 记录一条事件，文档片段追加到正文
    pub fn push(&mut self, event: &StreamEvent) {
        if let StreamEvent::KeepAlive = event {
            return;
        }
        if let StreamEvent::Content { md } = event {
            self.fragments.push(md.clone());
        }
        self.transcript.push(event.to_sse());
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn markdown(&self) -> String {
        let mut document = format!("# {}\n\n", self.title);
        for fragment in &self.fragments {
            document.push_str(fragment);
        }
        document
    }

    pub fn transcript(&self) -> String {
        self.transcript.concat()
    }
}

pub trait Outlet {
    async fn save(&self, document: &DocumentAssembler) -> Result<PathBuf>;
}

pub struct DiskOutlet {
    output_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, document: &DocumentAssembler) -> Result<PathBuf> {
        tracing::info!("🖊️ 文档存储中...");
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output dir: {}", self.output_dir.display())
        })?;

        let paper_path = self.output_dir.join(PAPER_FILENAME);
        fs::write(&paper_path, document.markdown())
            .with_context(|| format!("Failed to write {}", paper_path.display()))?;

        let transcript_path = self.output_dir.join(TRANSCRIPT_FILENAME);
        fs::write(&transcript_path, document.transcript())
            .with_context(|| format!("Failed to write {}", transcript_path.display()))?;

        tracing::info!("💾 已保存文档: {}", paper_path.display());
        Ok(paper_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assembled() -> DocumentAssembler {
        let mut document = DocumentAssembler::new("数字经济研究");
        document.push(&StreamEvent::log("🚀 启动"));
        document.push(&StreamEvent::KeepAlive);
        document.push(&StreamEvent::content("## 绪论\n\n　　正文[1]。\n\n"));
        document.push(&StreamEvent::content("## 参考文献\n\n[1] 张三. 论A. 2020\n\n"));
        document.push(&StreamEvent::Done);
        document
    }

    #[test]
    fn test_markdown_assembly() {
        let document = assembled();
        assert_eq!(document.fragment_count(), 2);
        assert_eq!(
            document.markdown(),
            "# 数字经济研究\n\n## 绪论\n\n　　正文[1]。\n\n## 参考文献\n\n[1] 张三. 论A. 2020\n\n"
        );
        let transcript = document.transcript();
        assert!(!transcript.contains("keep-alive"));
        assert!(transcript.ends_with("data: {\"type\":\"done\"}\n\n"));
    }

    #[tokio::test]
    async fn test_disk_outlet_writes_files() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("out");
        let outlet = DiskOutlet::new(&output_dir);

        let paper_path = outlet.save(&assembled()).await.unwrap();
        assert_eq!(paper_path, output_dir.join(PAPER_FILENAME));
        let paper = fs::read_to_string(&paper_path).unwrap();
        assert!(paper.starts_with("# 数字经济研究\n\n"));
        let transcript = fs::read_to_string(output_dir.join(TRANSCRIPT_FILENAME)).unwrap();
        assert_eq!(transcript.lines().filter(|l| l.starts_with("data: ")).count(), 4);
    }
}
