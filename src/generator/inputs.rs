//! 读取生成所需的输入：大纲、参考文献、用户数据

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::generator::orchestrator::GenerationRequest;
use crate::references::ReferenceStore;
use crate::types::outline::Outline;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("未指定论文题目")]
    MissingTitle,
    #[error("未指定大纲文件")]
    MissingOutline,
    #[error("大纲为空: {0}")]
    EmptyOutline(PathBuf),
    #[error("数据文件通配符无效: {0}")]
    InvalidPattern(String),
}

/// 读取大纲JSON
pub fn load_outline(path: &Path) -> Result<Outline> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read outline file: {}", path.display()))?;
    let outline = Outline::from_json(&json)?;
    if outline.is_empty() {
        return Err(InputError::EmptyOutline(path.to_path_buf()).into());
    }
    Ok(outline)
}

pub(crate) fn read_optional(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        None => Ok(String::new()),
    }
}

/// 读取国内、国外两份文献列表
pub fn load_references(domestic: Option<&Path>, foreign: Option<&Path>) -> Result<ReferenceStore> {
    let domestic = read_optional(domestic)?;
    let foreign = read_optional(foreign)?;
    Ok(ReferenceStore::from_lists(&domestic, &foreign))
}

/// 展开数据文件通配符；不含通配符的路径原样保留
pub fn expand_data_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let paths =
                glob::glob(pattern).map_err(|_| InputError::InvalidPattern(pattern.clone()))?;
            let before = files.len();
            files.extend(paths.filter_map(|entry| entry.ok()));
            if files.len() == before {
                tracing::warn!("⚠️ 没有匹配的数据文件: {}", pattern);
            }
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}

/// 合并用户数据文本与各数据文件内容，读取失败的文件记入说明而不中断
pub fn load_user_data(custom_data: Option<&Path>, data_files: &[PathBuf]) -> Result<String> {
    let mut blob = read_optional(custom_data)?;
    if data_files.is_empty() {
        return Ok(blob);
    }

    tracing::info!("📂 正在读取 {} 个数据文件...", data_files.len());
    let mut extracted = String::new();
    for path in data_files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        match fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!("🔍 [解析结果] {} (len={})", name, text.chars().count());
                extracted.push_str(&text);
                extracted.push_str("\n\n");
            }
            Err(e) => {
                tracing::warn!("⚠️ 文件 {} 解析失败: {}", name, e);
                extracted.push_str(&format!("\n文件 {} 解析失败: {}\n", name, e));
            }
        }
    }
    blob.push('\n');
    blob.push_str(&extracted);
    Ok(blob)
}

/// 按配置组装生成请求
pub fn prepare_request(config: &Config) -> Result<GenerationRequest> {
    if config.title.trim().is_empty() {
        return Err(InputError::MissingTitle.into());
    }
    let outline_path = config.outline_path.as_deref().ok_or(InputError::MissingOutline)?;

    let outline = load_outline(outline_path)?;
    let store = load_references(
        config.ref_domestic_path.as_deref(),
        config.ref_foreign_path.as_deref(),
    )?;
    let data_files = expand_data_files(&config.data_files)?;
    let user_data = load_user_data(config.custom_data_path.as_deref(), &data_files)?;

    tracing::info!(
        "📄 大纲 {} 节，参考文献 {} 篇",
        outline.len(),
        store.len()
    );

    Ok(GenerationRequest {
        title: config.title.trim().to_string(),
        outline,
        store,
        user_data,
        initial_context: config.effective_initial_context(),
        extra_instructions: config.extra_instructions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_prepare_request() {
        let dir = TempDir::new().unwrap();
        let outline = write(
            &dir,
            "outline.json",
            r#"[{"title": "国内研究现状", "words": 500}, {"title": "结论", "words": 200}]"#,
        );
        let domestic = write(&dir, "cn.txt", "[1] 张三. 论A. 2020\n\n");
        let foreign = write(&dir, "en.txt", "1. Smith. On B. 2019");
        let data = write(&dir, "data.txt", "2023年营收12亿元");

        let config = Config {
            title: " 数字经济研究 ".to_string(),
            outline_path: Some(outline),
            ref_domestic_path: Some(domestic),
            ref_foreign_path: Some(foreign),
            custom_data_path: Some(data),
            ..Default::default()
        };

        let request = prepare_request(&config).unwrap();
        assert_eq!(request.title, "数字经济研究");
        assert_eq!(request.outline.len(), 2);
        assert_eq!(request.outline.nodes()[1].order_index, 1);
        assert_eq!(request.store.len(), 2);
        assert_eq!(request.store.references()[0].raw_text, "张三. 论A. 2020");
        assert_eq!(request.store.references()[1].raw_text, "Smith. On B. 2019");
        assert_eq!(request.user_data, "2023年营收12亿元");
        assert_eq!(request.initial_context, "论文题目：《数字经济研究》");
    }

    #[test]
    fn test_missing_title_and_outline() {
        let err = prepare_request(&Config::default()).unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::MissingTitle));

        let config = Config {
            title: "题目".to_string(),
            ..Default::default()
        };
        let err = prepare_request(&config).unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::MissingOutline));
    }

    #[test]
    fn test_empty_outline_is_rejected() {
        let dir = TempDir::new().unwrap();
        let outline = write(&dir, "outline.json", "[]");
        let err = load_outline(&outline).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::EmptyOutline(_))));
    }

    #[test]
    fn test_data_files_glob_and_failures() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.csv", "年份,产值\n2022,10");
        write(&dir, "b.csv", "年份,产值\n2023,12");
        fs::write(dir.path().join("c.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let pattern = format!("{}/*.csv", dir.path().display());
        let mut files = expand_data_files(&[pattern]).unwrap();
        files.sort();
        assert_eq!(files.len(), 2);

        files.push(dir.path().join("c.bin"));
        let blob = load_user_data(None, &files).unwrap();
        assert!(blob.contains("2022,10"));
        assert!(blob.contains("2023,12"));
        assert!(blob.contains("文件 c.bin 解析失败"));
    }
}
