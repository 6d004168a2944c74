#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::config::LLMProvider;
    use crate::i18n::TargetLanguage;
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_args_default_values() {
        let args = Args::try_parse_from(["paperwriter-rs"]).unwrap();

        assert!(args.title.is_none());
        assert!(args.outline.is_none());
        assert!(args.output_path.is_none());
        assert!(args.data_files.is_empty());
        assert!(args.total_words.is_none());
        assert!(!args.verbose);
        assert!(!args.no_fact_research);
    }

    #[test]
    fn test_args_input_options() {
        let args = Args::try_parse_from([
            "paperwriter-rs",
            "-t", "数字经济研究",
            "--outline", "/tmp/outline.json",
            "--ref-domestic", "/tmp/cn.txt",
            "--ref-foreign", "/tmp/en.txt",
            "--data-file", "/tmp/data/*.csv",
            "--data-file", "/tmp/report.txt",
            "-o", "/tmp/out",
            "--total-words", "12000",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.title, Some("数字经济研究".to_string()));
        assert_eq!(args.outline, Some(PathBuf::from("/tmp/outline.json")));
        assert_eq!(args.ref_domestic, Some(PathBuf::from("/tmp/cn.txt")));
        assert_eq!(args.ref_foreign, Some(PathBuf::from("/tmp/en.txt")));
        assert_eq!(args.data_files, vec!["/tmp/data/*.csv", "/tmp/report.txt"]);
        assert_eq!(args.output_path, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.total_words, Some(12000));
        assert!(args.verbose);
    }

    #[test]
    fn test_args_llm_options() {
        let args = Args::try_parse_from([
            "paperwriter-rs",
            "--llm-provider", "deepseek",
            "--llm-api-key", "test-key",
            "--llm-api-base-url", "https://api.deepseek.com/v1",
            "--model-efficient", "deepseek-chat",
            "--model-powerful", "deepseek-reasoner",
            "--max-tokens", "2048",
            "--temperature", "0.7",
            "--max-parallels", "5",
        ])
        .unwrap();

        assert_eq!(args.llm_provider, Some("deepseek".to_string()));
        assert_eq!(args.llm_api_key, Some("test-key".to_string()));
        assert_eq!(args.model_powerful, Some("deepseek-reasoner".to_string()));
        assert_eq!(args.max_tokens, Some(2048));
        assert_eq!(args.temperature, Some(0.7));
        assert_eq!(args.max_parallels, Some(5));
    }

    #[test]
    fn test_into_config_with_overrides() {
        let args = Args::try_parse_from([
            "paperwriter-rs",
            "-t", "数字经济研究",
            "--llm-provider", "moonshot",
            "--model-efficient", "kimi-latest",
            "--max-parallels", "0",
            "--no-fact-research",
            "--task-id", "job-1",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.title, "数字经济研究");
        assert_eq!(config.llm.provider, LLMProvider::Moonshot);
        assert_eq!(config.llm.model_efficient, "kimi-latest");
        // 只指定efficient时兜底模型与之相同
        assert_eq!(config.llm.model_powerful, "kimi-latest");
        assert_eq!(config.generation.max_parallels, 1);
        assert!(!config.generation.fact_research);
        assert_eq!(config.resolve_task_id(), "job-1");
        assert_eq!(config.target_language, TargetLanguage::Chinese);
    }

    #[test]
    fn test_target_language_detection_and_override() {
        let args = Args::try_parse_from(["paperwriter-rs", "-t", "Digital Economy"]).unwrap();
        assert_eq!(args.into_config().unwrap().target_language, TargetLanguage::English);

        let args = Args::try_parse_from([
            "paperwriter-rs",
            "-t", "Digital Economy",
            "--target-language", "zh",
        ])
        .unwrap();
        assert_eq!(args.into_config().unwrap().target_language, TargetLanguage::Chinese);

        // 无法识别的语言保留原值
        let args = Args::try_parse_from(["paperwriter-rs", "--target-language", "ja"]).unwrap();
        assert_eq!(args.into_config().unwrap().target_language, TargetLanguage::Chinese);
    }

    #[test]
    fn test_into_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("paperwriter.toml");
        fs::write(
            &config_path,
            r#"
title = "Platform Governance"
target_language = "en"

[generation]
max_parallels = 3
"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "paperwriter-rs",
            "-c", config_path.to_str().unwrap(),
            "-o", "/tmp/paper",
        ])
        .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.title, "Platform Governance");
        assert_eq!(config.target_language, TargetLanguage::English);
        assert_eq!(config.generation.max_parallels, 3);
        assert_eq!(config.output_path, PathBuf::from("/tmp/paper"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = Args::try_parse_from(["paperwriter-rs", "-c", "/nonexistent/paperwriter.toml"])
            .unwrap();
        let err = args.into_config().unwrap_err();
        assert!(format!("{:#}", err).contains("无法读取配置文件"));
    }

    #[test]
    fn test_rewrite_target() {
        let args = Args::try_parse_from(["paperwriter-rs", "-t", "数字经济研究"]).unwrap();
        assert!(args.rewrite_target().is_none());

        let args = Args::try_parse_from([
            "paperwriter-rs",
            "--rewrite-section", "2.1 发展现状",
            "--rewrite-instruction", "补充统计数据",
            "--rewrite-original", "/tmp/section.md",
        ])
        .unwrap();
        let target = args.rewrite_target().unwrap();
        assert_eq!(target.section_title, "2.1 发展现状");
        assert_eq!(target.instruction, "补充统计数据");
        assert_eq!(target.original_path, Some(PathBuf::from("/tmp/section.md")));
        assert!(target.context_path.is_none());
    }

    #[test]
    fn test_rewrite_flags_require_each_other() {
        assert!(Args::try_parse_from(["paperwriter-rs", "--rewrite-section", "结论"]).is_err());
        assert!(
            Args::try_parse_from(["paperwriter-rs", "--rewrite-instruction", "精简表达"]).is_err()
        );
        assert!(
            Args::try_parse_from(["paperwriter-rs", "--rewrite-original", "/tmp/a.md"]).is_err()
        );
    }
}
