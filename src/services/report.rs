//! Report orchestration: locate a batch, load it, synthesize a report with the model
//! or offline, and persist it under the platform's `reports` directory.

use log::{error, info, warn};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::context::{prefix_for, RunContext};
use crate::models::{CommentRecord, ContentIndex, ContentRecord};
use crate::services::budget::fit_to_budget;
use crate::services::content_index::build_content_index;
use crate::services::llm::{LlmClient, LlmError};
use crate::services::loader::read_jsonl;
use crate::services::locator::{locate_batch, prefix_from_path, Pairing};
use crate::services::offline::synthesize_offline;
use crate::services::prompt::{render, resolve_template};
use crate::services::sampler::{sample_comments, SamplingLimits};
use crate::settings::Settings;

const INITIAL_TOTAL_LIMIT: usize = 120;
const INITIAL_PER_POST_LIMIT: usize = 5;
const INITIAL_CONTENT_MAX_LEN: usize = 220;
const REPORT_SUFFIX: &str = "_analysis.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// No usable credential, offline synthesis.
    Offline,
    Model,
    /// The model call failed and the offline synthesizer took over.
    OfflineFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub mode: SynthesisMode,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report {0}: {1}")]
    Write(PathBuf, #[source] io::Error),
}

struct LoadedBatch {
    comments: Vec<CommentRecord>,
    index: ContentIndex,
}

pub struct ReportPipeline<'a> {
    config: &'a AppConfig,
    settings: &'a Settings,
}

impl<'a> ReportPipeline<'a> {
    pub fn new(config: &'a AppConfig, settings: &'a Settings) -> Self {
        Self { config, settings }
    }

    /// Generate a report for the latest batch under `<data_root>/<platform>/jsonl`.
    /// `Ok(None)` when no comments/contents pair can be found.
    pub async fn generate_report(
        &self,
        ctx: &RunContext,
        platform: &str,
        crawler_type: &str,
    ) -> Result<Option<GeneratedReport>, ReportError> {
        info!(target: "event", "{}", json!({"stage": "report", "status": "start"}));

        let platform_dir = self.config.platform_dir(platform);
        let jsonl_dir = platform_dir.join("jsonl");
        let target = match ctx.safe_keyword() {
            Some(kw) if jsonl_dir.join(&kw).is_dir() => jsonl_dir.join(kw),
            _ => jsonl_dir,
        };

        let Some(pair) = locate_batch(&target, crawler_type) else {
            info!("no {crawler_type} batch found under {}", target.display());
            return Ok(None);
        };
        if pair.pairing == Pairing::MostRecent {
            warn!(
                "report uses unmatched files {} and {}",
                pair.comments.display(),
                pair.contents.display()
            );
        }
        info!(
            "generating report from {} and {}",
            pair.comments.display(),
            pair.contents.display()
        );

        let batch = self.load(&pair.comments, &pair.contents).await;
        let (report, mode) = self.synthesize(&batch).await;
        let prefix = batch_prefix(&pair.comments, &pair.contents)
            .unwrap_or_else(|| ctx.fallback_prefix());
        let path = persist(&platform_dir.join("reports"), &prefix, &report).await?;
        Ok(Some(GeneratedReport { path, mode }))
    }

    /// Generate a report from explicit file paths. Missing files count as empty.
    /// Reports go to `out_dir`, else to `reports` next to the comments directory.
    pub async fn generate_report_from_paths(
        &self,
        ctx: &RunContext,
        comments_path: &Path,
        contents_path: &Path,
        out_dir: Option<&Path>,
    ) -> Result<GeneratedReport, ReportError> {
        info!(target: "event", "{}", json!({"stage": "report", "status": "start"}));

        let comments_dir = comments_path.parent().unwrap_or_else(|| Path::new(""));
        let reports_dir = match out_dir {
            Some(dir) => dir.to_path_buf(),
            None => comments_dir
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("reports"),
        };

        let batch = self.load(comments_path, contents_path).await;
        let (report, mode) = self.synthesize(&batch).await;
        let prefix = batch_prefix(comments_path, contents_path).unwrap_or_else(|| {
            let dir_name = comments_dir.file_name().and_then(|n| n.to_str());
            prefix_for(dir_name, ctx)
        });
        let path = persist(&reports_dir, &prefix, &report).await?;
        Ok(GeneratedReport { path, mode })
    }

    async fn load(&self, comments_path: &Path, contents_path: &Path) -> LoadedBatch {
        let limit = self.config.analysis_max_lines;
        let comments: Vec<CommentRecord> = read_jsonl(comments_path, limit)
            .await
            .iter()
            .map(CommentRecord::from_object)
            .collect();
        let contents: Vec<ContentRecord> = read_jsonl(contents_path, limit)
            .await
            .iter()
            .map(ContentRecord::from_object)
            .collect();
        let index = build_content_index(&contents);
        info!(
            "loaded {} comments and {} posts ({} indexed)",
            comments.len(),
            contents.len(),
            index.len()
        );
        LoadedBatch { comments, index }
    }

    fn initial_limits(&self) -> SamplingLimits {
        SamplingLimits::new(
            self.config.analysis_max_lines.min(INITIAL_TOTAL_LIMIT),
            INITIAL_PER_POST_LIMIT,
            INITIAL_CONTENT_MAX_LEN,
        )
    }

    async fn synthesize(&self, batch: &LoadedBatch) -> (String, SynthesisMode) {
        let initial = self.initial_limits();
        let Some(api_key) = self.settings.usable_api_key() else {
            info!("no usable model credential, generating offline report");
            let sample = sample_comments(&batch.comments, initial);
            return (synthesize_offline(&sample, &batch.index), SynthesisMode::Offline);
        };

        match self.call_model(api_key, batch, initial).await {
            Ok(text) => (text, SynthesisMode::Model),
            Err(e) => {
                error!("model call failed, falling back to offline report: {e}");
                let sample = sample_comments(&batch.comments, initial);
                (
                    synthesize_offline(&sample, &batch.index),
                    SynthesisMode::OfflineFallback,
                )
            }
        }
    }

    async fn call_model(
        &self,
        api_key: &str,
        batch: &LoadedBatch,
        initial: SamplingLimits,
    ) -> Result<String, LlmError> {
        let budgeted = fit_to_budget(
            &batch.comments,
            &batch.index,
            initial,
            self.config.prompt_max_chars,
        )?;
        if !budgeted.within_budget {
            warn!(
                "payload exceeds {} chars even at {:?}, sending oversized",
                self.config.prompt_max_chars, budgeted.limits
            );
        }
        let template = resolve_template(self.settings, &self.config.prompt_file());
        let prompt = render(&template, &budgeted.payload);

        let client = LlmClient::new(&self.settings.lm, api_key, self.config.lm_timeout)?;
        info!(
            "requesting report from {} ({} sampled comments, {} prompt chars)",
            client.model(),
            budgeted.sample.len(),
            prompt.chars().count()
        );
        client.complete(&prompt).await
    }
}

fn batch_prefix(comments_path: &Path, contents_path: &Path) -> Option<String> {
    prefix_from_path(comments_path).or_else(|| prefix_from_path(contents_path))
}

async fn persist(reports_dir: &Path, prefix: &str, report: &str) -> Result<PathBuf, ReportError> {
    tokio::fs::create_dir_all(reports_dir)
        .await
        .map_err(|e| ReportError::Write(reports_dir.to_path_buf(), e))?;
    let path = reports_dir.join(format!("{prefix}{REPORT_SUFFIX}"));
    tokio::fs::write(&path, report)
        .await
        .map_err(|e| ReportError::Write(path.clone(), e))?;
    info!(
        target: "event",
        "{}",
        json!({"stage": "report", "status": "saved", "path": path.display().to_string()})
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::test_server::{serve_once, serve_silent};
    use chrono::{Local, TimeZone};
    use std::fs;

    fn write_lines(path: &Path, lines: &[serde_json::Value]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let body: Vec<String> = lines.iter().map(|v| v.to_string()).collect();
        fs::write(path, body.join("\n")).unwrap();
    }

    fn seed_batch(dir: &Path, prefix: &str) {
        write_lines(
            &dir.join(format!("{prefix}_comments.jsonl")),
            &[
                json!({"comment_id": "c1", "note_id": "n1", "content": "经常闪退", "like_count": 3}),
                json!({"comment_id": "c2", "note_id": "n2", "content": "同步太慢了", "like_count": "1.2万"}),
                json!({"comment_id": "c3", "note_id": "n1", "content": "推荐大家用", "like_count": 1}),
            ],
        );
        write_lines(
            &dir.join(format!("{prefix}_contents.jsonl")),
            &[
                json!({"note_id": "n1", "note_url": "https://example.com/n1", "title": "好物"}),
                json!({"note_id": "n2", "note_url": "https://example.com/n2", "desc": "吐槽"}),
            ],
        );
    }

    fn config(root: &Path) -> AppConfig {
        AppConfig {
            data_root: root.to_path_buf(),
            settings_path: root.join("system").join("settings.json"),
            ..AppConfig::default()
        }
    }

    fn settings(api_key: &str, api_base: &str) -> Settings {
        let mut settings = Settings::default();
        settings.lm.api_key = api_key.to_string();
        settings.lm.api_base = api_base.to_string();
        settings
    }

    fn ctx(keyword: Option<&str>) -> RunContext {
        let start = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 0).unwrap();
        RunContext::with_start(keyword.map(String::from), start)
    }

    #[tokio::test]
    async fn test_offline_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        seed_batch(&tmp.path().join("xhs").join("jsonl"), "kw");
        let config = config(tmp.path());
        let settings = settings("sk-TEST-0000", "");

        let out = ReportPipeline::new(&config, &settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.mode, SynthesisMode::Offline);
        assert_eq!(out.path, tmp.path().join("xhs").join("reports").join("kw_analysis.md"));
        let report = fs::read_to_string(&out.path).unwrap();
        assert!(report.contains("评论 3 条，覆盖笔记 2 条"));
        assert!(report.contains("体验较好样本：1 条；体验不好样本：2 条"));
        let c2 = report.find("[#c2] 同步太慢了 （https://example.com/n2）").unwrap();
        let c1 = report.find("[#c1] 经常闪退 （https://example.com/n1）").unwrap();
        assert!(c2 < c1);
    }

    #[tokio::test]
    async fn test_model_failure_matches_offline_report() {
        let tmp = tempfile::tempdir().unwrap();
        seed_batch(&tmp.path().join("xhs").join("jsonl"), "kw");
        let config = config(tmp.path());

        let offline_settings = settings("", "");
        let offline = ReportPipeline::new(&config, &offline_settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();
        let offline_text = fs::read_to_string(&offline.path).unwrap();

        let (base, _request) = serve_once("500 Internal Server Error", r#"{"error":"down"}"#).await;
        let failing_settings = settings("sk-live-abcdef123456", &base);
        let fallback = ReportPipeline::new(&config, &failing_settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fallback.mode, SynthesisMode::OfflineFallback);
        assert_eq!(fallback.path, offline.path);
        assert_eq!(fs::read_to_string(&fallback.path).unwrap(), offline_text);
    }

    async fn offline_reference(config: &AppConfig) -> String {
        let offline_settings = settings("", "");
        let offline = ReportPipeline::new(config, &offline_settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();
        fs::read_to_string(&offline.path).unwrap()
    }

    #[tokio::test]
    async fn test_unusable_model_reply_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        seed_batch(&tmp.path().join("xhs").join("jsonl"), "kw");
        let config = config(tmp.path());
        let offline_text = offline_reference(&config).await;

        let bodies = [
            "not json at all",
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        ];
        for body in bodies {
            let (base, _request) = serve_once("200 OK", body).await;
            let model_settings = settings("sk-live-abcdef123456", &base);
            let out = ReportPipeline::new(&config, &model_settings)
                .generate_report(&ctx(None), "xhs", "search")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(out.mode, SynthesisMode::OfflineFallback, "{body}");
            assert_eq!(fs::read_to_string(&out.path).unwrap(), offline_text, "{body}");
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_still_sent() {
        let tmp = tempfile::tempdir().unwrap();
        seed_batch(&tmp.path().join("xhs").join("jsonl"), "kw");
        let mut config = config(tmp.path());
        config.prompt_max_chars = 10;
        let (base, request) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"报告正文"}}]}"#,
        )
        .await;
        let model_settings = settings("sk-live-abcdef123456", &base);

        let out = ReportPipeline::new(&config, &model_settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.mode, SynthesisMode::Model);
        assert_eq!(fs::read_to_string(&out.path).unwrap(), "报告正文");
        assert!(request.await.unwrap().contains("经常闪退"));
    }

    #[tokio::test]
    async fn test_model_timeout_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        seed_batch(&tmp.path().join("xhs").join("jsonl"), "kw");
        let mut config = config(tmp.path());
        config.lm_timeout = std::time::Duration::from_secs(1);
        let offline_text = offline_reference(&config).await;

        let base = serve_silent().await;
        let model_settings = settings("sk-live-abcdef123456", &base);
        let started = std::time::Instant::now();
        let out = ReportPipeline::new(&config, &model_settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();

        assert!(started.elapsed() < std::time::Duration::from_secs(20));
        assert_eq!(out.mode, SynthesisMode::OfflineFallback);
        assert_eq!(fs::read_to_string(&out.path).unwrap(), offline_text);
    }

    #[tokio::test]
    async fn test_model_report_written_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        seed_batch(&tmp.path().join("xhs").join("jsonl"), "kw");
        let config = config(tmp.path());
        let (base, request) = serve_once(
            "200 OK",
            r##"{"choices":[{"message":{"role":"assistant","content":"# 用户反馈分析报告\n\n模型输出"}}]}"##,
        )
        .await;
        let settings = settings("sk-live-abcdef123456", &base);

        let out = ReportPipeline::new(&config, &settings)
            .generate_report(&ctx(None), "xhs", "search")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.mode, SynthesisMode::Model);
        assert_eq!(fs::read_to_string(&out.path).unwrap(), "# 用户反馈分析报告\n\n模型输出");
        let request = request.await.unwrap();
        assert!(request.contains("comments.jsonl"));
        assert!(request.contains("同步太慢了"));
        assert!(!request.contains("{{用户反馈文本}}"));
    }

    #[tokio::test]
    async fn test_no_data() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let settings = Settings::default();
        let pipeline = ReportPipeline::new(&config, &settings);

        assert!(pipeline.generate_report(&ctx(None), "xhs", "search").await.unwrap().is_none());

        write_lines(
            &tmp.path().join("xhs").join("jsonl").join("kw_comments.jsonl"),
            &[json!({"comment_id": "c1"})],
        );
        assert!(pipeline.generate_report(&ctx(None), "xhs", "search").await.unwrap().is_none());
        assert!(!tmp.path().join("xhs").join("reports").exists());
    }

    #[tokio::test]
    async fn test_keyword_dir_and_fallback_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let kw_dir = tmp.path().join("xhs").join("jsonl").join("笔记");
        write_lines(
            &kw_dir.join("comments.jsonl"),
            &[json!({"comment_id": 7, "note_id": "n1", "content": "还不错"})],
        );
        write_lines(&kw_dir.join("contents.jsonl"), &[json!({"note_id": "n1"})]);
        let config = config(tmp.path());
        let settings = Settings::default();

        let out = ReportPipeline::new(&config, &settings)
            .generate_report(&ctx(Some("笔记?")), "xhs", "search")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            out.path,
            tmp.path().join("xhs").join("reports").join("笔记_202503091405_analysis.md")
        );
        let report = fs::read_to_string(&out.path).unwrap();
        assert!(report.contains("- [#7] 还不错"));
    }

    #[tokio::test]
    async fn test_from_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let batch_dir = tmp.path().join("export").join("batch1");
        write_lines(
            &batch_dir.join("comments.jsonl"),
            &[json!({"comment_id": "c1", "note_id": "n1", "content": "太卡顿"})],
        );
        let config = config(tmp.path());
        let settings = Settings::default();
        let pipeline = ReportPipeline::new(&config, &settings);

        let out = pipeline
            .generate_report_from_paths(
                &ctx(None),
                &batch_dir.join("comments.jsonl"),
                &batch_dir.join("contents.jsonl"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            out.path,
            tmp.path().join("export").join("reports").join("batch1_202503091405_analysis.md")
        );
        let report = fs::read_to_string(&out.path).unwrap();
        assert!(report.contains("评论 1 条，覆盖笔记 1 条"));

        let out_dir = tmp.path().join("custom");
        let out = pipeline
            .generate_report_from_paths(
                &ctx(None),
                &tmp.path().join("missing_comments.jsonl"),
                &tmp.path().join("missing_contents.jsonl"),
                Some(&out_dir),
            )
            .await
            .unwrap();
        assert_eq!(out.path, out_dir.join("missing_analysis.md"));
        let report = fs::read_to_string(&out.path).unwrap();
        assert!(report.contains("评论 0 条，覆盖笔记 0 条"));
    }

    #[tokio::test]
    async fn test_write_failure_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();
        let config = config(tmp.path());
        let settings = Settings::default();

        let err = ReportPipeline::new(&config, &settings)
            .generate_report_from_paths(
                &ctx(None),
                &tmp.path().join("a_comments.jsonl"),
                &tmp.path().join("a_contents.jsonl"),
                Some(&blocker),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Write(_, _)));
    }
}
