use async_trait::async_trait;
use homework_grader::clients::{ChatMessage, TextGenerator};
use homework_grader::error::LlmError;
use homework_grader::models::EventKind;
use homework_grader::services::archive_collector::repair_if_needed;
use homework_grader::services::{JsonLinesSink, RecordingSink};
use homework_grader::{App, AssignmentType, Config, FinalScore};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::SimpleFileOptions;

/// 模拟的大模型：
/// - 分组请求：提示词中的每个文件单独成一题
/// - 评分请求：固定 80 分
/// - 总结请求：固定文本
/// - 提示词中出现 `BROKEN` 时所有请求都失败
struct ScriptedGenerator;

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, messages: &[ChatMessage], _: f32) -> Result<String, LlmError> {
        let prompt = &messages[messages.len() - 1].content;
        if prompt.contains("BROKEN") {
            return Err(LlmError::api_call_failed("scripted", "503 Service Unavailable"));
        }

        if prompt.contains("返回分组结果") {
            let reply = prompt
                .lines()
                .filter_map(|line| line.strip_prefix("文件名: "))
                .enumerate()
                .map(|(i, name)| {
                    format!(
                        "[<question>q{}</question>, <files>[{}]</files>]",
                        i + 1,
                        name.trim()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(reply);
        }

        if prompt.contains("批改下面这一道题") {
            return Ok("[<question>1</question>, <score>80</score>]".to_string());
        }

        Ok("代码结构清晰，注意边界条件。".to_string())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn test_config(root: &Path, num_questions: usize) -> Config {
    let search_dir = root.join("submissions");
    fs::create_dir_all(&search_dir).unwrap();
    Config {
        search_dir,
        staging_dir: root.join("collected_zips"),
        output_dir: root.join("out"),
        scratch_root: Some(root.join("scratch")),
        requirements: "1. 实现加法；2. 实现减法".to_string(),
        num_questions,
        assignment_type: AssignmentType::Lab,
        encodings: vec!["utf-8".to_string(), "gbk".to_string()],
        llm_api_key: "sk-test".to_string(),
        llm_max_attempts: 1,
        ..Default::default()
    }
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let bytes = fs::read(path).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"), "结果表应带 BOM");
    let mut reader = csv::Reader::from_reader(&bytes[3..]);
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_one_row_per_archive() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), 2);
    let search = config.search_dir.clone();

    fs::write(
        search.join("2023001张三.zip"),
        zip_bytes(&[("q1/add.cpp", "int add(int a, int b) { return a + b; }"), ("q2/sub.cpp", "int sub(int a, int b) { return a - b; }")]),
    )
    .unwrap();

    let mut prefixed = b"Content-Type: application/zip\r\n\r\n".to_vec();
    prefixed.extend(zip_bytes(&[("main.cpp", "int main() {}")]));
    fs::write(search.join("2023002李四.zip"), prefixed).unwrap();

    fs::write(search.join("notes.rar"), b"not collected").unwrap();
    fs::write(search.join("._2023001张三.zip"), b"metadata").unwrap();

    let app = App::initialize(config.clone(), Arc::new(ScriptedGenerator)).unwrap();
    let sink = RecordingSink::new();
    let report = app.run(&sink).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].final_score, FinalScore::Numeric(80));
    assert_eq!(report.results[1].final_score, FinalScore::Insufficient);

    let rows = read_rows(&report.output_file);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][..3], ["2023001", "张三", "80"]);
    assert_eq!(rows[0][3], "代码结构清晰，注意边界条件。");
    assert_eq!(rows[1][..3], ["2023002", "李四", "-2"]);

    // 暂存目录由本次运行创建，结束后删除
    assert!(!config.staging_dir.exists());
    // 原始文件不受影响
    assert!(search.join("2023001张三.zip").exists());

    let successes = sink.messages(EventKind::Success);
    assert_eq!(successes.len(), 1);
    assert!(successes[0].contains("共处理 2 份作业"));
}

#[tokio::test]
async fn test_failures_still_produce_rows() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), 1);
    let search = config.search_dir.clone();

    // 1. 正常作业
    fs::write(
        search.join("2023001张三.zip"),
        zip_bytes(&[("main.cpp", "int main() { return 0; }")]),
    )
    .unwrap();
    // 2. 没有 ZIP 签名，原样复制后无法打开
    fs::write(search.join("2023002李四.zip"), b"this is not an archive").unwrap();
    // 3. 所有 LLM 请求都失败
    fs::write(
        search.join("2023003王五.zip"),
        zip_bytes(&[("main.cpp", "// BROKEN\nint main() {}")]),
    )
    .unwrap();

    let app = App::initialize(config, Arc::new(ScriptedGenerator)).unwrap();
    let sink = RecordingSink::new();
    let report = app.run(&sink).await.unwrap();

    let rows = read_rows(&report.output_file);
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0][..3], ["2023001", "张三", "80"]);

    assert_eq!(rows[1][..3], ["2023002", "李四", "-1"]);
    assert_eq!(rows[1][3], "无效的ZIP文件");

    // 分组退回默认分组，评分为 -99 被排除，总分为 0，反馈为失败原因
    assert_eq!(rows[2][..3], ["2023003", "王五", "0"]);
    assert!(rows[2][3].starts_with("LLM反馈生成失败: "));

    assert!(!sink.messages(EventKind::Error).is_empty());
    assert_eq!(report.failed_count(), 1);
}

#[tokio::test]
async fn test_same_name_in_different_folders() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), 1);

    for class in ["一班", "二班"] {
        let dir = config.search_dir.join(class);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("2023001张三.zip"),
            zip_bytes(&[("main.cpp", "int main() {}")]),
        )
        .unwrap();
    }

    let app = App::initialize(config, Arc::new(ScriptedGenerator)).unwrap();
    let report = app.run(&RecordingSink::new()).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.student_id == "2023001" && r.final_score == FinalScore::Numeric(80)));
}

#[tokio::test]
async fn test_json_progress_stream() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), 1);
    fs::write(
        config.search_dir.join("2023001张三.zip"),
        zip_bytes(&[("main.cpp", "int main() {}")]),
    )
    .unwrap();

    let app = App::initialize(config, Arc::new(ScriptedGenerator)).unwrap();
    let sink = JsonLinesSink::new(Vec::new());
    let report = app.run(&sink).await.unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let events: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(events[0]["type"], "info");
    let last = events.last().unwrap();
    assert_eq!(last["type"], "success");
    assert_eq!(last["results_count"], 1);
    assert_eq!(
        last["output_file"],
        report.output_file.display().to_string()
    );
}

#[tokio::test]
async fn test_preexisting_staging_dir_is_kept() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), 1);
    fs::create_dir_all(&config.staging_dir).unwrap();
    fs::write(config.staging_dir.join("keep.me"), b"x").unwrap();
    fs::write(
        config.search_dir.join("2023001张三.zip"),
        zip_bytes(&[("main.cpp", "int main() {}")]),
    )
    .unwrap();

    let app = App::initialize(config.clone(), Arc::new(ScriptedGenerator)).unwrap();
    app.run(&RecordingSink::new()).await.unwrap();

    let left: Vec<PathBuf> = fs::read_dir(&config.staging_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(left, vec![config.staging_dir.join("keep.me")]);
}

#[test]
fn test_repair_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut corrupted = b"\x00\x01junk".to_vec();
    corrupted.extend(zip_bytes(&[("a.cpp", "int a;")]));
    let src = dir.path().join("in.zip");
    fs::write(&src, &corrupted).unwrap();

    let once = dir.path().join("once.zip");
    let twice = dir.path().join("twice.zip");
    repair_if_needed(&src, &once).unwrap();
    repair_if_needed(&once, &twice).unwrap();

    assert_eq!(fs::read(&once).unwrap(), fs::read(&twice).unwrap());
}

#[test]
fn test_invalid_config_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path(), 1);
    config.llm_api_key.clear();

    let err = App::initialize(config, Arc::new(ScriptedGenerator)).err().unwrap();
    assert!(err.to_string().contains("llm_api_key"));
}
