//! 题目分组服务 - 业务能力层
//!
//! 让 LLM 按作业要求把一份作业的源文件划分到各道题目，解析回复并按依赖关系
//! 累积文件。任何失败都退回默认分组（每个文件单独一组），不会向上抛错。

use crate::models::{QuestionGroup, SourceDocument};
use crate::services::progress::ProgressSink;
use crate::services::prompts::{grouping_prompt, GROUPING_SYSTEM};
use crate::services::LlmService;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// `[<question>q1</question>, <extends>q0</extends>, <files>[a.cpp, b.cpp]</files>]`，`<extends>` 可省略
const GROUP_PATTERN: &str =
    r"(?s)\[<question>([^<]+)</question>\s*,\s*(?:<extends>([^<]*)</extends>\s*,\s*)?<files>(.*?)</files>\]";

/// 回复中的一条分组声明（尚未解析文件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDeclaration {
    pub question_id: String,
    pub extends: Option<String>,
    pub file_names: Vec<String>,
}

/// 题目分组服务
#[derive(Clone)]
pub struct QuestionGrouper {
    llm: LlmService,
    preview_chars: usize,
}

impl QuestionGrouper {
    pub fn new(llm: LlmService, preview_chars: usize) -> Self {
        Self { llm, preview_chars }
    }

    /// 对一份作业的源文件分组
    pub async fn group(
        &self,
        docs: &[SourceDocument],
        requirements: &str,
        sink: &dyn ProgressSink,
    ) -> Vec<QuestionGroup> {
        if docs.is_empty() {
            return Vec::new();
        }

        info!("正在对 {} 个文件分组，请稍等...", docs.len());
        let prompt = grouping_prompt(&self.describe_files(docs), requirements);

        let reply = match self.llm.send_to_llm(&prompt, Some(GROUPING_SYSTEM)).await {
            Ok(reply) => reply,
            Err(e) => {
                sink.warning(format!("LLM分组失败，每个文件单独成组: {}", e));
                return default_groups(docs);
            }
        };
        debug!("LLM文件分组结果: {}", reply);

        let groups = build_groups(&parse_declarations(&reply), docs);
        if groups.is_empty() {
            sink.warning("未找到有效的分组格式，每个文件单独成组".to_string());
            return default_groups(docs);
        }

        for group in &groups {
            debug!("题目 '{}': {:?}", group.question_id, group.file_names());
        }
        groups
    }

    fn describe_files(&self, docs: &[SourceDocument]) -> String {
        docs.iter()
            .map(|doc| {
                let preview: String = doc.text.chars().take(self.preview_chars).collect();
                format!(
                    "文件路径: {}\n文件名: {}\n内容预览: {}...\n",
                    doc.path.display(),
                    doc.file_name(),
                    preview
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 从回复中提取所有分组声明
pub fn parse_declarations(reply: &str) -> Vec<GroupDeclaration> {
    let re = match Regex::new(GROUP_PATTERN) {
        Ok(re) => re,
        Err(e) => {
            warn!("分组正则表达式无效: {}", e);
            return Vec::new();
        }
    };

    re.captures_iter(reply)
        .map(|caps| {
            let question_id = caps[1].trim().to_string();
            let extends = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            let file_names = split_file_list(&caps[3]);
            GroupDeclaration {
                question_id,
                extends,
                file_names,
            }
        })
        .collect()
}

/// `[a.cpp, "b.cpp"]` -> `["a.cpp", "b.cpp"]`
fn split_file_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|token| {
            token
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// 把分组声明解析成文件分组
///
/// - 文件名按 basename 匹配本作业的文件，同名文件以最后一个为准
/// - 找不到的文件跳过；声明了文件却一个都找不到的分组整体丢弃
/// - 明确声明为空的分组保留
/// - 重复的题号合并
/// - 最后沿 `<extends>` 依赖链累积文件
pub fn build_groups(declarations: &[GroupDeclaration], docs: &[SourceDocument]) -> Vec<QuestionGroup> {
    let mut index: HashMap<String, &SourceDocument> = HashMap::new();
    for doc in docs {
        index.insert(doc.file_name(), doc);
    }

    let mut groups: Vec<(QuestionGroup, Option<String>)> = Vec::new();
    for decl in declarations {
        let mut files = Vec::new();
        for name in &decl.file_names {
            match resolve(&index, name) {
                Some(doc) => files.push((doc.file_name(), doc.text.clone())),
                None => warn!("警告: 文件 '{}' 在提取的文件中不存在", name),
            }
        }

        if !decl.file_names.is_empty() && files.is_empty() {
            warn!("警告: 分组 '{}' 没有找到有效文件，已丢弃", decl.question_id);
            continue;
        }

        match groups
            .iter_mut()
            .find(|(g, _)| g.question_id == decl.question_id)
        {
            Some((existing, extends)) => {
                for file in files {
                    push_unique(&mut existing.files, file);
                }
                if extends.is_none() {
                    *extends = decl.extends.clone();
                }
            }
            None => {
                let mut group = QuestionGroup::new(decl.question_id.clone());
                for file in files {
                    push_unique(&mut group.files, file);
                }
                groups.push((group, decl.extends.clone()));
            }
        }
    }

    accumulate_dependencies(groups)
}

fn resolve<'a>(
    index: &HashMap<String, &'a SourceDocument>,
    name: &str,
) -> Option<&'a SourceDocument> {
    if let Some(doc) = index.get(name) {
        return Some(*doc);
    }
    let base = Path::new(name).file_name()?.to_string_lossy();
    index.get(base.as_ref()).copied()
}

fn push_unique(files: &mut Vec<(String, String)>, file: (String, String)) {
    if !files.iter().any(|(name, _)| *name == file.0) {
        files.push(file);
    }
}

/// 每个分组的文件 = 祖先分组的文件（从根开始）+ 自己的文件，去重保序
fn accumulate_dependencies(groups: Vec<(QuestionGroup, Option<String>)>) -> Vec<QuestionGroup> {
    let position: HashMap<&str, usize> = groups
        .iter()
        .enumerate()
        .map(|(i, (g, _))| (g.question_id.as_str(), i))
        .collect();

    let mut result = Vec::with_capacity(groups.len());
    for (group, extends) in &groups {
        let mut ancestors = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([group.question_id.as_str()]);
        let mut parent = extends.as_deref();

        while let Some(id) = parent {
            if !visited.insert(id) {
                warn!("题目 '{}' 的依赖存在循环，在 '{}' 处截断", group.question_id, id);
                break;
            }
            let Some(&pos) = position.get(id) else {
                warn!("题目 '{}' 依赖的题目 '{}' 不存在，已忽略", group.question_id, id);
                break;
            };
            ancestors.push(pos);
            parent = groups[pos].1.as_deref();
        }

        let mut accumulated = QuestionGroup::new(group.question_id.clone());
        for &pos in ancestors.iter().rev() {
            for file in &groups[pos].0.files {
                push_unique(&mut accumulated.files, file.clone());
            }
        }
        for file in &group.files {
            push_unique(&mut accumulated.files, file.clone());
        }
        result.push(accumulated);
    }

    result
}

/// 默认分组：每个文件单独一组，依次编号为 files1、files2……
pub fn default_groups(docs: &[SourceDocument]) -> Vec<QuestionGroup> {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| QuestionGroup {
            question_id: format!("files{}", i + 1),
            files: vec![(doc.file_name(), doc.text.clone())],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ChatMessage, TextGenerator};
    use crate::error::LlmError;
    use crate::services::progress::RecordingSink;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn doc(path: &str, text: &str) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from(path),
            text: text.to_string(),
            encoding: "UTF-8",
        }
    }

    fn docs() -> Vec<SourceDocument> {
        vec![
            doc("/tmp/s/q1/a.cpp", "A"),
            doc("/tmp/s/q2/b.cpp", "B"),
            doc("/tmp/s/q3/c.cpp", "C"),
        ]
    }

    struct FixedReply(Result<String, ()>);

    #[async_trait]
    impl TextGenerator for FixedReply {
        async fn generate(&self, _: &[ChatMessage], _: f32) -> Result<String, LlmError> {
            self.0
                .clone()
                .map_err(|_| LlmError::api_call_failed("fixed", "down"))
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn grouper(reply: Result<&str, ()>) -> QuestionGrouper {
        let generator = Arc::new(FixedReply(reply.map(str::to_string)));
        let llm = LlmService::with_limits(generator, Duration::from_secs(5), 1, Duration::ZERO);
        QuestionGrouper::new(llm, 200)
    }

    #[test]
    fn test_parse_declarations() {
        let reply = r#"分组如下：
[<question>q1</question>, <files>[a.cpp, "b.cpp"]</files>]
[<question>q2</question>, <extends>q1</extends>, <files>[c.cpp]</files>]
[<question>q5</question>, <files></files>]"#;
        let decls = parse_declarations(reply);
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].file_names, vec!["a.cpp", "b.cpp"]);
        assert_eq!(decls[1].extends.as_deref(), Some("q1"));
        assert!(decls[2].file_names.is_empty());
    }

    #[test]
    fn test_unresolvable_group_dropped_but_declared_empty_kept() {
        let reply = "[<question>q1</question>, <files>[a.cpp, ghost.cpp]</files>]\n\
                     [<question>q2</question>, <files>[ghost.cpp]</files>]\n\
                     [<question>q3</question>, <files></files>]";
        let groups = build_groups(&parse_declarations(reply), &docs());
        let ids: Vec<&str> = groups.iter().map(|g| g.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3"]);
        assert_eq!(groups[0].file_names(), vec!["a.cpp"]);
        assert!(groups[1].files.is_empty());
    }

    #[test]
    fn test_extends_accumulates_files() {
        let reply = "[<question>q1</question>, <files>[a.cpp]</files>]\n\
                     [<question>q2</question>, <extends>q1</extends>, <files>[b.cpp]</files>]\n\
                     [<question>q3</question>, <extends>q2</extends>, <files>[c.cpp, a.cpp]</files>]";
        let groups = build_groups(&parse_declarations(reply), &docs());
        assert_eq!(groups[0].file_names(), vec!["a.cpp"]);
        assert_eq!(groups[1].file_names(), vec!["a.cpp", "b.cpp"]);
        assert_eq!(groups[2].file_names(), vec!["a.cpp", "b.cpp", "c.cpp"]);
    }

    #[test]
    fn test_extends_cycle_and_unknown_parent() {
        let reply = "[<question>q1</question>, <extends>q2</extends>, <files>[a.cpp]</files>]\n\
                     [<question>q2</question>, <extends>q1</extends>, <files>[b.cpp]</files>]\n\
                     [<question>q3</question>, <extends>q9</extends>, <files>[c.cpp]</files>]";
        let groups = build_groups(&parse_declarations(reply), &docs());
        assert_eq!(groups[0].file_names(), vec!["b.cpp", "a.cpp"]);
        assert_eq!(groups[1].file_names(), vec!["a.cpp", "b.cpp"]);
        assert_eq!(groups[2].file_names(), vec!["c.cpp"]);
    }

    #[test]
    fn test_duplicate_question_ids_merge() {
        let reply = "[<question>q1</question>, <files>[a.cpp]</files>]\n\
                     [<question>q1</question>, <files>[b.cpp, a.cpp]</files>]";
        let groups = build_groups(&parse_declarations(reply), &docs());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].file_names(), vec!["a.cpp", "b.cpp"]);
    }

    #[test]
    fn test_default_groups_numbering() {
        let groups = default_groups(&docs());
        let ids: Vec<&str> = groups.iter().map(|g| g.question_id.as_str()).collect();
        assert_eq!(ids, vec!["files1", "files2", "files3"]);
        assert!(groups.iter().all(|g| g.files.len() == 1));
    }

    #[tokio::test]
    async fn test_malformed_reply_falls_back_to_default() {
        let sink = RecordingSink::new();
        let groups = grouper(Ok("我觉得都是一道题"))
            .group(&docs(), "要求", &sink)
            .await;
        assert_eq!(groups, default_groups(&docs()));
        assert_eq!(sink.messages(crate::models::EventKind::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_default() {
        let sink = RecordingSink::new();
        let groups = grouper(Err(())).group(&docs(), "要求", &sink).await;
        assert_eq!(groups.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_has_no_groups() {
        let sink = RecordingSink::new();
        let groups = grouper(Ok("")).group(&[], "要求", &sink).await;
        assert!(groups.is_empty());
        assert!(sink.events().is_empty());
    }
}
