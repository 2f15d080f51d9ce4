//! 单题评分服务 - 业务能力层
//!
//! 每个题目分组发送一次评分请求，再按解析策略级联从自由文本中提取
//! (题号, 分数)。分数只作为字符串记号保存，数值解释留给汇总阶段。

use crate::models::{AssignmentType, ExerciseScore, QuestionGroup};
use crate::services::progress::ProgressSink;
use crate::services::prompts::{exercise_prompt, GRADING_SYSTEM};
use crate::services::LlmService;
use regex::Regex;
use tracing::{debug, warn};

const QUESTION_TAG: &str = r"<question>\s*(-?[A-Za-z0-9]+)\s*</question>";
const SCORE_TAG: &str = r"<score>\s*(-?[A-Za-z0-9]+)\s*</score>";
const QUESTION_LABEL: &str = r"题号\s*[：:]?\s*(-?\d+)";
const SCORE_LABEL: &str = r"(?:分数|得分)\s*[：:]?\s*(-?\d+)";

/// 回复解析策略，按 `CASCADE` 顺序依次尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// `[<question>1</question>, <score>85</score>]`
    Strict,
    /// 两个标签各自出现在文本任意位置
    LooseTags,
    /// `题号：1 ... 分数：85`，缺失的一项仍可由标签补上
    LocalizedLabels,
}

impl ParseStrategy {
    pub const CASCADE: [ParseStrategy; 3] = [
        ParseStrategy::Strict,
        ParseStrategy::LooseTags,
        ParseStrategy::LocalizedLabels,
    ];

    /// 返回 (题号, 分数)
    pub fn parse(self, reply: &str) -> Option<(String, String)> {
        match self {
            ParseStrategy::Strict => {
                let re = Regex::new(
                    r"\[<question>(-?[A-Za-z0-9]+)</question>\s*,\s*<score>([A-Za-z0-9]+)</score>\]",
                )
                .ok()?;
                let caps = re.captures(reply)?;
                Some((caps[1].to_string(), caps[2].to_string()))
            }
            ParseStrategy::LooseTags => {
                let question = first_capture(QUESTION_TAG, reply)?;
                let score = first_capture(SCORE_TAG, reply)?;
                Some((question, score))
            }
            ParseStrategy::LocalizedLabels => {
                let question = first_capture(QUESTION_TAG, reply)
                    .or_else(|| first_capture(QUESTION_LABEL, reply))?;
                let score = first_capture(SCORE_TAG, reply)
                    .or_else(|| first_capture(SCORE_LABEL, reply))?;
                Some((question, score))
            }
        }
    }
}

fn first_capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text).map(|caps| caps[1].to_string())
}

/// 依次尝试所有策略，返回第一个成功的结果
pub fn parse_score_reply(reply: &str) -> Option<(ParseStrategy, String, String)> {
    ParseStrategy::CASCADE.iter().find_map(|strategy| {
        strategy
            .parse(reply)
            .map(|(question, score)| (*strategy, question, score))
    })
}

/// 单题评分服务
#[derive(Clone)]
pub struct Evaluator {
    llm: LlmService,
    assignment_type: AssignmentType,
}

impl Evaluator {
    pub fn new(llm: LlmService, assignment_type: AssignmentType) -> Self {
        Self {
            llm,
            assignment_type,
        }
    }

    /// 对一个题目分组评分，永远返回一个结果（失败时为哨兵分数）
    pub async fn evaluate(
        &self,
        group: &QuestionGroup,
        requirements: &str,
        sink: &dyn ProgressSink,
    ) -> ExerciseScore {
        let content = if group.files.is_empty() {
            "（该题没有提交任何文件）".to_string()
        } else {
            group.merged_content()
        };
        let prompt = exercise_prompt(self.assignment_type, requirements, &content);

        let reply = match self.llm.send_to_llm(&prompt, Some(GRADING_SYSTEM)).await {
            Ok(reply) => reply,
            Err(e) => {
                sink.error(format!("题目 {} 评分请求失败: {}", group.question_id, e));
                return ExerciseScore::transport_failure(e.to_string());
            }
        };

        if reply.is_empty() {
            sink.warning(format!("题目 {} 的评分回复为空", group.question_id));
            return ExerciseScore::parse_failure(reply);
        }
        debug!("LLM题目评分: {}", reply);

        match parse_score_reply(&reply) {
            Some((strategy, question_id, raw_score)) => {
                if strategy != ParseStrategy::Strict {
                    warn!("标准格式匹配失败，已用 {:?} 策略解析", strategy);
                }
                ExerciseScore {
                    question_id,
                    raw_score,
                    feedback: reply,
                }
            }
            None => {
                sink.warning(format!(
                    "无法从题目 {} 的评分回复中提取题号和分数",
                    group.question_id
                ));
                ExerciseScore::parse_failure(reply)
            }
        }
    }
}
