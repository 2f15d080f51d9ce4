//! 作业总结服务 - 业务能力层
//!
//! 汇总之后再发一次请求，生成给老师看的批改意见。总结只影响反馈文本，不改变成绩。

use crate::models::{AssignmentType, ExerciseScore, QuestionGroup};
use crate::services::progress::ProgressSink;
use crate::services::prompts::{summary_prompt, GRADING_SYSTEM};
use crate::services::LlmService;
use crate::utils::logging::truncate_text;

/// 回复为空时的反馈
pub const EMPTY_SUMMARY_FEEDBACK: &str = "LLM未生成任何响应内容";

/// 作业总结服务
#[derive(Clone)]
pub struct Summarizer {
    llm: LlmService,
    assignment_type: AssignmentType,
}

impl Summarizer {
    pub fn new(llm: LlmService, assignment_type: AssignmentType) -> Self {
        Self {
            llm,
            assignment_type,
        }
    }

    /// 生成反馈文本，失败时返回失败原因
    pub async fn summarize(
        &self,
        groups: &[QuestionGroup],
        scores: &[ExerciseScore],
        requirements: &str,
        sink: &dyn ProgressSink,
    ) -> String {
        let prompt = summary_prompt(
            self.assignment_type,
            requirements,
            &merged_code(groups),
            &score_summary(groups, scores),
        );

        match self.llm.send_to_llm(&prompt, Some(GRADING_SYSTEM)).await {
            Ok(reply) if reply.is_empty() => EMPTY_SUMMARY_FEEDBACK.to_string(),
            Ok(reply) => {
                sink.info(format!("总结：{}", truncate_text(&reply, 100)));
                reply
            }
            Err(e) => {
                let feedback = format!("LLM反馈生成失败: {}", e);
                sink.error(feedback.clone());
                feedback
            }
        }
    }
}

/// 所有分组的代码，分组之间用分隔线隔开
pub fn merged_code(groups: &[QuestionGroup]) -> String {
    groups
        .iter()
        .map(|group| {
            format!(
                "题目: {}\n代码内容:\n{}\n==================\n",
                group.question_id,
                group.merged_content()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 每组一行 `题目: <分组> 得分: <分数>`
pub fn score_summary(groups: &[QuestionGroup], scores: &[ExerciseScore]) -> String {
    groups
        .iter()
        .zip(scores)
        .map(|(group, score)| format!("题目: {} 得分: {}\n", group.question_id, score.raw_score))
        .collect()
}
