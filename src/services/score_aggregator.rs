//! 成绩汇总服务 - 业务能力层
//!
//! 把一份作业的各题分数合成最终成绩。实验类取有效分数的平均值，
//! 理论类取出现次数最多的等级。

use crate::models::{AssignmentType, ExerciseScore, FinalScore};
use crate::services::progress::ProgressSink;
use std::collections::HashMap;

/// 理论类题目不足但超过该数量时给部分分
pub const PARTIAL_CREDIT_MIN_SCORES: usize = 3;
/// 部分分等级
pub const PARTIAL_CREDIT_GRADE: &str = "C";
/// 没有有效等级时的最低等级
pub const LOWEST_GRADE: &str = "D";
/// 可接受的单题分数上限，超出的记号视为无效
pub const MAX_NUMERIC_SCORE: i64 = i32::MAX as i64;

/// 成绩汇总服务
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    assignment_type: AssignmentType,
    num_questions: usize,
}

impl ScoreAggregator {
    pub fn new(assignment_type: AssignmentType, num_questions: usize) -> Self {
        Self {
            assignment_type,
            num_questions,
        }
    }

    /// 计算最终成绩（相同输入总是得到相同结果）
    pub fn aggregate(&self, scores: &[ExerciseScore], sink: &dyn ProgressSink) -> FinalScore {
        match self.assignment_type {
            AssignmentType::Lab => self.aggregate_numeric(scores, sink),
            AssignmentType::Theory => self.aggregate_categorical(scores, sink),
        }
    }

    fn aggregate_numeric(&self, scores: &[ExerciseScore], sink: &dyn ProgressSink) -> FinalScore {
        if scores.len() < self.num_questions {
            sink.warning(format!(
                "作业数量与题目数量不一致（{} < {}）",
                scores.len(),
                self.num_questions
            ));
            return FinalScore::Insufficient;
        }

        let mut valid = Vec::with_capacity(scores.len());
        for score in scores {
            match parse_numeric(&score.raw_score) {
                Some(value) if value > MAX_NUMERIC_SCORE => sink.warning(format!(
                    "题目 {} 的分数 '{}' 超出范围，已忽略",
                    score.question_id, score.raw_score
                )),
                Some(value) if value >= 0 => valid.push(value),
                Some(_) => {}
                None => sink.warning(format!(
                    "题目 {} 的分数 '{}' 不是数字，已忽略",
                    score.question_id, score.raw_score
                )),
            }
        }

        if valid.is_empty() {
            sink.warning("没有有效的题目分数，总分记为 0".to_string());
            return FinalScore::Numeric(0);
        }

        let sum: i128 = valid.iter().map(|&v| i128::from(v)).sum();
        let mean = sum.div_euclid(valid.len() as i128);
        FinalScore::Numeric(i64::try_from(mean).unwrap_or(MAX_NUMERIC_SCORE))
    }

    fn aggregate_categorical(
        &self,
        scores: &[ExerciseScore],
        sink: &dyn ProgressSink,
    ) -> FinalScore {
        if scores.len() < self.num_questions {
            if scores.len() > PARTIAL_CREDIT_MIN_SCORES {
                return FinalScore::Grade(PARTIAL_CREDIT_GRADE.to_string());
            }
            sink.warning(format!(
                "作业数量与题目数量不一致（{} < {}）",
                scores.len(),
                self.num_questions
            ));
            return FinalScore::Insufficient;
        }

        let tokens: Vec<&str> = scores
            .iter()
            .filter(|s| !s.is_sentinel())
            .map(|s| s.raw_score.trim())
            .filter(|s| !s.is_empty())
            .collect();

        match mode(&tokens) {
            Some(grade) => FinalScore::Grade(grade.to_string()),
            None => FinalScore::Grade(LOWEST_GRADE.to_string()),
        }
    }
}

/// 整数或小数（截断）形式的分数；超出 i64 的值饱和到 i64::MAX
fn parse_numeric(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
}

/// 出现次数最多的记号，并列时取最先出现的
fn mode<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(*token).or_insert(0) += 1;
    }

    let mut best: Option<(&'a str, usize)> = None;
    for token in tokens {
        let count = counts.get(token).copied().unwrap_or(0);
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((*token, count));
        }
    }
    best.map(|(token, _)| token)
}
