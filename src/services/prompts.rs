//! 提示词模板
//!
//! 分组、单题评分、总结三类请求的提示词。评分和总结按作业类型区分：
//! 实验类给 0-100 分，理论类给 A-D 等级。

use crate::models::AssignmentType;

/// 分组请求的系统消息
pub const GROUPING_SYSTEM: &str = "你是一个专业的C++编程老师，善于分析学生提交的作业文件结构。";

/// 评分和总结请求的系统消息
pub const GRADING_SYSTEM: &str = "你是一个专业的C++编程老师，善于批改学生作业。";

/// 构建分组提示词
pub fn grouping_prompt(file_descriptions: &str, requirements: &str) -> String {
    format!(
        r#"作为一名专业的C++编程老师，请仔细分析以下学生提交的C++作业文件。

文件列表:
{file_descriptions}

本次作业要求：
"{requirements}"

上面的文件都是针对这份作业要求的作答文件。
1. 先根据文件路径判断是否有明显的题目归类，比如几个文件来自同一文件夹，它们很可能属于同一题。
2. 再根据文件内容和作业要求进一步确认，把文件归类到对应题目。
只需返回文件名。

请按照以下格式返回分组结果，每题一行：
[<question>题目序号</question>, <files>[文件名1, 文件名2, ...]</files>]
例如：
[<question>q1</question>, <files>[files1_part1.cpp, files1_part2.cpp]</files>]
[<question>q2</question>, <files>[files2.cpp]</files>]

注意事项：
1. 如果一个文件独立属于一个题目，则单独成组
2. 如果多个文件属于同一题目（如题目的不同部分、版本或实现），请将它们分在同一题目下
3. 一个文件也可能属于多个组（比如题目间有依赖关系）
4. 题目标识为 q1, q2 等
5. 一个文件可能被多个 main 函数调用，也就是属于不同组，这一点要仔细分辨
6. 如果有题目没有对应的作答文件，也要返回对应题号和空列表，如 [<question>q5</question>, <files></files>]
7. 有些题目有依赖关系，比如题目2是题目1的扩展。此时题目2的组 = 题目1的组的文件 + 题目2自己的文件。
   可以额外用 <extends> 标明依赖的题目，例如：
   [<question>q2</question>, <extends>q1</extends>, <files>[q1.cpp, q2.cpp]</files>]"#
    )
}

/// 构建单题评分提示词
pub fn exercise_prompt(kind: AssignmentType, requirements: &str, content: &str) -> String {
    let scale = match kind {
        AssignmentType::Lab => {
            "分数为 0 到 100 的整数。代码完整、正确、规范给 90 分以上；能运行但有明显缺陷给 60 到 89 分；\
             无法完成题目要求给 60 分以下。"
        }
        AssignmentType::Theory => {
            "分数为 A、B、C、D 四个等级之一。A 表示完全正确且规范；B 表示基本正确；\
             C 表示部分完成；D 表示基本未完成。"
        }
    };
    let example = match kind {
        AssignmentType::Lab => "[<question>1</question>, <score>85</score>]",
        AssignmentType::Theory => "[<question>1</question>, <score>B</score>]",
    };

    format!(
        r#"请根据作业要求批改下面这一道题的学生代码。

作业要求：
{requirements}

学生代码：
{content}

评分标准：{scale}

先判断这段代码对应作业要求中的第几题，然后只按以下格式返回一行结果，不要输出其他内容：
[<question>题号</question>, <score>分数</score>]
例如：
{example}"#
    )
}

/// 构建作业总结提示词
pub fn summary_prompt(
    kind: AssignmentType,
    requirements: &str,
    code: &str,
    score_summary: &str,
) -> String {
    let grading = match kind {
        AssignmentType::Lab => "各题分数为 0 到 100 分",
        AssignmentType::Theory => "各题成绩为 A 到 D 等级",
    };

    format!(
        r#"请根据作业要求、学生代码和各题评分结果，为这份作业写一段给老师看的批改意见。

作业要求：
{requirements}

学生代码：
{code}

各题评分（{grading}，负数表示该题评分失败）：
{score_summary}

要求：
1. 指出完成情况和主要问题
2. 语言简洁，不超过 200 字
3. 不要重新打分，也不要使用 Markdown 格式"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_prompt_scale_by_type() {
        let lab = exercise_prompt(AssignmentType::Lab, "实现链表", "int main() {}");
        assert!(lab.contains("0 到 100"));
        assert!(lab.contains("int main() {}"));

        let theory = exercise_prompt(AssignmentType::Theory, "实现链表", "int main() {}");
        assert!(theory.contains("<score>B</score>"));
    }

    #[test]
    fn test_grouping_prompt_mentions_format() {
        let prompt = grouping_prompt("文件路径: /tmp/a.cpp", "两道题");
        assert!(prompt.contains("<question>"));
        assert!(prompt.contains("<files>"));
        assert!(prompt.contains("/tmp/a.cpp"));
        assert!(prompt.contains("两道题"));
    }
}
