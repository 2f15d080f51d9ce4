//! 业务能力层（Services）
//!
//! 每个服务只描述"我能对一份作业做什么"，不关心批量调度。

pub mod archive_collector;
pub mod evaluator;
pub mod extractor;
pub mod llm_service;
pub mod progress;
pub mod prompts;
pub mod question_grouper;
pub mod results_writer;
pub mod score_aggregator;
pub mod source_reader;
pub mod summarizer;

pub use archive_collector::ArchiveCollector;
pub use evaluator::{Evaluator, ParseStrategy};
pub use extractor::{ExtractedSubmission, Extractor};
pub use llm_service::LlmService;
pub use progress::{JsonLinesSink, ProgressSink, RecordingSink, TracingSink};
pub use question_grouper::QuestionGrouper;
pub use results_writer::ResultsWriter;
pub use score_aggregator::ScoreAggregator;
pub use source_reader::SourceReader;
pub use summarizer::Summarizer;
