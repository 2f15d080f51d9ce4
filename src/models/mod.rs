pub mod archive;
pub mod assignment;
pub mod event;
pub mod submission;

pub use archive::{CollectEntry, CollectReport, RepairOutcome, StagedArchive};
pub use assignment::AssignmentType;
pub use event::{EventKind, ProgressEvent};
pub use submission::{
    ExerciseScore, FinalScore, QuestionGroup, SourceDocument, StudentInfo, SubmissionResult,
    PARSE_FAILURE_SENTINEL, TRANSPORT_FAILURE_SENTINEL,
};
