#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod annotation_verification;
pub mod comparator;
mod competency_question;
pub mod error;
mod error_provocation;
pub mod files;
pub mod graph;
mod inference_verification;
pub mod manifest;
pub mod oracle;
pub mod report;
mod shacl;
pub mod strategy;
mod suite;
pub mod vocab;

pub use annotation_verification::{AnnotationVerification, filter_violations, local_name};
pub use competency_question::CompetencyQuestionVerification;
pub use error::{
    CaseError, ConstructError, DeserializationError, FailureKind, OracleError, QueryError,
    SuiteError,
};
pub use error_provocation::ErrorProvocation;
pub use inference_verification::{InferenceVerification, ask_clause};
pub use manifest::{TestCase, TestKind};
pub use oracle::{
    CancellationToken, CommandReasoner, CommandShapeValidator, ConsistencyVerdict, ReasonerOracle,
    ShapeValidatorOracle, Violation,
};
pub use oxigraph::io;
pub use report::{CaseOutcome, CaseRecord, KindTally, ReportSink, SuiteReport, TracingSink};
pub use shacl::ShaclValidator;
pub use strategy::{Environment, Passed, VerificationStrategy};
pub use suite::{SuiteOptions, TestSuite, run_suite};
