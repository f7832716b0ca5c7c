use crate::comparator::FieldDiff;
use crate::manifest::TestKind;
use crate::oracle::Violation;
use oxigraph::io::RdfParseError;
use oxigraph::model::IriParseError;
use oxigraph::sparql::{QueryEvaluationError, SparqlSyntaxError};
use oxigraph::store::StorageError;
use std::{fmt, io};

/// An error while retrieving or parsing an RDF document.
#[derive(Debug, thiserror::Error)]
pub enum DeserializationError {
    /// The document could not be retrieved (file not found, HTTP error...).
    #[error("Failed to retrieve {location}: {source}")]
    Retrieval {
        location: String,
        #[source]
        source: io::Error,
    },
    /// The document location is not usable as a base IRI.
    #[error("{location} is not a valid base IRI: {source}")]
    InvalidIri {
        location: String,
        #[source]
        source: IriParseError,
    },
    /// The document content is not valid in the selected format.
    #[error("Failed to parse {location}: {source}")]
    Syntax {
        location: String,
        #[source]
        source: RdfParseError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An error while evaluating a SPARQL query against a [`Graph`](crate::graph::Graph).
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Syntax(#[from] SparqlSyntaxError),
    #[error(transparent)]
    Evaluation(#[from] QueryEvaluationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Failed to serialize the query results: {0}")]
    Serialization(#[from] io::Error),
    #[error("The serialized query results are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The query form does not produce the kind of results the caller expects.
    #[error("{0} queries are not supported here")]
    UnsupportedForm(&'static str),
}

/// An infrastructure failure of a reasoner or shape validator adapter.
///
/// These are never verdicts about the ontology under test.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("No {0} is configured")]
    Unavailable(&'static str),
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Unexpected output from {program}: {output}")]
    UnexpectedOutput { program: String, output: String },
    #[error(transparent)]
    Report(#[from] DeserializationError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The shapes use a SHACL feature the built-in validator does not implement.
    #[error("The shape {shape} uses {feature} which is not supported by the built-in validator")]
    UnsupportedShape { shape: String, feature: String },
    #[error("The shape {shape} is invalid: {message}")]
    InvalidShape { shape: String, message: String },
    #[error("The check has been cancelled")]
    Cancelled,
}

/// A suite-integrity error.
///
/// It aborts the discovery of the suite before any test case is executed.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
    #[error("Failed to query {location}: {source}")]
    Query {
        location: String,
        #[source]
        source: QueryError,
    },
    #[error("The test suite {0} does not declare any test case")]
    Empty(String),
    #[error("The test case {case} has the unsupported type {kind}")]
    UnknownTestKind { case: String, kind: String },
    #[error("The test case identifier {0} is not an IRI")]
    InvalidCaseIdentifier(String),
    #[error("Exactly one {kind} description was expected at {case}, found {found}")]
    Descriptor {
        case: String,
        kind: TestKind,
        found: usize,
    },
    #[error("Failed to build the test worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// The broad category of a failed test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The test case description is broken.
    Construction,
    /// The artifact under test does not behave as the test case requires.
    Violation,
    /// The checking infrastructure failed.
    Fault,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Construction => "construction error",
            Self::Violation => "violation",
            Self::Fault => "fault",
        })
    }
}

/// Why a single test case failed.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("The expected result is malformed: {0}")]
    MalformedExpectedResult(String),
    #[error("The test query is malformed: {0}")]
    MalformedQuery(String),
    /// The competency question query returned something else than the expected result.
    #[error("{}", display_differences(.differences))]
    UnexpectedResponse { differences: Vec<FieldDiff> },
    /// The reasoner found the input data consistent.
    #[error("The reasoner found {input} consistent but an inconsistency was expected")]
    ExpectedInconsistency { input: String },
    #[error("{}", display_violations(.violations))]
    AnnotationViolation { violations: Vec<Violation> },
    #[error("`{clause}` := {actual} (expected {expected})")]
    InferenceMismatch {
        clause: String,
        actual: bool,
        expected: bool,
    },
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl CaseError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedExpectedResult(_) | Self::MalformedQuery(_) => FailureKind::Construction,
            Self::UnexpectedResponse { .. }
            | Self::ExpectedInconsistency { .. }
            | Self::AnnotationViolation { .. }
            | Self::InferenceMismatch { .. } => FailureKind::Violation,
            Self::Deserialization(_) | Self::Query(_) | Self::Oracle(_) => FailureKind::Fault,
        }
    }

    /// The case did not complete because the run was cancelled.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Oracle(OracleError::Cancelled))
    }
}

fn display_differences(differences: &[FieldDiff]) -> String {
    if differences.is_empty() {
        return "The result has fields added or removed compared to the expected result"
            .to_owned();
    }
    differences
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" - ")
}

fn display_violations(violations: &[Violation]) -> String {
    let mut out = format!("{} annotation violation(s):", violations.len());
    for violation in violations {
        out.push_str("\n  ");
        out.push_str(&violation.to_string());
    }
    out
}

/// Error raised while building a verification strategy from its test case description.
#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    /// Fatal to the whole run.
    #[error(transparent)]
    Suite(#[from] SuiteError),
    /// Fatal to this test case only.
    #[error(transparent)]
    Case(#[from] CaseError),
}

impl From<DeserializationError> for ConstructError {
    fn from(error: DeserializationError) -> Self {
        Self::Suite(error.into())
    }
}
