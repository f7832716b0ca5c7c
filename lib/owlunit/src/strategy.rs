//! The verification strategies and their registration table.
//!
//! Each strategy is built in two stages.
//! The constructor reads the parameters of the test case from its description document.
//! [`VerificationStrategy::test`] then loads the data under test and consults the oracles.

use crate::annotation_verification::AnnotationVerification;
use crate::competency_question::CompetencyQuestionVerification;
use crate::error::{CaseError, ConstructError};
use crate::error_provocation::ErrorProvocation;
use crate::graph::GraphSource;
use crate::inference_verification::InferenceVerification;
use crate::manifest::{TestCase, TestKind};
use crate::oracle::{CancellationToken, ReasonerOracle, ShapeValidatorOracle, UnavailableReasoner};
use crate::shacl::ShaclValidator;
use std::sync::Arc;

/// The shapes every annotation verification checks the tested ontology against.
pub const DEFAULT_SHAPES: &str =
    "https://raw.githubusercontent.com/luigi-asprino/owl-unit/main/shapes/ontology.ttl";

/// How a test case passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Passed {
    /// The oracles gave the expected answer.
    ByVerdict,
    /// The consistency checker terminated abnormally, which is read as an inconsistency.
    ByCheckerAbort { reason: String },
}

/// A test case ready to be executed.
pub trait VerificationStrategy: Send + Sync {
    /// A human readable description of the case, if its document provides one.
    fn label(&self) -> Option<&str> {
        None
    }

    fn test(
        &self,
        environment: &Environment,
        cancellation: &CancellationToken,
    ) -> Result<Passed, CaseError>;
}

/// Reads the parameters of a test case from its description.
pub type Constructor =
    fn(&TestCase, &Environment) -> Result<Box<dyn VerificationStrategy>, ConstructError>;

/// The strategy of each kind, in execution order.
pub const STRATEGIES: [(TestKind, Constructor); 4] = [
    (
        TestKind::CompetencyQuestion,
        CompetencyQuestionVerification::construct,
    ),
    (TestKind::ErrorProvocation, ErrorProvocation::construct),
    (
        TestKind::AnnotationVerification,
        AnnotationVerification::construct,
    ),
    (
        TestKind::InferenceVerification,
        InferenceVerification::construct,
    ),
];

pub fn construct(
    case: &TestCase,
    environment: &Environment,
) -> Result<Box<dyn VerificationStrategy>, ConstructError> {
    let (_, constructor) = STRATEGIES[case.kind as usize];
    constructor(case, environment)
}

/// The collaborators the strategies rely on.
///
/// By default documents are read with [`FileLoader`](crate::files::FileLoader),
/// shapes are checked with the built-in [`ShaclValidator`] and no reasoner is available.
#[derive(Clone)]
pub struct Environment {
    source: GraphSource,
    reasoner: Arc<dyn ReasonerOracle>,
    validator: Arc<dyn ShapeValidatorOracle>,
    shapes: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(GraphSource::default())
    }
}

impl Environment {
    pub fn new(source: GraphSource) -> Self {
        Self {
            source,
            reasoner: Arc::new(UnavailableReasoner),
            validator: Arc::new(ShaclValidator),
            shapes: DEFAULT_SHAPES.to_owned(),
        }
    }

    #[must_use]
    pub fn with_reasoner(mut self, reasoner: impl ReasonerOracle + 'static) -> Self {
        self.reasoner = Arc::new(reasoner);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl ShapeValidatorOracle + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Sets the location of the shapes used by annotation verifications.
    #[must_use]
    pub fn with_shapes(mut self, location: impl Into<String>) -> Self {
        self.shapes = location.into();
        self
    }

    pub fn source(&self) -> &GraphSource {
        &self.source
    }

    pub fn reasoner(&self) -> &dyn ReasonerOracle {
        self.reasoner.as_ref()
    }

    pub fn validator(&self) -> &dyn ShapeValidatorOracle {
        self.validator.as_ref()
    }

    pub fn shapes(&self) -> &str {
        &self.shapes
    }
}
