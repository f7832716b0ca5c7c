use crate::error::{CaseError, ConstructError};
use crate::manifest::{TestCase, descriptor, value};
use crate::oracle::{CancellationToken, ConsistencyVerdict};
use crate::strategy::{Environment, Passed, VerificationStrategy};
use tracing::debug;

const DESCRIPTOR_QUERY: &str = "
PREFIX owlunit: <https://w3id.org/OWLunit/ontology/>
SELECT ?case ?inputData ?testedOntology WHERE {
    ?case owlunit:hasInputData ?inputData ;
        owlunit:testsOntology ?testedOntology .
}";

/// Checks that data violating the tested ontology is detected as inconsistent by the reasoner.
pub struct ErrorProvocation {
    input_data: String,
    tested_ontology: String,
}

impl ErrorProvocation {
    pub fn construct(
        case: &TestCase,
        environment: &Environment,
    ) -> Result<Box<dyn VerificationStrategy>, ConstructError> {
        let row = descriptor(case, environment.source(), DESCRIPTOR_QUERY)?;
        Ok(Box::new(Self {
            input_data: value(&row, "inputData"),
            tested_ontology: value(&row, "testedOntology"),
        }))
    }
}

impl VerificationStrategy for ErrorProvocation {
    fn test(
        &self,
        environment: &Environment,
        cancellation: &CancellationToken,
    ) -> Result<Passed, CaseError> {
        // The input data is expected to import the tested ontology
        debug!(
            input = %self.input_data,
            ontology = %self.tested_ontology,
            "checking consistency"
        );
        match environment
            .reasoner()
            .check_consistency(&self.input_data, cancellation)?
        {
            ConsistencyVerdict::Consistent => Err(CaseError::ExpectedInconsistency {
                input: self.input_data.clone(),
            }),
            ConsistencyVerdict::Inconsistent => Ok(Passed::ByVerdict),
            ConsistencyVerdict::CheckerAborted { reason } => Ok(Passed::ByCheckerAbort { reason }),
        }
    }
}
