use crate::comparator;
use crate::error::{CaseError, ConstructError};
use crate::graph::prepare_query;
use crate::manifest::{TestCase, descriptor, value};
use crate::oracle::CancellationToken;
use crate::strategy::{Environment, Passed, VerificationStrategy};
use oxigraph::io::RdfFormat;
use oxigraph::sparql::PreparedSparqlQuery;
use serde_json::Value;

const DESCRIPTOR_QUERY: &str = "
PREFIX owlunit: <https://w3id.org/OWLunit/ontology/>
SELECT ?case ?inputData ?sparqlQuery ?expectedResult ?competencyQuestion WHERE {
    ?case owlunit:hasInputData ?inputData ;
        owlunit:hasSPARQLUnitTest ?sparqlQuery ;
        owlunit:hasExpectedResult ?expectedResult ;
        owlunit:hasCompetencyQuestion ?competencyQuestion .
}";

/// Checks that a SPARQL query answering a competency question returns the expected results on sample data.
///
/// The results are compared as [SPARQL JSON results](https://www.w3.org/TR/sparql11-results-json/) documents.
pub struct CompetencyQuestionVerification {
    question: String,
    query: PreparedSparqlQuery,
    expected: Value,
    input_data: String,
    format: Option<RdfFormat>,
}

impl CompetencyQuestionVerification {
    pub fn construct(
        case: &TestCase,
        environment: &Environment,
    ) -> Result<Box<dyn VerificationStrategy>, ConstructError> {
        let row = descriptor(case, environment.source(), DESCRIPTOR_QUERY)?;
        let expected = serde_json::from_str(&value(&row, "expectedResult"))
            .map_err(|e| CaseError::MalformedExpectedResult(e.to_string()))?;
        let query = prepare_query(&value(&row, "sparqlQuery"))
            .map_err(|e| CaseError::MalformedQuery(e.to_string()))?;
        Ok(Box::new(Self {
            question: value(&row, "competencyQuestion"),
            query,
            expected,
            input_data: value(&row, "inputData"),
            format: case.format,
        }))
    }
}

impl VerificationStrategy for CompetencyQuestionVerification {
    fn label(&self) -> Option<&str> {
        Some(&self.question)
    }

    fn test(&self, environment: &Environment, _: &CancellationToken) -> Result<Passed, CaseError> {
        let data = environment.source().load(&self.input_data, self.format)?;
        let actual = data.query_results_json(&self.query)?;
        if comparator::equal(&self.expected, &actual) {
            Ok(Passed::ByVerdict)
        } else {
            Err(CaseError::UnexpectedResponse {
                differences: comparator::diff(&self.expected, &actual),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, SuiteError};
    use crate::files::InMemoryLoader;
    use crate::graph::GraphSource;
    use crate::manifest::TestKind;

    const DATA: &str = r"
        @prefix : <http://example.com/family#> .
        :alice :parentOf :bob .
    ";

    fn case_document(query: &str, expected: &str) -> String {
        format!(
            r#"
            @prefix owlunit: <https://w3id.org/OWLunit/ontology/> .
            <#cq> owlunit:hasCompetencyQuestion "Who are the children of Alice?" ;
                owlunit:hasInputData <http://example.com/family.ttl> ;
                owlunit:hasSPARQLUnitTest """{query}""" ;
                owlunit:hasExpectedResult """{expected}""" .
            "#
        )
    }

    fn environment(case: &str) -> Environment {
        Environment::new(GraphSource::new(
            InMemoryLoader::new()
                .with_document("http://example.com/family.ttl", DATA)
                .with_document("http://example.com/cq.ttl", case),
        ))
    }

    fn case() -> TestCase {
        TestCase {
            uri: "http://example.com/cq.ttl#cq".into(),
            kind: TestKind::CompetencyQuestion,
            format: None,
        }
    }

    const QUERY: &str =
        "SELECT ?child WHERE { <http://example.com/family#alice> <http://example.com/family#parentOf> ?child }";

    #[test]
    fn matching_results_pass() -> Result<(), Box<dyn std::error::Error>> {
        let environment = environment(&case_document(
            QUERY,
            r#"{"head": {"vars": ["child"]}, "results": {"bindings": [{"child": {"type": "uri", "value": "http://example.com/family#bob"}}]}}"#,
        ));
        let strategy = CompetencyQuestionVerification::construct(&case(), &environment)?;
        assert_eq!(strategy.label(), Some("Who are the children of Alice?"));
        assert_eq!(
            strategy.test(&environment, &CancellationToken::new())?,
            Passed::ByVerdict
        );
        Ok(())
    }

    #[test]
    fn changed_binding_is_diffed() -> Result<(), Box<dyn std::error::Error>> {
        let environment = environment(&case_document(
            QUERY,
            r#"{"head": {"vars": ["child"]}, "results": {"bindings": [{"child": {"type": "uri", "value": "http://example.com/family#carol"}}]}}"#,
        ));
        let strategy = CompetencyQuestionVerification::construct(&case(), &environment)?;
        let Err(CaseError::UnexpectedResponse { differences }) =
            strategy.test(&environment, &CancellationToken::new())
        else {
            panic!("the result must differ")
        };
        assert_eq!(differences.len(), 1);
        assert_eq!(
            differences[0].path.to_string(),
            "results/bindings/0/child/value"
        );
        Ok(())
    }

    #[test]
    fn parsed_query_is_evaluated_on_each_run() -> Result<(), Box<dyn std::error::Error>> {
        let document = case_document(
            QUERY,
            r#"{"head": {"vars": ["child"]}, "results": {"bindings": [{"child": {"type": "uri", "value": "http://example.com/family#bob"}}]}}"#,
        );
        let environment = environment(&document);
        let strategy = CompetencyQuestionVerification::construct(&case(), &environment)?;
        for _ in 0..2 {
            assert_eq!(
                strategy.test(&environment, &CancellationToken::new())?,
                Passed::ByVerdict
            );
        }
        let changed = Environment::new(GraphSource::new(
            InMemoryLoader::new()
                .with_document(
                    "http://example.com/family.ttl",
                    "<http://example.com/family#alice> <http://example.com/family#parentOf> <http://example.com/family#carol> .",
                )
                .with_document("http://example.com/cq.ttl", document),
        ));
        assert!(matches!(
            strategy.test(&changed, &CancellationToken::new()),
            Err(CaseError::UnexpectedResponse { .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_expected_result() {
        let environment = environment(&case_document(QUERY, "{not json"));
        let Err(ConstructError::Case(error)) =
            CompetencyQuestionVerification::construct(&case(), &environment)
        else {
            panic!("the expected result must be rejected")
        };
        assert!(matches!(error, CaseError::MalformedExpectedResult(_)));
        assert_eq!(error.kind(), FailureKind::Construction);
    }

    #[test]
    fn malformed_query() {
        let environment = environment(&case_document("SELECT WHERE {", "{}"));
        assert!(matches!(
            CompetencyQuestionVerification::construct(&case(), &environment),
            Err(ConstructError::Case(CaseError::MalformedQuery(_)))
        ));
    }

    #[test]
    fn missing_descriptor() {
        let environment = environment("<http://example.com/s> <http://example.com/p> 1 .");
        assert!(matches!(
            CompetencyQuestionVerification::construct(&case(), &environment),
            Err(ConstructError::Suite(SuiteError::Descriptor { found: 0, .. }))
        ));
    }
}
