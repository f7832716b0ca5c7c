use crate::error::{CaseError, ConstructError, DeserializationError};
use crate::manifest::{TestCase, descriptor, value};
use crate::oracle::CancellationToken;
use crate::strategy::{Environment, Passed, VerificationStrategy};
use oxigraph::io::RdfFormat;
use oxigraph::sparql::{PreparedSparqlQuery, SparqlEvaluator};
use spargebra::{Query, SparqlParser};
use std::iter;

const DESCRIPTOR_QUERY: &str = "
PREFIX owlunit: <https://w3id.org/OWLunit/ontology/>
SELECT ?case ?testedOntology ?inputData ?sparqlQuery ?expectedResult WHERE {
    ?case owlunit:testsOntology ?testedOntology ;
        owlunit:hasInputData ?inputData ;
        owlunit:hasSPARQLUnitTest ?sparqlQuery ;
        owlunit:hasExpectedResult ?expectedResult .
}";

/// Checks the answer of an `ASK` query on sample data merged with the tested ontology.
pub struct InferenceVerification {
    tested_ontology: String,
    input_data: String,
    query: PreparedSparqlQuery,
    clause: String,
    expected: bool,
    format: Option<RdfFormat>,
}

impl InferenceVerification {
    pub fn construct(
        case: &TestCase,
        environment: &Environment,
    ) -> Result<Box<dyn VerificationStrategy>, ConstructError> {
        let row = descriptor(case, environment.source(), DESCRIPTOR_QUERY)?;
        let expected = parse_boolean(&value(&row, "expectedResult"))?;
        let text = value(&row, "sparqlQuery");
        let query = parse_query(&text)?;
        Ok(Box::new(Self {
            tested_ontology: value(&row, "testedOntology"),
            input_data: value(&row, "inputData"),
            clause: where_clause(&text, &query)?.to_owned(),
            query: SparqlEvaluator::new().for_query(query),
            expected,
            format: case.format,
        }))
    }
}

impl VerificationStrategy for InferenceVerification {
    fn test(&self, environment: &Environment, _: &CancellationToken) -> Result<Passed, CaseError> {
        let ontology = environment
            .source()
            .load(&self.tested_ontology, self.format)?;
        let data = environment.source().load(&self.input_data, self.format)?;
        let merged = ontology
            .union(&data)
            .map_err(DeserializationError::from)?;
        let actual = merged.query_ask(&self.query)?;
        if actual == self.expected {
            Ok(Passed::ByVerdict)
        } else {
            Err(CaseError::InferenceMismatch {
                clause: self.clause.clone(),
                actual,
                expected: self.expected,
            })
        }
    }
}

/// The body of the `WHERE` clause of an `ASK` query, between its outermost braces.
pub fn ask_clause(query: &str) -> Result<&str, CaseError> {
    where_clause(query, &parse_query(query)?)
}

fn parse_query(query: &str) -> Result<Query, CaseError> {
    SparqlParser::new()
        .parse_query(query)
        .map_err(|e| CaseError::MalformedQuery(e.to_string()))
}

fn where_clause<'a>(text: &'a str, query: &Query) -> Result<&'a str, CaseError> {
    if !matches!(query, Query::Ask { .. }) {
        return Err(CaseError::MalformedQuery(
            "the query is not an ASK query".into(),
        ));
    }
    // The prologue and the dataset clauses do not contain any brace
    let mut start = None;
    let mut depth = 0_usize;
    for (offset, c) in significant_bytes(text) {
        match c {
            b'{' => {
                depth += 1;
                start.get_or_insert(offset + 1);
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if let (0, Some(start)) = (depth, start) {
                    let clause = text[start..offset].trim();
                    if clause.is_empty() {
                        return Err(CaseError::MalformedQuery("the ASK clause is empty".into()));
                    }
                    return Ok(clause);
                }
            }
            _ => {}
        }
    }
    Err(CaseError::MalformedQuery(
        "the ASK clause is not closed".into(),
    ))
}

/// The bytes of a SPARQL query outside of IRIs, string literals and comments, with their offsets.
fn significant_bytes(text: &str) -> impl Iterator<Item = (usize, u8)> + '_ {
    let bytes = text.as_bytes();
    let mut i = 0;
    iter::from_fn(move || {
        while let Some(&c) = bytes.get(i) {
            match c {
                b'#' => {
                    i = bytes[i..]
                        .iter()
                        .position(|c| *c == b'\n')
                        .map_or(bytes.len(), |end| i + end);
                }
                b'"' | b'\'' => i = string_end(bytes, i),
                b'<' => match iri_end(bytes, i) {
                    Some(end) => i = end,
                    None => {
                        i += 1;
                        return Some((i - 1, c));
                    }
                },
                _ => {
                    i += 1;
                    return Some((i - 1, c));
                }
            }
        }
        None
    })
}

/// The end of the IRI starting at `start`, if the `<` at `start` is not a comparison operator.
fn iri_end(bytes: &[u8], start: usize) -> Option<usize> {
    for (offset, c) in bytes.iter().enumerate().skip(start + 1) {
        match c {
            b'>' => return Some(offset + 1),
            b'<' | b'"' | b'{' | b'}' | b'|' | b'^' | b'`' | b'\\' | 0..=b' ' => return None,
            _ => {}
        }
    }
    None
}

fn string_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let delimiter = if bytes.get(start..start + 3) == Some(&[quote; 3][..]) {
        3
    } else {
        1
    };
    let mut i = start + delimiter;
    while let Some(&c) = bytes.get(i) {
        if c == b'\\' {
            i += 2;
        } else if c == quote
            && bytes
                .get(i..i + delimiter)
                .is_some_and(|end| end.iter().all(|c| *c == quote))
        {
            return i + delimiter;
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn parse_boolean(value: &str) -> Result<bool, CaseError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(CaseError::MalformedExpectedResult(format!(
            "{other} is not a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::files::InMemoryLoader;
    use crate::graph::GraphSource;
    use crate::manifest::TestKind;

    #[test]
    fn clause_extraction() -> Result<(), CaseError> {
        assert_eq!(
            ask_clause("ASK { ?x a <http://example.com/Person> }")?,
            "?x a <http://example.com/Person>"
        );
        assert_eq!(
            ask_clause(
                "PREFIX : <http://example.com/>\nask where {\n  ?x a :Person .\n  FILTER EXISTS { ?x :name ?n }\n}"
            )?,
            "?x a :Person .\n  FILTER EXISTS { ?x :name ?n }"
        );
        assert!(matches!(
            ask_clause("ASK {   }"),
            Err(CaseError::MalformedQuery(_))
        ));
        assert!(matches!(
            ask_clause("SELECT * WHERE { ?s ?p ?o }"),
            Err(CaseError::MalformedQuery(_))
        ));
        Ok(())
    }

    #[test]
    fn clause_extraction_around_dataset_and_values() -> Result<(), CaseError> {
        assert_eq!(
            ask_clause("ASK FROM <http://example.com/g> { ?s ?p ?o }")?,
            "?s ?p ?o"
        );
        assert_eq!(
            ask_clause("ASK { ?s ?p ?o } VALUES ?s { <http://example.com/a> }")?,
            "?s ?p ?o"
        );
        assert_eq!(
            ask_clause(
                "# ask { nothing }\nASK FROM NAMED <http://example.com/g#1> WHERE {\n  ?s ?p \"}\" .\n  FILTER(?s < 3) # }\n}"
            )?,
            "?s ?p \"}\" .\n  FILTER(?s < 3) # }"
        );
        Ok(())
    }

    #[test]
    fn booleans() {
        assert!(matches!(parse_boolean("TRUE"), Ok(true)));
        assert!(matches!(parse_boolean(" 0 "), Ok(false)));
        assert!(matches!(
            parse_boolean("yes"),
            Err(CaseError::MalformedExpectedResult(_))
        ));
    }

    fn run(query: &str, expected: &str) -> Result<Passed, CaseError> {
        let environment = Environment::new(GraphSource::new(
            InMemoryLoader::new()
                .with_document(
                    "http://example.com/onto.ttl",
                    r"
                    @prefix : <http://example.com/onto#> .
                    @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
                    :Student rdfs:subClassOf :Person .
                    ",
                )
                .with_document(
                    "http://example.com/data.ttl",
                    "<http://example.com/data#alice> a <http://example.com/onto#Student> .",
                )
                .with_document(
                    "http://example.com/iv.ttl",
                    format!(
                        r#"
                        @prefix owlunit: <https://w3id.org/OWLunit/ontology/> .
                        <#iv> owlunit:testsOntology <http://example.com/onto.ttl> ;
                            owlunit:hasInputData <http://example.com/data.ttl> ;
                            owlunit:hasSPARQLUnitTest """{query}""" ;
                            owlunit:hasExpectedResult "{expected}" .
                        "#
                    ),
                ),
        ));
        let case = TestCase {
            uri: "http://example.com/iv.ttl#iv".into(),
            kind: TestKind::InferenceVerification,
            format: None,
        };
        let Ok(strategy) = InferenceVerification::construct(&case, &environment) else {
            panic!("the description is valid")
        };
        strategy.test(&environment, &CancellationToken::new())
    }

    const QUERY: &str = "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
ASK { ?x a ?c . ?c rdfs:subClassOf <http://example.com/onto#Person> }";

    #[test]
    fn matching_answer_passes() {
        assert_eq!(run(QUERY, "true").ok(), Some(Passed::ByVerdict));
    }

    #[test]
    fn mismatch_reports_the_clause() {
        let Err(error) = run(QUERY, "false") else {
            panic!("the answer must differ")
        };
        assert_eq!(error.kind(), FailureKind::Violation);
        assert_eq!(
            error.to_string(),
            "`?x a ?c . ?c rdfs:subClassOf <http://example.com/onto#Person>` := true (expected false)"
        );
    }
}
