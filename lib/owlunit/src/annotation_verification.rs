use crate::error::{CaseError, ConstructError, DeserializationError};
use crate::graph::Graph;
use crate::manifest::{TestCase, descriptor, value};
use crate::oracle::{CancellationToken, Violation};
use crate::strategy::{Environment, Passed, VerificationStrategy};
use oxigraph::io::RdfFormat;
use tracing::debug;

const DESCRIPTOR_QUERY: &str = "
PREFIX owlunit: <https://w3id.org/OWLunit/ontology/>
SELECT ?case ?testedOntology WHERE {
    ?case owlunit:testsOntology ?testedOntology .
}";

/// Validates the annotations of an ontology against the OWLunit shapes.
///
/// Only the violations about resources in the ontology namespace are reported,
/// the imported ontologies are not under test.
pub struct AnnotationVerification {
    tested_ontology: String,
    format: Option<RdfFormat>,
}

impl AnnotationVerification {
    pub fn construct(
        case: &TestCase,
        environment: &Environment,
    ) -> Result<Box<dyn VerificationStrategy>, ConstructError> {
        let row = descriptor(case, environment.source(), DESCRIPTOR_QUERY)?;
        Ok(Box::new(Self {
            tested_ontology: value(&row, "testedOntology"),
            format: case.format,
        }))
    }
}

impl VerificationStrategy for AnnotationVerification {
    fn test(
        &self,
        environment: &Environment,
        cancellation: &CancellationToken,
    ) -> Result<Passed, CaseError> {
        let ontology = environment
            .source()
            .load(&self.tested_ontology, self.format)?;
        let namespace = namespace(&ontology, &self.tested_ontology)?;
        debug!(ontology = %self.tested_ontology, namespace = %namespace, "validating annotations");
        let shapes = environment
            .source()
            .load(environment.shapes(), Some(RdfFormat::Turtle))?;
        let violations = filter_violations(
            environment
                .validator()
                .validate(&ontology, &shapes, cancellation)?,
            &namespace,
        );
        if violations.is_empty() {
            Ok(Passed::ByVerdict)
        } else {
            Err(CaseError::AnnotationViolation { violations })
        }
    }
}

/// The namespace of the resources defined by the ontology.
///
/// This is the default prefix of its document, or else its `owl:Ontology` IRI, or else its location.
fn namespace(ontology: &Graph, location: &str) -> Result<String, CaseError> {
    if let Some(namespace) = ontology.prefix("") {
        return Ok(namespace.to_owned());
    }
    Ok(ontology
        .ontology_iris()
        .map_err(DeserializationError::from)?
        .into_iter()
        .next()
        .map_or_else(|| location.to_owned(), |iri| iri.into_string()))
}

/// Keeps the violations about resources of `namespace` and shortens their IRIs.
pub fn filter_violations(violations: Vec<Violation>, namespace: &str) -> Vec<Violation> {
    violations
        .into_iter()
        .filter(|violation| violation.focus_node.starts_with(namespace))
        .map(|violation| Violation {
            focus_node: local_name(&violation.focus_node).to_owned(),
            message: violation.message,
            severity: local_name(&violation.severity).to_owned(),
        })
        .collect()
}

/// The fragment of an IRI, or else its last path segment.
pub fn local_name(iri: &str) -> &str {
    if let Some((_, fragment)) = iri.rsplit_once('#') {
        fragment
    } else {
        iri.rsplit_once('/').map_or(iri, |(_, segment)| segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(focus_node: &str) -> Violation {
        Violation {
            focus_node: focus_node.into(),
            message: "Missing label".into(),
            severity: "http://www.w3.org/ns/shacl#Violation".into(),
        }
    }

    #[test]
    fn local_names() {
        assert_eq!(local_name("http://example.com/onto#Person"), "Person");
        assert_eq!(local_name("http://example.com/onto/Person"), "Person");
        assert_eq!(local_name("http://example.com/a/b#"), "");
        assert_eq!(local_name("Person"), "Person");
    }

    #[test]
    fn imported_violations_are_filtered() {
        let violations = filter_violations(
            vec![
                violation("http://example.com/onto#Person"),
                violation("http://example.com/imported#Agent"),
            ],
            "http://example.com/onto#",
        );
        assert_eq!(
            violations,
            vec![Violation {
                focus_node: "Person".into(),
                message: "Missing label".into(),
                severity: "Violation".into(),
            }]
        );
    }

    #[test]
    fn namespace_fallbacks() -> Result<(), Box<dyn std::error::Error>> {
        let prefixed = Graph::parse(
            "http://example.com/onto.ttl",
            b"@prefix : <http://example.com/onto#> . <http://example.com/onto> a <http://www.w3.org/2002/07/owl#Ontology> .",
            RdfFormat::Turtle,
        )?;
        assert_eq!(
            namespace(&prefixed, "http://example.com/onto.ttl")?,
            "http://example.com/onto#"
        );
        let rdf_xml = Graph::parse(
            "http://example.com/ontology.rdf",
            br#"<rdf:RDF xmlns="http://example.com/vocab#"
                xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                xmlns:owl="http://www.w3.org/2002/07/owl#">
              <owl:Ontology rdf:about="http://example.com/ontology"/>
            </rdf:RDF>"#,
            RdfFormat::RdfXml,
        )?;
        assert_eq!(
            namespace(&rdf_xml, "http://example.com/ontology.rdf")?,
            "http://example.com/vocab#"
        );
        let declared = Graph::parse(
            "http://example.com/onto.nt",
            b"<http://example.com/onto> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Ontology> .",
            RdfFormat::NTriples,
        )?;
        assert_eq!(
            namespace(&declared, "http://example.com/onto.nt")?,
            "http://example.com/onto"
        );
        let bare = Graph::parse("http://example.com/data.nt", b"", RdfFormat::NTriples)?;
        assert_eq!(
            namespace(&bare, "http://example.com/data.nt")?,
            "http://example.com/data.nt"
        );
        Ok(())
    }
}
