use crate::error::SuiteError;
use crate::files::without_fragment;
use crate::graph::{Graph, GraphSource, lexical_form};
use crate::vocab::owlunit;
use oxigraph::io::RdfFormat;
use oxigraph::model::{NamedNodeRef, Term};
use oxigraph::sparql::QuerySolution;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// The kinds of test cases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestKind {
    CompetencyQuestion,
    ErrorProvocation,
    AnnotationVerification,
    InferenceVerification,
}

impl TestKind {
    pub const ALL: [Self; 4] = [
        Self::CompetencyQuestion,
        Self::ErrorProvocation,
        Self::AnnotationVerification,
        Self::InferenceVerification,
    ];

    /// The OWLunit class of the test cases of this kind.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::CompetencyQuestion => owlunit::COMPETENCY_QUESTION_VERIFICATION,
            Self::ErrorProvocation => owlunit::ERROR_PROVOCATION,
            Self::AnnotationVerification => owlunit::ANNOTATION_VERIFICATION,
            Self::InferenceVerification => owlunit::INFERENCE_VERIFICATION,
        }
    }

    pub fn from_iri(iri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.iri().as_str() == iri)
    }

    /// The short name used in the logs.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::CompetencyQuestion => "CQ",
            Self::ErrorProvocation => "EP",
            Self::AnnotationVerification => "AV",
            Self::InferenceVerification => "IV",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let iri = self.iri().as_str();
        f.write_str(iri.strip_prefix(owlunit::NAMESPACE).unwrap_or(iri))
    }
}

/// A test case declared by a suite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCase {
    pub uri: String,
    pub kind: TestKind,
    /// The serialization format of the suite, also used for the case document.
    pub format: Option<RdfFormat>,
}

const TEST_CASES_QUERY: &str = "
PREFIX owlunit: <https://w3id.org/OWLunit/ontology/>
SELECT DISTINCT ?case ?type WHERE {
    ?suite a owlunit:TestSuite ;
        owlunit:hasTestCase ?case .
    ?case a ?type .
}";

/// Lists the test cases declared by a suite document, sorted by kind then by IRI.
///
/// Types outside of the OWLunit namespace are ignored.
/// A case declared several times is returned once.
pub fn test_cases(
    suite: &Graph,
    location: &str,
    format: Option<RdfFormat>,
) -> Result<Vec<TestCase>, SuiteError> {
    let rows = suite
        .query_pattern(TEST_CASES_QUERY)
        .map_err(|source| SuiteError::Query {
            location: location.to_owned(),
            source,
        })?;
    if rows.is_empty() {
        return Err(SuiteError::Empty(location.to_owned()));
    }

    let mut types = BTreeMap::<String, BTreeSet<String>>::new();
    for row in &rows {
        let Some(case) = row.get("case") else {
            continue;
        };
        let Term::NamedNode(case) = case else {
            return Err(SuiteError::InvalidCaseIdentifier(case.to_string()));
        };
        let case_types = types.entry(case.as_str().to_owned()).or_default();
        if let Some(Term::NamedNode(kind)) = row.get("type") {
            case_types.insert(kind.as_str().to_owned());
        }
    }

    let mut cases = BTreeSet::new();
    for (case, case_types) in types {
        let mut kinds = case_types
            .iter()
            .filter(|iri| iri.starts_with(owlunit::NAMESPACE))
            .peekable();
        if kinds.peek().is_none() {
            return Err(SuiteError::UnknownTestKind {
                case,
                kind: if case_types.is_empty() {
                    "(none)".to_owned()
                } else {
                    case_types.into_iter().collect::<Vec<_>>().join(", ")
                },
            });
        }
        for iri in kinds {
            let kind = TestKind::from_iri(iri).ok_or_else(|| SuiteError::UnknownTestKind {
                case: case.clone(),
                kind: iri.clone(),
            })?;
            cases.insert((kind, case.clone()));
        }
    }
    debug!(location, cases = cases.len(), "discovered test cases");
    Ok(cases
        .into_iter()
        .map(|(kind, uri)| TestCase { uri, kind, format })
        .collect())
}

/// Parses the document describing `case` and returns the single record matched by `query`.
///
/// The query must bind the described resource to `?case`.
/// Records about the case IRI itself are preferred. If there is none, records about any resource are considered.
pub fn descriptor(
    case: &TestCase,
    source: &GraphSource,
    query: &str,
) -> Result<QuerySolution, SuiteError> {
    let graph = source.parse(without_fragment(&case.uri), case.format)?;
    let rows = graph
        .query_pattern(query)
        .map_err(|source| SuiteError::Query {
            location: case.uri.clone(),
            source,
        })?;
    let (mut own, others): (Vec<_>, Vec<_>) = rows.into_iter().partition(|row| {
        matches!(row.get("case"), Some(Term::NamedNode(subject)) if subject.as_str() == case.uri)
    });
    if own.is_empty() {
        own = others;
    }
    if own.len() != 1 {
        return Err(SuiteError::Descriptor {
            case: case.uri.clone(),
            kind: case.kind,
            found: own.len(),
        });
    }
    own.pop().ok_or_else(|| SuiteError::Descriptor {
        case: case.uri.clone(),
        kind: case.kind,
        found: 0,
    })
}

/// The lexical form of a descriptor value, empty if unbound.
pub fn value(row: &QuerySolution, variable: &str) -> String {
    row.get(variable).map(lexical_form).unwrap_or_default()
}
