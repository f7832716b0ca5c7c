use crate::error::{DeserializationError, QueryError};
use crate::files::{Document, DocumentLoader, FileLoader, guess_rdf_format, to_location};
use crate::vocab::owl;
use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, Term};
use oxigraph::sparql::results::{QueryResultsFormat, QueryResultsSerializer};
use oxigraph::sparql::{PreparedSparqlQuery, QueryResults, QuerySolution, SparqlEvaluator};
use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::name::PrefixDeclaration;
use oxigraph::store::{StorageError, Store};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// Retrieves RDF documents and parses them into [`Graph`]s.
#[derive(Clone)]
pub struct GraphSource {
    loader: Arc<dyn DocumentLoader>,
}

impl Default for GraphSource {
    fn default() -> Self {
        Self::new(FileLoader::new())
    }
}

impl GraphSource {
    pub fn new(loader: impl DocumentLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    /// Parses the document at `location`.
    ///
    /// The given format is used if any.
    /// If not, it is guessed from the location extension then from the document media type.
    /// RDF/XML is assumed when nothing is known.
    pub fn parse(
        &self,
        location: &str,
        format: Option<RdfFormat>,
    ) -> Result<Graph, DeserializationError> {
        let document = self.retrieve(location)?;
        let format = format
            .or_else(|| detect_format(location, &document))
            .unwrap_or(RdfFormat::RdfXml);
        Graph::parse(location, &document.content, format)
    }

    /// Parses the document at `location`, using `fallback` only if its format can not be guessed.
    pub fn load(
        &self,
        location: &str,
        fallback: Option<RdfFormat>,
    ) -> Result<Graph, DeserializationError> {
        let document = self.retrieve(location)?;
        let format = detect_format(location, &document)
            .or(fallback)
            .unwrap_or(RdfFormat::RdfXml);
        Graph::parse(location, &document.content, format)
    }

    fn retrieve(&self, location: &str) -> Result<Document, DeserializationError> {
        self.loader
            .load(location)
            .map_err(|source| DeserializationError::Retrieval {
                location: location.to_owned(),
                source,
            })
    }
}

fn detect_format(location: &str, document: &Document) -> Option<RdfFormat> {
    guess_rdf_format(location).or_else(|| {
        document
            .media_type
            .as_deref()
            .and_then(RdfFormat::from_media_type)
    })
}

/// An in-memory RDF graph with the prefixes declared by the document it was parsed from.
///
/// All the quads are merged into the default graph.
#[derive(Clone)]
pub struct Graph {
    store: Store,
    prefixes: BTreeMap<String, String>,
}

impl Graph {
    /// Parses `content` with `location` as base IRI.
    ///
    /// Blank nodes are renamed so that graphs parsed separately can be merged safely.
    pub fn parse(
        location: &str,
        content: &[u8],
        format: RdfFormat,
    ) -> Result<Self, DeserializationError> {
        let base_iri = to_location(location).unwrap_or_else(|_| location.to_owned());
        let mut parser = RdfParser::from_format(format)
            .with_base_iri(base_iri)
            .map_err(|source| DeserializationError::InvalidIri {
                location: location.to_owned(),
                source,
            })?
            .rename_blank_nodes()
            .for_reader(content);
        let mut quads = Vec::new();
        for quad in &mut parser {
            let mut quad = quad.map_err(|source| DeserializationError::Syntax {
                location: location.to_owned(),
                source,
            })?;
            quad.graph_name = GraphName::DefaultGraph;
            quads.push(quad);
        }
        let mut prefixes = parser
            .prefixes()
            .map(|(name, iri)| (name.to_owned(), iri.to_owned()))
            .collect::<BTreeMap<_, _>>();
        if format == RdfFormat::RdfXml {
            for (name, iri) in root_namespaces(content) {
                prefixes.entry(name).or_insert(iri);
            }
        }
        debug!(location, triples = quads.len(), "parsed RDF document");
        let store = Store::new()?;
        store.extend(quads)?;
        Ok(Self { store, prefixes })
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.store.is_empty()
    }

    /// The IRI bound to `name` by a `@prefix` or `xmlns` declaration. The default prefix is `""`.
    pub fn prefix(&self, name: &str) -> Option<&str> {
        self.prefixes.get(name).map(String::as_str)
    }

    /// The subjects typed as `owl:Ontology`.
    pub fn ontology_iris(&self) -> Result<Vec<NamedNode>, StorageError> {
        let mut iris = Vec::new();
        for quad in
            self.store
                .quads_for_pattern(None, Some(rdf::TYPE), Some(owl::ONTOLOGY.into()), None)
        {
            if let NamedOrBlankNode::NamedNode(iri) = quad?.subject {
                iris.push(iri);
            }
        }
        Ok(iris)
    }

    /// Merges the two graphs. The prefixes of `self` win on conflicts.
    pub fn union(&self, other: &Self) -> Result<Self, StorageError> {
        let store = Store::new()?;
        store.extend(
            self.store
                .iter()
                .chain(other.store.iter())
                .collect::<Result<Vec<_>, _>>()?,
        )?;
        let mut prefixes = other.prefixes.clone();
        prefixes.extend(self.prefixes.clone());
        Ok(Self { store, prefixes })
    }

    /// Evaluates a `SELECT` query.
    pub fn query_pattern(&self, query: &str) -> Result<Vec<QuerySolution>, QueryError> {
        match self.execute(prepare_query(query)?)? {
            QueryResults::Solutions(solutions) => Ok(solutions.collect::<Result<_, _>>()?),
            QueryResults::Boolean(_) => Err(QueryError::UnsupportedForm("ASK")),
            QueryResults::Graph(_) => Err(QueryError::UnsupportedForm("CONSTRUCT and DESCRIBE")),
        }
    }

    /// Evaluates an `ASK` query.
    pub fn query_ask(&self, query: &PreparedSparqlQuery) -> Result<bool, QueryError> {
        match self.execute(query.clone())? {
            QueryResults::Boolean(value) => Ok(value),
            QueryResults::Solutions(_) => Err(QueryError::UnsupportedForm("SELECT")),
            QueryResults::Graph(_) => Err(QueryError::UnsupportedForm("CONSTRUCT and DESCRIBE")),
        }
    }

    /// Evaluates a `SELECT` or `ASK` query and returns its results
    /// as a [SPARQL JSON results](https://www.w3.org/TR/sparql11-results-json/) document.
    pub fn query_results_json(&self, query: &PreparedSparqlQuery) -> Result<Value, QueryError> {
        let serializer = QueryResultsSerializer::from_format(QueryResultsFormat::Json);
        let serialized = match self.execute(query.clone())? {
            QueryResults::Solutions(solutions) => {
                let mut writer = serializer
                    .serialize_solutions_to_writer(Vec::new(), solutions.variables().to_vec())?;
                for solution in solutions {
                    writer.serialize(&solution?)?;
                }
                writer.finish()?
            }
            QueryResults::Boolean(value) => {
                serializer.serialize_boolean_to_writer(Vec::new(), value)?
            }
            QueryResults::Graph(_) => {
                return Err(QueryError::UnsupportedForm("CONSTRUCT and DESCRIBE"));
            }
        };
        Ok(serde_json::from_slice(&serialized)?)
    }

    /// Writes the graph as N-Triples.
    pub fn write_ntriples<W: Write>(&self, writer: W) -> Result<W, QueryError> {
        let mut serializer = RdfSerializer::from_format(RdfFormat::NTriples).for_writer(writer);
        for quad in self.store.iter() {
            serializer.serialize_quad(&quad?)?;
        }
        Ok(serializer.finish()?)
    }

    fn execute(&self, query: PreparedSparqlQuery) -> Result<QueryResults<'static>, QueryError> {
        Ok(query.on_store(&self.store).execute()?)
    }
}

/// Parses a SPARQL query once so that it can be evaluated on many graphs.
pub fn prepare_query(query: &str) -> Result<PreparedSparqlQuery, QueryError> {
    Ok(SparqlEvaluator::new().parse_query(query)?)
}

/// The namespaces declared on the root element of an RDF/XML document.
///
/// The RDF/XML parser only reports the namespaces in scope, and none is left once the document is fully read.
fn root_namespaces(content: &[u8]) -> Vec<(String, String)> {
    let mut reader = Reader::from_reader(content);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element) | Event::Empty(element)) => {
                return element
                    .attributes()
                    .filter_map(Result::ok)
                    .filter_map(|attribute| {
                        let name = match attribute.key.as_namespace_binding()? {
                            PrefixDeclaration::Default => String::new(),
                            PrefixDeclaration::Named(name) => String::from_utf8(name.to_vec()).ok()?,
                        };
                        Some((name, attribute.unescape_value().ok()?.into_owned()))
                    })
                    .collect();
            }
            Ok(Event::Eof) | Err(_) => return Vec::new(),
            Ok(_) => {}
        }
    }
}

/// The IRI of a named node or the value of a literal.
pub fn lexical_form(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_owned(),
        Term::Literal(literal) => literal.value().to_owned(),
        other => other.to_string(),
    }
}
