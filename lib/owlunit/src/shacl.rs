//! An in-process validator for the core SHACL constraints.
//!
//! Shapes relying on other SHACL features (logical constraints, nested node shapes, complex paths, SPARQL constraints...)
//! are rejected with [`OracleError::UnsupportedShape`] instead of being skipped.

use crate::error::OracleError;
use crate::graph::{Graph, lexical_form};
use crate::oracle::{CancellationToken, ShapeValidatorOracle, Violation};
use crate::vocab::{owl, sh};
use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{NamedNode, NamedNodeRef, NamedOrBlankNodeRef, Term, TermRef};
use oxigraph::store::{StorageError, Store};
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashSet};
use std::{fmt, slice};

/// Validates data against SHACL shapes without any external program.
///
/// The supported targets are `sh:targetClass`, `sh:targetNode`, `sh:targetSubjectsOf`, `sh:targetObjectsOf`
/// and the implicit class targets.
/// Property shapes must have a predicate or an inverse predicate as path.
/// The supported constraints are `sh:minCount`, `sh:maxCount`, `sh:datatype`, `sh:class`, `sh:nodeKind`,
/// `sh:minLength`, `sh:maxLength`, `sh:pattern`, `sh:languageIn`, `sh:uniqueLang`, `sh:hasValue` and `sh:in`.
///
/// ```
/// use owlunit::{CancellationToken, ShaclValidator, ShapeValidatorOracle};
/// use owlunit::graph::Graph;
/// use owlunit::io::RdfFormat;
///
/// let shapes = Graph::parse(
///     "http://example.com/shapes.ttl",
///     br#"@prefix sh: <http://www.w3.org/ns/shacl#> .
///     [] sh:targetClass <http://example.com/Person> ;
///         sh:property [ sh:path <http://example.com/name> ; sh:minCount 1 ; sh:message "Missing name" ] ."#,
///     RdfFormat::Turtle,
/// )?;
/// let data = Graph::parse(
///     "http://example.com/data.ttl",
///     b"<http://example.com/alice> a <http://example.com/Person> .",
///     RdfFormat::Turtle,
/// )?;
/// let violations = ShaclValidator.validate(&data, &shapes, &CancellationToken::new())?;
/// assert_eq!(violations.len(), 1);
/// assert_eq!(violations[0].focus_node, "http://example.com/alice");
/// assert_eq!(violations[0].message, "Missing name");
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaclValidator;

impl ShapeValidatorOracle for ShaclValidator {
    fn validate(
        &self,
        data: &Graph,
        shapes: &Graph,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Violation>, OracleError> {
        let shapes = node_shapes(shapes.store())?;
        let mut violations = Vec::new();
        for shape in &shapes {
            if cancellation.is_cancelled() {
                return Err(OracleError::Cancelled);
            }
            shape.validate(data.store(), &mut violations)?;
        }
        violations.sort();
        violations.dedup();
        Ok(violations)
    }
}

enum Target {
    Class(NamedNode),
    Node(Term),
    SubjectsOf(NamedNode),
    ObjectsOf(NamedNode),
}

enum Path {
    Predicate(NamedNode),
    Inverse(NamedNode),
}

impl Path {
    fn parse(shapes: &Store, shape: &Term, path: &Term) -> Result<Self, OracleError> {
        match path {
            Term::NamedNode(predicate) => Ok(Self::Predicate(predicate.clone())),
            Term::BlankNode(_) => {
                if let [Term::NamedNode(predicate)] =
                    objects(shapes, Some(path), sh::INVERSE_PATH)?.as_slice()
                {
                    return Ok(Self::Inverse(predicate.clone()));
                }
                Err(unsupported(shape, "complex property paths"))
            }
            _ => Err(invalid(shape, format!("{path} is not a property path"))),
        }
    }

    fn values(&self, data: &Store, focus: &Term) -> Result<Vec<Term>, StorageError> {
        match self {
            Self::Predicate(predicate) => objects(data, Some(focus), predicate.as_ref()),
            Self::Inverse(predicate) => subjects(data, predicate.as_ref(), Some(focus.as_ref())),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(predicate) => predicate.fmt(f),
            Self::Inverse(predicate) => write!(f, "^{predicate}"),
        }
    }
}

enum Constraint {
    MinCount(usize),
    MaxCount(usize),
    Datatype(NamedNode),
    Class(NamedNode),
    NodeKind(NamedNode),
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    LanguageIn(Vec<String>),
    UniqueLang,
    HasValue(Term),
    In(Vec<Term>),
}

impl Constraint {
    /// The messages of the failures of the constraint on the value nodes.
    fn check(
        &self,
        data: &Store,
        values: &[Term],
        path: Option<&Path>,
    ) -> Result<Vec<String>, StorageError> {
        let on = path.map_or_else(String::new, |path| format!(" on {path}"));
        Ok(match self {
            Self::MinCount(min) => (values.len() < *min)
                .then(|| format!("Less than {min} values{on}"))
                .into_iter()
                .collect(),
            Self::MaxCount(max) => (values.len() > *max)
                .then(|| format!("More than {max} values{on}"))
                .into_iter()
                .collect(),
            Self::HasValue(expected) => (!values.contains(expected))
                .then(|| format!("Missing expected value {expected}{on}"))
                .into_iter()
                .collect(),
            Self::UniqueLang => {
                let mut seen = HashSet::new();
                let mut duplicated = BTreeSet::new();
                for value in values {
                    if let Term::Literal(literal) = value {
                        if let Some(language) = literal.language() {
                            if !seen.insert(language) {
                                duplicated.insert(language);
                            }
                        }
                    }
                }
                duplicated
                    .into_iter()
                    .map(|language| format!("Language \"{language}\" used more than once{on}"))
                    .collect()
            }
            Self::Class(class) => {
                let mut messages = Vec::new();
                for value in values {
                    if !is_instance(data, value, class.as_ref())? {
                        messages.push(format!("Value {value} is not an instance of {class}"));
                    }
                }
                messages
            }
            _ => values
                .iter()
                .filter_map(|value| self.check_value(value))
                .collect(),
        })
    }

    fn check_value(&self, value: &Term) -> Option<String> {
        match self {
            Self::Datatype(datatype) => {
                (!matches!(value, Term::Literal(literal) if literal.datatype() == datatype.as_ref()))
                    .then(|| format!("Value {value} does not have datatype {datatype}"))
            }
            Self::NodeKind(kind) => (!has_node_kind(value, kind.as_ref()))
                .then(|| format!("Value {value} is not of node kind {kind}")),
            Self::MinLength(min) => (!string_value(value).is_some_and(|s| s.chars().count() >= *min))
                .then(|| format!("Value {value} has less than {min} characters")),
            Self::MaxLength(max) => (!string_value(value).is_some_and(|s| s.chars().count() <= *max))
                .then(|| format!("Value {value} has more than {max} characters")),
            Self::Pattern(regex) => (!string_value(value).is_some_and(|s| regex.is_match(s)))
                .then(|| format!("Value {value} does not match the pattern \"{regex}\"")),
            Self::LanguageIn(ranges) => (!matches!(value, Term::Literal(literal) if literal
                .language()
                .is_some_and(|tag| ranges.iter().any(|range| language_matches(tag, range)))))
            .then(|| format!("Language of {value} is not in [{}]", ranges.join(", "))),
            Self::In(allowed) => (!allowed.contains(value))
                .then(|| format!("Value {value} is not one of the allowed values")),
            Self::MinCount(_)
            | Self::MaxCount(_)
            | Self::HasValue(_)
            | Self::UniqueLang
            | Self::Class(_) => None,
        }
    }
}

struct PropertyShape {
    path: Path,
    constraints: Vec<Constraint>,
    severity: NamedNode,
    message: Option<String>,
}

impl PropertyShape {
    fn parse(
        shapes: &Store,
        id: &Term,
        parent_severity: &NamedNode,
    ) -> Result<Option<Self>, OracleError> {
        let Description {
            constraints,
            properties,
            path,
            severity,
            messages,
            deactivated,
            ..
        } = describe(shapes, id)?;
        if deactivated {
            return Ok(None);
        }
        if !properties.is_empty() {
            return Err(unsupported(id, "sh:property on a property shape"));
        }
        let Some(path) = path else {
            return Err(invalid(id, "a property shape must have a sh:path"));
        };
        Ok(Some(Self {
            path: Path::parse(shapes, id, &path)?,
            constraints,
            severity: severity.unwrap_or_else(|| parent_severity.clone()),
            message: messages.into_iter().next(),
        }))
    }
}

struct NodeShape {
    targets: Vec<Target>,
    constraints: Vec<Constraint>,
    properties: Vec<PropertyShape>,
    severity: NamedNode,
    message: Option<String>,
}

impl NodeShape {
    fn parse(shapes: &Store, id: &Term) -> Result<Option<Self>, OracleError> {
        let Description {
            mut targets,
            mut constraints,
            properties,
            path,
            severity,
            messages,
            deactivated,
            ..
        } = describe(shapes, id)?;
        if deactivated {
            return Ok(None);
        }
        if let Term::NamedNode(class) = id {
            let is_class = objects(shapes, Some(id), rdf::TYPE)?.iter().any(|kind| {
                kind.as_ref() == TermRef::from(rdfs::CLASS)
                    || kind.as_ref() == TermRef::from(owl::CLASS)
            });
            if is_class {
                targets.push(Target::Class(class.clone()));
            }
        }
        let severity = severity.unwrap_or_else(|| sh::VIOLATION.into_owned());
        let message = messages.into_iter().next();
        let mut property_shapes = Vec::new();
        for property in &properties {
            if let Some(property) = PropertyShape::parse(shapes, property, &severity)? {
                property_shapes.push(property);
            }
        }
        // A property shape with its own targets
        if let Some(path) = path {
            property_shapes.push(PropertyShape {
                path: Path::parse(shapes, id, &path)?,
                constraints: std::mem::take(&mut constraints),
                severity: severity.clone(),
                message: message.clone(),
            });
        }
        Ok(Some(Self {
            targets,
            constraints,
            properties: property_shapes,
            severity,
            message,
        }))
    }

    fn validate(&self, data: &Store, violations: &mut Vec<Violation>) -> Result<(), StorageError> {
        for focus in self.focus_nodes(data)? {
            for constraint in &self.constraints {
                for message in constraint.check(data, slice::from_ref(&focus), None)? {
                    violations.push(violation(
                        &focus,
                        self.message.as_deref(),
                        message,
                        &self.severity,
                    ));
                }
            }
            for property in &self.properties {
                let values = property.path.values(data, &focus)?;
                for constraint in &property.constraints {
                    for message in constraint.check(data, &values, Some(&property.path))? {
                        violations.push(violation(
                            &focus,
                            property.message.as_deref(),
                            message,
                            &property.severity,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn focus_nodes(&self, data: &Store) -> Result<Vec<Term>, StorageError> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for target in &self.targets {
            let candidates = match target {
                Target::Class(class) => instances(data, class.as_ref())?,
                Target::Node(node) => vec![node.clone()],
                Target::SubjectsOf(predicate) => subjects(data, predicate.as_ref(), None)?,
                Target::ObjectsOf(predicate) => objects(data, None, predicate.as_ref())?,
            };
            for node in candidates {
                if seen.insert(node.clone()) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }
}

fn node_shapes(shapes: &Store) -> Result<Vec<NodeShape>, OracleError> {
    let mut ids = Vec::new();
    for predicate in [
        sh::TARGET_CLASS,
        sh::TARGET_NODE,
        sh::TARGET_SUBJECTS_OF,
        sh::TARGET_OBJECTS_OF,
    ] {
        ids.extend(subjects(shapes, predicate, None)?);
    }
    ids.extend(subjects(
        shapes,
        rdf::TYPE,
        Some(TermRef::from(sh::NODE_SHAPE)),
    )?);
    let mut seen = HashSet::new();
    let mut node_shapes = Vec::new();
    for id in ids {
        if seen.insert(id.clone()) {
            if let Some(shape) = NodeShape::parse(shapes, &id)? {
                node_shapes.push(shape);
            }
        }
    }
    Ok(node_shapes)
}

/// The SHACL statements about a shape.
#[derive(Default)]
struct Description {
    targets: Vec<Target>,
    constraints: Vec<Constraint>,
    properties: Vec<Term>,
    path: Option<Term>,
    severity: Option<NamedNode>,
    messages: Vec<String>,
    pattern: Option<String>,
    flags: Option<String>,
    deactivated: bool,
}

fn describe(shapes: &Store, id: &Term) -> Result<Description, OracleError> {
    let mut description = Description::default();
    for (predicate, object) in outgoing(shapes, id)? {
        let Some(name) = predicate.as_str().strip_prefix(sh::NAMESPACE) else {
            continue;
        };
        match name {
            "targetClass" => description
                .targets
                .push(Target::Class(named(id, name, object)?)),
            "targetNode" => description.targets.push(Target::Node(object)),
            "targetSubjectsOf" => description
                .targets
                .push(Target::SubjectsOf(named(id, name, object)?)),
            "targetObjectsOf" => description
                .targets
                .push(Target::ObjectsOf(named(id, name, object)?)),
            "property" => description.properties.push(object),
            "path" => description.path = Some(object),
            "severity" => description.severity = Some(named(id, name, object)?),
            "message" => description.messages.push(lexical_form(&object)),
            "deactivated" => description.deactivated = is_true(&object),
            "minCount" => description
                .constraints
                .push(Constraint::MinCount(count(id, name, &object)?)),
            "maxCount" => description
                .constraints
                .push(Constraint::MaxCount(count(id, name, &object)?)),
            "minLength" => description
                .constraints
                .push(Constraint::MinLength(count(id, name, &object)?)),
            "maxLength" => description
                .constraints
                .push(Constraint::MaxLength(count(id, name, &object)?)),
            "datatype" => description
                .constraints
                .push(Constraint::Datatype(named(id, name, object)?)),
            "class" => description
                .constraints
                .push(Constraint::Class(named(id, name, object)?)),
            "nodeKind" => {
                let kind = named(id, name, object)?;
                if ![
                    sh::IRI,
                    sh::BLANK_NODE,
                    sh::LITERAL,
                    sh::BLANK_NODE_OR_IRI,
                    sh::BLANK_NODE_OR_LITERAL,
                    sh::IRI_OR_LITERAL,
                ]
                .contains(&kind.as_ref())
                {
                    return Err(invalid(id, format!("{kind} is not a node kind")));
                }
                description.constraints.push(Constraint::NodeKind(kind));
            }
            "pattern" => description.pattern = Some(lexical_form(&object)),
            "flags" => description.flags = Some(lexical_form(&object)),
            "languageIn" => description.constraints.push(Constraint::LanguageIn(
                list(shapes, id, object)?.iter().map(lexical_form).collect(),
            )),
            "uniqueLang" => {
                if is_true(&object) {
                    description.constraints.push(Constraint::UniqueLang);
                }
            }
            "hasValue" => description.constraints.push(Constraint::HasValue(object)),
            "in" => description
                .constraints
                .push(Constraint::In(list(shapes, id, object)?)),
            "name" | "description" | "order" | "group" | "defaultValue" => {}
            _ => return Err(unsupported(id, predicate.to_string())),
        }
    }
    if let Some(pattern) = &description.pattern {
        let regex = compile(pattern, description.flags.as_deref().unwrap_or_default())
            .map_err(|e| invalid(id, e.to_string()))?;
        description.constraints.push(Constraint::Pattern(regex));
    }
    description.messages.sort();
    Ok(description)
}

fn compile(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    let pattern = if flags.contains('q') {
        regex::escape(pattern)
    } else {
        pattern.to_owned()
    };
    let mut builder = RegexBuilder::new(&pattern);
    builder
        .case_insensitive(flags.contains('i'))
        .dot_matches_new_line(flags.contains('s'))
        .multi_line(flags.contains('m'))
        .ignore_whitespace(flags.contains('x'));
    builder.build()
}

fn named(shape: &Term, name: &str, object: Term) -> Result<NamedNode, OracleError> {
    match object {
        Term::NamedNode(node) => Ok(node),
        other => Err(invalid(
            shape,
            format!("sh:{name} expects an IRI, found {other}"),
        )),
    }
}

fn count(shape: &Term, name: &str, object: &Term) -> Result<usize, OracleError> {
    let value = match object {
        Term::Literal(literal) => literal.value().parse().ok(),
        _ => None,
    };
    value.ok_or_else(|| {
        invalid(
            shape,
            format!("sh:{name} expects a non-negative integer, found {object}"),
        )
    })
}

fn is_true(object: &Term) -> bool {
    matches!(object, Term::Literal(literal) if matches!(literal.value(), "true" | "1"))
}

fn list(shapes: &Store, shape: &Term, head: Term) -> Result<Vec<Term>, OracleError> {
    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut current = head;
    while current.as_ref() != TermRef::from(rdf::NIL) {
        if !visited.insert(current.clone()) {
            return Err(invalid(shape, "cyclic RDF list"));
        }
        let (Some(item), Some(rest)) = (
            objects(shapes, Some(&current), rdf::FIRST)?.pop(),
            objects(shapes, Some(&current), rdf::REST)?.pop(),
        ) else {
            return Err(invalid(shape, format!("{current} is not an RDF list")));
        };
        items.push(item);
        current = rest;
    }
    Ok(items)
}

fn invalid(shape: &Term, message: impl Into<String>) -> OracleError {
    OracleError::InvalidShape {
        shape: shape.to_string(),
        message: message.into(),
    }
}

fn unsupported(shape: &Term, feature: impl Into<String>) -> OracleError {
    OracleError::UnsupportedShape {
        shape: shape.to_string(),
        feature: feature.into(),
    }
}

fn violation(focus: &Term, message: Option<&str>, default: String, severity: &NamedNode) -> Violation {
    Violation {
        focus_node: lexical_form(focus),
        message: message.map_or(default, ToOwned::to_owned),
        severity: severity.as_str().to_owned(),
    }
}

fn has_node_kind(value: &Term, kind: NamedNodeRef<'_>) -> bool {
    let iri = matches!(value, Term::NamedNode(_));
    let blank = matches!(value, Term::BlankNode(_));
    let literal = matches!(value, Term::Literal(_));
    if kind == sh::IRI {
        iri
    } else if kind == sh::BLANK_NODE {
        blank
    } else if kind == sh::LITERAL {
        literal
    } else if kind == sh::BLANK_NODE_OR_IRI {
        blank || iri
    } else if kind == sh::BLANK_NODE_OR_LITERAL {
        blank || literal
    } else {
        iri || literal
    }
}

fn string_value(value: &Term) -> Option<&str> {
    match value {
        Term::NamedNode(node) => Some(node.as_str()),
        Term::Literal(literal) => Some(literal.value()),
        _ => None,
    }
}

fn language_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    tag.eq_ignore_ascii_case(range)
        || (tag
            .get(..range.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(range))
            && tag.as_bytes().get(range.len()) == Some(&b'-'))
}

/// The instances of `class` and of its subclasses.
fn instances(data: &Store, class: NamedNodeRef<'_>) -> Result<Vec<Term>, StorageError> {
    let mut classes = vec![Term::from(class)];
    let mut i = 0;
    while i < classes.len() {
        for subclass in subjects(data, rdfs::SUB_CLASS_OF, Some(classes[i].as_ref()))? {
            if !classes.contains(&subclass) {
                classes.push(subclass);
            }
        }
        i += 1;
    }
    let mut instances = Vec::new();
    for class in &classes {
        instances.extend(subjects(data, rdf::TYPE, Some(class.as_ref()))?);
    }
    Ok(instances)
}

fn is_instance(data: &Store, value: &Term, class: NamedNodeRef<'_>) -> Result<bool, StorageError> {
    let mut types = objects(data, Some(value), rdf::TYPE)?;
    let mut i = 0;
    while i < types.len() {
        if types[i].as_ref() == TermRef::from(class) {
            return Ok(true);
        }
        for superclass in objects(data, Some(&types[i]), rdfs::SUB_CLASS_OF)? {
            if !types.contains(&superclass) {
                types.push(superclass);
            }
        }
        i += 1;
    }
    Ok(false)
}

fn as_subject(term: &Term) -> Option<NamedOrBlankNodeRef<'_>> {
    match term {
        Term::NamedNode(node) => Some(node.as_ref().into()),
        Term::BlankNode(node) => Some(node.as_ref().into()),
        _ => None,
    }
}

fn outgoing(store: &Store, subject: &Term) -> Result<Vec<(NamedNode, Term)>, StorageError> {
    let Some(subject) = as_subject(subject) else {
        return Ok(Vec::new());
    };
    store
        .quads_for_pattern(Some(subject), None, None, None)
        .map(|quad| quad.map(|quad| (quad.predicate, quad.object)))
        .collect()
}

fn objects(
    store: &Store,
    subject: Option<&Term>,
    predicate: NamedNodeRef<'_>,
) -> Result<Vec<Term>, StorageError> {
    let subject = match subject.map(as_subject) {
        Some(None) => return Ok(Vec::new()),
        subject => subject.flatten(),
    };
    store
        .quads_for_pattern(subject, Some(predicate), None, None)
        .map(|quad| quad.map(|quad| quad.object))
        .collect()
}

fn subjects(
    store: &Store,
    predicate: NamedNodeRef<'_>,
    object: Option<TermRef<'_>>,
) -> Result<Vec<Term>, StorageError> {
    store
        .quads_for_pattern(None, Some(predicate), object, None)
        .map(|quad| quad.map(|quad| Term::from(quad.subject)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::io::RdfFormat;

    const DATA: &str = r#"
        @prefix : <http://example.com/onto#> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

        :Person a owl:Class ; rdfs:label "Person"@en, "Personne"@fr ; rdfs:comment "A human being" .
        :Agent a owl:Class ; rdfs:label "Agent"@en, "Agent (en)"@en .
        :knows a owl:ObjectProperty ; rdfs:label "knows" .
        :Student rdfs:subClassOf :Person .
        :alice a :Student ; :age "twelve" .
    "#;

    fn graph(content: &str) -> Graph {
        let Ok(graph) = Graph::parse("http://example.com/test.ttl", content.as_bytes(), RdfFormat::Turtle) else {
            panic!("invalid test document")
        };
        graph
    }

    fn validate(shapes: &str) -> Result<Vec<(String, String)>, OracleError> {
        Ok(ShaclValidator
            .validate(&graph(DATA), &graph(shapes), &CancellationToken::new())?
            .into_iter()
            .map(|violation| (violation.focus_node, violation.message))
            .collect())
    }

    #[test]
    fn annotation_shapes() -> Result<(), OracleError> {
        let violations = validate(
            r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

            <http://example.com/shapes#Annotated> a sh:NodeShape ;
                sh:targetClass owl:Class, owl:ObjectProperty ;
                sh:property [ sh:path rdfs:comment ; sh:minCount 1 ; sh:message "Missing rdfs:comment" ] ,
                    [ sh:path rdfs:label ; sh:uniqueLang true ] .
            "#,
        )?;
        assert_eq!(
            violations,
            [
                ("http://example.com/onto#Agent", "Language \"en\" used more than once on <http://www.w3.org/2000/01/rdf-schema#label>"),
                ("http://example.com/onto#Agent", "Missing rdfs:comment"),
                ("http://example.com/onto#knows", "Missing rdfs:comment"),
            ]
            .map(|(node, message)| (node.to_owned(), message.to_owned()))
        );
        Ok(())
    }

    #[test]
    fn subclass_instances_are_targeted() -> Result<(), OracleError> {
        let violations = validate(
            r"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

            [] sh:targetClass <http://example.com/onto#Person> ;
                sh:property [ sh:path <http://example.com/onto#age> ; sh:datatype xsd:integer ; sh:maxCount 1 ] .
            ",
        )?;
        assert_eq!(
            violations,
            [(
                "http://example.com/onto#alice".to_owned(),
                "Value \"twelve\" does not have datatype <http://www.w3.org/2001/XMLSchema#integer>".to_owned()
            )]
        );
        Ok(())
    }

    #[test]
    fn value_constraints() -> Result<(), OracleError> {
        let violations = validate(
            r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

            [] sh:targetNode <http://example.com/onto#Person> ;
                sh:property [ sh:path rdfs:label ; sh:languageIn ( "en" ) ] ,
                    [ sh:path rdfs:comment ; sh:pattern "^a " ; sh:flags "i" ; sh:maxLength 5 ] ,
                    [ sh:path [ sh:inversePath rdfs:subClassOf ] ; sh:minCount 1 ; sh:nodeKind sh:IRI ;
                      sh:in ( <http://example.com/onto#Student> ) ; sh:class rdfs:Class ] .
            "#,
        )?;
        let messages = violations
            .iter()
            .map(|(_, message)| message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            [
                "Language of \"Personne\"@fr is not in [en]",
                "Value \"A human being\" has more than 5 characters",
                "Value <http://example.com/onto#Student> is not an instance of <http://www.w3.org/2000/01/rdf-schema#Class>",
            ]
        );
        Ok(())
    }

    #[test]
    fn deactivated_shapes_are_skipped() -> Result<(), OracleError> {
        assert!(validate(
            r"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            [] sh:targetNode <http://example.com/onto#Person> ; sh:deactivated true ;
                sh:property [ sh:path <http://example.com/onto#missing> ; sh:minCount 1 ] .
            "
        )?
        .is_empty());
        Ok(())
    }

    #[test]
    fn unsupported_features_are_errors() {
        assert!(matches!(
            validate(
                r"
                @prefix sh: <http://www.w3.org/ns/shacl#> .
                [] sh:targetNode <http://example.com/onto#Person> ;
                    sh:or ( [ sh:path <http://example.com/onto#a> ; sh:minCount 1 ] ) .
                "
            ),
            Err(OracleError::UnsupportedShape { .. })
        ));
        assert!(matches!(
            validate(
                r"
                @prefix sh: <http://www.w3.org/ns/shacl#> .
                [] sh:targetNode <http://example.com/onto#Person> ;
                    sh:property [ sh:path ( <http://example.com/onto#a> <http://example.com/onto#b> ) ; sh:minCount 1 ] .
                "
            ),
            Err(OracleError::UnsupportedShape { .. })
        ));
        assert!(matches!(
            validate(
                r"
                @prefix sh: <http://www.w3.org/ns/shacl#> .
                [] sh:targetNode <http://example.com/onto#Person> ;
                    sh:property [ sh:path <http://example.com/onto#a> ; sh:minCount 'one' ] .
                "
            ),
            Err(OracleError::InvalidShape { .. })
        ));
    }

    #[test]
    fn cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            ShaclValidator.validate(
                &graph(DATA),
                &graph("[] <http://www.w3.org/ns/shacl#targetNode> <http://example.com/onto#Person> ."),
                &token
            ),
            Err(OracleError::Cancelled)
        ));
    }

    #[test]
    fn language_ranges() {
        assert!(language_matches("en-GB", "en"));
        assert!(language_matches("EN", "en"));
        assert!(!language_matches("eng", "en"));
        assert!(language_matches("fr", "*"));
    }
}
