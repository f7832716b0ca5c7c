pub mod owlunit {
    //! The [OWLunit](https://w3id.org/OWLunit/ontology/) test vocabulary.
    use oxigraph::model::NamedNodeRef;

    pub const NAMESPACE: &str = "https://w3id.org/OWLunit/ontology/";

    pub const TEST_SUITE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://w3id.org/OWLunit/ontology/TestSuite");
    pub const HAS_TEST_CASE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://w3id.org/OWLunit/ontology/hasTestCase");

    pub const COMPETENCY_QUESTION_VERIFICATION: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "https://w3id.org/OWLunit/ontology/CompetencyQuestionVerification",
    );
    pub const ERROR_PROVOCATION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://w3id.org/OWLunit/ontology/ErrorProvocation");
    pub const ANNOTATION_VERIFICATION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://w3id.org/OWLunit/ontology/AnnotationVerification");
    pub const INFERENCE_VERIFICATION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://w3id.org/OWLunit/ontology/InferenceVerification");
}

pub mod owl {
    use oxigraph::model::NamedNodeRef;

    pub const CLASS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");
    pub const ONTOLOGY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Ontology");
}

pub mod sh {
    //! The [SHACL](https://www.w3.org/TR/shacl/) terms understood by the built-in validator.
    use oxigraph::model::NamedNodeRef;

    pub const NAMESPACE: &str = "http://www.w3.org/ns/shacl#";

    pub const NODE_SHAPE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#NodeShape");
    pub const TARGET_CLASS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#targetClass");
    pub const TARGET_NODE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#targetNode");
    pub const TARGET_SUBJECTS_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#targetSubjectsOf");
    pub const TARGET_OBJECTS_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#targetObjectsOf");
    pub const INVERSE_PATH: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#inversePath");
    pub const VIOLATION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#Violation");
    pub const IRI: NamedNodeRef<'_> = NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#IRI");
    pub const BLANK_NODE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#BlankNode");
    pub const LITERAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#Literal");
    pub const BLANK_NODE_OR_IRI: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#BlankNodeOrIRI");
    pub const BLANK_NODE_OR_LITERAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#BlankNodeOrLiteral");
    pub const IRI_OR_LITERAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#IRIOrLiteral");
}

pub mod earl {
    //! [EARL](https://www.w3.org/TR/EARL10-Schema/) vocabulary used by the test reports.
    use oxigraph::model::NamedNodeRef;

    pub const ASSERTION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#Assertion");
    pub const ASSERTED_BY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#assertedBy");
    pub const SUBJECT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#subject");
    pub const TEST: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#test");
    pub const RESULT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#result");
    pub const MODE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#mode");
    pub const AUTOMATIC: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#automatic");
    pub const TEST_RESULT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#TestResult");
    pub const OUTCOME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#outcome");
    pub const PASSED: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#passed");
    pub const FAILED: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#failed");
    pub const INFO: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#info");
    pub const SOFTWARE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/earl#Software");
}

pub mod dc {
    use oxigraph::model::NamedNodeRef;

    pub const DATE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://purl.org/dc/terms/date");
    pub const TITLE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://purl.org/dc/terms/title");
}
