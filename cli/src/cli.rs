use clap::{Parser, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "owlunit")]
/// Runs the OWLunit test suite of an ontology
///
/// The suite lists test cases typed as competency question verifications, error provocations,
/// annotation verifications or inference verifications.
/// The process exits with a non-zero status if a test case fails or if the suite is broken.
pub struct Args {
    /// Path or IRI of the test suite document
    #[arg(short, long, value_hint = ValueHint::AnyPath)]
    pub suite: String,
    /// Format of the suite and test case documents
    ///
    /// It can be a file extension like "ttl", a media type like "text/turtle"
    /// or one of the historical names "xml", "turtle" and "nt".
    /// By default the format is guessed from the document extensions and media types.
    #[arg(short, long)]
    pub format: Option<String>,
    /// Number of test cases of the same kind executed at the same time
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,
    /// Command checking the consistency of an ontology, used by error provocation test cases
    ///
    /// The ontology location is appended to the command.
    /// It must print "consistent" or "inconsistent".
    #[arg(long, value_hint = ValueHint::CommandString)]
    pub reasoner: Option<String>,
    /// Command validating data against SHACL shapes, used by annotation verification test cases
    ///
    /// The paths of the N-Triples data and shapes files are appended to the command.
    /// It must print a SHACL validation report in Turtle.
    /// By default the built-in validator is used, which only supports the core SHACL constraints.
    #[arg(long, value_hint = ValueHint::CommandString)]
    pub validator: Option<String>,
    /// Path or IRI of the shapes used by annotation verification test cases
    ///
    /// By default the shapes published by OWLunit are used.
    #[arg(long, value_hint = ValueHint::AnyPath)]
    pub shapes: Option<String>,
    /// File in which an EARL report of the run is written
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub earl: Option<PathBuf>,
    /// Timeout of HTTP requests in seconds
    #[arg(long)]
    pub http_timeout: Option<u64>,
}
