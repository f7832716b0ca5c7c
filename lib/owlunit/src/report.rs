use crate::error::FailureKind;
use crate::manifest::TestKind;
use crate::strategy::Passed;
use crate::vocab::{dc, earl};
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::vocab::{rdf, xsd};
use oxigraph::model::{BlankNode, LiteralRef, NamedNode, TripleRef};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

/// The outcome of a single test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed(Passed),
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub case: String,
    pub kind: TestKind,
    pub label: Option<String>,
    pub outcome: CaseOutcome,
    pub date: OffsetDateTime,
}

impl CaseRecord {
    pub fn is_passed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Passed(_))
    }

    /// The label of the case if it has one, else its IRI.
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.case)
    }
}

/// Counts of the test cases of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindTally {
    pub total: usize,
    pub passed: usize,
}

impl KindTally {
    pub fn failed(&self) -> usize {
        self.total - self.passed
    }
}

/// The result of a suite run.
///
/// Records are sorted by kind then by case IRI so that the report does not depend on the execution order.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite: String,
    /// The number of test cases the suite declares.
    pub discovered: usize,
    pub records: Vec<CaseRecord>,
    /// `false` if the run has been cancelled before all the cases were executed.
    pub complete: bool,
    pub started: OffsetDateTime,
    pub finished: OffsetDateTime,
}

impl SuiteReport {
    /// The number of executed test cases.
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn by_kind(&self) -> BTreeMap<TestKind, KindTally> {
        let mut tallies = BTreeMap::<TestKind, KindTally>::new();
        for record in &self.records {
            let tally = tallies.entry(record.kind).or_default();
            tally.total += 1;
            if record.is_passed() {
                tally.passed += 1;
            }
        }
        tallies
    }

    /// Every declared test case has been executed and passed.
    pub fn is_success(&self) -> bool {
        self.complete && self.passed() == self.discovered
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseRecord> {
        self.records.iter().filter(|r| !r.is_passed())
    }

    /// Writes the report in Turtle using the [EARL](https://www.w3.org/TR/EARL10-Schema/) vocabulary.
    pub fn write_earl<W: Write>(&self, writer: W) -> io::Result<W> {
        let mut serializer = RdfSerializer::from_format(RdfFormat::Turtle)
            .with_prefix("earl", "http://www.w3.org/ns/earl#")
            .map_err(io::Error::other)?
            .with_prefix("dc", "http://purl.org/dc/terms/")
            .map_err(io::Error::other)?
            .for_writer(writer);
        let software = BlankNode::default();
        serializer.serialize_triple(TripleRef::new(&software, rdf::TYPE, earl::SOFTWARE))?;
        serializer.serialize_triple(TripleRef::new(
            &software,
            dc::TITLE,
            LiteralRef::new_simple_literal(concat!("OWLunit ", env!("CARGO_PKG_VERSION"))),
        ))?;
        let suite = NamedNode::new(self.suite.as_str()).map_err(io::Error::other)?;
        for record in &self.records {
            let test = NamedNode::new(record.case.as_str()).map_err(io::Error::other)?;
            let date = record.date.format(&Rfc3339).map_err(io::Error::other)?;
            let assertion = BlankNode::default();
            let result = BlankNode::default();
            serializer.serialize_triple(TripleRef::new(&assertion, rdf::TYPE, earl::ASSERTION))?;
            serializer.serialize_triple(TripleRef::new(&assertion, earl::ASSERTED_BY, &software))?;
            serializer.serialize_triple(TripleRef::new(&assertion, earl::SUBJECT, &suite))?;
            serializer.serialize_triple(TripleRef::new(&assertion, earl::TEST, &test))?;
            serializer.serialize_triple(TripleRef::new(&assertion, earl::RESULT, &result))?;
            serializer.serialize_triple(TripleRef::new(&assertion, earl::MODE, earl::AUTOMATIC))?;
            serializer.serialize_triple(TripleRef::new(&result, rdf::TYPE, earl::TEST_RESULT))?;
            serializer.serialize_triple(TripleRef::new(
                &result,
                earl::OUTCOME,
                if record.is_passed() {
                    earl::PASSED
                } else {
                    earl::FAILED
                },
            ))?;
            if let CaseOutcome::Failed { message, .. } = &record.outcome {
                serializer.serialize_triple(TripleRef::new(
                    &result,
                    earl::INFO,
                    LiteralRef::new_simple_literal(message),
                ))?;
            }
            serializer.serialize_triple(TripleRef::new(
                &result,
                dc::DATE,
                LiteralRef::new_typed_literal(&date, xsd::DATE_TIME),
            ))?;
        }
        serializer.finish()
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} test cases passed", self.passed(), self.total())?;
        if !self.complete {
            write!(
                f,
                " (incomplete run, {} of {} cases executed)",
                self.total(),
                self.discovered
            )?;
        }
        for (kind, tally) in self.by_kind() {
            write!(f, "\n  {kind}: {}/{}", tally.passed, tally.total)?;
        }
        Ok(())
    }
}

/// Receives the test case results as they are produced.
pub trait ReportSink: Send + Sync {
    fn case_finished(&self, record: &CaseRecord);

    fn suite_finished(&self, _report: &SuiteReport) {}
}

/// Logs the results with [`tracing`].
///
/// Violations are logged with the `owlunit::violation` target, infrastructure faults with `owlunit::fault`
/// and broken test descriptions with `owlunit::construction`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn case_finished(&self, record: &CaseRecord) {
        let name = record.name();
        let kind = record.kind.abbreviation();
        match &record.outcome {
            CaseOutcome::Passed(Passed::ByVerdict) => {
                info!(kind, case = %record.case, "{name} - PASSED");
            }
            CaseOutcome::Passed(Passed::ByCheckerAbort { reason }) => {
                warn!(kind, case = %record.case, "{name} - PASSED as the checker aborted: {reason}");
            }
            CaseOutcome::Failed {
                kind: FailureKind::Violation,
                message,
            } => {
                error!(target: "owlunit::violation", kind, case = %record.case, "{name} - FAILED {message}");
            }
            CaseOutcome::Failed {
                kind: FailureKind::Construction,
                message,
            } => {
                error!(target: "owlunit::construction", kind, case = %record.case, "{name} - INVALID {message}");
            }
            CaseOutcome::Failed {
                kind: FailureKind::Fault,
                message,
            } => {
                error!(target: "owlunit::fault", kind, case = %record.case, "{name} - ERROR {message}");
            }
        }
    }

    fn suite_finished(&self, report: &SuiteReport) {
        if report.is_success() {
            info!(suite = %report.suite, "{report}");
        } else {
            warn!(suite = %report.suite, "{report}");
        }
    }
}
