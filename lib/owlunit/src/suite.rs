use crate::error::{CaseError, ConstructError, SuiteError};
use crate::manifest::{TestCase, TestKind, test_cases};
use crate::oracle::CancellationToken;
use crate::report::{CaseOutcome, CaseRecord, ReportSink, SuiteReport, TracingSink};
use crate::strategy::{self, Environment, VerificationStrategy};
use oxigraph::io::RdfFormat;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// Options of a suite run.
///
/// ```
/// use owlunit::{CancellationToken, SuiteOptions};
/// use owlunit::io::RdfFormat;
///
/// let _options = SuiteOptions::default()
///     .with_format(RdfFormat::Turtle)
///     .with_concurrency(4)
///     .with_cancellation_token(CancellationToken::new());
/// ```
#[derive(Clone)]
pub struct SuiteOptions {
    format: Option<RdfFormat>,
    concurrency: usize,
    sink: Arc<dyn ReportSink>,
    cancellation: CancellationToken,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            format: None,
            concurrency: 1,
            sink: Arc::new(TracingSink),
            cancellation: CancellationToken::new(),
        }
    }
}

impl SuiteOptions {
    /// The format of the suite and test case documents.
    ///
    /// By default it is guessed from the document locations and media types.
    #[must_use]
    pub fn with_format(mut self, format: RdfFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// The number of test cases of the same kind executed at the same time.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Allows to stop the run from another thread.
    ///
    /// The cases not yet finished are left out of the report, which is marked as incomplete.
    #[must_use]
    pub fn with_cancellation_token(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

struct PreparedCase {
    case: TestCase,
    strategy: Result<Box<dyn VerificationStrategy>, CaseError>,
}

/// A test suite whose test cases have been discovered and described.
pub struct TestSuite {
    location: String,
    cases: Vec<PreparedCase>,
    environment: Environment,
    options: SuiteOptions,
    pool: Option<ThreadPool>,
}

impl TestSuite {
    /// Reads the suite at `location` and the description of each of its test cases.
    ///
    /// A broken suite fails the discovery.
    /// A test case with a malformed query or expected result is kept and will be reported as failed.
    pub fn discover(
        location: &str,
        options: SuiteOptions,
        environment: Environment,
    ) -> Result<Self, SuiteError> {
        let suite = environment.source().parse(location, options.format)?;
        let mut cases = Vec::new();
        for case in test_cases(&suite, location, options.format)? {
            let strategy = match strategy::construct(&case, &environment) {
                Ok(strategy) => Ok(strategy),
                Err(ConstructError::Case(error)) => Err(error),
                Err(ConstructError::Suite(error)) => return Err(error),
            };
            cases.push(PreparedCase { case, strategy });
        }
        let pool = if options.concurrency > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(options.concurrency)
                    .thread_name(|i| format!("owlunit-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            location: location.to_owned(),
            cases,
            environment,
            options,
            pool,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// The test cases, sorted by kind then by IRI.
    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().map(|prepared| &prepared.case)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Executes every test case.
    ///
    /// A failing test case never prevents the others from running.
    pub fn run(&self) -> SuiteReport {
        let started = OffsetDateTime::now_utc();
        let mut records = Vec::with_capacity(self.cases.len());
        for kind in TestKind::ALL {
            let group = self
                .cases
                .iter()
                .filter(|prepared| prepared.case.kind == kind)
                .collect::<Vec<_>>();
            if group.is_empty() {
                continue;
            }
            debug!(kind = kind.abbreviation(), cases = group.len(), "running test cases");
            match &self.pool {
                Some(pool) => records.extend(pool.install(|| {
                    group
                        .par_iter()
                        .filter_map(|prepared| self.execute(prepared))
                        .collect::<Vec<_>>()
                })),
                None => records.extend(group.iter().filter_map(|prepared| self.execute(prepared))),
            }
        }
        let report = SuiteReport {
            suite: self.location.clone(),
            discovered: self.cases.len(),
            complete: records.len() == self.cases.len(),
            records,
            started,
            finished: OffsetDateTime::now_utc(),
        };
        self.options.sink.suite_finished(&report);
        report
    }

    /// Executes a single case, `None` if it has been interrupted by the cancellation token.
    fn execute(&self, prepared: &PreparedCase) -> Option<CaseRecord> {
        let cancellation = &self.options.cancellation;
        if cancellation.is_cancelled() {
            return None;
        }
        let (label, outcome) = match &prepared.strategy {
            Ok(strategy) => {
                let outcome = match strategy.test(&self.environment, cancellation) {
                    Ok(passed) => CaseOutcome::Passed(passed),
                    Err(error) if error.is_cancellation() => return None,
                    Err(error) => failure(&error),
                };
                (strategy.label().map(ToOwned::to_owned), outcome)
            }
            Err(error) => (None, failure(error)),
        };
        let record = CaseRecord {
            case: prepared.case.uri.clone(),
            kind: prepared.case.kind,
            label,
            outcome,
            date: OffsetDateTime::now_utc(),
        };
        self.options.sink.case_finished(&record);
        Some(record)
    }
}

fn failure(error: &CaseError) -> CaseOutcome {
    CaseOutcome::Failed {
        kind: error.kind(),
        message: error.to_string(),
    }
}

/// Discovers and runs the suite at `location`.
///
/// Only suite-integrity errors are returned, test case failures are in the report.
pub fn run_suite(
    location: &str,
    options: SuiteOptions,
    environment: Environment,
) -> Result<SuiteReport, SuiteError> {
    Ok(TestSuite::discover(location, options, environment)?.run())
}
