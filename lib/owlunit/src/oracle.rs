//! The external decision procedures consulted by the verification strategies.
//!
//! The engine only relies on the [`ReasonerOracle`] and [`ShapeValidatorOracle`] traits.
//! [`CommandReasoner`] and [`CommandShapeValidator`] delegate to external programs.

use crate::error::{OracleError, QueryError};
use crate::graph::{Graph, lexical_form};
use oxigraph::io::RdfFormat;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::{fmt, io, thread};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cooperative cancellation signal shared between the caller, the dispatcher and the oracles.
///
/// ```
/// use owlunit::CancellationToken;
///
/// let token = CancellationToken::new();
/// let clone = token.clone();
/// clone.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The answer of a consistency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyVerdict {
    Consistent,
    Inconsistent,
    /// The checker terminated abnormally, which checkers use to signal an inconsistency.
    CheckerAborted { reason: String },
}

/// Decides if an ontology, with its imports, is consistent.
pub trait ReasonerOracle: Send + Sync {
    fn check_consistency(
        &self,
        ontology: &str,
        cancellation: &CancellationToken,
    ) -> Result<ConsistencyVerdict, OracleError>;
}

/// A SHACL validation result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Violation {
    pub focus_node: String,
    pub message: String,
    pub severity: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.focus_node, self.message, self.severity)
    }
}

/// Validates a data graph against a shapes graph.
pub trait ShapeValidatorOracle: Send + Sync {
    fn validate(
        &self,
        data: &Graph,
        shapes: &Graph,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Violation>, OracleError>;
}

/// Used when no reasoner is configured: every check is an infrastructure fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableReasoner;

impl ReasonerOracle for UnavailableReasoner {
    fn check_consistency(
        &self,
        _: &str,
        _: &CancellationToken,
    ) -> Result<ConsistencyVerdict, OracleError> {
        Err(OracleError::Unavailable("reasoner"))
    }
}

/// Runs an external consistency checker.
///
/// The ontology location is appended to the arguments.
/// The program must exit successfully and print `consistent` (or `true`) or `inconsistent` (or `false`).
/// Any other termination is reported as [`ConsistencyVerdict::CheckerAborted`].
#[derive(Debug, Clone)]
pub struct CommandReasoner {
    program: String,
    args: Vec<String>,
}

impl CommandReasoner {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReasonerOracle for CommandReasoner {
    fn check_consistency(
        &self,
        ontology: &str,
        cancellation: &CancellationToken,
    ) -> Result<ConsistencyVerdict, OracleError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(ontology);
        let output = run(&self.program, command, cancellation)?;
        if !output.status.success() {
            return Ok(ConsistencyVerdict::CheckerAborted {
                reason: describe_failure(output.status, &output.stderr),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.trim().to_ascii_lowercase().as_str() {
            "consistent" | "true" => Ok(ConsistencyVerdict::Consistent),
            "inconsistent" | "false" => Ok(ConsistencyVerdict::Inconsistent),
            _ => Err(OracleError::UnexpectedOutput {
                program: self.program.clone(),
                output: stdout.into_owned(),
            }),
        }
    }
}

/// Runs an external SHACL validator.
///
/// The data and shapes graphs are written to temporary N-Triples files whose paths are appended to the arguments.
/// The program must print a SHACL validation report in Turtle.
#[derive(Debug, Clone)]
pub struct CommandShapeValidator {
    program: String,
    args: Vec<String>,
}

impl CommandShapeValidator {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl ShapeValidatorOracle for CommandShapeValidator {
    fn validate(
        &self,
        data: &Graph,
        shapes: &Graph,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Violation>, OracleError> {
        let mut data_file = tempfile::Builder::new().suffix(".nt").tempfile()?;
        data.write_ntriples(data_file.as_file_mut())?;
        let mut shapes_file = tempfile::Builder::new().suffix(".nt").tempfile()?;
        shapes.write_ntriples(shapes_file.as_file_mut())?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(data_file.path())
            .arg(shapes_file.path());
        let output = run(&self.program, command, cancellation)?;
        if !output.status.success() {
            return Err(OracleError::UnexpectedOutput {
                program: self.program.clone(),
                output: describe_failure(output.status, &output.stderr),
            });
        }
        let report = Graph::parse("urn:owlunit:validation-report", &output.stdout, RdfFormat::Turtle)?;
        Ok(violations_from_report(&report)?)
    }
}

const VALIDATION_RESULTS_QUERY: &str = "
PREFIX sh: <http://www.w3.org/ns/shacl#>
SELECT DISTINCT ?node ?message ?severity WHERE {
    ?result a sh:ValidationResult ;
        sh:focusNode ?node ;
        sh:resultSeverity ?severity ;
        sh:resultMessage ?message .
}";

/// Extracts the validation results of a SHACL validation report.
///
/// Results without a message or a severity are ignored.
pub fn violations_from_report(report: &Graph) -> Result<Vec<Violation>, QueryError> {
    let mut violations = report
        .query_pattern(VALIDATION_RESULTS_QUERY)?
        .into_iter()
        .filter_map(|row| {
            Some(Violation {
                focus_node: lexical_form(row.get("node")?),
                message: lexical_form(row.get("message")?),
                severity: lexical_form(row.get("severity")?),
            })
        })
        .collect::<Vec<_>>();
    violations.sort();
    Ok(violations)
}

/// Runs the command to completion, killing it if the cancellation token is triggered.
fn run(
    program: &str,
    mut command: Command,
    cancellation: &CancellationToken,
) -> Result<Output, OracleError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| OracleError::Spawn {
            program: program.to_owned(),
            source,
        })?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let status = wait(&mut child, cancellation)?;
    Ok(Output {
        status,
        stdout: join(stdout)?,
        stderr: join(stderr)?,
    })
}

fn wait(child: &mut Child, cancellation: &CancellationToken) -> Result<ExitStatus, OracleError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if cancellation.is_cancelled() {
            child.kill()?;
            child.wait()?;
            return Err(OracleError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

type Drain = Option<thread::JoinHandle<io::Result<Vec<u8>>>>;

// A child blocked on a full pipe never exits, so both pipes are read concurrently
fn drain(pipe: Option<impl Read + Send + 'static>) -> Drain {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            pipe.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    })
}

fn join(drain: Drain) -> io::Result<Vec<u8>> {
    match drain {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("The output reader thread panicked"))?,
        None => Ok(Vec::new()),
    }
}

fn describe_failure(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("the checker exited with {status}")
    } else {
        format!("the checker exited with {status}: {stderr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        [] a sh:ValidationReport ;
            sh:conforms false ;
            sh:result [
                a sh:ValidationResult ;
                sh:focusNode <http://example.com/onto#Person> ;
                sh:resultMessage "Missing rdfs:label" ;
                sh:resultSeverity sh:Violation
            ], [
                a sh:ValidationResult ;
                sh:focusNode <http://example.com/other/Thing> ;
                sh:resultMessage "Missing rdfs:comment" ;
                sh:resultSeverity sh:Warning
            ], [
                a sh:ValidationResult ;
                sh:focusNode <http://example.com/onto#Incomplete>
            ] .
    "#;

    #[test]
    fn report_extraction() -> Result<(), Box<dyn std::error::Error>> {
        let report = Graph::parse("http://example.com/report.ttl", REPORT.as_bytes(), RdfFormat::Turtle)?;
        assert_eq!(
            violations_from_report(&report)?,
            vec![
                Violation {
                    focus_node: "http://example.com/onto#Person".into(),
                    message: "Missing rdfs:label".into(),
                    severity: "http://www.w3.org/ns/shacl#Violation".into(),
                },
                Violation {
                    focus_node: "http://example.com/other/Thing".into(),
                    message: "Missing rdfs:comment".into(),
                    severity: "http://www.w3.org/ns/shacl#Warning".into(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn unavailable_oracles_are_faults() {
        assert!(matches!(
            UnavailableReasoner.check_consistency("http://example.com/onto", &CancellationToken::new()),
            Err(OracleError::Unavailable(_))
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let reasoner = CommandReasoner::new("owlunit-this-program-does-not-exist", Vec::<String>::new());
        assert!(matches!(
            reasoner.check_consistency("http://example.com/onto", &CancellationToken::new()),
            Err(OracleError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_reasoner_verdicts() -> Result<(), OracleError> {
        let token = CancellationToken::new();
        let consistent = CommandReasoner::new("sh", ["-c", "echo consistent", "sh"]);
        assert_eq!(
            consistent.check_consistency("onto.owl", &token)?,
            ConsistencyVerdict::Consistent
        );
        let inconsistent = CommandReasoner::new("sh", ["-c", "echo Inconsistent", "sh"]);
        assert_eq!(
            inconsistent.check_consistency("onto.owl", &token)?,
            ConsistencyVerdict::Inconsistent
        );
        let aborted = CommandReasoner::new("sh", ["-c", "echo boom >&2; exit 3", "sh"]);
        let ConsistencyVerdict::CheckerAborted { reason } =
            aborted.check_consistency("onto.owl", &token)?
        else {
            panic!("abnormal termination must be reported as an abort")
        };
        assert!(reason.contains("boom"), "{reason}");
        let chatty = CommandReasoner::new("sh", ["-c", "echo maybe", "sh"]);
        assert!(matches!(
            chatty.check_consistency("onto.owl", &token),
            Err(OracleError::UnexpectedOutput { .. })
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_the_checker() {
        let token = CancellationToken::new();
        token.cancel();
        let slow = CommandReasoner::new("sh", ["-c", "sleep 30", "sh"]);
        assert!(matches!(
            slow.check_consistency("onto.owl", &token),
            Err(OracleError::Cancelled)
        ));
    }
}
