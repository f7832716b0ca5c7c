use oxigraph::io::RdfFormat;
use oxiri::Iri;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{self, PathBuf};
use std::time::Duration;
use url::Url;

/// The raw content of a retrieved document.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: Vec<u8>,
    /// The media type announced by the server, if any.
    pub media_type: Option<String>,
}

/// Retrieves documents from their location.
///
/// Implementations must be usable from several test cases at the same time.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, location: &str) -> io::Result<Document>;
}

/// Loads local paths and `file:` URLs, and `http(s):` URLs if the `http-client` feature is enabled.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    http_timeout: Option<Duration>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout of HTTP requests. Unused without the `http-client` feature.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    #[cfg(feature = "http-client")]
    fn fetch(&self, url: &str) -> io::Result<Document> {
        use oxhttp::model::Request;
        use oxhttp::model::header::{ACCEPT, CONTENT_TYPE};
        use std::io::Read;

        let mut client = oxhttp::Client::new()
            .with_redirection_limit(5)
            .with_user_agent(concat!("OWLunit/", env!("CARGO_PKG_VERSION")))
            .map_err(io::Error::other)?;
        if let Some(timeout) = self.http_timeout {
            client = client.with_global_timeout(timeout);
        }
        let request = Request::builder()
            .uri(url)
            .header(ACCEPT, RDF_ACCEPT)
            .body(())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let response = client.request(request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(io::Error::other(format!(
                "Error {} returned by {} with payload:\n{}",
                status,
                url,
                response.into_body().to_string()?
            )));
        }
        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let mut content = Vec::new();
        response.into_body().read_to_end(&mut content)?;
        Ok(Document {
            content,
            media_type,
        })
    }

    #[cfg(not(feature = "http-client"))]
    fn fetch(&self, url: &str) -> io::Result<Document> {
        if let Some(timeout) = self.http_timeout {
            tracing::debug!(url, ?timeout, "HTTP timeout ignored without the http-client feature");
        }
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("Retrieving {url} requires the http-client feature"),
        ))
    }
}

#[cfg(feature = "http-client")]
const RDF_ACCEPT: &str = "text/turtle, application/rdf+xml;q=0.9, application/n-triples;q=0.8, application/ld+json;q=0.7, */*;q=0.1";

impl DocumentLoader for FileLoader {
    fn load(&self, location: &str) -> io::Result<Document> {
        let location = without_fragment(location);
        let path = match Url::parse(location) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().map_err(|()| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{location} is not a valid file path"),
                )
            })?,
            Ok(url) if matches!(url.scheme(), "http" | "https") => return self.fetch(location),
            // Windows drive letters are parsed as URL schemes
            Ok(url) if url.scheme().len() > 1 => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("Unsupported URL scheme {} in {location}", url.scheme()),
                ));
            }
            _ => PathBuf::from(location),
        };
        let content = fs::read(&path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))?;
        Ok(Document {
            content,
            media_type: None,
        })
    }
}

/// Serves documents from memory.
///
/// ```
/// use owlunit::files::{DocumentLoader, InMemoryLoader};
///
/// let loader = InMemoryLoader::new().with_document(
///     "http://example.com/data.ttl",
///     "<http://example.com/s> <http://example.com/p> <http://example.com/o> .",
/// );
/// assert!(loader.load("http://example.com/data.ttl#fragment").is_ok());
/// assert!(loader.load("http://example.com/other.ttl").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    documents: HashMap<String, Document>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, location: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(location, None, content);
        self
    }

    #[must_use]
    pub fn with_typed_document(
        mut self,
        location: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert(location, Some(media_type.into()), content);
        self
    }

    pub fn insert(
        &mut self,
        location: impl Into<String>,
        media_type: Option<String>,
        content: impl Into<Vec<u8>>,
    ) {
        self.documents.insert(
            location.into(),
            Document {
                content: content.into(),
                media_type,
            },
        );
    }
}

impl DocumentLoader for InMemoryLoader {
    fn load(&self, location: &str) -> io::Result<Document> {
        self.documents
            .get(without_fragment(location))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("No document is registered at {location}"),
                )
            })
    }
}

pub fn without_fragment(location: &str) -> &str {
    location
        .split_once('#')
        .map_or(location, |(document, _)| document)
}

/// Guesses the serialization format from the extension of the location path.
pub fn guess_rdf_format(location: &str) -> Option<RdfFormat> {
    let location = without_fragment(location);
    let location = location
        .split_once('?')
        .map_or(location, |(path, _)| path);
    let file_name = location.rsplit('/').next()?;
    let (_, extension) = file_name.rsplit_once('.')?;
    if extension.eq_ignore_ascii_case("owl") {
        return Some(RdfFormat::RdfXml);
    }
    RdfFormat::from_extension(extension)
}

/// Parses a user given format name.
///
/// Historical names (`xml`, `turtle`, `nt`...) are accepted next to file extensions and media types.
pub fn rdf_format_from_name(name: &str) -> Option<RdfFormat> {
    match name.to_ascii_lowercase().as_str() {
        "xml" | "rdfxml" | "rdf/xml" | "pretty-xml" => Some(RdfFormat::RdfXml),
        "turtle" => Some(RdfFormat::Turtle),
        "ntriples" | "n-triples" | "nt11" => Some(RdfFormat::NTriples),
        "nquads" | "n-quads" => Some(RdfFormat::NQuads),
        "json-ld" => RdfFormat::from_extension("jsonld"),
        name => RdfFormat::from_extension(name).or_else(|| RdfFormat::from_media_type(name)),
    }
}

/// Turns a command line argument into an absolute IRI.
///
/// Absolute IRIs are kept as is and file system paths are converted to `file:` URLs,
/// so that relative IRIs inside the document resolve next to it.
pub fn to_location(argument: &str) -> io::Result<String> {
    if let Ok(iri) = Iri::parse(argument) {
        if iri.scheme().len() > 1 {
            return Ok(argument.to_owned());
        }
    }
    let path = path::absolute(argument)?;
    Url::from_file_path(&path).map(String::from).map_err(|()| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} can not be converted to a file URL", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn format_names() {
        assert_eq!(rdf_format_from_name("xml"), Some(RdfFormat::RdfXml));
        assert_eq!(rdf_format_from_name("Turtle"), Some(RdfFormat::Turtle));
        assert_eq!(rdf_format_from_name("ttl"), Some(RdfFormat::Turtle));
        assert_eq!(rdf_format_from_name("nt"), Some(RdfFormat::NTriples));
        assert_eq!(rdf_format_from_name("text/turtle"), Some(RdfFormat::Turtle));
        assert_eq!(rdf_format_from_name("foo"), None);
    }

    #[test]
    fn format_guessing() {
        assert_eq!(
            guess_rdf_format("http://example.com/suite.ttl#case"),
            Some(RdfFormat::Turtle)
        );
        assert_eq!(
            guess_rdf_format("file:///tmp/onto.owl"),
            Some(RdfFormat::RdfXml)
        );
        assert_eq!(guess_rdf_format("http://example.com/v1.0/onto"), None);
    }

    #[test]
    fn locations() -> io::Result<()> {
        assert_eq!(
            to_location("https://example.com/suite.ttl")?,
            "https://example.com/suite.ttl"
        );
        assert!(to_location("suite.ttl")?.starts_with("file:///"));
        Ok(())
    }

    #[test]
    fn file_loader_reads_paths_and_file_urls() -> io::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"<http://example.com/s> <http://example.com/p> \"o\" .")?;
        let loader = FileLoader::new();
        let by_path = loader.load(&file.path().display().to_string())?;
        let by_url = loader.load(&to_location(&file.path().display().to_string())?)?;
        assert_eq!(by_path.content, by_url.content);
        assert!(loader.load("ftp://example.com/foo.ttl").is_err());
        Ok(())
    }

    #[cfg(not(feature = "http-client"))]
    #[test]
    fn http_requires_the_client_feature() {
        let loader = FileLoader::new().with_http_timeout(Duration::from_secs(1));
        let Err(error) = loader.load("http://example.com/onto.ttl") else {
            panic!("HTTP is not available")
        };
        assert_eq!(error.kind(), io::ErrorKind::Unsupported);
    }
}
