use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error, info, instrument};

use crate::domain::JTError;
use crate::parser::{normalize_header, parse_line};

/// Provider of the raw CSV text.
pub trait TextSource {
    fn fetch(&self) -> Result<String, JTError>;

    fn name(&self) -> String {
        String::from("jobs")
    }
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TextSource for FileSource {
    fn fetch(&self) -> Result<String, JTError> {
        let metadata = fs::metadata(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => JTError::FileNotFound,
            ErrorKind::PermissionDenied => JTError::PermissionDenied,
            _ => JTError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(JTError::LoadingFailed("Not a file!".into()));
        }
        Ok(fs::read_to_string(&self.path)?)
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }
}

impl TextSource for str {
    fn fetch(&self) -> Result<String, JTError> {
        Ok(self.to_string())
    }
}

impl TextSource for String {
    fn fetch(&self) -> Result<String, JTError> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderField {
    pub raw: String,
    pub key: String,
}

impl HeaderField {
    pub fn new(raw: String) -> Self {
        let key = normalize_header(&raw);
        Self { raw, key }
    }
}

/// One CSV record, positionally aligned to the header. Rows may be shorter or
/// longer than the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Value of the link column, `None` when the column or value is missing.
    pub fn link(&self, roles: &FieldRoles) -> Option<&str> {
        roles
            .link
            .and_then(|idx| self.get(idx))
            .filter(|link| !link.is_empty())
    }
}

/// Canonical meaning of a header column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Link,
    Company,
    Title,
}

impl FieldRole {
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            FieldRole::Link => &["job_link", "link", "url"],
            FieldRole::Company => &["company", "company_name"],
            FieldRole::Title => &["job_title", "title"],
        }
    }

    fn find(&self, header: &[HeaderField]) -> Option<usize> {
        let aliases = self.aliases();
        // Earlier aliases win over later ones.
        aliases
            .iter()
            .find_map(|alias| header.iter().position(|h| h.key == *alias))
    }
}

/// Column positions of the canonical roles, resolved once per load.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldRoles {
    pub link: Option<usize>,
    pub company: Option<usize>,
    pub title: Option<usize>,
}

impl FieldRoles {
    pub fn resolve(header: &[HeaderField]) -> Self {
        Self {
            link: FieldRole::Link.find(header),
            company: FieldRole::Company.find(header),
            title: FieldRole::Title.find(header),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    name: String,
    header: Vec<HeaderField>,
    rows: Vec<Row>,
    roles: FieldRoles,
}

impl Dataset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch and parse `source`. A failed fetch is logged and yields an empty
    /// dataset, it is never retried.
    #[instrument(skip(source), fields(source = %source.name()))]
    pub fn load<S: TextSource + ?Sized>(source: &S) -> Self {
        match source.fetch() {
            Ok(text) => Self::parse(source.name(), &text),
            Err(e) => {
                error!("Fetching dataset failed: {e:?}");
                Self {
                    name: source.name(),
                    ..Self::default()
                }
            }
        }
    }

    /// First non-empty line is the header, every further non-empty line a row.
    pub fn parse(name: String, text: &str) -> Self {
        let start_time = Instant::now();

        let mut lines = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let header: Vec<HeaderField> = match lines.next() {
            Some(line) => parse_line(line).into_iter().map(HeaderField::new).collect(),
            None => Vec::new(),
        };
        let body: Vec<&str> = lines.collect();

        // collect() on an indexed parallel iterator keeps the line order.
        let rows: Vec<Row> = body.par_iter().map(|l| Row::new(parse_line(l))).collect();
        let roles = FieldRoles::resolve(&header);

        info!(
            "Parsed {} rows with {} columns in {}ms",
            rows.len(),
            header.len(),
            start_time.elapsed().as_millis()
        );
        debug!("Header {:?}, roles {:?}", header, roles);

        Self {
            name,
            header,
            rows,
            roles,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[HeaderField] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn roles(&self) -> &FieldRoles {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
