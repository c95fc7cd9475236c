//! Fuzzy signature database
//!
//! A persisted two-level map `name -> sub_name -> [element]` where each
//! element is one unit of a larger signature (for instance the fingerprint
//! of one basic block), plus a set view per sub-signature for intersection
//! queries.
//!
//! On disk this is a single JSON object:
//!
//! ```json
//! { "com.example.app": { "Lcom/example/Foo;->bar()V": [17, 4242, "bb:9f"] } }
//! ```
//!
//! The file is read in full by [`SignatureDb::open`] (a missing file is an
//! empty database) and rewritten in full by [`SignatureDb::save`].
//!
//! The set views are updated by [`SignatureDb::add_element`], so match
//! queries always see every element added so far, saved or not.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A sub-signature matches when [`match_ratio`] reaches this value.
pub const MATCH_THRESHOLD_PERCENT: f64 = 20.0;

/// Percentage used by the fuzzy match.
///
/// The denominator is half the sub-signature size, so a ratio of 20 means
/// the candidate covers 10% of the sub-signature. An empty sub-signature
/// scores 0.
///
/// # Examples
///
/// ```
/// use compsim::signature_db::match_ratio;
///
/// assert_eq!(match_ratio(2, 10), 40.0);
/// assert_eq!(match_ratio(1, 10), 20.0);
/// assert_eq!(match_ratio(0, 10), 0.0);
/// ```
pub fn match_ratio(intersection: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    intersection as f64 / (total as f64 / 2.0) * 100.0
}

/// A JSON scalar usable as a signature element.
///
/// Integers that fit `i64` are always `Int`; `UInt` only holds values above
/// `i64::MAX`, so one number never has two representations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureElement {
    Int(i64),
    UInt(u64),
    Float(Float),
    Bool(bool),
    Text(String),
}

/// `f64` compared and hashed by bit pattern so it can live in a set.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Float(pub f64);

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<i64> for SignatureElement {
    fn from(value: i64) -> Self {
        SignatureElement::Int(value)
    }
}

impl From<u64> for SignatureElement {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(small) => SignatureElement::Int(small),
            Err(_) => SignatureElement::UInt(value),
        }
    }
}

impl From<f64> for SignatureElement {
    fn from(value: f64) -> Self {
        SignatureElement::Float(Float(value))
    }
}

impl From<bool> for SignatureElement {
    fn from(value: bool) -> Self {
        SignatureElement::Bool(value)
    }
}

impl From<&str> for SignatureElement {
    fn from(value: &str) -> Self {
        SignatureElement::Text(value.to_string())
    }
}

impl From<String> for SignatureElement {
    fn from(value: String) -> Self {
        SignatureElement::Text(value)
    }
}

impl SignatureElement {
    /// Read a command-line token the way JSON would type it: integers
    /// (signed, then unsigned), `true`/`false`, finite floats, and text
    /// for everything else.
    pub fn parse(raw: &str) -> Self {
        if let Ok(value) = raw.parse::<i64>() {
            return SignatureElement::Int(value);
        }
        if let Ok(value) = raw.parse::<u64>() {
            return SignatureElement::UInt(value);
        }
        match raw {
            "true" => return SignatureElement::Bool(true),
            "false" => return SignatureElement::Bool(false),
            _ => {}
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => SignatureElement::Float(Float(value)),
            _ => SignatureElement::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for SignatureElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureElement::Int(value) => write!(f, "{value}"),
            SignatureElement::UInt(value) => write!(f, "{value}"),
            SignatureElement::Float(Float(value)) => write!(f, "{value:?}"),
            SignatureElement::Bool(value) => write!(f, "{value}"),
            SignatureElement::Text(value) => f.write_str(value),
        }
    }
}

/// Result of matching a candidate set against one sub-signature.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubSignatureMatch<E> {
    /// Shared elements, in the sub-signature's stored order
    pub intersection: Vec<E>,
    /// Distinct elements in the sub-signature
    pub total: usize,
    /// Top-level name owning the sub-signature
    pub name: String,
    pub ratio: f64,
    pub is_match: bool,
}

type Entries<E> = BTreeMap<String, BTreeMap<String, Vec<E>>>;
type Views<E> = BTreeMap<String, BTreeMap<String, HashSet<E>>>;

/// Persistent `name -> sub_name -> elements` store.
#[derive(Debug)]
pub struct SignatureDb<E = SignatureElement> {
    path: PathBuf,
    entries: Entries<E>,
    views: Views<E>,
}

impl<E> SignatureDb<E>
where
    E: Clone + Eq + Hash + Serialize + DeserializeOwned,
{
    /// Load the database at `path`. A missing file yields an empty database
    /// bound to that path; any other read or parse failure is returned.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries: Entries<E> = match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no signature database yet, starting empty");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };

        let mut db = SignatureDb {
            path,
            entries: BTreeMap::new(),
            views: BTreeMap::new(),
        };
        // Re-insert through add_element so hand-edited files with repeated
        // elements still satisfy the no-duplicate rule. Names and sub-names
        // are created first so empty ones survive a later save.
        for (name, subs) in entries {
            db.entries.entry(name.clone()).or_default();
            db.views.entry(name.clone()).or_default();
            for (sub_name, elements) in subs {
                db.entries
                    .entry(name.clone())
                    .or_default()
                    .entry(sub_name.clone())
                    .or_default();
                db.views
                    .entry(name.clone())
                    .or_default()
                    .entry(sub_name.clone())
                    .or_default();
                for element in elements {
                    db.add_element(&name, &sub_name, element);
                }
            }
        }

        info!(
            path = %db.path.display(),
            names = db.entries.len(),
            sub_signatures = db.len(),
            "loaded signature database"
        );
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `element` to `(name, sub_name)` unless it is already there.
    /// Returns whether it was added.
    pub fn add_element(&mut self, name: &str, sub_name: &str, element: E) -> bool {
        let view = self
            .views
            .entry(name.to_string())
            .or_default()
            .entry(sub_name.to_string())
            .or_default();
        if view.contains(&element) {
            return false;
        }
        view.insert(element.clone());

        self.entries
            .entry(name.to_string())
            .or_default()
            .entry(sub_name.to_string())
            .or_default()
            .push(element);
        true
    }

    /// First name (in sorted order) with a sub-signature containing
    /// `element`.
    pub fn is_present(&self, element: &E) -> Option<&str> {
        self.views
            .iter()
            .find(|(_, subs)| subs.values().any(|set| set.contains(element)))
            .map(|(name, _)| name.as_str())
    }

    /// Fuzzy-match `candidates` against every sub-signature.
    ///
    /// The result is keyed by sub-name alone. Names are visited in sorted
    /// order, so when two names share a sub-name the later name's entry is
    /// the one reported.
    pub fn match_elements(&self, candidates: &HashSet<E>) -> BTreeMap<String, SubSignatureMatch<E>> {
        let mut matches = BTreeMap::new();

        for (name, subs) in &self.entries {
            for (sub_name, elements) in subs {
                let intersection: Vec<E> = elements
                    .iter()
                    .filter(|e| candidates.contains(e))
                    .cloned()
                    .collect();
                let total = elements.len();
                let ratio = match_ratio(intersection.len(), total);

                matches.insert(
                    sub_name.clone(),
                    SubSignatureMatch {
                        intersection,
                        total,
                        name: name.clone(),
                        ratio,
                        is_match: ratio >= MATCH_THRESHOLD_PERCENT,
                    },
                );
            }
        }

        matches
    }

    /// Elements stored at `(name, sub_name)`, in insertion order.
    pub fn sub_signature(&self, name: &str, sub_name: &str) -> Option<&[E]> {
        self.entries.get(name)?.get(sub_name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, sub_name, element count)` for every sub-signature.
    pub fn summary(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.entries.iter().flat_map(|(name, subs)| {
            subs.iter()
                .map(move |(sub_name, elements)| (name.as_str(), sub_name.as_str(), elements.len()))
        })
    }

    /// Number of sub-signatures across all names.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the backing file with the full contents.
    pub fn save(&self) -> io::Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.entries)?;
        writer.flush()?;
        info!(path = %self.path.display(), sub_signatures = self.len(), "saved signature database");
        Ok(())
    }
}
