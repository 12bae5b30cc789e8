//! Release note extraction from issue and pull request bodies.
//!
//! Bodies follow the Kubernetes PR template: the note lives in a fenced block
//! tagged `release-note`, and authors opt out by writing `NONE` (or `n/a`)
//! inside that block.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::NoteParseError;

/// A single-line fence holding only an opt-out token, e.g. ` ```NONE``` `.
static INLINE_EXCLUDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^[ \t]*```[ \t]*['"]?(?:none|n/a|na)['"]?[ \t]*```[ \t]*$"#).unwrap()
});

/// Block content that opts out: empty, or a lone optionally quoted token.
static EXCLUDED_CONTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^\s*['"]?(?:none|n/a|na)?['"]?\s*$"#).unwrap());

/// Note block patterns, tried in order. Content runs up to the first closing
/// fence, so a trailing block is never part of the note.
static NOTE_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?si)```release-notes?[ \t]*\n(?P<note>.*?)```").unwrap(),
        Regex::new(r"(?si)```dev-release-notes?[ \t]*\n(?P<note>.*?)```").unwrap(),
        Regex::new(r"(?sm)^[ \t]*```[ \t]*\n(?P<note>.*?)```").unwrap(),
    ]
});

/// Index of the first untagged pattern in [`NOTE_BLOCKS`].
const UNTAGGED_BLOCK: usize = 2;

static ACTION_REQUIRED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\[action required\]\s").unwrap(),
        Regex::new(r"(?i)action required:\s").unwrap(),
    ]
});

static LEADING_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[*-]\s+").unwrap());

/// Release note content of a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseNote {
    /// The author explicitly opted out of a release note
    Excluded,
    /// Trimmed note text
    Text(String),
}

impl ReleaseNote {
    /// Whether the author opted out.
    #[must_use]
    pub const fn is_excluded(&self) -> bool {
        matches!(self, Self::Excluded)
    }
}

/// Extract the release note from an issue or pull request body.
///
/// # Errors
///
/// Returns [`NoteParseError`] when the body has no release note block, or the
/// block is empty once prefixes are stripped.
pub fn extract(body: &str) -> Result<ReleaseNote, NoteParseError> {
    let body = body.replace('\r', "");

    let block = NOTE_BLOCKS.iter().enumerate().find_map(|(i, re)| {
        let content = re.captures(&body)?.name("note")?.as_str();
        Some((i < UNTAGGED_BLOCK, content))
    });

    let raw = match block {
        // An empty untagged fence is more likely the tail of some other block
        Some((tagged, content))
            if EXCLUDED_CONTENT.is_match(content) && (tagged || !content.trim().is_empty()) =>
        {
            return Ok(ReleaseNote::Excluded)
        }
        Some((_, content)) => content,
        None if INLINE_EXCLUDED.is_match(&body) => return Ok(ReleaseNote::Excluded),
        None => return Err(NoteParseError),
    };

    let mut note = raw.to_string();
    for re in ACTION_REQUIRED.iter() {
        note = re.replace_all(&note, "").into_owned();
    }
    let note = LEADING_BULLET.replace(&note, "");
    let note = note.trim();

    if note.is_empty() {
        return Err(NoteParseError);
    }

    Ok(ReleaseNote::Text(note.to_string()))
}
