//! Filename derivation, sanitization, and unique path resolution for PDFs.
//!
//! Names come from, in order of preference: caller metadata
//! (`NNN-Surname-Title_Words.pdf`), the server's Content-Disposition header,
//! or the sanitized DOI.

use std::path::{Component, Path, PathBuf};

/// Longest author fragment.
const MAX_AUTHOR_LEN: usize = 20;
/// Longest title fragment.
const MAX_TITLE_LEN: usize = 60;
/// Longest name before the `.pdf` suffix.
const MAX_TOTAL_LEN: usize = 150;
/// Longest sanitized DOI.
const MAX_DOI_LEN: usize = 200;
/// DOI fragment used when neither author nor title is usable.
const DOI_FALLBACK_LEN: usize = 30;
/// Significant title words kept.
const MAX_TITLE_WORDS: usize = 4;

const TITLE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "el", "la", "los", "las", "un", "una", "unos", "unas",
];

const WORD_EDGE_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '¿', '¡', '-', '–', '—', '(', ')', '[', ']', '{', '}', '"', '\'',
];

/// Filesystem-safe encoding of a DOI, also used to key diagnostics artifacts.
///
/// Strips resolver prefixes, replaces `< > : " / \ | ? *` and spaces with
/// `_`, and caps the length at 200 characters. Empty input gives `unknown`.
#[must_use]
pub fn sanitize_doi_for_filename(doi: &str) -> String {
    let cleaned = doi
        .trim()
        .replace("https://doi.org/", "")
        .replace("http://doi.org/", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return "unknown".to_string();
    }
    cleaned
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            c => c,
        })
        .take(MAX_DOI_LEN)
        .collect()
}

/// Cleans free text (title fragment, surname) for use inside a filename.
///
/// Quotes and brackets are dropped, other illegal characters become spaces,
/// whitespace collapses to `_`, dots are removed, and the result is capped at
/// `max_len` characters without a trailing `_`.
#[must_use]
pub fn sanitize_text(text: &str, max_len: usize) -> String {
    let spaced: String = text
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}'))
        .map(|c| match c {
            '<' | '>' | ':' | '/' | '\\' | '|' | '?' | '*' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let truncated: String = joined.chars().filter(|c| *c != '.').take(max_len).collect();
    truncated.trim_end_matches('_').to_string()
}

/// Builds `NNN-Surname-Word_Word_Word_Word.pdf`.
///
/// The index is always present and zero-padded to three digits. When
/// neither author nor title yields anything usable the first 30 characters
/// of the sanitized DOI stand in.
#[must_use]
pub fn descriptive_filename(index: usize, title: &str, author: &str, doi: &str) -> String {
    let mut parts = vec![format!("{index:03}")];

    if let Some(surname) = surname_of(author) {
        let cleaned = sanitize_text(&surname, MAX_AUTHOR_LEN);
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }

    if is_meaningful(title) {
        let words: Vec<&str> = title
            .split_whitespace()
            .map(|word| word.trim_matches(WORD_EDGE_PUNCTUATION))
            .filter(|word| word.chars().count() > 2)
            .filter(|word| !TITLE_STOP_WORDS.contains(&word.to_lowercase().as_str()))
            .take(MAX_TITLE_WORDS)
            .collect();
        if !words.is_empty() {
            let cleaned = sanitize_text(&words.join("_"), MAX_TITLE_LEN);
            if !cleaned.is_empty() {
                parts.push(cleaned);
            }
        }
    }

    if parts.len() == 1 {
        parts.push(
            sanitize_doi_for_filename(doi)
                .chars()
                .take(DOI_FALLBACK_LEN)
                .collect(),
        );
    }

    let name: String = parts.join("-").chars().take(MAX_TOTAL_LEN).collect();
    force_pdf_extension(name)
}

/// Surname of the first listed author.
///
/// `"Pérez, Ana; Gómez, Luis"` gives `Pérez`; `"Ana Pérez"` gives `Pérez`.
pub(crate) fn surname_of(author: &str) -> Option<String> {
    if !is_meaningful(author) {
        return None;
    }
    let first = author.split(';').next().unwrap_or_default().trim();
    let first = first.split(',').next().unwrap_or_default().trim();
    first.split_whitespace().last().map(str::to_string)
}

/// Rejects blank values and spreadsheet-style null markers.
fn is_meaningful(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !matches!(trimmed.to_lowercase().as_str(), "nan" | "none")
}

/// Appends `.pdf` unless the name already ends with it (any case).
#[must_use]
pub fn force_pdf_extension(name: String) -> String {
    if name.to_lowercase().ends_with(".pdf") {
        name
    } else {
        format!("{name}.pdf")
    }
}

/// Extracts the filename from a Content-Disposition header value.
///
/// Prefers RFC 5987 `filename*=charset''encoded` over plain `filename=`.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();

    if let Some(pos) = lower.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = lower.find("filename=")?;
    let value = header[pos + 9..].trim();
    let name = if let Some(stripped) = value.strip_prefix('"') {
        stripped.split('"').next().unwrap_or_default()
    } else {
        value.split(';').next().unwrap_or_default().trim()
    };
    (!name.is_empty()).then(|| name.to_string())
}

/// Makes a server-supplied name safe and forces the `.pdf` extension.
#[must_use]
pub fn sanitize_server_filename(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let safe = if replaced.trim_matches(['_', '.']).is_empty() || !is_safe_segment(&replaced) {
        "download".to_string()
    } else {
        replaced
    };
    force_pdf_extension(safe)
}

fn is_safe_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Returns `dir/filename`, or `stem_2.ext`, `stem_3.ext`, ... when taken.
#[must_use]
pub fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let base_path = dir.join(filename);
    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };

    for i in 2..10_000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}
