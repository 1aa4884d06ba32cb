//! Language keys: normalization of upstream labels, filename mapping, and
//! display names.

use std::sync::OnceLock;

use regex::Regex;

const FILE_PREFIX: &str = "dubbed_";

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*?\)").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Normalize an upstream language label into a lowercase language key.
///
/// Portuguese variants fold into `portuguese` and Mandarin into `chinese` so
/// catalogs that label them differently corroborate each other.
/// Parenthetical qualifiers are dropped. Returns an empty string for blank
/// input.
pub fn normalize(label: &str) -> String {
    let s = label.trim().to_lowercase();
    if s.is_empty() {
        return s;
    }
    if s.starts_with("portuguese") {
        return "portuguese".into();
    }
    if s.starts_with("mandarin") {
        return "chinese".into();
    }

    // Filenames carry underscores in place of spaces; fold them back first.
    let s = s.replace('_', " ");
    let s = parenthetical_re().replace_all(&s, "");
    whitespace_re().replace_all(s.trim(), " ").into_owned()
}

/// Whether a language key can be used as a file name component: non-empty,
/// lowercase ASCII letters, digits, space, `_` and `-` only.
pub fn is_safe_key(language: &str) -> bool {
    !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ' ' | '_' | '-'))
}

/// Filename-friendly token for a language key.
pub fn file_token(language: &str) -> String {
    language.replace(' ', "_")
}

/// `dubbed_<token>.json` for a language key.
pub fn file_name(language: &str) -> String {
    format!("{FILE_PREFIX}{}.json", file_token(language))
}

/// Language key from a `dubbed_<token>.json` filename. Files without the
/// prefix use their whole stem.
pub fn from_file_name(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let stem = stem.strip_prefix(FILE_PREFIX).unwrap_or(stem);
    normalize(stem)
}

/// `"very high"` → `"Very High"`.
pub fn english_name(language: &str) -> String {
    language
        .split([' ', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Native name of a language, falling back to its English name.
pub fn native_name(language: &str) -> String {
    let native = match language {
        "arabic" => "العربية",
        "catalan" => "Català",
        "chinese" => "中文",
        "danish" => "Dansk",
        "dutch" => "Nederlands",
        "english" => "English",
        "filipino" => "Filipino",
        "finnish" => "Suomi",
        "french" => "Français",
        "german" => "Deutsch",
        "hebrew" => "עברית",
        "hindi" => "हिन्दी",
        "hungarian" => "Magyar",
        "indonesian" => "Bahasa Indonesia",
        "italian" => "Italiano",
        "japanese" => "日本語",
        "korean" => "한국어",
        "norwegian" => "Norsk",
        "polish" => "Polski",
        "portuguese" => "Português",
        "russian" => "Русский",
        "spanish" => "Español",
        "swedish" => "Svenska",
        "tagalog" => "Tagalog",
        "thai" => "ไทย",
        "turkish" => "Türkçe",
        "vietnamese" => "Tiếng Việt",
        _ => return english_name(language),
    };
    native.to_string()
}
