use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static NUMERIC_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[_.]").expect("valid numeric prefix regex"));
static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)_(rus|eng|audio|track)$").expect("valid language tag regex")
});
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid parenthesized regex"));
static UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid underscore regex"));
static DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+").expect("valid dot regex"));

/// Derive the base identity used to match a video with its audio.
///
/// `01_Movie_Title_rus.mp4` and `Movie_Title_eng.mp3` both become
/// `movie_title`. Never returns an empty string for a non-empty file name.
pub fn normalize(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let (stem, has_extension) = split_extension(&file_name);

    let mut name = NUMERIC_PREFIX.replace(stem, "").to_string();
    if has_extension {
        name = LANGUAGE_TAG.replace(&name, "").to_string();
    }
    name = PARENTHESIZED.replace_all(&name, "").to_string();
    name = UNDERSCORES.replace_all(&name, "_").to_string();
    name = DOTS.replace_all(&name, ".").to_string();

    let name = name
        .trim_matches(|c: char| c.is_whitespace() || c == '_' || c == '.')
        .to_lowercase();

    if name.is_empty() {
        stem.to_lowercase()
    } else {
        name
    }
}

/// Fuzzy fallback matcher over two normalized names
pub fn similar(a: &str, b: &str) -> bool {
    let a = alphanumeric_only(a);
    let b = alphanumeric_only(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn alphanumeric_only(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split `name.ext` into `("name", true)`; dotfiles keep their leading dot.
fn split_extension(file_name: &str) -> (&str, bool) {
    match file_name.rfind('.') {
        Some(i) if i > 0 => (&file_name[..i], true),
        _ => (file_name, false),
    }
}
