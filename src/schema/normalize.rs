use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Separator every run of whitespace, `-`, `/` or `_` collapses into.
pub const SEPARATOR: char = '_';

/// Canonical form of a spreadsheet header:
/// upper-cased, diacritics stripped, `.` dropped and separator runs collapsed.
///
/// `"Data de Notificação"` → `"DATA_DE_NOTIFICACAO"`, `"POP. TRAB."` → `"POP_TRAB"`.
/// Applying it twice is the same as applying it once.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in fold(raw.trim()) {
        if c == '.' {
            continue;
        }
        if c.is_whitespace() || c == '-' || c == '/' || c == SEPARATOR {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push(SEPARATOR);
        }
        pending_sep = false;
        out.push(c);
    }

    out
}

/// Canonical form of a free-text cell used for accent/case-insensitive
/// comparisons: upper-cased, diacritics stripped, whitespace collapsed to one
/// space. `"  Óbito  por acidente"` → `"OBITO POR ACIDENTE"`.
pub fn normalize_text(raw: &str) -> String {
    let folded: String = fold(raw).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decompose, drop combining marks and upper-case. Decomposition runs again
/// after upper-casing because compatibility forms such as `ª` or `㎡` only
/// become letters once decomposed.
fn fold(raw: &str) -> impl Iterator<Item = char> + '_ {
    raw.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
}
