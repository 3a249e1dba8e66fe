use chrono::NaiveDate;
use log::warn;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Separator used when joining a node path into a lookup key.
pub const PATH_SEPARATOR: &str = " > ";

/// Joins a node path ("Type > Subtype > ...") into the key used by the expand state.
///
/// `\` and `>` inside a label are backslash-escaped so no label can forge a deeper path.
pub fn path_key<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|segment| escape_segment(segment.as_ref()))
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

fn escape_segment(segment: &str) -> String {
    segment.replace('\\', "\\\\").replace('>', "\\>")
}

/// Adds `amount` into `acc`. A sum past the decimal range saturates instead of panicking.
pub fn add_amount(acc: &mut Decimal, amount: Decimal) {
    match acc.checked_add(amount) {
        Some(sum) => *acc = sum,
        None => {
            let saturated = acc.saturating_add(amount);
            warn!("Amount sum overflowed, saturating at {}", saturated);
            *acc = saturated;
        }
    }
}

/// Saturating sum, see [`add_amount`].
pub fn sum_amounts<I: IntoIterator<Item = Decimal>>(amounts: I) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, |mut acc, amount| {
        add_amount(&mut acc, amount);
        acc
    })
}

/// Trims a free-text label and upper-cases it. Returns `None` when nothing is left.
pub fn normalize_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Parses a strict `YYYY-MM-DD` date. Anything else is treated as missing.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

/// Maps accented latin letters onto their base letter, lower-cased.
fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'a',
        'ç' | 'Ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
        'ñ' | 'Ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
        'ý' | 'ÿ' | 'Ý' => 'y',
        other => other.to_lowercase().next().unwrap_or(other),
    }
}

/// Collation key: case and accent insensitive.
pub fn collation_key(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

/// Locale-aware comparison used for bucket and label ordering.
///
/// Letters compare without regard to case or accents first; accents break
/// ties before case does, and the raw text settles anything left so the
/// order is total.
pub fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}
