//! Ordered extraction rules for appointment confirmations.
//!
//! Each table is evaluated top to bottom and the first rule whose
//! pattern matches wins. Adding a new message format means adding a
//! row (and a test for it), not reworking the others.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::temporal::WEEKDAY_PATTERN;

const HONORIFIC: &str =
    r"Gentil[ei]ssim[oa]|Gentile|Gent\.m[oa]|Egregi[oa]|Dott\.(?:ssa)?|Dottor(?:essa)?|Sig\.(?:ra)?|Signor[ae]?";
const GREETING: &str = r"Buongiorno|Buon\s+giorno|Buonasera|Buona\s+sera|Salve|Ciao";
const NAME: &str = r"(\p{Lu}[\p{L}'’]*(?:\s+\p{Lu}[\p{L}'’]*){0,3})";
const TIME: &str = r"(\d{1,2}(?::\d{2})?)";
/// One character of an address, or a house number abbreviation whose
/// dot doesn't end the address.
const ADDRESS_CHAR: &str = r"(?:\b(?i:n|nr|civ)\.\s*|.)";
const ADDRESS_END: &str = r"\s*(?:\.(?:\s|$)|\n|\s+(?:Per|La|Attendo)\b|$)";
const STREET: &str =
    r"via|viale|v\.le|piazza|piazzale|p\.zza|corso|c\.so|largo|vicolo|strada|località|loc\.";

/// Fragments handed to the temporal resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeFragments {
    pub date: String,
    pub time: String,
}

pub struct Rule<T> {
    pub name: &'static str,
    pattern: Regex,
    extract: fn(&Captures<'_>) -> Option<T>,
}

impl<T> Rule<T> {
    fn new(name: &'static str, template: &str, extract: fn(&Captures<'_>) -> Option<T>) -> Self {
        let pattern = Regex::new(&expand(template))
            .unwrap_or_else(|e| panic!("Invalid pattern for rule {}: {}", name, e));
        Self {
            name,
            pattern,
            extract,
        }
    }

    pub fn apply(&self, text: &str) -> Option<T> {
        self.pattern
            .captures_iter(text)
            .find_map(|caps| (self.extract)(&caps))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Substitute the shared sub-patterns into a rule template.
fn expand(template: &str) -> String {
    template
        .replace("<HONORIFIC>", HONORIFIC)
        .replace("<ADDRESS_CHAR>", ADDRESS_CHAR)
        .replace("<GREETING>", GREETING)
        .replace("<NAME>", NAME)
        .replace("<WEEKDAY>", WEEKDAY_PATTERN)
        .replace("<TIME>", TIME)
        .replace("<END>", ADDRESS_END)
        .replace("<STREET>", STREET)
}

/// Value produced by the first rule that extracts one.
pub fn first_match<T>(rules: &[Rule<T>], text: &str) -> Option<(&'static str, T)> {
    rules
        .iter()
        .find_map(|rule| rule.apply(text).map(|value| (rule.name, value)))
}

fn trimmed(caps: &Captures<'_>, group: usize) -> Option<String> {
    let value = caps
        .get(group)?
        .as_str()
        .trim()
        .trim_end_matches([',', ';', ':'])
        .trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn name_group(caps: &Captures<'_>) -> Option<String> {
    trimmed(caps, 1)
}

/// Courtesy pronouns are capitalized in formal Italian ("grazie a
/// Lei") and would otherwise read as place names.
const PRONOUNS: &[&str] = &["Lei", "Lui", "Loro", "Voi", "Noi", "Te", "Ella"];

fn place_group(caps: &Captures<'_>) -> Option<String> {
    let place = trimmed(caps, 1)?;
    let first_word = place.split_whitespace().next()?.trim_end_matches([',', ';', ':']);
    if PRONOUNS.contains(&first_word) {
        None
    } else {
        Some(place)
    }
}

fn weekday_and_date(caps: &Captures<'_>) -> Option<DateTimeFragments> {
    Some(DateTimeFragments {
        date: format!("{} {}", caps.get(1)?.as_str(), caps.get(2)?.as_str()),
        time: caps.get(3)?.as_str().to_string(),
    })
}

fn date_and_time(caps: &Captures<'_>) -> Option<DateTimeFragments> {
    Some(DateTimeFragments {
        date: caps.get(1)?.as_str().to_string(),
        time: caps.get(2)?.as_str().to_string(),
    })
}

pub static NAME_RULES: LazyLock<Vec<Rule<String>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "honorific_name_comma",
            r"\b(?i:<HONORIFIC>)\s+(?:(?i:<HONORIFIC>)\s+)?<NAME>\s*,",
            name_group,
        ),
        Rule::new(
            "greeting_name_comma",
            r"\b(?i:<GREETING>)\s+(?:(?i:<HONORIFIC>)\s+)?<NAME>\s*,",
            name_group,
        ),
        Rule::new(
            "greeting_single_word",
            r"\b(?i:<GREETING>)\s+(\p{Lu}[\p{L}'’]*)",
            name_group,
        ),
    ]
});

pub static SALUTATION_RULE: LazyLock<Rule<String>> = LazyLock::new(|| {
    Rule::new("salutation", r"\b((?i:<HONORIFIC>|Car[oa]))(?:\s|,|$)", |caps| {
        trimmed(caps, 1).map(|s| capitalize(&s))
    })
});

pub static DATE_TIME_RULES: LazyLock<Vec<Rule<DateTimeFragments>>> = LazyLock::new(|| {
    vec![
        // Anchored on "appuntamento di"
        Rule::new(
            "weekday_date_alle_ore",
            r"(?i)appuntamento\s+di\s+(<WEEKDAY>)\s+(\d{1,2}/\d{1,2})\s*,?\s+alle\s+ore\s+<TIME>",
            weekday_and_date,
        ),
        Rule::new(
            "weekday_date_ore",
            r"(?i)appuntamento\s+di\s+(<WEEKDAY>)\s+(\d{1,2}/\d{1,2})\s*,?\s+ore\s+<TIME>",
            weekday_and_date,
        ),
        Rule::new(
            "weekday_date_hour",
            r"(?i)appuntamento\s+di\s+(<WEEKDAY>)\s+(\d{1,2}/\d{1,2})\s*,?\s+(?:alle\s+)?<TIME>\b",
            weekday_and_date,
        ),
        Rule::new(
            "iso_date_ore",
            r"(?i)appuntamento\s+di\s+(?:<WEEKDAY>\s+)?(\d{4}-\d{2}-\d{2})\s*,?\s+(?:alle\s+)?ore\s+<TIME>",
            date_and_time,
        ),
        Rule::new(
            "full_date_ore",
            r"(?i)appuntamento\s+di\s+(?:<WEEKDAY>\s+)?(\d{1,2}/\d{1,2}/\d{4})\s*,?\s+(?:alle\s+)?ore\s+<TIME>",
            date_and_time,
        ),
        // Confirmation phrasing
        Rule::new(
            "confermo_relative_day",
            r"(?is)\bconferm[oa]\b.*?\b(oggi|domani)\b.*?\balle\s+(?:ore\s+)?<TIME>",
            date_and_time,
        ),
        Rule::new(
            "va_bene_relative_day",
            r"(?is)\bva\s+bene\b.*?\b(oggi|domani)\b.*?\balle\s+(?:ore\s+)?<TIME>",
            date_and_time,
        ),
        Rule::new(
            "ci_vediamo_relative_day",
            r"(?is)\bci\s+vediamo\b.*?\b(oggi|domani)\b.*?\balle\s+(?:ore\s+)?<TIME>",
            date_and_time,
        ),
        Rule::new(
            "confirmation_weekday_date",
            r"(?is)\b(?:conferm[oa]|va\s+bene|ci\s+vediamo|perfetto)\b.*?\b(<WEEKDAY>)\s+(\d{1,2}/\d{1,2})\b.*?\balle\s+(?:ore\s+)?<TIME>",
            weekday_and_date,
        ),
        Rule::new(
            "confirmation_weekday",
            r"(?is)\b(?:conferm[oa]|va\s+bene|ci\s+vediamo|perfetto)\b.*?\b(<WEEKDAY>)\b.*?\balle\s+(?:ore\s+)?<TIME>",
            date_and_time,
        ),
    ]
});

pub static ADDRESS_RULES: LazyLock<Vec<Rule<String>>> = LazyLock::new(|| {
    vec![
        Rule::new("presso", r"\b(?i:presso)\s+(<ADDRESS_CHAR>+?)<END>", name_group),
        Rule::new(
            "in_street",
            r"\b(?i:in)\s+((?i:<STREET>)\s+<ADDRESS_CHAR>+?)<END>",
            name_group,
        ),
        Rule::new(
            "in_place",
            r"\b(?i:in)\s+(\p{Lu}<ADDRESS_CHAR>*?)<END>",
            place_group,
        ),
        Rule::new(
            "a_place",
            r"\ba\s+(\p{Lu}<ADDRESS_CHAR>*?)<END>",
            place_group,
        ),
    ]
});

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
