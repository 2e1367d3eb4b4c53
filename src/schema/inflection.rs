//! Naming helpers for generated files and identifiers

use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use regex::Regex;

const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "fish",
    "information",
    "jeans",
    "money",
    "news",
    "police",
    "rice",
    "series",
    "sheep",
    "species",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("moves", "move"),
    ("people", "person"),
    ("sexes", "sex"),
    ("women", "woman"),
    ("zombies", "zombie"),
];

/// Singular rules, most specific first; the first matching rule wins.
static SINGULAR_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(database)s$", "${1}"),
        (r"(quiz)zes$", "${1}"),
        (r"(matr)ices$", "${1}ix"),
        (r"(vert|ind)ices$", "${1}ex"),
        (r"^(ox)en", "${1}"),
        (r"(alias|status)(es)?$", "${1}"),
        (r"(octop|vir)(us|i)$", "${1}us"),
        (r"^(a)x[ie]s$", "${1}xis"),
        (r"(cris|test)(is|es)$", "${1}is"),
        (r"(shoe)s$", "${1}"),
        (r"(o)es$", "${1}"),
        (r"(bus)(es)?$", "${1}"),
        (r"^(m|l)ice$", "${1}ouse"),
        (r"(x|ch|ss|sh|z)es$", "${1}"),
        (r"(m)ovies$", "${1}ovie"),
        (r"([^aeiouy]|qu)ies$", "${1}y"),
        (r"([lr])ves$", "${1}f"),
        (r"(tive)s$", "${1}"),
        (r"(hive)s$", "${1}"),
        (r"([^f])ves$", "${1}fe"),
        (r"^(analy)(sis|ses)$", "${1}sis"),
        (r"(analy|ba|diagno|parenthe|progno|synop|the)(sis|ses)$", "${1}sis"),
        (r"([ti])a$", "${1}um"),
        (r"(ss)$", "${1}"),
        (r"s$", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("singular rule pattern is valid"),
            replacement,
        )
    })
    .collect()
});

/// Singularize a snake_case table name; only the last word changes.
///
/// ```rust
/// use schemagen::schema::inflection::singularize;
///
/// assert_eq!(singularize("users"), "user");
/// assert_eq!(singularize("user_custom_fields"), "user_custom_field");
/// assert_eq!(singularize("categories"), "category");
/// ```
pub fn singularize(name: &str) -> String {
    let (prefix, word) = match name.rfind('_') {
        Some(i) => name.split_at(i + 1),
        None => ("", name),
    };
    format!("{}{}", prefix, singularize_word(word))
}

fn singularize_word(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }

    if let Some((_, singular)) = IRREGULAR.iter().find(|(plural, _)| *plural == word) {
        return singular.to_string();
    }

    SINGULAR_RULES
        .iter()
        .find(|(rule, _)| rule.is_match(word))
        .map(|(rule, replacement)| rule.replace(word, *replacement).into_owned())
        .unwrap_or_else(|| word.to_string())
}

/// File name of the generated module for a table (`users` -> `user.rs`).
pub fn file_name_for(table_name: &str) -> String {
    format!("{}.rs", singularize(table_name))
}

/// Type name of the generated module for a table (`user_fields` -> `UserField`).
pub fn type_name_for(table_name: &str) -> String {
    singularize(table_name).to_case(Case::Pascal)
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Turn a column name into a usable Rust identifier.
///
/// Keywords become raw identifiers (`type` -> `r#type`); the few keywords that cannot be raw
/// get a trailing underscore (`self` -> `self_`).
pub fn rust_identifier(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{}_", name),
        _ if KEYWORDS.contains(&name) => format!("r#{}", name),
        _ => name.to_string(),
    }
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Whether a column name can name a struct field once passed through [`rust_identifier`].
///
/// Names with a leading digit, spaces, dashes or other punctuation cannot, nor can a lone `_`.
pub fn is_identifier(name: &str) -> bool {
    name != "_" && IDENTIFIER.is_match(name)
}
