use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length (in characters) of a statement shape key.
pub const MAX_SHAPE_LEN: usize = 200;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\?|%\([^)]+\)s|:\w+").expect("placeholder regex"));
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").expect("integer regex"));
static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'").expect("string regex"));
static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*""#).expect("string regex"));

/// Upper bound on reduction passes; real statements settle in two or three.
const MAX_PASSES: usize = 16;

/// Reduce a raw SQL statement to its shape key.
///
/// Statements that only differ in bound values, literals or layout map to the
/// same key. The key is capped at [`MAX_SHAPE_LEN`] characters, so statements
/// that differ only past the cap share a key.
pub fn normalize_sql(sql: &str) -> String {
    let mut key = WHITESPACE.replace_all(sql.trim(), " ").into_owned();

    // Replacing one literal can expose another match (a `)` inside quotes
    // hides a `%(name)s` placeholder, a cut can turn `12a` into `12`), so
    // reduce and cut until the key stops changing.
    for _ in 0..MAX_PASSES {
        let reduced = reduce(&key);
        let next = truncate_chars(&reduced, MAX_SHAPE_LEN).trim_end();
        if next == key {
            break;
        }
        key = next.to_string();
    }
    key
}

fn reduce(s: &str) -> String {
    let s = PLACEHOLDER.replace_all(s, "?");
    let s = INTEGER.replace_all(&s, "?");
    let s = SINGLE_QUOTED.replace_all(&s, "'?'");
    DOUBLE_QUOTED.replace_all(&s, "\"?\"").into_owned()
}

/// Prefix of `s` holding at most `max` characters.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            normalize_sql("  SELECT *\n\tFROM   users\r\n WHERE active "),
            "SELECT * FROM users WHERE active"
        );
    }

    #[test]
    fn integer_literals_collide() {
        let a = normalize_sql("SELECT * FROM t WHERE id = 5");
        let b = normalize_sql("SELECT * FROM t WHERE id = 42");
        assert_eq!(a, b);
        assert_eq!(a, "SELECT * FROM t WHERE id = ?");
    }

    #[test]
    fn string_literals_collide() {
        let a = normalize_sql("SELECT * FROM t WHERE name = 'alice'");
        let b = normalize_sql("SELECT * FROM t WHERE name = 'bob'");
        assert_eq!(a, b);
        assert_eq!(a, "SELECT * FROM t WHERE name = '?'");
        assert_eq!(
            normalize_sql(r#"SELECT "users"."id" FROM users"#),
            r#"SELECT "?"."?" FROM users"#
        );
    }

    #[test]
    fn placeholders_become_question_marks() {
        assert_eq!(
            normalize_sql("UPDATE t SET a = %(a)s, b = :b WHERE id = ?"),
            "UPDATE t SET a = ?, b = ? WHERE id = ?"
        );
    }

    #[test]
    fn digits_inside_identifiers_survive() {
        assert_eq!(normalize_sql("SELECT col1 FROM t2"), "SELECT col1 FROM t2");
    }

    #[test]
    fn empty_statement_has_empty_shape() {
        assert_eq!(normalize_sql(""), "");
        assert_eq!(normalize_sql(" \n\t "), "");
    }

    #[test]
    fn shape_is_capped() {
        let long = format!("SELECT {} FROM t", "x, ".repeat(200));
        let shape = normalize_sql(&long);
        assert!(shape.chars().count() <= MAX_SHAPE_LEN);

        // beyond the cap statements collide
        let a = format!("{long} WHERE a = b");
        let b = format!("{long} WHERE c = d");
        assert_eq!(normalize_sql(&a), normalize_sql(&b));
    }

    #[test]
    fn cap_counts_characters_not_bytes() {
        let sql = "é".repeat(300);
        let shape = normalize_sql(&sql);
        assert_eq!(shape.chars().count(), MAX_SHAPE_LEN);
    }

    #[test]
    fn literal_hiding_a_placeholder_settles_in_one_call() {
        let once = normalize_sql("SELECT * FROM t WHERE a = %('x)')s");
        assert_eq!(once, "SELECT * FROM t WHERE a = ?");
        assert_eq!(normalize_sql(&once), once);
    }

    #[test]
    fn cut_inside_a_token_is_reduced_again() {
        // the cap falls between `12` and `a`, leaving a bare integer
        let sql = format!("SELECT {} 12a", "x".repeat(190));
        let once = normalize_sql(&sql);
        assert!(once.ends_with(" ?"), "{once}");
        assert_eq!(normalize_sql(&once), once);
    }

    /// Deterministic statements built from the characters that interact
    /// across replacement steps: quotes, `%(`, `)`, `:` and digits.
    fn generated_statements(count: usize) -> Vec<String> {
        const PIECES: [&str; 22] = [
            "'", "\"", "%(", ")s", ")", ":", ":a", "?", "1", "42", "x", "id", " ", "  ", "\n",
            "SELECT ", " FROM t", " WHERE ", "=", ",", "é", "''",
        ];
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        (0..count)
            .map(|_| {
                let len = (next() % 120) as usize;
                (0..len).map(|_| PIECES[(next() % PIECES.len() as u64) as usize]).collect()
            })
            .collect()
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in generated_statements(20_000) {
            let once = normalize_sql(&s);
            assert_eq!(normalize_sql(&once), once, "input: {s:?}");
            assert!(once.chars().count() <= MAX_SHAPE_LEN);
        }
    }
}
