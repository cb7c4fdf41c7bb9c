//! Fiscal year recovery from entity identifiers
//!
//! Some accounting payloads omit `FiscalYear` as a field but embed it in the
//! entity identifier, e.g.
//! `.../A_OperationalAcctgDocItemCube(CompanyCode='1000',AccountingDocument='A1',FiscalYear='2024')`.
//!
//! Grammar accepted here:
//!
//! ```text
//! identifier := prefix '(' predicate (',' predicate)* ')' ws*
//! predicate  := ws* key ws* '=' ws* value ws*
//! key        := [A-Za-z0-9_]+
//! value      := "'" (char | "''")* "'" | '"' char* '"' | bare
//! bare       := [^,)]+
//! ```
//!
//! The first `(` opens the predicate list and its matching `)` must end the
//! identifier.
//!
//! Identifiers that do not follow the grammar (opaque keys, trailing text) are
//! scanned for a delimited `FiscalYear=` segment instead; the strict error is
//! returned only when that scan finds nothing either.

use thiserror::Error;

const FISCAL_YEAR_KEY: &str = "FiscalYear";

/// Why no fiscal year could be recovered
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FiscalYearError {
    /// Identifier parsed but has no `FiscalYear` predicate
    #[error("identifier has no FiscalYear predicate")]
    Absent,

    /// Identifier does not follow the predicate grammar
    #[error("malformed identifier: {0}")]
    Malformed(String),
}

/// Parse the key predicates of an entity identifier, in order
pub fn parse_key_predicates(identifier: &str) -> Result<Vec<(String, String)>, FiscalYearError> {
    let open = identifier
        .find('(')
        .ok_or_else(|| FiscalYearError::Malformed("no predicate list".to_string()))?;

    let mut chars = identifier[open + 1..].chars().peekable();
    let mut predicates = Vec::new();

    loop {
        skip_whitespace(&mut chars);

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                key.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if key.is_empty() {
            return Err(FiscalYearError::Malformed("expected predicate key".to_string()));
        }

        skip_whitespace(&mut chars);
        if chars.next() != Some('=') {
            return Err(FiscalYearError::Malformed(format!("expected '=' after '{}'", key)));
        }
        skip_whitespace(&mut chars);

        let value = match chars.peek() {
            Some(&quote) if quote == '\'' || quote == '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => {
                            // '' inside a single-quoted value is an escaped quote
                            if quote == '\'' && chars.peek() == Some(&'\'') {
                                chars.next();
                                value.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(c) => value.push(c),
                        None => {
                            return Err(FiscalYearError::Malformed(format!(
                                "unterminated value for '{}'",
                                key
                            )))
                        }
                    }
                }
                value
            }
            _ => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' || c == ')' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                let value = value.trim().to_string();
                if value.is_empty() {
                    return Err(FiscalYearError::Malformed(format!("empty value for '{}'", key)));
                }
                value
            }
        };
        predicates.push((key, value));

        skip_whitespace(&mut chars);
        match chars.next() {
            Some(',') => continue,
            Some(')') => break,
            Some(c) => {
                return Err(FiscalYearError::Malformed(format!("unexpected '{}'", c)));
            }
            None => return Err(FiscalYearError::Malformed("unclosed predicate list".to_string())),
        }
    }

    if chars.any(|c| !c.is_whitespace()) {
        return Err(FiscalYearError::Malformed(
            "trailing text after predicate list".to_string(),
        ));
    }

    Ok(predicates)
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Recover a four-digit fiscal year from an entity identifier
pub fn fiscal_year_from_identifier(identifier: &str) -> Result<String, FiscalYearError> {
    let predicates = match parse_key_predicates(identifier) {
        Ok(predicates) => predicates,
        Err(strict) => return scan_fiscal_year(identifier).ok_or(strict),
    };
    let (_, value) = predicates
        .into_iter()
        .find(|(key, _)| key == FISCAL_YEAR_KEY)
        .ok_or(FiscalYearError::Absent)?;

    if is_four_digits(&value) {
        Ok(value)
    } else {
        Err(FiscalYearError::Malformed(format!("fiscal year '{}' is not four digits", value)))
    }
}

fn is_four_digits(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// First `FiscalYear = 'dddd'` (or `"dddd"`, or bare `dddd`) segment anywhere in `text`
///
/// The key must stand alone and a quoted year must close with its own quote.
fn scan_fiscal_year(text: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(FISCAL_YEAR_KEY) {
        let start = search_from + found;
        let end = start + FISCAL_YEAR_KEY.len();
        search_from = end;

        if text[..start].chars().next_back().is_some_and(is_key_char) {
            continue;
        }
        let rest = text[end..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();

        let (quote, digits) = match rest.chars().next() {
            Some(q @ ('\'' | '"')) => (Some(q), &rest[1..]),
            _ => (None, rest),
        };
        let Some(year) = digits.get(..4).filter(|y| is_four_digits(y)) else {
            continue;
        };
        let after = digits[4..].chars().next();
        let delimited = match quote {
            Some(q) => after == Some(q),
            None => !after.is_some_and(is_key_char),
        };
        if delimited {
            return Some(year.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_metadata_uri() {
        let uri = "https://erp.example.com/sap/opu/odata/sap/API_OPLACCTGDOCITEMCUBE_SRV/\
                   A_OperationalAcctgDocItemCube(CompanyCode='1000',AccountingDocument='A1',\
                   FiscalYear='2024',AccountingDocumentItem='001')";
        assert_eq!(fiscal_year_from_identifier(uri).unwrap(), "2024");
    }

    #[test]
    fn test_double_quotes_and_whitespace() {
        let id = r#"Cube( CompanyCode = "1000" , FiscalYear = "2023" )"#;
        assert_eq!(fiscal_year_from_identifier(id).unwrap(), "2023");
    }

    #[test]
    fn test_bare_values() {
        let predicates = parse_key_predicates("Cube(Item=1,FiscalYear=2022)").unwrap();
        assert_eq!(predicates[0], ("Item".to_string(), "1".to_string()));
        assert_eq!(fiscal_year_from_identifier("Cube(Item=1,FiscalYear=2022)").unwrap(), "2022");
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let predicates = parse_key_predicates("Cube(Name='O''Brien')").unwrap();
        assert_eq!(predicates[0].1, "O'Brien");
    }

    #[test]
    fn test_absent_key() {
        assert_eq!(
            fiscal_year_from_identifier("Cube(CompanyCode='1000')"),
            Err(FiscalYearError::Absent)
        );
    }

    #[test]
    fn test_strict_grammar_rejects_unbalanced_and_trailing_text() {
        for case in ["Cube(FiscalYear='2024'", "Cube(FiscalYear='2024') extra"] {
            assert!(
                matches!(parse_key_predicates(case), Err(FiscalYearError::Malformed(_))),
                "expected strict failure for {}",
                case
            );
        }
    }

    #[test]
    fn test_delimited_segment_recovered_from_non_grammar_identifiers() {
        let cases = [
            (r#"Cube('AcctDoc|FiscalYear="2024"|Item=1')"#, "2024"),
            ("Cube(FiscalYear='2024'", "2024"),
            ("Cube(FiscalYear='2024') extra", "2024"),
            ("urn:doc;CompanyCode=1000;FiscalYear=2021;", "2021"),
        ];
        for (case, year) in cases {
            assert_eq!(fiscal_year_from_identifier(case).unwrap(), year, "for {}", case);
        }
    }

    #[test]
    fn test_scan_requires_standalone_key_and_delimited_year() {
        assert_eq!(scan_fiscal_year("PrevFiscalYear='2020'"), None);
        assert_eq!(scan_fiscal_year("FiscalYear=20245"), None);
        assert_eq!(scan_fiscal_year("FiscalYear='2024\""), None);
        assert_eq!(
            scan_fiscal_year("PrevFiscalYear='2020' FiscalYear='2021'").as_deref(),
            Some("2021")
        );
    }

    #[test]
    fn test_malformed_identifiers() {
        let cases = [
            "Cube",
            "Cube(FiscalYear='2024)",
            "Cube(='2024')",
            "Cube(FiscalYear='24')",
            "Cube(Year='2024') extra",
        ];
        for case in cases {
            assert!(
                matches!(fiscal_year_from_identifier(case), Err(FiscalYearError::Malformed(_))),
                "expected malformed for {}",
                case
            );
        }
    }
}
