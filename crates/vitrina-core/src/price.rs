//! Price text normalization.
//!
//! Retail sites render prices as display strings (`"$ 259.900"`,
//! `"USD 1,234.56"`, `"€ 99,99"`). Parsing has to disambiguate `.` and `,`
//! between thousands separator and decimal point, which differs per locale.
//! A parse failure is data, not an error: the amount comes back as `None`
//! with a marker so downstream stages treat the product as having no usable
//! price data.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{3})\b").expect("valid regex"));

/// A price text decomposed into amount and currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPrice {
    /// `None` when no numeric value could be parsed from the text.
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    /// The input text, untouched.
    pub original: String,
    /// Set when parsing failed; `amount` is `None` in that case.
    pub error: Option<String>,
}

/// Parse a display price into an amount and a currency code.
///
/// Currency resolution: `fallback_currency` (the region's configured code)
/// wins when present; otherwise the first standalone three-letter uppercase
/// word in the text is used.
///
/// Separator handling: when both `.` and `,` appear, the later one is the
/// decimal point and the other is stripped. With a single separator kind, a
/// final group of one or two digits marks a decimal point; anything else is
/// a thousands separator (`"249.900"` is two hundred forty-nine thousand
/// nine hundred).
#[must_use]
pub fn normalize_price(text: &str, fallback_currency: Option<&str>) -> NormalizedPrice {
    let original = text.to_string();
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return NormalizedPrice {
            amount: None,
            currency: fallback_currency.map(str::to_string),
            original,
            error: None,
        };
    }

    let parsed_currency = CURRENCY_RE
        .captures(trimmed)
        .map(|caps| caps[1].to_string());
    let currency = fallback_currency.map(str::to_string).or(parsed_currency);

    let number_part: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if number_part.is_empty() || !number_part.chars().any(|c| c.is_ascii_digit()) {
        return NormalizedPrice {
            amount: None,
            currency,
            original,
            error: Some("no numeric value in price text".to_string()),
        };
    }

    let canonical = canonicalize_separators(&number_part);
    match Decimal::from_str(&canonical) {
        Ok(amount) => NormalizedPrice {
            amount: Some(amount),
            currency,
            original,
            error: None,
        },
        Err(e) => NormalizedPrice {
            amount: None,
            currency,
            original,
            error: Some(e.to_string()),
        },
    }
}

/// Rewrite a digits-and-separators string into `Decimal`-parseable form.
fn canonicalize_separators(number_part: &str) -> String {
    let last_dot = number_part.rfind('.');
    let last_comma = number_part.rfind(',');

    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            // Both present: the later separator is the decimal point.
            let (decimal_sep, thousands_sep) = if dot > comma { ('.', ',') } else { (',', '.') };
            let stripped: String = number_part
                .chars()
                .filter(|&c| c != thousands_sep)
                .collect();
            stripped.replace(decimal_sep, ".")
        }
        (Some(_), None) => canonicalize_single(number_part, '.'),
        (None, Some(_)) => canonicalize_single(number_part, ','),
        (None, None) => number_part.to_string(),
    }
}

/// Handle a string containing only one separator kind.
///
/// Repeated separators are always thousands grouping. A single separator is
/// decimal only when the final digit group is one or two digits long.
fn canonicalize_single(number_part: &str, sep: char) -> String {
    let occurrences = number_part.matches(sep).count();
    let final_group_len = number_part
        .rsplit(sep)
        .next()
        .map_or(0, |group| group.chars().filter(char::is_ascii_digit).count());

    if occurrences == 1 && (1..=2).contains(&final_group_len) {
        number_part.replace(sep, ".")
    } else {
        number_part.replace(sep, "")
    }
}

/// The original/current price texts chosen from a page's raw price list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSelection {
    pub original: Option<String>,
    pub current: Option<String>,
}

/// Pick original and current price texts from everything the page displayed.
///
/// A single text serves as both. With two or more parseable texts the
/// largest value is the original and the second largest the current price;
/// when fewer than two parse, the first text serves as both (no discount
/// can be inferred from unparseable data).
#[must_use]
pub fn select_price_pair(raw_prices: &[String]) -> PriceSelection {
    match raw_prices {
        [] => PriceSelection::default(),
        [only] => PriceSelection {
            original: Some(only.clone()),
            current: Some(only.clone()),
        },
        _ => {
            let mut parsed: Vec<(&String, Decimal)> = raw_prices
                .iter()
                .filter_map(|text| {
                    normalize_price(text, None)
                        .amount
                        .map(|amount| (text, amount))
                })
                .collect();

            if parsed.len() >= 2 {
                parsed.sort_by(|a, b| b.1.cmp(&a.1));
                PriceSelection {
                    original: Some(parsed[0].0.clone()),
                    current: Some(parsed[1].0.clone()),
                }
            } else {
                PriceSelection {
                    original: Some(raw_prices[0].clone()),
                    current: Some(raw_prices[0].clone()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn colombian_thousands_format() {
        let price = normalize_price("$ 249.900 COP", None);
        assert_eq!(price.amount, Some(dec("249900")));
        assert_eq!(price.currency.as_deref(), Some("COP"));
        assert!(price.error.is_none());
    }

    #[test]
    fn us_format_with_both_separators() {
        let price = normalize_price("USD 1,234.56", None);
        assert_eq!(price.amount, Some(dec("1234.56")));
        assert_eq!(price.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn european_format_with_both_separators() {
        let price = normalize_price("1.234.567,89", None);
        assert_eq!(price.amount, Some(dec("1234567.89")));
        assert_eq!(price.currency, None);
    }

    #[test]
    fn comma_decimal() {
        let price = normalize_price("€ 99,99", None);
        assert_eq!(price.amount, Some(dec("99.99")));
        assert_eq!(price.currency, None);
    }

    #[test]
    fn dot_decimal_short_final_group() {
        let price = normalize_price("12.5", None);
        assert_eq!(price.amount, Some(dec("12.5")));
    }

    #[test]
    fn repeated_dots_are_thousands_grouping() {
        let price = normalize_price("1.234.567", None);
        assert_eq!(price.amount, Some(dec("1234567")));
    }

    #[test]
    fn fallback_currency_wins_over_parsed() {
        let price = normalize_price("USD 1,234.56", Some("COP"));
        assert_eq!(price.currency.as_deref(), Some("COP"));
    }

    #[test]
    fn fallback_currency_used_when_text_has_none() {
        let price = normalize_price("$ 259.900", Some("COP"));
        assert_eq!(price.amount, Some(dec("259900")));
        assert_eq!(price.currency.as_deref(), Some("COP"));
    }

    #[test]
    fn unparseable_text_yields_none_with_marker() {
        let price = normalize_price("Artículo no disponible", None);
        assert_eq!(price.amount, None);
        assert!(price.error.is_some());
        assert_eq!(price.original, "Artículo no disponible");
    }

    #[test]
    fn empty_text_yields_none_without_marker() {
        let price = normalize_price("   ", None);
        assert_eq!(price.amount, None);
        assert!(price.error.is_none());
    }

    #[test]
    fn select_pair_empty_list() {
        assert_eq!(select_price_pair(&[]), PriceSelection::default());
    }

    #[test]
    fn select_pair_single_price_is_both() {
        let prices = vec!["$ 159.900".to_string()];
        let pair = select_price_pair(&prices);
        assert_eq!(pair.original.as_deref(), Some("$ 159.900"));
        assert_eq!(pair.current.as_deref(), Some("$ 159.900"));
    }

    #[test]
    fn select_pair_largest_is_original() {
        let prices = vec!["$ 159.900".to_string(), "$ 259.900".to_string()];
        let pair = select_price_pair(&prices);
        assert_eq!(pair.original.as_deref(), Some("$ 259.900"));
        assert_eq!(pair.current.as_deref(), Some("$ 159.900"));
    }

    #[test]
    fn select_pair_three_prices_takes_two_largest() {
        let prices = vec![
            "$ 100".to_string(),
            "$ 300".to_string(),
            "$ 200".to_string(),
        ];
        let pair = select_price_pair(&prices);
        assert_eq!(pair.original.as_deref(), Some("$ 300"));
        assert_eq!(pair.current.as_deref(), Some("$ 200"));
    }

    #[test]
    fn select_pair_falls_back_when_texts_do_not_parse() {
        let prices = vec!["gratis".to_string(), "agotado".to_string()];
        let pair = select_price_pair(&prices);
        assert_eq!(pair.original.as_deref(), Some("gratis"));
        assert_eq!(pair.current.as_deref(), Some("gratis"));
    }
}
