//! Element locators
//!
//! Scenario selectors use the `engine=body` form: `xpath=html/body/div/a`
//! or `css=form button`. Bare XPath (starting with `/`, `(` or `html/`) is
//! accepted as well.

use std::fmt;

use crate::common::{Error, Result};

/// Element location strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    XPath,
    Css,
}

/// How to find one element on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub selector: String,
    /// Which match to use when several elements match
    pub nth: usize,
}

impl Locator {
    /// Parse a scenario selector string
    pub fn parse(selector: &str, nth: usize) -> Result<Self> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidScenario("Empty selector".to_string()));
        }

        let (strategy, body) = if let Some(rest) = trimmed.strip_prefix("xpath=") {
            (LocatorStrategy::XPath, rest)
        } else if let Some(rest) = trimmed.strip_prefix("css=") {
            (LocatorStrategy::Css, rest)
        } else if trimmed.starts_with('/') || trimmed.starts_with('(') || trimmed.starts_with("html/") {
            (LocatorStrategy::XPath, trimmed)
        } else {
            return Err(Error::InvalidScenario(format!(
                "Unsupported selector '{}'. Use 'xpath=...' or 'css=...'",
                selector
            )));
        };

        if body.trim().is_empty() {
            return Err(Error::InvalidScenario(format!(
                "Selector '{}' has an empty body",
                selector
            )));
        }

        let selector = match strategy {
            // Relative paths like html/body/... are evaluated from the document root
            LocatorStrategy::XPath if !body.starts_with('/') && !body.starts_with('(') => {
                format!("/{}", body)
            }
            _ => body.to_string(),
        };

        Ok(Self {
            strategy,
            selector,
            nth,
        })
    }

    /// Locator for the innermost element containing `text`
    ///
    /// Matching ignores case and runs of whitespace, and script/style
    /// contents are ignored. XPath 1.0 can only fold case through
    /// `translate()`, so the folding table holds ASCII letters plus the
    /// letters that occur in `text`.
    pub fn text(text: &str) -> Self {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let table = case_table(&collapsed);
        let folded: String = collapsed.chars().map(|c| fold_char(&table, c)).collect();

        let upper: String = table.iter().map(|(u, _)| *u).collect();
        let lower: String = table.iter().map(|(_, l)| *l).collect();
        let haystack = format!(
            "translate(normalize-space(.), {}, {})",
            xpath_literal(&upper),
            xpath_literal(&lower)
        );
        let selector = format!(
            "//body//*[not(self::script or self::style)][contains({h}, {n})][not(.//*[contains({h}, {n})])]",
            h = haystack,
            n = xpath_literal(&folded)
        );
        Self {
            strategy: LocatorStrategy::XPath,
            selector,
            nth: 0,
        }
    }

    /// The locator in `fantoccini` terms
    pub fn as_webdriver(&self) -> fantoccini::Locator<'_> {
        match self.strategy {
            LocatorStrategy::XPath => fantoccini::Locator::XPath(&self.selector),
            LocatorStrategy::Css => fantoccini::Locator::Css(&self.selector),
        }
    }
}

/// Upper/lower pairs for ASCII letters and the cased letters of `text`
fn case_table(text: &str) -> Vec<(char, char)> {
    let mut table: Vec<(char, char)> = ('A'..='Z').zip('a'..='z').collect();
    for c in text.chars().filter(|c| !c.is_ascii()) {
        let (Some(upper), Some(lower)) = (single(c.to_uppercase()), single(c.to_lowercase()))
        else {
            continue;
        };
        if upper != lower && !table.iter().any(|(u, _)| *u == upper) {
            table.push((upper, lower));
        }
    }
    table
}

fn fold_char(table: &[(char, char)], c: char) -> char {
    table
        .iter()
        .find(|(upper, _)| *upper == c)
        .map(|(_, lower)| *lower)
        .unwrap_or(c)
}

/// The only char of an iterator, if it yields exactly one
fn single(mut chars: impl Iterator<Item = char>) -> Option<char> {
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = match self.strategy {
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::Css => "css",
        };
        if self.nth == 0 {
            write!(f, "{}={}", engine, self.selector)
        } else {
            write!(f, "{}={} (match {})", engine, self.selector, self.nth)
        }
    }
}

/// Quote a string as an XPath 1.0 literal
///
/// XPath has no escape sequences, so strings containing both quote kinds
/// are split and joined with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{}'", s);
    }
    if !s.contains('"') {
        return format!("\"{}\"", s);
    }

    let parts: Vec<String> = s
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
