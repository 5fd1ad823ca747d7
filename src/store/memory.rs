//! In-memory `VideoStore` that evaluates `Query` values the way PostgREST would.

use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::query::{Direction, Filter, Query};
use super::types::Rows;
use super::{StoreError, VideoStore};

#[derive(Default)]
pub(crate) struct MemoryStore {
    rows: Vec<Value>,
    fail_with: Option<u16>,
    delay: Option<Duration>,
    seen: Mutex<Vec<Query>>,
}

impl MemoryStore {
    pub(crate) fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub(crate) fn failing(code: u16) -> Self {
        Self {
            fail_with: Some(code),
            ..Default::default()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received so far, in order.
    pub(crate) fn seen(&self) -> Vec<Query> {
        self.seen.lock().unwrap().clone()
    }
}

/// A video row with the given title, category line and language.
pub(crate) fn video(title: &str, category: &str, language: &str) -> Value {
    serde_json::json!({
        "videotitle": title,
        "description": format!("About {title}"),
        "category": category,
        "language": language,
        "yt_tags": "",
        "yt_url": null,
        "thumbnail": null
    })
}

impl VideoStore for MemoryStore {
    async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Rows<T>, StoreError> {
        self.seen.lock().unwrap().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(code) = self.fail_with {
            return Err(StoreError::Api {
                code,
                message: "simulated failure".into(),
            });
        }

        let mut matched: Vec<&Value> = self
            .rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| eval(f, row)))
            .collect();

        if let Some((column, direction)) = &query.order {
            matched.sort_by(|a, b| {
                let ord = a[column.as_str()]
                    .as_str()
                    .unwrap_or_default()
                    .cmp(b[column.as_str()].as_str().unwrap_or_default());
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        let total = matched.len();
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        let data = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|v| serde_json::from_value(v.clone()))
            .collect::<Result<Vec<T>, _>>()?;

        Ok(Rows {
            data,
            count: query.count.then_some(total),
        })
    }
}

fn eval(filter: &Filter, row: &Value) -> bool {
    match filter {
        Filter::ILike { column, pattern } => row[column.as_str()]
            .as_str()
            .is_some_and(|v| ilike(v, pattern)),
        Filter::Eq { column, value } => row[column.as_str()].as_str() == Some(value.as_str()),
        Filter::Neq { column, value } => row[column.as_str()]
            .as_str()
            .is_some_and(|v| v != value),
        Filter::Or(items) => items.iter().any(|f| eval(f, row)),
        Filter::And(items) => items.iter().all(|f| eval(f, row)),
    }
}

enum Token {
    Lit(char),
    One,
    Many,
}

fn ilike(value: &str, pattern: &str) -> bool {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => tokens.push(Token::Lit(chars.next().unwrap_or('\\'))),
            '%' | '*' => tokens.push(Token::Many),
            '_' => tokens.push(Token::One),
            c => tokens.push(Token::Lit(c)),
        }
    }
    let value: Vec<char> = value.to_lowercase().chars().collect();
    matches_from(&value, &tokens)
}

fn matches_from(value: &[char], tokens: &[Token]) -> bool {
    match tokens.split_first() {
        None => value.is_empty(),
        Some((Token::Many, rest)) => (0..=value.len()).any(|i| matches_from(&value[i..], rest)),
        Some((Token::One, rest)) => !value.is_empty() && matches_from(&value[1..], rest),
        Some((Token::Lit(c), rest)) => {
            let mut lower = c.to_lowercase();
            let single = lower.next();
            value.first().copied() == single
                && lower.next().is_none()
                && matches_from(&value[1..], rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilike_is_case_insensitive_substring() {
        assert!(ilike("Hello World", "%world%"));
        assert!(!ilike("Hello", "%world%"));
    }

    #[test]
    fn ilike_honours_escapes() {
        assert!(ilike("100% real", r"%100\%%"));
        assert!(!ilike("1000 real", r"%100\%%"));
        assert!(ilike("a_b", r"a\_b"));
        assert!(!ilike("axb", r"a\_b"));
    }
}
