//! Typed PostgREST query builder.
//!
//! Filters are a tagged union rendered to query parameters, so user input is
//! only ever placed in value position and is quoted or escaped there.

/// Sort direction for `order=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A single filter clause or a logical combination of clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Case-insensitive `LIKE`. `pattern` is passed through verbatim, wildcards included.
    ILike { column: String, pattern: String },
    Eq { column: String, value: String },
    Neq { column: String, value: String },
    Or(Vec<Filter>),
    And(Vec<Filter>),
}

impl Filter {
    /// Case-insensitive substring match on `column`. `text` matches literally.
    pub fn contains(column: &str, text: &str) -> Self {
        Filter::ILike {
            column: column.to_string(),
            pattern: format!("%{}%", escape_like(text)),
        }
    }

    pub fn eq(column: &str, value: &str) -> Self {
        Filter::Eq {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn neq(column: &str, value: &str) -> Self {
        Filter::Neq {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Render as a top-level query parameter `(key, value)`.
    fn to_param(&self) -> (String, String) {
        match self {
            Filter::ILike { column, pattern } => (column.clone(), format!("ilike.{pattern}")),
            Filter::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            Filter::Neq { column, value } => (column.clone(), format!("neq.{value}")),
            Filter::Or(items) => ("or".to_string(), render_group(items)),
            Filter::And(items) => ("and".to_string(), render_group(items)),
        }
    }

    /// Render inside an `or=(…)` / `and=(…)` tree, where values need quoting.
    fn to_nested(&self) -> String {
        match self {
            Filter::ILike { column, pattern } => format!("{column}.ilike.{}", quote(pattern)),
            Filter::Eq { column, value } => format!("{column}.eq.{}", quote(value)),
            Filter::Neq { column, value } => format!("{column}.neq.{}", quote(value)),
            Filter::Or(items) => format!("or{}", render_group(items)),
            Filter::And(items) => format!("and{}", render_group(items)),
        }
    }
}

fn render_group(items: &[Filter]) -> String {
    let inner: Vec<String> = items.iter().map(Filter::to_nested).collect();
    format!("({})", inner.join(","))
}

/// Escape `LIKE` metacharacters so `text` matches itself.
///
/// PostgREST reads `*` as `%` and has no escape for it, so a literal `*`
/// becomes the single-character wildcard `_`.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '*' => out.push('_'),
            c => out.push(c),
        }
    }
    out
}

/// Double-quote a value when it contains characters reserved by PostgREST's logic-tree grammar.
fn quote(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace());
    if !reserved {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A select against one table. Top-level filters are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Ask the store for the exact match count alongside the rows.
    pub count: bool,
}

impl Query {
    pub fn select(table: &str, columns: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.to_string(),
            filters: Vec::new(),
            order: None,
            offset: None,
            limit: None,
            count: false,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// OR the given clauses together. An empty list adds nothing.
    pub fn any_of(mut self, clauses: Vec<Filter>) -> Self {
        match clauses.len() {
            0 => {}
            1 => self.filters.extend(clauses),
            _ => self.filters.push(Filter::Or(clauses)),
        }
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    /// Inclusive row range, as `range(from, to)` in the BaaS SDKs.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn exact_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Query-string parameters in PostgREST syntax, unencoded.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some((column, direction)) = &self.order {
            params.push(("order".to_string(), format!("{column}.{}", direction.as_str())));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}
