use std::fmt::Display;

use serde::Serialize;
use serde_json::{json, Value};

pub const MAX_PER_PAGE: u32 = 100;

/// Builder for PostgREST table paths: `/rest/v1/<table>?<filters>`.
///
/// Every value is percent-encoded. `None` and empty-string filter values are skipped.
#[derive(Debug, Clone)]
pub struct ListQuery {
    table: String,
    params: Vec<(String, String)>,
}

impl ListQuery {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    fn push_filter(self, column: &str, op: &str, value: impl Display) -> Self {
        let encoded = urlencoding::encode(&value.to_string()).into_owned();
        self.push(column, format!("{}.{}", op, encoded))
    }

    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.push_filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.push_filter(column, "neq", value)
    }

    pub fn eq_opt<V: Display>(self, column: &str, value: Option<V>) -> Self {
        match non_blank(value) {
            Some(v) => self.push_filter(column, "eq", v),
            None => self,
        }
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.push_filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.push_filter(column, "lte", value)
    }

    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.push_filter(column, "lt", value)
    }

    pub fn gte_opt<V: Display>(self, column: &str, value: Option<V>) -> Self {
        match non_blank(value) {
            Some(v) => self.push_filter(column, "gte", v),
            None => self,
        }
    }

    pub fn lte_opt<V: Display>(self, column: &str, value: Option<V>) -> Self {
        match non_blank(value) {
            Some(v) => self.push_filter(column, "lte", v),
            None => self,
        }
    }

    pub fn in_list<V: Display>(self, column: &str, values: &[V]) -> Self {
        let list = values
            .iter()
            .map(|v| quote(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        self.push(column, format!("in.({})", urlencoding::encode(&list)))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.push(column, "is.null".to_string())
    }

    pub fn not_null(self, column: &str) -> Self {
        self.push(column, "not.is.null".to_string())
    }

    /// Case-insensitive substring match of `term` against any of `columns`.
    pub fn search(self, columns: &[&str], term: Option<&str>) -> Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = quote(&format!("*{}*", term));
        let clauses = columns
            .iter()
            .map(|column| format!("{}.ilike.{}", column, pattern))
            .collect::<Vec<_>>()
            .join(",");
        self.push("or", format!("({})", urlencoding::encode(&clauses)))
    }

    /// Array column contains every value in `values`.
    pub fn contains(self, column: &str, values: &[&str]) -> Self {
        self.push(column, format!("cs.{}", urlencoding::encode(&array_literal(values))))
    }

    /// Array column shares at least one value with `values`.
    pub fn overlaps(self, column: &str, values: &[&str]) -> Self {
        self.push(column, format!("ov.{}", urlencoding::encode(&array_literal(values))))
    }

    /// Rows matching any of `conditions`; an empty list adds nothing.
    pub fn any_of(self, conditions: &[Condition]) -> Self {
        if conditions.is_empty() {
            return self;
        }
        let clauses = conditions
            .iter()
            .map(Condition::render)
            .collect::<Vec<_>>()
            .join(",");
        self.push("or", format!("({})", urlencoding::encode(&clauses)))
    }

    pub fn sort(self, sort: &SortSpec) -> Self {
        self.push_order(sort.to_param())
    }

    pub fn order(self, column: &str, direction: SortDirection) -> Self {
        self.push_order(format!("{}.{}", column, direction.as_str()))
    }

    /// Repeated orderings join into one `order=a.desc,b.desc` parameter.
    fn push_order(mut self, term: String) -> Self {
        match self.params.iter_mut().find(|(k, _)| k == "order") {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&term);
                self
            }
            None => self.push("order", term),
        }
    }

    pub fn limit(self, limit: u32) -> Self {
        self.push("limit", limit.to_string())
    }

    pub fn to_path(&self) -> String {
        if self.params.is_empty() {
            return format!("/rest/v1/{}", self.table);
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("/rest/v1/{}?{}", self.table, query)
    }
}

/// One branch of an `or=(...)` group.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, String),
    Overlaps(String, Vec<String>),
}

impl Condition {
    fn render(&self) -> String {
        match self {
            Condition::Eq(column, value) => format!("{}.eq.{}", column, quote(value)),
            Condition::Overlaps(column, values) => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                format!("{}.ov.{}", column, array_literal(&values))
            }
        }
    }
}

fn non_blank<V: Display>(value: Option<V>) -> Option<String> {
    value
        .map(|v| v.to_string())
        .filter(|v| !v.trim().is_empty())
}

/// Double-quotes a PostgREST value so commas, dots and parentheses survive.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn array_literal(values: &[&str]) -> String {
    let items = values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(",");
    format!("{{{}}}", items)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Clamps `per_page` to 1..=100 and `page` to at least 1.
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => Some(SortDirection::Asc),
            Some("desc") => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Resolves a client-supplied sort. A column outside `allowed` falls back to the default
    /// column and direction; an unknown direction falls back to the default direction.
    pub fn resolve(
        requested: Option<&str>,
        direction: Option<&str>,
        allowed: &[&str],
        default_column: &str,
        default_direction: SortDirection,
    ) -> Self {
        match requested.map(str::trim) {
            Some(column) if allowed.contains(&column) => Self {
                column: column.to_string(),
                direction: SortDirection::parse(direction).unwrap_or(default_direction),
            },
            _ => Self {
                column: default_column.to_string(),
                direction: default_direction,
            },
        }
    }

    /// Maps an API-facing column name onto its storage column.
    pub fn rename(mut self, api_name: &str, column: &str) -> Self {
        if self.column == api_name {
            self.column = column.to_string();
        }
        self
    }

    pub fn to_param(&self) -> String {
        format!("{}.{}", self.column, self.direction.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl PaginationMeta {
    /// `from`/`to` are 1-based item indexes of the returned page, `None` when it is empty.
    pub fn new(total: u64, page: PageRequest, returned: u64) -> Self {
        let per_page = page.per_page as u64;
        let last_page = total.div_ceil(per_page).max(1) as u32;
        let (from, to) = if returned == 0 {
            (None, None)
        } else {
            let from = page.offset() + 1;
            (Some(from), Some(from + returned - 1))
        };

        Self {
            total,
            per_page: page.per_page,
            current_page: page.page,
            last_page,
            from,
            to,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, meta: PaginationMeta) -> Self {
        Self { items, meta }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

impl<T: Serialize> Page<T> {
    /// `{ "<key>": [...], "pagination": {...} }`
    pub fn into_json(self, key: &str) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), json!(self.items));
        body.insert("pagination".to_string(), json!(self.meta));
        Value::Object(body)
    }
}
