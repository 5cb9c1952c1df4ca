//! Translates the raw query string of a list endpoint into a typed query
//! description: filter triples, sort keys, a field projection and
//! pagination. The SQL rendering goes through a per-resource column
//! allow-list, so unknown fields never reach the database.

use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
/// Upper bound on page size; larger requests are clamped, not rejected.
pub const MAX_LIMIT: i64 = 100;

/// Keys that shape the result set rather than filter it.
const RESERVED: [&str; 4] = ["page", "limit", "sort", "fields"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(raw: &str) -> Self {
        match raw {
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            // unknown operators degrade to plain equality
            _ => FilterOp::Eq,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub dir: SortDir,
}

/// Parsed form of a list request's query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    /// `None` means every public field.
    pub fields: Option<Vec<String>>,
    pub page: i64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![SortKey {
                field: "createdAt".into(),
                dir: SortDir::Desc,
            }],
            fields: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListQuery {
    pub fn parse(params: &HashMap<String, String>) -> Self {
        let mut filters = Vec::new();
        for (key, value) in params {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            // `duration[gte]=5` arrives as the literal key "duration[gte]"
            let (field, op) = match key.split_once('[') {
                Some((field, rest)) => {
                    let op = rest.strip_suffix(']').unwrap_or(rest);
                    (field.to_string(), FilterOp::parse(op))
                }
                None => (key.clone(), FilterOp::Eq),
            };
            filters.push(Filter {
                field,
                op,
                value: value.clone(),
            });
        }
        // deterministic order for rendering and tests
        filters.sort_by(|a, b| a.field.cmp(&b.field));

        let sort = match params.get("sort") {
            Some(raw) if !raw.is_empty() => raw
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix('-') {
                    Some(field) => SortKey {
                        field: field.to_string(),
                        dir: SortDir::Desc,
                    },
                    None => SortKey {
                        field: s.to_string(),
                        dir: SortDir::Asc,
                    },
                })
                .collect(),
            _ => vec![SortKey {
                field: "createdAt".into(),
                dir: SortDir::Desc,
            }],
        };

        let fields = params.get("fields").map(|raw| {
            raw.split(',')
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect()
        });

        let page = coerce(params.get("page"), DEFAULT_PAGE);
        let limit = coerce(params.get("limit"), DEFAULT_LIMIT).min(MAX_LIMIT);

        Self {
            filters,
            sort,
            fields,
            page,
            limit,
        }
    }

    pub fn skip(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Non-numeric or non-positive input falls back to the default, mirroring
/// the loose coercion the API has always had.
fn coerce(raw: Option<&String>, default: i64) -> i64 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

/// How a column binds its filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColKind {
    Text,
    Num,
    Id,
    Bool,
    Time,
}

/// One entry of a resource's field allow-list: API name, SQL column, kind.
pub type Column = (&'static str, &'static str, ColKind);

fn lookup<'c>(columns: &'c [Column], field: &str) -> Option<&'c Column> {
    columns.iter().find(|(name, _, _)| *name == field)
}

/// Appends `AND col op $n` for every filter whose field is allow-listed
/// and whose value parses for the column's kind. The base query must
/// already carry a WHERE clause.
pub fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter], columns: &[Column]) {
    for filter in filters {
        let Some((_, column, kind)) = lookup(columns, &filter.field) else {
            continue;
        };
        match kind {
            ColKind::Text => {
                qb.push(" AND ")
                    .push(*column)
                    .push(" ")
                    .push(filter.op.sql())
                    .push(" ")
                    .push_bind(filter.value.clone());
            }
            ColKind::Num => {
                if let Ok(n) = filter.value.parse::<f64>() {
                    qb.push(" AND ")
                        .push(*column)
                        .push(" ")
                        .push(filter.op.sql())
                        .push(" ")
                        .push_bind(n);
                }
            }
            ColKind::Id => {
                if let Ok(id) = filter.value.parse::<Uuid>() {
                    qb.push(" AND ")
                        .push(*column)
                        .push(" ")
                        .push(filter.op.sql())
                        .push(" ")
                        .push_bind(id);
                }
            }
            ColKind::Bool => {
                if let Ok(b) = filter.value.parse::<bool>() {
                    qb.push(" AND ")
                        .push(*column)
                        .push(" ")
                        .push(filter.op.sql())
                        .push(" ")
                        .push_bind(b);
                }
            }
            ColKind::Time => {
                if let Ok(t) = time::OffsetDateTime::parse(
                    &filter.value,
                    &time::format_description::well_known::Rfc3339,
                ) {
                    qb.push(" AND ")
                        .push(*column)
                        .push(" ")
                        .push(filter.op.sql())
                        .push(" ")
                        .push_bind(t);
                }
            }
        }
    }
}

/// Appends ORDER BY over the allow-listed sort keys. Column names come
/// from the static allow-list, never from user input.
pub fn push_sort(qb: &mut QueryBuilder<'_, Postgres>, sort: &[SortKey], columns: &[Column]) {
    let mut first = true;
    for key in sort {
        let Some((_, column, _)) = lookup(columns, &key.field) else {
            continue;
        };
        qb.push(if first { " ORDER BY " } else { ", " });
        qb.push(*column);
        if key.dir == SortDir::Desc {
            qb.push(" DESC");
        }
        first = false;
    }
}

pub fn push_pagination(qb: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    qb.push(" LIMIT ")
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(query.skip());
}

/// Applies the field projection to a serialized document. `id` is always
/// kept, as the store's identifier was under the original API.
pub fn project(value: serde_json::Value, fields: &Option<Vec<String>>) -> serde_json::Value {
    let Some(fields) = fields else {
        return value;
    };
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_range_operators_into_typed_triples() {
        let query = ListQuery::parse(&params(&[
            ("difficulty", "easy"),
            ("duration[gte]", "5"),
            ("sort", "-price"),
            ("fields", "name,price"),
            ("page", "2"),
            ("limit", "5"),
        ]));

        assert_eq!(
            query.filters,
            vec![
                Filter {
                    field: "difficulty".into(),
                    op: FilterOp::Eq,
                    value: "easy".into(),
                },
                Filter {
                    field: "duration".into(),
                    op: FilterOp::Gte,
                    value: "5".into(),
                },
            ]
        );
        assert_eq!(
            query.sort,
            vec![SortKey {
                field: "price".into(),
                dir: SortDir::Desc,
            }]
        );
        assert_eq!(
            query.fields,
            Some(vec!["name".to_string(), "price".to_string()])
        );
        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 5);
        assert_eq!(query.skip(), 5);
    }

    #[test]
    fn unknown_operator_degrades_to_equality() {
        let query = ListQuery::parse(&params(&[("duration[near]", "5")]));
        assert_eq!(query.filters[0].op, FilterOp::Eq);
        assert_eq!(query.filters[0].field, "duration");
    }

    #[test]
    fn defaults_apply_when_parameters_are_absent() {
        let query = ListQuery::parse(&HashMap::new());
        assert!(query.filters.is_empty());
        assert_eq!(
            query.sort,
            vec![SortKey {
                field: "createdAt".into(),
                dir: SortDir::Desc,
            }]
        );
        assert_eq!(query.fields, None);
        assert_eq!(query.page, DEFAULT_PAGE);
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.skip(), 0);
    }

    #[test]
    fn non_numeric_pagination_coerces_to_defaults() {
        let query = ListQuery::parse(&params(&[("page", "abc"), ("limit", "-3")]));
        assert_eq!(query.page, DEFAULT_PAGE);
        assert_eq!(query.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn limit_is_clamped_to_the_maximum_page_size() {
        let query = ListQuery::parse(&params(&[("limit", "5000")]));
        assert_eq!(query.limit, MAX_LIMIT);
    }

    #[test]
    fn multi_key_sort_keeps_order_and_direction() {
        let query = ListQuery::parse(&params(&[("sort", "-ratingsAverage,price")]));
        assert_eq!(
            query.sort,
            vec![
                SortKey {
                    field: "ratingsAverage".into(),
                    dir: SortDir::Desc,
                },
                SortKey {
                    field: "price".into(),
                    dir: SortDir::Asc,
                },
            ]
        );
    }

    #[test]
    fn filters_outside_the_allow_list_never_reach_sql() {
        let columns: &[Column] = &[("price", "price", ColKind::Num)];
        let query = ListQuery::parse(&params(&[
            ("price[gte]", "100"),
            ("secretTour", "false"),
            ("evil", "'; DROP TABLE tours; --"),
        ]));

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tours WHERE secret_tour = FALSE");
        push_filters(&mut qb, &query.filters, columns);
        let sql = qb.sql();
        assert!(sql.contains("price >= $1"));
        assert!(!sql.contains("secretTour"));
        assert!(!sql.contains("DROP TABLE"));
    }

    #[test]
    fn sort_renders_allow_listed_columns_only() {
        let columns: &[Column] = &[
            ("price", "price", ColKind::Num),
            ("createdAt", "created_at", ColKind::Num),
        ];
        let query = ListQuery::parse(&params(&[("sort", "-price,nonsense,createdAt")]));

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tours WHERE TRUE");
        push_sort(&mut qb, &query.sort, columns);
        assert!(qb.sql().ends_with(" ORDER BY price DESC, created_at"));
    }

    #[test]
    fn projection_keeps_requested_fields_and_id() {
        let doc = serde_json::json!({
            "id": "abc",
            "name": "The Forest Hiker",
            "price": 397.0,
            "summary": "hidden",
        });
        let fields = Some(vec!["name".to_string(), "price".to_string()]);
        let projected = project(doc, &fields);
        let map = projected.as_object().unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("id"));
        assert!(map.contains_key("name"));
        assert!(map.contains_key("price"));
        assert!(!map.contains_key("summary"));
    }

    #[test]
    fn absent_projection_returns_the_document_unchanged() {
        let doc = serde_json::json!({"id": "abc", "name": "x"});
        assert_eq!(project(doc.clone(), &None), doc);
    }
}
