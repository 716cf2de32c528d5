//! List filtering built from request query parameters.
//!
//! `?search=edit&searchFields=name:like&searchJoin=and&orderBy=name&sortedBy=desc`
//!
//! Only fields an entity declares in [`Searchable::SEARCHABLE`] are honoured;
//! anything else is dropped before it can reach SQL.

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    /// Case-insensitive substring match.
    Like,
}

impl Operator {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "=" => Some(Operator::Eq),
            "like" | "ilike" => Some(Operator::Like),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// An entity that can be filtered by [`Criteria`].
pub trait Searchable {
    /// Column name and default operator of every filterable field.
    const SEARCHABLE: &'static [(&'static str, Operator)];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: &'static str,
    pub operator: Operator,
    pub value: String,
}

/// Raw query parameters as they arrive on a listing request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub search: Option<String>,
    pub search_fields: Option<String>,
    pub search_join: Option<String>,
    pub order_by: Option<String>,
    pub sorted_by: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    pub conditions: Vec<Condition>,
    pub join: Join,
    pub order_by: Option<(&'static str, Direction)>,
}

impl Criteria {
    /// Builds criteria for `T`, or `None` when the query asks for no filtering or ordering.
    pub fn from_query<T: Searchable>(query: &ListQuery) -> Option<Self> {
        let overrides = parse_search_fields::<T>(query.search_fields.as_deref());
        let operator_for = |field: &'static str, default: Operator| {
            overrides
                .iter()
                .find(|(f, _)| *f == field)
                .map_or(default, |(_, op)| *op)
        };

        let mut conditions = Vec::new();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if search.contains(':') {
                for pair in search.split(';') {
                    let Some((name, value)) = pair.split_once(':') else {
                        continue;
                    };
                    let value = value.trim();
                    if value.is_empty() {
                        continue;
                    }
                    if let Some((field, default)) = lookup::<T>(name) {
                        conditions.push(Condition {
                            field,
                            operator: operator_for(field, default),
                            value: value.to_string(),
                        });
                    }
                }
            } else {
                let restrict: Vec<&'static str> = overrides.iter().map(|(f, _)| *f).collect();
                for &(field, default) in T::SEARCHABLE {
                    if !restrict.is_empty() && !restrict.contains(&field) {
                        continue;
                    }
                    conditions.push(Condition {
                        field,
                        operator: operator_for(field, default),
                        value: search.to_string(),
                    });
                }
            }
        }

        let join = match query.search_join.as_deref().map(str::to_ascii_lowercase) {
            Some(j) if j == "and" => Join::And,
            _ => Join::Or,
        };

        let order_by = query.order_by.as_deref().and_then(|name| {
            let field = if name.trim() == "id" {
                "id"
            } else {
                lookup::<T>(name)?.0
            };
            let direction = match query.sorted_by.as_deref().map(str::to_ascii_lowercase) {
                Some(d) if d == "desc" => Direction::Desc,
                _ => Direction::Asc,
            };
            Some((field, direction))
        });

        if conditions.is_empty() && order_by.is_none() {
            return None;
        }
        Some(Self {
            conditions,
            join,
            order_by,
        })
    }

    /// Appends ` WHERE (...)` when there are conditions.
    pub fn push_where(&self, q: &mut QueryBuilder<'_, Postgres>) {
        if self.conditions.is_empty() {
            return;
        }
        let glue = match self.join {
            Join::And => " AND ",
            Join::Or => " OR ",
        };
        q.push(" WHERE (");
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                q.push(glue);
            }
            match c.operator {
                Operator::Eq => {
                    q.push(c.field).push(" = ").push_bind(c.value.clone());
                }
                Operator::Like => {
                    q.push(c.field)
                        .push(" ILIKE ")
                        .push_bind(format!("%{}%", escape_like(&c.value)));
                }
            }
        }
        q.push(")");
    }

    pub fn push_order(criteria: Option<&Self>, q: &mut QueryBuilder<'_, Postgres>) {
        let (field, direction) = criteria
            .and_then(|c| c.order_by)
            .unwrap_or(("id", Direction::Asc));
        q.push(" ORDER BY ").push(field);
        q.push(match direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
        if field != "id" {
            q.push(", id ASC");
        }
    }
}

fn lookup<T: Searchable>(name: &str) -> Option<(&'static str, Operator)> {
    let name = name.trim();
    T::SEARCHABLE.iter().copied().find(|(f, _)| *f == name)
}

fn parse_search_fields<T: Searchable>(raw: Option<&str>) -> Vec<(&'static str, Operator)> {
    let Some(raw) = raw else { return Vec::new() };
    raw.split(';')
        .filter_map(|entry| {
            let (name, op) = match entry.split_once(':') {
                Some((n, o)) => (n, Operator::parse(o)),
                None => (entry, None),
            };
            let (field, default) = lookup::<T>(name)?;
            Some((field, op.unwrap_or(default)))
        })
        .collect()
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
