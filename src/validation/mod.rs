//! Field-level request validation.
//!
//! Rule sets are written as pipe-delimited rule strings, e.g.
//! `"required|string|max:255"`, and checked against a JSON payload. A failed
//! check yields a [`ValidationError`] carrying every message per field.

pub mod registry;

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

pub use registry::RuleRegistry;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref ALPHA_DASH_RE: Regex = Regex::new(r"^[\pL\pM\pN_-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Which rule set of an entity applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ruleset {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    Sometimes,
    Nullable,
    String,
    Email,
    Boolean,
    Integer,
    Accepted,
    AlphaDash,
    Min(usize),
    Max(usize),
    In(Vec<String>),
}

impl Rule {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        let (name, arg) = match raw.split_once(':') {
            Some((n, a)) => (n.trim(), Some(a.trim())),
            None => (raw.trim(), None),
        };
        let size = |arg: Option<&str>| -> anyhow::Result<usize> {
            let arg = arg.ok_or_else(|| anyhow::anyhow!("rule `{name}` needs a size"))?;
            arg.parse::<usize>()
                .map_err(|_| anyhow::anyhow!("rule `{name}` has invalid size `{arg}`"))
        };
        Ok(match name {
            "required" => Rule::Required,
            "sometimes" => Rule::Sometimes,
            "nullable" => Rule::Nullable,
            "string" => Rule::String,
            "email" => Rule::Email,
            "boolean" => Rule::Boolean,
            "integer" => Rule::Integer,
            "accepted" => Rule::Accepted,
            "alpha_dash" => Rule::AlphaDash,
            "min" => Rule::Min(size(arg)?),
            "max" => Rule::Max(size(arg)?),
            "in" => Rule::In(
                arg.unwrap_or_default()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            other => anyhow::bail!("unknown validation rule `{other}`"),
        })
    }

    fn as_rule_string(&self) -> String {
        match self {
            Rule::Required => "required".into(),
            Rule::Sometimes => "sometimes".into(),
            Rule::Nullable => "nullable".into(),
            Rule::String => "string".into(),
            Rule::Email => "email".into(),
            Rule::Boolean => "boolean".into(),
            Rule::Integer => "integer".into(),
            Rule::Accepted => "accepted".into(),
            Rule::AlphaDash => "alpha_dash".into(),
            Rule::Min(n) => format!("min:{n}"),
            Rule::Max(n) => format!("max:{n}"),
            Rule::In(values) => format!("in:{}", values.join(",")),
        }
    }

    /// Checks a present, non-null value. Returns the failure message.
    fn check(&self, attribute: &str, value: &Value) -> Option<String> {
        match self {
            Rule::Required | Rule::Sometimes | Rule::Nullable => None,
            Rule::String => {
                (!value.is_string()).then(|| format!("The {attribute} must be a string."))
            }
            Rule::Email => match value.as_str() {
                Some(s) if is_valid_email(s.trim()) => None,
                _ => Some(format!("The {attribute} must be a valid email address.")),
            },
            Rule::Boolean => {
                let ok = matches!(value, Value::Bool(_))
                    || matches!(value.as_i64(), Some(0 | 1))
                    || matches!(value.as_str(), Some("0" | "1" | "true" | "false"));
                (!ok).then(|| format!("The {attribute} field must be true or false."))
            }
            Rule::Integer => {
                let ok = value.is_i64()
                    || value.is_u64()
                    || value.as_str().is_some_and(|s| s.trim().parse::<i64>().is_ok());
                (!ok).then(|| format!("The {attribute} must be an integer."))
            }
            Rule::Accepted => {
                let ok = matches!(value, Value::Bool(true))
                    || matches!(value.as_i64(), Some(1))
                    || matches!(value.as_str(), Some("yes" | "on" | "1" | "true"));
                (!ok).then(|| format!("The {attribute} must be accepted."))
            }
            Rule::AlphaDash => match value.as_str() {
                Some(s) if ALPHA_DASH_RE.is_match(s) => None,
                _ => Some(format!(
                    "The {attribute} may only contain letters, numbers, dashes and underscores."
                )),
            },
            Rule::Min(n) => match measure(value) {
                Measure::Chars(len) if len < *n => {
                    Some(format!("The {attribute} must be at least {n} characters."))
                }
                Measure::Number(v) if v < *n as f64 => {
                    Some(format!("The {attribute} must be at least {n}."))
                }
                Measure::Items(len) if len < *n => {
                    Some(format!("The {attribute} must have at least {n} items."))
                }
                _ => None,
            },
            Rule::Max(n) => match measure(value) {
                Measure::Chars(len) if len > *n => Some(format!(
                    "The {attribute} may not be greater than {n} characters."
                )),
                Measure::Number(v) if v > *n as f64 => {
                    Some(format!("The {attribute} may not be greater than {n}."))
                }
                Measure::Items(len) if len > *n => Some(format!(
                    "The {attribute} may not have more than {n} items."
                )),
                _ => None,
            },
            Rule::In(allowed) => {
                let ok = match value {
                    Value::String(s) => allowed.iter().any(|a| a == s),
                    Value::Number(n) => allowed.iter().any(|a| *a == n.to_string()),
                    _ => false,
                };
                (!ok).then(|| format!("The selected {attribute} is invalid."))
            }
        }
    }
}

enum Measure {
    Chars(usize),
    Number(f64),
    Items(usize),
    None,
}

fn measure(value: &Value) -> Measure {
    match value {
        Value::String(s) => Measure::Chars(s.chars().count()),
        Value::Number(n) => n.as_f64().map_or(Measure::None, Measure::Number),
        Value::Array(items) => Measure::Items(items.len()),
        _ => Measure::None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Constraints for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRules {
    pub field: String,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    fn has(&self, rule: &Rule) -> bool {
        self.rules.contains(rule)
    }
}

/// Ordered mapping from field name to constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    pub fn parse<'a, I>(entries: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fields = Vec::new();
        for (field, raw) in entries {
            let rules = raw
                .split('|')
                .filter(|r| !r.trim().is_empty())
                .map(Rule::parse)
                .collect::<anyhow::Result<Vec<_>>>()
                .map_err(|e| anyhow::anyhow!("field `{field}`: {e}"))?;
            fields.push(FieldRules {
                field: field.to_string(),
                rules,
            });
        }
        Ok(Self { fields })
    }

    /// Rule strings per field, the shape handed to clients for local validation.
    pub fn describe(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|f| {
                let rules: Vec<String> = f.rules.iter().map(Rule::as_rule_string).collect();
                (f.field.clone(), rules.join("|"))
            })
            .collect()
    }

    pub fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        let mut bag = MessageBag::default();
        for field in &self.fields {
            let attribute = field.field.replace('_', " ");
            let value = payload.get(&field.field);

            if value.is_none() && field.has(&Rule::Sometimes) {
                continue;
            }
            let missing = value.map_or(true, is_empty);
            if missing {
                if field.has(&Rule::Required) {
                    bag.add(&field.field, format!("The {attribute} field is required."));
                } else if field.has(&Rule::Accepted) {
                    bag.add(&field.field, format!("The {attribute} must be accepted."));
                }
                continue;
            }
            let Some(value) = value else { continue };
            for rule in &field.rules {
                if let Some(message) = rule.check(&attribute, value) {
                    bag.add(&field.field, message);
                }
            }
        }
        bag.into_result()
    }
}

/// Field name to failure messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MessageBag(BTreeMap<String, Vec<String>>);

impl MessageBag {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(self))
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("The given data was invalid.")]
pub struct ValidationError(pub MessageBag);

impl ValidationError {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut bag = MessageBag::default();
        bag.add(field, message);
        Self(bag)
    }

    pub fn messages(&self) -> &MessageBag {
        &self.0
    }
}

/// Create and update rule sets of one entity.
#[derive(Debug, Clone)]
pub struct EntityValidator {
    create: RuleSet,
    update: RuleSet,
}

impl EntityValidator {
    pub fn new(create: RuleSet, update: RuleSet) -> Self {
        Self { create, update }
    }

    pub fn validate(&self, payload: &Value, ruleset: Ruleset) -> Result<(), ValidationError> {
        match ruleset {
            Ruleset::Create => self.create.validate(payload),
            Ruleset::Update => self.update.validate(payload),
        }
    }
}
