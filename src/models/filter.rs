use std::fmt;

use sqlx::{Postgres, QueryBuilder};

use crate::models::submission::{AssessmentType, Submission, SubmissionStatus};

/// Submission field a filter can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Status,
    NoOfRetries,
    Version,
    Environment,
    AssessmentType,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::Status => "status",
            Field::NoOfRetries => "no_of_retries",
            Field::Version => "version",
            Field::Environment => "environment",
            Field::AssessmentType => "assessment_type",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i32),
}

/// Boolean predicate over submission fields, evaluated in memory or
/// compiled into a SQL `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(Field, Value),
    Le(Field, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq_text(field: Field, value: impl Into<String>) -> Self {
        Filter::Eq(field, Value::Text(value.into()))
    }

    pub fn le_int(field: Field, value: i32) -> Self {
        Filter::Le(field, Value::Int(value))
    }

    /// Eligibility predicate for one worker instance: matching scope tags,
    /// unprocessed or failed status, and retries within the ceiling.
    pub fn eligible(
        version: &str,
        environment: &str,
        assessment_type: AssessmentType,
        max_retries: i32,
    ) -> Self {
        Filter::And(vec![
            Filter::eq_text(Field::Version, version),
            Filter::eq_text(Field::Environment, environment),
            Filter::eq_text(Field::AssessmentType, assessment_type.to_string()),
            Filter::Or(
                SubmissionStatus::RETRYABLE
                    .iter()
                    .map(|status| Filter::eq_text(Field::Status, status.as_store_value()))
                    .collect(),
            ),
            Filter::le_int(Field::NoOfRetries, max_retries),
        ])
    }

    /// Evaluate against a submission already in memory.
    pub fn matches(&self, submission: &Submission) -> bool {
        match self {
            Filter::Eq(field, value) => match (field_value(submission, *field), value) {
                (Value::Text(actual), Value::Text(expected)) => actual == *expected,
                (Value::Int(actual), Value::Int(expected)) => actual == *expected,
                _ => false,
            },
            Filter::Le(field, value) => match (field_value(submission, *field), value) {
                (Value::Int(actual), Value::Int(bound)) => actual <= *bound,
                (Value::Text(actual), Value::Text(bound)) => actual.as_str() <= bound.as_str(),
                _ => false,
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(submission)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(submission)),
        }
    }

    /// Append this predicate to a query as a parenthesized expression with
    /// bound parameters.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Filter::Eq(field, value) => {
                qb.push(field.column()).push(" = ");
                push_value(qb, value);
            }
            Filter::Le(field, value) => {
                qb.push(field.column()).push(" <= ");
                push_value(qb, value);
            }
            Filter::And(filters) => push_group(qb, filters, " AND ", "TRUE"),
            Filter::Or(filters) => push_group(qb, filters, " OR ", "FALSE"),
        }
    }
}

fn field_value(submission: &Submission, field: Field) -> Value {
    match field {
        Field::Status => Value::Text(submission.status.as_store_value()),
        Field::NoOfRetries => Value::Int(submission.no_of_retries),
        Field::Version => Value::Text(submission.version.clone()),
        Field::Environment => Value::Text(submission.environment.clone()),
        Field::AssessmentType => Value::Text(submission.assessment_type.to_string()),
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value {
        Value::Text(text) => qb.push_bind(text.clone()),
        Value::Int(int) => qb.push_bind(*int),
    };
}

fn push_group(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter], joiner: &str, empty: &str) {
    if filters.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        filter.push_sql(qb);
    }
    qb.push(")");
}

/// Human-readable form for logs, e.g.
/// `AND(version = "1.0.2", OR(status = "", status = "failed"), no_of_retries <= 3)`.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq(field, value) => write!(f, "{} = {}", field.column(), DisplayValue(value)),
            Filter::Le(field, value) => write!(f, "{} <= {}", field.column(), DisplayValue(value)),
            Filter::And(filters) | Filter::Or(filters) => {
                let op = if matches!(self, Filter::And(_)) { "AND" } else { "OR" };
                write!(f, "{}(", op)?;
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
        }
    }
}

struct DisplayValue<'a>(&'a Value);

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Text(text) => write!(f, "{:?}", text),
            Value::Int(int) => write!(f, "{}", int),
        }
    }
}
