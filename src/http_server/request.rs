//! Request body parsing
//!
//! Bodies deserialize into raw structs with optional fields, then each
//! field is checked by hand. All offending fields are reported together.
//! An empty body is treated as `{}`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{SqlParam, Statement};
use crate::users::{NewUser, UserPatch};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn is_email(value: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

// ==================
// Errors
// ==================

/// One invalid field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A rejected request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        for (i, e) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}: {}", sep, e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failed checks collected across one body
#[derive(Debug, Default)]
struct Problems(Vec<FieldError>);

impl Problems {
    fn push(&mut self, field: &str, message: &str) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    fn non_empty(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value {
            Some(s) if s.is_empty() => {
                self.push(field, "Must not be empty");
                None
            }
            other => other,
        }
    }

    fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        if value.is_none() {
            self.push(field, "Required");
        }
        self.non_empty(field, value)
    }

    fn email(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value {
            Some(s) if !is_email(&s) => {
                self.push(field, "Invalid email");
                None
            }
            other => other,
        }
    }

    fn finish<T>(self, parsed: Option<T>) -> Result<T, ValidationError> {
        match parsed {
            Some(value) if self.0.is_empty() => Ok(value),
            _ if self.0.is_empty() => Err(ValidationError::single("body", "Invalid request")),
            _ => Err(ValidationError { errors: self.0 }),
        }
    }
}

// ==================
// Raw bodies
// ==================

/// Raw `POST /query` body, also one entry of `POST /transaction`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatement {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    params: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    queries: Option<Vec<RawStatement>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImport {
    #[serde(default)]
    sql: Option<String>,
}

/// Raw user body, shared by create and update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

// ==================
// Request types
// ==================

/// A request body checked after deserialization
pub trait Validate: Sized {
    type Raw: DeserializeOwned;

    fn validate(raw: Self::Raw) -> Result<Self, ValidationError>;
}

/// Parse and validate a request body.
pub fn parse<T: Validate>(body: &[u8]) -> Result<T, ValidationError> {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ValidationError::single("body", format!("Invalid JSON: {}", e)))?
    };

    // Derived structs also accept JSON arrays
    if !value.is_object() {
        return Err(ValidationError::single("body", "Expected object"));
    }

    let raw: T::Raw = serde_json::from_value(value)
        .map_err(|e| ValidationError::single("body", format!("Invalid request: {}", e)))?;

    T::validate(raw)
}

fn statement(raw: RawStatement, field: &str, problems: &mut Problems) -> Option<Statement> {
    let sql = problems.required(field, raw.query)?;
    let params = raw
        .params
        .unwrap_or_default()
        .iter()
        .map(SqlParam::from)
        .collect();
    Some(Statement::new(sql, params))
}

/// `POST /query`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest(pub Statement);

impl Validate for QueryRequest {
    type Raw = RawStatement;

    fn validate(raw: RawStatement) -> Result<Self, ValidationError> {
        let mut problems = Problems::default();
        let parsed = statement(raw, "query", &mut problems);
        problems.finish(parsed.map(QueryRequest))
    }
}

/// `POST /transaction`
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest(pub Vec<Statement>);

impl Validate for TransactionRequest {
    type Raw = RawTransaction;

    fn validate(raw: RawTransaction) -> Result<Self, ValidationError> {
        let queries = match raw.queries {
            None => return Err(ValidationError::single("queries", "Required")),
            Some(q) if q.is_empty() => {
                return Err(ValidationError::single(
                    "queries",
                    "Must contain at least one entry",
                ))
            }
            Some(q) => q,
        };

        let mut problems = Problems::default();
        let statements = queries
            .into_iter()
            .enumerate()
            .filter_map(|(i, q)| statement(q, &format!("queries.{}.query", i), &mut problems))
            .collect();
        problems.finish(Some(TransactionRequest(statements)))
    }
}

/// `POST /import`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest(pub String);

impl Validate for ImportRequest {
    type Raw = RawImport;

    fn validate(raw: RawImport) -> Result<Self, ValidationError> {
        let mut problems = Problems::default();
        let sql = problems.required("sql", raw.sql);
        problems.finish(sql.map(ImportRequest))
    }
}

impl Validate for NewUser {
    type Raw = RawUser;

    fn validate(raw: RawUser) -> Result<Self, ValidationError> {
        let mut problems = Problems::default();
        let name = problems.required("name", raw.name);
        let email = problems.required("email", raw.email);
        let email = problems.email("email", email);
        problems.finish(name.zip(email).map(|(name, email)| NewUser { name, email }))
    }
}

impl Validate for UserPatch {
    type Raw = RawUser;

    fn validate(raw: RawUser) -> Result<Self, ValidationError> {
        let mut problems = Problems::default();
        let name = problems.non_empty("name", raw.name);
        let email = problems.non_empty("email", raw.email);
        let email = problems.email("email", email);
        problems.finish(Some(UserPatch { name, email }))
    }
}
