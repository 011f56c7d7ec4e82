//! # Users
//!
//! The example entity: typed records over the `users` table and the
//! statements behind the CRUD routes. Ids are handed to the engine as
//! text, so a non-numeric id surfaces as the engine's type error.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{QueryError, QueryOutput, QueryResult, Row, Session, SqlParam};

/// A stored user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: Option<NaiveDateTime>,
}

impl TryFrom<Row> for User {
    type Error = QueryError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        serde_json::from_value(Value::Object(row))
            .map_err(|e| QueryError::message(format!("Malformed user row: {}", e)))
    }
}

/// Fields for a new user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserPatch {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// `UPDATE` statement touching only the supplied fields, or `None`
    /// when there is nothing to set.
    pub fn update_statement(&self, id: &str) -> Option<(String, Vec<SqlParam>)> {
        let mut assignments = Vec::new();
        let mut params = Vec::new();

        for (column, value) in [("name", &self.name), ("email", &self.email)] {
            if let Some(value) = value {
                params.push(SqlParam::from(value.as_str()));
                assignments.push(format!("{} = ${}", column, params.len()));
            }
        }

        if assignments.is_empty() {
            return None;
        }

        params.push(SqlParam::from(id));
        let sql = format!(
            "UPDATE users SET {} WHERE id = ${} RETURNING *",
            assignments.join(", "),
            params.len()
        );
        Some((sql, params))
    }
}

fn first_user(output: QueryOutput) -> QueryResult<Option<User>> {
    output.into_first().map(User::try_from).transpose()
}

/// All users ordered by id
pub async fn list<S: Session>(session: &S) -> QueryResult<Vec<User>> {
    let output = session
        .execute("SELECT * FROM users ORDER BY id", &[])
        .await?;
    output.rows.into_iter().map(User::try_from).collect()
}

/// Insert a user and return the stored row
pub async fn create<S: Session>(session: &S, user: &NewUser) -> QueryResult<User> {
    let output = session
        .execute(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING *",
            &[
                SqlParam::from(user.name.as_str()),
                SqlParam::from(user.email.as_str()),
            ],
        )
        .await?;
    first_user(output)?.ok_or_else(|| QueryError::message("Insert returned no row"))
}

/// Look up one user
pub async fn find<S: Session>(session: &S, id: &str) -> QueryResult<Option<User>> {
    let output = session
        .execute("SELECT * FROM users WHERE id = $1", &[SqlParam::from(id)])
        .await?;
    first_user(output)
}

/// Apply a partial update; `None` when no row matched
pub async fn update<S: Session>(
    session: &S,
    id: &str,
    patch: &UserPatch,
) -> QueryResult<Option<User>> {
    let Some((sql, params)) = patch.update_statement(id) else {
        return find(session, id).await;
    };
    let output = session.execute(&sql, &params).await?;
    first_user(output)
}

/// Delete one user; `None` when no row matched
pub async fn delete<S: Session>(session: &S, id: &str) -> QueryResult<Option<User>> {
    let output = session
        .execute(
            "DELETE FROM users WHERE id = $1 RETURNING *",
            &[SqlParam::from(id)],
        )
        .await?;
    first_user(output)
}
