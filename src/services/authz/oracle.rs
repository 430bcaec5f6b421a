/*
 * Responsibility
 * - "Does this identity have access to every one of these resource ids?"
 * - Backed by a stored SQL function; the database decides ownership/membership
 */
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::services::auth::types::{Identity, ResourceIds};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("invalid ownership function name: {0}")]
    InvalidFunction(String),
    #[error("ownership query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Ownership oracle. Callers must treat `Err` as deny.
#[async_trait]
pub trait OwnershipOracle: Send + Sync {
    async fn has_access_to_all(
        &self,
        identity: &Identity,
        resource_ids: &ResourceIds,
    ) -> Result<bool, OracleError>;
}

/// Calls `<function>(identity text, resource_ids text[]) -> boolean`.
///
/// A NULL result counts as `false`.
#[derive(Clone, Debug)]
pub struct PgOwnershipOracle {
    pool: PgPool,
    sql: String,
}

impl PgOwnershipOracle {
    pub fn new(pool: PgPool, function: &str) -> Result<Self, OracleError> {
        if !is_sql_identifier(function) {
            return Err(OracleError::InvalidFunction(function.to_string()));
        }

        Ok(Self {
            pool,
            sql: format!("SELECT {function}($1::text, $2::text[])"),
        })
    }
}

#[async_trait]
impl OwnershipOracle for PgOwnershipOracle {
    async fn has_access_to_all(
        &self,
        identity: &Identity,
        resource_ids: &ResourceIds,
    ) -> Result<bool, OracleError> {
        let ids: Vec<String> = resource_ids.iter().cloned().collect();

        let allowed = sqlx::query_scalar::<_, Option<bool>>(&self.sql)
            .bind(identity.as_str())
            .bind(ids)
            .fetch_one(&self.pool)
            .await?;

        Ok(allowed.unwrap_or(false))
    }
}

// `name` or `schema.name`, unquoted identifiers only (the name is spliced into SQL).
fn is_sql_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_schema_qualified_names() {
        assert!(is_sql_identifier("user_owns_all"));
        assert!(is_sql_identifier("app.user_owns_all"));
        assert!(is_sql_identifier("_private1"));
    }

    #[test]
    fn rejects_anything_that_could_alter_the_query() {
        for name in [
            "",
            "1abc",
            "a.b.c",
            "owns_all(); DROP TABLE users; --",
            "owns all",
            "\"quoted\"",
            "app.",
        ] {
            assert!(!is_sql_identifier(name), "{name:?} accepted");
        }
    }

    #[tokio::test]
    async fn constructor_rejects_bad_function_name() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        assert!(matches!(
            PgOwnershipOracle::new(pool, "x; --"),
            Err(OracleError::InvalidFunction(_))
        ));
    }
}
