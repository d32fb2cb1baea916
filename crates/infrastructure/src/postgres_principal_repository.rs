use std::str::FromStr;

use async_trait::async_trait;
use sqlx::PgPool;

use otpdesk_application::PrincipalRepository;
use otpdesk_core::{AppError, AppResult, PrincipalId};
use otpdesk_domain::{EmailAddress, Principal, Role};

/// PostgreSQL implementation of the principal repository port.
#[derive(Clone)]
pub struct PostgresPrincipalRepository {
    pool: PgPool,
}

impl PostgresPrincipalRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: String,
    email: String,
    role: String,
    tags: Vec<String>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = AppError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Principal::new(
            PrincipalId::new(row.id)?,
            EmailAddress::new(row.email)?,
            Role::from_str(row.role.as_str())?,
            row.tags,
        )
    }
}

#[async_trait]
impl PrincipalRepository for PostgresPrincipalRepository {
    async fn find_principal(&self, id: &PrincipalId) -> AppResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, email, role, tags
            FROM principals
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find principal: {error}")))?;

        row.map(Principal::try_from).transpose()
    }

    async fn list_principals(&self) -> AppResult<Vec<Principal>> {
        let rows = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, email, role, tags
            FROM principals
            ORDER BY LOWER(email)
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list principals: {error}")))?;

        rows.into_iter().map(Principal::try_from).collect()
    }

    async fn save_principal(&self, principal: Principal) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO principals (id, email, role, tags)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                role = EXCLUDED.role,
                tags = EXCLUDED.tags,
                updated_at = now()
            "#,
        )
        .bind(principal.id().as_str())
        .bind(principal.email().as_str())
        .bind(principal.role().as_str())
        .bind(principal.tags().iter().cloned().collect::<Vec<String>>())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save principal: {error}")))?;

        Ok(())
    }
}
