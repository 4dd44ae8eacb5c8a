//! `PostgreSQL` store.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};
use tracing::Instrument;

use super::{
    DeleteOutcome, InsertUserOutcome, MovieBackend, PermissionBackend, TokenBackend, TokenRecord,
    UpdateOutcome, UserBackend,
};
use crate::auth::permissions::Permissions;
use crate::auth::tokens::Scope;
use crate::auth::user::{NewUser, User};
use crate::movies::{Metadata, Movie, MovieFilters, NewMovie, Runtime};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const USER_COLUMNS: &str = "users.id, users.name, users.email::text AS email, \
    users.password_hash, users.activated, users.created_at, users.version";

#[derive(Clone, Debug)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 25,
            idle_timeout: Duration::from_secs(15 * 60),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool and verify the database answers.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be created within the connect timeout.
    pub async fn connect(dsn: &SecretString, options: &PoolOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .idle_timeout(options.idle_timeout)
            .acquire_timeout(options.connect_timeout)
            .connect(dsn.expose_secret())
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    /// Create tables and seed permission codes if missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DDL",
            db.statement = "sql/schema.sql"
        );
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to apply schema")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn query_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        activated: row.get("activated"),
        created_at: row.get("created_at"),
        version: row.get("version"),
    }
}

fn movie_from_row(row: &PgRow) -> Movie {
    Movie {
        id: row.get("id"),
        created_at: row.get("created_at"),
        title: row.get("title"),
        year: row.get("year"),
        runtime: Runtime(row.get("runtime")),
        genres: row.get("genres"),
        version: row.get("version"),
    }
}

#[async_trait]
impl TokenBackend for PgStore {
    async fn insert_token(&self, record: &TokenRecord) -> Result<()> {
        let query = r"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
        ";
        sqlx::query(query)
            .bind(&record.hash)
            .bind(record.user_id)
            .bind(record.expiry)
            .bind(record.scope.as_str())
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert token")?;
        Ok(())
    }

    async fn delete_tokens(&self, scope: Scope, user_id: i64) -> Result<()> {
        let query = "DELETE FROM tokens WHERE scope = $1 AND user_id = $2";
        sqlx::query(query)
            .bind(scope.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete tokens")?;
        Ok(())
    }

    async fn find_user_by_token(
        &self,
        scope: Scope,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let query = format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
            AND tokens.scope = $2
            AND tokens.expiry > $3
            "
        );
        let row = sqlx::query(&query)
            .bind(hash)
            .bind(scope.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by token")?;
        Ok(row.as_ref().map(user_from_row))
    }
}

#[async_trait]
impl PermissionBackend for PgStore {
    async fn find_permissions_by_user(&self, user_id: i64) -> Result<Permissions> {
        let query = r"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            WHERE users_permissions.user_id = $1
        ";
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup permissions")?;
        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("code"))
            .collect())
    }

    async fn add_permissions_for_user(&self, user_id: i64, codes: &[&str]) -> Result<()> {
        let query = r"
            INSERT INTO users_permissions
            SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
            ON CONFLICT DO NOTHING
        ";
        let requested = codes.len();
        let codes: Vec<String> = codes.iter().map(ToString::to_string).collect();
        let span = query_span("INSERT", query);
        let mut tx = self.pool.begin().await.context("begin permission grant")?;

        let known: i64 = sqlx::query_scalar("SELECT count(*) FROM permissions WHERE code = ANY($1)")
            .bind(&codes)
            .fetch_one(&mut *tx)
            .instrument(span.clone())
            .await
            .context("failed to check permission codes")?;
        if usize::try_from(known).unwrap_or_default() != requested {
            anyhow::bail!("unknown permission code in {codes:?}");
        }

        sqlx::query(query)
            .bind(user_id)
            .bind(&codes)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to grant permissions")?;
        tx.commit().await.context("commit permission grant")?;
        Ok(())
    }
}

#[async_trait]
impl UserBackend for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<InsertUserOutcome> {
        let query = r"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
        ";
        let row = sqlx::query(query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(InsertUserOutcome::Created(User {
                id: row.get("id"),
                name: user.name.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                activated: user.activated,
                created_at: row.get("created_at"),
                version: row.get("version"),
            })),
            Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::DuplicateEmail),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1::citext");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by email")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn update_user(&self, user: &User) -> Result<UpdateOutcome<User>> {
        let query = r"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        ";
        let row = sqlx::query(query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update user")?;

        Ok(match row {
            Some(row) => {
                let mut updated = user.clone();
                updated.version = row.get("version");
                UpdateOutcome::Updated(updated)
            }
            None => UpdateOutcome::Conflict,
        })
    }
}

#[async_trait]
impl MovieBackend for PgStore {
    async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie> {
        let query = r"
            INSERT INTO movies (title, year, runtime, genres)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
        ";
        let row = sqlx::query(query)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.0)
            .bind(&movie.genres)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert movie")?;

        Ok(Movie {
            id: row.get("id"),
            created_at: row.get("created_at"),
            title: movie.title.clone(),
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres.clone(),
            version: row.get("version"),
        })
    }

    async fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        let query = r"
            SELECT id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to get movie")?;
        Ok(row.as_ref().map(movie_from_row))
    }

    async fn update_movie(&self, movie: &Movie) -> Result<UpdateOutcome<Movie>> {
        let query = r"
            UPDATE movies
            SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        ";
        let row = sqlx::query(query)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.0)
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update movie")?;

        Ok(match row {
            Some(row) => {
                let mut updated = movie.clone();
                updated.version = row.get("version");
                UpdateOutcome::Updated(updated)
            }
            None => UpdateOutcome::Conflict,
        })
    }

    async fn delete_movie(&self, id: i64) -> Result<DeleteOutcome> {
        let query = "DELETE FROM movies WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete movie")?;
        Ok(if result.rows_affected() == 0 {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted
        })
    }

    async fn list_movies(&self, filters: &MovieFilters) -> Result<(Vec<Movie>, Metadata)> {
        // Column and direction come from the sort safelist, never from raw input.
        let query = format!(
            r"
            SELECT count(*) OVER() AS total, id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {} {}, id ASC
            LIMIT $3 OFFSET $4
            ",
            filters.sort.field.column(),
            filters.sort.direction()
        );
        let rows = sqlx::query(&query)
            .bind(&filters.title)
            .bind(&filters.genres)
            .bind(filters.limit())
            .bind(filters.offset())
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list movies")?;

        let total = rows.first().map_or(0, |row| row.get::<i64, _>("total"));
        let movies = rows.iter().map(movie_from_row).collect();
        Ok((
            movies,
            Metadata::calculate(total, filters.page, filters.page_size),
        ))
    }
}
