//! In-process store for tests and `--storage memory` runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    DeleteOutcome, InsertUserOutcome, MovieBackend, PermissionBackend, TokenBackend, TokenRecord,
    UpdateOutcome, UserBackend,
};
use crate::auth::permissions::{Permissions, MOVIES_READ, MOVIES_WRITE};
use crate::auth::tokens::Scope;
use crate::auth::user::{NewUser, User};
use crate::movies::{Metadata, Movie, MovieFilters, NewMovie, SortField};

const KNOWN_PERMISSIONS: [&str; 2] = [MOVIES_READ, MOVIES_WRITE];

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tokens: HashMap<Vec<u8>, TokenRecord>,
    permissions: HashMap<i64, HashSet<String>>,
    movies: BTreeMap<i64, Movie>,
    next_user_id: i64,
    next_movie_id: i64,
}

/// Every table behind one mutex; no lock is held across an `.await`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenBackend for MemoryStore {
    async fn insert_token(&self, record: &TokenRecord) -> Result<()> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&record.user_id) {
            bail!("token owner {} does not exist", record.user_id);
        }
        tables.tokens.insert(record.hash.clone(), record.clone());
        Ok(())
    }

    async fn delete_tokens(&self, scope: Scope, user_id: i64) -> Result<()> {
        self.tables()
            .tokens
            .retain(|_, token| !(token.scope == scope && token.user_id == user_id));
        Ok(())
    }

    async fn find_user_by_token(
        &self,
        scope: Scope,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let tables = self.tables();
        let user = tables
            .tokens
            .get(hash)
            .filter(|token| token.scope == scope && token.expiry > now)
            .and_then(|token| tables.users.get(&token.user_id))
            .cloned();
        Ok(user)
    }
}

#[async_trait]
impl PermissionBackend for MemoryStore {
    async fn find_permissions_by_user(&self, user_id: i64) -> Result<Permissions> {
        let tables = self.tables();
        Ok(tables
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_permissions_for_user(&self, user_id: i64, codes: &[&str]) -> Result<()> {
        if let Some(unknown) = codes.iter().find(|code| !KNOWN_PERMISSIONS.contains(*code)) {
            bail!("unknown permission code {unknown}");
        }
        let mut tables = self.tables();
        tables
            .permissions
            .entry(user_id)
            .or_default()
            .extend(codes.iter().map(ToString::to_string));
        Ok(())
    }
}

#[async_trait]
impl UserBackend for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<InsertUserOutcome> {
        let mut tables = self.tables();
        if tables
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Ok(InsertUserOutcome::DuplicateEmail);
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            activated: user.activated,
            created_at: Utc::now(),
            version: 1,
        };
        tables.users.insert(created.id, created.clone());
        Ok(InsertUserOutcome::Created(created))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<UpdateOutcome<User>> {
        let mut tables = self.tables();
        let duplicate = tables
            .users
            .values()
            .any(|other| other.id != user.id && other.email.eq_ignore_ascii_case(&user.email));
        if duplicate {
            bail!("duplicate email on update for user {}", user.id);
        }
        match tables.users.get_mut(&user.id) {
            Some(stored) if stored.version == user.version => {
                let mut updated = user.clone();
                updated.version += 1;
                *stored = updated.clone();
                Ok(UpdateOutcome::Updated(updated))
            }
            _ => Ok(UpdateOutcome::Conflict),
        }
    }
}

#[async_trait]
impl MovieBackend for MemoryStore {
    async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie> {
        let mut tables = self.tables();
        tables.next_movie_id += 1;
        let created = Movie {
            id: tables.next_movie_id,
            created_at: Utc::now(),
            title: movie.title.clone(),
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres.clone(),
            version: 1,
        };
        tables.movies.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        Ok(self.tables().movies.get(&id).cloned())
    }

    async fn update_movie(&self, movie: &Movie) -> Result<UpdateOutcome<Movie>> {
        let mut tables = self.tables();
        match tables.movies.get_mut(&movie.id) {
            Some(stored) if stored.version == movie.version => {
                let mut updated = movie.clone();
                updated.version += 1;
                *stored = updated.clone();
                Ok(UpdateOutcome::Updated(updated))
            }
            _ => Ok(UpdateOutcome::Conflict),
        }
    }

    async fn delete_movie(&self, id: i64) -> Result<DeleteOutcome> {
        Ok(match self.tables().movies.remove(&id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn list_movies(&self, filters: &MovieFilters) -> Result<(Vec<Movie>, Metadata)> {
        let tables = self.tables();
        let mut matching: Vec<Movie> = tables
            .movies
            .values()
            .filter(|movie| title_matches(&movie.title, &filters.title))
            .filter(|movie| filters.genres.iter().all(|g| movie.genres.contains(g)))
            .cloned()
            .collect();
        drop(tables);

        matching.sort_by(|a, b| {
            let primary = match filters.sort.field {
                SortField::Id => a.id.cmp(&b.id),
                SortField::Title => a.title.cmp(&b.title),
                SortField::Year => a.year.cmp(&b.year),
                SortField::Runtime => a.runtime.cmp(&b.runtime),
            };
            let primary = if filters.sort.descending {
                primary.reverse()
            } else {
                primary
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = i64::try_from(matching.len())?;
        let offset = usize::try_from(filters.offset())?;
        let limit = usize::try_from(filters.limit())?;
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((
            page,
            Metadata::calculate(total, filters.page, filters.page_size),
        ))
    }
}

/// Every word of the query appears as a word of the title, ignoring case.
fn title_matches(title: &str, query: &str) -> bool {
    let words: HashSet<String> = title.split_whitespace().map(str::to_lowercase).collect();
    query
        .split_whitespace()
        .all(|word| words.contains(&word.to_lowercase()))
}
