//! Movie records, their validation and list filters.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::validator::{unique, ValidationErrors, Validator};

const MAX_TITLE_BYTES: usize = 500;
const MAX_GENRES: usize = 5;
const MIN_YEAR: i32 = 1888;
const MAX_PAGE: i64 = 10_000_000;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Running time in minutes, rendered on the wire as `"<n> mins"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_suffix(" mins")
            .and_then(|minutes| minutes.parse::<i32>().ok())
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom("invalid runtime format"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub year: i32,
    #[serde(skip_serializing_if = "is_zero_runtime")]
    #[schema(value_type = String, example = "102 mins")]
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

/// Editable fields of a movie.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewMovie {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

impl Movie {
    #[must_use]
    pub fn draft(&self) -> NewMovie {
        NewMovie {
            title: self.title.clone(),
            year: self.year,
            runtime: self.runtime,
            genres: self.genres.clone(),
        }
    }

    /// Overwrite the editable fields, leaving identity and version alone.
    pub fn apply(&mut self, draft: NewMovie) {
        self.title = draft.title;
        self.year = draft.year;
        self.runtime = draft.runtime;
        self.genres = draft.genres;
    }
}

/// Body of create and partial-update requests; absent fields stay `None`.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    #[schema(value_type = Option<String>, example = "102 mins")]
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl MovieInput {
    /// Fill a draft for creation; missing fields become zero values and fail validation.
    #[must_use]
    pub fn into_new(self) -> NewMovie {
        self.merge_into(NewMovie::default())
    }

    #[must_use]
    pub fn merge_into(self, mut draft: NewMovie) -> NewMovie {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(year) = self.year {
            draft.year = year;
        }
        if let Some(runtime) = self.runtime {
            draft.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            draft.genres = genres;
        }
        draft
    }
}

pub fn validate_movie(v: &mut Validator, movie: &NewMovie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= MIN_YEAR, "year", "must be greater than 1888");
    v.check(
        movie.year <= Utc::now().year(),
        "year",
        "must not be in the future",
    );

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        unique(&movie.genres),
        "genres",
        "must not contain duplicate values",
    );
}

/// Columns a listing may be ordered by. Parsed from input, never interpolated raw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    Title,
    Year,
    Runtime,
}

impl SortField {
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Year => "year",
            Self::Runtime => "runtime",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub descending: bool,
}

impl Sort {
    /// Parse `field` or `-field` against the safelist.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (descending, name) = match value.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, value),
        };
        let field = match name {
            "id" => SortField::Id,
            "title" => SortField::Title,
            "year" => SortField::Year,
            "runtime" => SortField::Runtime,
            _ => return None,
        };
        Some(Self { field, descending })
    }

    #[must_use]
    pub const fn direction(self) -> &'static str {
        if self.descending {
            "DESC"
        } else {
            "ASC"
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieFilters {
    pub title: String,
    pub genres: Vec<String>,
    pub page: i64,
    pub page_size: i64,
    pub sort: Sort,
}

impl Default for MovieFilters {
    fn default() -> Self {
        Self {
            title: String::new(),
            genres: Vec::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: Sort::default(),
        }
    }
}

impl MovieFilters {
    /// Build filters from raw query parameters.
    ///
    /// # Errors
    /// Field errors for non-integer or out-of-range paging and unknown sort keys.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new();
        let mut filters = Self::default();

        if let Some(title) = query.get("title") {
            filters.title.clone_from(title);
        }
        if let Some(genres) = query.get("genres") {
            filters.genres = genres
                .split(',')
                .map(str::trim)
                .filter(|genre| !genre.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(page) = read_int(&mut v, query, "page") {
            filters.page = page;
        }
        if let Some(page_size) = read_int(&mut v, query, "page_size") {
            filters.page_size = page_size;
        }
        if let Some(sort) = query.get("sort") {
            match Sort::parse(sort) {
                Some(sort) => filters.sort = sort,
                None => v.add_error("sort", "invalid sort value"),
            }
        }

        v.check(filters.page > 0, "page", "must be greater than zero");
        v.check(
            filters.page <= MAX_PAGE,
            "page",
            "must be a maximum of 10 million",
        );
        v.check(filters.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            filters.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );

        v.finish().map(|()| filters)
    }

    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.page_size
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

fn read_int(v: &mut Validator, query: &HashMap<String, String>, key: &str) -> Option<i64> {
    let raw = query.get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            v.add_error(key, "must be an integer value");
            None
        }
    }
}

/// Pagination summary; empty when there are no records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub total_records: i64,
}

impl Metadata {
    #[must_use]
    pub const fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 || page_size <= 0 {
            return Self {
                current_page: 0,
                page_size: 0,
                first_page: 0,
                last_page: 0,
                total_records: 0,
            };
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero_runtime(value: &Runtime) -> bool {
    value.0 == 0
}
