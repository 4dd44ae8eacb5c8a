use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use super::JsonBody;
use crate::api::{ApiError, AppState};
use crate::movies::{validate_movie, Movie, MovieFilters, MovieInput};
use crate::store::{DeleteOutcome, UpdateOutcome};
use crate::validator::Validator;

/// Ids are positive; anything else can never match a movie.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

async fn find_movie(state: &AppState, id: i64) -> Result<Movie, ApiError> {
    state
        .call(state.movies.get_movie(id))
        .await?
        .ok_or(ApiError::NotFound)
}

#[utoipa::path(
    get,
    path = "/v1/movies",
    params(
        ("title" = Option<String>, Query, description = "Words that must appear in the title"),
        ("genres" = Option<String>, Query, description = "Comma separated genres, all required"),
        ("page" = Option<i64>, Query, description = "1 to 10,000,000"),
        ("page_size" = Option<i64>, Query, description = "1 to 100"),
        (
            "sort" = Option<String>,
            Query,
            description = "id, title, year or runtime, prefix - for descending"
        )
    ),
    responses(
        (status = 200, description = "Page of movies with pagination metadata"),
        (status = 422, description = "Invalid filters")
    ),
    security(("bearer" = [])),
    tag = "movies"
)]
pub async fn list_movies(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = MovieFilters::from_query(&query)?;
    let (movies, metadata) = state.call(state.movies.list_movies(&filters)).await?;
    Ok(Json(json!({ "movies": movies, "metadata": metadata })))
}

#[utoipa::path(
    post,
    path = "/v1/movies",
    request_body = MovieInput,
    responses(
        (status = 201, description = "Movie created", body = Movie),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer" = [])),
    tag = "movies"
)]
pub async fn create_movie(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(input): JsonBody<MovieInput>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = input.into_new();
    let mut v = Validator::new();
    validate_movie(&mut v, &draft);
    v.finish()?;

    let movie = state.call(state.movies.insert_movie(&draft)).await?;
    info!(movie_id = movie.id, "movie created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((
        StatusCode::CREATED,
        headers,
        Json(json!({ "movie": movie })),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/movies/{id}",
    params(("id" = i64, Path, description = "Movie id")),
    responses(
        (status = 200, description = "The movie", body = Movie),
        (status = 404, description = "No such movie")
    ),
    security(("bearer" = [])),
    tag = "movies"
)]
pub async fn show_movie(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let movie = find_movie(&state, parse_id(&id)?).await?;
    Ok(Json(json!({ "movie": movie })))
}

#[utoipa::path(
    patch,
    path = "/v1/movies/{id}",
    params(("id" = i64, Path, description = "Movie id")),
    request_body = MovieInput,
    responses(
        (status = 200, description = "Movie updated", body = Movie),
        (status = 404, description = "No such movie"),
        (status = 409, description = "Edit conflict"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer" = [])),
    tag = "movies"
)]
pub async fn update_movie(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<MovieInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mut movie = find_movie(&state, parse_id(&id)?).await?;

    let draft = input.merge_into(movie.draft());
    let mut v = Validator::new();
    validate_movie(&mut v, &draft);
    v.finish()?;
    movie.apply(draft);

    match state.call(state.movies.update_movie(&movie)).await? {
        UpdateOutcome::Updated(movie) => Ok(Json(json!({ "movie": movie }))),
        UpdateOutcome::Conflict => Err(ApiError::EditConflict),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/movies/{id}",
    params(("id" = i64, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Movie deleted"),
        (status = 404, description = "No such movie")
    ),
    security(("bearer" = [])),
    tag = "movies"
)]
pub async fn delete_movie(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    match state.call(state.movies.delete_movie(id)).await? {
        DeleteOutcome::Deleted => {
            info!(movie_id = id, "movie deleted");
            Ok(Json(json!({ "message": "movie successfully deleted" })))
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert!(matches!(parse_id("42"), Ok(42)));
        for raw in ["0", "-1", "abc", ""] {
            assert!(matches!(parse_id(raw), Err(ApiError::NotFound)), "{raw}");
        }
    }
}
