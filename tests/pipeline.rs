use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::get,
    Router,
};
use governor::clock::FakeRelativeClock;
use greenlight::api::middleware::{
    self, recover::handle_panic, AdmissionController, LimiterConfig,
};
use greenlight::api::{router, AppState, Environment};
use greenlight::auth::permissions::{MOVIES_READ, MOVIES_WRITE};
use greenlight::auth::user::{hash_password, NewUser};
use greenlight::auth::{PermissionOracle, Scope, TokenStore, TokenTtls, User};
use greenlight::mail::{MailDispatcher, MailMessage, MailTemplate, Mailer};
use greenlight::store::{Backends, InsertUserOutcome, MemoryStore};
use http_body_util::BodyExt;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;

const CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)), 51000);
const UNKNOWN_TOKEN: &str = "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &MailMessage) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

struct TestApp {
    app: Router,
    backends: Backends,
    tokens: TokenStore,
    tracker: TaskTracker,
    mailer: Arc<RecordingMailer>,
}

impl TestApp {
    fn new() -> Result<Self> {
        Self::with_limiter(LimiterConfig::default())
    }

    fn with_limiter(config: LimiterConfig) -> Result<Self> {
        let backends = Backends::from_store(MemoryStore::new());
        let tokens = TokenStore::new(backends.tokens.clone());
        let tracker = TaskTracker::new();
        let mailer = Arc::new(RecordingMailer::default());
        let limiter = Arc::new(AdmissionController::with_clock(
            config,
            FakeRelativeClock::default(),
        )?);

        let state = Arc::new(AppState {
            environment: Environment::Development,
            tokens: tokens.clone(),
            permissions: PermissionOracle::new(backends.permissions.clone()),
            users: backends.users.clone(),
            movies: backends.movies.clone(),
            ttls: TokenTtls::default(),
            mail: MailDispatcher::new(mailer.clone(), tracker.clone()),
            limiter,
            store_timeout: Duration::from_secs(3),
        });
        let app = router(state, &["https://greenlight.dev".to_string()])?;

        Ok(Self {
            app,
            backends,
            tokens,
            tracker,
            mailer,
        })
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        self.send_from(CLIENT, request).await
    }

    async fn send_from(&self, peer: SocketAddr, mut request: Request<Body>) -> Result<Response> {
        request.extensions_mut().insert(ConnectInfo(peer));
        Ok(self.app.clone().oneshot(request).await?)
    }

    /// Wait for every queued mail send and return what was delivered so far.
    async fn delivered_mail(&self) -> Vec<MailMessage> {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
        self.mailer
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn insert_user(&self, email: &str, activated: bool) -> Result<User> {
        let new_user = NewUser {
            name: "Faith Smith".to_string(),
            email: email.to_string(),
            password_hash: hash_password("pa55word")?,
            activated,
        };
        match self.backends.users.insert_user(&new_user).await? {
            InsertUserOutcome::Created(user) => Ok(user),
            InsertUserOutcome::DuplicateEmail => Err(anyhow!("duplicate {email}")),
        }
    }

    async fn bearer_for(&self, user: &User) -> Result<String> {
        let token = self
            .tokens
            .issue(user.id, Duration::from_secs(3600), Scope::Authentication)
            .await?;
        Ok(token.plaintext.expose_secret().to_string())
    }
}

fn get_request(uri: &str, bearer: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

fn json_request(
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: &Value,
) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

async fn body_json(response: Response) -> Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn varies_on_authorization(response: &Response) -> bool {
    response
        .headers()
        .get_all(header::VARY)
        .iter()
        .any(|value| value == "Authorization")
}

#[tokio::test]
async fn anonymous_healthcheck() -> Result<()> {
    let app = TestApp::new()?;

    let response = app.send(get_request("/v1/healthcheck", None)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(varies_on_authorization(&response));
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("X-App"));
    let body = body_json(response).await?;
    assert_eq!(body["status"], "available");
    assert_eq!(body["system_info"]["environment"], "development");
    assert_eq!(body["system_info"]["version"], env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[tokio::test]
async fn empty_authorization_header_is_anonymous() -> Result<()> {
    let app = TestApp::new()?;

    let request = Request::builder()
        .uri("/v1/healthcheck")
        .header(header::AUTHORIZATION, "")
        .body(Body::empty())?;
    let response = app.send(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let app = TestApp::new()?;
    let mut request = get_request("/v1/healthcheck", None)?;
    request
        .headers_mut()
        .insert("x-request-id", header::HeaderValue::from_static("req-42"));

    let response = app.send(request).await?;

    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"req-42"[..])
    );
    Ok(())
}

#[tokio::test]
async fn unknown_token_is_rejected_with_challenge() -> Result<()> {
    let app = TestApp::new()?;

    let response = app
        .send(get_request("/v1/healthcheck", Some(UNKNOWN_TOKEN))?)
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .map(|v| v.as_bytes()),
        Some(&b"Bearer"[..])
    );
    assert!(varies_on_authorization(&response));
    let body = body_json(response).await?;
    assert_eq!(body["code"], "invalid_credential");
    assert_eq!(body["error"], "invalid authentication token");
    Ok(())
}

#[tokio::test]
async fn malformed_credentials_are_rejected() -> Result<()> {
    let app = TestApp::new()?;

    for header_value in ["Basic Zm9vOmJhcg==", "Bearer", "Bearer short", "Bearer a b"] {
        let request = Request::builder()
            .uri("/v1/healthcheck")
            .header(header::AUTHORIZATION, header_value)
            .body(Body::empty())?;
        let response = app.send(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{header_value}");
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        let body = body_json(response).await?;
        assert_eq!(body["code"], "invalid_credential_format", "{header_value}");
    }
    Ok(())
}

#[tokio::test]
async fn token_from_another_scope_is_not_a_credential() -> Result<()> {
    let app = TestApp::new()?;
    let user = app.insert_user("scoped@example.com", true).await?;
    let activation = app
        .tokens
        .issue(user.id, Duration::from_secs(3600), Scope::Activation)
        .await?;

    let response = app
        .send(get_request(
            "/v1/movies",
            Some(activation.plaintext.expose_secret()),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "invalid_credential");
    Ok(())
}

#[tokio::test]
async fn anonymous_request_to_gated_route_requires_authentication() -> Result<()> {
    let app = TestApp::new()?;

    let response = app.send(get_request("/v1/movies", None)?).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "authentication_required");
    Ok(())
}

#[tokio::test]
async fn unactivated_user_is_stopped_before_permissions() -> Result<()> {
    let app = TestApp::new()?;
    let user = app.insert_user("pending@example.com", false).await?;
    let token = app.bearer_for(&user).await?;

    let response = app.send(get_request("/v1/movies", Some(&token))?).await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "account_not_activated");
    Ok(())
}

#[tokio::test]
async fn read_only_user_cannot_create_movies() -> Result<()> {
    let app = TestApp::new()?;
    let user = app.insert_user("reader@example.com", true).await?;
    app.backends
        .permissions
        .add_permissions_for_user(user.id, &[MOVIES_READ])
        .await?;
    let token = app.bearer_for(&user).await?;

    let listed = app.send(get_request("/v1/movies", Some(&token))?).await?;
    assert_eq!(listed.status(), StatusCode::OK);

    let movie = json!({
        "title": "Moana",
        "year": 2016,
        "runtime": "107 mins",
        "genres": ["animation"],
    });
    let response = app
        .send(json_request("POST", "/v1/movies", Some(&token), &movie)?)
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "forbidden");
    assert_eq!(
        body["error"],
        "your user account doesn't have the necessary permissions to access this resource"
    );
    Ok(())
}

#[tokio::test]
async fn burst_is_exhausted_at_request_1001() -> Result<()> {
    let app = TestApp::with_limiter(LimiterConfig::new().with_rps(50.0).with_burst(1000))?;

    for n in 1..=1000 {
        let response = app.send(get_request("/v1/healthcheck", None)?).await?;
        assert_eq!(response.status(), StatusCode::OK, "request {n}");
    }

    let response = app.send(get_request("/v1/healthcheck", None)?).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "too_many_requests");

    let other = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 11)), 51000);
    let response = app
        .send_from(other, get_request("/v1/healthcheck", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn rejected_clients_never_reach_authentication() -> Result<()> {
    let app = TestApp::with_limiter(LimiterConfig::new().with_rps(1.0).with_burst(1))?;

    let first = app
        .send(get_request("/v1/healthcheck", Some(UNKNOWN_TOKEN))?)
        .await?;
    assert_eq!(first.status(), StatusCode::FORBIDDEN);

    let second = app
        .send(get_request("/v1/healthcheck", Some(UNKNOWN_TOKEN))?)
        .await?;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn disabled_limiter_admits_everything() -> Result<()> {
    let app = TestApp::with_limiter(
        LimiterConfig::new()
            .with_enabled(false)
            .with_rps(1.0)
            .with_burst(1),
    )?;

    for _ in 0..5 {
        let response = app.send(get_request("/v1/healthcheck", None)?).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }
    Ok(())
}

#[tokio::test]
async fn signup_activation_and_movie_lifecycle() -> Result<()> {
    let app = TestApp::new()?;

    let signup = json!({
        "name": "Alice Smith",
        "email": "alice@example.com",
        "password": "pa55word",
    });
    let response = app
        .send(json_request("POST", "/v1/users", None, &signup)?)
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await?;
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["activated"], false);
    assert!(body["user"].get("password_hash").is_none());

    let duplicate = app
        .send(json_request("POST", "/v1/users", None, &signup)?)
        .await?;
    assert_eq!(duplicate.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(duplicate).await?;
    assert_eq!(
        body["error"]["email"],
        "a user with this email address already exists"
    );

    let mail = app.delivered_mail().await;
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].to, "alice@example.com");
    assert_eq!(mail[0].template, MailTemplate::UserWelcome);
    let activation_token = mail[0].data["activationToken"]
        .as_str()
        .ok_or_else(|| anyhow!("welcome mail without activation token"))?
        .to_string();

    let credentials = json!({"email": "alice@example.com", "password": "pa55word"});
    let response = app
        .send(json_request("POST", "/v1/tokens/authentication", None, &credentials)?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    let bearer = body["authentication_token"]["token"]
        .as_str()
        .ok_or_else(|| anyhow!("missing authentication token"))?
        .to_string();

    let response = app.send(get_request("/v1/movies", Some(&bearer))?).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await?["code"], "account_not_activated");

    let response = app
        .send(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            &json!({ "token": activation_token }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["user"]["activated"], true);

    let replay = app
        .send(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            &json!({ "token": activation_token }),
        )?)
        .await?;
    assert_eq!(replay.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(replay).await?["error"]["token"],
        "invalid or expired activation token"
    );

    let response = app.send(get_request("/v1/movies", Some(&bearer))?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["movies"], json!([]));

    let user = app
        .backends
        .users
        .find_user_by_email("alice@example.com")
        .await?
        .ok_or_else(|| anyhow!("user vanished"))?;
    app.backends
        .permissions
        .add_permissions_for_user(user.id, &[MOVIES_WRITE])
        .await?;

    let movie = json!({
        "title": "Moana",
        "year": 2016,
        "runtime": "107 mins",
        "genres": ["animation", "adventure"],
    });
    let response = app
        .send(json_request("POST", "/v1/movies", Some(&bearer), &movie)?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("missing location"))?;
    let body = body_json(response).await?;
    assert_eq!(body["movie"]["runtime"], "107 mins");
    assert_eq!(body["movie"]["version"], 1);

    let response = app
        .send(json_request(
            "PATCH",
            &location,
            Some(&bearer),
            &json!({"year": 2017}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["movie"]["year"], 2017);
    assert_eq!(body["movie"]["title"], "Moana");
    assert_eq!(body["movie"]["version"], 2);

    let response = app
        .send(get_request("/v1/movies?title=moana&sort=-year", Some(&bearer))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["metadata"]["total_records"], 1);

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(&location)
                .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get_request(&location, Some(&bearer))?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() -> Result<()> {
    let app = TestApp::new()?;
    app.insert_user("bob@example.com", true).await?;

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({"email": "bob@example.com", "password": "not-the-password"}),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    let body = body_json(response).await?;
    assert_eq!(body["code"], "invalid_credentials");
    assert_eq!(body["error"], "invalid credentials");

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({"email": "nobody@example.com", "password": "pa55word"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn password_reset_flow() -> Result<()> {
    let app = TestApp::new()?;
    app.insert_user("carol@example.com", true).await?;

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/password-reset",
            None,
            &json!({"email": "carol@example.com"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let mail = app.delivered_mail().await;
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].template, MailTemplate::TokenPasswordReset);
    let reset_token = mail[0].data["passwordResetToken"]
        .as_str()
        .ok_or_else(|| anyhow!("reset mail without token"))?
        .to_string();

    let response = app
        .send(json_request(
            "PUT",
            "/v1/users/password",
            None,
            &json!({"password": "new-pa55word", "token": reset_token}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(json_request(
            "POST",
            "/v1/tokens/authentication",
            None,
            &json!({"email": "carol@example.com", "password": "new-pa55word"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_methods_answer_json() -> Result<()> {
    let app = TestApp::new()?;

    let response = app.send(get_request("/v1/nowhere", None)?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["code"], "not_found");

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/v1/healthcheck")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await?["code"], "method_not_allowed");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method("POST")
        .uri("/v1/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))?;

    let response = app.send(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["code"], "bad_request");
    Ok(())
}

#[tokio::test]
async fn missing_peer_address_is_an_internal_error() -> Result<()> {
    let app = TestApp::new()?;

    let response = app
        .app
        .clone()
        .oneshot(get_request("/v1/healthcheck", None)?)
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn activation_gate_on_its_own() -> Result<()> {
    let app = TestApp::new()?;
    let pending = app.insert_user("gate-pending@example.com", false).await?;
    let active = app.insert_user("gate-active@example.com", true).await?;

    let gated = Router::new()
        .route("/activated-only", get(|| async { "ok" }))
        .route_layer(from_fn(middleware::require_activated))
        .layer(from_fn_with_state(
            app.tokens.clone(),
            middleware::authenticate,
        ));

    let anonymous = gated
        .clone()
        .oneshot(get_request("/activated-only", None)?)
        .await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let token = app.bearer_for(&pending).await?;
    let response = gated
        .clone()
        .oneshot(get_request("/activated-only", Some(&token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.bearer_for(&active).await?;
    let response = gated
        .oneshot(get_request("/activated-only", Some(&token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn authentication_gate_on_its_own() -> Result<()> {
    let app = TestApp::new()?;
    let pending = app.insert_user("auth-only@example.com", false).await?;

    let gated = Router::new()
        .route("/me", get(|| async { "ok" }))
        .route_layer(from_fn(middleware::require_authenticated))
        .layer(from_fn_with_state(
            app.tokens.clone(),
            middleware::authenticate,
        ));

    let response = gated.clone().oneshot(get_request("/me", None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = app.bearer_for(&pending).await?;
    let response = gated.oneshot(get_request("/me", Some(&token))?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn handler_panic_becomes_generic_500() -> Result<()> {
    let app = Router::new()
        .route(
            "/boom",
            get(|| async {
                if true {
                    panic!("invariant broken: secret detail");
                }
                "unreachable"
            }),
        )
        .layer(CatchPanicLayer::custom(handle_panic));

    let response = app.clone().oneshot(get_request("/boom", None)?).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get(header::CONNECTION).map(|v| v.as_bytes()),
        Some(&b"close"[..])
    );
    let body = body_json(response).await?;
    assert_eq!(body["code"], "internal_error");
    assert!(!body.to_string().contains("secret detail"));

    let again = app.oneshot(get_request("/boom", None)?).await?;
    assert_eq!(again.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn cors_preflight_for_trusted_origin() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/v1/movies")
        .header(header::ORIGIN, "https://greenlight.dev")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .body(Body::empty())?;

    let response = app.send(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.as_bytes()),
        Some(&b"https://greenlight.dev"[..])
    );
    Ok(())
}
