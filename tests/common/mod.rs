#![allow(dead_code)]

use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

use jobboard::auth::{hash_password, TokenService};
use jobboard::configuration::{
    ApplicationSettings, DatabaseSettings, JwtSettings, LifecycleSettings, Settings, StoreBackend,
};
use jobboard::domain::{NewUser, Role};
use jobboard::lifecycle::ZeroMatchPolicy;
use jobboard::startup::run;
use jobboard::store::{InMemoryStore, JobBoardStore};

pub const PASSWORD: &str = "Password123";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub tokens: TokenService,
    pub client: reqwest::Client,
}

/// Tokens handed out by a login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: Value,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    pub fn id(&self) -> String {
        self.user["id"].as_str().unwrap().to_string()
    }
}

fn settings(policy: ZeroMatchPolicy) -> Settings {
    Settings {
        database: DatabaseSettings {
            backend: StoreBackend::Memory,
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "jobboard".to_string(),
            max_connections: 1,
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        jwt: JwtSettings {
            access_secret: "integration-access-secret".to_string(),
            refresh_secret: "integration-refresh-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 86400,
            issuer: "jobboard-test".to_string(),
        },
        lifecycle: LifecycleSettings {
            zero_match_policy: policy,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_policy(ZeroMatchPolicy::RollBack).await
}

pub async fn spawn_app_with_policy(policy: ZeroMatchPolicy) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let settings = settings(policy);
    let tokens = TokenService::new(&settings.jwt);
    let store = Arc::new(InMemoryStore::new());

    let server = run(listener, store.clone(), settings).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        tokens,
        client: reqwest::Client::new(),
    }
}

/// Value of the `refresh_token` cookie set by a response, if any.
pub fn refresh_cookie_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|h| h.starts_with("refresh_token="))
        .map(|h| {
            h.trim_start_matches("refresh_token=")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

pub fn access_header_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, role: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/register"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
                "role": role,
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(&self, username: &str) -> Session {
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16(), "login failed for {}", username);

        let access_token = access_header_of(response.headers()).expect("Missing access token");
        let refresh_token =
            refresh_cookie_of(response.headers()).expect("Missing refresh token cookie");
        let body: Value = response.json().await.expect("Failed to parse response");

        Session {
            user: body["user"].clone(),
            access_token,
            refresh_token,
        }
    }

    pub async fn signed_up(&self, username: &str, role: &str) -> Session {
        let response = self.register(username, role).await;
        assert_eq!(201, response.status().as_u16(), "register failed for {}", username);
        self.login(username).await
    }

    /// Administrators cannot self-register; they are seeded in the store.
    pub async fn admin(&self, username: &str) -> Session {
        self.store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: hash_password(PASSWORD).expect("Failed to hash password"),
                role: Role::Admin,
            })
            .await
            .expect("Failed to seed admin");
        self.login(username).await
    }

    /// A COMPANY user owning one company with one open job post.
    /// Returns the session and the job post id.
    pub async fn company_with_post(&self, username: &str) -> (Session, String) {
        let session = self.signed_up(username, "COMPANY").await;

        let response = self
            .post_as(
                &session,
                "/api/companies/addOwnCompany",
                json!({ "name": format!("{}Inc", username), "description": "We hire." }),
            )
            .await;
        assert_eq!(201, response.status().as_u16());

        let response = self
            .post_as(
                &session,
                "/api/jobPosts/addOwnJobPost",
                json!({
                    "title": "Rust Engineer",
                    "description": "Write services",
                    "location": "Berlin",
                    "salary": 5000,
                    "experience": "Mid",
                    "type": "Remote"
                }),
            )
            .await;
        assert_eq!(201, response.status().as_u16());
        let post: Value = response.json().await.unwrap();

        (session, post["id"].as_str().unwrap().to_string())
    }

    pub async fn apply(&self, session: &Session, job_post_id: &str) -> reqwest::Response {
        self.post_as(
            session,
            "/api/applications/applyAsUser",
            json!({ "jobPostId": job_post_id }),
        )
        .await
    }

    pub async fn get_as(&self, session: &Session, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(AUTHORIZATION, &session.access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_as(&self, session: &Session, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(AUTHORIZATION, &session.access_token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_as(&self, session: &Session, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .header(AUTHORIZATION, &session.access_token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete_as(&self, session: &Session, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .header(AUTHORIZATION, &session.access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// GET with only the session cookie, as a browser with a stale header would.
    pub async fn get_with_cookie(
        &self,
        path: &str,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .get(self.url(path))
            .header(COOKIE, format!("refresh_token={}", refresh_token));
        if let Some(token) = access_token {
            request = request.header(AUTHORIZATION, token);
        }
        request.send().await.expect("Failed to execute request.")
    }
}

pub async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse error body");
    body["code"].as_str().unwrap_or_default().to_string()
}
