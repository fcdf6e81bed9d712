use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::models::{Account, ListPayload, LoginResponse, NewTask, SignupProfile, Task, TaskPatch, TodoList};
use crate::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("request failed ({status}): {message}")]
    Request { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

const NO_BODY: Option<&serde_json::Value> = None;

pub struct ApiClient {
    http: Client,
    instance_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self::with_session(instance_url, Session::new())
    }

    pub fn with_session(instance_url: impl Into<String>, session: Session) -> Self {
        let mut instance_url = instance_url.into();
        while instance_url.ends_with('/') {
            instance_url.pop();
        }
        ApiClient {
            http: Client::new(),
            instance_url,
            session,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    // No network call; dropping the token is all a logout is.
    pub fn logout(&mut self) {
        self.session.clear();
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/auth/login", self.instance_url);
        let res = self
            .http
            .post(&url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = error_message(status, &res.text().await.unwrap_or_default());
            return Err(ApiError::Auth(message));
        }

        let body: LoginResponse = res.json().await?;
        match body.bearer_token() {
            Some(token) => {
                self.session.set_token(token);
                Ok(())
            }
            // A success response with no token is a failed login, never a
            // half-logged-in state.
            None => Err(ApiError::Auth(
                "login response carried no token".to_string(),
            )),
        }
    }

    // Creates the account only; the caller still has to log in.
    pub async fn signup(&self, profile: &SignupProfile) -> Result<Account, ApiError> {
        let url = format!("{}/api/auth/signup", self.instance_url);
        let res = self.http.post(&url).json(profile).send().await?;

        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }

        let message = error_message(status, &res.text().await.unwrap_or_default());
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            Err(ApiError::Validation(message))
        } else {
            Err(ApiError::Request {
                status: status.as_u16(),
                message,
            })
        }
    }

    // Every protected endpoint funnels through here: bearer header, JSON
    // content type, and the 401 token-eviction rule in one place.
    async fn dispatch<B: Serialize>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        // Never send a tokenless authenticated call.
        let token = self
            .session
            .token()
            .ok_or(ApiError::NotAuthenticated)?
            .to_string();

        let url = format!("{}{}", self.instance_url, path);
        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        let status = res.status();

        if status == StatusCode::UNAUTHORIZED {
            // The token is stale; drop it so it can never be retried.
            self.session.clear();
            let message = error_message(status, &res.text().await.unwrap_or_default());
            return Err(ApiError::Auth(message));
        }
        if !status.is_success() {
            let message = error_message(status, &res.text().await.unwrap_or_default());
            return Err(ApiError::Request {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res)
    }

    pub async fn authenticated_request<T: DeserializeOwned, B: Serialize>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let res = self.dispatch(method, path, body).await?;
        Ok(res.json().await?)
    }

    pub async fn lists(&mut self) -> Result<Vec<TodoList>, ApiError> {
        self.authenticated_request(Method::GET, "/api/lists", NO_BODY)
            .await
    }

    pub async fn create_list(&mut self, payload: &ListPayload) -> Result<TodoList, ApiError> {
        self.authenticated_request(Method::POST, "/api/lists", Some(payload))
            .await
    }

    pub async fn get_list(&mut self, list_id: u64) -> Result<TodoList, ApiError> {
        self.authenticated_request(Method::GET, &format!("/api/lists/{}", list_id), NO_BODY)
            .await
    }

    pub async fn update_list(
        &mut self,
        list_id: u64,
        payload: &ListPayload,
    ) -> Result<TodoList, ApiError> {
        self.authenticated_request(Method::PUT, &format!("/api/lists/{}", list_id), Some(payload))
            .await
    }

    pub async fn delete_list(&mut self, list_id: u64) -> Result<(), ApiError> {
        self.dispatch(Method::DELETE, &format!("/api/lists/{}", list_id), NO_BODY)
            .await?;
        Ok(())
    }

    pub async fn items(&mut self, list_id: u64) -> Result<Vec<Task>, ApiError> {
        self.authenticated_request(
            Method::GET,
            &format!("/api/lists/{}/items", list_id),
            NO_BODY,
        )
        .await
    }

    pub async fn create_item(&mut self, list_id: u64, item: &NewTask) -> Result<Task, ApiError> {
        self.authenticated_request(
            Method::POST,
            &format!("/api/lists/{}/items", list_id),
            Some(item),
        )
        .await
    }

    pub async fn update_item(
        &mut self,
        list_id: u64,
        item_id: u64,
        patch: &TaskPatch,
    ) -> Result<Task, ApiError> {
        self.authenticated_request(
            Method::PUT,
            &format!("/api/lists/{}/items/{}", list_id, item_id),
            Some(patch),
        )
        .await
    }

    pub async fn delete_item(&mut self, list_id: u64, item_id: u64) -> Result<(), ApiError> {
        self.dispatch(
            Method::DELETE,
            &format!("/api/lists/{}/items/{}", list_id, item_id),
            NO_BODY,
        )
        .await?;
        Ok(())
    }
}

// Prefer the server's own message; otherwise derive one from the status.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Serves one canned HTTP/1.1 response on a fresh loopback port so
    // the tests speak real HTTP without pulling in a mock crate.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn logged_in_client(instance_url: &str) -> ApiClient {
        let mut session = Session::new();
        session.set_token("tok-live".to_string());
        ApiClient::with_session(instance_url, session)
    }

    #[tokio::test]
    async fn no_token_fails_fast_without_touching_the_network() {
        // Nothing listens on this address; a sent request would surface
        // as a Network error instead.
        let mut client = ApiClient::new("http://127.0.0.1:1");
        let result: Result<Vec<TodoList>, ApiError> = client
            .authenticated_request(Method::GET, "/api/lists", NO_BODY)
            .await;
        assert!(matches!(result, Err(ApiError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn unauthorized_response_clears_the_session() {
        let url = one_shot_server("401 Unauthorized", r#"{"message":"token expired"}"#).await;
        let mut client = logged_in_client(&url);
        assert!(client.is_authenticated());

        let result = client.lists().await;
        match result {
            Err(ApiError::Auth(message)) => assert_eq!(message, "token expired"),
            other => panic!("expected Auth error, got {:?}", other.map(|_| ())),
        }
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn login_stores_the_normalized_token() {
        let url = one_shot_server("200 OK", r#"{"accessToken":"tok-9"}"#).await;
        let mut client = ApiClient::new(&url);
        client.login("sam", "hunter2A").await.unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn login_success_without_a_token_is_a_failure() {
        let url = one_shot_server("200 OK", r#"{"user":"sam"}"#).await;
        let mut client = ApiClient::new(&url);
        let result = client.login("sam", "hunter2A").await;
        assert!(matches!(result, Err(ApiError::Auth(_))));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn login_rejection_surfaces_the_server_message() {
        let url = one_shot_server("401 Unauthorized", r#"{"message":"bad credentials"}"#).await;
        let mut client = ApiClient::new(&url);
        match client.login("sam", "wrong").await {
            Err(ApiError::Auth(message)) => assert_eq!(message, "bad credentials"),
            other => panic!("expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn signup_rejection_maps_to_validation() {
        let url = one_shot_server("400 Bad Request", r#"{"message":"email is invalid"}"#).await;
        let client = ApiClient::new(&url);
        let profile = SignupProfile {
            username: "sam".to_string(),
            email: "not-an-email".to_string(),
            password: "hunter2A".to_string(),
            first_name: None,
            last_name: None,
        };
        match client.signup(&profile).await {
            Err(ApiError::Validation(message)) => assert_eq!(message, "email is invalid"),
            other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn other_failures_carry_status_and_message() {
        let url = one_shot_server("404 Not Found", r#"{"message":"list not found"}"#).await;
        let mut client = logged_in_client(&url);
        match client.get_list(42).await {
            Err(ApiError::Request { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "list not found");
            }
            other => panic!("expected Request error, got {:?}", other.map(|_| ())),
        }
        // only a 401 evicts the token
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn update_list_parses_the_saved_record() {
        let url = one_shot_server(
            "200 OK",
            r#"{
                "id": 5,
                "name": "Errands",
                "description": "weekend only",
                "itemCount": 2,
                "createdAt": "2024-05-01T09:30:00Z",
                "updatedAt": "2024-05-02T10:00:00Z"
            }"#,
        )
        .await;
        let mut client = logged_in_client(&url);
        let payload = ListPayload {
            name: "Errands".to_string(),
            description: Some("weekend only".to_string()),
        };
        let saved = client.update_list(5, &payload).await.unwrap();
        assert_eq!(saved.name, "Errands");
        assert_eq!(saved.description.as_deref(), Some("weekend only"));
        assert_eq!(saved.item_count, 2);
    }

    #[tokio::test]
    async fn items_parses_the_task_collection() {
        let url = one_shot_server(
            "200 OK",
            r#"[{
                "id": 1,
                "title": "Water the plants",
                "description": "back porch too",
                "completed": false,
                "priority": "MEDIUM",
                "dueDate": "2024-06-01T00:00:00Z",
                "createdAt": "2024-05-01T09:30:00Z",
                "updatedAt": "2024-05-01T09:30:00Z",
                "listId": 3
            }]"#,
        )
        .await;
        let mut client = logged_in_client(&url);
        let tasks = client.items(3).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Water the plants");
        assert_eq!(tasks[0].list_id, 3);
    }

    #[test]
    fn error_message_falls_back_to_the_status() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "HTTP 502"
        );
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"message":"duplicate"}"#),
            "duplicate"
        );
    }
}
