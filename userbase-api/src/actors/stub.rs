/// Actor stubs
///
/// A stub addresses one actor instance and speaks its JSON interface. Typed
/// stubs wrap each operation; [`Stub`] exposes the raw request path for
/// anything else (images, pass-through).
///
/// # Error Mapping
///
/// Non-2xx responses come back as [`ActorError`]s, with the callee's message
/// taken from its `{error, message}` body:
///
/// | Status | Error            |
/// |--------|------------------|
/// | 400    | `InvalidInput`   |
/// | 401    | `Unauthorized`   |
/// | 403    | `Forbidden`      |
/// | 404    | `NotFound`       |
/// | other  | `UpstreamFailure`|
///
/// # Reads Without Creation
///
/// Reads that would only return defaults from a fresh store (profile,
/// memberships, session checks, images) use [`Stub::call_existing`], so an
/// unknown id, e.g. from a forged cookie, never creates an actor.

use super::Directory;
use crate::error::{ActorError, ActorResult, ErrorResponse};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use userbase_shared::billing::BillingState;
use userbase_shared::ids::{ActorId, ActorKind};
use userbase_shared::models::image::Image;
use userbase_shared::models::index::{IndexedAccount, IndexedUser, RegisterAccount, RegisterUser};
use userbase_shared::models::member::Member;
use userbase_shared::models::membership::Membership;
use userbase_shared::models::JsonMap;

/// Largest body a stub will buffer
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Untyped stub for one actor instance
#[derive(Debug, Clone)]
pub struct Stub {
    directory: Directory,
    kind: ActorKind,
    id: ActorId,
}

impl Stub {
    pub fn new(directory: Directory, kind: ActorKind, id: ActorId) -> Self {
        Stub {
            directory,
            kind,
            id,
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Sends a request and returns the response as-is
    pub async fn send(&self, request: Request<Body>) -> ActorResult<Response> {
        self.directory.fetch(self.kind, &self.id, request).await
    }

    /// Sends a request; non-2xx statuses become errors
    pub async fn send_checked(&self, request: Request<Body>) -> ActorResult<Response> {
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Sends a JSON request and decodes the JSON response
    pub async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ActorResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = json_request(method, path, body)?;
        let response = self.send_checked(request).await?;
        self.decode(response).await
    }

    /// Like [`Stub::call`], but `None` instead of creating an absent actor
    pub async fn call_existing<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ActorResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = json_request(method, path, body)?;
        let response = match self.send_existing(request).await? {
            Some(response) => response,
            None => return Ok(None),
        };

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        self.decode(response).await.map(Some)
    }

    /// Sends a request only if the actor exists
    pub async fn send_existing(&self, request: Request<Body>) -> ActorResult<Option<Response>> {
        self.directory
            .fetch_existing(self.kind, &self.id, request)
            .await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> ActorResult<T> {
        let bytes = read_body(response).await?;

        serde_json::from_slice(&bytes).map_err(|e| {
            ActorError::UpstreamFailure(format!(
                "Invalid response from {} {}: {}",
                self.kind, self.id, e
            ))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ActorResult<T> {
        self.call::<JsonValue, T>(Method::GET, path, None).await
    }

    /// GET without creation
    async fn read<T: DeserializeOwned>(&self, path: &str) -> ActorResult<Option<T>> {
        self.call_existing::<JsonValue, T>(Method::GET, path, None)
            .await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ActorResult<T> {
        self.call(Method::POST, path, Some(body)).await
    }
}

fn json_request<B: Serialize + ?Sized>(
    method: Method,
    path: &str,
    body: Option<&B>,
) -> ActorResult<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            let encoded = serde_json::to_vec(value).map_err(|e| {
                ActorError::InvalidInput(format!("Unserializable request body: {}", e))
            })?;
            Body::from(encoded)
        }
        None => Body::empty(),
    };

    builder
        .body(body)
        .map_err(|e| ActorError::InvalidInput(format!("Invalid request: {}", e)))
}

async fn read_body(response: Response) -> ActorResult<Bytes> {
    to_bytes(response.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ActorError::UpstreamFailure(format!("Failed to read response body: {}", e)))
}

/// Converts a non-2xx actor response into an error
pub async fn error_from_response(response: Response) -> ActorError {
    let status = response.status();
    let message = match read_body(response).await {
        Ok(bytes) => match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(body) => body.message,
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        },
        Err(e) => e.to_string(),
    };

    match status {
        StatusCode::BAD_REQUEST => ActorError::InvalidInput(message),
        StatusCode::UNAUTHORIZED => ActorError::Unauthorized(message),
        StatusCode::FORBIDDEN => ActorError::Forbidden(message),
        StatusCode::NOT_FOUND => ActorError::NotFound(message),
        _ => ActorError::UpstreamFailure(message),
    }
}

/// Response of `POST /sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    pub expires_at: i64,
}

/// Response of `POST /validate-session`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionValidation {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<JsonValue>,
}

/// Response of `GET /billing`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingInfo {
    pub state: BillingState,
    pub plan_details: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct BillingUpdate {
    state: BillingState,
}

/// Stub for a user actor
#[derive(Debug, Clone)]
pub struct UserStub(Stub);

impl UserStub {
    pub fn new(directory: Directory, id: ActorId) -> Self {
        UserStub(Stub::new(directory, ActorKind::User, id))
    }

    pub fn id(&self) -> &ActorId {
        self.0.id()
    }

    pub fn raw(&self) -> &Stub {
        &self.0
    }

    /// Profile fields; empty for a user that was never written
    pub async fn get_profile(&self) -> ActorResult<JsonMap> {
        Ok(self.0.read::<JsonMap>("/profile").await?.unwrap_or_default())
    }

    pub async fn update_profile(&self, changes: &JsonMap) -> ActorResult<()> {
        self.0.post::<_, JsonValue>("/profile", changes).await.map(drop)
    }

    /// Links a provider; `credential` carries the `POST /credentials` fields
    pub async fn add_credential(&self, credential: &JsonValue) -> ActorResult<()> {
        self.0
            .post::<_, JsonValue>("/credentials", credential)
            .await
            .map(drop)
    }

    pub async fn create_session(&self, meta: Option<&JsonValue>) -> ActorResult<CreatedSession> {
        self.0.post("/sessions", &json!({ "meta": meta })).await
    }

    pub async fn delete_session(&self, session_id: &str) -> ActorResult<()> {
        self.0
            .call_existing::<_, JsonValue>(
                Method::DELETE,
                "/sessions",
                Some(&json!({ "sessionId": session_id })),
            )
            .await
            .map(drop)
    }

    /// Checks a bare session id
    ///
    /// An absent or expired session, or an unknown user, is `Ok` with
    /// `valid: false`.
    pub async fn validate_session(&self, session_id: &str) -> ActorResult<SessionValidation> {
        let body = json!({ "sessionId": session_id });
        match self
            .0
            .call_existing::<_, SessionValidation>(Method::POST, "/validate-session", Some(&body))
            .await
        {
            Ok(Some(validation)) => Ok(validation),
            Ok(None) | Err(ActorError::Unauthorized(_)) => Ok(SessionValidation::default()),
            Err(e) => Err(e),
        }
    }

    pub async fn memberships(&self) -> ActorResult<Vec<Membership>> {
        Ok(self.0.read::<Vec<Membership>>("/memberships").await?.unwrap_or_default())
    }

    pub async fn current_membership(&self) -> ActorResult<Option<Membership>> {
        Ok(self.0.read::<Option<Membership>>("/memberships/current").await?.flatten())
    }

    /// Upserts a membership; `is_current: None` keeps the stored flag
    pub async fn add_membership(
        &self,
        account_id: &ActorId,
        role: i64,
        is_current: Option<bool>,
    ) -> ActorResult<()> {
        let mut body = json!({ "account_id": account_id, "role": role });
        if let Some(is_current) = is_current {
            body["is_current"] = json!(is_current);
        }

        self.0.post::<_, JsonValue>("/memberships", &body).await.map(drop)
    }

    pub async fn delete_membership(&self, account_id: &ActorId) -> ActorResult<()> {
        self.0
            .call_existing::<_, JsonValue>(
                Method::DELETE,
                "/memberships",
                Some(&json!({ "account_id": account_id })),
            )
            .await
            .map(drop)
    }

    pub async fn switch_account(&self, account_id: &ActorId) -> ActorResult<()> {
        self.0
            .post::<_, JsonValue>("/switch-account", &json!({ "account_id": account_id }))
            .await
            .map(drop)
    }

    pub async fn store_image(&self, key: &str, bytes: Bytes, mime_type: &str) -> ActorResult<()> {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(format!("/images/{}", key))
            .header(header::CONTENT_TYPE, mime_type)
            .body(Body::from(bytes))
            .map_err(|e| ActorError::InvalidInput(format!("Invalid image request: {}", e)))?;

        self.0.send_checked(request).await.map(drop)
    }

    pub async fn get_image(&self, key: &str) -> ActorResult<Image> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("/images/{}", key))
            .body(Body::empty())
            .map_err(|e| ActorError::InvalidInput(format!("Invalid image request: {}", e)))?;

        let response = match self.0.send_existing(request).await? {
            Some(response) if response.status().is_success() => response,
            Some(response) => return Err(error_from_response(response).await),
            None => return Err(ActorError::NotFound(format!("Image not found: {}", key))),
        };
        let mime_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(userbase_shared::models::image::DEFAULT_MIME_TYPE)
            .to_string();
        let bytes = read_body(response).await?;

        Ok(Image {
            key: key.to_string(),
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

/// Stub for an account actor
#[derive(Debug, Clone)]
pub struct AccountStub(Stub);

impl AccountStub {
    pub fn new(directory: Directory, id: ActorId) -> Self {
        AccountStub(Stub::new(directory, ActorKind::Account, id))
    }

    pub fn id(&self) -> &ActorId {
        self.0.id()
    }

    pub fn raw(&self) -> &Stub {
        &self.0
    }

    /// Info fields; empty for an account that was never written
    pub async fn get_info(&self) -> ActorResult<JsonMap> {
        Ok(self.0.read::<JsonMap>("/info").await?.unwrap_or_default())
    }

    pub async fn update_info(&self, changes: &JsonMap) -> ActorResult<()> {
        self.0.post::<_, JsonValue>("/info", changes).await.map(drop)
    }

    pub async fn members(&self) -> ActorResult<Vec<Member>> {
        Ok(self.0.read::<Vec<Member>>("/members").await?.unwrap_or_default())
    }

    /// Adds a member; the account syncs the user's membership itself
    pub async fn add_member(&self, user_id: &ActorId, role: i64) -> ActorResult<()> {
        self.0
            .post::<_, JsonValue>("/members", &json!({ "user_id": user_id, "role": role }))
            .await
            .map(drop)
    }

    pub async fn remove_member(&self, user_id: &ActorId) -> ActorResult<()> {
        self.0
            .call::<JsonValue, JsonValue>(
                Method::DELETE,
                &format!("/members/{}", user_id),
                None,
            )
            .await
            .map(drop)
    }

    pub async fn billing(&self) -> ActorResult<BillingInfo> {
        self.0.get("/billing").await
    }

    /// Raw `GET /billing` body
    pub async fn billing_json(&self) -> ActorResult<JsonValue> {
        self.0.get("/billing").await
    }

    pub async fn subscribe(&self, plan_slug: &str, schedule_idx: usize) -> ActorResult<BillingState> {
        let update: BillingUpdate = self
            .0
            .post(
                "/billing/subscribe",
                &json!({ "plan_slug": plan_slug, "schedule_idx": schedule_idx }),
            )
            .await?;
        Ok(update.state)
    }

    pub async fn cancel_subscription(&self) -> ActorResult<BillingState> {
        let update: BillingUpdate = self.0.post("/billing/cancel", &json!({})).await?;
        Ok(update.state)
    }
}

/// Stub for the global system index
#[derive(Debug, Clone)]
pub struct SystemStub(Stub);

impl SystemStub {
    /// The single system instance
    pub fn new(directory: Directory) -> Self {
        SystemStub(Stub::new(directory, ActorKind::System, ActorId::system()))
    }

    pub fn raw(&self) -> &Stub {
        &self.0
    }

    pub async fn list_users(&self, query: Option<&str>) -> ActorResult<Vec<IndexedUser>> {
        self.0.get(&list_path("/users", query)?).await
    }

    pub async fn register_user(&self, user: &RegisterUser) -> ActorResult<()> {
        self.0.post::<_, JsonValue>("/users", user).await.map(drop)
    }

    /// Live profile of a user, read through the index
    pub async fn get_user(&self, id: &str) -> ActorResult<JsonValue> {
        self.0.get(&format!("/users/{}", id)).await
    }

    pub async fn update_user(&self, id: &str, changes: &JsonMap) -> ActorResult<()> {
        self.0
            .call::<_, JsonValue>(Method::PUT, &format!("/users/{}", id), Some(changes))
            .await
            .map(drop)
    }

    pub async fn list_accounts(&self, query: Option<&str>) -> ActorResult<Vec<IndexedAccount>> {
        self.0.get(&list_path("/accounts", query)?).await
    }

    pub async fn register_account(&self, account: &RegisterAccount) -> ActorResult<()> {
        self.0.post::<_, JsonValue>("/accounts", account).await.map(drop)
    }

    /// Live info and billing of an account, read through the index
    pub async fn get_account(&self, id: &str) -> ActorResult<JsonValue> {
        self.0.get(&format!("/accounts/{}", id)).await
    }

    pub async fn update_account(&self, id: &str, changes: &JsonMap) -> ActorResult<()> {
        self.0
            .call::<_, JsonValue>(Method::PUT, &format!("/accounts/{}", id), Some(changes))
            .await
            .map(drop)
    }
}

fn list_path(base: &str, query: Option<&str>) -> ActorResult<String> {
    match query.filter(|q| !q.is_empty()) {
        Some(q) => {
            let encoded = serde_urlencoded::to_string([("q", q)])
                .map_err(|e| ActorError::InvalidInput(format!("Invalid query: {}", e)))?;
            Ok(format!("{}?{}", base, encoded))
        }
        None => Ok(base.to_string()),
    }
}
