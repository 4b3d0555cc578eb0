/// Login completion
///
/// Turns an identity already verified by an OAuth provider into a user actor
/// with a fresh session. The token exchange and profile download happen
/// elsewhere; this module starts from their result, a [`ProviderLogin`].
///
/// # Steps
///
/// 1. The user actor id is derived from `"<provider>:<subject_id>"`, so the
///    same provider identity always lands on the same actor.
/// 2. The profile picture is downloaded and stored as the `avatar` image, and
///    `picture` is rewritten to the boundary's avatar route.
/// 3. The provider icon, if any, is stored as the `provider-icon` image.
/// 4. The credential is stored.
/// 5. Profile fields still absent from the user's profile (`name`, `email`,
///    `picture`, `provider`) are seeded from the provider profile. Fields
///    already present, e.g. edited through the system index, are kept.
/// 6. The user is registered in the system index.
/// 7. A first login gets a personal account with the user as admin.
/// 8. A session is created.
///
/// Steps 4 and 8 decide the outcome. The others are best-effort: their
/// failures are logged and the login goes on.
///
/// # Example
///
/// ```no_run
/// use userbase_api::app::AppState;
/// use userbase_api::login::{complete_login, LoginOptions, ProviderLogin};
///
/// # async fn example(state: AppState) -> userbase_api::error::ActorResult<()> {
/// let login = ProviderLogin::new("google", "10769150350006150715113082367");
/// let options = LoginOptions::from_state(&state);
/// let outcome = complete_login(&state.directory, login, &options).await?;
/// println!("Set-Cookie: {}", outcome.cookie.set_cookie_header(true));
/// # Ok(())
/// # }
/// ```

use crate::actors::stub::{AccountStub, CreatedSession, SystemStub, UserStub};
use crate::actors::Directory;
use crate::app::AppState;
use crate::error::{ActorError, ActorResult};
use axum::body::Bytes;
use axum::http::header;
use serde_json::{json, Value as JsonValue};
use userbase_shared::auth::SessionCookie;
use userbase_shared::ids::ActorId;
use userbase_shared::models::image::{AVATAR_KEY, PROVIDER_ICON_KEY};
use userbase_shared::models::index::{RegisterAccount, RegisterUser};
use userbase_shared::models::{JsonMap, ROLE_ADMIN};

/// Fallback type of a downloaded avatar
const AVATAR_MIME_TYPE: &str = "image/jpeg";

const PROVIDER_ICON_MIME_TYPE: &str = "image/svg+xml";

/// Identity verified by an OAuth provider
#[derive(Debug, Clone, Default)]
pub struct ProviderLogin {
    /// Provider name, e.g. `google`
    pub provider: String,

    /// The provider's id for the user
    pub subject_id: String,

    pub access_token: Option<String>,
    pub refresh_token: Option<String>,

    /// Token expiry, epoch milliseconds
    pub expires_at: Option<i64>,

    pub scope: Option<String>,

    /// Profile as returned by the provider (`name`, `email`, `picture`, ...)
    pub profile: JsonMap,

    /// Provider icon to show next to the user
    pub provider_icon_svg: Option<String>,
}

impl ProviderLogin {
    pub fn new(provider: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }
}

/// Profile fields seeded from the provider profile
const SEEDED_PROFILE_KEYS: &[&str] = &["name", "email", "picture", "provider"];

/// Settings for [`complete_login`]
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Mount point of the boundary routes, e.g. `/users`
    pub users_path: String,

    /// Client used for avatar downloads; should carry a timeout
    pub http: reqwest::Client,
}

impl LoginOptions {
    /// Options of a running boundary: its users path and its avatar client,
    /// which carries the configured fetch timeout
    pub fn from_state(state: &AppState) -> Self {
        Self {
            users_path: state.config.users.path.clone(),
            http: state.http.clone(),
        }
    }
}

/// Result of a completed login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: ActorId,
    pub session: CreatedSession,

    /// Cookie identifying the new session
    pub cookie: SessionCookie,

    /// Personal account created by this login, if it was the first one
    pub personal_account: Option<ActorId>,
}

/// Completes a provider login
///
/// # Errors
///
/// - [`ActorError::InvalidInput`] if the provider or subject id is empty
/// - Any failure storing the credential or creating the session
pub async fn complete_login(
    directory: &Directory,
    login: ProviderLogin,
    options: &LoginOptions,
) -> ActorResult<LoginOutcome> {
    if login.provider.is_empty() || login.subject_id.is_empty() {
        return Err(ActorError::InvalidInput(
            "Missing provider or subject_id".to_string(),
        ));
    }

    let user_id = ActorId::from_name(&format!("{}:{}", login.provider, login.subject_id));
    let user = UserStub::new(directory.clone(), user_id.clone());
    let mut profile = login.profile;

    if let Some(picture) = profile.get("picture").and_then(JsonValue::as_str).map(str::to_string) {
        match store_avatar(&user, &options.http, &picture).await {
            Ok(()) => {
                profile.insert(
                    "picture".to_string(),
                    json!(format!("{}/me/avatar", options.users_path)),
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, picture = %picture, error = %e, "Failed to fetch avatar");
            }
        }
    }

    if let Some(svg) = login.provider_icon_svg {
        match user
            .store_image(PROVIDER_ICON_KEY, Bytes::from(svg), PROVIDER_ICON_MIME_TYPE)
            .await
        {
            Ok(()) => {
                profile.insert(
                    "provider_icon".to_string(),
                    json!(format!("{}/me/provider-icon", options.users_path)),
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to store provider icon");
            }
        }
    }

    user.add_credential(&json!({
        "provider": login.provider,
        "subject_id": login.subject_id,
        "access_token": login.access_token,
        "refresh_token": login.refresh_token,
        "expires_at": login.expires_at,
        "scope": login.scope,
        "profile_data": profile,
    }))
    .await?;

    if let Err(e) = seed_profile(&user, &profile, &login.provider).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to seed profile");
    }

    let system = SystemStub::new(directory.clone());
    let registration = RegisterUser {
        id: user_id.to_string(),
        name: profile_string(&profile, "name"),
        email: profile_string(&profile, "email"),
        provider: Some(login.provider.clone()),
    };
    if let Err(e) = system.register_user(&registration).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to register user in index");
    }

    let personal_account = match provision_personal_account(directory, &user, &profile).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to provision personal account");
            None
        }
    };

    let session = user.create_session(None).await?;
    let cookie = SessionCookie::new(session.session_id.clone(), user_id.clone());

    tracing::info!(
        user_id = %user_id,
        provider = %login.provider,
        personal_account = ?personal_account,
        "Login completed"
    );

    Ok(LoginOutcome {
        user_id,
        session,
        cookie,
        personal_account,
    })
}

async fn store_avatar(user: &UserStub, http: &reqwest::Client, url: &str) -> anyhow::Result<()> {
    let response = http.get(url).send().await?.error_for_status()?;

    let mime_type = response
        .headers()
        .get(header::CONTENT_TYPE.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or(AVATAR_MIME_TYPE)
        .to_string();
    let bytes = response.bytes().await?;

    user.store_image(AVATAR_KEY, bytes, &mime_type).await?;
    Ok(())
}

/// Writes the seeded fields the stored profile does not have yet
async fn seed_profile(user: &UserStub, profile: &JsonMap, provider: &str) -> ActorResult<()> {
    let stored = user.get_profile().await?;

    let mut seed = JsonMap::new();
    for key in SEEDED_PROFILE_KEYS {
        if stored.contains_key(*key) {
            continue;
        }
        let value = match *key {
            "provider" => Some(json!(provider)),
            _ => profile.get(*key).filter(|v| v.is_string()).cloned(),
        };
        if let Some(value) = value {
            seed.insert(key.to_string(), value);
        }
    }

    if seed.is_empty() {
        return Ok(());
    }

    tracing::debug!(user_id = %user.id(), keys = seed.len(), "Seeding profile");
    user.update_profile(&seed).await
}

/// Creates an account owned by the user if the user has none
///
/// # Returns
///
/// The new account's id, `None` if the user already had an account
async fn provision_personal_account(
    directory: &Directory,
    user: &UserStub,
    profile: &JsonMap,
) -> ActorResult<Option<ActorId>> {
    if !user.memberships().await?.is_empty() {
        return Ok(None);
    }

    let account_id = ActorId::new_unique();
    let account = AccountStub::new(directory.clone(), account_id.clone());
    let name = format!(
        "{}'s account",
        profile_string(profile, "name").unwrap_or_else(|| "User".to_string())
    );

    let mut info = JsonMap::new();
    info.insert("name".to_string(), json!(name));
    info.insert("personal".to_string(), json!(true));
    account.update_info(&info).await?;

    // The account syncs the membership to the user
    account.add_member(user.id(), ROLE_ADMIN).await?;
    user.switch_account(&account_id).await?;

    let system = SystemStub::new(directory.clone());
    let registration = RegisterAccount {
        id: account_id.to_string(),
        name: Some(name),
        ..RegisterAccount::default()
    };
    if let Err(e) = system.register_account(&registration).await {
        tracing::warn!(account_id = %account_id, error = %e, "Failed to register account in index");
    }

    tracing::info!(user_id = %user.id(), account_id = %account_id, "Personal account created");
    Ok(Some(account_id))
}

fn profile_string(profile: &JsonMap, key: &str) -> Option<String> {
    profile.get(key).and_then(JsonValue::as_str).map(str::to_string)
}
