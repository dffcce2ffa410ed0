// Session authentication
//
// Username/password login. The returned token is stored on the client and
// attached to every subsequent device call. The API signals no expiry; a
// stale token only shows up as 401/403 on a later request.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::VelisClient;
use crate::error::Error;

/// Account credentials for the remote API.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Identity the mobile app presents on login. The API rejects logins
/// without it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppInfo {
    os: u8,
    app_ver: &'static str,
    app_id: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    usr: &'a str,
    pwd: &'a str,
    imp: bool,
    not_track: bool,
    app_info: AppInfo,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

impl VelisClient {
    /// Authenticate with username/password.
    ///
    /// On success the token replaces any previously held one and is also
    /// returned to the caller. Fails with [`Error::Authentication`] on a
    /// non-200 status or a response without a token.
    pub async fn login(&self, credentials: &Credentials) -> Result<SecretString, Error> {
        let url = self.url("accounts/login")?;
        debug!("logging in at {}", url);

        let body = LoginRequest {
            usr: &credentials.username,
            pwd: credentials.password.expose_secret(),
            imp: false,
            not_track: true,
            app_info: AppInfo {
                os: 2,
                app_ver: "5.6.7772.40151",
                app_id: "com.remotethermo.aristonnet",
            },
        };

        let resp = self.http().post(url).json(&body).send().await?;

        let status = resp.status();
        debug!(%status, "login response");
        if status != reqwest::StatusCode::OK {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status})"),
            });
        }

        let token = resp
            .json::<LoginResponse>()
            .await
            .ok()
            .and_then(|r| r.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: format!("login failed (HTTP {status}): no token in response"),
            })?;

        let token = SecretString::from(token);
        self.set_token(token.clone());
        debug!("login successful");
        Ok(token)
    }
}
