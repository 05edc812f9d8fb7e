/// Credentials and endpoint configuration for a [`crate::session::SessionClient`].
///
/// Mirrors the constructor parameters of the original `QobuzClient`: a base
/// URL, an app id/secret pair used for request signing, a per-install
/// device id, and the user's login credentials.
#[derive(Debug, Clone)]
pub struct QobuzConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub device_manufacturer_id: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl QobuzConfig {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        device_manufacturer_id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            device_manufacturer_id: device_manufacturer_id.into(),
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}
