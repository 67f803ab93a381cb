//! Process-wide auth configuration: the admin allow-list, the optional local
//! fallback administrator and the site URL used for OAuth return targets.
//! Built once by the CLI layer and passed by reference; nothing here reads the
//! environment.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use url::Url;

/// Path users land on after a federated sign-in completes.
pub const CLIENT_AREA_PATH: &str = "/espace-client";

/// Path of the sign-in entry point.
pub const SIGN_IN_PATH: &str = "/connexion";

/// Trim and lower-case an email so every comparison sees the same form.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lower-cased administrator emails, in configuration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: Vec<String>,
}

impl AdminAllowList {
    /// Parse a comma-separated list. Entries are trimmed and lower-cased,
    /// empty entries and duplicates are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut emails: Vec<String> = Vec::new();
        for entry in raw.split(',').map(normalize_email) {
            if !entry.is_empty() && !emails.contains(&entry) {
                emails.push(entry);
            }
        }
        Self { emails }
    }

    /// Membership test; the candidate is normalized first.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.emails.iter().any(|entry| *entry == email)
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }
}

/// Locally configured administrator credential.
///
/// Only constructed through [`FallbackAdmin::from_config`], which refuses to
/// build one unless both an allow-listed email and a non-empty password exist.
#[derive(Clone)]
pub struct FallbackAdmin {
    email: String,
    password: SecretString,
}

impl FallbackAdmin {
    /// The first allow-listed email becomes the fallback identity.
    #[must_use]
    pub fn from_config(admins: &AdminAllowList, password: Option<&str>) -> Option<Self> {
        let email = admins.first()?;
        let password = password.map(str::trim).filter(|p| !p.is_empty())?;

        Some(Self {
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
        })
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Exact match on an already normalized email and the raw password.
    #[must_use]
    pub fn matches(&self, normalized_email: &str, password: &str) -> bool {
        self.email == normalized_email && self.password.expose_secret() == password
    }
}

impl fmt::Debug for FallbackAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackAdmin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    admins: AdminAllowList,
    fallback: Option<FallbackAdmin>,
    site_url: Url,
}

impl AuthConfig {
    #[must_use]
    pub fn new(admin_emails: &str, admin_password: Option<&str>, site_url: Url) -> Self {
        let admins = AdminAllowList::parse(admin_emails);
        let fallback = FallbackAdmin::from_config(&admins, admin_password);

        Self {
            admins,
            fallback,
            site_url,
        }
    }

    #[must_use]
    pub fn admins(&self) -> &AdminAllowList {
        &self.admins
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&FallbackAdmin> {
        self.fallback.as_ref()
    }

    #[must_use]
    pub fn site_url(&self) -> &Url {
        &self.site_url
    }

    /// Fixed post-login return target for federated sign-in.
    #[must_use]
    pub fn oauth_return_url(&self) -> String {
        let mut url = self.site_url.clone();
        url.set_path(CLIENT_AREA_PATH);
        url.set_query(None);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Url {
        Url::parse("https://courtier.example").unwrap()
    }

    #[test]
    fn allow_list_trims_lowercases_and_drops_empty_entries() {
        let admins = AdminAllowList::parse(" A@x.com, ,b@Y.com,a@x.com ,");
        assert_eq!(admins.iter().collect::<Vec<_>>(), vec!["a@x.com", "b@y.com"]);
        assert!(admins.contains("  B@y.COM"));
        assert!(!admins.contains("c@x.com"));
    }

    #[test]
    fn empty_allow_list() {
        let admins = AdminAllowList::parse("");
        assert!(admins.is_empty());
        assert_eq!(admins.first(), None);
    }

    #[test]
    fn fallback_requires_email_and_password() {
        let admins = AdminAllowList::parse("admin@x.com");
        assert!(FallbackAdmin::from_config(&admins, None).is_none());
        assert!(FallbackAdmin::from_config(&admins, Some("   ")).is_none());
        assert!(FallbackAdmin::from_config(&AdminAllowList::default(), Some("secret")).is_none());

        let fallback = FallbackAdmin::from_config(&admins, Some(" secret123 ")).unwrap();
        assert_eq!(fallback.email(), "admin@x.com");
        assert!(fallback.matches("admin@x.com", "secret123"));
        assert!(!fallback.matches("admin@x.com", "secret"));
        assert!(!fallback.matches("other@x.com", "secret123"));
    }

    #[test]
    fn fallback_uses_first_allow_listed_email() {
        let config = AuthConfig::new("first@x.com,second@x.com", Some("pw"), site());
        assert_eq!(config.fallback().map(FallbackAdmin::email), Some("first@x.com"));
    }

    #[test]
    fn fallback_debug_hides_password() {
        let config = AuthConfig::new("admin@x.com", Some("hunter2"), site());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn oauth_return_url_points_to_client_area() {
        let config = AuthConfig::new(
            "",
            None,
            Url::parse("https://courtier.example/fr?x=1").unwrap(),
        );
        assert_eq!(
            config.oauth_return_url(),
            "https://courtier.example/espace-client"
        );
    }
}
