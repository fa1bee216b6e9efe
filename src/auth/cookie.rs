//! Session cookie handling

use crate::config::AppConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Builds and clears the human session cookie according to deployment settings
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    domain: String,
    https_enabled: bool,
    max_age: time::Duration,
}

impl SessionCookies {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: config.cookie.name.clone(),
            domain: config.server.hostname.clone(),
            https_enabled: config.cookie.https_enabled,
            max_age: time::Duration::minutes(config.session.lifetime_minutes as i64),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the session token, if the client sent one
    pub fn read(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Add the session cookie to the jar
    pub fn set(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.build(token, self.max_age))
    }

    /// Expire the session cookie on the client, whether or not the request carried it
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = self.build(String::new(), time::Duration::ZERO);
        cookie.set_expires(time::OffsetDateTime::UNIX_EPOCH);
        jar.add(cookie)
    }

    fn build(&self, value: String, max_age: time::Duration) -> Cookie<'static> {
        let same_site = if self.https_enabled {
            SameSite::Strict
        } else {
            SameSite::Lax
        };

        Cookie::build((self.name.clone(), value))
            .path("/")
            .domain(self.domain.clone())
            .http_only(true)
            .secure(self.https_enabled)
            .same_site(same_site)
            .max_age(max_age)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::response::IntoResponse;

    fn set_cookie_header(jar: CookieJar) -> String {
        let response = (jar, ()).into_response();
        response
            .headers()
            .get(axum::http::header::SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_cookie_flags_with_https() {
        let cookies = SessionCookies::from_config(&test_config());
        let header = set_cookie_header(cookies.set(CookieJar::new(), "tok".to_string()));

        assert!(header.starts_with("auth-cookie=tok"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Domain=auth.example.test"));
        assert!(header.contains("Max-Age=3600"));
    }

    #[test]
    fn test_cookie_flags_without_https() {
        let mut config = test_config();
        config.cookie.https_enabled = false;
        let cookies = SessionCookies::from_config(&config);
        let header = set_cookie_header(cookies.set(CookieJar::new(), "tok".to_string()));

        assert!(header.contains("HttpOnly"));
        assert!(!header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
    }

    #[test]
    fn test_clear_expires_cookie() {
        let cookies = SessionCookies::from_config(&test_config());
        let jar = CookieJar::new().add(Cookie::new("auth-cookie", "tok"));
        let header = set_cookie_header(cookies.clear(jar));

        assert!(header.starts_with("auth-cookie=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("Domain=auth.example.test"));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));

        // No cookie in the request: still emitted
        let header = set_cookie_header(cookies.clear(CookieJar::new()));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn test_read_ignores_empty_value() {
        let cookies = SessionCookies::from_config(&test_config());
        assert_eq!(cookies.read(&CookieJar::new()), None);

        let jar = CookieJar::new().add(Cookie::new("auth-cookie", ""));
        assert_eq!(cookies.read(&jar), None);

        let jar = CookieJar::new().add(Cookie::new("auth-cookie", "tok"));
        assert_eq!(cookies.read(&jar).as_deref(), Some("tok"));
    }
}
