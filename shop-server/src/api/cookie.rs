//! `refreshToken` cookie handling

use http::{HeaderMap, HeaderValue, header};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes of the refresh cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    /// `SameSite=None; Secure` when set, `SameSite=Lax` otherwise
    pub secure: bool,
    /// Max-Age in seconds
    pub max_age: u64,
}

impl CookieSettings {
    /// `Set-Cookie` value carrying `token`
    pub fn set(&self, token: &str) -> HeaderValue {
        self.build(token, self.max_age)
    }

    /// `Set-Cookie` value that expires the cookie
    pub fn clear(&self) -> HeaderValue {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: u64) -> HeaderValue {
        let same_site = if self.secure {
            "SameSite=None; Secure"
        } else {
            "SameSite=Lax"
        };
        let cookie =
            format!("{REFRESH_COOKIE}={value}; HttpOnly; Path=/; Max-Age={max_age}; {same_site}");
        // JWTs are base64url segments joined by dots, always valid header bytes
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_cookie() {
        let settings = CookieSettings {
            secure: false,
            max_age: 604_800,
        };
        assert_eq!(
            settings.set("abc.def.ghi"),
            "refreshToken=abc.def.ghi; HttpOnly; Path=/; Max-Age=604800; SameSite=Lax"
        );
    }

    #[test]
    fn production_cookie_is_cross_site() {
        let settings = CookieSettings {
            secure: true,
            max_age: 60,
        };
        let value = settings.clear();
        let value = value.to_str().unwrap();
        assert!(value.contains("Max-Age=0"));
        assert!(value.ends_with("SameSite=None; Secure"));
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; refreshToken=t0k"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE).as_deref(), Some("t0k"));
        assert_eq!(read_cookie(&headers, "other").as_deref(), Some("1"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refreshToken="));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), None);
    }
}
