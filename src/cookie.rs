//! Cookie lookup for XSRF protection.

use std::fmt;

use parking_lot::RwLock;
use percent_encoding::percent_decode_str;

/// Read access to the cookies visible to the client.
pub trait CookieStore: Send + Sync + 'static {
    /// The value of the cookie `name`, if set.
    fn read(&self, name: &str) -> Option<String>;
}

impl<F> CookieStore for F
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    fn read(&self, name: &str) -> Option<String> {
        (self)(name)
    }
}

/// An in-memory cookie store.
///
/// Values are stored percent-encoded, the way they appear in a `Cookie` header,
/// and decoded when read.
#[derive(Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<(String, String)>>,
}

impl CookieJar {
    /// An empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header style string, e.g. `a=1; b=2`.
    pub fn parse(header: &str) -> Self {
        let jar = CookieJar::new();
        for pair in header.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    jar.set(name, value.trim());
                }
            }
        }
        jar
    }

    /// Set a cookie, replacing any previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut cookies = self.cookies.write();
        match cookies.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => cookies.push((name, value)),
        }
    }

    /// Remove a cookie.
    pub fn remove(&self, name: &str) {
        self.cookies.write().retain(|(key, _)| key != name);
    }
}

impl CookieStore for CookieJar {
    fn read(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("len", &self.cookies.read().len())
            .finish()
    }
}
