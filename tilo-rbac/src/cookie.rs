//! Cookie jar storage for the edge-visible role cookie

use crate::config::CookieConfig;
use crate::error::RbacError;
use crate::storage::KeyValueStorage;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type RbacResult<T> = std::result::Result<T, RbacError>;

/// Attributes applied to every cookie the jar writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub same_site: String,
    pub max_age_seconds: u64,
}

impl Default for CookieOptions {
    fn default() -> Self {
        (&CookieConfig::default()).into()
    }
}

impl From<&CookieConfig> for CookieOptions {
    fn from(config: &CookieConfig) -> Self {
        Self {
            path: config.path.clone(),
            same_site: config.same_site.clone(),
            max_age_seconds: config.max_age_seconds,
        }
    }
}

#[derive(Debug, Default)]
struct JarState {
    values: HashMap<String, String>,
    // name -> Set-Cookie header value; the latest write per name wins
    pending: BTreeMap<String, String>,
}

/// Request-scoped cookies.
///
/// Reads come from the incoming `Cookie` header; writes update the jar
/// immediately and are queued as `Set-Cookie` headers for the response.
#[derive(Debug, Default)]
pub struct CookieJar {
    options: CookieOptions,
    state: RwLock<JarState>,
}

impl CookieJar {
    pub fn new(options: CookieOptions) -> Self {
        Self {
            options,
            state: RwLock::new(JarState::default()),
        }
    }

    /// Parse a `Cookie` request header (`a=1; b=2`).
    ///
    /// Malformed pairs are skipped; for duplicate names the first one wins.
    pub fn from_header(header: &str, options: CookieOptions) -> Self {
        let mut values = HashMap::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            values
                .entry(name.to_string())
                .or_insert_with(|| decode_value(value.trim().trim_matches('"')));
        }

        Self {
            options,
            state: RwLock::new(JarState {
                values,
                pending: BTreeMap::new(),
            }),
        }
    }

    /// `Set-Cookie` header values for every cookie written since creation
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.state
            .read()
            .map(|state| state.pending.values().cloned().collect())
            .unwrap_or_default()
    }

    fn render(&self, name: &str, value: &str, max_age: u64) -> String {
        format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            name,
            encode_value(value),
            self.options.path,
            max_age,
            self.options.same_site
        )
    }
}

impl KeyValueStorage for CookieJar {
    fn get(&self, key: &str) -> RbacResult<Option<String>> {
        let state = self
            .state
            .read()
            .map_err(|_| RbacError::Storage("cookie jar lock poisoned".to_string()))?;
        Ok(state.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> RbacResult<()> {
        let header = self.render(key, value, self.options.max_age_seconds);
        let mut state = self
            .state
            .write()
            .map_err(|_| RbacError::Storage("cookie jar lock poisoned".to_string()))?;
        state.values.insert(key.to_string(), value.to_string());
        state.pending.insert(key.to_string(), header);
        Ok(())
    }

    fn remove(&self, key: &str) -> RbacResult<()> {
        let header = self.render(key, "", 0);
        let mut state = self
            .state
            .write()
            .map_err(|_| RbacError::Storage("cookie jar lock poisoned".to_string()))?;
        state.values.remove(key);
        state.pending.insert(key.to_string(), header);
        Ok(())
    }
}

/// Percent-encode the characters a cookie value may not carry
pub fn encode_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ' ' | '"' | ',' | ';' | '\\' | '%' => encoded.push_str(&format!("%{:02X}", c as u32)),
            c if c.is_ascii_control() => encoded.push_str(&format!("%{:02X}", c as u32)),
            c => encoded.push(c),
        }
    }
    encoded
}

/// Reverse of [`encode_value`]; invalid escapes are kept literally
pub fn decode_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                decoded.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let jar = CookieJar::from_header(
            "theme=dark; tilo_role=mobile%20ceo;broken; =x; tilo_role=admin",
            CookieOptions::default(),
        );

        assert_eq!(
            jar.get("tilo_role").unwrap().as_deref(),
            Some("mobile ceo")
        );
        assert_eq!(jar.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(jar.get("broken").unwrap(), None);
        assert!(jar.set_cookie_headers().is_empty());
    }

    #[test]
    fn test_writes_queue_set_cookie_headers() {
        let jar = CookieJar::new(CookieOptions::default());

        jar.set("tilo_role", "new client").unwrap();
        assert_eq!(jar.get("tilo_role").unwrap().as_deref(), Some("new client"));
        assert_eq!(
            jar.set_cookie_headers(),
            vec!["tilo_role=new%20client; Path=/; Max-Age=86400; SameSite=Lax".to_string()]
        );

        jar.remove("tilo_role").unwrap();
        assert_eq!(jar.get("tilo_role").unwrap(), None);
        assert_eq!(
            jar.set_cookie_headers(),
            vec!["tilo_role=; Path=/; Max-Age=0; SameSite=Lax".to_string()]
        );
    }

    #[test]
    fn test_value_encoding() {
        let raw = r#"{"target_role":"new client","note":"a;b"}"#;
        let encoded = encode_value(raw);
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains('"'));
        assert_eq!(decode_value(&encoded), raw);

        assert_eq!(decode_value("100%"), "100%");
        assert_eq!(decode_value("%zz"), "%zz");
        assert_eq!(decode_value("%+A"), "%+A");
        assert_eq!(decode_value("%-1x"), "%-1x");
        assert_eq!(decode_value("%3b%3B"), ";;");
    }
}
