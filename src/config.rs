//!
//! turnstile server configuration
//! ------------------------------
//! Settings are resolved in three layers: built-in defaults, then `TURNSTILE_*`
//! environment variables, then command-line flags. Flags always win.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::identity::MAX_SESSION_TTL;

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_MIN_SECRET_LEN: usize = 5;
/// Demo signing key used when none is configured. Startup warns when it is in effect.
pub const DEMO_SECRET_KEY: &str = "super secret string 12345";

pub const USAGE: &str = "turnstile\n\nUSAGE:\n  turnstile [--http-port N] [--host ADDR] [--secret-key KEY] [--static-dir PATH] [--session-ttl SECS] [--no-seed]\n\nOPTIONS:\n  --http-port N       HTTP port (env: TURNSTILE_HTTP_PORT, default 5000)\n  --host ADDR         Bind address (env: TURNSTILE_HOST, default 0.0.0.0)\n  --secret-key KEY    Session signing key (env: TURNSTILE_SECRET_KEY)\n  --static-dir PATH   Static asset folder (env: TURNSTILE_STATIC_DIR, default static)\n  --session-ttl SECS  Session lifetime in seconds (env: TURNSTILE_SESSION_TTL_SECS, default 3600)\n  --no-seed           Start with an empty user store (env: TURNSTILE_SEED_USERS=false)\n\nOTHER ENV:\n  TURNSTILE_MIN_SECRET_LEN          Minimum password length at registration (default 5)\n  TURNSTILE_SECURE_COOKIE           Mark the session cookie Secure (default false)\n  TURNSTILE_VERIFY_EMBEDDED_SECRET  Require a matching password for form/body credentials (default false)\n";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub secret_key: String,
    pub static_dir: PathBuf,
    pub session_ttl: Duration,
    pub min_secret_len: usize,
    pub secure_cookie: bool,
    pub seed_users: bool,
    /// When false, credentials embedded in a request body only need a known identifier.
    pub verify_embedded_secret: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            secret_key: DEMO_SECRET_KEY.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            min_secret_len: DEFAULT_MIN_SECRET_LEN,
            secure_cookie: false,
            seed_users: true,
            verify_embedded_secret: false,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with the process environment and the given argv.
    pub fn from_env_and_args(args: &[String]) -> Self {
        let mut cfg = Self::default();
        cfg.apply_lookup(|name| env::var(name).ok());
        cfg.apply_args(args);
        cfg
    }

    /// Overlay values from an environment-like lookup. Unparseable values are ignored.
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(h) = lookup("TURNSTILE_HOST").filter(|s| !s.trim().is_empty()) { self.host = h; }
        if let Some(p) = lookup("TURNSTILE_HTTP_PORT").and_then(|v| v.parse::<u16>().ok()) { self.http_port = p; }
        if let Some(k) = lookup("TURNSTILE_SECRET_KEY").filter(|s| !s.is_empty()) { self.secret_key = k; }
        if let Some(d) = lookup("TURNSTILE_STATIC_DIR") { self.static_dir = PathBuf::from(d); }
        if let Some(t) = lookup("TURNSTILE_SESSION_TTL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.session_ttl = session_ttl(t);
        }
        if let Some(n) = lookup("TURNSTILE_MIN_SECRET_LEN").and_then(|v| v.parse::<usize>().ok()) { self.min_secret_len = n; }
        if let Some(b) = lookup("TURNSTILE_SECURE_COOKIE").and_then(|v| parse_bool(&v)) { self.secure_cookie = b; }
        if let Some(b) = lookup("TURNSTILE_SEED_USERS").and_then(|v| parse_bool(&v)) { self.seed_users = b; }
        if let Some(b) = lookup("TURNSTILE_VERIFY_EMBEDDED_SECRET").and_then(|v| parse_bool(&v)) {
            self.verify_embedded_secret = b;
        }
    }

    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(p) = flag_value(args, "--http-port").and_then(|v| v.parse::<u16>().ok()) { self.http_port = p; }
        if let Some(h) = flag_value(args, "--host") { self.host = h; }
        if let Some(k) = flag_value(args, "--secret-key") { self.secret_key = k; }
        if let Some(d) = flag_value(args, "--static-dir") { self.static_dir = PathBuf::from(d); }
        if let Some(t) = flag_value(args, "--session-ttl").and_then(|v| v.parse::<u64>().ok()) {
            self.session_ttl = session_ttl(t);
        }
        if has_flag(args, "--no-seed") { self.seed_users = false; }
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.http_port) }

    pub fn uses_demo_key(&self) -> bool { self.secret_key == DEMO_SECRET_KEY }
}

fn session_ttl(secs: u64) -> Duration {
    Duration::from_secs(secs).min(MAX_SESSION_TTL)
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn defaults_match_reference_app() {
        let c = ServerConfig::default();
        assert_eq!(c.http_port, 5000);
        assert_eq!(c.min_secret_len, 5);
        assert!(c.seed_users);
        assert!(!c.verify_embedded_secret);
        assert!(c.uses_demo_key());
        assert_eq!(c.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn env_then_flags_override() {
        let env: HashMap<&str, &str> = [
            ("TURNSTILE_HTTP_PORT", "8080"),
            ("TURNSTILE_SECRET_KEY", "from-env"),
            ("TURNSTILE_SESSION_TTL_SECS", "60"),
            ("TURNSTILE_SECURE_COOKIE", "yes"),
            ("TURNSTILE_VERIFY_EMBEDDED_SECRET", "on"),
            ("TURNSTILE_MIN_SECRET_LEN", "not-a-number"),
        ].into_iter().collect();
        let mut c = ServerConfig::default();
        c.apply_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.http_port, 8080);
        assert_eq!(c.secret_key, "from-env");
        assert_eq!(c.session_ttl, Duration::from_secs(60));
        assert!(c.secure_cookie);
        assert!(c.verify_embedded_secret);
        assert_eq!(c.min_secret_len, 5);

        c.apply_args(&args(&["turnstile", "--http-port", "9090", "--no-seed", "--static-dir", "/srv/assets"]));
        assert_eq!(c.http_port, 9090);
        assert!(!c.seed_users);
        assert_eq!(c.static_dir, PathBuf::from("/srv/assets"));
        assert!(!c.uses_demo_key());
    }

    #[test]
    fn oversized_session_ttl_is_capped() {
        let mut c = ServerConfig::default();
        c.apply_lookup(|k| (k == "TURNSTILE_SESSION_TTL_SECS").then(|| u64::MAX.to_string()));
        assert_eq!(c.session_ttl, MAX_SESSION_TTL);
        c.apply_args(&args(&["turnstile", "--session-ttl", &(i64::MAX as u64).to_string()]));
        assert_eq!(c.session_ttl, MAX_SESSION_TTL);
        c.apply_args(&args(&["turnstile", "--session-ttl", "120"]));
        assert_eq!(c.session_ttl, Duration::from_secs(120));
    }

    #[test]
    fn dangling_flag_is_ignored() {
        let mut c = ServerConfig::default();
        c.apply_args(&args(&["turnstile", "--http-port"]));
        assert_eq!(c.http_port, DEFAULT_HTTP_PORT);
    }
}
