use pix_core::PixConfig;

/// Environment prefix: `PIXGRAM__FEED__LIMIT=24` sets `feed.limit`.
pub const ENV_PREFIX: &str = "PIXGRAM__";

struct PixgramDefaults;

impl PixgramDefaults {
    const VALUES: &'static [(&'static str, &'static str)] = &[
        ("http.host", "127.0.0.1"),
        ("http.port", "3030"),
        ("storage.root", "public/uploads"),
        ("upload.max_file_bytes", "10485760"),
        ("upload.caption_max_chars", "140"),
        ("media.max_width", "1080"),
        ("media.transcode_timeout_ms", "10000"),
        ("media.max_source_dimension", "16384"),
        ("feed.limit", "12"),
    ];
}

/// Fill every key that is not set yet with its default.
pub fn apply_defaults(config: &mut PixConfig) {
    for (key, value) in PixgramDefaults::VALUES {
        config.set_default(*key, *value);
    }
}

/// `.env` (when present), then the process environment, then defaults.
pub fn load() -> PixConfig {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }

    let mut config = PixConfig::new();
    let applied = config.load_env(ENV_PREFIX);
    apply_defaults(&mut config);
    tracing::debug!(overrides = applied, "configuration loaded");
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_do_not_clobber_overrides() {
        let mut config = PixConfig::new();
        config.load_vars(
            ENV_PREFIX,
            vec![("PIXGRAM__FEED__LIMIT".to_string(), "24".to_string())],
        );
        apply_defaults(&mut config);

        let snap = config.snapshot();
        assert_eq!(snap.get_usize("feed.limit"), Some(24));
        assert_eq!(snap.get_u32("media.max_width"), Some(1080));
        assert_eq!(snap.get("storage.root"), Some("public/uploads"));
    }
}
