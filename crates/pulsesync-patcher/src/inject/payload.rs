use tera::{Context, Tera};

pub const ENTRY_SENTINEL: &str = "pulsesync:entry-script";
pub const LISTENER_SENTINEL: &str = "pulsesync:track-info-listener";

const ENTRY_SCRIPT: &str = include_str!("payload/entry_script.js");
const TRACK_INFO_LISTENER: &str = include_str!("payload/track_info_listener.js");

/// Injected code, rendered for one control-plane address.
#[derive(Clone, Debug)]
pub struct Payload {
    pub entry_script: String,
    pub track_info_listener: String,
}

impl Payload {
    pub fn render(base_url: &str) -> tera::Result<Self> {
        Ok(Self {
            entry_script: render(ENTRY_SCRIPT, base_url, ENTRY_SENTINEL)?,
            track_info_listener: render(TRACK_INFO_LISTENER, base_url, LISTENER_SENTINEL)?,
        })
    }
}

fn render(template: &str, base_url: &str, sentinel: &str) -> tera::Result<String> {
    let mut context = Context::new();
    context.insert("base_url", base_url);
    context.insert("sentinel", sentinel);
    Tera::one_off(template, &context, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_base_url_and_sentinels() {
        let payload = Payload::render("http://127.0.0.1:2007").unwrap();

        assert!(payload.entry_script.contains(ENTRY_SENTINEL));
        assert!(payload.entry_script.contains("'http://127.0.0.1:2007/update_data'"));
        assert!(payload.entry_script.contains("'http://127.0.0.1:2007/get_theme'"));
        assert!(!payload.entry_script.contains("{{"));

        assert!(payload.track_info_listener.contains(LISTENER_SENTINEL));
        assert!(payload.track_info_listener.contains("'http://127.0.0.1:2007/track_info'"));
        assert!(payload.track_info_listener.contains(r"get-file-info\?ts=\d+&trackId=(\d+)"));
    }

    #[test]
    fn url_is_not_escaped() {
        let payload = Payload::render("http://localhost:9000").unwrap();
        assert!(payload.entry_script.contains("http://localhost:9000/update_data"));
    }
}
