//! Pairing page templates.
//!
//! One page per session situation: connected, waiting for a scan, or
//! still initializing. The scan page embeds the code as a PNG data URL
//! and falls back to the raw payload when image rendering failed.

use {askama::Template, tracing::warn};

use warelay_session::SessionSnapshot;

#[derive(Template)]
#[template(path = "connected.html", escape = "html")]
struct ConnectedTemplate;

#[derive(Template)]
#[template(path = "scan.html", escape = "html")]
struct ScanTemplate<'a> {
    image_data_url: &'a str,
    payload: &'a str,
    remaining_secs: u64,
}

#[derive(Template)]
#[template(path = "waiting.html", escape = "html")]
struct WaitingTemplate<'a> {
    status_line: &'a str,
}

/// Render the pairing page for the current session snapshot.
pub(crate) fn pairing_page(snapshot: &SessionSnapshot) -> String {
    let rendered = if snapshot.is_ready() {
        ConnectedTemplate.render()
    } else if let Some(code) = &snapshot.pairing {
        ScanTemplate {
            image_data_url: &code.image_data_url,
            payload: &code.code,
            remaining_secs: code.remaining_secs(),
        }
        .render()
    } else {
        WaitingTemplate {
            status_line: &snapshot.status_message(),
        }
        .render()
    };

    match rendered {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "failed to render pairing page");
            "<!DOCTYPE html><html><body><p>Page temporarily unavailable.</p></body></html>"
                .to_owned()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warelay_session::{SessionEvent, SessionTracker};

    #[test]
    fn ready_session_renders_connected_page() {
        let mut tracker = SessionTracker::new();
        tracker.apply(SessionEvent::Ready);
        let html = pairing_page(tracker.snapshot());
        assert!(html.contains("WhatsApp is connected"));
        assert!(!html.contains("Scan this QR code"));
    }

    #[test]
    fn pairing_session_renders_scan_page_with_image() {
        let mut tracker = SessionTracker::new();
        tracker.apply(SessionEvent::QrIssued {
            code: "2@pairing-payload".to_string(),
        });
        let html = pairing_page(tracker.snapshot());
        assert!(html.contains("Scan this QR code"));
        assert!(html.contains("data:image/png;base64,"));
    }

    #[test]
    fn initializing_session_renders_waiting_page() {
        let tracker = SessionTracker::new();
        let html = pairing_page(tracker.snapshot());
        assert!(html.contains("loader"));
        assert!(!html.contains("Scan this QR code"));
    }
}
