use crate::{foundation::error::ArcraftResult, share::ShareCard};

const SHARE_TEXT: &str = "Check out this AR experience";
const EMAIL_SUBJECT: &str = "An augmented reality experience for you";

/// `encodeURIComponent`-style escaping (spaces as `%20`).
fn encode_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareIntent {
    WhatsApp,
    Telegram,
    Email,
    /// Platform share sheet; no link of its own.
    Native,
}

impl ShareIntent {
    pub const ALL: [ShareIntent; 4] = [Self::WhatsApp, Self::Telegram, Self::Email, Self::Native];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Email => "email",
            Self::Native => "native",
        }
    }

    pub fn link(self, card: &ShareCard) -> Option<String> {
        let url = card.url.as_str();
        match self {
            Self::WhatsApp => Some(format!(
                "https://wa.me/?text={}",
                encode_component(&format!("{SHARE_TEXT}: {url}"))
            )),
            Self::Telegram => Some(format!(
                "https://t.me/share/url?url={}&text={}",
                encode_component(url),
                encode_component(&format!("{SHARE_TEXT}: {}", card.title))
            )),
            Self::Email => {
                let body = format!(
                    "Hi,\n\nI wanted to share this augmented reality experience with you:\n\n{url}\n\n\
                     Open the link on your phone and point the camera at the marker.\n"
                );
                Some(format!(
                    "mailto:?subject={}&body={}",
                    encode_component(EMAIL_SUBJECT),
                    encode_component(&body)
                ))
            }
            Self::Native => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharedVia {
    Native,
    Link,
    Clipboard,
}

/// Platform share surfaces. Calls are fire-and-forget; an `Err` means "not delivered".
pub trait ShareTarget {
    fn share_native(&mut self, title: &str, text: &str, url: &url::Url) -> ArcraftResult<()>;
    fn open_link(&mut self, link: &str) -> ArcraftResult<()>;
    fn copy_to_clipboard(&mut self, text: &str) -> ArcraftResult<()>;
}

/// Headless target: no native sheet, links and clipboard contents are collected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkShareTarget {
    pub opened: Vec<String>,
    pub clipboard: Option<String>,
}

impl ShareTarget for LinkShareTarget {
    fn share_native(&mut self, _title: &str, _text: &str, _url: &url::Url) -> ArcraftResult<()> {
        Err(crate::foundation::error::ArcraftError::source_unavailable(
            "native share is not available",
        ))
    }

    fn open_link(&mut self, link: &str) -> ArcraftResult<()> {
        self.opened.push(link.to_string());
        Ok(())
    }

    fn copy_to_clipboard(&mut self, text: &str) -> ArcraftResult<()> {
        self.clipboard = Some(text.to_string());
        Ok(())
    }
}

/// Try the native share sheet; copy the link to the clipboard when that fails.
pub fn share_with_fallback(target: &mut dyn ShareTarget, card: &ShareCard) -> ArcraftResult<SharedVia> {
    match target.share_native(&card.title, SHARE_TEXT, &card.url) {
        Ok(()) => Ok(SharedVia::Native),
        Err(e) => {
            tracing::debug!(error = %e, "native share failed; copying link instead");
            target.copy_to_clipboard(card.url.as_str())?;
            Ok(SharedVia::Clipboard)
        }
    }
}

/// Deliver `card` through `intent`.
pub fn share_via(
    target: &mut dyn ShareTarget,
    intent: ShareIntent,
    card: &ShareCard,
) -> ArcraftResult<SharedVia> {
    match intent.link(card) {
        Some(link) => {
            target.open_link(&link)?;
            Ok(SharedVia::Link)
        }
        None => share_with_fallback(target, card),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{foundation::error::ArcraftError, model::ExperienceId};

    fn card() -> ShareCard {
        ShareCard {
            id: ExperienceId::parse("abc").unwrap(),
            url: url::Url::parse("https://ar.example/?ar=abc").unwrap(),
            title: "My scene".to_string(),
            qr: None,
        }
    }

    #[test]
    fn intent_links_escape_the_share_url() {
        let wa = ShareIntent::WhatsApp.link(&card()).unwrap();
        assert_eq!(
            wa,
            "https://wa.me/?text=Check%20out%20this%20AR%20experience%3A%20https%3A%2F%2Far.example%2F%3Far%3Dabc"
        );
        let tg = ShareIntent::Telegram.link(&card()).unwrap();
        assert!(tg.starts_with("https://t.me/share/url?url=https%3A%2F%2Far.example%2F%3Far%3Dabc&text="));
        let mail = ShareIntent::Email.link(&card()).unwrap();
        assert!(mail.starts_with("mailto:?subject=An%20augmented"));
        assert!(!mail.contains('\n'));
        assert!(ShareIntent::Native.link(&card()).is_none());
    }

    struct NativeOk(bool);

    impl ShareTarget for NativeOk {
        fn share_native(&mut self, _: &str, _: &str, _: &url::Url) -> ArcraftResult<()> {
            self.0 = true;
            Ok(())
        }
        fn open_link(&mut self, _: &str) -> ArcraftResult<()> {
            Err(ArcraftError::validation("unexpected"))
        }
        fn copy_to_clipboard(&mut self, _: &str) -> ArcraftResult<()> {
            Err(ArcraftError::validation("unexpected"))
        }
    }

    #[test]
    fn native_share_falls_back_to_clipboard() {
        let mut headless = LinkShareTarget::default();
        assert_eq!(
            share_with_fallback(&mut headless, &card()).unwrap(),
            SharedVia::Clipboard
        );
        assert_eq!(headless.clipboard.as_deref(), Some("https://ar.example/?ar=abc"));

        let mut native = NativeOk(false);
        assert_eq!(share_with_fallback(&mut native, &card()).unwrap(), SharedVia::Native);
        assert!(native.0);
    }

    #[test]
    fn share_via_opens_links() {
        let mut t = LinkShareTarget::default();
        assert_eq!(
            share_via(&mut t, ShareIntent::Telegram, &card()).unwrap(),
            SharedVia::Link
        );
        assert_eq!(t.opened.len(), 1);
    }
}
