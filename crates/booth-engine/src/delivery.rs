use anyhow::{bail, Context, Result};
use base64::Engine;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use booth_contracts::share::is_valid_email;

use crate::{non_empty_env, BASE64};

pub const EMAIL_SUBJECT: &str = "Your Virtual Try-On is Ready! \u{2728}";
const INLINE_IMAGE_CID: &str = "result-image";
const ATTACHMENT_FILENAME: &str = "virtual-try-on.png";

/// SMTP settings. Credentials come from the environment only; no default
/// sender account exists in the binary.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl EmailConfig {
    /// Reads SMTP_HOST, SMTP_PORT (default 587), SMTP_USER, SMTP_PASS and
    /// SMTP_FROM (defaults to SMTP_USER). `None` when the required variables
    /// are absent, so /api/health can report email as unconfigured.
    pub fn from_env() -> Option<Self> {
        let host = non_empty_env("SMTP_HOST")?;
        let username = non_empty_env("SMTP_USER")?;
        let password = non_empty_env("SMTP_PASS")?;
        let port = non_empty_env("SMTP_PORT")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(587);
        let from = non_empty_env("SMTP_FROM").unwrap_or_else(|| username.clone());
        Some(Self {
            host,
            port,
            username,
            password,
            from,
        })
    }
}

/// Sends the final rendered image to a guest, inline in an HTML body and
/// again as a plain attachment.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Option<Self> {
        EmailConfig::from_env().map(Self::new)
    }

    pub fn send_result(&self, to: &str, image_bytes: &[u8]) -> Result<()> {
        if !is_valid_email(to) {
            bail!("invalid recipient address: {to}");
        }
        let message = self.build_message(to, image_bytes)?;
        let transport = SmtpTransport::relay(&self.config.host)
            .context("building smtp transport")?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();
        transport
            .send(&message)
            .with_context(|| format!("sending result email via {}", self.config.host))?;
        Ok(())
    }

    fn build_message(&self, to: &str, image_bytes: &[u8]) -> Result<Message> {
        let png = ContentType::parse("image/png").context("png content type")?;
        let inline = Attachment::new_inline(INLINE_IMAGE_CID.to_string())
            .body(image_bytes.to_vec(), png.clone());
        let attachment =
            Attachment::new(ATTACHMENT_FILENAME.to_string()).body(image_bytes.to_vec(), png);
        let body = MultiPart::mixed()
            .multipart(
                MultiPart::related()
                    .singlepart(SinglePart::html(render_email_html()))
                    .singlepart(inline),
            )
            .singlepart(attachment);
        Message::builder()
            .from(self.config.from.parse().context("parsing sender address")?)
            .to(to.parse().context("parsing recipient address")?)
            .subject(EMAIL_SUBJECT)
            .multipart(body)
            .context("assembling result email")
    }
}

/// HTML body shown above the inline result image.
pub fn render_email_html() -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h2 style=\"color: #333;\">Your Virtual Try-On Result</h2>\
         <p>Thanks for trying the virtual wardrobe! Your transformed look is below and attached.</p>\
         <img src=\"cid:{INLINE_IMAGE_CID}\" alt=\"Your virtual try-on result\" \
         style=\"max-width: 100%; border-radius: 8px;\" />\
         <p style=\"color: #888; font-size: 12px;\">This image was generated from your photo session.</p>\
         </div>"
    )
}

/// Accepts either a bare base64 payload or a full `data:image/...;base64,`
/// URI and yields the raw image bytes.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let encoded = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:image/") => rest,
        _ => trimmed,
    };
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .context("decoding image payload as base64")?;
    if bytes.is_empty() {
        bail!("image payload decoded to zero bytes");
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use base64::Engine;

    use super::{decode_image_payload, render_email_html, EmailConfig, EmailDelivery};
    use crate::BASE64;

    fn config() -> EmailConfig {
        EmailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "booth@example.com".to_string(),
            password: "secret".to_string(),
            from: "booth@example.com".to_string(),
        }
    }

    #[test]
    fn decodes_bare_base64() {
        let payload = BASE64.encode(b"fake image bytes");
        assert_eq!(decode_image_payload(&payload).unwrap(), b"fake image bytes");
    }

    #[test]
    fn decodes_data_uri_payload() {
        let payload = format!("data:image/png;base64,{}", BASE64.encode(b"png bytes"));
        assert_eq!(decode_image_payload(&payload).unwrap(), b"png bytes");
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(decode_image_payload("").is_err());
        assert!(decode_image_payload("data:image/png;base64,").is_err());
    }

    #[test]
    fn rejects_invalid_recipient_without_touching_the_network() {
        let delivery = EmailDelivery::new(config());
        let err = delivery
            .send_result("not-an-address", b"bytes")
            .expect_err("invalid recipient rejected");
        assert!(err.to_string().contains("invalid recipient"));
    }

    #[test]
    fn message_assembles_with_inline_and_attachment_parts() {
        let delivery = EmailDelivery::new(config());
        let message = delivery
            .build_message("guest@example.com", b"imagebytes")
            .expect("message builds");
        let formatted = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(formatted.contains("cid:result-image"));
        assert!(formatted.contains("virtual-try-on.png"));
        assert!(formatted.contains("Subject:"));
    }

    #[test]
    fn html_body_references_the_inline_image() {
        assert!(render_email_html().contains("cid:result-image"));
    }
}
