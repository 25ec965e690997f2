/// Helpers for the share surface: link selection, QR derivation, and the
/// client-side recipient check.
const QR_SERVICE_BASE: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Minimal `local-part@domain.tld` shape check, mirroring the client-side
/// gate: no whitespace or extra `@`, and a dot somewhere in the domain.
pub fn is_valid_email(address: &str) -> bool {
    let mut parts = address.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return false;
    }
    let mut domain_parts = domain.rsplitn(2, '.');
    let (Some(tld), Some(rest)) = (domain_parts.next(), domain_parts.next()) else {
        return false;
    };
    !tld.is_empty()
        && !rest.is_empty()
        && !domain.chars().any(char::is_whitespace)
}

/// Whether the link is a plain `http(s)` URL (as opposed to an inline data
/// URI, which cannot be shared by reference).
pub fn is_http_url(link: &str) -> bool {
    let lower = link.trim().to_ascii_lowercase();
    lower.starts_with("http:") || lower.starts_with("https:")
}

/// The best link to surface on the share screen: the durable public URL when
/// hosting republish succeeded, otherwise the inline representation.
pub fn best_share_link<'a>(public_url: Option<&'a str>, inline: &'a str) -> &'a str {
    public_url.filter(|url| !url.trim().is_empty()).unwrap_or(inline)
}

/// Derives a QR-code image URL for the share link, but only for well-formed
/// `http(s)` links; data URIs get no QR code.
pub fn qr_code_url(link: &str) -> Option<String> {
    if !is_http_url(link) {
        return None;
    }
    Some(format!(
        "{QR_SERVICE_BASE}?data={}&size=150x150",
        urlencoding::encode(link.trim())
    ))
}
