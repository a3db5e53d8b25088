//! Small XML text helpers shared by the worksheet reader and patcher.

/// Escape text content for element bodies.
pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape text for attribute values (double-quoted).
pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// True when `text` would lose leading/trailing whitespace without
/// `xml:space="preserve"`.
pub(crate) fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}
