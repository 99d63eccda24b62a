/// Display labels and the text forms built from them.
use heapless::String;

use crate::mac::MacAddress;

/// Maximum length for user labels, vendor names and notes (bytes)
pub type LabelString = String<32>;

/// A rendered `"<MAC> | <label>"` line
pub type LineString = String<56>;

/// Separator between MAC and label in rendered lines.
pub const LINE_SEPARATOR: &str = " | ";

/// Clean up label text coming from the edit layer.
///
/// Control characters and the separators `,` and `|` are dropped so a
/// rendered line always splits back unambiguously; `"` and `\` are dropped
/// so persisted records never need JSON escapes. Surrounding whitespace is
/// trimmed and the result is cut at a character boundary to fit.
pub fn sanitize_label(text: &str) -> LabelString {
    clean(text, |c| matches!(c, ',' | '|' | '"' | '\\'))
}

/// Clean up a vendor or advertised name for the recent log.
///
/// Like [`sanitize_label`] but keeps punctuation common in company names
/// (`Co.,Ltd`). Control characters and `|` are still dropped.
pub fn display_label(text: &str) -> LabelString {
    clean(text, |c| c == '|')
}

fn clean(text: &str, drop: impl Fn(char) -> bool) -> LabelString {
    let mut out = LabelString::new();
    for c in text.chars() {
        if c.is_control() || drop(c) {
            continue;
        }
        if out.is_empty() && c.is_whitespace() {
            continue;
        }
        if out.push(c).is_err() {
            break;
        }
    }
    while out.ends_with(char::is_whitespace) {
        out.pop();
    }
    out
}

/// Render `"<MAC> | <label>"`, or just the MAC when the label is empty.
pub fn render_line(mac: &MacAddress, label: &str) -> LineString {
    use core::fmt::Write;
    let mut line = LineString::new();
    let _ = write!(line, "{mac}");
    if !label.is_empty() {
        let _ = line.push_str(LINE_SEPARATOR);
        let _ = line.push_str(label);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_label_unchanged() {
        assert_eq!(sanitize_label("Watch").as_str(), "Watch");
    }

    #[test]
    fn separators_and_controls_dropped() {
        assert_eq!(sanitize_label("Kitchen, left | shelf").as_str(), "Kitchen left  shelf");
        assert_eq!(sanitize_label("line\nbreak\t").as_str(), "linebreak");
        assert_eq!(sanitize_label(" | padded |").as_str(), "padded");
        assert_eq!(sanitize_label(r#"say "hi"\"#).as_str(), "say hi");
    }

    #[test]
    fn long_label_cut_at_char_boundary() {
        let long = "ééééééééééééééééééééééééé"; // 25 two-byte chars
        let out = sanitize_label(long);
        assert_eq!(out.len(), 32);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn display_label_keeps_vendor_punctuation() {
        assert_eq!(display_label("Samsung Electronics Co.,Ltd").as_str(), "Samsung Electronics Co.,Ltd");
        let cut = display_label("ääääääääääääääääääääää"); // 22 two-byte chars
        assert_eq!(cut.chars().count(), 16);
    }

    #[test]
    fn display_label_drops_separator_and_controls() {
        assert_eq!(display_label("a | b\nc").as_str(), "a  bc");
        assert_eq!(display_label("\t| Tile |\r\n").as_str(), "Tile");
    }

    #[test]
    fn render_with_and_without_label() {
        let mac = MacAddress::parse("aa:bb:cc:11:22:33").unwrap();
        assert_eq!(render_line(&mac, "Watch").as_str(), "AA:BB:CC:11:22:33 | Watch");
        assert_eq!(render_line(&mac, "").as_str(), "AA:BB:CC:11:22:33");
    }
}
