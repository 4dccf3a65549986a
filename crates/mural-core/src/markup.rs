//! Minimal scanner for `<img>` tags inside rendered fragments.
//!
//! Fragments arrive as server-rendered markup. The only structure the
//! client cares about is which images carry the `nsfw` class marker, and
//! the server needs the inverse operation when a post is tagged sensitive.
//! Attribute values are expected quoted; nested `>` inside values is not
//! supported.

/// One `<img>` tag found in a fragment, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    pub src: String,
    pub classes: Vec<String>,
}

impl ImageTag {
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name)
    }
}

/// Collect every `<img>` tag in `markup`, in document order.
pub fn scan_images(markup: &str) -> Vec<ImageTag> {
    let mut images = Vec::new();
    for (start, end) in image_tag_spans(markup) {
        let body = &markup[start + "<img".len()..end];
        let attrs = parse_attrs(body);
        let src = attr_value(&attrs, "src").unwrap_or_default();
        let classes = attr_value(&attrs, "class")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        images.push(ImageTag { src, classes });
    }
    images
}

/// Append `class` to the class list of every `<img>` tag in `markup`.
/// Images that already carry it are left alone.
pub fn add_image_class(markup: &str, class: &str) -> String {
    let mut result = String::with_capacity(markup.len());
    let mut cursor = 0;
    for (start, end) in image_tag_spans(markup) {
        result.push_str(&markup[cursor..start]);
        result.push_str(&tag_with_class(&markup[start..=end], class));
        cursor = end + 1;
    }
    result.push_str(&markup[cursor..]);
    result
}

/// Byte spans of `<img ...>` tags: (index of `<`, index of `>`).
fn image_tag_spans(markup: &str) -> Vec<(usize, usize)> {
    let lower = markup.to_ascii_lowercase();
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(offset) = lower[from..].find("<img") {
        let start = from + offset;
        // Require a tag boundary so "<imgx" is not picked up.
        let after = lower.as_bytes().get(start + 4).copied();
        let boundary = matches!(after, Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'>') | Some(b'/'));
        if !boundary {
            from = start + 4;
            continue;
        }
        match markup[start..].find('>') {
            Some(len) => {
                spans.push((start, start + len));
                from = start + len + 1;
            }
            None => break,
        }
    }
    spans
}

/// Parse `name="value"` pairs out of a tag body. Unquoted values run to the
/// next whitespace; bare names get an empty value.
fn parse_attrs(body: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() && bytes[i] != b'/' {
            i += 1;
        }
        if name_start == i {
            break;
        }
        let name = body[name_start..i].to_ascii_lowercase();
        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                value = body[value_start..i].to_string();
                i += 1;
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = body[value_start..i].to_string();
            }
        }
        attrs.push((name, value));
    }
    attrs
}

fn attr_value(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

/// Rewrite one `<img ...>` tag so its class list contains `class`.
fn tag_with_class(tag: &str, class: &str) -> String {
    let body = &tag[..tag.len() - 1]; // strip the closing '>'
    let lower = body.to_ascii_lowercase();
    if let Some(pos) = lower.find("class=") {
        let value_start = pos + "class=".len();
        let bytes = body.as_bytes();
        if value_start < bytes.len() && (bytes[value_start] == b'"' || bytes[value_start] == b'\'') {
            let quote = bytes[value_start] as char;
            if let Some(rel_end) = body[value_start + 1..].find(quote) {
                let value_end = value_start + 1 + rel_end;
                let current = &body[value_start + 1..value_end];
                if current.split_whitespace().any(|c| c == class) {
                    return tag.to_string();
                }
                let appended = if current.is_empty() {
                    class.to_string()
                } else {
                    format!("{current} {class}")
                };
                return format!("{}{}{}>", &body[..value_start + 1], appended, &body[value_end..]);
            }
        }
        return tag.to_string();
    }
    // No class attribute: add one before the closing bracket, keeping
    // self-closing tags self-closing.
    let trimmed = body.trim_end();
    if let Some(stripped) = trimmed.strip_suffix('/') {
        format!("{} class=\"{}\"/>", stripped.trim_end(), class)
    } else {
        format!("{} class=\"{}\">", trimmed, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_images_in_order() {
        let markup = r#"<p>a</p><img src="one.png"><div><img src="two.png" class="wide tall"></div>"#;
        let images = scan_images(markup);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].src, "one.png");
        assert!(images[0].classes.is_empty());
        assert_eq!(images[1].src, "two.png");
        assert!(images[1].has_class("wide"));
        assert!(images[1].has_class("tall"));
    }

    #[test]
    fn test_scan_ignores_non_image_tags() {
        let markup = r#"<imgx src="no.png"><p>text</p>"#;
        assert!(scan_images(markup).is_empty());
    }

    #[test]
    fn test_add_class_without_existing_attribute() {
        let markup = r#"<img src="a.png">"#;
        assert_eq!(
            add_image_class(markup, "nsfw"),
            r#"<img src="a.png" class="nsfw">"#
        );
    }

    #[test]
    fn test_add_class_appends_to_existing() {
        let markup = r#"<img class="wide" src="a.png">"#;
        let result = add_image_class(markup, "nsfw");
        let images = scan_images(&result);
        assert!(images[0].has_class("wide"));
        assert!(images[0].has_class("nsfw"));
    }

    #[test]
    fn test_add_class_is_idempotent() {
        let markup = r#"<img class="nsfw" src="a.png">"#;
        assert_eq!(add_image_class(markup, "nsfw"), markup);
    }

    #[test]
    fn test_add_class_self_closing() {
        let markup = r#"<p>x</p><img src="a.png" />"#;
        let result = add_image_class(markup, "nsfw");
        assert_eq!(result, r#"<p>x</p><img src="a.png" class="nsfw"/>"#);
        assert!(scan_images(&result)[0].has_class("nsfw"));
    }

    #[test]
    fn test_add_class_leaves_other_markup_alone() {
        let markup = r#"<p>before</p><img src="a.png"><p>after</p>"#;
        let result = add_image_class(markup, "nsfw");
        assert!(result.starts_with("<p>before</p>"));
        assert!(result.ends_with("<p>after</p>"));
    }
}
