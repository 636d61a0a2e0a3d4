pub(crate) const INDEX_HTML: &str = include_str!("templates/index.html");

/// Fills the form page. Every value is HTML-escaped, braces included, so a
/// submitted value can never become a placeholder for a later substitution.
pub(crate) fn render_index(url: &str, parts: &str, error: Option<&str>) -> String {
    let error_block = error
        .map(|msg| format!("<div class=\"error\" role=\"alert\">{}</div>", escape_html(msg)))
        .unwrap_or_default();

    INDEX_HTML
        .replace("{{error}}", &error_block)
        .replace("{{url}}", &escape_html(url))
        .replace("{{parts}}", &escape_html(parts))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}
