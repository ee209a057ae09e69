use crate::domain::model::{Block, Page};

pub fn render_page(page: &Page) -> String {
    let title = page.title.as_deref().unwrap_or(&page.path);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str("</head>\n<body>\n");

    for block in &page.blocks {
        match block {
            Block::Heading(text) => {
                html.push_str(&format!("<h1>{}</h1>\n", escape_html(text)));
            }
            Block::Text(text) => {
                let escaped = escape_html(text).replace('\n', "<br>");
                html.push_str(&format!("<p>{}</p>\n", escaped));
            }
            Block::Divider => html.push_str("<hr>\n"),
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
