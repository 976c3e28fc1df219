use anyhow::anyhow;
use regex::Regex;

/// Structured rich content derived from a free-text event description.
/// Rendering surfaces project these nodes; the formatter never emits
/// markup itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Text(String),
    Link { url: String },
    Image { url: String },
    LineBreak,
}

/// Description text → content nodes. Order matters: direct image URLs are
/// pulled out behind placeholders first so the generic link pass cannot
/// wrap them a second time; placeholders are restored last.
pub fn format_description(text: &str) -> anyhow::Result<Vec<ContentNode>> {
    let image_re = Regex::new(r"(?i)(https?://\S+\.(?:jpg|jpeg|png|gif|webp))")
        .map_err(|err| anyhow!("internal regex compile failure: {err}"))?;
    let link_re = Regex::new(r#"(https?://[^\s<>"'()]+)"#)
        .map_err(|err| anyhow!("internal regex compile failure: {err}"))?;
    let placeholder_re = Regex::new(r"%%IMG_(\d+)%%")
        .map_err(|err| anyhow!("internal regex compile failure: {err}"))?;

    let mut images: Vec<String> = Vec::new();
    let masked = image_re.replace_all(text, |caps: &regex::Captures<'_>| {
        let placeholder = format!("%%IMG_{}%%", images.len());
        images.push(caps[1].trim().to_string());
        placeholder
    });

    let mut nodes = Vec::new();
    let mut last = 0;
    for m in link_re.find_iter(&masked) {
        push_plain(&mut nodes, &masked[last..m.start()], &placeholder_re, &images);
        nodes.push(ContentNode::Link {
            url: m.as_str().to_string(),
        });
        last = m.end();
    }
    push_plain(&mut nodes, &masked[last..], &placeholder_re, &images);

    Ok(nodes)
}

fn push_plain(nodes: &mut Vec<ContentNode>, text: &str, placeholder_re: &Regex, images: &[String]) {
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            nodes.push(ContentNode::LineBreak);
        }

        let mut last = 0;
        for caps in placeholder_re.captures_iter(line) {
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            push_text(nodes, &line[last..m.0]);
            if let Some(url) = caps
                .get(1)
                .and_then(|idx| idx.as_str().parse::<usize>().ok())
                .and_then(|idx| images.get(idx))
            {
                nodes.push(ContentNode::Image { url: url.clone() });
            }
            last = m.1;
        }
        push_text(nodes, &line[last..]);
    }
}

fn push_text(nodes: &mut Vec<ContentNode>, text: &str) {
    if !text.is_empty() {
        nodes.push(ContentNode::Text(text.to_string()));
    }
}

/// Markup projection matching the shape the feed's web surface renders:
/// centered clickable image blocks, target=_blank links, <br> line breaks.
/// Feed text is trusted owner content and passes through unescaped.
#[must_use]
pub fn to_html(nodes: &[ContentNode]) -> String {
    let mut html = String::new();
    for node in nodes {
        match node {
            ContentNode::Text(text) => html.push_str(text),
            ContentNode::Link { url } => {
                html.push_str(&format!(
                    r#"<a href="{url}" target="_blank" style="color:#ffe; text-decoration:underline;">{url}</a>"#
                ));
            }
            ContentNode::Image { url } => {
                html.push_str(&format!(
                    r#"<div style="text-align:center; margin:6px 0;"><a href="{url}" target="_blank"><img src="{url}" style="max-width:90%; height:auto; display:inline-block; border-radius:4px;"></a></div>"#
                ));
            }
            ContentNode::LineBreak => html.push_str("<br>"),
        }
    }
    html
}
