//! Rewrites platform article HTML so it renders inside our own frame.
//!
//! Image and link hosts are pointed at the local resource proxies
//! (`/wx-images`, `/wx-qim`, `/wx-mp`), a small stylesheet and error hook
//! are added to `<head>`, and `<body>` gets a floating link back to the
//! original page.

const URL_REWRITES: &[(&str, &str)] = &[
    (r#"data-src="https://mmbiz.qpic.cn/"#, r#"src="/wx-images/"#),
    (r#"src="https://mmbiz.qpic.cn/"#, r#"src="/wx-images/"#),
    (r#"data-src="https://mmbiz.qlogo.cn/"#, r#"src="/wx-qim/"#),
    (r#"src="https://mmbiz.qlogo.cn/"#, r#"src="/wx-qim/"#),
    (r#"href="https://mp.weixin.qq.com/"#, r#"href="/wx-mp/"#),
];

const HEAD_SNIPPET: &str = r#"
<base target="_blank">
<style>
  img { max-width: 100%; height: auto; }
  img[src=""] { display: none; }
  body { padding: 20px; }
  .rich_media_content { font-size: 16px; line-height: 1.6; }
</style>
<script>
  window.onerror = function(msg, url, line) {
    console.error('Error: ' + msg + '\nURL: ' + url + '\nLine: ' + line);
    return false;
  };
</script>"#;

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn open_original_button(original_url: &str) -> String {
    format!(
        r#"
<div style="position: fixed; top: 20px; right: 20px; z-index: 1000;">
  <a href="{}" target="_blank" style="display: inline-block; padding: 10px 20px; background-color: #07C160; color: white; border-radius: 5px; text-decoration: none; font-size: 14px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">Open in new window</a>
</div>"#,
        escape_attr(original_url)
    )
}

/// Inserts `snippet` right after the first `<tag ...>` opening tag, if any.
fn insert_after_open_tag(html: &mut String, tag: &str, snippet: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{}", tag);
    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let start = from + found;
        let after = start + needle.len();
        match lower[after..].chars().next() {
            Some(c) if c == '>' || c.is_ascii_whitespace() => {
                if let Some(end) = lower[after..].find('>') {
                    html.insert_str(after + end + 1, snippet);
                    return true;
                }
                return false;
            }
            _ => from = after,
        }
    }
    false
}

pub fn rewrite_resource_urls(html: &str) -> String {
    URL_REWRITES
        .iter()
        .fold(html.to_string(), |acc, (from, to)| acc.replace(from, to))
}

pub fn rewrite_article_html(html: &str, original_url: &str) -> String {
    let mut content = rewrite_resource_urls(html);
    insert_after_open_tag(&mut content, "head", HEAD_SNIPPET);
    insert_after_open_tag(&mut content, "body", &open_original_button(original_url));
    content
}
