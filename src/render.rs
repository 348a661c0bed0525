//! Public listing page.
//!
//! Every catalog value is HTML-escaped before it is written into the page;
//! download links are only emitted for `http(s)` URLs.

use macfreeapps_core::models::CatalogRecord;

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn safe_link(url: Option<&str>) -> Option<&str> {
    url.filter(|u| u.starts_with("https://") || u.starts_with("http://"))
}

fn app_card(app: &CatalogRecord) -> String {
    let button = match safe_link(app.download_url.as_deref()) {
        Some(url) => format!(
            r#"<a href="{}" class="download-btn" data-id="{}" target="_blank" rel="noopener">İndir</a>"#,
            escape_html(url),
            escape_html(&app.id)
        ),
        None => r#"<span class="download-btn disabled">Yakında</span>"#.to_string(),
    };
    format!(
        r#"<div class="app-card" data-category="{}">
  <div class="app-icon">{}</div>
  <h3>{}</h3>
  <p>{}</p>
  {}
</div>"#,
        app.category.as_str(),
        escape_html(&app.icon),
        escape_html(&app.name),
        escape_html(&app.description),
        button
    )
}

/// Render the full listing page.
pub fn listing_page(apps: &[CatalogRecord]) -> String {
    let grid = if apps.is_empty() {
        r#"<div class="empty-state">
  <h3>Henüz uygulama yok</h3>
  <p>Yakında harika uygulamalar eklenecek!</p>
</div>"#
            .to_string()
    } else {
        apps.iter().map(app_card).collect::<Vec<_>>().join("\n")
    };

    format!(
        r#"<!doctype html>
<html lang="tr">
<head>
<meta charset="utf-8">
<title>Mac Free Apps</title>
</head>
<body>
<main id="appsGrid">
{}
</main>
<script>
document.querySelectorAll('.download-btn[data-id]').forEach(function (btn) {{
  btn.addEventListener('click', function () {{
    fetch('/api/apps/' + encodeURIComponent(btn.dataset.id) + '/download', {{ method: 'POST' }});
  }});
}});
</script>
</body>
</html>
"#,
        grid
    )
}
