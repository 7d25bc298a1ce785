//! Static index page listing every exported package.

use quick_xml::escape::escape;

use crate::contract::export_key;

/// Title used when none is configured.
pub const DEFAULT_INDEX_TITLE: &str = "EnviDat NASA XML";

/// Render the index page: one link per package, in the order given.
///
/// Links point at `{public_base_url}/{package}.xml`. The output depends only on
/// the arguments, so the same ordered input always yields the same bytes.
pub fn render_index<S: AsRef<str>>(title: &str, public_base_url: &str, packages: &[S]) -> String {
    let title = escape(title);
    let base = public_base_url.trim_end_matches('/');

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("  <meta charset=\"utf-8\">\n");
    html.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("  <title>{title}</title>\n"));
    html.push_str("  <style>\n");
    html.push_str("    body { font-family: sans-serif; margin: 2em auto; max-width: 60em; }\n");
    html.push_str("    li { margin: 0.25em 0; }\n");
    html.push_str("  </style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("  <h1>{title}</h1>\n"));
    html.push_str("  <ul>\n");
    for package in packages {
        let key = export_key(package.as_ref());
        let key = escape(&key);
        html.push_str(&format!("    <li><a href=\"{base}/{key}\">{key}</a></li>\n"));
    }
    html.push_str("  </ul>\n</body>\n</html>\n");
    html
}
