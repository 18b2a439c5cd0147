use scraper::{Html, Selector};

use crate::MetSample;

/// Outer HTML of the element with `id`, if the page has one.
pub fn extract_fragment(html: &str, id: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = id_selector(id)?;
    doc.select(&selector).next().map(|node| node.html())
}

/// Number of `<tr>` rows in the table with `table_id`; 0 when it is absent.
///
/// Rows of nested tables are not counted.
pub fn count_table_rows(html: &str, table_id: &str) -> usize {
    let doc = Html::parse_document(html);
    let (Some(table_sel), Some(row_sel)) = (id_selector(table_id), Selector::parse("tr").ok())
    else {
        return 0;
    };
    let Some(table) = doc.select(&table_sel).next() else {
        return 0;
    };
    table
        .select(&row_sel)
        .filter(|row| {
            row.ancestors()
                .filter_map(scraper::ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .count()
}

/// Renders result rows as `<tr><td>time</td><td>met</td></tr>` markup.
pub fn render_rows(samples: &[MetSample]) -> String {
    let mut out = String::with_capacity(samples.len() * 32);
    for sample in samples {
        out.push_str("<tr><td>");
        out.push_str(&escape_html(&sample.time));
        out.push_str("</td><td>");
        if let Some(met) = sample.met {
            out.push_str(&met.to_string());
        }
        out.push_str("</td></tr>");
    }
    out
}

fn id_selector(id: &str) -> Option<Selector> {
    // Quoted attribute form tolerates ids that are not valid CSS identifiers.
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    Selector::parse(&format!("[id=\"{escaped}\"]")).ok()
}

fn escape_html(text: &str) -> String {
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
