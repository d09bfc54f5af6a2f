//! Raw model text to display-safe markup

/// Named entities this formatter emits; an ampersand already starting one
/// of these is left alone so re-formatting escaped text is stable.
const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&#039;"];

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (idx, ch) in input.char_indices() {
        match ch {
            '&' => {
                let rest = &input[idx..];
                if ENTITIES.iter().any(|entity| rest.starts_with(entity)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Format raw model output as display-safe markup.
///
/// Text between successive `**` pairs becomes a `<b>` span; everything is
/// HTML-escaped (escaping runs per segment, after the split, so it cannot
/// introduce new markers). Newlines, and any leftover single `*`, become
/// `<br/>`. Deterministic, and stable when re-applied to text that has no
/// remaining raw markers or angle brackets.
pub fn format_for_display(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut html = String::with_capacity(raw.len());
    for (i, segment) in raw.split("**").enumerate() {
        let safe = escape_html(segment);
        if i % 2 == 1 {
            html.push_str("<b>");
            html.push_str(&safe);
            html.push_str("</b>");
        } else {
            html.push_str(&safe);
        }
    }

    html.replace('\n', "<br/>").replace('*', "<br/>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_pairs_and_newlines() {
        assert_eq!(
            format_for_display("**bold** and plain\ntext"),
            "<b>bold</b> and plain<br/>text"
        );
    }

    #[test]
    fn unsafe_characters_are_escaped() {
        assert_eq!(
            format_for_display("5 < 6 & \"quoted\" > 'x'"),
            "5 &lt; 6 &amp; &quot;quoted&quot; &gt; &#039;x&#039;"
        );
    }

    #[test]
    fn markers_inside_bold_segments_cannot_escape() {
        // The escaped angle brackets never form real tags.
        assert_eq!(
            format_for_display("**<script>**"),
            "<b>&lt;script&gt;</b>"
        );
    }

    #[test]
    fn single_asterisks_become_line_breaks() {
        assert_eq!(format_for_display("a * b"), "a <br/> b");
    }

    #[test]
    fn unpaired_double_marker_leaves_trailing_bold() {
        // An odd number of ** segments bolds the trailing one, matching
        // the pairwise split contract.
        assert_eq!(format_for_display("a **b"), "a <b>b</b>");
    }

    #[test]
    fn idempotent_on_marker_free_text() {
        for raw in ["plain text", "a & b", "already &amp; escaped", "it's \"fine\""] {
            let once = format_for_display(raw);
            let twice = format_for_display(&once);
            assert_eq!(once, twice, "not stable for {raw:?}");
        }
    }

    #[test]
    fn empty_input_formats_to_empty() {
        assert_eq!(format_for_display(""), "");
    }
}
