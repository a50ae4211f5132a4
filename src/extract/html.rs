/// Strip markup from an HTML payload, dropping `<script>`, `<style>` and
/// comment blocks wholesale. Tags are replaced by a space so adjacent
/// words do not fuse; the caller normalizes whitespace afterwards.
pub fn strip_tags(html: &str) -> String {
    // ASCII-only lowercasing keeps byte offsets aligned with the input.
    let mut lower = html.to_string();
    lower.make_ascii_lowercase();

    let mut result = String::with_capacity(html.len() / 2);
    let mut pos = 0;

    while pos < html.len() {
        let Some(rel) = html[pos..].find('<') else {
            result.push_str(&html[pos..]);
            break;
        };
        let tag_start = pos + rel;
        result.push_str(&html[pos..tag_start]);
        result.push(' ');

        let rest = &lower[tag_start..];
        pos = if rest.starts_with("<script") {
            match rest.find("</script>") {
                Some(end) => tag_start + end + "</script>".len(),
                None => break,
            }
        } else if rest.starts_with("<style") {
            match rest.find("</style>") {
                Some(end) => tag_start + end + "</style>".len(),
                None => break,
            }
        } else if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => tag_start + end + "-->".len(),
                None => break,
            }
        } else {
            match rest.find('>') {
                Some(end) => tag_start + end + 1,
                None => break,
            }
        };
    }

    decode_entities(&result)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
