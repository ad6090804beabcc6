//! Minimal `{{name}}` placeholder rendering for HTML email and page templates

use std::collections::HashMap;

/// Replace every `{{key}}` (whitespace inside the braces allowed) with its value.
///
/// Unknown placeholders render as an empty string so a missing link never
/// leaks template syntax into a sent email.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find("}}") {
            Some(end) => {
                let key = after_open[..end].trim();
                if let Some(value) = vars.get(key) {
                    output.push_str(value);
                }
                rest = &after_open[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_and_blanks_unknown() {
        let mut vars = HashMap::new();
        vars.insert("UserFullName", "Lan Nguyen".to_string());
        vars.insert("LINK", "https://example.org".to_string());

        let rendered = render("Hi {{ UserFullName }}, see {{LINK}}{{MISSING}}!", &vars);
        assert_eq!(rendered, "Hi Lan Nguyen, see https://example.org!");
    }

    #[test]
    fn test_render_keeps_unterminated_braces() {
        let vars = HashMap::new();
        assert_eq!(render("body {{ broken", &vars), "body {{ broken");
    }
}
