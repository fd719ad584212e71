use std::collections::HashMap;

pub struct TemplateEngine;

impl TemplateEngine {
    /// Render a template string by replacing {{variable}} placeholders with actual values.
    ///
    /// A line whose only variables all resolve to empty strings is left out
    /// entirely, so optional frontmatter fields vanish instead of rendering
    /// as `key: `. Unknown placeholders are kept verbatim.
    pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
        let mut lines = Vec::new();

        for line in template.split('\n') {
            let referenced: Vec<&String> = variables
                .iter()
                .filter(|(key, _)| line.contains(&placeholder(key)))
                .map(|(_, value)| value)
                .collect();
            if !referenced.is_empty() && referenced.iter().all(|value| value.is_empty()) {
                continue;
            }

            let mut rendered = line.to_string();
            for (key, value) in variables {
                rendered = rendered.replace(&placeholder(key), value);
            }
            lines.push(rendered);
        }

        lines.join("\n")
    }
}

fn placeholder(key: &str) -> String {
    format!("{{{{{key}}}}}")
}
