//! Reference sections keyed by intent category, returned verbatim.
//!
//! Each section starts with a header line `[category]`, e.g. `[payment]`.

use std::collections::HashMap;

use crate::domain::intent::IntentCategory;

#[derive(Clone, Debug, Default)]
pub struct TopicStore {
    sections: HashMap<IntentCategory, String>,
}

fn header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

impl TopicStore {
    pub fn parse(raw: &str) -> Self {
        let mut sections = HashMap::new();
        let mut current: Option<IntentCategory> = None;
        let mut body = String::new();

        let mut flush = |current: Option<IntentCategory>, body: &mut String| {
            if let Some(category) = current {
                let text = body.trim();
                if !text.is_empty() {
                    sections.insert(category, text.to_owned());
                }
            }
            body.clear();
        };

        for line in raw.lines() {
            if let Some(name) = header(line) {
                flush(current, &mut body);
                // Unknown headers close the previous section and are skipped.
                current = name.parse::<IntentCategory>().ok();
                continue;
            }
            body.push_str(line);
            body.push('\n');
        }
        flush(current, &mut body);

        Self { sections }
    }

    pub fn section(&self, category: IntentCategory) -> Option<&str> {
        self.sections.get(&category).map(String::as_str)
    }

    pub fn categories(&self) -> Vec<IntentCategory> {
        IntentCategory::ALL.into_iter().filter(|category| self.sections.contains_key(category)).collect()
    }
}
