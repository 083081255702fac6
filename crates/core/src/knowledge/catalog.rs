//! Course catalogs (retraining and upskilling) and the matching used to
//! recommend programs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::course::{CourseFacts, CourseTrack, InstitutionType};
use crate::text::tokenize;

pub const MAX_RECOMMENDATIONS: usize = 3;

const MATCH_KEY_LEN: usize = 4;
const LABOUR_KEY: &str = "труд";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::None => Vec::new(),
            Self::One(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub course_name: String,
    #[serde(default)]
    pub course_type: String,
    #[serde(default)]
    pub pricing_and_course_length: Value,
    #[serde(default)]
    pub course_page_link: String,
    #[serde(default)]
    pub education_level: OneOrMany,
    #[serde(default)]
    pub professions: OneOrMany,
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_owned(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| format!("{key}: {}", render_value(value)))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

impl CourseRecord {
    /// Every pricing/length option, as written in the catalog.
    pub fn pricing_text(&self) -> String {
        render_value(&self.pricing_and_course_length)
    }

    pub fn render_card(&self) -> String {
        format!(
            "1) Название: {}\n2) Тип: {}\n3) Стоимость и длительность: {}\n4) Ссылка: {}",
            self.course_name.trim(),
            self.course_type.trim(),
            self.pricing_text(),
            self.course_page_link.trim()
        )
    }

    /// Courses with no recognisable level are open to every institution.
    fn fits_institution(&self, institution: Option<InstitutionType>) -> bool {
        let Some(institution) = institution else {
            return true;
        };
        let detected: Vec<InstitutionType> =
            self.education_level.values().into_iter().filter_map(InstitutionType::detect).collect();
        detected.is_empty() || detected.contains(&institution)
    }

    fn score(&self, focus_keys: &[String]) -> u32 {
        let name_keys = match_keys(&self.course_name);
        let profession_keys: Vec<String> =
            self.professions.values().into_iter().flat_map(match_keys).collect();

        let mut score = 0;
        for key in focus_keys {
            if name_keys.contains(key) {
                score += 2;
            }
            if profession_keys.contains(key) {
                score += 1;
            }
        }
        if focus_keys.iter().any(|key| key == LABOUR_KEY) && name_keys.iter().any(|key| key == LABOUR_KEY) {
            score += 3;
        }
        score
    }
}

/// "труд" and "технология" share one key; other words compare on a short prefix.
fn match_key(token: &str) -> Option<String> {
    if token.chars().count() < 3 {
        return None;
    }
    if token.starts_with(LABOUR_KEY) || token.starts_with("технолог") {
        return Some(LABOUR_KEY.to_owned());
    }
    Some(token.chars().take(MATCH_KEY_LEN).collect())
}

fn match_keys(text: &str) -> Vec<String> {
    tokenize(text).iter().filter_map(|token| match_key(token)).collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<CourseRecord>),
    Wrapped { courses: Vec<CourseRecord> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CourseCatalog {
    pub track: CourseTrack,
    courses: Vec<CourseRecord>,
}

impl CourseCatalog {
    pub fn new(track: CourseTrack, courses: Vec<CourseRecord>) -> Self {
        Self { track, courses }
    }

    pub fn empty(track: CourseTrack) -> Self {
        Self::new(track, Vec::new())
    }

    /// Accepts a bare array of records or `{ "courses": [...] }`.
    pub fn parse(track: CourseTrack, raw: &str) -> Result<Self, serde_json::Error> {
        let courses = match serde_json::from_str::<CatalogDocument>(raw)? {
            CatalogDocument::List(courses) | CatalogDocument::Wrapped { courses } => courses,
        };
        Ok(Self::new(track, courses))
    }

    pub fn courses(&self) -> &[CourseRecord] {
        &self.courses
    }

    pub fn profession_keywords(&self) -> impl Iterator<Item = &str> {
        self.courses.iter().flat_map(|course| course.professions.values())
    }

    /// Up to three matching courses, best first; catalog order breaks ties.
    pub fn recommend(&self, facts: &CourseFacts) -> Vec<&CourseRecord> {
        if facts.track.is_some_and(|track| track != self.track) {
            return Vec::new();
        }
        let focus_keys: Vec<String> = facts.focus.iter().filter_map(|token| match_key(token)).collect();
        if focus_keys.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(u32, usize, &CourseRecord)> = self
            .courses
            .iter()
            .enumerate()
            .filter(|(_, course)| course.fits_institution(facts.institution))
            .map(|(index, course)| (course.score(&focus_keys), index, course))
            .filter(|(score, _, _)| *score > 0)
            .collect();
        scored.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.cmp(&right.1)));
        scored.into_iter().take(MAX_RECOMMENDATIONS).map(|(_, _, course)| course).collect()
    }
}
