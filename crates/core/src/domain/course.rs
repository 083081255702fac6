//! Course-selection facts extracted from what the user has said so far.
//!
//! Three facts must be known before courses can be recommended: the track
//! (retraining or upskilling), the institution type, and the subject or role.

use serde::{Deserialize, Serialize};

use crate::text::{contains_any, normalize_text, stem, tokenize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseTrack {
    Retraining,
    Upskilling,
}

impl CourseTrack {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retraining => "Профессиональная переподготовка",
            Self::Upskilling => "Повышение квалификации",
        }
    }

    pub fn detect(text: &str) -> Option<Self> {
        let normalized = normalize_text(text);
        let retraining = normalized.contains("переподготов");
        let upskilling = normalized.contains("повышени") || normalized.contains("квалификац");
        match (retraining, upskilling) {
            (true, false) => Some(Self::Retraining),
            (false, true) => Some(Self::Upskilling),
            // "переподготовка с присвоением квалификации" still means retraining
            (true, true) if !normalized.contains("повышени") => Some(Self::Retraining),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionType {
    Preschool,
    School,
    College,
    AdditionalEducation,
    DrivingSchool,
}

impl InstitutionType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Preschool => "ДОУ",
            Self::School => "школа",
            Self::College => "колледж",
            Self::AdditionalEducation => "дополнительное образование",
            Self::DrivingSchool => "автошкола",
        }
    }

    /// Order matters: "автошкола" and "дошкольное" both contain "школ".
    pub fn detect(text: &str) -> Option<Self> {
        let normalized = normalize_text(text);
        let tokens = tokenize(&normalized);
        let has_token = |codes: &[&str]| tokens.iter().any(|token| codes.contains(&token.as_str()));

        if contains_any(&normalized, &["автошкол", "вождени", "автоинструктор"]) {
            return Some(Self::DrivingSchool);
        }
        if has_token(&["доу", "дс"])
            || contains_any(&normalized, &["детский сад", "детском саду", "детсад", "дошкол", "садик"])
        {
            return Some(Self::Preschool);
        }
        if has_token(&["спо"]) || contains_any(&normalized, &["колледж", "техникум", "училищ"]) {
            return Some(Self::College);
        }
        if has_token(&["дод"])
            || contains_any(
                &normalized,
                &["доп.образ", "доп образ", "допобраз", "дополнительн", "дом творчества", "кружк"],
            )
        {
            return Some(Self::AdditionalEducation);
        }
        if has_token(&["сош"]) || contains_any(&normalized, &["школ", "гимнази", "лицей", "лицее"]) {
            return Some(Self::School);
        }
        None
    }
}

const BUILTIN_FOCUS_PREFIXES: &[&str] = &[
    "учител", "педагог", "воспитател", "преподава", "логопед", "психолог", "дефектолог",
    "тьютор", "вожат", "инструктор", "методист", "мастер", "руководител", "директор",
    "заведующ", "завуч", "библиотекар", "музык", "хореограф", "математ", "алгебр", "геометр",
    "русск", "литератур", "английск", "немецк", "французск", "иностран", "истори",
    "обществозн", "географ", "биолог", "хими", "физик", "физическ", "физкульт", "информатик",
    "труд", "технолог", "рисован", "черчен", "экономик", "астроном", "начальн", "коррекц",
    "бухгалтер", "тренер", "дизайн", "обж", "изо",
];

/// Stems too generic to count as a subject or role on their own.
const GENERIC_STEMS: &[&str] = &[
    "образ", "учреж", "орган", "работ", "деяте", "сфере", "облас", "профе", "квали", "перепо",
    "повыш", "курс", "курсы", "прогр", "обуче", "специ", "общег", "средн", "высше",
];

/// Prefixes recognised as a subject or role focus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusVocabulary {
    prefixes: Vec<String>,
}

impl Default for FocusVocabulary {
    fn default() -> Self {
        Self { prefixes: BUILTIN_FOCUS_PREFIXES.iter().map(|prefix| (*prefix).to_owned()).collect() }
    }
}

impl FocusVocabulary {
    /// Adds stems of catalog profession keywords.
    pub fn extend_with_keywords<'a, I>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for keyword in keywords {
            for token in tokenize(keyword) {
                if token.chars().count() < 4 {
                    continue;
                }
                let keyword_stem = stem(&token);
                if GENERIC_STEMS.contains(&keyword_stem.as_str())
                    || self.prefixes.iter().any(|prefix| *prefix == keyword_stem)
                {
                    continue;
                }
                self.prefixes.push(keyword_stem);
            }
        }
    }

    fn matches(&self, token: &str) -> bool {
        // Two- and three-letter codes ("изо", "обж") must match exactly.
        self.prefixes.iter().any(|prefix| {
            if prefix.chars().count() <= 3 {
                token == prefix
            } else {
                token.starts_with(prefix.as_str())
            }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFact {
    Track,
    InstitutionType,
    Focus,
}

impl MissingFact {
    pub fn question(&self) -> &'static str {
        match self {
            Self::Track => "Вас интересует профессиональная переподготовка или повышение квалификации?",
            Self::InstitutionType => {
                "Где вы работаете: ДОУ, школа, колледж, дополнительное образование или автошкола?"
            }
            Self::Focus => "Какое направление, должность или предмет вам нужен?",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFacts {
    pub track: Option<CourseTrack>,
    pub institution: Option<InstitutionType>,
    /// Subject or role words as the user wrote them (normalized, deduplicated).
    pub focus: Vec<String>,
    pub mentions_courses: bool,
}

impl CourseFacts {
    /// Later messages override earlier ones for track and institution.
    pub fn detect<S>(user_texts: &[S], vocabulary: &FocusVocabulary) -> Self
    where
        S: AsRef<str>,
    {
        let mut facts = Self::default();
        for text in user_texts {
            let text = text.as_ref();
            if let Some(track) = CourseTrack::detect(text) {
                facts.track = Some(track);
            }
            if let Some(institution) = InstitutionType::detect(text) {
                facts.institution = Some(institution);
            }
            let normalized = normalize_text(text);
            if contains_any(&normalized, &["курс", "программ", "подбер", "подобр", "обучени"]) {
                facts.mentions_courses = true;
            }
            for token in tokenize(&normalized) {
                if vocabulary.matches(&token) && !facts.focus.contains(&token) {
                    facts.focus.push(token);
                }
            }
        }
        facts
    }

    /// The most critical missing fact, if any.
    pub fn first_missing(&self) -> Option<MissingFact> {
        if self.track.is_none() {
            Some(MissingFact::Track)
        } else if self.institution.is_none() {
            Some(MissingFact::InstitutionType)
        } else if self.focus.is_empty() {
            Some(MissingFact::Focus)
        } else {
            None
        }
    }

    pub fn is_course_request(&self) -> bool {
        self.mentions_courses
            || self.track.is_some()
            || self.institution.is_some()
            || !self.focus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{CourseFacts, CourseTrack, FocusVocabulary, InstitutionType, MissingFact};

    #[test]
    fn detects_track_from_common_phrasings() {
        assert_eq!(CourseTrack::detect("хочу курс повышения квалификации"), Some(CourseTrack::Upskilling));
        assert_eq!(CourseTrack::detect("нужна профпереподготовка"), Some(CourseTrack::Retraining));
        assert_eq!(
            CourseTrack::detect("переподготовка с присвоением квалификации"),
            Some(CourseTrack::Retraining)
        );
        assert_eq!(CourseTrack::detect("переподготовка или повышение?"), None);
    }

    #[test]
    fn driving_school_and_preschool_are_not_mistaken_for_school() {
        assert_eq!(InstitutionType::detect("работаю в автошколе"), Some(InstitutionType::DrivingSchool));
        assert_eq!(InstitutionType::detect("дошкольное учреждение"), Some(InstitutionType::Preschool));
        assert_eq!(InstitutionType::detect("я воспитатель в ДОУ"), Some(InstitutionType::Preschool));
        assert_eq!(InstitutionType::detect("учитель в школе"), Some(InstitutionType::School));
        assert_eq!(InstitutionType::detect("техникум"), Some(InstitutionType::College));
        assert_eq!(
            InstitutionType::detect("педагог доп образования"),
            Some(InstitutionType::AdditionalEducation)
        );
        assert_eq!(InstitutionType::detect("просто вопрос"), None);
    }

    #[test]
    fn upskilling_without_institution_or_focus_asks_for_institution() {
        let facts = CourseFacts::detect(&["хочу курс повышения квалификации"], &FocusVocabulary::default());

        assert_eq!(facts.track, Some(CourseTrack::Upskilling));
        assert!(facts.focus.is_empty());
        assert_eq!(facts.first_missing(), Some(MissingFact::InstitutionType));
        assert!(facts.is_course_request());
    }

    #[test]
    fn facts_accumulate_across_messages() {
        let facts = CourseFacts::detect(
            &["нужна переподготовка", "работаю в школе", "учитель технологии"],
            &FocusVocabulary::default(),
        );

        assert_eq!(facts.track, Some(CourseTrack::Retraining));
        assert_eq!(facts.institution, Some(InstitutionType::School));
        assert_eq!(facts.focus, vec!["учитель", "технологии"]);
        assert_eq!(facts.first_missing(), None);
    }

    #[test]
    fn catalog_keywords_extend_the_vocabulary() {
        let mut vocabulary = FocusVocabulary::default();
        vocabulary.extend_with_keywords(["Сурдопедагогика", "образование"]);

        let facts = CourseFacts::detect(&["интересует сурдопедагогика"], &vocabulary);
        assert_eq!(facts.focus, vec!["сурдопедагогика"]);

        let generic = CourseFacts::detect(&["дополнительное образование"], &vocabulary);
        assert!(generic.focus.is_empty());
    }
}
