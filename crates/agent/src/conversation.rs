//! Phrase lexicons and the post-processing applied to the classifier output.
//!
//! The model proposes a classification; [`ClassificationRules`] makes the
//! routing-critical parts of it deterministic.

use pedrabotnik_core::domain::conversation::Transcript;
use pedrabotnik_core::domain::course::{CourseFacts, FocusVocabulary};
use pedrabotnik_core::domain::intent::{IntentCategory, IntentClassification};
use pedrabotnik_core::text::{contains_any, normalize_text, tokenize};

/// Confidence assigned when a lexicon rule decides the category.
pub const LEXICON_CONFIDENCE: f64 = 0.9;

pub const OTHER_QUESTION_PROMPT: &str = "Уточните, пожалуйста, какой у вас вопрос?";

const CONTRACT_STATUS_PHRASES: &[&str] = &[
    "статус договора",
    "по договору",
    "номер договора",
    "мой договор",
    "договор №",
    "трек-номер",
    "трек номер",
    "трекномер",
    "номер трека",
    "трек посылки",
    "получены ли документы",
    "получили ли вы",
    "получили мои",
    "вы получили",
    "документы получены",
    "документы дошли",
    "дошли ли",
    "отправил диплом",
    "отправила диплом",
    "отправил документы",
    "отправила документы",
    "отправил удостоверение",
    "проверьте мой заказ",
    "проверьте заказ",
    "проверьте договор",
    "проверьте мой договор",
    "статус удостоверения",
    "статус диплома",
    "отправлено ли удостоверение",
    "когда отправите удостоверение",
    "когда отправите диплом",
    "когда придет удостоверение",
    "когда придет диплом",
    "статус оплаты",
    "прошла ли оплата",
    "оплата прошла",
];

const SUBMISSION_PHRASES: &[&str] = &[
    "куда прислать",
    "куда отправить",
    "куда прикрепить",
    "куда загрузить",
    "куда направить",
    "куда скинуть",
    "как отправить документы",
    "как прислать документы",
    "как прикрепить документы",
    "как загрузить документы",
    "как передать документы",
];

const ALREADY_SENT_PHRASES: &[&str] = &[
    "уже отправил",
    "уже отправила",
    "уже отправили",
    "уже прислал",
    "уже прислала",
    "уже загрузил",
    "уже загрузила",
    "вы получили",
    "получили ли вы",
    "дошли ли",
    "документы дошли",
];

const MATERIALS_CONTEXT: &[&str] = &["учебн", "доступ", "где ", "найти", "открыть", "посмотреть", "курса"];

const DATA_CHANGE_PHRASES: &[&str] = &[
    "измен",
    "поменя",
    "исправ",
    "сменить",
    "заменить",
    "обновить данные",
    "новый адрес",
    "новый телефон",
    "другой адрес",
    "реквизит",
    "ошибка в фио",
    "ошибку в фио",
];

const CONTRACT_CONTEXT: &[&str] = &["договор", "№", "заказ"];

const CONTRACT_WORDS: &[&str] = &["договор", "заказ"];

pub fn is_contract_status_request(text: &str) -> bool {
    contains_any(&normalize_text(text), CONTRACT_STATUS_PHRASES)
}

pub fn is_submission_request(text: &str) -> bool {
    contains_any(&normalize_text(text), SUBMISSION_PHRASES)
}

pub fn is_already_sent_notice(text: &str) -> bool {
    contains_any(&normalize_text(text), ALREADY_SENT_PHRASES)
}

pub fn is_materials_access_request(text: &str) -> bool {
    let normalized = normalize_text(text);
    normalized.contains("материал") && contains_any(&normalized, MATERIALS_CONTEXT)
}

pub fn is_data_change_request(text: &str) -> bool {
    contains_any(&normalize_text(text), DATA_CHANGE_PHRASES)
}

fn as_contract_number(token: &str) -> Option<i64> {
    if (3..=12).contains(&token.len()) && token.chars().all(|ch| ch.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// Digits written right after a `№` sign.
fn number_after_sign(text: &str) -> Option<i64> {
    text.split('№').skip(1).find_map(|rest| {
        let digits: String = rest.trim_start().chars().take_while(char::is_ascii_digit).collect();
        as_contract_number(&digits)
    })
}

/// Number following a contract word, as in "договор 1001" or "договора номер 1001".
fn number_after_contract_word(tokens: &[String]) -> Option<i64> {
    tokens.iter().enumerate().find_map(|(index, token)| {
        if !CONTRACT_WORDS.iter().any(|word| token.starts_with(word)) {
            return None;
        }
        tokens[index + 1..]
            .iter()
            .find(|next| next.as_str() != "номер")
            .and_then(|next| as_contract_number(next))
    })
}

/// A number of 3 to 12 digits. A number after `№` or a contract word wins; otherwise
/// the first number counts when the text mentions a contract or is the number alone.
pub fn extract_contract_number(text: &str) -> Option<i64> {
    if let Some(number) = number_after_sign(text) {
        return Some(number);
    }

    let tokens = tokenize(text);
    if let Some(number) = number_after_contract_word(&tokens) {
        return Some(number);
    }

    let mentions_contract = contains_any(&normalize_text(text), CONTRACT_CONTEXT);
    if mentions_contract || tokens.len() == 1 {
        tokens.iter().find_map(|token| as_contract_number(token))
    } else {
        None
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClassificationRules {
    vocabulary: FocusVocabulary,
}

impl ClassificationRules {
    pub fn new(vocabulary: FocusVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn apply(
        &self,
        mut classification: IntentClassification,
        transcript: &Transcript,
    ) -> IntentClassification {
        classification.confidence = if classification.confidence.is_nan() {
            0.0
        } else {
            classification.confidence.clamp(0.0, 1.0)
        };

        let latest = transcript.latest_user_text().unwrap_or_default();
        if is_contract_status_request(&latest) {
            classification.category = IntentCategory::ContractSupport;
            classification.confidence = classification.confidence.max(LEXICON_CONFIDENCE);
        } else if is_submission_request(&latest) {
            classification.category = IntentCategory::DocumentsSubmission;
            classification.confidence = classification.confidence.max(LEXICON_CONFIDENCE);
        }

        classification.needs_contract_number =
            classification.category == IntentCategory::ContractSupport;

        match classification.category {
            IntentCategory::CourseSelection => {
                let facts = CourseFacts::detect(&transcript.user_texts(), &self.vocabulary);
                match facts.first_missing() {
                    Some(missing) => {
                        classification.needs_clarification = true;
                        if classification.clarification_question.trim().is_empty() {
                            classification.clarification_question = missing.question().to_owned();
                        }
                    }
                    None => classification.needs_clarification = false,
                }
            }
            IntentCategory::OtherQuestion => {
                classification.needs_clarification = true;
                if classification.clarification_question.trim().is_empty() {
                    classification.clarification_question = OTHER_QUESTION_PROMPT.to_owned();
                }
            }
            _ => classification.needs_clarification = false,
        }

        if !classification.needs_clarification {
            classification.clarification_question.clear();
        }
        classification
    }
}

#[cfg(test)]
mod tests {
    use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
    use pedrabotnik_core::domain::course::MissingFact;
    use pedrabotnik_core::domain::intent::{IntentCategory, IntentClassification};

    use super::{
        extract_contract_number, is_already_sent_notice, is_contract_status_request,
        is_data_change_request, is_materials_access_request, is_submission_request, ClassificationRules,
    };

    fn proposal(category: IntentCategory, confidence: f64) -> IntentClassification {
        IntentClassification {
            category,
            confidence,
            needs_clarification: false,
            clarification_question: String::new(),
            needs_contract_number: false,
        }
    }

    fn transcript(text: &str) -> Transcript {
        Transcript::seeded(Vec::new(), text)
    }

    #[test]
    fn contract_phrasing_overrides_the_model() {
        let rules = ClassificationRules::default();
        let result = rules.apply(
            proposal(IntentCategory::Payment, 0.4),
            &transcript("Подскажите статус договора 1001, прошла ли оплата?"),
        );

        assert_eq!(result.category, IntentCategory::ContractSupport);
        assert!(result.needs_contract_number);
        assert!(!result.requires_clarifier());
    }

    #[test]
    fn submission_phrasing_never_needs_a_contract_number() {
        let rules = ClassificationRules::default();
        let mut model = proposal(IntentCategory::ContractSupport, 0.95);
        model.needs_contract_number = true;

        let result = rules.apply(model, &transcript("Куда прислать документы об образовании?"));

        assert_eq!(result.category, IntentCategory::DocumentsSubmission);
        assert!(!result.needs_contract_number);
    }

    #[test]
    fn course_selection_asks_for_the_first_missing_fact() {
        let rules = ClassificationRules::default();
        let result = rules.apply(
            proposal(IntentCategory::CourseSelection, 0.92),
            &transcript("Нужна переподготовка"),
        );

        assert!(result.needs_clarification);
        assert_eq!(result.clarification_question, MissingFact::InstitutionType.question());
    }

    #[test]
    fn complete_course_request_goes_straight_to_selection() {
        let rules = ClassificationRules::default();
        let history = Transcript::seeded(
            vec![
                ConversationTurn::user("Нужно повышение квалификации"),
                ConversationTurn::assistant("Где вы работаете?"),
            ],
            "В школе, учитель математики",
        );
        let mut model = proposal(IntentCategory::CourseSelection, 0.9);
        model.needs_clarification = true;
        model.clarification_question = "Какой предмет?".to_owned();

        let result = rules.apply(model, &history);

        assert!(!result.needs_clarification);
        assert!(result.clarification_question.is_empty());
    }

    #[test]
    fn other_question_always_clarifies_and_confidence_is_clamped() {
        let rules = ClassificationRules::default();
        let result = rules.apply(proposal(IntentCategory::OtherQuestion, 1.7), &transcript("Другой вопрос"));

        assert!(result.needs_clarification);
        assert_eq!(result.confidence, 1.0);
        assert!(!result.clarification_question.is_empty());

        let nan = rules.apply(proposal(IntentCategory::Payment, f64::NAN), &transcript("оплата"));
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn contract_numbers_need_context_or_a_bare_reply() {
        assert_eq!(extract_contract_number("Договор №10234, что с оплатой?"), Some(10234));
        assert_eq!(extract_contract_number("10234"), Some(10234));
        assert_eq!(extract_contract_number("курс на 144 часа"), None);
        assert_eq!(extract_contract_number("номер договора не помню"), None);
    }

    #[test]
    fn contract_number_prefers_the_sign_and_the_contract_word() {
        assert_eq!(extract_contract_number("договор от 2024 года №1001"), Some(1001));
        assert_eq!(extract_contract_number("По договору номер 1234 от 2023 года"), Some(1234));
        assert_eq!(extract_contract_number("заказ 5555, оплачен в 2024"), Some(5555));
    }

    #[test]
    fn phone_number_is_not_a_contract_number() {
        assert_eq!(extract_contract_number("мой номер телефона 89181234567"), None);
        assert_eq!(extract_contract_number("номер 1001"), None);
    }

    #[test]
    fn tracking_phrases_match_whole_words_only() {
        assert!(is_contract_status_request("Какой трек-номер у посылки?"));
        assert!(is_contract_status_request("пришлите номер трека"));
        assert!(!is_contract_status_request("Нарисовали стрекозу на занятии"));
        assert!(!is_contract_status_request("Расскажите про курс, стрекоза"));
    }

    #[test]
    fn handler_lexicons() {
        assert!(is_submission_request("Как отправить документы об образовании?"));
        assert!(is_already_sent_notice("Я уже отправила диплом, вы получили?"));
        assert!(is_materials_access_request("Где найти учебные материалы?"));
        assert!(!is_materials_access_request("Какие материалы нужны для поступления"));
        assert!(is_data_change_request("Нужно изменить адрес доставки"));
        assert!(!is_data_change_request("Какой статус договора?"));
    }
}
