//! Deterministic PII detection and masking.
//!
//! Recognizes e-mail addresses, phone numbers and card-like digit runs and
//! replaces each match with an entity placeholder.

use std::collections::BTreeMap;

const MAX_SEPARATOR_RUN: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PiiEntity {
    EmailAddress,
    PhoneNumber,
    CreditCard,
}

impl PiiEntity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EmailAddress => "EMAIL_ADDRESS",
            Self::PhoneNumber => "PHONE_NUMBER",
            Self::CreditCard => "CREDIT_CARD",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::EmailAddress => "<EMAIL_ADDRESS>",
            Self::PhoneNumber => "<PHONE_NUMBER>",
            Self::CreditCard => "<CREDIT_CARD>",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "EMAIL_ADDRESS" | "EMAIL" => Some(Self::EmailAddress),
            "PHONE_NUMBER" | "PHONE" => Some(Self::PhoneNumber),
            "CREDIT_CARD" | "CARD" => Some(Self::CreditCard),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    /// Entity name to the original matches, in order of appearance.
    pub detected: BTreeMap<String, Vec<String>>,
}

impl MaskedText {
    pub fn has_detections(&self) -> bool {
        !self.detected.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PiiMasker {
    entities: Vec<PiiEntity>,
}

impl Default for PiiMasker {
    fn default() -> Self {
        Self {
            entities: vec![PiiEntity::EmailAddress, PiiEntity::PhoneNumber, PiiEntity::CreditCard],
        }
    }
}

impl PiiMasker {
    /// Unknown entity names are ignored; an empty list means all entities.
    pub fn for_entities(names: &[String]) -> Self {
        let entities: Vec<PiiEntity> = names.iter().filter_map(|name| PiiEntity::from_name(name)).collect();
        if entities.is_empty() {
            Self::default()
        } else {
            Self { entities }
        }
    }

    pub fn mask(&self, text: &str) -> MaskedText {
        let mut detected: BTreeMap<String, Vec<String>> = BTreeMap::new();

        let text = if self.entities.contains(&PiiEntity::EmailAddress) {
            mask_emails(text, &mut detected)
        } else {
            text.to_owned()
        };
        let text = mask_numbers(&text, &self.entities, &mut detected);

        MaskedText { text, detected }
    }
}

fn record(detected: &mut BTreeMap<String, Vec<String>>, entity: PiiEntity, matched: &str) {
    detected.entry(entity.name().to_owned()).or_default().push(matched.to_owned());
}

fn is_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local.chars().all(|ch| ch.is_alphanumeric() || "._%+-".contains(ch));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty() && label.chars().all(|ch| ch.is_alphanumeric() || ch == '-')
        });
    let tld_ok = labels
        .last()
        .map(|tld| tld.chars().count() >= 2 && tld.chars().all(char::is_alphabetic))
        .unwrap_or(false);
    local_ok && domain_ok && tld_ok
}

fn mask_emails(text: &str, detected: &mut BTreeMap<String, Vec<String>>) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in text.split_inclusive(char::is_whitespace) {
        let word = piece.trim_end_matches(char::is_whitespace);
        let trailing_ws = &piece[word.len()..];
        let core = word.trim_matches(|ch: char| ",.;:!?()<>«»\"'".contains(ch));

        if !core.is_empty() && is_email(core) {
            let start = word.find(core).unwrap_or(0);
            out.push_str(&word[..start]);
            out.push_str(PiiEntity::EmailAddress.placeholder());
            out.push_str(&word[start + core.len()..]);
            record(detected, PiiEntity::EmailAddress, core);
        } else {
            out.push_str(word);
        }
        out.push_str(trailing_ws);
    }
    out
}

fn is_separator(ch: char) -> bool {
    matches!(ch, ' ' | '-' | '(' | ')' | '\u{a0}')
}

/// Returns the end (exclusive) of a number starting at `start` and its digit count.
fn scan_number(chars: &[char], start: usize) -> (usize, usize) {
    let mut index = start;
    if chars[index] == '+' {
        index += 1;
    }
    let mut end = index;
    let mut digits = 0;
    let mut separators = 0;
    while let Some(&ch) = chars.get(index) {
        if ch.is_ascii_digit() {
            digits += 1;
            separators = 0;
            index += 1;
            end = index;
        } else if is_separator(ch) && separators < MAX_SEPARATOR_RUN {
            separators += 1;
            index += 1;
        } else {
            break;
        }
    }
    (end, digits)
}

fn classify_digits(digits: usize) -> Option<PiiEntity> {
    match digits {
        13..=19 => Some(PiiEntity::CreditCard),
        10..=12 => Some(PiiEntity::PhoneNumber),
        _ => None,
    }
}

fn mask_numbers(
    text: &str,
    entities: &[PiiEntity],
    detected: &mut BTreeMap<String, Vec<String>>,
) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let opens_number = ch.is_ascii_digit()
            || (ch == '+' && chars.get(index + 1).map(char::is_ascii_digit).unwrap_or(false));
        let glued_to_word = index > 0 && chars[index - 1].is_alphanumeric();

        if !opens_number || glued_to_word {
            out.push(ch);
            index += 1;
            continue;
        }

        let (end, digits) = scan_number(&chars, index);
        let matched: String = chars[index..end].iter().collect();
        let followed_by_word = chars.get(end).map(|next| next.is_alphanumeric()).unwrap_or(false);

        match classify_digits(digits).filter(|entity| entities.contains(entity)) {
            Some(entity) if !followed_by_word => {
                out.push_str(entity.placeholder());
                record(detected, entity, &matched);
            }
            _ => out.push_str(&matched),
        }
        index = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{PiiEntity, PiiMasker};

    #[test]
    fn masks_email_and_keeps_punctuation() {
        let masked = PiiMasker::default().mask("Пишите на ivan.petrov@mail.ru, спасибо");
        assert_eq!(masked.text, "Пишите на <EMAIL_ADDRESS>, спасибо");
        assert_eq!(masked.detected["EMAIL_ADDRESS"], vec!["ivan.petrov@mail.ru"]);
    }

    #[test]
    fn masks_formatted_phone_numbers() {
        let masked = PiiMasker::default().mask("Мой телефон +7 (918) 574-28-75, звоните");
        assert_eq!(masked.text, "Мой телефон <PHONE_NUMBER>, звоните");
        assert_eq!(masked.detected["PHONE_NUMBER"].len(), 1);
    }

    #[test]
    fn masks_card_like_runs() {
        let masked = PiiMasker::default().mask("карта 4276 1600 1234 5678");
        assert_eq!(masked.text, "карта <CREDIT_CARD>");
    }

    #[test]
    fn short_numbers_and_contract_ids_survive() {
        let masked = PiiMasker::default().mask("Договор 1001 от 12.03.2024, сумма 5 000 руб.");
        assert_eq!(masked.text, "Договор 1001 от 12.03.2024, сумма 5 000 руб.");
        assert!(!masked.has_detections());
    }

    #[test]
    fn entity_filter_limits_masking() {
        let masker = PiiMasker::for_entities(&["EMAIL_ADDRESS".to_owned()]);
        let masked = masker.mask("a@b.ru 89181234567");
        assert_eq!(masked.text, "<EMAIL_ADDRESS> 89181234567");
        assert_eq!(PiiEntity::from_name("phone"), Some(PiiEntity::PhoneNumber));
    }
}
