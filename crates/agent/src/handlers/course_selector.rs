use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
use pedrabotnik_core::domain::course::CourseFacts;
use pedrabotnik_core::domain::workflow::{ClientRef, HandlerKind};
use pedrabotnik_core::errors::WorkflowError;
use pedrabotnik_core::knowledge::{CourseRecord, KnowledgeSource, MAX_RECOMMENDATIONS};
use serde::Deserialize;
use tracing::debug;

use super::replies::{with_closing_line, NO_PROGRAM_REPLY};
use super::{decode_structured, escalate, run_persona, HandlerReply};
use crate::llm::LlmClient;
use crate::persona::PersonaConfig;
use crate::tools::ActionRegistry;

const HANDLER: HandlerKind = HandlerKind::CourseSelector;

pub struct CourseSelectorHandler {
    persona: PersonaConfig,
}

#[derive(Debug, Deserialize)]
struct CourseSelection {
    on_topic: bool,
    /// 1-based numbers of the offered programs.
    #[serde(default)]
    course_ids: Vec<i64>,
}

fn catalog_turn(facts: &CourseFacts, courses: &[CourseRecord]) -> ConversationTurn {
    let unknown = "не указано";
    let mut text = format!(
        "Собранные данные.\nТип обучения: {}\nУчреждение: {}\nНаправление: {}\n",
        facts.track.map(|track| track.label()).unwrap_or(unknown),
        facts.institution.map(|institution| institution.label()).unwrap_or(unknown),
        if facts.focus.is_empty() { unknown.to_owned() } else { facts.focus.join(", ") },
    );
    if courses.is_empty() {
        text.push_str("\nПодходящих программ в каталогах не найдено.\n");
    }
    for (index, course) in courses.iter().enumerate() {
        text.push_str(&format!("\nПрограмма {}.\n{}\n", index + 1, course.render_card()));
    }
    ConversationTurn::assistant(text)
}

/// Chosen programs in the model's order, without repeats or unknown numbers.
fn picked<'a>(courses: &'a [CourseRecord], course_ids: &[i64]) -> Vec<&'a CourseRecord> {
    let mut indices: Vec<usize> = Vec::new();
    for id in course_ids {
        let Some(index) = usize::try_from(*id).ok().and_then(|id| id.checked_sub(1)) else {
            continue;
        };
        if index < courses.len() && !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices.into_iter().take(MAX_RECOMMENDATIONS).map(|index| &courses[index]).collect()
}

impl CourseSelectorHandler {
    pub fn new(persona: PersonaConfig) -> Self {
        Self { persona }
    }

    pub async fn respond(
        &self,
        llm: &dyn LlmClient,
        transcript: &Transcript,
        knowledge: &dyn KnowledgeSource,
        actions: &ActionRegistry,
        client: &ClientRef,
    ) -> Result<HandlerReply, WorkflowError> {
        let facts = CourseFacts::detect(&transcript.user_texts(), &knowledge.focus_vocabulary());
        let missing = facts.first_missing();
        if let (true, Some(missing)) = (facts.is_course_request(), missing) {
            return Ok(HandlerReply::text(HANDLER, missing.question()));
        }

        let courses = if missing.is_none() { knowledge.recommend_courses(&facts) } else { Vec::new() };
        let context = transcript.with_context_turn(catalog_turn(&facts, &courses));
        let output = run_persona(llm, HANDLER, &self.persona, &context).await?;
        let selection: CourseSelection = decode_structured(HANDLER, output)?;

        if !selection.on_topic {
            debug!(event_name = "handler.course_selector.off_topic", "not a course request");
            return Ok(escalate(HANDLER, &self.persona, actions, client).await);
        }

        let chosen = picked(&courses, &selection.course_ids);
        debug!(
            event_name = "handler.course_selector.matched",
            offered = courses.len(),
            chosen = chosen.len(),
            focus = ?facts.focus,
            "course recommendations"
        );
        if chosen.is_empty() {
            return Ok(HandlerReply::text(HANDLER, with_closing_line(NO_PROGRAM_REPLY)));
        }

        let cards: Vec<String> = chosen.iter().map(|course| course.render_card()).collect();
        Ok(HandlerReply::text(HANDLER, with_closing_line(&cards.join("\n\n"))))
    }
}

#[cfg(test)]
mod tests {
    use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
    use pedrabotnik_core::domain::course::MissingFact;
    use pedrabotnik_core::domain::workflow::ClientRef;
    use serde_json::json;

    use super::CourseSelectorHandler;
    use crate::handlers::replies::{CLOSING_LINE, ESCALATION_REPLY, NO_PROGRAM_REPLY};
    use crate::handlers::testing::{actions, FixtureKnowledge, ScriptedModel};
    use crate::handlers::HandlerReply;
    use crate::llm::InferenceOutput;
    use crate::persona::{ActionRef, PersonaConfig};

    fn choosing(on_topic: bool, course_ids: &[i64]) -> ScriptedModel {
        ScriptedModel::default().answering(
            "course_selector",
            InferenceOutput::structured(json!({"on_topic": on_topic, "course_ids": course_ids})),
        )
    }

    async fn select(model: &ScriptedModel, transcript: Transcript) -> HandlerReply {
        CourseSelectorHandler::new(PersonaConfig::course_selector("m"))
            .respond(model, &transcript, &FixtureKnowledge, &actions(), &ClientRef::new("3", "3"))
            .await
            .expect("selector reply")
    }

    fn math_request() -> Transcript {
        Transcript::seeded(
            vec![
                ConversationTurn::user("Нужно повышение квалификации"),
                ConversationTurn::assistant("Где вы работаете?"),
            ],
            "В школе, учитель математики",
        )
    }

    #[tokio::test]
    async fn chosen_programs_are_rendered_from_the_catalog() {
        let model = choosing(true, &[1, 1, 7]);
        let reply = select(&model, math_request()).await;

        assert!(reply.output_text.starts_with("1) Название: Методика преподавания математики"));
        assert!(reply.output_text.contains("4) Ссылка: https://педработник.рф/math"));
        assert_eq!(reply.output_text.matches("1) Название:").count(), 1);
        assert!(reply.output_text.ends_with(CLOSING_LINE));

        let offered = model.last_context().await.expect("catalog turn");
        assert!(offered.contains("Тип обучения: Повышение квалификации"));
        assert!(offered.contains("Программа 1."));
    }

    #[tokio::test]
    async fn missing_fact_gets_one_question() {
        let model = choosing(true, &[]);
        let reply = select(&model, Transcript::seeded(Vec::new(), "Подберите курс переподготовки")).await;

        assert_eq!(reply.output_text, MissingFact::InstitutionType.question());
        assert!(model.calls().await.is_empty());
    }

    #[tokio::test]
    async fn no_choice_uses_fixed_sentence() {
        let model = choosing(true, &[]);
        let reply =
            select(&model, Transcript::seeded(Vec::new(), "Повышение квалификации, школа, учитель химии")).await;
        assert_eq!(reply.output_text, format!("{NO_PROGRAM_REPLY}\n\n{CLOSING_LINE}"));
    }

    #[tokio::test]
    async fn off_topic_request_escalates() {
        let model = choosing(false, &[]);
        let reply = select(&model, Transcript::seeded(Vec::new(), "Как вернуть деньги?")).await;

        assert_eq!(reply.output_text, ESCALATION_REPLY);
        assert!(reply.invoked(ActionRef::InviteAgent));
        assert_eq!(model.calls().await, vec!["course_selector"]);
    }
}
