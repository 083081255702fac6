//! Fixed reply texts. They are sent verbatim.

pub const CLOSING_LINE: &str = "Подскажите, это помогло?";

pub const DOCUMENT_SUBMISSION_REPLY: &str = "Добрый день! Для отправки документов вы можете воспользоваться следующими способами:\n\n1. Загрузить документы в вашем личном кабинете на сайте Педработник.РФ, используя кнопку «Загрузка файлов».\n2. Отправить документы на электронную почту: 89081725519@mail.ru или 89185742875@mail.ru .\nЕсли у вас возникнут дополнительные вопросы, пожалуйста, дайте знать!";

pub const ESCALATION_REPLY: &str = "Благодарю за Ваше обращение! К сожалению, на данный вопрос я не могу предоставить полный ответ, так как он требует участия наших сотрудников. \nВы можете:\n- Позвонить нам в рабочее время с 9:00 до 18:00 (МСК) по бесплатному номеру +78002501015\n- Связаться напрямую с вашим персональным менеджером:\n\nКарина: +79515357410\nИрина: +79185742875\n\nНаши специалисты будут рады помочь вам и ответить на все вопросы. Спасибо за понимание!";

pub const MATERIALS_ACCESS_REPLY: &str = "После оплаты учебные материалы будут доступны в вашем личном кабинете на педработник.рф. Войдите в кабинет, нажмите «Учебные материалы и тесты», затем нажмите на активную синюю строку под стрелкой «Учебные материалы». Это ваше учебное пособие, которое вы изучаете самостоятельно и используете для итогового тестирования в назначенный день.";

pub const NO_PROGRAM_REPLY: &str = "К сожалению, этой программы нет на сайте.";

pub const CONTRACT_NUMBER_PROMPT: &str = "Пожалуйста, укажите номер вашего договора.";

/// Appends the closing line unless the text already ends with it.
pub fn with_closing_line(text: &str) -> String {
    let text = text.trim_end();
    if text.ends_with(CLOSING_LINE) {
        return text.to_owned();
    }
    format!("{text}\n\n{CLOSING_LINE}")
}
