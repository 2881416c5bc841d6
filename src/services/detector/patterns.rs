use crate::config::find_pattern;
use crate::events::EventKind;

/// Классифицировать текст по паттернам ожидания и завершения.
///
/// Паттерны ожидания проверяются первыми: запрос подтверждения важнее
/// сообщения о завершении.
pub fn classify<'a>(
    text: &str,
    waiting_patterns: &'a [String],
    done_patterns: &'a [String],
) -> Option<(EventKind, &'a str)> {
    if let Some(pattern) = find_pattern(text, waiting_patterns) {
        return Some((EventKind::Waiting, pattern));
    }
    find_pattern(text, done_patterns).map(|pattern| (EventKind::Done, pattern))
}
