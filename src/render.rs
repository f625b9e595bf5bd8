//! Terminal rendering of a streaming assistant turn.
//!
//! The store always holds full snapshots; the renderer remembers what it has
//! already printed for the current turn and only emits what changed.

use colored::*;

use crate::events::JobStatus;
use crate::transcript::ChatTurn;

#[derive(Debug, Default)]
pub struct Renderer {
    show_thinking: bool,
    last_status: Option<JobStatus>,
    last_sub_queries: Vec<String>,
    printed_steps: usize,
    finished: bool,
}

impl Renderer {
    pub fn new(show_thinking: bool) -> Self {
        Self {
            show_thinking,
            ..Self::default()
        }
    }

    /// Forget the previous turn.
    pub fn reset(&mut self) {
        *self = Self::new(self.show_thinking);
    }

    /// Lines to print for `turn` since the last call.
    pub fn render(&mut self, turn: &ChatTurn) -> Vec<String> {
        let mut lines = Vec::new();
        if self.finished {
            return lines;
        }

        if let Some(status) = turn.status() {
            if self.last_status.as_ref() != Some(status) {
                lines.push(format!("{} {}", "::".dimmed(), status.label().cyan()));
                self.last_status = Some(status.clone());
            }
        }

        if !turn.sub_queries().is_empty() && turn.sub_queries() != self.last_sub_queries.as_slice() {
            lines.push("Sub-queries:".bold().to_string());
            for (i, q) in turn.sub_queries().iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, q));
            }
            self.last_sub_queries = turn.sub_queries().to_vec();
        }

        if self.show_thinking {
            let steps = turn.thinking_steps();
            if steps.len() < self.printed_steps {
                self.printed_steps = 0;
            }
            for step in &steps[self.printed_steps..] {
                lines.push(format!("  {} {}", "~".dimmed(), step.title().dimmed()));
            }
            self.printed_steps = steps.len();
        }

        if turn.is_terminal() {
            lines.extend(self.render_final(turn));
            self.finished = true;
        }
        lines
    }

    fn render_final(&self, turn: &ChatTurn) -> Vec<String> {
        let mut lines = vec![String::new()];
        if let Some(err) = turn.error() {
            lines.push(format!("{} {}", "error:".red().bold(), err));
        }
        if !turn.content().is_empty() {
            lines.push(turn.content().to_string());
        }
        if !turn.sources().is_empty() {
            lines.push(String::new());
            lines.push("Sources:".bold().to_string());
            for (i, source) in turn.sources().iter().enumerate() {
                let title = if source.title.is_empty() {
                    source.url.as_str()
                } else {
                    source.title.as_str()
                };
                lines.push(format!("  [{}] {} - {}", i + 1, title, source.url.underline()));
            }
        }
        lines
    }
}

/// Red one-line banner for submission / connection errors.
pub fn banner(text: &str) -> String {
    format!("{} {}", "!".red().bold(), text.red())
}

pub fn prompt() -> String {
    format!("{} ", "research>".green().bold())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{JobEvent, Source};
    use crate::transcript::TranscriptStore;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_status_printed_once_per_change() {
        plain();
        let mut store = TranscriptStore::new();
        store.append_user_turn("q");
        let id = store.append_pending_assistant_turn();
        let mut r = Renderer::new(false);

        let first = r.render(store.get(id).unwrap());
        assert_eq!(first, vec![":: Starting research..."]);
        assert!(r.render(store.get(id).unwrap()).is_empty());

        store.apply_event(id, JobEvent::with_status(JobStatus::Working));
        assert_eq!(r.render(store.get(id).unwrap()), vec![":: Researching sub-queries..."]);
    }

    #[test]
    fn test_sub_queries_printed_when_changed() {
        plain();
        let mut store = TranscriptStore::new();
        let id = store.append_pending_assistant_turn();
        let mut r = Renderer::new(false);
        let mut ev = JobEvent::with_status(JobStatus::Working);
        ev.sub_queries = Some(vec!["a".into(), "b".into()]);
        store.apply_event(id, ev.clone());
        let lines = r.render(store.get(id).unwrap());
        assert!(lines.contains(&"  1. a".to_string()));
        assert!(lines.contains(&"  2. b".to_string()));

        store.apply_event(id, ev);
        assert!(r.render(store.get(id).unwrap()).is_empty());
    }

    #[test]
    fn test_final_answer_and_sources() {
        plain();
        let mut store = TranscriptStore::new();
        let id = store.append_pending_assistant_turn();
        let mut r = Renderer::new(false);
        let mut ev = JobEvent::with_status(JobStatus::Completed);
        ev.final_answer = Some("X is Y.".into());
        ev.sources = Some(vec![Source {
            title: "S1".into(),
            url: "https://s1".into(),
            ..Source::default()
        }]);
        store.apply_event(id, ev);
        let lines = r.render(store.get(id).unwrap());
        assert!(lines.contains(&"X is Y.".to_string()));
        assert!(lines.contains(&"  [1] S1 - https://s1".to_string()));
        assert!(r.render(store.get(id).unwrap()).is_empty());
    }

    #[test]
    fn test_stopped_turn_renders_fallback() {
        plain();
        let mut store = TranscriptStore::new();
        let id = store.append_pending_assistant_turn();
        store.mark_stopped(id);
        let lines = Renderer::new(false).render(store.get(id).unwrap());
        assert!(lines.contains(&":: Search stopped.".to_string()));
        assert!(lines.contains(&"Search was stopped.".to_string()));
    }

    #[test]
    fn test_thinking_steps_only_new_ones() {
        plain();
        let mut store = TranscriptStore::new();
        let id = store.append_pending_assistant_turn();
        let mut r = Renderer::new(true);
        let step = serde_json::json!({"thought":"t","action":{"tool":"search","input":"a"}});
        let mut ev = JobEvent::with_status(JobStatus::Working);
        ev.thinking_steps = Some(vec![serde_json::from_value(step.clone()).unwrap()]);
        store.apply_event(id, ev.clone());
        let lines = r.render(store.get(id).unwrap());
        assert!(lines.contains(&"  ~ search: a".to_string()));

        ev.thinking_steps
            .as_mut()
            .unwrap()
            .push(serde_json::from_value(step).unwrap());
        store.apply_event(id, ev);
        let lines = r.render(store.get(id).unwrap());
        assert_eq!(lines, vec!["  ~ search: a"]);
    }

    #[test]
    fn test_reset_forgets_turn() {
        plain();
        let mut store = TranscriptStore::new();
        let id = store.append_pending_assistant_turn();
        let mut r = Renderer::new(false);
        r.render(store.get(id).unwrap());
        r.reset();
        assert_eq!(r.render(store.get(id).unwrap()).len(), 1);
    }

    #[test]
    fn test_banner_contains_text() {
        plain();
        assert_eq!(banner("Search failed."), "! Search failed.");
    }
}
