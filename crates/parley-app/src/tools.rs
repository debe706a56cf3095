//! Simulated assistant tools.
//!
//! Each interaction is a canned user line plus the tool's answer as agent
//! text, pushed onto the relay queue with no session attached.

use parley_session::{Event, EventKind, EventQueue};

/// Stand-ins for the calendar, search, recipe and task services.
#[derive(Debug, Default)]
pub struct AssistantTools {
    schedule: String,
    tasks: Vec<String>,
}

impl AssistantTools {
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            tasks: Vec::new(),
        }
    }

    pub fn calendar_events(&self, date: &str) -> String {
        tracing::debug!("Tool: calendar for {date}");
        if date.to_lowercase().contains("today") {
            format!("{}.", self.schedule.trim_end_matches('.'))
        } else {
            "No events found for that date.".to_string()
        }
    }

    pub fn add_calendar_event(&self, summary: &str, start: &str) -> String {
        tracing::debug!("Tool: add event {summary} at {start}");
        format!("Event '{summary}' added at {start}. (Simulated)")
    }

    pub fn search_web(&self, query: &str) -> String {
        tracing::debug!("Tool: search {query}");
        format!("Simulated result: Search for '{query}' found relevant information.")
    }

    pub fn recipe(&self, dish: &str) -> String {
        tracing::debug!("Tool: recipe for {dish}");
        format!("Here's a simple recipe for {dish} (simulated ingredients and steps).")
    }

    pub fn add_task(&mut self, description: &str) -> String {
        tracing::debug!("Tool: add task {description}");
        self.tasks.push(description.to_string());
        format!("Task '{description}' added.")
    }

    pub fn tasks(&self) -> String {
        if self.tasks.is_empty() {
            "You have no tasks yet.".to_string()
        } else {
            format!("Your current tasks are: {}", self.tasks.join(", "))
        }
    }
}

/// Push a user line and the agent's reply, in that order.
pub fn push_exchange(queue: &EventQueue, user: impl Into<String>, agent: impl Into<String>) {
    queue.push(Event::detached(EventKind::UserUtterance(user.into())));
    queue.push(Event::detached(EventKind::AgentUtterance(agent.into())));
}

/// Reply used for typed input, which the voice agent cannot receive.
pub fn manual_reply(text: &str) -> String {
    format!("I received your text: '{text}'. (This is a simulated text response)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_answers_today_from_schedule() {
        let tools = AssistantTools::new("Standup at 9");
        assert_eq!(tools.calendar_events("today"), "Standup at 9.");
        assert_eq!(
            tools.calendar_events("next Tuesday"),
            "No events found for that date."
        );
    }

    #[test]
    fn tasks_accumulate() {
        let mut tools = AssistantTools::new("");
        assert_eq!(tools.tasks(), "You have no tasks yet.");
        assert_eq!(tools.add_task("buy milk"), "Task 'buy milk' added.");
        tools.add_task("call Sophie");
        assert_eq!(
            tools.tasks(),
            "Your current tasks are: buy milk, call Sophie"
        );
    }

    #[test]
    fn exchange_is_pushed_untagged_in_order() {
        let queue = EventQueue::new();
        push_exchange(&queue, "How do I make pasta?", "Boil water.");
        let batch = queue.drain_all();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|e| e.session.is_none()));
        assert_eq!(
            batch[0].kind,
            EventKind::UserUtterance("How do I make pasta?".into())
        );
        assert_eq!(batch[1].kind, EventKind::AgentUtterance("Boil water.".into()));
    }

    #[test]
    fn manual_reply_quotes_input() {
        assert!(manual_reply("hi").contains("'hi'"));
    }
}
