//! Conversation History
//!
//! The ordered, append-only message log of one generation request. The
//! system instructions travel separately from the turns so providers can
//! place them the way their API expects.

use proof_cascade_llm::Message;

use super::prompts;

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    system: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// A conversation opened by one user turn.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(user)],
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record a failed plan and the error its verification raised.
    pub fn push_failure(&mut self, response: &str, error: &str) {
        self.messages.push(Message::assistant(response));
        self.messages.push(Message::system(prompts::diagnostic(error)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proof_cascade_llm::MessageRole;

    #[test]
    fn test_push_failure_appends_two_turns() {
        let mut conversation = Conversation::new("sys", "solve it");
        conversation.push_failure("{\"steps\": []}", "step 1: NameError: name 'x' is not defined");

        let roles: Vec<MessageRole> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::System]
        );
        assert_eq!(conversation.messages()[1].content, "{\"steps\": []}");
        assert_eq!(
            conversation.messages()[2].content,
            "Code Error: step 1: NameError: name 'x' is not defined"
        );
        assert_eq!(conversation.system(), "sys");
    }
}
