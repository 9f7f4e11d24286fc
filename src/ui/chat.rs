//! Chat panel controller.
//!
//! Chat keeps its own busy flag (`is_chatting`) and never goes through the
//! lifecycle wrapper. The transcript is updated in two steps per send: the user
//! turn immediately, then the reply (or a synthetic error turn).

use crate::services::ChatSession;
use crate::state::{CHAT_FALLBACK_ERROR_MESSAGE, StateManager, error_message};
use std::sync::Arc;

pub struct ChatController {
    state: StateManager,
    session: Arc<dyn ChatSession>,
}

impl ChatController {
    /// # Arguments
    /// * `session` - The conversation used for every send, for the controller's lifetime
    pub fn new(state: StateManager, session: Arc<dyn ChatSession>) -> Self {
        Self { state, session }
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.read(|state| state.chat.is_chatting)
    }

    /// Send a message on the persistent session.
    ///
    /// Blank messages and sends while a reply is pending are ignored.
    ///
    /// # Returns
    /// `true` if the message was sent (whether or not the model replied)
    pub async fn send(&self, message: &str) -> bool {
        if message.trim().is_empty() {
            return false;
        }

        if self.state.begin_chat_turn(message).is_none() {
            tracing::debug!("Chat send ignored: still awaiting a reply");
            return false;
        }

        match self.session.send(message).await {
            Ok(reply) => {
                self.state.finish_chat_turn(reply);
                self.state.metrics().record_chat_turn();
            }
            Err(err) => {
                let message = error_message(&err, CHAT_FALLBACK_ERROR_MESSAGE);
                tracing::error!("Chat send failed: {}", message);
                self.state.fail_chat_turn(&message);
                self.state.metrics().record_chat_failure();
            }
        }

        true
    }
}
