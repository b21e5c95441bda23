//! Output formatting for client updates.

use wishpernet_client::{ChatMessage, ClientAction, ConnectionState};

const MILLIS_PER_SECOND: u64 = 1_000;
const SECONDS_PER_DAY: u64 = 86_400;

/// Line to print for an update, or `None` for updates with no visible form.
pub fn render(action: &ClientAction) -> Option<String> {
    match action {
        ClientAction::DisplayMessage(message) => Some(render_message(message)),
        ClientAction::SystemNotice { text } => Some(format!("* {text}")),
        ClientAction::UserCount(count) => Some(match count {
            1 => "* 1 user online".to_string(),
            n => format!("* {n} users online"),
        }),
        ClientAction::StatusChanged(state) => Some(format!("-- {}", state_label(*state))),
        ClientAction::Notify { message } => Some(format!("! {message}")),
        ClientAction::ReturnToEntry { reason } => Some(format!("-- session ended: {reason}")),
        ClientAction::Send(_)
        | ClientAction::CloseTransport { .. }
        | ClientAction::SendAffordance { .. }
        | ClientAction::ShareTokenReady { .. } => None,
    }
}

/// `[HH:MM:SS] name: text`, UTC. Own messages are marked `(you)`.
pub fn render_message(message: &ChatMessage) -> String {
    let seconds = (message.timestamp / MILLIS_PER_SECOND) % SECONDS_PER_DAY;
    let (hours, minutes, seconds) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    let marker = if message.own { " (you)" } else { "" };

    format!(
        "[{hours:02}:{minutes:02}:{seconds:02}] {}{marker}: {}",
        message.username, message.body
    )
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::AwaitingRoomJoin => "joining room",
        ConnectionState::Joined => "connected",
    }
}

#[cfg(test)]
mod tests {
    use wishpernet_client::MessageBody;
    use wishpernet_crypto::CipherError;

    use super::*;

    fn message(body: MessageBody, own: bool) -> ChatMessage {
        ChatMessage {
            id: "m-1".to_string(),
            username: "alice".to_string(),
            // 2023-11-14T22:13:20Z
            timestamp: 1_700_000_000_000,
            body,
            own,
            history: false,
        }
    }

    #[test]
    fn renders_text_message() {
        let line = render_message(&message(MessageBody::Text("hi bob".to_string()), false));
        insta::assert_snapshot!(line, @"[22:13:20] alice: hi bob");
    }

    #[test]
    fn marks_own_message() {
        let line = render_message(&message(MessageBody::Text("hi".to_string()), true));
        insta::assert_snapshot!(line, @"[22:13:20] alice (you): hi");
    }

    #[test]
    fn undecryptable_renders_placeholder() {
        let body = MessageBody::Undecryptable { reason: CipherError::AuthenticationFailed };
        let line = render_message(&message(body, false));
        insta::assert_snapshot!(line, @"[22:13:20] alice: [Encrypted message - decryption failed]");
    }

    #[test]
    fn renders_room_updates() {
        let lines: Vec<String> = [
            ClientAction::StatusChanged(ConnectionState::AwaitingRoomJoin),
            ClientAction::UserCount(1),
            ClientAction::UserCount(3),
            ClientAction::SystemNotice { text: "bob joined the chat".to_string() },
            ClientAction::Notify { message: "Failed to encrypt message".to_string() },
            ClientAction::ReturnToEntry { reason: "left room".to_string() },
        ]
        .iter()
        .filter_map(render)
        .collect();

        insta::assert_snapshot!(lines.join("\n"), @r"
        -- joining room
        * 1 user online
        * 3 users online
        * bob joined the chat
        ! Failed to encrypt message
        -- session ended: left room
        ");
    }

    #[test]
    fn internal_actions_are_silent() {
        assert_eq!(render(&ClientAction::SendAffordance { enabled: false }), None);
        assert_eq!(render(&ClientAction::CloseTransport { reason: "bye".to_string() }), None);
    }
}
