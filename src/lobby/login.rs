//! Username collection for a fresh connection

use crate::channel::PlayerChannel;
use crate::error::GameResult;
use crate::player::{Player, PlayerHandle};
use std::sync::Arc;
use tracing::debug;

pub const WELCOME_BANNER: &str = "\n| 20  Questions |";
pub const USERNAME_PROMPT: &str = "\nEnter your username: ";

/// Greet a new connection and ask for a non-empty username.
///
/// The player id is assigned here, before the name is known. A transport
/// failure before a name arrives aborts the login.
pub async fn login(channel: Arc<dyn PlayerChannel>) -> GameResult<PlayerHandle> {
    let player = Player::new(String::new(), channel);
    debug!("Login started - id: {}, peer: {}", player.id(), player.peer());

    player.send(WELCOME_BANNER).await?;
    let name = player.prompt_non_empty(USERNAME_PROMPT).await?;
    player.set_name(name);

    Ok(player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory_pair;

    #[tokio::test]
    async fn test_login_collects_trimmed_name() {
        let (channel, mut client) = memory_pair("conn");
        let client_task = tokio::spawn(async move {
            let transcript = client.reply("").await.unwrap();
            assert_eq!(transcript, vec![WELCOME_BANNER, USERNAME_PROMPT]);
            client.reply("  alice ").await.unwrap();
            client
        });

        let player = login(Arc::new(channel)).await.unwrap();
        assert_eq!(player.name(), "alice");
        client_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_fails_on_disconnect() {
        let (channel, mut client) = memory_pair("conn");
        client.disconnect();

        assert!(login(Arc::new(channel)).await.is_err());
    }
}
