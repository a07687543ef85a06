use std::sync::Arc;

use tracing::{debug, info};

use svetlana_common::traits::repository_traits::FollowRepository;

use crate::webdiplomacy::BoardLinks;
use crate::Error;

/// First word a message must start with to be treated as a command.
pub const COMMAND_PREFIX: &str = "svetlana";

pub const DESCRIPTION: &str = "\
I keep an eye on WebDiplomacy games and tell this channel when something happens.

Commands:
  svetlana help            - show this message
  svetlana follow <id>     - follow the game with that gameID
  svetlana unfollow <id>   - stop following that game
  svetlana list            - show the games this channel follows";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    Follow(u64),
    Unfollow(u64),
    List,
}

/// Reply to post back into the channel the command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub channel_id: u64,
    pub text: String,
}

/// Game ids are plain non-negative integers; anything else is rejected.
pub fn parse_game_id(raw: &str) -> Result<u64, Error> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedIdentifier(raw.to_string()));
    }
    raw.parse::<u64>()
        .map_err(|_| Error::MalformedIdentifier(raw.to_string()))
}

/// Parses the part of a message after the prefix.
pub fn parse_command(args: &str) -> Result<ChatCommand, Error> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        ["help"] => Ok(ChatCommand::Help),
        ["list"] => Ok(ChatCommand::List),
        ["follow", id] => Ok(ChatCommand::Follow(parse_game_id(id)?)),
        ["unfollow", id] => Ok(ChatCommand::Unfollow(parse_game_id(id)?)),
        _ => Err(Error::MalformedIdentifier(args.trim().to_string())),
    }
}

/// Handles `svetlana ...` chat commands. Talks to the follow registry
/// directly and never touches the notification engine.
pub struct CommandService {
    registry: Arc<dyn FollowRepository>,
    links: BoardLinks,
}

impl CommandService {
    pub fn new(registry: Arc<dyn FollowRepository>, links: BoardLinks) -> Self {
        Self { registry, links }
    }

    /// Returns `Ok(None)` for messages that aren't addressed to us. Registry
    /// outcomes the user caused (already following, not following, bad id)
    /// come back as replies; storage failures come back as errors.
    pub async fn handle_chat_line(
        &self,
        channel_id: u64,
        author: &str,
        message_text: &str,
    ) -> Result<Option<CommandResponse>, Error> {
        let mut words = message_text.trim().splitn(2, char::is_whitespace);
        let Some(first) = words.next() else {
            return Ok(None);
        };
        if !first.eq_ignore_ascii_case(COMMAND_PREFIX) {
            return Ok(None);
        }
        let args = words.next().unwrap_or("");
        debug!("Command from {} in channel {}: '{}'", author, channel_id, args);

        let outcome = match parse_command(args) {
            Ok(cmd) => self.execute(channel_id, author, cmd).await,
            Err(e) => Err(e),
        };
        // Ids can also be rejected by the registry (too large to store).
        let text = match outcome {
            Ok(text) => text,
            Err(Error::MalformedIdentifier(raw)) => {
                debug!("Rejected malformed command input '{}'", raw);
                "Huh?".to_string()
            }
            Err(e) => return Err(e),
        };

        Ok(Some(CommandResponse { channel_id, text }))
    }

    async fn execute(&self, channel_id: u64, author: &str, cmd: ChatCommand) -> Result<String, Error> {
        match cmd {
            ChatCommand::Help => Ok(format!("Hello, {}!\n{}", author, DESCRIPTION)),

            ChatCommand::List => {
                let games = self.registry.list(channel_id).await?;
                let ids: Vec<String> = games.iter().map(|id| id.to_string()).collect();
                Ok(format!("I'm following: [{}]", ids.join(", ")))
            }

            ChatCommand::Follow(game_id) => match self.registry.follow(channel_id, game_id).await {
                Ok(()) => {
                    info!("{} made channel {} follow game {}", author, channel_id, game_id);
                    Ok(format!("Now following {}!\n{}", game_id, self.links.board_url(game_id)))
                }
                Err(Error::AlreadyFollowing { .. }) => Ok("I'm already following that game!".to_string()),
                Err(e) => Err(e),
            },

            ChatCommand::Unfollow(game_id) => match self.registry.unfollow(channel_id, game_id).await {
                Ok(()) => {
                    info!("{} made channel {} unfollow game {}", author, channel_id, game_id);
                    Ok("Consider it done!".to_string())
                }
                Err(Error::NotFollowing { .. }) => Ok("Huh? What game?".to_string()),
                Err(e) => Err(e),
            },
        }
    }
}
