use anyhow::{bail, Context};
use client_core::RoomBounds;
use shared::domain::{PlayerName, RoomId};

pub const HELP: &str = "\
Commands:
  menu                   back to the main menu
  create [min max]       create a room (default 5 10)
  join [room] <name>     join a room; the room id defaults to the one just created
  vote yes|no            vote to start the game
  enter                  enter the game once it has started
  target <name>          choose tonight's or today's target
  act                    submit the chosen target
  refresh                fetch the room status now
  help                   show this text
  quit                   leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    Help,
    Menu,
    Create(Option<RoomBounds>),
    Join {
        room_id: Option<RoomId>,
        player_name: PlayerName,
    },
    Vote(bool),
    Enter,
    Target(PlayerName),
    Act,
    Refresh,
    Quit,
}

impl TerminalCommand {
    /// Blank lines parse to `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("help" | "?", []) => Self::Help,
            ("menu" | "back", []) => Self::Menu,
            ("create", []) => Self::Create(None),
            ("create", [min, max]) => Self::Create(Some(RoomBounds::new(
                parse_count(min)?,
                parse_count(max)?,
            ))),
            ("join", [name]) => Self::Join {
                room_id: None,
                player_name: PlayerName::from(*name),
            },
            ("join", [room, name]) => Self::Join {
                room_id: Some(RoomId::from(*room)),
                player_name: PlayerName::from(*name),
            },
            ("vote", [choice]) => match choice.to_ascii_lowercase().as_str() {
                "yes" | "y" => Self::Vote(true),
                "no" | "n" => Self::Vote(false),
                other => bail!("vote takes yes or no, not '{other}'"),
            },
            ("enter", []) => Self::Enter,
            ("target", [name]) => Self::Target(PlayerName::from(*name)),
            ("act" | "submit", []) => Self::Act,
            ("refresh", []) => Self::Refresh,
            ("quit" | "exit", []) => Self::Quit,
            (other, _) => bail!("unrecognised command '{other}'; type help"),
        };
        Ok(Some(command))
    }
}

fn parse_count(raw: &str) -> anyhow::Result<u8> {
    raw.parse::<u8>()
        .with_context(|| format!("'{raw}' is not a player count"))
}
