//! # Player Input
//!
//! Local player actions arrive as [`PlayerCommand`]s on a crossbeam channel
//! so the coordinator can wait on them and the socket in one `select!`.
//! Chat is accepted at any time, on or off turn.
//!
//! Line syntax used by the binaries:
//!
//! | Line | Command |
//! |------|---------|
//! | `2` | select move 2 |
//! | `2!` or `2 boost` | select move 2 and spend a special-attack boost |
//! | `defend` | arm a special-defense boost for the next hit |
//! | `chat <text>` or any other text | chat |
//! | `/gg` | sticker (chat) |
//! | `quit` | forfeit |

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

/// One local player action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Attack with the move at `index` (0-based).
    SelectMove {
        /// Move slot.
        index: usize,
        /// Spend a special-attack boost if the move is special.
        boost: bool,
    },
    /// Send a chat line or sticker token.
    Chat(String),
    /// Spend a special-defense boost on the next special hit taken.
    ArmDefenseBoost,
    /// Forfeit the match.
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
#[must_use]
pub fn parse_command(line: &str) -> Option<PlayerCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(text) = line.strip_prefix("chat ") {
        return Some(PlayerCommand::Chat(text.to_string()));
    }

    match line.to_ascii_lowercase().as_str() {
        "quit" | "forfeit" | "exit" => return Some(PlayerCommand::Quit),
        "defend" | "shield" => return Some(PlayerCommand::ArmDefenseBoost),
        _ => {}
    }

    let (number, boost) = if let Some(number) = line.strip_suffix('!') {
        (number.trim(), true)
    } else if let Some(number) = line.strip_suffix("boost") {
        (number.trim(), true)
    } else {
        (line, false)
    };

    match number.parse::<usize>() {
        Ok(slot) if slot > 0 => Some(PlayerCommand::SelectMove { index: slot - 1, boost }),
        _ => Some(PlayerCommand::Chat(line.to_string())),
    }
}

/// Reads lines from `reader` on a background thread until EOF or until the
/// receiver is dropped.
pub fn spawn_line_reader<R>(reader: R) -> (Receiver<PlayerCommand>, JoinHandle<()>)
where
    R: BufRead + Send + 'static,
{
    let (sender, receiver) = unbounded();
    let handle = thread::spawn(move || forward_lines(reader, &sender));
    (receiver, handle)
}

/// [`spawn_line_reader`] over standard input.
#[must_use]
pub fn spawn_stdin_reader() -> Receiver<PlayerCommand> {
    let (receiver, _handle) = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    receiver
}

fn forward_lines<R: BufRead>(reader: R, sender: &Sender<PlayerCommand>) {
    for line in reader.lines() {
        let Ok(line) = line else {
            tracing::warn!("input stream error, no more commands");
            return;
        };
        if let Some(command) = parse_command(&line) {
            if sender.send(command).is_err() {
                return;
            }
        }
    }
    tracing::debug!("input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_move_selection() {
        assert_eq!(parse_command("1"), Some(PlayerCommand::SelectMove { index: 0, boost: false }));
        assert_eq!(parse_command(" 3! "), Some(PlayerCommand::SelectMove { index: 2, boost: true }));
        assert_eq!(parse_command("2 boost"), Some(PlayerCommand::SelectMove { index: 1, boost: true }));
    }

    #[test]
    fn test_zero_is_chat_not_a_move() {
        assert_eq!(parse_command("0"), Some(PlayerCommand::Chat("0".into())));
    }

    #[test]
    fn test_keywords_and_chat() {
        assert_eq!(parse_command("QUIT"), Some(PlayerCommand::Quit));
        assert_eq!(parse_command("defend"), Some(PlayerCommand::ArmDefenseBoost));
        assert_eq!(parse_command("chat 1"), Some(PlayerCommand::Chat("1".into())));
        assert_eq!(parse_command("/gg"), Some(PlayerCommand::Chat("/gg".into())));
        assert_eq!(parse_command("nice hit"), Some(PlayerCommand::Chat("nice hit".into())));
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_line_reader_forwards_until_eof() {
        let (commands, handle) = spawn_line_reader(Cursor::new("1\n\nchat hi\nquit\n"));
        handle.join().unwrap();
        let received: Vec<_> = commands.try_iter().collect();
        assert_eq!(
            received,
            vec![
                PlayerCommand::SelectMove { index: 0, boost: false },
                PlayerCommand::Chat("hi".into()),
                PlayerCommand::Quit,
            ]
        );
    }
}
