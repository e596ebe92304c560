use mesto_common::forms::{AvatarInput, PlaceInput, ProfileInput};
use mesto_common::{CardId, Url};

pub const USAGE: &str = "commands:
  list
  me
  view <id>
  like <id>
  delete <id>
  add <name> <link>
  profile <name>|<about>
  avatar <url>
  close
  quit";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Nothing,
    Quit,
    List,
    Me,
    View(CardId),
    Like(CardId),
    Delete(CardId),
    Add(PlaceInput),
    Profile(ProfileInput),
    Avatar(AvatarInput),
    Close,
}

/// Reads one shell line. `None` means the line is not a command and the
/// usage should be shown.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let card = || (!rest.is_empty()).then(|| CardId(rest.to_string()));
    Some(match command {
        "" => Command::Nothing,
        "quit" | "exit" => Command::Quit,
        "list" => Command::List,
        "me" => Command::Me,
        "close" => Command::Close,
        "view" => Command::View(card()?),
        "like" => Command::Like(card()?),
        "delete" => Command::Delete(card()?),
        // The link never contains spaces, the name may.
        "add" => {
            let (name, link) = rest.rsplit_once(' ')?;
            Command::Add(PlaceInput { name: name.trim().to_string(), link: Url(link.to_string()) })
        }
        "profile" => {
            let (name, about) = rest.split_once('|')?;
            Command::Profile(ProfileInput { name: name.trim().to_string(), about: about.trim().to_string() })
        }
        "avatar" if !rest.is_empty() => Command::Avatar(AvatarInput { avatar: Url(rest.to_string()) }),
        _ => return None,
    })
}
