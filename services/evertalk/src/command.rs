use evertalk_client::types::Gender;

pub const HELP: &str = "\
commands:
  episodes                 list episodes with their lock state
  select <id>              select an episode
  start [id]               start the given or the selected episode
  talk                     start or stop recording
  profile <nickname> <male|female>
  goto <path>              navigate (/, /episode, /play, /login, /entry)
  login                    open the login entry and show its address
  logout
  status
  quit";

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Help,
    Episodes,
    Select(u32),
    Start(Option<u32>),
    Talk,
    Profile { nickname: String, gender: Gender },
    Goto(String),
    Login,
    Logout,
    Status,
    Quit,
}

fn episode_id(arg: Option<&str>) -> Result<u32, String> {
    let arg = arg.ok_or_else(|| "missing episode id".to_string())?;
    arg.parse()
        .map_err(|_| format!("not an episode id: {arg}"))
}

impl std::str::FromStr for UserCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err("empty command".to_string());
        };

        let command = match name.to_lowercase().as_str() {
            "help" | "?" => UserCommand::Help,
            "episodes" | "ls" => UserCommand::Episodes,
            "select" => UserCommand::Select(episode_id(parts.next())?),
            "start" => match parts.next() {
                Some(arg) => UserCommand::Start(Some(episode_id(Some(arg))?)),
                None => UserCommand::Start(None),
            },
            "talk" | "t" => UserCommand::Talk,
            "profile" => {
                let nickname = parts
                    .next()
                    .ok_or_else(|| "usage: profile <nickname> <male|female>".to_string())?;
                let gender = parts
                    .next()
                    .ok_or_else(|| "usage: profile <nickname> <male|female>".to_string())?
                    .parse()?;
                UserCommand::Profile {
                    nickname: nickname.to_string(),
                    gender,
                }
            }
            "goto" => UserCommand::Goto(parts.next().unwrap_or("/").to_string()),
            "login" => UserCommand::Login,
            "logout" => UserCommand::Logout,
            "status" => UserCommand::Status,
            "quit" | "exit" | "q" => UserCommand::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("episodes".parse(), Ok(UserCommand::Episodes));
        assert_eq!("select 2".parse(), Ok(UserCommand::Select(2)));
        assert_eq!("start".parse(), Ok(UserCommand::Start(None)));
        assert_eq!("START 3".parse(), Ok(UserCommand::Start(Some(3))));
        assert_eq!(
            "profile 민수 female".parse(),
            Ok(UserCommand::Profile {
                nickname: "민수".into(),
                gender: Gender::Female
            })
        );
        assert_eq!("goto".parse(), Ok(UserCommand::Goto("/".into())));
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<UserCommand>().is_err());
        assert!("select".parse::<UserCommand>().is_err());
        assert!("select two".parse::<UserCommand>().is_err());
        assert!("profile mina robot".parse::<UserCommand>().is_err());
        assert!("dance".parse::<UserCommand>().is_err());
    }
}
