use shared::domain::DocumentId;
use thiserror::Error;

pub const PAGE_SIZES: [usize; 3] = [6, 10, 20];

/// A record picked either by its listed row number or by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Row(usize),
    Id(DocumentId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Albums,
    Users,
    Add,
    Edit(Target),
    Set { field: String, value: String },
    Submit,
    Cancel,
    Delete(Target),
    Page(usize),
    PageSize(usize),
    Status,
    Resync,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("'{0}' is not a positive number")]
    InvalidNumber(String),
    #[error("page size must be one of 6, 10 or 20, got {0}")]
    UnsupportedPageSize(usize),
}

pub const HELP: &str = "\
albums | users            switch screen
add                       open the add form
edit <n|id>               open the edit form for a listed record
set <field> <value>       fill a form field
submit | cancel           submit or discard the open form
delete <n|id>             delete a listed record
page <n>                  show page n of the users table
page-size <6|10|20>       rows per users page
status                    show sync status
resync                    retry a lost subscription now
help | quit";

fn positive(raw: &str) -> Result<usize, ParseError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::InvalidNumber(raw.to_string())),
    }
}

fn target(raw: &str) -> Result<Target, ParseError> {
    if raw.chars().all(|c| c.is_ascii_digit()) {
        positive(raw).map(Target::Row)
    } else {
        Ok(Target::Id(DocumentId::from(raw)))
    }
}

fn required<'a>(
    arg: Option<&'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, ParseError> {
    arg.filter(|value| !value.is_empty())
        .ok_or(ParseError::MissingArgument { command, argument })
}

pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, Some(rest.trim())),
        None => (line, None),
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Err(ParseError::Empty),
        "albums" => Ok(Command::Albums),
        "users" => Ok(Command::Users),
        "add" => Ok(Command::Add),
        "edit" => target(required(rest, "edit", "a row number or id")?).map(Command::Edit),
        "delete" => target(required(rest, "delete", "a row number or id")?).map(Command::Delete),
        "set" => {
            let rest = required(rest, "set", "a field name")?;
            let (field, value) = match rest.split_once(char::is_whitespace) {
                Some((field, value)) => (field, value.trim()),
                None => (rest, ""),
            };
            Ok(Command::Set {
                field: field.to_ascii_lowercase(),
                value: value.to_string(),
            })
        }
        "submit" => Ok(Command::Submit),
        "cancel" => Ok(Command::Cancel),
        "page" => positive(required(rest, "page", "a page number")?).map(Command::Page),
        "page-size" => {
            let size = positive(required(rest, "page-size", "a size")?)?;
            if PAGE_SIZES.contains(&size) {
                Ok(Command::PageSize(size))
            } else {
                Err(ParseError::UnsupportedPageSize(size))
            }
        }
        "status" => Ok(Command::Status),
        "resync" => Ok(Command::Resync),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("  albums "), Ok(Command::Albums));
        assert_eq!(parse_command("USERS"), Ok(Command::Users));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
        assert_eq!(parse_command(""), Err(ParseError::Empty));
        assert_eq!(
            parse_command("rename x"),
            Err(ParseError::Unknown("rename".into()))
        );
    }

    #[test]
    fn targets_are_rows_or_ids() {
        assert_eq!(parse_command("edit 2"), Ok(Command::Edit(Target::Row(2))));
        assert_eq!(
            parse_command("delete 3f9a"),
            Ok(Command::Delete(Target::Id(DocumentId::from("3f9a"))))
        );
        assert_eq!(
            parse_command("delete 0"),
            Err(ParseError::InvalidNumber("0".into()))
        );
        assert_eq!(
            parse_command("edit"),
            Err(ParseError::MissingArgument {
                command: "edit",
                argument: "a row number or id"
            })
        );
    }

    #[test]
    fn set_keeps_the_rest_of_the_line_as_value() {
        assert_eq!(
            parse_command("set name  Summer Trip 2024"),
            Ok(Command::Set {
                field: "name".into(),
                value: "Summer Trip 2024".into()
            })
        );
        assert_eq!(
            parse_command("set Email"),
            Ok(Command::Set {
                field: "email".into(),
                value: String::new()
            })
        );
    }

    #[test]
    fn page_size_is_limited_to_offered_options() {
        assert_eq!(parse_command("page-size 10"), Ok(Command::PageSize(10)));
        assert_eq!(
            parse_command("page-size 7"),
            Err(ParseError::UnsupportedPageSize(7))
        );
        assert_eq!(parse_command("page 2"), Ok(Command::Page(2)));
        assert_eq!(
            parse_command("page two"),
            Err(ParseError::InvalidNumber("two".into()))
        );
    }
}
