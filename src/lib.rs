pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    add_entry_impl, calendar_impl, delete_entry_impl, edit_entry_impl, generate_summary_impl,
    history_impl, list_entries_impl, login_impl, logout_impl, nickname_impl, oauth_callback_impl,
    oauth_start_impl, recommend_impl, summary_page_impl, whoami_impl, AppState,
};
use clap::{Parser, Subcommand};
use infrastructure::error::InfraError;
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const PASSWORD_ENV: &str = "LINEDIARY_PASSWORD";

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Workspace holding config/, state/ and logs/. Defaults to the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Password login; the password may also come from LINEDIARY_PASSWORD
    Login {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Print the URL that starts the provider login
    OauthStart,
    /// Store tokens from a callback URL or its `#access=...&refresh=...` fragment
    OauthCallback { fragment: String },
    Logout,
    Whoami,
    /// List one day's entries (default today)
    Entries {
        #[arg(long)]
        date: Option<String>,
    },
    /// Write a new entry for today
    Add {
        content: String,
        #[arg(long)]
        emotion: Option<String>,
    },
    Edit {
        id: i64,
        content: String,
        #[arg(long)]
        emotion: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    Delete {
        id: i64,
        #[arg(long)]
        date: Option<String>,
    },
    /// Daily summaries across every recorded day
    History {
        /// asc or desc
        #[arg(long)]
        order: Option<String>,
        /// An emotion label, or 전체 for all
        #[arg(long)]
        emotion: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Month grid marking days with entries
    Calendar {
        /// YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Ask the server to summarize a day (default today)
    Generate {
        #[arg(long)]
        date: Option<String>,
    },
    /// Show the last generated summary with that day's entries
    Summary,
    Recommend {
        #[arg(long)]
        date: Option<String>,
    },
    /// Show or set the display nickname
    Nickname { name: Option<String> },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::OauthStart => "oauth_start",
            Self::OauthCallback { .. } => "oauth_callback",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Entries { .. } => "list_entries",
            Self::Add { .. } => "add_entry",
            Self::Edit { .. } => "edit_entry",
            Self::Delete { .. } => "delete_entry",
            Self::History { .. } => "history",
            Self::Calendar { .. } => "calendar",
            Self::Generate { .. } => "generate_summary",
            Self::Summary => "summary",
            Self::Recommend { .. } => "recommend",
            Self::Nickname { .. } => "nickname",
        }
    }
}

pub async fn run(cli: Cli) -> Result<(), String> {
    let workspace_root = match cli.root {
        Some(path) => path,
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };
    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let name = cli.command.name();
    dispatch(&state, cli.command, &cancel)
        .await
        .map_err(|error| state.command_error(name, &error))
}

async fn dispatch(
    state: &AppState,
    command: Command,
    cancel: &CancellationToken,
) -> Result<(), InfraError> {
    match command {
        Command::Login { username, password } => {
            let password = password
                .or_else(|| std::env::var(PASSWORD_ENV).ok())
                .ok_or_else(|| {
                    InfraError::InvalidConfig(format!("password required (--password or {PASSWORD_ENV})"))
                })?;
            emit(&login_impl(state, username, password).await?)
        }
        Command::OauthStart => emit(&oauth_start_impl(state)?),
        Command::OauthCallback { fragment } => emit(&oauth_callback_impl(state, fragment)?),
        Command::Logout => emit(&logout_impl(state).await?),
        Command::Whoami => emit(&whoami_impl(state).await?),
        Command::Entries { date } => emit(&list_entries_impl(state, date).await?),
        Command::Add { content, emotion } => emit(&add_entry_impl(state, content, emotion).await?),
        Command::Edit {
            id,
            content,
            emotion,
            date,
        } => emit(&edit_entry_impl(state, id, content, emotion, date).await?),
        Command::Delete { id, date } => emit(&delete_entry_impl(state, id, date).await?),
        Command::History {
            order,
            emotion,
            date,
        } => emit(&history_impl(state, order, emotion, date, cancel).await?),
        Command::Calendar { month } => {
            let grid = calendar_impl(state, month).await?;
            print!("{}", grid.render());
            Ok(())
        }
        Command::Generate { date } => emit(&generate_summary_impl(state, date).await?),
        Command::Summary => emit(&summary_page_impl(state).await?),
        Command::Recommend { date } => emit(&recommend_impl(state, date).await?),
        Command::Nickname { name } => emit(&nickname_impl(state, name)?),
    }
}

fn emit<T: Serialize>(value: &T) -> Result<(), InfraError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_history_filters() {
        let cli = Cli::try_parse_from([
            "linediary", "history", "--order", "asc", "--emotion", "슬픔",
        ])
        .expect("parse");
        match cli.command {
            Command::History { order, emotion, date } => {
                assert_eq!(order.as_deref(), Some("asc"));
                assert_eq!(emotion.as_deref(), Some("슬픔"));
                assert_eq!(date, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn command_names_match_log_entries() {
        let cli = Cli::try_parse_from(["linediary", "--root", "/tmp/x", "oauth-callback", "#access=a"])
            .expect("parse");
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.command.name(), "oauth_callback");
    }
}
