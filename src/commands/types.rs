//! Slash commands and inline-keyboard callback actions.

use std::fmt;

use chrono::NaiveDate;

use crate::config::StageCode;
use crate::store::{PendingInput, StageField};
use crate::telegram::MenuCommand;

/// Date format used in callback data and on screen.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Slash commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Reset the session and show the project list.
    Start,

    /// Show help information.
    Help,

    /// Remove the panel and forget the session.
    Cancel,
}

impl BotCommand {
    /// Parses a command from message text. Accepts a `@botname` suffix.
    ///
    /// Returns `None` if the message is not a known command.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(cmd, _)| cmd);

        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Commands published in the bot menu.
    #[must_use]
    pub fn menu() -> Vec<MenuCommand> {
        vec![
            MenuCommand::new("start", "Otwórz panel inwestycji"),
            MenuCommand::new("help", "Pomoc"),
        ]
    }
}

/// Free-text stage fields that can be set or cleared from the stage panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Todo,
    Notes,
}

impl NoteField {
    const fn key(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Notes => "notes",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "todo" => Some(Self::Todo),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }

    /// Workbook column holding the field.
    #[must_use]
    pub const fn stage_field(self) -> StageField {
        match self {
            Self::Todo => StageField::ToFinish,
            Self::Notes => StageField::Notes,
        }
    }

    /// Pending input that collects the field.
    #[must_use]
    pub const fn pending(self) -> PendingInput {
        match self {
            Self::Todo => PendingInput::Todo,
            Self::Notes => PendingInput::Notes,
        }
    }
}

/// Action encoded in an inline button's callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Placeholder button (calendar titles and blanks).
    Noop,
    OpenCalendar,
    CalendarMonth { year: i32, month: u32 },
    PickDay(NaiveDate),
    Home,
    AddProject,
    Archive,
    ToggleArchived(usize),
    OpenProject(usize),
    FinishProject,
    ToggleActive,
    BackToProject,
    OpenStage(StageCode),
    AwaitNote(NoteField),
    PercentMenu(StageCode),
    ClearNote(NoteField, StageCode),
    SaveStage(StageCode),
    AwaitPhoto,
    SetPercent(StageCode, u32),
    PercentManual(StageCode),
    PercentBack,
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_month(s: &str) -> Option<(i32, u32)> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year = i32::try_from(parse_index(year)?).ok()?;
    let month = u32::try_from(parse_index(month)?).ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    // Strict dd.mm.YYYY; chrono alone would accept single-digit fields.
    let parts: Vec<&str> = s.split('.').collect();
    if parts.iter().map(|p| p.len()).ne([2, 2, 4]) {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

impl CallbackAction {
    /// Parses callback data. Unknown or malformed data yields `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "noop" => return Some(Self::Noop),
            "date:open" => return Some(Self::OpenCalendar),
            "nav:home" => return Some(Self::Home),
            "proj:add" => return Some(Self::AddProject),
            "proj:arch" => return Some(Self::Archive),
            "proj:finish" => return Some(Self::FinishProject),
            "proj:toggle_active" => return Some(Self::ToggleActive),
            "proj:back" => return Some(Self::BackToProject),
            "stage:add_photo" => return Some(Self::AwaitPhoto),
            "pct:back" => return Some(Self::PercentBack),
            _ => {}
        }

        let parts: Vec<&str> = data.split(':').collect();
        match parts.as_slice() {
            ["cal", month] => parse_month(month).map(|(year, month)| Self::CalendarMonth { year, month }),
            ["day", day] => parse_day(day).map(Self::PickDay),
            ["arch", "tog", idx] => parse_index(idx).map(Self::ToggleArchived),
            ["proj", "open", idx] => parse_index(idx).map(Self::OpenProject),
            ["stage", "open", code] => code.parse().ok().map(Self::OpenStage),
            ["stage", "set", field] => NoteField::from_key(field).map(Self::AwaitNote),
            ["stage", "set", "percent", code] => code.parse().ok().map(Self::PercentMenu),
            ["stage", "clear", field, code] => {
                let field = NoteField::from_key(field)?;
                code.parse().ok().map(|code| Self::ClearNote(field, code))
            }
            ["stage", "save", code] => code.parse().ok().map(Self::SaveStage),
            ["pct", code, "manual"] => code.parse().ok().map(Self::PercentManual),
            ["pct", code, value] => {
                let code = code.parse().ok()?;
                let value = u32::try_from(parse_index(value)?).ok()?;
                (value <= 100).then_some(Self::SetPercent(code, value))
            }
            _ => None,
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("noop"),
            Self::OpenCalendar => f.write_str("date:open"),
            Self::CalendarMonth { year, month } => write!(f, "cal:{year:04}-{month:02}"),
            Self::PickDay(day) => write!(f, "day:{}", day.format(DATE_FORMAT)),
            Self::Home => f.write_str("nav:home"),
            Self::AddProject => f.write_str("proj:add"),
            Self::Archive => f.write_str("proj:arch"),
            Self::ToggleArchived(idx) => write!(f, "arch:tog:{idx}"),
            Self::OpenProject(idx) => write!(f, "proj:open:{idx}"),
            Self::FinishProject => f.write_str("proj:finish"),
            Self::ToggleActive => f.write_str("proj:toggle_active"),
            Self::BackToProject => f.write_str("proj:back"),
            Self::OpenStage(code) => write!(f, "stage:open:{code}"),
            Self::AwaitNote(field) => write!(f, "stage:set:{}", field.key()),
            Self::PercentMenu(code) => write!(f, "stage:set:percent:{code}"),
            Self::ClearNote(field, code) => write!(f, "stage:clear:{}:{code}", field.key()),
            Self::SaveStage(code) => write!(f, "stage:save:{code}"),
            Self::AwaitPhoto => f.write_str("stage:add_photo"),
            Self::SetPercent(code, value) => write!(f, "pct:{code}:{value}"),
            Self::PercentManual(code) => write!(f, "pct:{code}:manual"),
            Self::PercentBack => f.write_str("pct:back"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str) -> Option<CallbackAction> {
        CallbackAction::parse(data)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("  /help  "), Some(BotCommand::Help));
        assert_eq!(BotCommand::parse("/cancel@etapy_bot"), Some(BotCommand::Cancel));
        assert_eq!(BotCommand::parse("/start extra args"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/unknown"), None);
        assert_eq!(BotCommand::parse("start"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn test_menu() {
        let names: Vec<String> = BotCommand::menu().into_iter().map(|c| c.command).collect();
        assert_eq!(names, vec!["start".to_owned(), "help".to_owned()]);
    }

    #[test]
    fn test_parse_navigation() {
        assert_eq!(parse("noop"), Some(CallbackAction::Noop));
        assert_eq!(parse("nav:home"), Some(CallbackAction::Home));
        assert_eq!(parse("proj:add"), Some(CallbackAction::AddProject));
        assert_eq!(parse("proj:arch"), Some(CallbackAction::Archive));
        assert_eq!(parse("proj:finish"), Some(CallbackAction::FinishProject));
        assert_eq!(parse("proj:toggle_active"), Some(CallbackAction::ToggleActive));
        assert_eq!(parse("proj:back"), Some(CallbackAction::BackToProject));
        assert_eq!(parse("proj:open:3"), Some(CallbackAction::OpenProject(3)));
        assert_eq!(parse("arch:tog:0"), Some(CallbackAction::ToggleArchived(0)));
        assert_eq!(parse("proj:open:-1"), None);
        assert_eq!(parse("proj:open:"), None);
    }

    #[test]
    fn test_parse_calendar() {
        assert_eq!(parse("date:open"), Some(CallbackAction::OpenCalendar));
        assert_eq!(
            parse("cal:2025-08"),
            Some(CallbackAction::CalendarMonth { year: 2025, month: 8 })
        );
        assert_eq!(parse("cal:2025-13"), None);
        assert_eq!(parse("cal:25-08"), None);
        assert_eq!(
            parse("day:05.08.2025"),
            NaiveDate::from_ymd_opt(2025, 8, 5).map(CallbackAction::PickDay)
        );
        assert_eq!(parse("day:5.8.2025"), None);
        assert_eq!(parse("day:31.02.2025"), None);
    }

    #[test]
    fn test_parse_stage_actions() {
        assert_eq!(parse("stage:open:S1"), Some(CallbackAction::OpenStage(StageCode::S1)));
        assert_eq!(parse("stage:open:S8"), None);
        assert_eq!(parse("stage:set:todo"), Some(CallbackAction::AwaitNote(NoteField::Todo)));
        assert_eq!(parse("stage:set:notes"), Some(CallbackAction::AwaitNote(NoteField::Notes)));
        assert_eq!(parse("stage:set:photo"), None);
        assert_eq!(
            parse("stage:set:percent:S6"),
            Some(CallbackAction::PercentMenu(StageCode::S6))
        );
        assert_eq!(
            parse("stage:clear:notes:S2"),
            Some(CallbackAction::ClearNote(NoteField::Notes, StageCode::S2))
        );
        assert_eq!(parse("stage:clear:percent:S2"), None);
        assert_eq!(parse("stage:save:S7"), Some(CallbackAction::SaveStage(StageCode::S7)));
        assert_eq!(parse("stage:add_photo"), Some(CallbackAction::AwaitPhoto));
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse("pct:S3:75"), Some(CallbackAction::SetPercent(StageCode::S3, 75)));
        assert_eq!(parse("pct:S3:0"), Some(CallbackAction::SetPercent(StageCode::S3, 0)));
        assert_eq!(parse("pct:S3:101"), None);
        assert_eq!(parse("pct:S3:manual"), Some(CallbackAction::PercentManual(StageCode::S3)));
        assert_eq!(parse("pct:back"), Some(CallbackAction::PercentBack));
        assert_eq!(parse("pct:S9:50"), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("proj"), None);
        assert_eq!(parse("stage:open:S1:extra"), None);
        assert_eq!(parse("nav:home "), None);
    }

    #[test]
    fn test_display_matches_parse() {
        let actions = [
            CallbackAction::CalendarMonth { year: 2024, month: 1 },
            CallbackAction::ClearNote(NoteField::Todo, StageCode::S4),
            CallbackAction::SetPercent(StageCode::S1, 90),
            CallbackAction::PercentMenu(StageCode::S7),
            CallbackAction::OpenProject(12),
        ];
        for action in actions {
            assert_eq!(parse(&action.to_string()), Some(action));
        }
        assert_eq!(CallbackAction::CalendarMonth { year: 2024, month: 1 }.to_string(), "cal:2024-01");
    }
}
