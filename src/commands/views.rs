//! Panel text and keyboards. Pure functions over already-loaded data.

use chrono::{Datelike, Month, NaiveDate};

use super::types::{CallbackAction, DATE_FORMAT, NoteField};
use crate::config::StageCode;
use crate::store::{PendingInput, Project, StageRecord, UserState, progress_line};
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Longest to-do preview shown on the project panel, in characters.
const TODO_PREVIEW_CHARS: usize = 60;

const WEEKDAYS: [&str; 7] = ["Pn", "Wt", "Śr", "Cz", "Pt", "So", "Nd"];

const PERCENT_PRESETS: [[u32; 3]; 2] = [[0, 25, 50], [75, 90, 100]];

/// Text plus inline keyboard of one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

impl Panel {
    #[must_use]
    pub fn new(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

fn button(text: impl Into<String>, action: &CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn mark(label: &str, active: bool) -> String {
    format!("{} {label}", if active { '●' } else { '○' })
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Escapes characters that legacy Markdown treats as markup.
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wraps text in a legacy Markdown bold entity.
///
/// Escapes are not allowed inside an entity, so every `*` closes the
/// entity, is emitted escaped and reopens it. Other markup characters are
/// literal inside bold.
#[must_use]
pub fn bold(text: &str) -> String {
    text.split('*')
        .map(|part| if part.is_empty() { String::new() } else { format!("*{part}*") })
        .collect::<Vec<_>>()
        .join("\\*")
}

/// Shortens a to-do entry for the project overview.
#[must_use]
pub fn todo_preview(text: &str) -> String {
    if text.chars().count() <= TODO_PREVIEW_CHARS {
        return text.to_owned();
    }
    let mut short: String = text.chars().take(TODO_PREVIEW_CHARS - 3).collect();
    short.push('…');
    short
}

/// The "waiting for input" line shown above a panel.
#[must_use]
pub fn pending_banner(state: &UserState) -> Option<String> {
    let pending = state.pending?;
    let project = escape_markdown(state.project.as_deref().unwrap_or_default());
    let stage = state
        .stage_code
        .map(|code| format!(" | {}", code.name()))
        .unwrap_or_default();

    Some(format!(
        "✍️ *Oczekuję na:* {} (inwestycja: {project}{stage}). Wyślij teraz.\n",
        pending.label()
    ))
}

fn with_banner(state: &UserState, mut lines: Vec<String>) -> String {
    if let Some(banner) = pending_banner(state) {
        lines.insert(0, banner);
    }
    lines.join("\n")
}

/// Project list with the date picker and archive entry.
#[must_use]
pub fn home_panel(state: &UserState, projects: &[Project], date: &str) -> Panel {
    let mut lines = vec![format!("🏗️ *Inwestycje*  |  📅 {date}\n")];
    if projects.is_empty() {
        lines.push("Brak inwestycji. Dodaj pierwszą 👇".to_owned());
    }

    let adding = state.pending == Some(PendingInput::ProjectName);
    let mut rows = vec![vec![button(format!("📅 Data: {date}"), &CallbackAction::OpenCalendar)]];
    rows.extend(
        projects
            .iter()
            .enumerate()
            .map(|(idx, p)| vec![button(format!("🏗️ {}", p.name), &CallbackAction::OpenProject(idx))]),
    );
    rows.push(vec![button(mark("➕ Dodaj inwestycję", adding), &CallbackAction::AddProject)]);
    rows.push(vec![button("🗄 Archiwum", &CallbackAction::Archive)]);

    Panel::new(with_banner(state, lines), InlineKeyboardMarkup::new(rows))
}

/// Overview of one project: progress line and open to-do items.
#[must_use]
pub fn project_panel(state: &UserState, project: &str, stages: &[(StageCode, StageRecord)]) -> Panel {
    let mut lines = vec![
        format!("🏗️ {}", bold(project)),
        format!("📊 Postęp etapów: {}\n", progress_line(stages)),
        "👇 Wybierz etap. Otwarte zadania:".to_owned(),
    ];
    for (code, record) in stages {
        let todo = record.to_finish.trim();
        if todo.is_empty() {
            continue;
        }
        let percent = record
            .percent_value()
            .map(|p| format!(" (📊 {p}%)"))
            .unwrap_or_default();
        lines.push(format!(
            "• {}{percent}: 🔧 {}",
            code.name(),
            escape_markdown(&todo_preview(todo))
        ));
    }

    let stage_button = |code: StageCode| button(code.name(), &CallbackAction::OpenStage(code));
    let rows = vec![
        vec![stage_button(StageCode::S1), stage_button(StageCode::S2)],
        vec![stage_button(StageCode::S3), stage_button(StageCode::S4)],
        vec![stage_button(StageCode::S5), stage_button(StageCode::S6)],
        vec![stage_button(StageCode::S7)],
        vec![
            button("✅ Oznacz zakończoną", &CallbackAction::FinishProject),
            button("📦 Archiwizuj/Przywróć", &CallbackAction::ToggleActive),
        ],
        vec![button("↩️ Wstecz", &CallbackAction::Home)],
    ];

    Panel::new(with_banner(state, lines), InlineKeyboardMarkup::new(rows))
}

/// Detail view of one stage with its edit actions.
#[must_use]
pub fn stage_panel(state: &UserState, project: &str, stage: StageCode, record: &StageRecord) -> Panel {
    let lines = vec![
        format!("🏗️ {}  →  {}", bold(project), stage.name()),
        String::new(),
        format!("📊 % ukończenia: {}", or_dash(&escape_markdown(&record.percent))),
        format!("🔧 Do dokończenia:\n{}", or_dash(&escape_markdown(&record.to_finish))),
        format!("📝 Notatki:\n{}", or_dash(&escape_markdown(&record.notes))),
        format!("🖼 Zdjęcia: {}", record.photo_count()),
        format!(
            "⏱ Ostatnia zmiana: {}  |  👤 {}",
            or_dash(&record.last_updated),
            or_dash(&escape_markdown(&record.last_editor))
        ),
        String::new(),
        "Wybierz działanie poniżej 👇".to_owned(),
    ];

    let active = state.pending;
    let rows = vec![
        vec![
            button(
                mark("🔧 Do dokończenia", active == Some(PendingInput::Todo)),
                &CallbackAction::AwaitNote(NoteField::Todo),
            ),
            button(
                mark("📝 Notatki", active == Some(PendingInput::Notes)),
                &CallbackAction::AwaitNote(NoteField::Notes),
            ),
        ],
        vec![
            button(
                mark("📊 % (0/25/50/75/90/100)", active == Some(PendingInput::Percent)),
                &CallbackAction::PercentMenu(stage),
            ),
            button(
                mark("📸 Dodaj zdjęcie", active == Some(PendingInput::Photo)),
                &CallbackAction::AwaitPhoto,
            ),
        ],
        vec![
            button("🧹 Wyczyść Do dokończenia", &CallbackAction::ClearNote(NoteField::Todo, stage)),
            button("🧹 Wyczyść Notatki", &CallbackAction::ClearNote(NoteField::Notes, stage)),
        ],
        vec![button("💾 Zapisz zmiany", &CallbackAction::SaveStage(stage))],
        vec![button("↩️ Wstecz", &CallbackAction::BackToProject)],
    ];

    Panel::new(with_banner(state, lines), InlineKeyboardMarkup::new(rows))
}

/// Preset percentages plus manual entry.
#[must_use]
pub fn percent_keyboard(stage: StageCode) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = PERCENT_PRESETS
        .iter()
        .map(|row| {
            row.iter()
                .map(|&p| button(format!("{p}%"), &CallbackAction::SetPercent(stage, p)))
                .collect()
        })
        .collect();
    rows.push(vec![button("✍️ Wpisz ręcznie", &CallbackAction::PercentManual(stage))]);
    rows.push(vec![button("↩️ Wróć", &CallbackAction::PercentBack)]);
    InlineKeyboardMarkup::new(rows)
}

#[must_use]
pub fn percent_panel(stage: StageCode) -> Panel {
    Panel::new("📊 Ustaw % ukończenia:", percent_keyboard(stage))
}

fn shift_month(year: i32, month: u32, forward: bool) -> (i32, u32) {
    match (month, forward) {
        (1, false) => (year - 1, 12),
        (12, true) => (year + 1, 1),
        (m, true) => (year, m + 1),
        (m, false) => (year, m - 1),
    }
}

/// Monday-first month grid. Returns `None` for an unrepresentable month.
#[must_use]
pub fn month_keyboard(year: i32, month: u32, today: NaiveDate) -> Option<InlineKeyboardMarkup> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let name = Month::try_from(u8::try_from(month).ok()?).ok()?.name();
    let blank = || button(" ", &CallbackAction::Noop);

    let mut rows = vec![
        vec![button(format!("{name} {year}"), &CallbackAction::Noop)],
        WEEKDAYS.iter().map(|d| button(*d, &CallbackAction::Noop)).collect(),
    ];

    let mut week: Vec<InlineKeyboardButton> = (0..first.weekday().num_days_from_monday())
        .map(|_| blank())
        .collect();
    let mut day = first;
    while day.month() == month {
        week.push(button(day.day().to_string(), &CallbackAction::PickDay(day)));
        if week.len() == 7 {
            rows.push(std::mem::take(&mut week));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    if !week.is_empty() {
        week.resize_with(7, blank);
        rows.push(week);
    }

    let (prev_year, prev_month) = shift_month(year, month, false);
    let (next_year, next_month) = shift_month(year, month, true);
    rows.push(vec![
        button(
            "« Poprzedni",
            &CallbackAction::CalendarMonth {
                year: prev_year,
                month: prev_month,
            },
        ),
        button("Dziś", &CallbackAction::PickDay(today)),
        button(
            "Następny »",
            &CallbackAction::CalendarMonth {
                year: next_year,
                month: next_month,
            },
        ),
    ]);
    rows.push(vec![button("↩️ Wstecz", &CallbackAction::Home)]);

    Some(InlineKeyboardMarkup::new(rows))
}

/// Every project with its active flag; tapping toggles it.
#[must_use]
pub fn archive_panel(projects: &[Project]) -> Panel {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = projects
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let dot = if p.active { "🟢" } else { "⚪️" };
            vec![button(format!("{dot} {}", p.name), &CallbackAction::ToggleArchived(idx))]
        })
        .collect();
    rows.push(vec![button("↩️ Wstecz", &CallbackAction::Home)]);

    Panel::new(
        "🗄 *Archiwum / Aktywne* (kliknij aby przełączyć):",
        InlineKeyboardMarkup::new(rows),
    )
}

#[must_use]
pub fn help_panel() -> Panel {
    let text = "🤖 *Pomoc – Inwestycje*\n\
        • /start – lista inwestycji, dodawanie, archiwum.\n\
        • W projekcie → Etap → edycja pól. Zmiany zapisują się do Excela i natychmiast widać w panelu.\n\
        • Kropki ○/● pokazują, że czekam na tekst/zdjęcie.\n\
        • Stan sesji jest trwały (działa stabilnie na webhooku/skalowaniu).\n";
    Panel::new(
        text,
        InlineKeyboardMarkup::new(vec![vec![button("↩️ Wstecz", &CallbackAction::Home)]]),
    )
}

#[must_use]
pub fn finished_panel(project: &str) -> Panel {
    Panel::new(
        format!("🎉 {} oznaczono jako zakończoną. 💪", bold(project)),
        InlineKeyboardMarkup::new(vec![vec![button("↩️ Wróć", &CallbackAction::Home)]]),
    )
}

/// Formats a date the way the panels and callback data show it.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
