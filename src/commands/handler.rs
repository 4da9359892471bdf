//! Update handler: turns one Telegram update into store changes and a
//! refreshed panel.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{BotCommand, CallbackAction, NoteField};
use super::views::{self, Panel};
use crate::config::StageCode;
use crate::store::{
    Editor, FieldValue, PendingInput, ProjectStore, StageField, StoreError, UserState, UserStateStore,
};
use crate::telegram::{CallbackQuery, ChatApi, Message, TelegramError, Update, User};

/// Errors that abort handling of a single update.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),
}

impl HandlerError {
    /// Telegram rejected a callback answer because the query expired.
    #[must_use]
    pub fn is_stale_query(&self) -> bool {
        matches!(self, Self::Telegram(e) if e.is_stale_query())
    }
}

/// Toast shown after a callback, if any.
type Toast = Option<&'static str>;

/// Session of the user an update came from, loaded fresh per update.
struct Session {
    uid: i64,
    chat_id: i64,
    editor: Editor,
    state: UserState,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Accepts one to three digits; the range is checked by the caller.
fn parse_percent_input(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Handles updates for every user of the bot.
pub struct UpdateHandler<A> {
    api: Arc<A>,
    projects: ProjectStore,
    sessions: UserStateStore,
}

impl<A: ChatApi> UpdateHandler<A> {
    #[must_use]
    pub fn new(api: Arc<A>, projects: ProjectStore, sessions: UserStateStore) -> Self {
        Self {
            api,
            projects,
            sessions,
        }
    }

    /// Processes one update.
    pub async fn handle(&self, update: Update) -> Result<(), HandlerError> {
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }

        let Some(message) = update.message else {
            debug!("Ignoring update {} without message", update.update_id);
            return Ok(());
        };
        let Some(user) = message.from.as_ref() else {
            return Ok(());
        };
        let session = self.session(user, message.chat.id);

        if let Some(text) = message.text.as_deref() {
            if text.trim_start().starts_with('/') {
                return match BotCommand::parse(text) {
                    Some(command) => self.handle_command(session, command).await,
                    None => {
                        debug!("Ignoring unknown command {:?}", text);
                        Ok(())
                    }
                };
            }
            return self.handle_text(session, &message, text).await;
        }

        if let Some(file_id) = message.largest_photo() {
            return self.handle_photo(session, &message, file_id).await;
        }

        debug!("Ignoring message {} without text or photo", message.message_id);
        Ok(())
    }

    fn session(&self, user: &User, chat_id: i64) -> Session {
        Session {
            uid: user.id,
            chat_id,
            editor: Editor::new(user.first_name.clone(), user.id),
            state: self.sessions.load(user.id),
        }
    }

    fn persist(&self, s: &Session) {
        self.sessions.save(s.uid, &s.state);
    }

    /// Shows `panel` in the user's sticky message, editing it in place when
    /// possible and sending a fresh one only when the old one is gone.
    async fn show(&self, s: &mut Session, panel: &Panel) -> Result<(), HandlerError> {
        if let Some(message_id) = s.state.sticky_id {
            match self
                .api
                .edit_message_text(s.chat_id, message_id, &panel.text, Some(&panel.keyboard))
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_modified() => return Ok(()),
                Err(e) if e.is_edit_target_gone() => {
                    debug!("Panel {} of user {} is gone: {}", message_id, s.uid, e);
                }
                Err(e) => {
                    warn!("Panel edit failed for user {}: {}", s.uid, e);
                    return Ok(());
                }
            }
        }

        let message_id = self
            .api
            .send_message(s.chat_id, &panel.text, Some(&panel.keyboard))
            .await?;
        s.state.sticky_id = Some(message_id);
        self.persist(s);
        Ok(())
    }

    async fn delete_quietly(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.api.delete_message(chat_id, message_id).await {
            debug!("Could not delete message {}: {}", message_id, e);
        }
    }

    async fn render_home(&self, s: &mut Session) -> Result<(), HandlerError> {
        let projects = self.projects.list_projects(true).await?;
        let date = s
            .state
            .date
            .clone()
            .unwrap_or_else(|| views::format_date(today()));
        let panel = views::home_panel(&s.state, &projects, &date);
        self.show(s, &panel).await
    }

    async fn render_project(&self, s: &mut Session) -> Result<(), HandlerError> {
        let Some(project) = s.state.project.clone() else {
            return self.render_home(s).await;
        };
        let stages = self.projects.read_stages(&project).await?;
        let panel = views::project_panel(&s.state, &project, &stages);
        self.show(s, &panel).await
    }

    async fn render_stage(&self, s: &mut Session) -> Result<(), HandlerError> {
        let (Some(project), Some(stage)) = (s.state.project.clone(), s.state.stage_code) else {
            return self.render_project(s).await;
        };
        let record = self.projects.read_stage(&project, stage).await?;
        let panel = views::stage_panel(&s.state, &project, stage, &record);
        self.show(s, &panel).await
    }

    async fn render_archive(&self, s: &mut Session) -> Result<(), HandlerError> {
        let projects = self.projects.list_projects(false).await?;
        s.state.archive_names = projects.iter().map(|p| p.name.clone()).collect();
        let panel = views::archive_panel(&projects);
        self.show(s, &panel).await
    }

    async fn render_calendar(
        &self,
        s: &mut Session,
        title: &str,
        year: i32,
        month: u32,
    ) -> Result<(), HandlerError> {
        let Some(keyboard) = views::month_keyboard(year, month, today()) else {
            debug!("Ignoring calendar for {}-{}", year, month);
            return Ok(());
        };
        self.show(s, &Panel::new(title, keyboard)).await
    }

    async fn handle_command(&self, mut s: Session, command: BotCommand) -> Result<(), HandlerError> {
        debug!("User {} sent {:?}", s.uid, command);
        match command {
            BotCommand::Start => {
                s.state.reset();
                s.state.date = Some(views::format_date(today()));
                self.persist(&s);
                self.render_home(&mut s).await
            }
            BotCommand::Help => {
                self.persist(&s);
                self.show(&mut s, &views::help_panel()).await
            }
            BotCommand::Cancel => {
                if let Some(message_id) = s.state.sticky_id {
                    self.delete_quietly(s.chat_id, message_id).await;
                }
                s.state.reset();
                self.persist(&s);
                self.api.send_message(s.chat_id, "Anulowano.", None).await?;
                Ok(())
            }
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) -> Result<(), HandlerError> {
        let action = query.data.as_deref().and_then(CallbackAction::parse);
        let chat_id = query.message.as_ref().map(|m| m.chat.id);

        let outcome = match (action, chat_id) {
            (Some(action), Some(chat_id)) => {
                let mut s = self.session(&query.from, chat_id);
                debug!("User {} pressed {}", s.uid, action);
                self.apply(&mut s, action).await
            }
            _ => {
                debug!("Ignoring callback {:?}", query.data);
                Ok(None)
            }
        };

        let toast = outcome.as_ref().ok().copied().flatten();
        let answered = self.api.answer_callback_query(&query.id, toast).await;

        outcome?;
        answered.map_err(HandlerError::from)
    }

    async fn apply(&self, s: &mut Session, action: CallbackAction) -> Result<Toast, HandlerError> {
        match action {
            CallbackAction::Noop => {}
            CallbackAction::OpenCalendar => {
                let now = today();
                self.render_calendar(s, "📅 Wybierz datę (informacyjnie):", now.year(), now.month())
                    .await?;
                self.persist(s);
            }
            CallbackAction::CalendarMonth { year, month } => {
                self.render_calendar(s, "📅 Wybierz datę:", year, month).await?;
                self.persist(s);
            }
            CallbackAction::PickDay(day) => {
                s.state.date = Some(views::format_date(day));
                self.persist(s);
                self.render_home(s).await?;
            }
            CallbackAction::Home => {
                self.persist(s);
                self.render_home(s).await?;
            }
            CallbackAction::AddProject => {
                s.state.pending = Some(PendingInput::ProjectName);
                self.persist(s);
                self.render_home(s).await?;
            }
            CallbackAction::Archive => {
                self.render_archive(s).await?;
                self.persist(s);
            }
            CallbackAction::ToggleArchived(idx) => {
                if let Some(name) = s.state.archive_names.get(idx).cloned() {
                    self.toggle_active(&name).await?;
                }
                self.render_archive(s).await?;
                self.persist(s);
            }
            CallbackAction::OpenProject(idx) => {
                let projects = self.projects.list_projects(true).await?;
                match projects.into_iter().nth(idx) {
                    Some(project) => {
                        s.state.project = Some(project.name);
                        s.state.pending = None;
                        self.persist(s);
                        self.render_project(s).await?;
                    }
                    None => self.render_home(s).await?,
                }
            }
            CallbackAction::FinishProject => match s.state.project.clone() {
                Some(project) => {
                    self.projects.set_project_finished(&project, true).await?;
                    info!("Project {:?} finished by user {}", project, s.uid);
                    self.show(s, &views::finished_panel(&project)).await?;
                    self.persist(s);
                }
                None => {
                    self.persist(s);
                    self.render_home(s).await?;
                }
            },
            CallbackAction::ToggleActive => {
                if let Some(project) = s.state.project.clone() {
                    self.toggle_active(&project).await?;
                }
                self.persist(s);
                self.render_home(s).await?;
            }
            CallbackAction::BackToProject => {
                s.state.pending = None;
                self.persist(s);
                self.render_project(s).await?;
            }
            CallbackAction::OpenStage(stage) => {
                s.state.stage_code = Some(stage);
                s.state.pending = None;
                self.persist(s);
                self.render_stage(s).await?;
            }
            CallbackAction::AwaitNote(field) => {
                s.state.pending = Some(field.pending());
                self.persist(s);
                self.render_stage(s).await?;
            }
            CallbackAction::AwaitPhoto => {
                s.state.pending = Some(PendingInput::Photo);
                self.persist(s);
                self.render_stage(s).await?;
            }
            CallbackAction::PercentMenu(stage) => {
                self.show(s, &views::percent_panel(stage)).await?;
                self.persist(s);
            }
            CallbackAction::PercentBack => {
                self.persist(s);
                self.render_stage(s).await?;
            }
            CallbackAction::PercentManual(stage) => {
                s.state.pending = Some(PendingInput::Percent);
                s.state.stage_code = Some(stage);
                self.persist(s);
                self.render_stage(s).await?;
            }
            CallbackAction::SetPercent(stage, value) => {
                let toast = match s.state.project.clone() {
                    Some(project) => {
                        self.write_field(s, &project, stage, StageField::Percent, FieldValue::Number(value))
                            .await?;
                        Some("Ustawiono % ✅")
                    }
                    None => None,
                };
                s.state.stage_code = Some(stage);
                self.persist(s);
                self.render_stage(s).await?;
                return Ok(toast);
            }
            CallbackAction::ClearNote(field, stage) => {
                self.clear_note(s, field, stage).await?;
                self.persist(s);
                self.render_stage(s).await?;
                return Ok(Some("Wyczyszczono ✅"));
            }
            CallbackAction::SaveStage(stage) => {
                if let Some(project) = s.state.project.clone() {
                    self.projects
                        .update_stage(&project, stage, Vec::new(), s.editor.clone())
                        .await?;
                }
                self.persist(s);
                self.render_stage(s).await?;
                return Ok(Some("Zapisano ✅"));
            }
        }
        Ok(None)
    }

    async fn toggle_active(&self, name: &str) -> Result<(), HandlerError> {
        let projects = self.projects.list_projects(false).await?;
        if let Some(project) = projects.iter().find(|p| p.name == name) {
            self.projects.set_project_active(name, !project.active).await?;
            info!("Project {:?} active={}", name, !project.active);
        }
        Ok(())
    }

    async fn clear_note(&self, s: &Session, field: NoteField, stage: StageCode) -> Result<(), HandlerError> {
        if let Some(project) = s.state.project.as_deref() {
            self.write_field(s, project, stage, field.stage_field(), FieldValue::text(""))
                .await?;
        }
        Ok(())
    }

    async fn write_field(
        &self,
        s: &Session,
        project: &str,
        stage: StageCode,
        field: StageField,
        value: FieldValue,
    ) -> Result<(), HandlerError> {
        self.projects
            .update_stage(project, stage, vec![(field, value)], s.editor.clone())
            .await?;
        Ok(())
    }

    async fn handle_text(&self, mut s: Session, message: &Message, text: &str) -> Result<(), HandlerError> {
        let text = text.trim();
        self.delete_quietly(s.chat_id, message.message_id).await;

        let pending = match s.state.pending {
            Some(PendingInput::ProjectName) => {
                if !text.is_empty() && self.projects.add_project(text).await? {
                    info!("User {} added project {:?}", s.uid, text);
                }
                s.state.pending = None;
                self.persist(&s);
                return self.render_home(&mut s).await;
            }
            Some(pending) if !pending.expects_photo() => pending,
            _ => {
                self.persist(&s);
                return Ok(());
            }
        };

        let (Some(project), Some(stage)) = (s.state.project.clone(), s.state.stage_code) else {
            s.state.pending = None;
            self.persist(&s);
            return self.render_home(&mut s).await;
        };

        let (field, value) = match pending {
            PendingInput::Todo => (StageField::ToFinish, FieldValue::text(text)),
            PendingInput::Notes => (StageField::Notes, FieldValue::text(text)),
            _ => {
                let Some(percent) = parse_percent_input(text) else {
                    let panel = Panel::new("📊 Wpisz liczbę 0-100:", views::percent_keyboard(stage));
                    return self.show(&mut s, &panel).await;
                };
                if percent > 100 {
                    let panel = Panel::new("📊 Zakres 0-100:", views::percent_keyboard(stage));
                    return self.show(&mut s, &panel).await;
                }
                (StageField::Percent, FieldValue::Number(percent))
            }
        };

        self.write_field(&s, &project, stage, field, value).await?;
        s.state.pending = None;
        self.persist(&s);
        self.render_stage(&mut s).await
    }

    async fn handle_photo(&self, mut s: Session, message: &Message, file_id: &str) -> Result<(), HandlerError> {
        if s.state.pending != Some(PendingInput::Photo) {
            self.persist(&s);
            return Ok(());
        }

        let (Some(project), Some(stage)) = (s.state.project.clone(), s.state.stage_code) else {
            s.state.pending = None;
            self.persist(&s);
            return Ok(());
        };

        self.projects
            .append_photo(&project, stage, file_id, s.editor.clone())
            .await?;
        self.delete_quietly(s.chat_id, message.message_id).await;

        s.state.pending = None;
        self.persist(&s);
        self.render_stage(&mut s).await
    }
}

impl<A> std::fmt::Debug for UpdateHandler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateHandler")
            .field("projects", &self.projects)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
