//! Excel workbook holding the project index and one sheet per project.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;
use tracing::{debug, info, warn};
use umya_spreadsheet::{Spreadsheet, Worksheet};

use super::{FileLock, StoreError};
use crate::config::StageCode;

/// Name of the index sheet.
pub const PROJECTS_SHEET: &str = "__Projects";

/// Headers of the index sheet.
pub const PROJECTS_HEADERS: [&str; 4] = ["Project", "Active", "Finished", "CreatedAt"];

/// Headers of every project sheet.
pub const STAGE_HEADERS: [&str; 9] = [
    "Stage",
    "Percent",
    "ToFinish",
    "Notes",
    "Finished",
    "LastUpdated",
    "Photos",
    "LastEditor",
    "LastEditorId",
];

/// Maximum sheet title length accepted by Excel.
const MAX_SHEET_TITLE: usize = 31;

/// Only the newest photo ids are kept per stage.
pub const MAX_PHOTOS: usize = 200;

/// Timestamp format of the `LastUpdated` column.
pub const LAST_UPDATED_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// An entry of the project index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub active: bool,
    pub finished: bool,
    pub created_at: String,
}

/// A stage row of a project sheet. Values are kept as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: String,
    pub percent: String,
    pub to_finish: String,
    pub notes: String,
    pub finished: String,
    pub last_updated: String,
    pub photos: String,
    pub last_editor: String,
    pub last_editor_id: String,
}

impl StageRecord {
    /// Empty record as seeded into a new sheet.
    #[must_use]
    pub fn blank(stage: &str) -> Self {
        Self {
            stage: stage.to_owned(),
            percent: String::new(),
            to_finish: String::new(),
            notes: String::new(),
            finished: "-".to_owned(),
            last_updated: String::new(),
            photos: String::new(),
            last_editor: String::new(),
            last_editor_id: String::new(),
        }
    }

    /// Percent as an integer, if the stored value is all digits.
    #[must_use]
    pub fn percent_value(&self) -> Option<u32> {
        parse_digits(&self.percent)
    }

    /// Stored photo file ids, oldest first.
    #[must_use]
    pub fn photo_ids(&self) -> Vec<&str> {
        self.photos.split_whitespace().collect()
    }

    #[must_use]
    pub fn photo_count(&self) -> usize {
        self.photos.split_whitespace().count()
    }
}

/// Columns of a project sheet that callers may change directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageField {
    Percent,
    ToFinish,
    Notes,
    Finished,
    Photos,
}

impl StageField {
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Percent => "Percent",
            Self::ToFinish => "ToFinish",
            Self::Notes => "Notes",
            Self::Finished => "Finished",
            Self::Photos => "Photos",
        }
    }
}

impl FromStr for StageField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Percent" => Ok(Self::Percent),
            "ToFinish" => Ok(Self::ToFinish),
            "Notes" => Ok(Self::Notes),
            "Finished" => Ok(Self::Finished),
            "Photos" => Ok(Self::Photos),
            other => Err(StoreError::UnsupportedField(other.to_owned())),
        }
    }
}

impl fmt::Display for StageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// New value for a stage column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(u32),
}

impl FieldValue {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// Who made a change, recorded in the stage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    pub name: String,
    pub id: i64,
}

impl Editor {
    #[must_use]
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Converts a project name into a valid, unique-enough sheet title.
#[must_use]
pub fn sheet_title(project: &str) -> String {
    let title: String = project
        .chars()
        .map(|c| if ":\\/?*[]".contains(c) { '·' } else { c })
        .take(MAX_SHEET_TITLE)
        .collect();

    if title.is_empty() {
        "Projekt".to_owned()
    } else {
        title
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn is_false(value: &str) -> bool {
    value.eq_ignore_ascii_case("false")
}

fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Column index (1-based) of every header in row 1.
fn header_columns(sheet: &Worksheet) -> HashMap<String, u32> {
    (1..=sheet.get_highest_column())
        .map(|col| (sheet.get_value((col, 1)), col))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn column(columns: &HashMap<String, u32>, header: &'static str) -> Result<u32, StoreError> {
    columns
        .get(header)
        .copied()
        .ok_or(StoreError::MissingColumn(header))
}

fn write_row(sheet: &mut Worksheet, row: u32, values: &[&str]) {
    for (col, value) in (1u32..).zip(values) {
        sheet.get_cell_mut((col, row)).set_value_string(*value);
    }
}

fn seed_stage_sheet(sheet: &mut Worksheet) {
    write_row(sheet, 1, &STAGE_HEADERS);
    for (row, stage) in (2u32..).zip(StageCode::ALL) {
        write_row(sheet, row, &blank_row(stage.name()));
    }
}

fn blank_row(stage: &str) -> [&str; 9] {
    [stage, "", "", "", "-", "", "", "", ""]
}

fn new_sheet<'a>(book: &'a mut Spreadsheet, title: &str) -> Result<&'a mut Worksheet, StoreError> {
    book.new_sheet(title)
        .map_err(|e| StoreError::Xlsx(format!("cannot create sheet '{title}': {e}")))
}

/// Makes sure the index sheet exists and carries its headers.
fn ensure_projects_sheet(book: &mut Spreadsheet) -> Result<(), StoreError> {
    if book.get_sheet_by_name(PROJECTS_SHEET).is_none() {
        let sheet = new_sheet(book, PROJECTS_SHEET)?;
        write_row(sheet, 1, &PROJECTS_HEADERS);
    } else if let Some(sheet) = book.get_sheet_by_name_mut(PROJECTS_SHEET)
        && sheet.get_value((1, 1)).is_empty()
    {
        write_row(sheet, 1, &PROJECTS_HEADERS);
    }
    Ok(())
}

/// Makes sure the project's sheet exists. Returns true if it was created.
fn ensure_project_sheet(book: &mut Spreadsheet, project: &str) -> Result<bool, StoreError> {
    let title = sheet_title(project);
    if book.get_sheet_by_name(&title).is_some() {
        return Ok(false);
    }
    let sheet = new_sheet(book, &title)?;
    seed_stage_sheet(sheet);
    Ok(true)
}

fn projects_sheet(book: &Spreadsheet) -> Result<&Worksheet, StoreError> {
    book.get_sheet_by_name(PROJECTS_SHEET)
        .ok_or(StoreError::MissingSheet(PROJECTS_SHEET.to_owned()))
}

fn project_sheet_mut<'a>(book: &'a mut Spreadsheet, project: &str) -> Result<&'a mut Worksheet, StoreError> {
    let title = sheet_title(project);
    book.get_sheet_by_name_mut(&title)
        .ok_or(StoreError::MissingSheet(title))
}

/// Finds the row whose `Stage` cell equals `stage`.
fn find_stage_row(sheet: &Worksheet, stage_col: u32, stage: &str) -> Option<u32> {
    (2..=sheet.get_highest_row()).find(|&row| sheet.get_value((stage_col, row)) == stage)
}

fn read_record(sheet: &Worksheet, columns: &HashMap<String, u32>, row: u32) -> StageRecord {
    let get = |header: &str| {
        columns
            .get(header)
            .map(|&col| sheet.get_value((col, row)))
            .unwrap_or_default()
    };
    let finished = get("Finished");

    StageRecord {
        stage: get("Stage"),
        percent: get("Percent"),
        to_finish: get("ToFinish"),
        notes: get("Notes"),
        finished: if finished.is_empty() { "-".to_owned() } else { finished },
        last_updated: get("LastUpdated"),
        photos: get("Photos"),
        last_editor: get("LastEditor"),
        last_editor_id: get("LastEditorId"),
    }
}

/// Reads (and creates if missing) the row of one stage. Returns the record
/// and whether the book was modified.
fn read_or_seed_stage(
    book: &mut Spreadsheet,
    project: &str,
    stage: &str,
) -> Result<(StageRecord, bool), StoreError> {
    let created_sheet = ensure_project_sheet(book, project)?;
    let sheet = project_sheet_mut(book, project)?;
    let columns = header_columns(sheet);
    let stage_col = column(&columns, "Stage")?;

    if let Some(row) = find_stage_row(sheet, stage_col, stage) {
        return Ok((read_record(sheet, &columns, row), created_sheet));
    }

    let row = sheet.get_highest_row() + 1;
    write_row(sheet, row, &blank_row(stage));
    Ok((StageRecord::blank(stage), true))
}

/// Synchronous access to the workbook file. All methods take the lock.
#[derive(Debug, Clone)]
pub struct ProjectBook {
    path: PathBuf,
    lock: FileLock,
}

impl ProjectBook {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, lock: FileLock) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the workbook, creating it with an index sheet if absent.
    fn open(&self) -> Result<Spreadsheet, StoreError> {
        if self.path.exists() {
            let mut book = umya_spreadsheet::reader::xlsx::read(&self.path)
                .map_err(|e| StoreError::Xlsx(e.to_string()))?;
            ensure_projects_sheet(&mut book)?;
            return Ok(book);
        }

        info!("Creating workbook at {}", self.path.display());
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        ensure_projects_sheet(&mut book)?;
        self.save(&book)?;
        Ok(book)
    }

    /// Writes the workbook through a temporary file in the same directory.
    fn save(&self, book: &Spreadsheet) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = tempfile::Builder::new().suffix(".xlsx").tempfile_in(&dir)?;
        umya_spreadsheet::writer::xlsx::write(book, tmp.path())
            .map_err(|e| StoreError::Xlsx(e.to_string()))?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        debug!("Workbook saved to {}", self.path.display());
        Ok(())
    }

    /// Lists projects in index order.
    pub fn list_projects(&self, active_only: bool) -> Result<Vec<Project>, StoreError> {
        self.lock.with(|| {
            let book = self.open()?;
            let sheet = projects_sheet(&book)?;

            let projects = (2..=sheet.get_highest_row())
                .filter_map(|row| {
                    let name = sheet.get_value((1, row));
                    if name.is_empty() {
                        return None;
                    }
                    Some(Project {
                        name,
                        active: !is_false(&sheet.get_value((2, row))),
                        finished: is_true(&sheet.get_value((3, row))),
                        created_at: sheet.get_value((4, row)),
                    })
                })
                .filter(|p| !active_only || p.active)
                .collect();

            Ok(projects)
        })
    }

    /// Adds a project and its stage sheet. Blank and duplicate names are ignored.
    /// Returns true if a project was added.
    pub fn add_project(&self, name: &str) -> Result<bool, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }

        self.lock.with(|| {
            let mut book = self.open()?;
            let sheet = book
                .get_sheet_by_name_mut(PROJECTS_SHEET)
                .ok_or(StoreError::MissingSheet(PROJECTS_SHEET.to_owned()))?;

            let last = sheet.get_highest_row();
            if (2..=last).any(|row| sheet.get_value((1, row)) == name) {
                debug!("Project '{}' already exists", name);
                return Ok(false);
            }

            let row = last.max(1) + 1;
            sheet.get_cell_mut((1, row)).set_value_string(name);
            sheet.get_cell_mut((2, row)).set_value_bool(true);
            sheet.get_cell_mut((3, row)).set_value_bool(false);
            sheet
                .get_cell_mut((4, row))
                .set_value_string(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string());

            ensure_project_sheet(&mut book, name)?;
            self.save(&book)?;
            info!("Added project '{}'", name);
            Ok(true)
        })
    }

    fn set_project_flag(&self, name: &str, col: u32, value: bool) -> Result<(), StoreError> {
        self.lock.with(|| {
            let mut book = self.open()?;
            let sheet = book
                .get_sheet_by_name_mut(PROJECTS_SHEET)
                .ok_or(StoreError::MissingSheet(PROJECTS_SHEET.to_owned()))?;

            if let Some(row) = (2..=sheet.get_highest_row()).find(|&r| sheet.get_value((1, r)) == name) {
                sheet.get_cell_mut((col, row)).set_value_bool(value);
            }
            self.save(&book)
        })
    }

    /// Marks a project active (listed on the home screen) or archived.
    pub fn set_project_active(&self, name: &str, active: bool) -> Result<(), StoreError> {
        self.set_project_flag(name, 2, active)
    }

    pub fn set_project_finished(&self, name: &str, finished: bool) -> Result<(), StoreError> {
        self.set_project_flag(name, 3, finished)
    }

    /// Reads one stage, creating the sheet or row if missing.
    pub fn read_stage(&self, project: &str, stage: StageCode) -> Result<StageRecord, StoreError> {
        self.lock.with(|| {
            let mut book = self.open()?;
            let (record, modified) = read_or_seed_stage(&mut book, project, stage.name())?;
            if modified {
                self.save(&book)?;
            }
            Ok(record)
        })
    }

    /// Reads all stages of a project in catalogue order.
    pub fn read_stages(&self, project: &str) -> Result<Vec<(StageCode, StageRecord)>, StoreError> {
        self.lock.with(|| {
            let mut book = self.open()?;
            let mut modified = false;
            let mut out = Vec::with_capacity(StageCode::ALL.len());
            for stage in StageCode::ALL {
                let (record, changed) = read_or_seed_stage(&mut book, project, stage.name())?;
                modified |= changed;
                out.push((stage, record));
            }
            if modified {
                self.save(&book)?;
            }
            Ok(out)
        })
    }

    /// Applies `updates` to a stage and stamps the change time and editor.
    pub fn update_stage(
        &self,
        project: &str,
        stage: StageCode,
        updates: &[(StageField, FieldValue)],
        editor: &Editor,
    ) -> Result<(), StoreError> {
        self.lock.with(|| {
            let mut book = self.open()?;
            apply_stage_update(&mut book, project, stage, updates, editor)?;
            self.save(&book)?;
            debug!("Updated {} / {} by {}", project, stage.name(), editor.name);
            Ok(())
        })
    }

    /// Appends a photo id to a stage, keeping the newest [`MAX_PHOTOS`].
    ///
    /// The read and the write happen under one lock so concurrent uploads
    /// to the same stage never drop each other's ids.
    pub fn append_photo(
        &self,
        project: &str,
        stage: StageCode,
        file_id: &str,
        editor: &Editor,
    ) -> Result<(), StoreError> {
        self.lock.with(|| {
            let mut book = self.open()?;
            let (record, _) = read_or_seed_stage(&mut book, project, stage.name())?;
            let mut photos = record.photo_ids();
            photos.push(file_id);
            let skip = photos.len().saturating_sub(MAX_PHOTOS);
            let joined = photos[skip..].join(" ");

            apply_stage_update(
                &mut book,
                project,
                stage,
                &[(StageField::Photos, FieldValue::Text(joined))],
                editor,
            )?;
            self.save(&book)?;
            debug!("Added photo to {} / {} by {}", project, stage.name(), editor.name);
            Ok(())
        })
    }

    /// One-line progress summary, e.g. `1 50% | 2 - | ... | dodatkowe -`.
    /// Returns `-` when the workbook cannot be read.
    #[must_use]
    pub fn percent_preview(&self, project: &str) -> String {
        match self.read_stages(project) {
            Ok(stages) => progress_line(&stages),
            Err(e) => {
                warn!("Could not read progress of '{}': {}", project, e);
                "-".to_owned()
            }
        }
    }
}

/// Writes `updates` and the editor stamp into a stage row, appending the
/// row if the stage has none yet.
fn apply_stage_update(
    book: &mut Spreadsheet,
    project: &str,
    stage: StageCode,
    updates: &[(StageField, FieldValue)],
    editor: &Editor,
) -> Result<(), StoreError> {
    ensure_project_sheet(book, project)?;
    let sheet = project_sheet_mut(book, project)?;
    let columns = header_columns(sheet);
    let stage_col = column(&columns, "Stage")?;

    let row = match find_stage_row(sheet, stage_col, stage.name()) {
        Some(row) => row,
        None => {
            let row = sheet.get_highest_row() + 1;
            write_row(sheet, row, &blank_row(stage.name()));
            row
        }
    };

    for (field, value) in updates {
        let col = column(&columns, field.header())?;
        let cell = sheet.get_cell_mut((col, row));
        match value {
            FieldValue::Text(text) => {
                cell.set_value_string(text.as_str());
            }
            FieldValue::Number(n) => {
                cell.set_value_number(f64::from(*n));
            }
        }
    }

    let stamp = Local::now().format(LAST_UPDATED_FORMAT).to_string();
    sheet
        .get_cell_mut((column(&columns, "LastUpdated")?, row))
        .set_value_string(stamp);
    sheet
        .get_cell_mut((column(&columns, "LastEditor")?, row))
        .set_value_string(editor.name.as_str());
    sheet
        .get_cell_mut((column(&columns, "LastEditorId")?, row))
        .set_value_string(editor.id.to_string());
    Ok(())
}

/// Joins the stage percentages into the one-line summary shown on panels.
#[must_use]
pub fn progress_line(stages: &[(StageCode, StageRecord)]) -> String {
    let parts: Vec<String> = stages
        .iter()
        .map(|(stage, record)| format!("{} {}", stage.short_label(), format_percent(&record.percent)))
        .collect();
    parts.join(" | ")
}

/// `-` for empty, `N%` for digits, the raw text otherwise.
fn format_percent(raw: &str) -> String {
    if raw.is_empty() {
        "-".to_owned()
    } else if let Some(n) = parse_digits(raw) {
        format!("{n}%")
    } else {
        raw.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn book_in(dir: &Path) -> ProjectBook {
        let lock = FileLock::new(dir.join("projects.lock"), Duration::from_secs(2));
        ProjectBook::new(dir.join("projects.xlsx"), lock)
    }

    fn editor() -> Editor {
        Editor::new("Anna", 1001)
    }

    #[test]
    fn test_sheet_title_sanitizes() {
        assert_eq!(sheet_title("Dom: etap/2"), "Dom· etap·2");
        assert_eq!(sheet_title("a[b]*?\\c"), "a·b····c");
        assert_eq!(sheet_title(""), "Projekt");
        assert_eq!(sheet_title(&"x".repeat(40)).chars().count(), 31);
        assert_eq!(sheet_title("Łódź – hala"), "Łódź – hala");
    }

    #[test]
    fn test_empty_workbook_has_no_projects() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        assert!(book.list_projects(false).unwrap().is_empty());
        assert!(book.path().exists());
    }

    #[test]
    fn test_add_project_creates_index_and_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());

        assert!(book.add_project("  Osiedle Zielone  ").unwrap());
        let projects = book.list_projects(true).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Osiedle Zielone");
        assert!(projects[0].active);
        assert!(!projects[0].finished);
        assert!(!projects[0].created_at.is_empty());

        let stages = book.read_stages("Osiedle Zielone").unwrap();
        assert_eq!(stages.len(), 7);
        assert_eq!(stages[6].1.stage, "Prace dodatkowe");
        assert_eq!(stages[0].1.finished, "-");
        assert!(stages[0].1.percent.is_empty());
    }

    #[test]
    fn test_add_project_ignores_blank_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());

        assert!(!book.add_project("   ").unwrap());
        assert!(book.add_project("Hala").unwrap());
        assert!(!book.add_project("Hala").unwrap());
        assert_eq!(book.list_projects(false).unwrap().len(), 1);
    }

    #[test]
    fn test_active_and_finished_flags() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        book.add_project("A").unwrap();
        book.add_project("B").unwrap();

        book.set_project_active("A", false).unwrap();
        book.set_project_finished("B", true).unwrap();

        let active: Vec<String> = book
            .list_projects(true)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(active, vec!["B".to_owned()]);

        let all = book.list_projects(false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all[0].active);
        assert!(all[1].finished);

        book.set_project_active("A", true).unwrap();
        assert_eq!(book.list_projects(true).unwrap().len(), 2);
    }

    #[test]
    fn test_update_stage_stamps_editor() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        book.add_project("Most").unwrap();

        book.update_stage(
            "Most",
            StageCode::S2,
            &[
                (StageField::Percent, FieldValue::Number(75)),
                (StageField::ToFinish, FieldValue::text("Barierki")),
            ],
            &editor(),
        )
        .unwrap();

        let record = book.read_stage("Most", StageCode::S2).unwrap();
        assert_eq!(record.percent_value(), Some(75));
        assert_eq!(record.to_finish, "Barierki");
        assert_eq!(record.last_editor, "Anna");
        assert_eq!(record.last_editor_id, "1001");
        assert_eq!(record.last_updated.len(), "01.01.2025 12:00:00".len());

        let untouched = book.read_stage("Most", StageCode::S1).unwrap();
        assert!(untouched.last_editor.is_empty());
    }

    #[test]
    fn test_empty_update_still_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        book.add_project("P").unwrap();

        book.update_stage("P", StageCode::S7, &[], &editor()).unwrap();
        let record = book.read_stage("P", StageCode::S7).unwrap();
        assert!(!record.last_updated.is_empty());
        assert_eq!(record.last_editor, "Anna");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(matches!(
            "Stage".parse::<StageField>(),
            Err(StoreError::UnsupportedField(f)) if f == "Stage"
        ));
        assert!("LastEditor".parse::<StageField>().is_err());
        assert_eq!("Notes".parse::<StageField>().unwrap(), StageField::Notes);
    }

    #[test]
    fn test_read_stage_creates_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());

        // Sheet never registered through add_project.
        let record = book.read_stage("Sierota", StageCode::S4).unwrap();
        assert_eq!(record, StageRecord::blank("Etap 4"));
    }

    #[test]
    fn test_percent_preview() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        book.add_project("P").unwrap();
        book.update_stage(
            "P",
            StageCode::S1,
            &[(StageField::Percent, FieldValue::Number(50))],
            &editor(),
        )
        .unwrap();

        assert_eq!(
            book.percent_preview("P"),
            "1 50% | 2 - | 3 - | 4 - | 5 - | 6 - | dodatkowe -"
        );
    }

    #[test]
    fn test_percent_preview_unreadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        std::fs::write(book.path(), b"not a workbook").unwrap();

        assert_eq!(book.percent_preview("P"), "-");
    }

    #[test]
    fn test_concurrent_photo_appends_keep_every_id() {
        let dir = tempfile::tempdir().unwrap();
        book_in(dir.path()).add_project("P").unwrap();

        let handles: Vec<_> = (0..6)
            .map(|worker| {
                let lock = FileLock::new(dir.path().join("projects.lock"), Duration::from_secs(60));
                let book = ProjectBook::new(dir.path().join("projects.xlsx"), lock);
                std::thread::spawn(move || {
                    for n in 0..3 {
                        book.append_photo("P", StageCode::S2, &format!("w{worker}p{n}"), &editor())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let record = book_in(dir.path()).read_stage("P", StageCode::S2).unwrap();
        let mut ids = record.photo_ids();
        ids.sort_unstable();
        let mut expected: Vec<String> = (0..6)
            .flat_map(|w| (0..3).map(move |n| format!("w{w}p{n}")))
            .collect();
        expected.sort_unstable();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_append_photo_caps_history() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        book.add_project("P").unwrap();

        let existing: Vec<String> = (0..MAX_PHOTOS).map(|i| format!("old{i}")).collect();
        book.update_stage(
            "P",
            StageCode::S3,
            &[(StageField::Photos, FieldValue::Text(existing.join(" ")))],
            &editor(),
        )
        .unwrap();

        book.append_photo("P", StageCode::S3, "fresh", &editor()).unwrap();
        let record = book.read_stage("P", StageCode::S3).unwrap();
        let ids = record.photo_ids();
        assert_eq!(ids.len(), MAX_PHOTOS);
        assert_eq!(ids.first().copied(), Some("old1"));
        assert_eq!(ids.last().copied(), Some("fresh"));
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(""), "-");
        assert_eq!(format_percent("90"), "90%");
        assert_eq!(format_percent("prawie"), "prawie");
    }
}
