//! Standalone inspection tool for the project workbook.
//!
//! Prints every project with its stage progress, reading the same
//! workbook and lock file the bot uses.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use etapy_bot::config::{LOCK_FILE, WORKBOOK_FILE};
use etapy_bot::store::{FileLock, Project, ProjectBook, StageRecord, progress_line};

/// Project workbook report.
#[derive(Parser, Debug)]
#[command(name = "etapy_report")]
#[command(about = "Prints project stage progress from the bot's Excel workbook")]
#[command(version)]
struct Args {
    /// Directory holding projects.xlsx.
    #[arg(short, long, env = "DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Include archived projects.
    #[arg(short, long)]
    all: bool,

    /// Show every stage of each project.
    #[arg(short, long)]
    verbose: bool,

    /// Seconds to wait for the workbook lock.
    #[arg(long, default_value_t = 30)]
    lock_timeout: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    report(&args.data_dir, args.all, args.verbose, Duration::from_secs(args.lock_timeout))
}

fn report(data_dir: &Path, all: bool, verbose: bool, lock_timeout: Duration) -> ExitCode {
    let path = data_dir.join(WORKBOOK_FILE);
    if !path.is_file() {
        eprintln!("✗ Workbook not found: {}", path.display());
        return ExitCode::FAILURE;
    }
    println!("Workbook: {}\n", path.display());

    let book = ProjectBook::new(path, FileLock::new(data_dir.join(LOCK_FILE), lock_timeout));

    let projects = match book.list_projects(!all) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("✗ Failed to read projects: {e}");
            return ExitCode::FAILURE;
        }
    };

    if projects.is_empty() {
        println!("No projects.");
        return ExitCode::SUCCESS;
    }

    let mut failures = 0;
    for project in &projects {
        println!("{} {}", status_icon(project), project.name);

        if !verbose {
            println!("  {}\n", book.percent_preview(&project.name));
            continue;
        }

        let stages = match book.read_stages(&project.name) {
            Ok(s) => s,
            Err(e) => {
                failures += 1;
                eprintln!("  ✗ Failed to read stages: {e}");
                continue;
            }
        };

        println!("  {}", progress_line(&stages));
        for (code, record) in &stages {
            print_stage(code.name(), record);
        }
        println!();
    }

    let finished = projects.iter().filter(|p| p.finished).count();
    let archived = projects.iter().filter(|p| !p.active).count();
    println!(
        "Summary: {} projects, {} finished, {} archived",
        projects.len(),
        finished,
        archived
    );

    if failures > 0 {
        eprintln!("✗ {failures} project sheet(s) could not be read");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn status_icon(project: &Project) -> &'static str {
    match (project.finished, project.active) {
        (true, _) => "✓",
        (false, true) => "●",
        (false, false) => "○",
    }
}

fn print_stage(name: &str, record: &StageRecord) {
    let percent = record
        .percent_value()
        .map_or_else(|| dash(&record.percent).to_owned(), |p| format!("{p}%"));
    println!(
        "  - {name}: {percent} | photos {} | {}",
        record.photo_count(),
        dash(&record.last_updated)
    );
    if !record.to_finish.is_empty() {
        println!("      todo:  {}", truncate(&record.to_finish, 60));
    }
    if !record.notes.is_empty() {
        println!("      notes: {}", truncate(&record.notes, 60));
    }
}

fn dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("żółć gęślą", 4), "żółć...");
    }

    #[test]
    fn test_status_icon() {
        let mut project = Project {
            name: "Dom".to_owned(),
            active: true,
            finished: false,
            created_at: String::new(),
        };
        assert_eq!(status_icon(&project), "●");
        project.active = false;
        assert_eq!(status_icon(&project), "○");
        project.finished = true;
        assert_eq!(status_icon(&project), "✓");
    }

    #[test]
    fn test_missing_workbook_fails() {
        let dir = tempfile::tempdir().unwrap();
        let code = report(dir.path(), true, false, Duration::from_secs(1));
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn test_report_existing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let book = ProjectBook::new(
            dir.path().join(WORKBOOK_FILE),
            FileLock::new(dir.path().join(LOCK_FILE), Duration::from_secs(1)),
        );
        book.add_project("Dom").unwrap();

        let code = report(dir.path(), false, true, Duration::from_secs(1));
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_report_compact_listing() {
        let dir = tempfile::tempdir().unwrap();
        let book = ProjectBook::new(
            dir.path().join(WORKBOOK_FILE),
            FileLock::new(dir.path().join(LOCK_FILE), Duration::from_secs(1)),
        );
        book.add_project("Dom").unwrap();
        book.add_project("Hala").unwrap();
        book.set_project_active("Hala", false).unwrap();

        assert_eq!(report(dir.path(), true, false, Duration::from_secs(1)), ExitCode::SUCCESS);
    }
}
