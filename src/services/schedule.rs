//! Weekly class schedule
//!
//! The schedule spreadsheet holds one tab per week named `Schedule MM/DD`
//! (the Monday of that week) plus a hidden `Schedule Template`. Each class
//! occupies a block of rows: header (days), teacher row, assistant row.
//! Rotation keeps the next N weeks visible in date order and hides the rest.

use std::collections::HashSet;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};
use crate::config::settings::Settings;
use crate::services::google::{SheetProperties, SheetsClient};
use crate::services::settings::{validate_display_weeks, RuntimeSettingsService};
use crate::utils::errors::{GoogleError, Result};
use crate::utils::helpers::{escape_html, format_mmdd, today_with_offset, week_start};

pub const TEMPLATE_SHEET_TITLE: &str = "Schedule Template";
pub const SCHEDULE_PREFIX: &str = "Schedule ";

const HEADER_ROW: usize = 0;
const TEACHER_ROW: usize = 1;
const ASSISTANT_ROW: usize = 2;
const MIN_REQUIRED_ROWS: usize = 3;

/// One class block in the schedule tabs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassConfig {
    pub grade: String,
    pub sheet_range: String,
    pub time: String,
    pub room: String,
    pub max_assistants: u32,
    pub notes: String,
}

pub fn fallback_class_config() -> Vec<ClassConfig> {
    vec![
        ClassConfig {
            grade: "Grade 1".to_string(),
            sheet_range: "B7:G11".to_string(),
            time: "9:30 - 10:30 AM".to_string(),
            room: "Downstairs".to_string(),
            max_assistants: 4,
            notes: "Pre-A1 Starters (G1)".to_string(),
        },
        ClassConfig {
            grade: "Grade 4".to_string(),
            sheet_range: "B13:G16".to_string(),
            time: "9:30 - 10:30 AM".to_string(),
            room: "Upstairs".to_string(),
            max_assistants: 4,
            notes: "A1 Movers (G4)".to_string(),
        },
    ]
}

/// Parse `Schedule Config!A2:F` rows (grade, range, time, room, max assistants, notes)
pub fn parse_class_config(rows: &[Vec<String>]) -> Vec<ClassConfig> {
    rows.iter()
        .filter_map(|row| {
            let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
            let grade = cell(0);
            let sheet_range = cell(1);
            if grade.is_empty() || sheet_range.is_empty() {
                return None;
            }
            Some(ClassConfig {
                grade,
                sheet_range,
                time: cell(2),
                room: cell(3),
                max_assistants: cell(4).parse().unwrap_or(4),
                notes: cell(5),
            })
        })
        .collect()
}

/// Coverage of one class day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Optional,
    NoClassHoliday,
    NoClass,
    MissingTeacher,
    MissingAssistants,
    FullyCovered,
}

impl DayStatus {
    /// Status precedence: optional, no class, missing teacher, missing assistants, covered
    pub fn classify(teacher: &str, assistant: &str) -> Self {
        let teacher = teacher.trim().to_lowercase();
        let assistant = assistant.trim().to_lowercase();

        if teacher.contains("optional") {
            DayStatus::Optional
        } else if teacher.contains("no class") {
            if teacher.contains("holiday") {
                DayStatus::NoClassHoliday
            } else {
                DayStatus::NoClass
            }
        } else if teacher.contains("need volunteers") {
            DayStatus::MissingTeacher
        } else if assistant.contains("need volunteers") {
            DayStatus::MissingAssistants
        } else {
            DayStatus::FullyCovered
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DayStatus::Optional => "optional day, volunteers welcome to support existing classes",
            DayStatus::NoClassHoliday => "No class: holiday",
            DayStatus::NoClass => "No class",
            DayStatus::MissingTeacher => "❌ Missing Teacher",
            DayStatus::MissingAssistants => "❌ Missing TA's",
            DayStatus::FullyCovered => "✅ Fully Covered, TA's welcome to join",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            DayStatus::Optional | DayStatus::NoClassHoliday | DayStatus::NoClass => "#f5f5f5",
            DayStatus::MissingTeacher => "#ffcccc",
            DayStatus::MissingAssistants => "#fff3cd",
            DayStatus::FullyCovered => "#d4edda",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassTable {
    pub class_name: String,
    pub table_html: String,
    pub has_data: bool,
}

impl ClassTable {
    fn placeholder(class_name: &str, html: String) -> Self {
        Self {
            class_name: class_name.to_string(),
            table_html: html,
            has_data: false,
        }
    }
}

/// Render the Day / Teacher / Assistant(s) / Status table of one class
pub fn build_class_table(class: &ClassConfig, rows: &[Vec<String>]) -> ClassTable {
    if rows.len() < MIN_REQUIRED_ROWS {
        return ClassTable::placeholder(
            &class.grade,
            format!("<p>No data available for {}</p>", escape_html(&class.grade)),
        );
    }

    let tail = |row: &Vec<String>| -> Vec<String> { row.iter().skip(1).cloned().collect() };
    let days = tail(&rows[HEADER_ROW]);
    let teachers = tail(&rows[TEACHER_ROW]);
    let assistants = tail(&rows[ASSISTANT_ROW]);

    let cell_style = "padding: 8px; text-align: center;";
    let mut html = format!(
        "<h3>{} ({})</h3>",
        escape_html(&class.grade),
        escape_html(&class.time)
    );
    html.push_str("<table border='1' style='border-collapse: collapse; width: 100%;'>");
    html.push_str("<thead><tr style='background-color: #f0f0f0;'>");
    for heading in ["Day", "Teacher", "Assistant(s)", "Status"] {
        html.push_str(&format!("<th style='{}'>{}</th>", cell_style, heading));
    }
    html.push_str("</tr></thead><tbody>");

    for (i, day) in days.iter().enumerate() {
        let teacher = teachers.get(i).map(String::as_str).unwrap_or("");
        let assistant = assistants.get(i).map(String::as_str).unwrap_or("");
        let status = DayStatus::classify(teacher, assistant);

        html.push_str(&format!("<tr style='background-color: {};'>", status.color()));
        for value in [escape_html(day), escape_html(teacher), escape_html(assistant), status.label().to_string()] {
            html.push_str(&format!("<td style='{}'>{}</td>", cell_style, value));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");

    ClassTable {
        class_name: class.grade.clone(),
        table_html: html,
        has_data: true,
    }
}

pub fn schedule_title(monday: NaiveDate) -> String {
    format!("{}{}", SCHEDULE_PREFIX, format_mmdd(monday))
}

/// Date encoded in a `Schedule MM/DD` title, in the given year
pub fn parse_schedule_title(title: &str, year: i32) -> Option<NaiveDate> {
    let rest = title.strip_prefix(SCHEDULE_PREFIX)?;
    let (month, day) = rest.trim().split_once('/')?;
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn is_week_sheet(title: &str) -> bool {
    title.starts_with(SCHEDULE_PREFIX) && title != TEMPLATE_SHEET_TITLE
}

/// Monday and Friday of the first visible week tab, or of the current week
pub fn current_schedule_dates(sheets: &[SheetProperties], today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let mut visible: Vec<&SheetProperties> = sheets
        .iter()
        .filter(|s| is_week_sheet(&s.title) && !s.hidden)
        .collect();
    visible.sort_by_key(|s| s.index);

    let monday = visible
        .first()
        .and_then(|s| parse_schedule_title(&s.title, today.year()))
        .map(week_start)
        .unwrap_or_else(|| week_start(today));

    (monday, monday + Duration::days(4))
}

/// Mondays that should be visible: next week's Monday and the following weeks
pub fn display_dates(today: NaiveDate, weeks: u32) -> Vec<NaiveDate> {
    let Some(next_monday) = week_start(today).checked_add_signed(Duration::days(7)) else {
        return Vec::new();
    };
    (0..i64::from(weeks))
        .map_while(|i| next_monday.checked_add_signed(Duration::days(7 * i)))
        .collect()
}

/// One change applied to the schedule spreadsheet during rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RotationStep {
    Hide { sheet_id: i64, title: String },
    Unhide { sheet_id: i64, title: String },
    Move { sheet_id: i64, title: String, index: i64 },
    /// Duplicate the template, fill in dates, make visible and move to `index`
    Create {
        title: String,
        monday: NaiveDate,
        template_sheet_id: i64,
        insert_index: i64,
        index: i64,
    },
}

/// Compute the steps that make exactly `display_dates` visible, in order
/// directly after the template tab, and hide every other week tab.
///
/// Move indices follow the Sheets API convention: the index is read against
/// the order before the move, so moving a tab to a later slot uses the slot
/// number plus one.
pub fn plan_rotation(sheets: &[SheetProperties], display_dates: &[NaiveDate]) -> std::result::Result<Vec<RotationStep>, GoogleError> {
    let mut steps = Vec::new();
    let template = sheets.iter().find(|s| s.title == TEMPLATE_SHEET_TITLE);

    if let Some(template) = template.filter(|t| !t.hidden) {
        steps.push(RotationStep::Hide {
            sheet_id: template.sheet_id,
            title: template.title.clone(),
        });
    }

    let mut ordered: Vec<&SheetProperties> = sheets.iter().collect();
    ordered.sort_by_key(|s| s.index);
    let mut order: Vec<String> = ordered.into_iter().map(|s| s.title.clone()).collect();

    let wanted: Vec<String> = display_dates.iter().map(|d| schedule_title(*d)).collect();

    let mut anchor = template.map(|t| t.title.clone());
    for (title, monday) in wanted.iter().zip(display_dates) {
        match sheets.iter().find(|s| &s.title == title) {
            Some(existing) => {
                if existing.hidden {
                    steps.push(RotationStep::Unhide {
                        sheet_id: existing.sheet_id,
                        title: title.clone(),
                    });
                }
                if let Some(index) = reposition(&mut order, title, anchor.as_deref()) {
                    steps.push(RotationStep::Move {
                        sheet_id: existing.sheet_id,
                        title: title.clone(),
                        index,
                    });
                }
            }
            None => {
                let template = template.ok_or_else(|| GoogleError::SheetNotFound(TEMPLATE_SHEET_TITLE.to_string()))?;
                let insert_at = order
                    .iter()
                    .rposition(|t| t.starts_with(SCHEDULE_PREFIX))
                    .map(|i| i + 1)
                    .unwrap_or(0);
                order.insert(insert_at, title.clone());
                let index = reposition(&mut order, title, anchor.as_deref()).unwrap_or(insert_at as i64);
                steps.push(RotationStep::Create {
                    title: title.clone(),
                    monday: *monday,
                    template_sheet_id: template.sheet_id,
                    insert_index: insert_at as i64,
                    index,
                });
            }
        }
        anchor = Some(title.clone());
    }

    let wanted: HashSet<&String> = wanted.iter().collect();
    for sheet in sheets.iter().filter(|s| is_week_sheet(&s.title)) {
        if !sheet.hidden && !wanted.contains(&sheet.title) {
            steps.push(RotationStep::Hide {
                sheet_id: sheet.sheet_id,
                title: sheet.title.clone(),
            });
        }
    }

    Ok(steps)
}

/// Move `title` directly after `after` (or to the front) in the simulated
/// tab order. Returns the API index for the move, or `None` when the tab is
/// already in place.
fn reposition(order: &mut Vec<String>, title: &str, after: Option<&str>) -> Option<i64> {
    let current = order.iter().position(|t| t == title)?;
    let moved = order.remove(current);
    let target = after
        .and_then(|a| order.iter().position(|t| t == a))
        .map(|i| i + 1)
        .unwrap_or(0);
    order.insert(target, moved);
    if target == current {
        return None;
    }
    let index = if target > current { target + 1 } else { target };
    Some(index as i64)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RotationChanges {
    pub sheets_added: Vec<String>,
    pub sheets_hidden: Vec<String>,
    pub sheets_unhidden: Vec<String>,
    pub sheets_reordered: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SheetVisibility {
    pub visible_sheets: Vec<String>,
    pub hidden_sheets: Vec<String>,
}

impl SheetVisibility {
    fn from_sheets(sheets: &[SheetProperties]) -> Self {
        let mut week_sheets: Vec<&SheetProperties> = sheets
            .iter()
            .filter(|s| s.title.starts_with(SCHEDULE_PREFIX))
            .collect();
        week_sheets.sort_by_key(|s| s.index);

        let (hidden, visible): (Vec<&SheetProperties>, Vec<&SheetProperties>) =
            week_sheets.into_iter().partition(|s| s.hidden);
        Self {
            visible_sheets: visible.into_iter().map(|s| s.title.clone()).collect(),
            hidden_sheets: hidden.into_iter().map(|s| s.title.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub changes: RotationChanges,
    pub current_state: SheetVisibility,
    pub display_dates: Vec<String>,
    pub display_weeks_count: u32,
    pub display_weeks_override_used: bool,
}

/// Snapshot shown on the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleStatus {
    pub schedule_sheet_id: Option<String>,
    pub current_week_start: NaiveDate,
    pub current_week_end: NaiveDate,
    pub display_weeks_count: u32,
    pub sheets: SheetVisibility,
    pub class_config: Vec<ClassConfig>,
}

/// Header row range of a class block, e.g. `'Schedule 07/08'!B7:G7` for `B7:G11`
fn header_range(sheet_title: &str, class_range: &str) -> Option<String> {
    let (start, end) = class_range.split_once(':')?;
    let row: String = start.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
    let end_col: String = end.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if row.is_empty() || end_col.is_empty() {
        return None;
    }
    Some(format!("'{}'!{}:{}{}", sheet_title, start, end_col, row))
}

#[derive(Clone)]
pub struct ScheduleService {
    sheets: SheetsClient,
    runtime: RuntimeSettingsService,
    settings: Settings,
}

impl ScheduleService {
    pub fn new(sheets: SheetsClient, runtime: RuntimeSettingsService, settings: Settings) -> Self {
        Self { sheets, runtime, settings }
    }

    pub fn today(&self) -> NaiveDate {
        today_with_offset(self.settings.google.utc_offset_hours)
    }

    /// Sheets client carrying the retry policy from runtime settings
    pub async fn client(&self) -> SheetsClient {
        self.sheets.with_retry_policy(self.runtime.retry_policy().await)
    }

    pub fn is_enabled(&self) -> bool {
        self.sheets.is_enabled()
    }

    pub async fn schedule_sheet_id(&self) -> Result<String> {
        self.runtime
            .schedule_sheet_id()
            .await
            .ok_or_else(|| GoogleError::NotConfigured.into())
    }

    /// Class blocks from the config tab, falling back to the built-in layout
    pub async fn class_config(&self) -> Vec<ClassConfig> {
        let loaded = match self.schedule_sheet_id().await {
            Ok(sheet_id) => self
                .client()
                .await
                .get_values(&sheet_id, &self.settings.google.class_config_range)
                .await
                .map(|rows| parse_class_config(&rows)),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(config) if !config.is_empty() => {
                info!(classes = config.len(), "Loaded class configuration from Google Sheets");
                config
            }
            Ok(_) => {
                warn!("No class configuration rows found, using fallback config");
                fallback_class_config()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load class configuration, using fallback config");
                fallback_class_config()
            }
        }
    }

    /// HTML tables of every configured class for the reminder email
    pub async fn class_tables(&self) -> Vec<ClassTable> {
        let classes = self.class_config().await;
        let sheet_id = match self.schedule_sheet_id().await {
            Ok(id) => id,
            Err(_) => {
                return classes
                    .iter()
                    .map(|c| ClassTable::placeholder(&c.grade, format!("<p>No data available for {}</p>", escape_html(&c.grade))))
                    .collect();
            }
        };

        let client = self.client().await;
        let mut tables = Vec::with_capacity(classes.len());
        for class in &classes {
            let table = match client.get_values(&sheet_id, &class.sheet_range).await {
                Ok(rows) => build_class_table(class, &rows),
                Err(e) => {
                    warn!(class = %class.grade, error = %e, "Failed to build class table");
                    ClassTable::placeholder(&class.grade, format!("<p>Error loading data for {}</p>", escape_html(&class.grade)))
                }
            };
            tables.push(table);
        }
        tables
    }

    /// Week shown by the first visible tab; the current week when unavailable
    pub async fn current_schedule_dates(&self) -> (NaiveDate, NaiveDate) {
        let today = self.today();
        let sheets = match self.schedule_sheet_id().await {
            Ok(id) => self.client().await.get_metadata(&id).await,
            Err(e) => Err(e),
        };

        match sheets {
            Ok(sheets) => current_schedule_dates(&sheets, today),
            Err(e) => {
                warn!(error = %e, "Could not read schedule tabs, using current week");
                current_schedule_dates(&[], today)
            }
        }
    }

    pub async fn status(&self) -> Result<ScheduleStatus> {
        let sheet_id = self.runtime.schedule_sheet_id().await;
        let sheets = match &sheet_id {
            Some(id) => self.client().await.get_metadata(id).await?,
            None => Vec::new(),
        };
        let (monday, friday) = current_schedule_dates(&sheets, self.today());

        Ok(ScheduleStatus {
            schedule_sheet_id: sheet_id,
            current_week_start: monday,
            current_week_end: friday,
            display_weeks_count: self.runtime.display_weeks_count().await,
            sheets: SheetVisibility::from_sheets(&sheets),
            class_config: self.class_config().await,
        })
    }

    /// Write the title, week caption and weekday dates into a freshly duplicated tab
    async fn fill_dates(&self, client: &SheetsClient, spreadsheet_id: &str, title: &str, monday: NaiveDate, classes: &[ClassConfig]) -> Result<()> {
        let quoted = format!("'{}'", title);
        client
            .update_values(spreadsheet_id, &format!("{}!C1", quoted), &[vec![title.to_string()]])
            .await?;
        client
            .update_values(
                spreadsheet_id,
                &format!("{}!B1", quoted),
                &[vec![format!("Schedule for Week {}", format_mmdd(monday))]],
            )
            .await?;

        let dates: Vec<String> = (0..5).map(|i| format_mmdd(monday + Duration::days(i))).collect();
        for class in classes {
            let Some(range) = header_range(title, &class.sheet_range) else {
                warn!(class = %class.grade, range = %class.sheet_range, "Unusable class range, skipping date fill");
                continue;
            };
            let current = client.get_values(spreadsheet_id, &range).await?;
            let label = current
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or_default();
            let mut header = vec![label];
            header.extend(dates.iter().cloned());
            client.update_values(spreadsheet_id, &range, &[header]).await?;
        }

        info!(title = title, "Filled schedule dates");
        Ok(())
    }

    /// Rotate the visible window of week tabs
    pub async fn rotate(&self, display_weeks_override: Option<u32>) -> Result<RotationReport> {
        let spreadsheet_id = self.schedule_sheet_id().await?;
        let client = self.client().await;

        let display_weeks_count = match display_weeks_override {
            Some(weeks) => validate_display_weeks(weeks)?,
            None => self.runtime.display_weeks_count().await,
        };
        let dates = display_dates(self.today(), display_weeks_count);

        let before = client.get_metadata(&spreadsheet_id).await?;
        let steps = plan_rotation(&before, &dates)?;
        let classes = if steps.iter().any(|s| matches!(s, RotationStep::Create { .. })) {
            self.class_config().await
        } else {
            Vec::new()
        };

        let mut changes = RotationChanges::default();
        for step in &steps {
            match step {
                RotationStep::Hide { sheet_id, title } => {
                    client.set_sheet_hidden(&spreadsheet_id, *sheet_id, true).await?;
                    changes.sheets_hidden.push(title.clone());
                }
                RotationStep::Unhide { sheet_id, title } => {
                    client.set_sheet_hidden(&spreadsheet_id, *sheet_id, false).await?;
                    changes.sheets_unhidden.push(title.clone());
                }
                RotationStep::Move { sheet_id, title, index } => {
                    client.move_sheet(&spreadsheet_id, *sheet_id, *index).await?;
                    changes.sheets_reordered.push(title.clone());
                }
                RotationStep::Create { title, monday, template_sheet_id, insert_index, index } => {
                    let new_id = client
                        .duplicate_sheet(&spreadsheet_id, *template_sheet_id, *insert_index, title)
                        .await?;
                    self.fill_dates(&client, &spreadsheet_id, title, *monday, &classes).await?;
                    client.set_sheet_hidden(&spreadsheet_id, new_id, false).await?;
                    client.move_sheet(&spreadsheet_id, new_id, *index).await?;
                    changes.sheets_added.push(title.clone());
                }
            }
        }

        let after = client.get_metadata(&spreadsheet_id).await?;
        let report = RotationReport {
            changes,
            current_state: SheetVisibility::from_sheets(&after),
            display_dates: dates.iter().map(|d| schedule_title(*d)).collect(),
            display_weeks_count,
            display_weeks_override_used: display_weeks_override.is_some(),
        };

        info!(
            added = report.changes.sheets_added.len(),
            hidden = report.changes.sheets_hidden.len(),
            unhidden = report.changes.sheets_unhidden.len(),
            reordered = report.changes.sheets_reordered.len(),
            "Schedule rotation completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(id: i64, title: &str, index: i64, hidden: bool) -> SheetProperties {
        SheetProperties { sheet_id: id, title: title.to_string(), index, hidden }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rows(teacher: &[&str], assistant: &[&str]) -> Vec<Vec<String>> {
        let mut header = vec!["Grade 1".to_string()];
        header.extend(["07/08", "07/09", "07/10", "07/11", "07/12"].iter().take(teacher.len()).map(|s| s.to_string()));
        let mut t = vec!["Teacher".to_string()];
        t.extend(teacher.iter().map(|s| s.to_string()));
        let mut a = vec!["TA".to_string()];
        a.extend(assistant.iter().map(|s| s.to_string()));
        vec![header, t, a]
    }

    #[test]
    fn test_status_precedence() {
        assert_eq!(DayStatus::classify("Optional - no class", "need volunteers"), DayStatus::Optional);
        assert_eq!(DayStatus::classify("No class - Holiday", ""), DayStatus::NoClassHoliday);
        assert_eq!(DayStatus::classify("NO CLASS", "need volunteers"), DayStatus::NoClass);
        assert_eq!(DayStatus::classify("Need Volunteers", "need volunteers"), DayStatus::MissingTeacher);
        assert_eq!(DayStatus::classify("Anna", "Need volunteers"), DayStatus::MissingAssistants);
        assert_eq!(DayStatus::classify("Anna", "Bao"), DayStatus::FullyCovered);
        assert_eq!(DayStatus::MissingTeacher.color(), "#ffcccc");
        assert_eq!(DayStatus::MissingAssistants.color(), "#fff3cd");
        assert_eq!(DayStatus::FullyCovered.color(), "#d4edda");
    }

    #[test]
    fn test_build_class_table() {
        let class = &fallback_class_config()[0];
        let table = build_class_table(class, &rows(&["Anna", "need volunteers"], &["Bao"]));
        assert!(table.has_data);
        assert!(table.table_html.starts_with("<h3>Grade 1 (9:30 - 10:30 AM)</h3>"));
        assert!(table.table_html.contains("✅ Fully Covered, TA's welcome to join"));
        assert!(table.table_html.contains("❌ Missing Teacher"));
        assert_eq!(table.table_html.matches("<tr style='background-color: #").count(), 2);
    }

    #[test]
    fn test_build_class_table_escapes_and_handles_missing_rows() {
        let class = &fallback_class_config()[1];
        let empty = build_class_table(class, &[vec!["x".to_string()]]);
        assert!(!empty.has_data);
        assert_eq!(empty.table_html, "<p>No data available for Grade 4</p>");

        let table = build_class_table(class, &rows(&["<b>Anna</b>"], &["Bao"]));
        assert!(table.table_html.contains("&lt;b&gt;Anna&lt;/b&gt;"));
    }

    #[test]
    fn test_parse_class_config() {
        let parsed = parse_class_config(&[
            vec!["Grade 2".into(), "B20:G23".into(), "3 PM".into(), "Room 2".into(), "x".into()],
            vec!["".into(), "B1:G2".into()],
            vec!["Grade 3".into()],
        ]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].max_assistants, 4);
        assert_eq!(parsed[0].notes, "");
    }

    #[test]
    fn test_titles() {
        assert_eq!(schedule_title(date(2024, 7, 8)), "Schedule 07/08");
        assert_eq!(parse_schedule_title("Schedule 07/08", 2024), Some(date(2024, 7, 8)));
        assert_eq!(parse_schedule_title("Schedule Template", 2024), None);
        assert_eq!(header_range("Schedule 07/08", "B7:G11").as_deref(), Some("'Schedule 07/08'!B7:G7"));
        assert_eq!(header_range("Schedule 07/08", "B7"), None);
    }

    #[test]
    fn test_current_schedule_dates() {
        let today = date(2024, 7, 10);
        let sheets = vec![
            sheet(1, TEMPLATE_SHEET_TITLE, 0, false),
            sheet(2, "Schedule 07/01", 1, true),
            sheet(4, "Schedule 07/15", 3, false),
            sheet(3, "Schedule 07/08", 2, false),
        ];
        assert_eq!(current_schedule_dates(&sheets, today), (date(2024, 7, 8), date(2024, 7, 12)));
        assert_eq!(current_schedule_dates(&[], today), (date(2024, 7, 8), date(2024, 7, 12)));
    }

    #[test]
    fn test_display_dates_advance_one_week() {
        let today = date(2024, 7, 10);
        let this_week = display_dates(today, 4);
        assert_eq!(this_week[0], date(2024, 7, 15));
        assert_eq!(this_week.len(), 4);

        let next_week = display_dates(today + Duration::days(7), 4);
        assert_eq!(&this_week[1..], &next_week[..3]);
        assert_eq!(next_week[3], this_week[3] + Duration::days(7));
    }

    #[test]
    fn test_plan_rotation() {
        let sheets = vec![
            sheet(10, TEMPLATE_SHEET_TITLE, 0, false),
            sheet(11, "Schedule 07/08", 1, false),
            sheet(12, "Schedule 07/15", 2, false),
            sheet(13, "Schedule 07/22", 3, true),
            sheet(99, "Notes", 4, false),
        ];
        let dates = display_dates(date(2024, 7, 10), 3);
        let steps = plan_rotation(&sheets, &dates).unwrap();

        assert_eq!(
            steps,
            vec![
                RotationStep::Hide { sheet_id: 10, title: TEMPLATE_SHEET_TITLE.into() },
                RotationStep::Move { sheet_id: 12, title: "Schedule 07/15".into(), index: 1 },
                RotationStep::Unhide { sheet_id: 13, title: "Schedule 07/22".into() },
                RotationStep::Move { sheet_id: 13, title: "Schedule 07/22".into(), index: 2 },
                RotationStep::Create {
                    title: "Schedule 07/29".into(),
                    monday: date(2024, 7, 29),
                    template_sheet_id: 10,
                    insert_index: 4,
                    index: 3,
                },
                RotationStep::Hide { sheet_id: 11, title: "Schedule 07/08".into() },
            ]
        );
    }

    #[test]
    fn test_display_dates_near_calendar_end() {
        assert_eq!(display_dates(date(2024, 7, 10), 0), Vec::<NaiveDate>::new());

        let near_end = NaiveDate::MAX - Duration::days(40);
        let dates = display_dates(near_end, 20_000_000);
        assert!(!dates.is_empty() && dates.len() <= 6);
        assert!(dates.windows(2).all(|w| w[1] - w[0] == Duration::days(7)));

        assert!(display_dates(NaiveDate::MAX, 3).is_empty());
    }

    /// Replay the tab order changes the way the Sheets API applies them
    fn apply_order(sheets: &[SheetProperties], steps: &[RotationStep]) -> Vec<String> {
        let mut ordered: Vec<&SheetProperties> = sheets.iter().collect();
        ordered.sort_by_key(|s| s.index);
        let mut order: Vec<String> = ordered.into_iter().map(|s| s.title.clone()).collect();

        let move_to = |order: &mut Vec<String>, title: &str, index: i64| {
            let from = order.iter().position(|t| t == title).unwrap();
            let index = index as usize;
            let to = if index > from { index - 1 } else { index };
            let moved = order.remove(from);
            order.insert(to.min(order.len()), moved);
        };

        for step in steps {
            match step {
                RotationStep::Move { title, index, .. } => move_to(&mut order, title, *index),
                RotationStep::Create { title, insert_index, index, .. } => {
                    order.insert((*insert_index as usize).min(order.len()), title.clone());
                    move_to(&mut order, title, *index);
                }
                RotationStep::Hide { .. } | RotationStep::Unhide { .. } => {}
            }
        }
        order
    }

    #[test]
    fn test_plan_rotation_reverses_descending_tabs() {
        let sheets = vec![
            sheet(10, TEMPLATE_SHEET_TITLE, 0, true),
            sheet(11, "Schedule 07/29", 1, false),
            sheet(12, "Schedule 07/22", 2, false),
            sheet(13, "Schedule 07/15", 3, false),
        ];
        let steps = plan_rotation(&sheets, &display_dates(date(2024, 7, 10), 3)).unwrap();

        assert_eq!(
            apply_order(&sheets, &steps),
            vec![TEMPLATE_SHEET_TITLE, "Schedule 07/15", "Schedule 07/22", "Schedule 07/29"]
        );
    }

    #[test]
    fn test_plan_rotation_orders_mixed_tabs() {
        let sheets = vec![
            sheet(20, "Schedule 07/22", 0, true),
            sheet(10, TEMPLATE_SHEET_TITLE, 1, false),
            sheet(11, "Schedule 07/08", 2, false),
            sheet(99, "Notes", 3, false),
            sheet(13, "Schedule 07/15", 4, false),
        ];
        let steps = plan_rotation(&sheets, &display_dates(date(2024, 7, 10), 3)).unwrap();
        let order = apply_order(&sheets, &steps);

        let visible: Vec<&str> = order
            .iter()
            .map(String::as_str)
            .filter(|t| ["Schedule 07/15", "Schedule 07/22", "Schedule 07/29"].contains(t))
            .collect();
        assert_eq!(visible, vec!["Schedule 07/15", "Schedule 07/22", "Schedule 07/29"]);
        assert_eq!(order[1], "Schedule 07/15");
        assert_eq!(order.len(), 6);
    }

    #[test]
    fn test_plan_rotation_without_template() {
        let sheets = vec![sheet(11, "Schedule 07/15", 1, false)];
        let err = plan_rotation(&sheets, &display_dates(date(2024, 7, 10), 2)).unwrap_err();
        assert!(matches!(err, GoogleError::SheetNotFound(_)));
    }
}
