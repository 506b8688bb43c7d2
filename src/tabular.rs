//! Tabular data in and out: university roster files (CSV/XLSX) parsed into
//! create requests, and the agent roster exported as CSV.
//!
//! Pure byte-slice in, rows out — no I/O here, so the whole module is
//! exercised by unit tests.

use crate::models::{Agent, CreateUniversity};
use calamine::{Data, Reader, Xls, Xlsx};
use std::fmt;
use std::io::Cursor;

/// A roster row needs at least: name, country, programs, intakes, tuition,
/// requirements.
const MIN_COLUMNS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabularError {
    /// File extension outside csv/xls/xlsx.
    UnsupportedFormat(String),
    /// No data rows behind the header.
    Empty,
    /// The file could not be decoded at all.
    Unreadable(String),
}

impl fmt::Display for TabularError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabularError::UnsupportedFormat(ext) => {
                write!(f, "unsupported file format '{ext}' (expected csv, xls, or xlsx)")
            }
            TabularError::Empty => write!(f, "no data rows found in file"),
            TabularError::Unreadable(reason) => write!(f, "could not read file: {reason}"),
        }
    }
}

// ── University roster ingest ────────────────────────────────────

/// Parse an uploaded roster file, dispatching on the file extension.
pub fn parse_university_upload(
    file_name: &str,
    bytes: &[u8],
) -> Result<Vec<CreateUniversity>, TabularError> {
    let ext = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => parse_university_csv(bytes),
        "xlsx" => parse_university_xlsx(bytes),
        "xls" => parse_university_xls(bytes),
        other => Err(TabularError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse a CSV roster. The first line is a header and is skipped; rows with
/// fewer than six columns or an empty name are dropped, not fatal.
pub fn parse_university_csv(bytes: &[u8]) -> Result<Vec<CreateUniversity>, TabularError> {
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|e| TabularError::Unreadable(e.to_string()))?;
    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .map(split_csv_line)
        .collect();
    rows_to_universities(rows)
}

pub fn parse_university_xlsx(bytes: &[u8]) -> Result<Vec<CreateUniversity>, TabularError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| TabularError::Unreadable(e.to_string()))?;
    sheet_to_universities(workbook.worksheet_range_at(0))
}

pub fn parse_university_xls(bytes: &[u8]) -> Result<Vec<CreateUniversity>, TabularError> {
    let mut workbook = Xls::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| TabularError::Unreadable(e.to_string()))?;
    sheet_to_universities(workbook.worksheet_range_at(0))
}

fn sheet_to_universities<E: fmt::Display>(
    range: Option<Result<calamine::Range<Data>, E>>,
) -> Result<Vec<CreateUniversity>, TabularError> {
    let range = range
        .ok_or(TabularError::Empty)?
        .map_err(|e| TabularError::Unreadable(e.to_string()))?;
    let rows: Vec<Vec<String>> = range
        .rows()
        .skip(1)
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    rows_to_universities(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn rows_to_universities(rows: Vec<Vec<String>>) -> Result<Vec<CreateUniversity>, TabularError> {
    let universities: Vec<CreateUniversity> = rows
        .into_iter()
        .filter(|row| row.len() >= MIN_COLUMNS && !row[0].trim().is_empty())
        .map(|row| CreateUniversity {
            name: row[0].trim().to_string(),
            country: row[1].trim().to_string(),
            programs: split_list(&row[2]),
            intakes: split_list(&row[3]),
            tuition: row[4].trim().to_string(),
            requirements: row[5].trim().to_string(),
        })
        .collect();
    if universities.is_empty() {
        return Err(TabularError::Empty);
    }
    Ok(universities)
}

/// Multi-value cells use `,` or `;` as separators.
fn split_list(cell: &str) -> Vec<String> {
    cell.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split one CSV line, honoring double-quoted fields and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

// ── Agent roster export ─────────────────────────────────────────

const EXPORT_HEADER: &str =
    "Name,Email,Company,Country,Phone,Status,Total Applications,Accepted Applications,Joined Date,Last Login";

/// Render the agent roster as CSV for download.
pub fn export_agents_csv(agents: &[Agent]) -> String {
    let mut lines = Vec::with_capacity(agents.len() + 1);
    lines.push(EXPORT_HEADER.to_string());
    for agent in agents {
        lines.push(
            [
                csv_escape(&agent.name),
                csv_escape(&agent.email),
                csv_escape(&agent.company),
                csv_escape(&agent.country),
                csv_escape(&agent.phone),
                agent.status.as_str().to_string(),
                agent.total_applications.to_string(),
                agent.accepted_applications.to_string(),
                csv_escape(&agent.created_at),
                csv_escape(agent.last_login.as_deref().unwrap_or("Never")),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
