//! Table and JSON rendering for entries.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use vaultkeep::Entry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// JSON shape of an entry; the sensitive fields only appear when revealed.
#[derive(Serialize)]
struct EntryView<'a> {
    unique_id: &'a str,
    description: &'a str,
    tags: &'a [String],
    site: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

impl<'a> EntryView<'a> {
    fn new(entry: &'a Entry, sensitive: bool) -> Self {
        Self {
            unique_id: &entry.unique_id,
            description: &entry.description,
            tags: &entry.tags,
            site: &entry.site,
            id: sensitive.then_some(entry.id.as_str()),
            password: sensitive.then_some(entry.password.as_str()),
        }
    }
}

pub fn render_entries(entries: &[Entry], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table(entries, false)),
        OutputFormat::Json => {
            let views: Vec<_> = entries.iter().map(|e| EntryView::new(e, false)).collect();
            Ok(serde_json::to_string_pretty(&views)?)
        }
    }
}

pub fn render_entry(entry: &Entry, sensitive: bool, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table(std::slice::from_ref(entry), sensitive)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&EntryView::new(
            entry, sensitive,
        ))?),
    }
}

fn table(entries: &[Entry], sensitive: bool) -> String {
    let mut header = vec!["Unique ID", "Description", "Tags", "Site"];
    if sensitive {
        header.extend(["ID", "Password"]);
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let mut row = vec![
                e.unique_id.clone(),
                e.description.clone(),
                e.tags.join(","),
                e.site.clone(),
            ];
            if sensitive {
                row.extend([e.id.clone(), e.password.clone()]);
            }
            row
        })
        .collect();

    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut out = String::new();
    push_row(&mut out, header.iter().copied(), &widths);
    push_row(&mut out, widths.iter().map(|w| "-".repeat(*w)), &widths);
    for row in &rows {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<I, S>(out: &mut String, cells: I, widths: &[usize])
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = cells
        .into_iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref()))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}
