//! Rendering of command results as plain lines or pretty JSON.

use std::io::Write;

use serde::Serialize;
use shelfmark_core::entity::{Area, Item, Location, Section};
use shelfmark_core::pool::PreGeneratedQr;

pub fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// One-line rendering used by list and add commands.
pub trait Line {
    fn line(&self) -> String;
}

impl Line for Location {
    fn line(&self) -> String {
        format!("{}\t{}\t{}", self.id, self.name, self.qr_data)
    }
}

impl Line for Area {
    fn line(&self) -> String {
        format!("{}\t{}\t{}\tlocation={}", self.id, self.name, self.qr_data, self.location_id)
    }
}

impl Line for Section {
    fn line(&self) -> String {
        format!("{}\t{}\t{}\tarea={}", self.id, self.name, self.qr_data, self.area_id)
    }
}

impl Line for Item {
    fn line(&self) -> String {
        let section = self.section_id.as_deref().unwrap_or("-");
        format!(
            "{}\t{}\t{}\tarea={}\tsection={}\tqty={}\t{}",
            self.id, self.name, self.qr_data, self.area_id, section, self.quantity, self.condition
        )
    }
}

impl Line for PreGeneratedQr {
    fn line(&self) -> String {
        match &self.assignment {
            Some(a) => format!("{}\t{}\t{} {}", self.qr_data, self.status(), a.kind, a.entity_id),
            None => format!("{}\t{}", self.qr_data, self.status()),
        }
    }
}

/// Write `values` either as one JSON array or one line each.
pub fn print_records<'a, T>(
    out: &mut dyn Write,
    json: bool,
    values: impl IntoIterator<Item = &'a T>,
) -> anyhow::Result<()>
where
    T: Line + Serialize + 'a,
{
    if json {
        let values: Vec<&T> = values.into_iter().collect();
        return print_json(out, &values);
    }
    for value in values {
        writeln!(out, "{}", value.line())?;
    }
    Ok(())
}

/// Write a single record.
pub fn print_record<T: Line + Serialize>(out: &mut dyn Write, json: bool, value: &T) -> anyhow::Result<()> {
    if json {
        print_json(out, value)
    } else {
        writeln!(out, "{}", value.line())?;
        Ok(())
    }
}
