//! Diagnostic views of a configuration: the usage table and the redacted
//! value snapshot.

use std::fmt;
use std::io::{self, Write};

use super::capability::Slot;
use super::error::REDACTED;
use super::field::{FieldDescriptor, FieldVisitor};
use super::ConfigError;

const PADDING: usize = 4;

/// Writes `rows` under `header` as aligned columns.
///
/// Every column except the last is padded to its widest cell plus four
/// spaces; trailing whitespace is trimmed.
pub fn write_table<W, R, C>(w: &mut W, header: &[&str], rows: R) -> io::Result<()>
where
    W: Write + ?Sized,
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: AsRef<str>,
{
    let mut lines: Vec<Vec<String>> = vec![header.iter().map(|cell| cell.to_string()).collect()];
    lines.extend(
        rows.into_iter()
            .map(|row| row.into_iter().map(|cell| cell.as_ref().to_string()).collect()),
    );

    let columns = lines.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for line in &lines {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    for line in &lines {
        let mut out = String::new();
        for (i, cell) in line.iter().enumerate() {
            out.push_str(cell);
            if i + 1 < line.len() {
                let pad = widths[i] + PADDING - cell.chars().count();
                out.extend(std::iter::repeat(' ').take(pad));
            }
        }
        writeln!(w, "{}", out.trim_end())?;
    }
    Ok(())
}

pub(crate) const USAGE_HEADER: [&str; 5] = ["CONFIG", "ENV", "TYPE", "DEFAULT", "ON GCE"];

pub(crate) fn usage_row(group: &str, field: &FieldDescriptor) -> [String; 5] {
    [
        group.to_string(),
        field.key().to_string(),
        field.type_name().to_string(),
        field.default_value().unwrap_or_default().to_string(),
        field.on_gce_value().unwrap_or_default().to_string(),
    ]
}

/// Resolved values of one group, in collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub name: String,
    pub values: Vec<(String, String)>,
}

/// Rendered values of every group. Secret fields show as `<secret>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub groups: Vec<GroupSnapshot>,
}

impl Snapshot {
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == group)?
            .values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(f, "{}:", group.name)?;
            for (key, value) in &group.values {
                writeln!(f, "  {key}={value}")?;
            }
        }
        Ok(())
    }
}

/// Visitor rendering each leaf's current value.
#[derive(Default)]
pub(crate) struct Renderer {
    pub(crate) values: Vec<(String, String)>,
}

impl FieldVisitor for Renderer {
    fn visit(&mut self, field: &FieldDescriptor, slot: &mut dyn Slot) -> Result<(), ConfigError> {
        let rendered = if field.is_secret() {
            REDACTED.to_string()
        } else {
            slot.render()
        };
        self.values.push((field.key().to_string(), rendered));
        Ok(())
    }
}
