//! Schedule — the facility timetable shown on screen.
//!
//! A schedule is a table: one column per zone (sauna) and one row per time
//! slot. Every row holds exactly one nullable cell per zone.

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::time::TimeOfDay;

/// Highest supported day offset (a week ahead).
pub const MAX_DAY_OFFSET: u8 = 7;

/// The full timetable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Schedule {
    /// Zone names, in column order.
    #[serde(alias = "saunas")]
    pub zones: Vec<String>,
    pub rows: Vec<ScheduleRow>,
}

/// One time slot across all zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub time: TimeOfDay,
    #[serde(default)]
    pub day_offset: u8,
    pub entries: Vec<Option<Cell>>,
}

/// A single scheduled session in one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cell {
    pub title: String,
    /// Intensity rating, 0–5.
    pub intensity: Option<u8>,
    pub note_ref: Option<String>,
    pub description: Option<String>,
    pub aromas: Vec<String>,
    pub facts: Vec<String>,
    /// Identifiers into the settings badge library.
    pub badges: Vec<String>,
    pub hidden: bool,
    pub highlight: bool,
}

impl Schedule {
    /// Check the table shape.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::RowWidth`] when a row does not have one entry
    /// per zone, or [`PayloadError::DayOffset`] for offsets beyond a week.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let expected = self.zones.len();
        for (row, entry) in self.rows.iter().enumerate() {
            if entry.entries.len() != expected {
                return Err(PayloadError::RowWidth {
                    row,
                    expected,
                    actual: entry.entries.len(),
                });
            }
            if entry.day_offset > MAX_DAY_OFFSET {
                return Err(PayloadError::DayOffset {
                    row,
                    offset: entry.day_offset,
                });
            }
        }
        Ok(())
    }

    /// Sort rows by `(day_offset, time)`, ties broken by the row's title.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| {
            (a.day_offset, a.time)
                .cmp(&(b.day_offset, b.time))
                .then_with(|| a.sort_title().cmp(b.sort_title()))
        });
    }

    /// Position of a zone column by name.
    #[must_use]
    pub fn zone_index(&self, zone: &str) -> Option<usize> {
        self.zones.iter().position(|z| z == zone)
    }

    /// Whether any row has a cell in the given zone column.
    #[must_use]
    pub fn zone_has_entries(&self, index: usize) -> bool {
        self.rows
            .iter()
            .any(|row| matches!(row.entries.get(index), Some(Some(_))))
    }

    /// Iterate over every present cell.
    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.rows
            .iter_mut()
            .flat_map(|row| row.entries.iter_mut().flatten())
    }
}

impl ScheduleRow {
    fn sort_title(&self) -> &str {
        self.entries
            .iter()
            .flatten()
            .map(|cell| cell.title.as_str())
            .find(|title| !title.is_empty())
            .unwrap_or_default()
    }
}
