//! Data preview and row selection before import
//!
//! Rows carrying at least one error-level issue are "blocked": they start
//! deselected and can never be selected. Selection is tracked by absolute
//! row index so it survives paging.

use std::collections::BTreeSet;

use crate::onboarding::record::{MappedRecord, TargetField};
use crate::onboarding::validator::{Severity, ValidationIssue};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct RowSelector {
    records: Vec<MappedRecord>,
    issues: Vec<ValidationIssue>,
    blocked: BTreeSet<usize>,
    selected: BTreeSet<usize>,
    all_selected: bool,
    page: usize,
    page_size: usize,
}

impl RowSelector {
    pub fn new(records: Vec<MappedRecord>, issues: Vec<ValidationIssue>) -> Self {
        Self::with_page_size(records, issues, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        records: Vec<MappedRecord>,
        issues: Vec<ValidationIssue>,
        page_size: usize,
    ) -> Self {
        let blocked: BTreeSet<usize> = issues
            .iter()
            .filter(|i| i.is_error())
            .map(|i| i.row)
            .collect();

        let mut selector = Self {
            records,
            issues,
            blocked,
            selected: BTreeSet::new(),
            all_selected: false,
            page: 1,
            page_size: page_size.max(1),
        };
        selector.select_all_eligible();
        selector
    }

    fn eligible(&self) -> BTreeSet<usize> {
        (0..self.records.len())
            .filter(|i| !self.blocked.contains(i))
            .collect()
    }

    fn select_all_eligible(&mut self) {
        self.selected = self.eligible();
        self.all_selected = true;
    }

    pub fn records(&self) -> &[MappedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows with at least one error-level issue
    pub fn blocked_rows(&self) -> &BTreeSet<usize> {
        &self.blocked
    }

    pub fn is_blocked(&self, row: usize) -> bool {
        self.blocked.contains(&row)
    }

    pub fn selected_rows(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn is_selected(&self, row: usize) -> bool {
        self.selected.contains(&row)
    }

    /// Whether the select-all indicator is on
    pub fn all_selected(&self) -> bool {
        self.all_selected
    }

    /// Clear the selection, or reset it to every non-blocked row
    pub fn toggle_all(&mut self) {
        if self.all_selected {
            self.selected.clear();
            self.all_selected = false;
        } else {
            self.select_all_eligible();
        }
    }

    /// Flip one row. Returns `false` without changing anything for blocked
    /// or out-of-range rows.
    pub fn toggle_row(&mut self, row: usize) -> bool {
        if row >= self.records.len() || self.blocked.contains(&row) {
            return false;
        }
        if !self.selected.remove(&row) {
            self.selected.insert(row);
        }
        self.all_selected = self.selected == self.eligible();
        true
    }

    /// Deselect a row if it is selected
    pub fn deselect(&mut self, row: usize) -> bool {
        if self.is_selected(row) {
            self.toggle_row(row)
        } else {
            false
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.records.len().div_ceil(self.page_size)
    }

    /// Move to a 1-based page, clamped to the available range
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Rows on the current page with their absolute indices
    pub fn page_rows(&self) -> impl Iterator<Item = (usize, &MappedRecord)> {
        let start = (self.page - 1) * self.page_size;
        self.records
            .iter()
            .enumerate()
            .skip(start)
            .take(self.page_size)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn issues_for_row(&self, row: usize) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.row == row)
    }

    /// Severity of the first issue recorded for a cell
    pub fn field_severity(&self, row: usize, field: TargetField) -> Option<Severity> {
        self.issues
            .iter()
            .find(|i| i.row == row && i.field == field)
            .map(|i| i.severity)
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| !i.is_error()).count()
    }

    /// Selected records paired with their row index, in original order
    pub fn confirm(&self) -> Vec<(usize, MappedRecord)> {
        self.selected
            .iter()
            .filter_map(|&row| self.records.get(row).map(|r| (row, r.clone())))
            .collect()
    }
}
