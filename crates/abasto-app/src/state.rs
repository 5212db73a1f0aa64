// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

use crate::edits::EditBuffer;
use crate::export::{DEFAULT_EXPORT_OFFSET, ExportBatch, build_export, export_file_name};
use crate::forms::parse_divisor;
use crate::ids::RowKey;
use crate::model::{
    ColumnId, ColumnVisibility, ColumnWidths, FilterField, FilterOptions, FilterSelection,
    PageQuery, PageResult, PageSize, Row,
};
use crate::view::{PageView, SortState};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastSettings {
    pub page_size: PageSize,
    pub debounce: Duration,
    pub export_offset: UtcOffset,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            page_size: PageSize::DEFAULT,
            debounce: DEFAULT_DEBOUNCE,
            export_offset: DEFAULT_EXPORT_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

/// An action that would drop unsaved edits and therefore waits on the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    ApplyFilters,
    ClearFilters,
    GoToPage(u32),
    SetPageSize(PageSize),
    Refresh,
}

impl PendingAction {
    pub const fn describe(self) -> &'static str {
        match self {
            Self::ApplyFilters => "apply filters",
            Self::ClearFilters => "clear filters",
            Self::GoToPage(_) => "change page",
            Self::SetPageSize(_) => "change page size",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastCommand {
    /// Initial load: options, then page 1.
    Start,
    SetFilter(FilterField, Vec<String>),
    DebounceElapsed { token: u64 },
    ApplyFiltersNow,
    ClearFilters,
    GoToPage(u32),
    NextPage,
    PrevPage,
    SetPageSize(PageSize),
    Refresh,
    EditSuggested { key: RowKey, raw: String },
    Export { now: OffsetDateTime },
    ResetEdits,
    ConfirmDiscard,
    DeclineDiscard,
    OptionsLoaded(FilterOptions),
    OptionsFailed(String),
    DataLoaded(PageResult),
    DataFailed(String),
    ExportWritten { location: String, keys: Vec<RowKey> },
    ExportFailed(String),
    SortBy(ColumnId),
    DivideShipment { column: ColumnId, raw: String },
    ApplyColumns(ColumnVisibility),
    ResetColumns,
    ResizeColumn { column: ColumnId, delta: i32 },
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastEffect {
    ScheduleFilterApply { token: u64, delay: Duration },
    FetchOptions(FilterSelection),
    FetchData(PageQuery),
    PromptDiscard(PendingAction),
    WriteExport(ExportBatch),
    Status(StatusMessage),
}

/// The forecast table controller. Pure: every side effect is returned.
#[derive(Debug, Clone)]
pub struct ForecastState {
    /// Values shown in the filter controls.
    pub filters: FilterSelection,
    /// Selection of the most recent fetch.
    pub applied_filters: FilterSelection,
    pub options: FilterOptions,
    pub page_size: PageSize,
    pub result: Option<PageResult>,
    pub view: PageView,
    pub load: LoadState,
    pub edits: EditBuffer,
    pub columns: ColumnVisibility,
    pub widths: ColumnWidths,
    pub sort: Option<SortState>,
    pub pending_discard: Option<PendingAction>,
    pub status: Option<StatusMessage>,
    debounce: Duration,
    export_offset: UtcOffset,
    debounce_token: u64,
    pending_debounce: Option<u64>,
}

impl Default for ForecastState {
    fn default() -> Self {
        Self::new(ForecastSettings::default())
    }
}

impl ForecastState {
    pub fn new(settings: ForecastSettings) -> Self {
        Self {
            filters: FilterSelection::default(),
            applied_filters: FilterSelection::default(),
            options: FilterOptions::default(),
            page_size: settings.page_size,
            result: None,
            view: PageView::default(),
            load: LoadState::Idle,
            edits: EditBuffer::default(),
            columns: ColumnVisibility::default(),
            widths: ColumnWidths::default(),
            sort: None,
            pending_discard: None,
            status: None,
            debounce: settings.debounce,
            export_offset: settings.export_offset,
            debounce_token: 0,
            pending_debounce: None,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.result.as_ref().map_or(1, |result| result.page)
    }

    pub fn total_pages(&self) -> u32 {
        self.result.as_ref().map_or(1, |result| result.total_pages)
    }

    pub fn total(&self) -> u64 {
        self.result.as_ref().map_or(0, |result| result.total)
    }

    pub fn records(&self) -> &[Row] {
        self.result
            .as_ref()
            .map(|result| result.records.as_slice())
            .unwrap_or_default()
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_page() > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.current_page() < self.total_pages()
    }

    pub fn has_debounce_pending(&self) -> bool {
        self.pending_debounce.is_some()
    }

    pub fn dispatch(&mut self, command: ForecastCommand) -> Vec<ForecastEffect> {
        match command {
            ForecastCommand::Start => self.perform(PendingAction::ApplyFilters),
            ForecastCommand::SetFilter(field, values) => {
                self.filters.set(field, values);
                self.debounce_token += 1;
                self.pending_debounce = Some(self.debounce_token);
                vec![ForecastEffect::ScheduleFilterApply {
                    token: self.debounce_token,
                    delay: self.debounce,
                }]
            }
            ForecastCommand::DebounceElapsed { token } => {
                if self.pending_debounce != Some(token) {
                    tracing::trace!(token, "stale debounce token ignored");
                    return Vec::new();
                }
                self.pending_debounce = None;
                self.guard(PendingAction::ApplyFilters)
            }
            ForecastCommand::ApplyFiltersNow => {
                self.pending_debounce = None;
                self.guard(PendingAction::ApplyFilters)
            }
            ForecastCommand::ClearFilters => {
                self.pending_debounce = None;
                self.guard(PendingAction::ClearFilters)
            }
            ForecastCommand::GoToPage(page) => self.go_to_page(page),
            ForecastCommand::NextPage => self.go_to_page(self.current_page().saturating_add(1)),
            ForecastCommand::PrevPage => self.go_to_page(self.current_page().saturating_sub(1)),
            ForecastCommand::SetPageSize(size) => {
                if size == self.page_size {
                    return Vec::new();
                }
                self.guard(PendingAction::SetPageSize(size))
            }
            ForecastCommand::Refresh => self.guard(PendingAction::Refresh),
            ForecastCommand::EditSuggested { key, raw } => {
                self.edits.edit(key, &raw);
                Vec::new()
            }
            ForecastCommand::Export { now } => self.export(now),
            ForecastCommand::ResetEdits => {
                if self.edits.is_empty() {
                    return Vec::new();
                }
                self.edits.clear();
                vec![self.set_status(StatusLevel::Info, "suggested values cleared")]
            }
            ForecastCommand::ConfirmDiscard => {
                let Some(action) = self.pending_discard.take() else {
                    return Vec::new();
                };
                self.edits.clear();
                let mut effects = vec![self.set_status(StatusLevel::Info, "unsaved edits discarded")];
                effects.extend(self.perform(action));
                effects
            }
            ForecastCommand::DeclineDiscard => {
                if self.pending_discard.take().is_none() {
                    return Vec::new();
                }
                self.filters = self.applied_filters.clone();
                vec![self.set_status(StatusLevel::Info, "kept unsaved edits")]
            }
            ForecastCommand::OptionsLoaded(options) => {
                let dropped = self.applied_filters.retain_offered(&options);
                self.filters.retain_offered(&options);
                if !dropped.is_empty() {
                    tracing::debug!(count = dropped.len(), "dropped filter values no longer offered");
                }
                self.options = options;
                vec![ForecastEffect::FetchData(self.query(1))]
            }
            ForecastCommand::OptionsFailed(message) => {
                tracing::warn!(%message, "filter options fetch failed");
                vec![
                    self.set_status(
                        StatusLevel::Error,
                        &format!("could not load filter options: {message}"),
                    ),
                    ForecastEffect::FetchData(self.query(1)),
                ]
            }
            ForecastCommand::DataLoaded(result) => {
                tracing::debug!(
                    page = result.page,
                    total_pages = result.total_pages,
                    rows = result.records.len(),
                    "forecast page loaded"
                );
                self.view = PageView::from_records(&result.records);
                self.sort = None;
                self.load = LoadState::Idle;
                self.result = Some(result);
                Vec::new()
            }
            ForecastCommand::DataFailed(message) => {
                tracing::warn!(%message, "forecast data fetch failed");
                self.load = LoadState::Failed(message.clone());
                vec![self.set_status(
                    StatusLevel::Error,
                    &format!("could not load forecast data: {message}"),
                )]
            }
            ForecastCommand::ExportWritten { location, keys } => {
                let removed = self.edits.remove_keys(&keys);
                tracing::info!(%location, rows = keys.len(), removed, "forecast export written");
                vec![self.set_status(
                    StatusLevel::Success,
                    &format!("exported {} rows to {location}", keys.len()),
                )]
            }
            ForecastCommand::ExportFailed(message) => {
                vec![self.set_status(StatusLevel::Error, &format!("export failed: {message}"))]
            }
            ForecastCommand::SortBy(column) => {
                if self.view.is_empty() {
                    return Vec::new();
                }
                let next = SortState::next(self.sort, column);
                self.view.sort(column, next.direction, &self.edits);
                self.sort = Some(next);
                Vec::new()
            }
            ForecastCommand::DivideShipment { column, raw } => self.divide(column, &raw),
            ForecastCommand::ApplyColumns(columns) => {
                self.columns = columns;
                Vec::new()
            }
            ForecastCommand::ResetColumns => {
                self.columns.reset();
                vec![self.set_status(StatusLevel::Info, "columns reset to defaults")]
            }
            ForecastCommand::ResizeColumn { column, delta } => {
                self.widths.resize(column, delta);
                Vec::new()
            }
            ForecastCommand::ClearStatus => {
                self.status = None;
                Vec::new()
            }
        }
    }

    fn go_to_page(&mut self, page: u32) -> Vec<ForecastEffect> {
        let total_pages = self.total_pages();
        if page < 1 || page > total_pages {
            return vec![self.set_status(
                StatusLevel::Warning,
                &format!("page {page} is out of range 1-{total_pages}"),
            )];
        }
        self.guard(PendingAction::GoToPage(page))
    }

    fn guard(&mut self, action: PendingAction) -> Vec<ForecastEffect> {
        if self.edits.is_dirty() {
            self.pending_discard = Some(action);
            return vec![ForecastEffect::PromptDiscard(action)];
        }
        self.perform(action)
    }

    fn perform(&mut self, action: PendingAction) -> Vec<ForecastEffect> {
        self.load = LoadState::Loading;
        match action {
            PendingAction::ApplyFilters => {
                self.pending_debounce = None;
                self.applied_filters = self.filters.clone();
                vec![ForecastEffect::FetchOptions(self.applied_filters.clone())]
            }
            PendingAction::ClearFilters => {
                self.pending_debounce = None;
                self.filters.clear();
                self.applied_filters.clear();
                vec![ForecastEffect::FetchOptions(FilterSelection::default())]
            }
            PendingAction::GoToPage(page) => vec![ForecastEffect::FetchData(self.query(page))],
            PendingAction::SetPageSize(size) => {
                self.page_size = size;
                vec![ForecastEffect::FetchData(self.query(1))]
            }
            PendingAction::Refresh => {
                vec![ForecastEffect::FetchData(self.query(self.current_page()))]
            }
        }
    }

    fn export(&mut self, now: OffsetDateTime) -> Vec<ForecastEffect> {
        let file_name = match export_file_name(now, self.export_offset) {
            Ok(file_name) => file_name,
            Err(error) => {
                return vec![self.set_status(StatusLevel::Error, &format!("{error:#}"))];
            }
        };
        match build_export(self.records(), &self.edits, file_name) {
            Some(batch) => vec![ForecastEffect::WriteExport(batch)],
            None => vec![self.set_status(
                StatusLevel::Warning,
                "no rows on this page have a suggested value to export",
            )],
        }
    }

    fn divide(&mut self, column: ColumnId, raw: &str) -> Vec<ForecastEffect> {
        if !column.is_shipment() {
            return vec![self.set_status(
                StatusLevel::Warning,
                &format!("{} cannot be divided", column.header()),
            )];
        }
        let divisor = match parse_divisor(raw) {
            Ok(divisor) => divisor,
            Err(error) => return vec![self.set_status(StatusLevel::Warning, &error.to_string())],
        };
        let modified = self.view.divide_column(column, divisor);
        vec![self.set_status(
            StatusLevel::Success,
            &format!(
                "divided {modified} values of {} by {divisor}",
                column.header()
            ),
        )]
    }

    fn query(&self, page: u32) -> PageQuery {
        PageQuery {
            filters: self.applied_filters.clone(),
            page,
            page_size: self.page_size,
        }
    }

    fn set_status(&mut self, level: StatusLevel, text: &str) -> ForecastEffect {
        let message = StatusMessage {
            level,
            text: text.to_owned(),
        };
        self.status = Some(message.clone());
        ForecastEffect::Status(message)
    }
}
