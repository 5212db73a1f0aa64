// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_app::{
    ColumnId, ColumnVisibility, ExportBatch, FilterField, FilterOptions, FilterSelection,
    ForecastCommand, ForecastEffect, ForecastState, ImportGate, ImportOutcome, LoadState,
    PageQuery, PageResult, Resource, RowKey, ShipmentClass, StatusLevel, StatusMessage,
};
use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_TTL: Duration = Duration::from_secs(4);
const RESIZE_STEP: i32 = 2;
const SELECTED_MARK: &str = "[x]";
const UNSELECTED_MARK: &str = "[ ]";

/// Backend and filesystem access for the forecast screen.
///
/// The `spawn_*` methods report through `tx`. Their defaults run inline, which
/// is what tests want; real runtimes override them to run on worker threads.
pub trait ForecastRuntime {
    fn fetch_options(&mut self, filters: &FilterSelection) -> Result<FilterOptions>;
    fn fetch_page(&mut self, query: &PageQuery) -> Result<PageResult>;
    fn write_export(&mut self, batch: &ExportBatch) -> Result<PathBuf>;
    fn import_file(&mut self, resource: Resource, path: &Path) -> ImportOutcome;

    fn spawn_options(&mut self, filters: FilterSelection, tx: Sender<InternalEvent>) -> Result<()> {
        let event = match self.fetch_options(&filters) {
            Ok(options) => InternalEvent::OptionsLoaded(options),
            Err(error) => InternalEvent::OptionsFailed(error.to_string()),
        };
        send_event(&tx, event)
    }

    fn spawn_page(&mut self, query: PageQuery, tx: Sender<InternalEvent>) -> Result<()> {
        let event = match self.fetch_page(&query) {
            Ok(result) => InternalEvent::DataLoaded(result),
            Err(error) => InternalEvent::DataFailed(error.to_string()),
        };
        send_event(&tx, event)
    }

    fn spawn_export(&mut self, batch: ExportBatch, tx: Sender<InternalEvent>) -> Result<()> {
        let keys = batch.keys().cloned().collect();
        let event = match self.write_export(&batch) {
            Ok(path) => InternalEvent::ExportWritten {
                location: path.display().to_string(),
                keys,
            },
            Err(error) => InternalEvent::ExportFailed(format!("{error:#}")),
        };
        send_event(&tx, event)
    }

    fn spawn_import(
        &mut self,
        resource: Resource,
        path: PathBuf,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = self.import_file(resource, &path);
        send_event(&tx, InternalEvent::ImportFinished(outcome))
    }
}

pub fn send_event(tx: &Sender<InternalEvent>, event: InternalEvent) -> Result<()> {
    tx.send(event)
        .map_err(|_| anyhow!("forecast event channel closed"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    DebounceElapsed { token: u64 },
    OptionsLoaded(FilterOptions),
    OptionsFailed(String),
    DataLoaded(PageResult),
    DataFailed(String),
    ExportWritten { location: String, keys: Vec<RowKey> },
    ExportFailed(String),
    ImportFinished(ImportOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Overlay {
    #[default]
    None,
    Help,
    Filters(FilterPickerUiState),
    ConfirmDiscard,
    ConfirmQuit,
    EditSuggested(EditUiState),
    Divide(DivideUiState),
    Columns(ColumnsUiState),
    Import(ImportUiState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct FilterPickerUiState {
    field: usize,
    cursor: usize,
}

impl FilterPickerUiState {
    fn field(self) -> FilterField {
        FilterField::ALL[self.field % FilterField::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditUiState {
    key: RowKey,
    input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DivideUiState {
    column: ColumnId,
    input: String,
}

/// Column toggles are staged here until applied.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnsUiState {
    working: ColumnVisibility,
    cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ImportUiState {
    resource: usize,
    path: String,
}

impl ImportUiState {
    fn resource(&self) -> Resource {
        Resource::ALL[self.resource % Resource::ALL.len()]
    }
}

#[derive(Debug, Default)]
struct ViewData {
    overlay: Overlay,
    selected_row: usize,
    selected_col: usize,
    status_token: u64,
    import_gate: ImportGate,
}

impl ViewData {
    fn new(import_gate: ImportGate) -> Self {
        Self {
            import_gate,
            ..Self::default()
        }
    }
}

pub fn run_app<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    import_gate: ImportGate,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(import_gate);
    let (internal_tx, internal_rx) = mpsc::channel();
    dispatch(state, runtime, &mut view_data, &internal_tx, ForecastCommand::Start);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match event::poll(POLL_INTERVAL).context("poll event") {
            Ok(true) => match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            },
            Ok(false) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(state, runtime, view_data, tx, event);
    }
}

fn handle_internal_event<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: InternalEvent,
) {
    let command = match event {
        InternalEvent::ClearStatus { token } if token == view_data.status_token => {
            ForecastCommand::ClearStatus
        }
        InternalEvent::ClearStatus { .. } => return,
        InternalEvent::DebounceElapsed { token } => ForecastCommand::DebounceElapsed { token },
        InternalEvent::OptionsLoaded(options) => ForecastCommand::OptionsLoaded(options),
        InternalEvent::OptionsFailed(message) => ForecastCommand::OptionsFailed(message),
        InternalEvent::DataLoaded(result) => ForecastCommand::DataLoaded(result),
        InternalEvent::DataFailed(message) => ForecastCommand::DataFailed(message),
        InternalEvent::ExportWritten { location, keys } => {
            ForecastCommand::ExportWritten { location, keys }
        }
        InternalEvent::ExportFailed(message) => ForecastCommand::ExportFailed(message),
        InternalEvent::ImportFinished(outcome) => {
            view_data.import_gate.finish(Instant::now());
            let level = match outcome {
                ImportOutcome::Imported(_) => StatusLevel::Success,
                ImportOutcome::Busy(_) => StatusLevel::Warning,
                ImportOutcome::Failed(_) => StatusLevel::Error,
            };
            emit_status(state, view_data, tx, level, outcome.message());
            return;
        }
    };
    dispatch(state, runtime, view_data, tx, command);
}

fn dispatch<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: ForecastCommand,
) {
    let effects = state.dispatch(command);
    clamp_cursor(state, view_data);
    apply_effects(state, runtime, view_data, tx, effects);
}

fn apply_effects<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    effects: Vec<ForecastEffect>,
) {
    for effect in effects {
        match effect {
            ForecastEffect::ScheduleFilterApply { token, delay } => {
                schedule_debounce(tx, token, delay);
            }
            ForecastEffect::FetchOptions(filters) => {
                if let Err(error) = runtime.spawn_options(filters, tx.clone()) {
                    dispatch(
                        state,
                        runtime,
                        view_data,
                        tx,
                        ForecastCommand::OptionsFailed(error.to_string()),
                    );
                }
            }
            ForecastEffect::FetchData(query) => {
                if let Err(error) = runtime.spawn_page(query, tx.clone()) {
                    dispatch(
                        state,
                        runtime,
                        view_data,
                        tx,
                        ForecastCommand::DataFailed(error.to_string()),
                    );
                }
            }
            ForecastEffect::WriteExport(batch) => {
                if let Err(error) = runtime.spawn_export(batch, tx.clone()) {
                    dispatch(
                        state,
                        runtime,
                        view_data,
                        tx,
                        ForecastCommand::ExportFailed(error.to_string()),
                    );
                }
            }
            ForecastEffect::PromptDiscard(action) => {
                tracing::debug!(action = action.describe(), "asking before dropping edits");
                view_data.overlay = Overlay::ConfirmDiscard;
            }
            ForecastEffect::Status(_) => bump_status_token(view_data, tx),
        }
    }
}

fn schedule_debounce(internal_tx: &Sender<InternalEvent>, token: u64, delay: Duration) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = sender.send(InternalEvent::DebounceElapsed { token });
    });
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_TTL);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn bump_status_token(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn emit_status(
    state: &mut ForecastState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    level: StatusLevel,
    text: impl Into<String>,
) {
    state.status = Some(StatusMessage {
        level,
        text: text.into(),
    });
    bump_status_token(view_data, internal_tx);
}

fn handle_key_event<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
    {
        return request_quit(state, view_data);
    }

    let overlay = std::mem::take(&mut view_data.overlay);
    let next = match overlay {
        Overlay::None => return handle_table_key(state, runtime, view_data, internal_tx, key),
        Overlay::ConfirmQuit => match key.code {
            KeyCode::Char('y') => return true,
            KeyCode::Char('n') | KeyCode::Esc => Overlay::None,
            _ => Overlay::ConfirmQuit,
        },
        Overlay::Help => match key.code {
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => Overlay::None,
            _ => Overlay::Help,
        },
        Overlay::ConfirmDiscard => match key.code {
            KeyCode::Char('y') => {
                dispatch(state, runtime, view_data, internal_tx, ForecastCommand::ConfirmDiscard);
                Overlay::None
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                dispatch(state, runtime, view_data, internal_tx, ForecastCommand::DeclineDiscard);
                Overlay::None
            }
            _ => Overlay::ConfirmDiscard,
        },
        Overlay::Filters(picker) => {
            handle_filter_picker_key(state, runtime, view_data, internal_tx, picker, key)
        }
        Overlay::EditSuggested(mut edit) => match key.code {
            KeyCode::Enter => {
                let command = ForecastCommand::EditSuggested {
                    key: edit.key,
                    raw: edit.input,
                };
                dispatch(state, runtime, view_data, internal_tx, command);
                Overlay::None
            }
            KeyCode::Esc => Overlay::None,
            _ => {
                edit_input(&mut edit.input, key);
                Overlay::EditSuggested(edit)
            }
        },
        Overlay::Divide(mut divide) => match key.code {
            KeyCode::Enter => {
                let command = ForecastCommand::DivideShipment {
                    column: divide.column,
                    raw: divide.input,
                };
                dispatch(state, runtime, view_data, internal_tx, command);
                Overlay::None
            }
            KeyCode::Esc => Overlay::None,
            _ => {
                edit_input(&mut divide.input, key);
                Overlay::Divide(divide)
            }
        },
        Overlay::Columns(columns) => {
            handle_columns_key(state, runtime, view_data, internal_tx, columns, key)
        }
        Overlay::Import(import) => {
            handle_import_key(state, runtime, view_data, internal_tx, import, key)
        }
    };

    // An effect raised while handling the overlay (a discard prompt) wins.
    if view_data.overlay == Overlay::None {
        view_data.overlay = next;
    }
    false
}

fn request_quit(state: &ForecastState, view_data: &mut ViewData) -> bool {
    if state.edits.is_dirty() {
        view_data.overlay = Overlay::ConfirmQuit;
        return false;
    }
    true
}

fn handle_table_key<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let command = match key.code {
        KeyCode::Char('q') => return request_quit(state, view_data),
        KeyCode::Char('?') => {
            view_data.overlay = Overlay::Help;
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            move_row(state, view_data, 1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            move_row(state, view_data, -1);
            None
        }
        KeyCode::Char('l') | KeyCode::Right => {
            move_col(state, view_data, 1);
            None
        }
        KeyCode::Char('h') | KeyCode::Left => {
            move_col(state, view_data, -1);
            None
        }
        KeyCode::Char('n') | KeyCode::PageDown => Some(ForecastCommand::NextPage),
        KeyCode::Char('p') | KeyCode::PageUp => Some(ForecastCommand::PrevPage),
        KeyCode::Char('g') => Some(ForecastCommand::GoToPage(1)),
        KeyCode::Char('G') => Some(ForecastCommand::GoToPage(state.total_pages())),
        KeyCode::Char('+') => Some(ForecastCommand::SetPageSize(state.page_size.larger())),
        KeyCode::Char('-') => Some(ForecastCommand::SetPageSize(state.page_size.smaller())),
        KeyCode::Char('a') => Some(ForecastCommand::ApplyFiltersNow),
        KeyCode::Char('x') => Some(ForecastCommand::ClearFilters),
        KeyCode::Char('r') => Some(ForecastCommand::Refresh),
        KeyCode::Char('u') => Some(ForecastCommand::ResetEdits),
        KeyCode::Char('E') => Some(ForecastCommand::Export {
            now: OffsetDateTime::now_utc(),
        }),
        KeyCode::Char('s') => selected_column(state, view_data).map(ForecastCommand::SortBy),
        KeyCode::Char('<') => selected_column(state, view_data).map(|column| {
            ForecastCommand::ResizeColumn {
                column,
                delta: -RESIZE_STEP,
            }
        }),
        KeyCode::Char('>') => selected_column(state, view_data).map(|column| {
            ForecastCommand::ResizeColumn {
                column,
                delta: RESIZE_STEP,
            }
        }),
        KeyCode::Char('f') => {
            view_data.overlay = Overlay::Filters(FilterPickerUiState::default());
            None
        }
        KeyCode::Char('c') => {
            view_data.overlay = Overlay::Columns(ColumnsUiState {
                working: state.columns.clone(),
                cursor: 0,
            });
            None
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            if let Some(row) = state.view.row(view_data.selected_row) {
                view_data.overlay = Overlay::EditSuggested(EditUiState {
                    key: row.key.clone(),
                    input: state.edits.get(&row.key).unwrap_or_default().to_owned(),
                });
            }
            None
        }
        KeyCode::Char('d') => match selected_column(state, view_data) {
            Some(column) if column.is_shipment() => {
                view_data.overlay = Overlay::Divide(DivideUiState {
                    column,
                    input: String::new(),
                });
                None
            }
            Some(column) => Some(ForecastCommand::DivideShipment {
                column,
                raw: String::new(),
            }),
            None => None,
        },
        KeyCode::Char('i') => {
            if view_data.import_gate.is_available(Instant::now()) {
                view_data.overlay = Overlay::Import(ImportUiState::default());
            } else {
                refuse_import(state, view_data, internal_tx);
            }
            None
        }
        _ => None,
    };

    if let Some(command) = command {
        dispatch(state, runtime, view_data, internal_tx, command);
    }
    false
}

fn handle_filter_picker_key<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mut picker: FilterPickerUiState,
    key: KeyEvent,
) -> Overlay {
    let field = picker.field();
    let offered = state.options.values(field).len();
    match key.code {
        KeyCode::Esc => return Overlay::None,
        KeyCode::Enter => {
            dispatch(state, runtime, view_data, internal_tx, ForecastCommand::ApplyFiltersNow);
            return Overlay::None;
        }
        KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => {
            picker.field = (picker.field + 1) % FilterField::ALL.len();
            picker.cursor = 0;
        }
        KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => {
            picker.field = (picker.field + FilterField::ALL.len() - 1) % FilterField::ALL.len();
            picker.cursor = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            picker.cursor = (picker.cursor + 1).min(offered.saturating_sub(1));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            picker.cursor = picker.cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') => {
            if let Some(value) = state.options.values(field).get(picker.cursor).cloned() {
                let mut values = state
                    .filters
                    .get(field)
                    .cloned()
                    .unwrap_or_default();
                if !values.remove(&value) {
                    values.insert(value);
                }
                let command = ForecastCommand::SetFilter(field, values.into_iter().collect());
                dispatch(state, runtime, view_data, internal_tx, command);
            }
        }
        KeyCode::Char('x') => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                ForecastCommand::SetFilter(field, Vec::new()),
            );
        }
        _ => {}
    }
    Overlay::Filters(picker)
}

fn handle_columns_key<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mut columns: ColumnsUiState,
    key: KeyEvent,
) -> Overlay {
    match key.code {
        KeyCode::Esc => return Overlay::None,
        KeyCode::Enter => {
            let command = ForecastCommand::ApplyColumns(columns.working);
            dispatch(state, runtime, view_data, internal_tx, command);
            return Overlay::None;
        }
        KeyCode::Char('r') => {
            dispatch(state, runtime, view_data, internal_tx, ForecastCommand::ResetColumns);
            return Overlay::None;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            columns.cursor = (columns.cursor + 1).min(ColumnId::ALL.len() - 1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            columns.cursor = columns.cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') => {
            if let Some(column) = ColumnId::ALL.get(columns.cursor) {
                columns.working.toggle(*column);
            }
        }
        _ => {}
    }
    Overlay::Columns(columns)
}

fn handle_import_key<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mut import: ImportUiState,
    key: KeyEvent,
) -> Overlay {
    match key.code {
        KeyCode::Esc => Overlay::None,
        KeyCode::Tab => {
            import.resource = (import.resource + 1) % Resource::ALL.len();
            Overlay::Import(import)
        }
        KeyCode::BackTab => {
            import.resource = (import.resource + Resource::ALL.len() - 1) % Resource::ALL.len();
            Overlay::Import(import)
        }
        KeyCode::Enter => {
            let path = import.path.trim();
            if path.is_empty() {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    StatusLevel::Warning,
                    "file path is required -- type the path of a .xlsx or .json file",
                );
                return Overlay::Import(import);
            }
            start_import(
                state,
                runtime,
                view_data,
                internal_tx,
                import.resource(),
                PathBuf::from(path),
            );
            Overlay::None
        }
        _ => {
            edit_input(&mut import.path, key);
            Overlay::Import(import)
        }
    }
}

fn start_import<R: ForecastRuntime>(
    state: &mut ForecastState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    resource: Resource,
    path: PathBuf,
) {
    if let Err(refusal) = view_data.import_gate.try_begin(Instant::now()) {
        emit_status(state, view_data, internal_tx, StatusLevel::Warning, refusal.message());
        return;
    }
    emit_status(
        state,
        view_data,
        internal_tx,
        StatusLevel::Info,
        format!("importing {} into {}", path.display(), resource.label()),
    );
    if let Err(error) = runtime.spawn_import(resource, path, internal_tx.clone()) {
        view_data.import_gate.finish(Instant::now());
        emit_status(
            state,
            view_data,
            internal_tx,
            StatusLevel::Error,
            format!("import failed: {error}"),
        );
    }
}

fn refuse_import(
    state: &mut ForecastState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(refusal) = view_data.import_gate.try_begin(Instant::now()) {
        emit_status(state, view_data, internal_tx, StatusLevel::Warning, refusal.message());
    }
}

fn edit_input(input: &mut String, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.push(ch),
        _ => {}
    }
}

fn selected_column(state: &ForecastState, view_data: &ViewData) -> Option<ColumnId> {
    state
        .columns
        .visible_columns()
        .get(view_data.selected_col)
        .copied()
}

fn move_row(state: &ForecastState, view_data: &mut ViewData, delta: isize) {
    let len = state.view.len();
    if len == 0 {
        view_data.selected_row = 0;
        return;
    }
    view_data.selected_row = view_data
        .selected_row
        .saturating_add_signed(delta)
        .min(len - 1);
}

fn move_col(state: &ForecastState, view_data: &mut ViewData, delta: isize) {
    let len = state.columns.visible_columns().len();
    if len == 0 {
        view_data.selected_col = 0;
        return;
    }
    view_data.selected_col = view_data
        .selected_col
        .saturating_add_signed(delta)
        .min(len - 1);
}

fn clamp_cursor(state: &ForecastState, view_data: &mut ViewData) {
    view_data.selected_row = view_data
        .selected_row
        .min(state.view.len().saturating_sub(1));
    view_data.selected_col = view_data
        .selected_col
        .min(state.columns.visible_columns().len().saturating_sub(1));
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ForecastState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let filters = Paragraph::new(filter_summary_text(state))
        .block(Block::default().title("abasto").borders(Borders::ALL));
    frame.render_widget(filters, layout[0]);

    render_table(frame, layout[1], state, view_data);

    let pager = Paragraph::new(pager_line(state));
    frame.render_widget(pager, layout[2]);

    let status = Paragraph::new(status_text(state))
        .style(status_style(state.status.as_ref()))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[3]);

    let overlay = match &view_data.overlay {
        Overlay::None => None,
        Overlay::Help => Some(("help", help_overlay_text().to_owned(), (80, 70))),
        Overlay::Filters(picker) => Some((
            "filters",
            render_filter_picker_text(state, *picker),
            (60, 70),
        )),
        Overlay::ConfirmDiscard => Some((
            "unsaved edits",
            render_confirm_discard_text(state),
            (50, 20),
        )),
        Overlay::ConfirmQuit => Some((
            "quit",
            format!(
                "{} suggested values are not exported.\nquit anyway? y/n",
                state.edits.len()
            ),
            (50, 20),
        )),
        Overlay::EditSuggested(edit) => Some((
            "suggested",
            format!("{}\n> {}_\nenter save | esc cancel | empty clears", edit.key, edit.input),
            (50, 20),
        )),
        Overlay::Divide(divide) => Some((
            "divide",
            format!(
                "divide every {} value on this page by:\n> {}_\nenter apply | esc cancel",
                divide.column.header(),
                divide.input
            ),
            (50, 20),
        )),
        Overlay::Columns(columns) => Some(("columns", render_columns_text(columns), (50, 80))),
        Overlay::Import(import) => Some(("import", render_import_text(import), (60, 25))),
    };
    if let Some((title, text, (percent_x, percent_y))) = overlay {
        let area = centered_rect(percent_x, percent_y, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(text).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(widget, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &ForecastState,
    view_data: &ViewData,
) {
    let block = Block::default()
        .title(table_title(state))
        .borders(Borders::ALL);
    if let Some(message) = table_placeholder(state) {
        let style = match state.load {
            LoadState::Failed(_) => Style::default().fg(Color::Red),
            _ => Style::default(),
        };
        frame.render_widget(Paragraph::new(message).style(style).block(block), area);
        return;
    }

    let columns = state.columns.visible_columns();
    let widths = columns
        .iter()
        .map(|column| Constraint::Length(state.widths.width(*column)))
        .collect::<Vec<_>>();
    let header = Row::new(columns.iter().map(|column| {
        Cell::from(header_label(state, *column)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = state.view.rows().enumerate().map(|(row_index, row)| {
        let selected_row = row_index == view_data.selected_row;
        let cells = columns
            .iter()
            .enumerate()
            .map(|(col_index, column)| {
                let text = if *column == ColumnId::Sugerido {
                    state.edits.get(&row.key).unwrap_or_default().to_owned()
                } else {
                    row.cell(*column).to_owned()
                };
                let mut style = Style::default();
                if let Some(class) = state.view.shipment_class(row, *column) {
                    style = style.fg(shipment_color(class));
                }
                if selected_row {
                    style = style.bg(Color::DarkGray);
                }
                if selected_row && col_index == view_data.selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(text).style(style)
            })
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

fn table_title(state: &ForecastState) -> String {
    match &state.load {
        LoadState::Failed(_) => "forecast | error".to_owned(),
        _ => "forecast".to_owned(),
    }
}

/// Text drawn in place of the table body. Prior rows stay in state and
/// come back on the next successful fetch.
fn table_placeholder(state: &ForecastState) -> Option<String> {
    match &state.load {
        LoadState::Loading => Some("loading...".to_owned()),
        LoadState::Failed(message) => Some(format!("error: {message}\npress r to retry")),
        LoadState::Idle if state.view.is_empty() => {
            Some("no rows match the current filters".to_owned())
        }
        LoadState::Idle => None,
    }
}

fn header_label(state: &ForecastState, column: ColumnId) -> String {
    match state.sort {
        Some(sort) if sort.column == column => {
            format!("{} {}", column.header(), sort.direction.marker())
        }
        _ => column.header().to_owned(),
    }
}

fn shipment_color(class: ShipmentClass) -> Color {
    match class {
        ShipmentClass::Negative => Color::Red,
        ShipmentClass::Zero => Color::Yellow,
        ShipmentClass::Positive => Color::Green,
    }
}

fn filter_summary_text(state: &ForecastState) -> String {
    let parts = FilterField::ALL
        .iter()
        .filter_map(|field| {
            let values = state.filters.get(*field)?;
            Some(format!(
                "{}: {}",
                field.label(),
                values.iter().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
        .collect::<Vec<_>>();
    let mut text = if parts.is_empty() {
        "filters: all".to_owned()
    } else {
        parts.join(" | ")
    };
    if state.filters != state.applied_filters {
        text.push_str(" (pending)");
    }
    text
}

/// Page hints are dimmed when there is no page in that direction.
fn pager_line(state: &ForecastState) -> Line<'static> {
    let hint = |enabled: bool, text: &'static str| {
        let style = if enabled {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(text, style)
    };
    Line::from(vec![
        hint(state.can_go_previous(), "< p"),
        Span::raw(" "),
        hint(state.can_go_next(), "n >"),
        Span::raw(" | "),
        Span::styled(pager_text(state), Style::default().fg(Color::Cyan)),
    ])
}

fn pager_text(state: &ForecastState) -> String {
    format!(
        "page {} / {} | total {} | size {} | suggested {} ({} rows)",
        state.current_page(),
        state.total_pages(),
        state.total(),
        state.page_size.get(),
        state.edits.display_sum(),
        state.edits.len(),
    )
}

fn status_text(state: &ForecastState) -> String {
    match &state.status {
        Some(status) => status.text.clone(),
        None => "j/k/h/l move | n/p page | f filters | e edit | E export | d divide | c cols | i import | ? help | q quit".to_owned(),
    }
}

fn status_style(status: Option<&StatusMessage>) -> Style {
    let color = match status.map(|status| status.level) {
        Some(StatusLevel::Success) => Color::Green,
        Some(StatusLevel::Warning) => Color::Yellow,
        Some(StatusLevel::Error) => Color::Red,
        Some(StatusLevel::Info) | None => Color::White,
    };
    Style::default().fg(color)
}

fn render_filter_picker_text(state: &ForecastState, picker: FilterPickerUiState) -> String {
    let field = picker.field();
    let tabs = FilterField::ALL
        .iter()
        .map(|candidate| {
            if *candidate == field {
                format!("[{}]", candidate.label())
            } else {
                candidate.label().to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let mut lines = vec![tabs, String::new()];
    let values = state.options.values(field);
    if values.is_empty() {
        lines.push("no values offered".to_owned());
    }
    for (index, value) in values.iter().enumerate() {
        let cursor = if index == picker.cursor { ">" } else { " " };
        let mark = if state.filters.is_selected(field, value) {
            SELECTED_MARK
        } else {
            UNSELECTED_MARK
        };
        lines.push(format!("{cursor} {mark} {value}"));
    }
    lines.push(String::new());
    lines.push("tab field | space toggle | x clear field | enter apply | esc close".to_owned());
    lines.join("\n")
}

fn render_confirm_discard_text(state: &ForecastState) -> String {
    let action = state
        .pending_discard
        .map_or("continue", |action| action.describe());
    format!(
        "{} suggested values are not exported.\ndiscard them and {action}? y/n",
        state.edits.len()
    )
}

fn render_columns_text(columns: &ColumnsUiState) -> String {
    let mut lines = ColumnId::ALL
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let cursor = if index == columns.cursor { ">" } else { " " };
            let mark = if columns.working.is_visible(*column) {
                SELECTED_MARK
            } else {
                UNSELECTED_MARK
            };
            format!("{cursor} {mark} {}", column.header())
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("space toggle | enter apply | r reset | esc cancel".to_owned());
    lines.join("\n")
}

fn render_import_text(import: &ImportUiState) -> String {
    [
        format!("resource: {} (tab to change)", import.resource().name()),
        format!("file: {}_", import.path),
        String::new(),
        "enter upload | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn help_overlay_text() -> &'static str {
    "nav: j/k rows | h/l columns | s sort column | < > resize column\n\
pages: n/p next/prev | g/G first/last | +/- page size\n\
filters: f picker | a apply now | x clear all | r refresh\n\
edits: e or enter suggested value | u reset all | E export page\n\
tools: d divide shipment column | c columns | i import file\n\
global: ? help | q quit | ctrl+c quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        ForecastRuntime, InternalEvent, Overlay, ViewData, filter_summary_text, handle_key_event,
        header_label, pager_line, pager_text, process_internal_events, render_columns_text,
        status_text, table_placeholder,
    };
    use abasto_app::{
        ColumnId, ExportBatch, FilterField, FilterOptions, FilterSelection, ForecastCommand,
        ForecastState, ImportGate, ImportOutcome, ImportSummary, PageQuery, PageResult, Resource,
        Row, RowKey, StatusLevel,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::style::Color;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct TestRuntime {
        option_requests: Vec<FilterSelection>,
        page_requests: Vec<PageQuery>,
        exports: Vec<ExportBatch>,
        imports: Vec<(Resource, PathBuf)>,
        fail_pages: bool,
    }

    fn sample_row(cost_center: &str, material: &str, shipment: f64) -> Row {
        Row {
            cost_center: cost_center.to_owned(),
            material: material.to_owned(),
            product: format!("Producto {material}"),
            shipment_three_months: Some(shipment),
            ..Row::default()
        }
    }

    impl ForecastRuntime for TestRuntime {
        fn fetch_options(&mut self, filters: &FilterSelection) -> Result<FilterOptions> {
            self.option_requests.push(filters.clone());
            Ok(FilterOptions {
                centros: vec!["C01".to_owned(), "C02".to_owned()],
                marcas: vec!["Apple".to_owned()],
                ..FilterOptions::default()
            })
        }

        fn fetch_page(&mut self, query: &PageQuery) -> Result<PageResult> {
            self.page_requests.push(query.clone());
            if self.fail_pages {
                bail!("connection error: backend unreachable");
            }
            Ok(PageResult {
                records: vec![
                    sample_row("C01", "A", -3.0),
                    sample_row("C01", "B", 0.0),
                    sample_row("C02", "A", 8.0),
                ],
                total: 120,
                page: query.page,
                page_size: query.page_size.get(),
                total_pages: 3,
            })
        }

        fn write_export(&mut self, batch: &ExportBatch) -> Result<PathBuf> {
            self.exports.push(batch.clone());
            Ok(PathBuf::from("/tmp").join(&batch.file_name))
        }

        fn import_file(&mut self, resource: Resource, path: &Path) -> ImportOutcome {
            self.imports.push((resource, path.to_path_buf()));
            ImportOutcome::Imported(ImportSummary {
                added: 4,
                total_after: 10,
                ..ImportSummary::default()
            })
        }
    }

    struct Harness {
        state: ForecastState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn started() -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: ForecastState::default(),
                runtime: TestRuntime::default(),
                view_data: ViewData::new(ImportGate::new(Duration::from_secs(60))),
                tx,
                rx,
            };
            super::dispatch(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
                ForecastCommand::Start,
            );
            harness.drain();
            harness
        }

        fn drain(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn press(&mut self, code: KeyCode) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, KeyModifiers::NONE),
            );
            self.drain();
            quit
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }
    }

    #[test]
    fn start_loads_options_then_first_page() {
        let harness = Harness::started();
        assert_eq!(harness.runtime.option_requests, vec![FilterSelection::default()]);
        assert_eq!(harness.runtime.page_requests.len(), 1);
        assert_eq!(harness.runtime.page_requests[0].page, 1);
        assert_eq!(harness.state.view.len(), 3);
        assert_eq!(harness.state.options.centros, vec!["C01", "C02"]);
        assert_eq!(
            pager_text(&harness.state),
            "page 1 / 3 | total 120 | size 50 | suggested 0 (0 rows)"
        );
    }

    #[test]
    fn failed_page_keeps_rows_and_shows_error_status() {
        let mut harness = Harness::started();
        harness.runtime.fail_pages = true;
        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.state.view.len(), 3);
        assert_eq!(harness.state.current_page(), 1);
        let status = harness.state.status.clone().expect("status set");
        assert_eq!(status.level, StatusLevel::Error);
        assert!(status_text(&harness.state).contains("connection error"));
        let body = table_placeholder(&harness.state).expect("error replaces table body");
        assert!(body.starts_with("error: connection error"));

        harness.runtime.fail_pages = false;
        harness.press(KeyCode::Char('r'));
        assert_eq!(table_placeholder(&harness.state), None);
    }

    fn hint_colors(state: &ForecastState) -> (Option<Color>, Option<Color>) {
        let line = pager_line(state);
        (line.spans[0].style.fg, line.spans[2].style.fg)
    }

    #[test]
    fn pager_dims_previous_on_first_page_and_next_on_last() {
        let mut harness = Harness::started();
        assert_eq!(
            hint_colors(&harness.state),
            (Some(Color::DarkGray), Some(Color::Cyan))
        );

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.state.current_page(), 2);
        assert_eq!(hint_colors(&harness.state), (Some(Color::Cyan), Some(Color::Cyan)));

        harness.press(KeyCode::Char('G'));
        assert_eq!(harness.state.current_page(), 3);
        assert_eq!(
            hint_colors(&harness.state),
            (Some(Color::Cyan), Some(Color::DarkGray))
        );
        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.runtime.page_requests.len(), 3);
    }

    #[test]
    fn editing_a_row_updates_buffer_and_sum() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('e'));
        assert!(matches!(harness.view_data.overlay, Overlay::EditSuggested(_)));
        harness.type_text("2,5");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.view_data.overlay, Overlay::None);
        assert_eq!(harness.state.edits.get(&RowKey::new("C01", "B")), Some("2,5"));
        assert!(pager_text(&harness.state).ends_with("suggested 2.5 (1 rows)"));
    }

    #[test]
    fn page_change_with_edits_prompts_and_decline_keeps_page() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('e'));
        harness.type_text("4");
        harness.press(KeyCode::Enter);

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.view_data.overlay, Overlay::ConfirmDiscard);
        assert_eq!(harness.runtime.page_requests.len(), 1);

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.view_data.overlay, Overlay::None);
        assert_eq!(harness.state.edits.len(), 1);
        assert_eq!(harness.state.current_page(), 1);

        harness.press(KeyCode::Char('n'));
        harness.press(KeyCode::Char('y'));
        assert!(harness.state.edits.is_empty());
        assert_eq!(harness.state.current_page(), 2);
    }

    #[test]
    fn filter_picker_toggles_values_and_applies_on_enter() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('f'));
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char(' '));
        assert!(harness.state.filters.is_selected(FilterField::Centro, "C02"));
        assert!(harness.state.has_debounce_pending());
        assert!(filter_summary_text(&harness.state).ends_with("(pending)"));

        harness.press(KeyCode::Enter);
        assert_eq!(harness.view_data.overlay, Overlay::None);
        assert!(!harness.state.has_debounce_pending());
        let last = harness.runtime.option_requests.last().expect("options request");
        assert!(last.is_selected(FilterField::Centro, "C02"));
        assert!(!filter_summary_text(&harness.state).contains("pending"));
    }

    #[test]
    fn quitting_with_edits_asks_first() {
        let mut harness = Harness::started();
        assert!(harness.press(KeyCode::Char('q')));

        harness.press(KeyCode::Char('e'));
        harness.type_text("1");
        harness.press(KeyCode::Enter);
        assert!(!harness.press(KeyCode::Char('q')));
        assert_eq!(harness.view_data.overlay, Overlay::ConfirmQuit);
        assert!(!harness.press(KeyCode::Esc));
        assert!(!harness.press(KeyCode::Char('q')));
        assert!(harness.press(KeyCode::Char('y')));
    }

    #[test]
    fn export_writes_page_rows_and_clears_their_edits() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('e'));
        harness.type_text("7");
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('E'));

        assert_eq!(harness.runtime.exports.len(), 1);
        assert_eq!(harness.runtime.exports[0].rows.len(), 1);
        assert!(harness.state.edits.is_empty());
        let status = harness.state.status.clone().expect("status set");
        assert_eq!(status.level, StatusLevel::Success);
    }

    #[test]
    fn column_overlay_stages_changes_until_enter() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('c'));
        harness.press(KeyCode::Char(' '));
        let Overlay::Columns(columns) = &harness.view_data.overlay else {
            panic!("columns overlay expected");
        };
        assert!(render_columns_text(columns).contains("[ ] Centro Costos"));
        assert!(harness.state.columns.is_visible(ColumnId::CentroCostos));

        harness.press(KeyCode::Esc);
        assert!(harness.state.columns.is_visible(ColumnId::CentroCostos));

        harness.press(KeyCode::Char('c'));
        harness.press(KeyCode::Char(' '));
        harness.press(KeyCode::Enter);
        assert!(!harness.state.columns.is_visible(ColumnId::CentroCostos));
    }

    #[test]
    fn sort_marks_header_and_reorders_page() {
        let mut harness = Harness::started();
        let shipment_position = harness
            .state
            .columns
            .visible_columns()
            .iter()
            .position(|column| *column == ColumnId::EnvioInventario3Meses)
            .expect("shipment column visible");
        for _ in 0..shipment_position {
            harness.press(KeyCode::Char('l'));
        }
        harness.press(KeyCode::Char('s'));
        assert_eq!(
            header_label(&harness.state, ColumnId::EnvioInventario3Meses),
            "Envío Inventario 3 meses v"
        );
        let first = harness.state.view.row(0).expect("row").key.clone();
        assert_eq!(first, RowKey::new("C02", "A"));
    }

    #[test]
    fn divide_prompt_only_opens_on_shipment_columns() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('d'));
        assert_eq!(harness.view_data.overlay, Overlay::None);
        let status = harness.state.status.clone().expect("warning");
        assert_eq!(status.level, StatusLevel::Warning);

        while harness
            .state
            .columns
            .visible_columns()
            .get(harness.view_data.selected_col)
            != Some(&ColumnId::EnvioInventario3Meses)
        {
            harness.press(KeyCode::Char('l'));
        }
        harness.press(KeyCode::Char('d'));
        harness.type_text("2");
        harness.press(KeyCode::Enter);
        let row = harness.state.view.row(2).expect("row");
        assert_eq!(row.cell(ColumnId::EnvioInventario3Meses), "4");
    }

    #[test]
    fn import_runs_once_then_cools_down() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Tab);
        harness.type_text("/data/metas.xlsx");
        harness.press(KeyCode::Enter);

        assert_eq!(
            harness.runtime.imports,
            vec![(Resource::Metas, PathBuf::from("/data/metas.xlsx"))]
        );
        let status = harness.state.status.clone().expect("status");
        assert_eq!(status.level, StatusLevel::Success);
        assert_eq!(status.text, "imported 4 new records, total 10");

        harness.press(KeyCode::Char('i'));
        assert_eq!(harness.view_data.overlay, Overlay::None);
        let status = harness.state.status.clone().expect("status");
        assert_eq!(status.level, StatusLevel::Warning);
        assert!(status.text.starts_with("import available again in"));
        assert_eq!(harness.runtime.imports.len(), 1);
    }

    #[test]
    fn stale_status_clear_is_ignored() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('u'));
        harness.press(KeyCode::Char('e'));
        harness.type_text("3");
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('u'));
        let token = harness.view_data.status_token;
        assert!(harness.state.status.is_some());

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: token - 1 })
            .expect("send");
        harness.drain();
        assert!(harness.state.status.is_some());

        harness
            .tx
            .send(InternalEvent::ClearStatus { token })
            .expect("send");
        harness.drain();
        assert!(harness.state.status.is_none());
    }

    #[test]
    fn help_overlay_swallows_keys_until_closed() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('?'));
        assert_eq!(harness.view_data.overlay, Overlay::Help);
        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.runtime.page_requests.len(), 1);
        harness.press(KeyCode::Esc);
        assert_eq!(harness.view_data.overlay, Overlay::None);
    }
}
