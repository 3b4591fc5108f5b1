use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::domain::{
	format_clock, format_duration, overlaps, Entry, Planner, Recurrence, ScheduleError,
};
use crate::planners::{recent_planners, remember_planner};
use crate::schedule::{
	check_entry, countdown, entries_on_date, has_any_entry, next_occurrence, resolve_week,
	rest_windows, week_of, Countdown,
};
use crate::storage::{load_planner, save_planner};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const WEEKLY_COLOR: Color = Color::LightBlue;
const ONCE_COLOR: Color = Color::LightYellow;
const PAST_MARK_COLOR: Color = Color::Green;

const WEEKDAY_NAMES: [&str; 7] = [
	"Monday",
	"Tuesday",
	"Wednesday",
	"Thursday",
	"Friday",
	"Saturday",
	"Sunday",
];

struct DaySession {
	label: &'static str,
	start: NaiveTime,
	end: NaiveTime,
}

fn day_sessions() -> [DaySession; 3] {
	[
		day_session("Morning", 6, 12),
		day_session("Afternoon", 13, 17),
		day_session("Evening", 18, 23),
	]
}

fn day_session(label: &'static str, start_hour: u32, end_hour: u32) -> DaySession {
	DaySession {
		label,
		start: NaiveTime::from_hms_opt(start_hour, 0, 0).expect("session start must be valid"),
		end: NaiveTime::from_hms_opt(end_hour, 0, 0).expect("session end must be valid"),
	}
}

pub fn run_dashboard(planner: &mut Planner, planner_path: &mut PathBuf) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, planner, planner_path);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	planner: &mut Planner,
	planner_path: &mut PathBuf,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();
	app.current_path = planner_path.clone();

	loop {
		// Every frame re-resolves from the in-memory planner; no cached
		// view survives a mutation.
		let now = Local::now().naive_local();
		let view = build_view(&app, planner, now);
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_dashboard(frame, &app, &view))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, planner, planner_path),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, planner, planner_path),
					InputMode::Normal => handle_normal_key(&mut app, key.code, planner, &view),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Length(3),
			Constraint::Min(12),
			Constraint::Length(5),
		])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(36), Constraint::Percentage(64)])
		.split(layout[1]);

	let left = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(10), Constraint::Min(8)])
		.split(body[0]);

	render_top_bar(frame, layout[0], view);
	render_calendar_panel(frame, left[0], app, view);
	render_day_panel(frame, left[1], app, view);
	render_week_panel(frame, body[1], app, view);
	render_footer(frame, layout[2], app);

	if let Some(detail) = &view.detail {
		render_detail_popup(frame, detail);
	}

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_top_bar(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let mut spans = vec![
		Span::styled(
			view.clock_text.clone(),
			Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
		),
		Span::raw("  "),
	];

	match &view.next {
		Some(next) => {
			spans.push(Span::styled("Next: ", Style::default().fg(Color::DarkGray)));
			spans.push(Span::raw(format!("{}  ", next.time_range)));
			spans.push(Span::styled(
				next.heading.clone(),
				Style::default().add_modifier(Modifier::BOLD),
			));
			spans.push(Span::styled(
				format!("  ({})", next.countdown),
				Style::default().fg(Color::DarkGray),
			));
		}
		None => {
			spans.push(Span::styled(
				"No upcoming entry",
				Style::default().fg(Color::DarkGray),
			));
		}
	}

	let bar = Paragraph::new(Line::from(spans))
		.block(Block::default().borders(Borders::ALL).title("weekplan"));
	frame.render_widget(bar, area);
}

fn render_calendar_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let month = app.calendar_month;
	let mut lines = Vec::new();
	lines.push(Line::from(format!("{} {}", month.format("%B"), month.year())));
	lines.push(Line::from("Mo Tu We Th Fr Sa Su"));

	let first_weekday = month.weekday().number_from_monday() as usize - 1;
	let days_in_month = days_in_month(month.year(), month.month());
	let mut day_counter = 1u32;
	for week in 0..6 {
		let mut spans = Vec::new();
		for weekday_index in 0..7 {
			let before_first = week == 0 && weekday_index < first_weekday;
			let after_last = day_counter > days_in_month;
			if before_first || after_last {
				spans.push(Span::raw("   "));
				continue;
			}

			let date = NaiveDate::from_ymd_opt(month.year(), month.month(), day_counter)
				.expect("calendar day must be valid");
			let mut style = Style::default();
			if view.calendar_active.contains(&date) {
				// Past marks fade to green so upcoming days stand out.
				let mark = if date >= view.today { ONCE_COLOR } else { PAST_MARK_COLOR };
				style = style.fg(mark).add_modifier(Modifier::BOLD);
			}
			if date == view.today {
				style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
			}
			if date == app.selected_day {
				style = style.fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD);
			}

			spans.push(Span::styled(format!("{:>2} ", day_counter), style));
			day_counter += 1;
		}
		lines.push(Line::from(spans));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title("Calendar")
		.border_style(border_style(app.focus == FocusPane::Calendar));
	let calendar = Paragraph::new(lines).block(block);
	frame.render_widget(calendar, area);
}

fn render_day_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let items = view
		.day_rows
		.iter()
		.map(|row| ListItem::new(row.line.clone()))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.day_rows.is_empty() {
		state.select(Some(app.day_index.min(view.day_rows.len() - 1)));
	}

	let title = app.selected_day.format("%A, %d %B %Y").to_string();
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(empty)")]
	} else {
		items
	})
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(app.focus == FocusPane::Day)),
	)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_week_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let items = view
		.week_rows
		.iter()
		.map(|row| ListItem::new(row.line.clone()))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.week_rows.is_empty() {
		state.select(Some(app.week_index.min(view.week_rows.len() - 1)));
	}

	let title = format!(
		"Week {} - {}",
		view.week_start.format("%d %b"),
		(view.week_start + Duration::days(6)).format("%d %b")
	);
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(empty)")]
	} else {
		items
	})
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(app.focus == FocusPane::Week)),
	)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("Tab pane | arrows/hjkl navigate | Enter detail/collapse | n/N month | t today"),
			Line::from("a add | e edit | d delete | g switch planner | q quit"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_detail_popup(frame: &mut Frame, detail: &DetailView) {
	let area = centered_rect(56, 55, frame.area());
	frame.render_widget(Clear, area);

	let accent = kind_color(detail.weekly);
	let mut lines = vec![
		Line::from(vec![
			Span::styled(
				detail.heading.clone(),
				Style::default().add_modifier(Modifier::BOLD),
			),
			Span::styled(
				format!("  [{}]", detail.kind_label),
				Style::default().fg(accent),
			),
		]),
		Line::from(Span::styled(
			format!("{}  ·  {}", detail.time_range, detail.when),
			Style::default().fg(accent),
		)),
		Line::from(Span::styled(
			detail.countdown.clone(),
			Style::default().fg(Color::DarkGray),
		)),
		Line::from(""),
	];
	if detail.content.is_empty() {
		lines.push(Line::from(Span::styled(
			"(no content)",
			Style::default().fg(Color::DarkGray),
		)));
	} else {
		for row in detail.content.lines() {
			lines.push(Line::from(row.to_string()));
		}
	}
	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled(
		"e edit | d delete | Esc close",
		Style::default().fg(Color::DarkGray),
	)));

	let popup = Paragraph::new(lines)
		.block(Block::default().borders(Borders::ALL).title("Entry"));
	frame.render_widget(popup, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(62, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()).style(option.style))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
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

fn handle_normal_key(app: &mut App, code: KeyCode, planner: &Planner, view: &ViewModel) -> bool {
	if let Some(entry_id) = app.detail.clone() {
		match code {
			KeyCode::Char('q') => return true,
			KeyCode::Esc | KeyCode::Enter => {
				app.detail = None;
			}
			KeyCode::Char('e') => {
				app.detail = None;
				start_edit(app, planner, &entry_id);
			}
			KeyCode::Char('d') => {
				app.detail = None;
				start_delete(app, planner, &entry_id);
			}
			_ => {}
		}
		return false;
	}

	match code {
		KeyCode::Char('q') | KeyCode::Esc => true,
		KeyCode::Tab => {
			app.focus = app.focus.next();
			false
		}
		KeyCode::BackTab => {
			app.focus = app.focus.prev();
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			match app.focus {
				FocusPane::Calendar => app.shift_selected_day(-7),
				FocusPane::Day => app.move_day_selection(-1, view),
				FocusPane::Week => app.move_week_selection(-1, view),
			}
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			match app.focus {
				FocusPane::Calendar => app.shift_selected_day(7),
				FocusPane::Day => app.move_day_selection(1, view),
				FocusPane::Week => app.move_week_selection(1, view),
			}
			false
		}
		KeyCode::Left | KeyCode::Char('h') => {
			if app.focus == FocusPane::Calendar {
				app.shift_selected_day(-1);
			}
			false
		}
		KeyCode::Right | KeyCode::Char('l') => {
			if app.focus == FocusPane::Calendar {
				app.shift_selected_day(1);
			}
			false
		}
		KeyCode::Char('n') => {
			app.shift_selected_month(1);
			false
		}
		KeyCode::Char('N') => {
			app.shift_selected_month(-1);
			false
		}
		KeyCode::Char('t') => {
			app.jump_to_today(view.today);
			false
		}
		KeyCode::Char('a') => {
			let mut draft = EntryDraft::new();
			draft.proposed_date = Some(app.selected_day);
			app.mode = InputMode::Select(build_kind_select(draft));
			false
		}
		KeyCode::Char('e') => {
			match app.selected_entry_id(view) {
				Some(entry_id) => start_edit(app, planner, &entry_id),
				None => app.status = "Select an entry in the day or week pane first".to_string(),
			}
			false
		}
		KeyCode::Char('d') => {
			match app.selected_entry_id(view) {
				Some(entry_id) => start_delete(app, planner, &entry_id),
				None => app.status = "Select an entry in the day or week pane first".to_string(),
			}
			false
		}
		KeyCode::Char('g') => {
			match build_planner_switch_select(app.current_path.as_path()) {
				Ok(select) => app.mode = InputMode::Select(select),
				Err(err) => app.status = err,
			}
			false
		}
		KeyCode::Enter => {
			match app.focused_row_kind(view) {
				Some(RowKind::DayHeader { date }) => {
					if app.collapsed_days.contains(&date) {
						app.collapsed_days.remove(&date);
					} else {
						app.collapsed_days.insert(date);
					}
				}
				Some(RowKind::Entry { id }) => {
					app.detail = Some(id);
				}
				Some(RowKind::Static) | None => {}
			}
			false
		}
		_ => false,
	}
}

fn start_edit(app: &mut App, planner: &Planner, entry_id: &str) {
	let Some(index) = planner.position_of(entry_id) else {
		app.status = "Entry no longer exists".to_string();
		return;
	};
	let draft = EntryDraft::for_edit(index, planner.entries()[index].clone());
	app.mode = InputMode::Select(build_kind_select(draft));
}

fn start_delete(app: &mut App, planner: &Planner, entry_id: &str) {
	let Some(index) = planner.position_of(entry_id) else {
		app.status = "Entry no longer exists".to_string();
		return;
	};
	let entry = &planner.entries()[index];
	app.mode = InputMode::Select(build_delete_confirm_select(index, entry));
}

fn handle_prompt_key(
	app: &mut App,
	code: KeyCode,
	planner: &mut Planner,
	planner_path: &mut PathBuf,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), planner, planner_path.as_path()) {
				Ok(PromptOutcome::NextPrompt(next_prompt)) => app.mode = InputMode::Prompt(next_prompt),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key(
	app: &mut App,
	code: KeyCode,
	planner: &mut Planner,
	planner_path: &mut PathBuf,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), planner, planner_path) {
				Ok(SelectOutcome::NextPrompt(prompt)) => app.mode = InputMode::Prompt(prompt),
				Ok(SelectOutcome::NextSelect(next_select)) => app.mode = InputMode::Select(next_select),
				Ok(SelectOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
					app.current_path = planner_path.clone();
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(
	prompt: PromptState,
	planner: &mut Planner,
	planner_path: &Path,
) -> Result<PromptOutcome, String> {
	match prompt.kind {
		PromptKind::EntryDate { mut draft } => {
			let raw = prompt.input.trim();
			let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
				.map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD"))?;
			draft.recurrence = Some(Recurrence::Once { date });
			Ok(PromptOutcome::NextPrompt(build_start_prompt(draft)))
		}
		PromptKind::EntryStart { mut draft } => {
			let start = crate::domain::parse_clock(&prompt.input).map_err(|err| err.to_string())?;
			draft.start = Some(start);
			Ok(PromptOutcome::NextPrompt(build_end_prompt(draft)))
		}
		PromptKind::EntryEnd { mut draft } => {
			let end = crate::domain::parse_clock(&prompt.input).map_err(|err| err.to_string())?;
			if draft.start.is_some_and(|start| end <= start) {
				return Err(ScheduleError::InvalidInterval.to_string());
			}
			draft.end = Some(end);
			Ok(PromptOutcome::NextPrompt(build_heading_prompt(draft)))
		}
		PromptKind::EntryHeading { mut draft } => {
			let heading = required_text(&prompt.input, "heading")?;
			draft.heading = Some(heading);
			Ok(PromptOutcome::NextPrompt(build_content_prompt(draft)))
		}
		PromptKind::EntryContent { draft } => {
			finalize_draft(draft, &prompt.input, planner, planner_path).map(PromptOutcome::Done)
		}
	}
}

fn submit_select(
	select: SelectState,
	planner: &mut Planner,
	planner_path: &mut PathBuf,
) -> Result<SelectOutcome, String> {
	let selected_value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::EntryKind { draft } => {
			if selected_value.as_deref() == Some("weekly") {
				Ok(SelectOutcome::NextSelect(build_weekday_select(draft)))
			} else {
				Ok(SelectOutcome::NextPrompt(build_date_prompt(draft)))
			}
		}
		SelectKind::EntryWeekday { mut draft } => {
			let digit = selected_value
				.as_deref()
				.and_then(|value| value.parse::<u8>().ok())
				.ok_or_else(|| "selected weekday is missing".to_string())?;
			let weekday = Weekday::try_from(digit - 1).map_err(|_| "invalid weekday".to_string())?;
			draft.recurrence = Some(Recurrence::Weekly { weekday });
			Ok(SelectOutcome::NextPrompt(build_start_prompt(draft)))
		}
		SelectKind::DeleteConfirm { index, heading } => {
			let action = selected_value
				.as_deref()
				.ok_or_else(|| "selected action is missing".to_string())?;
			if action == "delete" {
				planner
					.remove(index)
					.ok_or_else(|| "entry no longer exists".to_string())?;
				persist(planner_path.as_path(), planner)?;
				Ok(SelectOutcome::Done(format!("deleted entry: {heading}")))
			} else {
				Ok(SelectOutcome::Done("Delete cancelled".to_string()))
			}
		}
		SelectKind::PlannerSwitch => {
			let selected_path = selected_value
				.map(PathBuf::from)
				.ok_or_else(|| "selected planner path is missing".to_string())?;
			switch_planner(planner, planner_path, selected_path).map(SelectOutcome::Done)
		}
	}
}

/// The final step of the add/edit chain: runs the checked path end to end
/// (construct, conflict-check, mutate, save). Any `ScheduleError` is surfaced
/// as the prompt error, which keeps the user in the chain.
fn finalize_draft(
	draft: EntryDraft,
	content: &str,
	planner: &mut Planner,
	planner_path: &Path,
) -> Result<String, String> {
	let recurrence = draft.recurrence.ok_or("entry kind was not chosen")?;
	let start = draft.start.ok_or("start time was not entered")?;
	let end = draft.end.ok_or("end time was not entered")?;
	let heading = draft.heading.ok_or("heading was not entered")?;

	let entry = Entry::new(recurrence, start, end, &heading, content).map_err(|err| err.to_string())?;
	check_entry(planner.entries(), &entry, draft.editing).map_err(|err| err.to_string())?;

	let heading = entry.heading.clone();
	match draft.editing {
		Some(index) => {
			if !planner.replace(index, entry) {
				return Err("entry no longer exists".to_string());
			}
			persist(planner_path, planner)?;
			Ok(format!("updated entry: {heading}"))
		}
		None => {
			planner.add(entry);
			persist(planner_path, planner)?;
			Ok(format!("added entry: {heading}"))
		}
	}
}

fn build_kind_select(draft: EntryDraft) -> SelectState {
	let options = vec![
		SelectOption::new("One-time (a calendar date)", Some("once".to_string()), Style::default().fg(ONCE_COLOR)),
		SelectOption::new("Weekly (every same weekday)", Some("weekly".to_string()), Style::default().fg(WEEKLY_COLOR)),
	];
	let weekly = matches!(
		draft.original.as_ref().map(|entry| entry.recurrence),
		Some(Recurrence::Weekly { .. })
	);

	let title = if draft.editing.is_some() { "Edit entry: kind" } else { "New entry: kind" };
	let mut select = SelectState::new(title, SelectKind::EntryKind { draft }, options);
	if weekly {
		select.selected = 1;
	}
	select
}

fn build_weekday_select(draft: EntryDraft) -> SelectState {
	let options = WEEKDAY_NAMES
		.iter()
		.enumerate()
		.map(|(index, name)| {
			SelectOption::new(*name, Some((index + 1).to_string()), Style::default())
		})
		.collect::<Vec<_>>();

	let preselected = match draft.original.as_ref().map(|entry| entry.recurrence) {
		Some(Recurrence::Weekly { weekday }) => weekday.number_from_monday() as usize - 1,
		_ => 0,
	};

	let mut select = SelectState::new("Entry weekday", SelectKind::EntryWeekday { draft }, options);
	select.selected = preselected;
	select
}

fn build_date_prompt(draft: EntryDraft) -> PromptState {
	let prefill = match draft.original.as_ref().map(|entry| entry.recurrence) {
		Some(Recurrence::Once { date }) => date.format("%Y-%m-%d").to_string(),
		_ => draft
			.proposed_date
			.unwrap_or_else(|| Local::now().date_naive())
			.format("%Y-%m-%d")
			.to_string(),
	};
	PromptState::with_input("Entry date (YYYY-MM-DD)", PromptKind::EntryDate { draft }, prefill)
}

fn build_start_prompt(draft: EntryDraft) -> PromptState {
	let prefill = draft
		.original
		.as_ref()
		.map(|entry| format_clock(entry.start))
		.unwrap_or_default();
	PromptState::with_input("Start time (HH:MM)", PromptKind::EntryStart { draft }, prefill)
}

fn build_end_prompt(draft: EntryDraft) -> PromptState {
	let prefill = draft
		.original
		.as_ref()
		.map(|entry| format_clock(entry.end))
		.unwrap_or_default();
	PromptState::with_input("End time (HH:MM)", PromptKind::EntryEnd { draft }, prefill)
}

fn build_heading_prompt(draft: EntryDraft) -> PromptState {
	let prefill = draft
		.original
		.as_ref()
		.map(|entry| entry.heading.clone())
		.unwrap_or_default();
	PromptState::with_input("Heading", PromptKind::EntryHeading { draft }, prefill)
}

fn build_content_prompt(draft: EntryDraft) -> PromptState {
	let prefill = draft
		.original
		.as_ref()
		.map(|entry| entry.content.clone())
		.unwrap_or_default();
	PromptState::with_input("Content (optional)", PromptKind::EntryContent { draft }, prefill)
}

fn build_delete_confirm_select(index: usize, entry: &Entry) -> SelectState {
	let title = format!("Delete entry? {} {}", entry.heading, entry.time_range());
	let options = vec![
		SelectOption::new(
			"Delete",
			Some("delete".to_string()),
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", Some("cancel".to_string()), Style::default()),
	];

	let mut select = SelectState::new(
		title,
		SelectKind::DeleteConfirm {
			index,
			heading: entry.heading.clone(),
		},
		options,
	);
	// Default to cancel to prevent accidental deletions.
	select.selected = 1;
	select
}

fn build_planner_switch_select(current_path: &Path) -> Result<SelectState, String> {
	let mut paths = recent_planners(100).map_err(|err| format!("failed to load recent planners: {err}"))?;
	let current_path = current_path.to_path_buf();
	if !paths.iter().any(|path| path == &current_path) {
		paths.insert(0, current_path.clone());
	}

	let current_value = current_path.display().to_string();
	let options = paths
		.into_iter()
		.map(|path| {
			let value = path.display().to_string();
			let is_current = value == current_value;
			let exists = path.exists();
			let mut label = value.clone();
			if is_current {
				label = format!("* {label}");
			}
			if !exists {
				label = format!("[missing] {label}");
			}

			let style = if is_current {
				Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
			} else if exists {
				Style::default()
			} else {
				Style::default().fg(Color::DarkGray)
			};

			SelectOption::new(label, Some(value), style)
		})
		.collect::<Vec<_>>();

	let mut select = SelectState::new("Switch planner", SelectKind::PlannerSwitch, options);
	select.selected = select
		.options
		.iter()
		.position(|option| option.value.as_deref() == Some(current_value.as_str()))
		.unwrap_or(0);
	Ok(select)
}

fn switch_planner(planner: &mut Planner, planner_path: &mut PathBuf, next_path: PathBuf) -> Result<String, String> {
	if &next_path == planner_path {
		return Ok(format!("already using planner: {}", planner_path.display()));
	}

	if !next_path.exists() {
		return Err(format!("planner does not exist: {}", next_path.display()));
	}

	let next_planner = load_planner(&next_path).map_err(|err| err.to_string())?;
	*planner = next_planner;
	*planner_path = next_path;

	match remember_planner(planner_path.as_path()) {
		Ok(()) => Ok(format!("switched planner: {}", planner_path.display())),
		Err(err) => Ok(format!(
			"switched planner: {} (warning: failed to store recents: {err})",
			planner_path.display()
		)),
	}
}

fn persist(path: &Path, planner: &Planner) -> Result<(), String> {
	save_planner(path, planner).map_err(|err| err.to_string())
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let value = input.trim();
	if value.is_empty() {
		Err(format!("{field_name} is required"))
	} else {
		Ok(value.to_string())
	}
}

fn build_view(app: &App, planner: &Planner, now: NaiveDateTime) -> ViewModel {
	let today = now.date();
	let week = week_of(today);

	let next = next_occurrence(planner.entries(), now).map(|occurrence| NextEntryView {
		time_range: occurrence.entry.time_range(),
		heading: occurrence.entry.heading.clone(),
		countdown: countdown_text(countdown(occurrence.entry, now)),
	});

	let day_rows = build_day_rows(planner, app.selected_day, today);
	let week_rows = build_week_rows(app, planner, &week, today);
	let calendar_active = build_calendar_marks(planner, app.calendar_month);
	let detail = app.detail.as_deref().and_then(|id| build_detail(planner, id, now));

	ViewModel {
		today,
		clock_text: now.format("%H:%M:%S").to_string(),
		next,
		calendar_active,
		day_rows,
		week_start: week[0],
		week_rows,
		detail,
	}
}

fn build_calendar_marks(planner: &Planner, month: NaiveDate) -> HashSet<NaiveDate> {
	let mut active = HashSet::new();
	for day in 1..=days_in_month(month.year(), month.month()) {
		let date = NaiveDate::from_ymd_opt(month.year(), month.month(), day)
			.expect("calendar day must be valid");
		if has_any_entry(planner.entries(), date) {
			active.insert(date);
		}
	}
	active
}

/// The selected-day overview: entries for the day grouped into the fixed day
/// sessions by time overlap, with the separating rest windows shown between
/// the groups.
fn build_day_rows(planner: &Planner, selected_day: NaiveDate, today: NaiveDate) -> Vec<DayRow> {
	let occurrences = entries_on_date(planner.entries(), selected_day, today);
	let rests = rest_windows();
	let sessions = day_sessions();

	let mut rows = Vec::new();
	for (session_index, session) in sessions.iter().enumerate() {
		rows.push(DayRow {
			line: Line::from(Span::styled(
				format!(
					"{} {}-{}",
					session.label,
					format_clock(session.start),
					format_clock(session.end)
				),
				Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
			)),
			kind: RowKind::Static,
		});

		let mut session_is_empty = true;
		for occurrence in &occurrences {
			let entry = occurrence.entry;
			if !overlaps(entry.start, entry.end, session.start, session.end) {
				continue;
			}
			session_is_empty = false;
			rows.push(DayRow {
				line: entry_line(entry, "  "),
				kind: RowKind::Entry { id: entry.id.clone() },
			});
		}
		if session_is_empty {
			rows.push(DayRow {
				line: Line::from(Span::styled("  (free)", Style::default().fg(Color::DarkGray))),
				kind: RowKind::Static,
			});
		}

		if session_index < sessions.len() - 1 {
			let rest = rests[session_index];
			rows.push(DayRow {
				line: Line::from(Span::styled(
					format!("~ rest {rest} ~"),
					Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
				)),
				kind: RowKind::Static,
			});
		}
	}

	rows
}

fn build_week_rows(
	app: &App,
	planner: &Planner,
	week: &[NaiveDate; 7],
	today: NaiveDate,
) -> Vec<WeekRow> {
	let mut by_date: BTreeMap<NaiveDate, Vec<&Entry>> = week.iter().map(|date| (*date, Vec::new())).collect();
	for occurrence in resolve_week(planner.entries(), week) {
		if let Some(day_entries) = by_date.get_mut(&occurrence.date) {
			day_entries.push(occurrence.entry);
		}
	}
	for day_entries in by_date.values_mut() {
		day_entries.sort_by_key(|entry| crate::domain::minutes_since_midnight(entry.start));
	}

	let mut rows = Vec::new();
	for date in week {
		let day_entries = &by_date[date];
		let collapsed = app.collapsed_days.contains(date);
		let marker = if collapsed { "[+]" } else { "[-]" };
		let mut header_style = Style::default().add_modifier(Modifier::BOLD);
		let mut header_text = format!("{marker} {} ({})", date.format("%A %d %b"), day_entries.len());
		if *date == today {
			header_style = header_style.fg(Color::Cyan);
			header_text.push_str("  · today");
		}
		rows.push(WeekRow {
			line: Line::from(Span::styled(header_text, header_style)),
			kind: RowKind::DayHeader { date: *date },
		});

		if collapsed {
			continue;
		}

		if day_entries.is_empty() {
			rows.push(WeekRow {
				line: Line::from(Span::styled("    (free)", Style::default().fg(Color::DarkGray))),
				kind: RowKind::Static,
			});
			continue;
		}

		for entry in day_entries {
			rows.push(WeekRow {
				line: entry_line(entry, "    "),
				kind: RowKind::Entry { id: entry.id.clone() },
			});
		}
	}

	rows
}

fn build_detail(planner: &Planner, entry_id: &str, now: NaiveDateTime) -> Option<DetailView> {
	let index = planner.position_of(entry_id)?;
	let entry = &planner.entries()[index];

	let weekly = entry.recurrence.is_weekly();
	let when = match entry.recurrence {
		Recurrence::Weekly { weekday } => {
			format!("Every {}", weekday_name(weekday))
		}
		Recurrence::Once { date } => date.format("%Y-%m-%d").to_string(),
	};

	Some(DetailView {
		heading: entry.heading.clone(),
		kind_label: if weekly { "Weekly" } else { "One-time" },
		when,
		time_range: entry.time_range(),
		countdown: countdown_text(countdown(entry, now)),
		content: entry.content.clone(),
		weekly,
	})
}

fn entry_line(entry: &Entry, indent: &str) -> Line<'static> {
	let accent = kind_color(entry.recurrence.is_weekly());
	let tag = if entry.recurrence.is_weekly() { "[W]" } else { "[O]" };
	Line::from(vec![
		Span::styled(
			format!("{indent}{} ", entry.time_range()),
			Style::default().fg(accent),
		),
		Span::styled(tag.to_string(), Style::default().fg(accent).add_modifier(Modifier::BOLD)),
		Span::raw(format!(" {}", entry.heading)),
	])
}

fn countdown_text(state: Countdown) -> String {
	match state {
		Countdown::StartsIn(remaining) => format!("starts in {}", format_duration(remaining)),
		Countdown::EndsIn(remaining) => format!("ends in {}", format_duration(remaining)),
		Countdown::Completed => "completed".to_string(),
	}
}

fn weekday_name(weekday: Weekday) -> &'static str {
	WEEKDAY_NAMES[weekday.number_from_monday() as usize - 1]
}

fn kind_color(weekly: bool) -> Color {
	if weekly { WEEKLY_COLOR } else { ONCE_COLOR }
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

fn days_in_month(year: i32, month: u32) -> u32 {
	let first_of_next = if month == 12 {
		NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("next year date should be valid")
	} else {
		NaiveDate::from_ymd_opt(year, month + 1, 1).expect("next month date should be valid")
	};
	(first_of_next - Duration::days(1)).day()
}

fn first_day_of_month(day: NaiveDate) -> NaiveDate {
	NaiveDate::from_ymd_opt(day.year(), day.month(), 1).expect("first day of month must be valid")
}

fn shift_month(day: NaiveDate, delta: i32) -> NaiveDate {
	let mut year = day.year();
	let mut month = day.month() as i32 + delta;
	while month > 12 {
		year += 1;
		month -= 12;
	}
	while month < 1 {
		year -= 1;
		month += 12;
	}
	let month_u32 = month as u32;
	let max_day = days_in_month(year, month_u32);
	let target_day = day.day().min(max_day);
	NaiveDate::from_ymd_opt(year, month_u32, target_day).expect("shifted month date must be valid")
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Done(String),
}

#[derive(Debug, Clone)]
enum SelectOutcome {
	NextPrompt(PromptState),
	NextSelect(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn with_input(title: impl Into<String>, kind: PromptKind, input: String) -> Self {
		Self {
			title: title.into(),
			input,
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

/// The add/edit chain's accumulating state, threaded through the prompt and
/// select steps. `original` only prefills inputs when editing.
#[derive(Debug, Clone)]
struct EntryDraft {
	editing: Option<usize>,
	original: Option<Entry>,
	proposed_date: Option<NaiveDate>,
	recurrence: Option<Recurrence>,
	start: Option<NaiveTime>,
	end: Option<NaiveTime>,
	heading: Option<String>,
}

impl EntryDraft {
	fn new() -> Self {
		Self {
			editing: None,
			original: None,
			proposed_date: None,
			recurrence: None,
			start: None,
			end: None,
			heading: None,
		}
	}

	fn for_edit(index: usize, entry: Entry) -> Self {
		Self {
			editing: Some(index),
			original: Some(entry),
			proposed_date: None,
			recurrence: None,
			start: None,
			end: None,
			heading: None,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	EntryDate { draft: EntryDraft },
	EntryStart { draft: EntryDraft },
	EntryEnd { draft: EntryDraft },
	EntryHeading { draft: EntryDraft },
	EntryContent { draft: EntryDraft },
}

#[derive(Debug, Clone)]
enum SelectKind {
	EntryKind { draft: EntryDraft },
	EntryWeekday { draft: EntryDraft },
	DeleteConfirm { index: usize, heading: String },
	PlannerSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Calendar,
	Day,
	Week,
}

impl FocusPane {
	fn next(self) -> Self {
		match self {
			FocusPane::Calendar => FocusPane::Day,
			FocusPane::Day => FocusPane::Week,
			FocusPane::Week => FocusPane::Calendar,
		}
	}

	fn prev(self) -> Self {
		match self {
			FocusPane::Calendar => FocusPane::Week,
			FocusPane::Day => FocusPane::Calendar,
			FocusPane::Week => FocusPane::Day,
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct App {
	focus: FocusPane,
	selected_day: NaiveDate,
	calendar_month: NaiveDate,
	day_index: usize,
	week_index: usize,
	collapsed_days: HashSet<NaiveDate>,
	detail: Option<String>,
	current_path: PathBuf,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		let today = Local::now().date_naive();
		Self {
			focus: FocusPane::Week,
			selected_day: today,
			calendar_month: first_day_of_month(today),
			day_index: 0,
			week_index: 0,
			collapsed_days: HashSet::new(),
			detail: None,
			current_path: PathBuf::new(),
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, view: &ViewModel) {
		if view.day_rows.is_empty() {
			self.day_index = 0;
		} else {
			self.day_index = self.day_index.min(view.day_rows.len() - 1);
		}

		if view.week_rows.is_empty() {
			self.week_index = 0;
		} else {
			self.week_index = self.week_index.min(view.week_rows.len() - 1);
		}

		// The detail target can vanish through delete or planner switch.
		if self.detail.is_some() && view.detail.is_none() {
			self.detail = None;
		}
	}

	fn shift_selected_day(&mut self, delta_days: i64) {
		self.selected_day += Duration::days(delta_days);
		self.calendar_month = first_day_of_month(self.selected_day);
		self.day_index = 0;
	}

	fn shift_selected_month(&mut self, delta_months: i32) {
		self.selected_day = shift_month(self.selected_day, delta_months);
		self.calendar_month = first_day_of_month(self.selected_day);
		self.day_index = 0;
	}

	fn jump_to_today(&mut self, today: NaiveDate) {
		self.selected_day = today;
		self.calendar_month = first_day_of_month(today);
		self.day_index = 0;
	}

	fn move_day_selection(&mut self, delta: i32, view: &ViewModel) {
		if view.day_rows.is_empty() {
			self.day_index = 0;
			return;
		}

		if delta > 0 {
			self.day_index = (self.day_index + delta as usize).min(view.day_rows.len() - 1);
		} else {
			self.day_index = self.day_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn move_week_selection(&mut self, delta: i32, view: &ViewModel) {
		if view.week_rows.is_empty() {
			self.week_index = 0;
			return;
		}

		if delta > 0 {
			self.week_index = (self.week_index + delta as usize).min(view.week_rows.len() - 1);
		} else {
			self.week_index = self.week_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn focused_row_kind(&self, view: &ViewModel) -> Option<RowKind> {
		match self.focus {
			FocusPane::Calendar => None,
			FocusPane::Day => view.day_rows.get(self.day_index).map(|row| row.kind.clone()),
			FocusPane::Week => view.week_rows.get(self.week_index).map(|row| row.kind.clone()),
		}
	}

	fn selected_entry_id(&self, view: &ViewModel) -> Option<String> {
		match self.focused_row_kind(view) {
			Some(RowKind::Entry { id }) => Some(id),
			_ => None,
		}
	}
}

struct ViewModel {
	today: NaiveDate,
	clock_text: String,
	next: Option<NextEntryView>,
	calendar_active: HashSet<NaiveDate>,
	day_rows: Vec<DayRow>,
	week_start: NaiveDate,
	week_rows: Vec<WeekRow>,
	detail: Option<DetailView>,
}

struct NextEntryView {
	time_range: String,
	heading: String,
	countdown: String,
}

#[derive(Clone)]
struct DayRow {
	line: Line<'static>,
	kind: RowKind,
}

#[derive(Clone)]
struct WeekRow {
	line: Line<'static>,
	kind: RowKind,
}

#[derive(Debug, Clone)]
enum RowKind {
	Static,
	DayHeader { date: NaiveDate },
	Entry { id: String },
}

struct DetailView {
	heading: String,
	kind_label: &'static str,
	when: String,
	time_range: String,
	countdown: String,
	content: String,
	weekly: bool,
}
