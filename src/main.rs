mod domain;
mod planners;
mod schedule;
mod storage;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate, Weekday};
use clap::{Parser, Subcommand};

use crate::domain::{format_duration, parse_clock, Entry, Planner, Recurrence};
use crate::planners::{recent_planners, remember_planner, resolve_planner_path};
use crate::schedule::{
	check_entry, countdown, entries_on_date, next_occurrence, resolve_week, week_of, Countdown,
};
use crate::storage::{load_planner, save_planner};
use crate::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "weekplan", about = "Terminal-first weekly schedule planner")]
struct Cli {
	#[arg(long)]
	file: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Dashboard,
	Add {
		#[arg(long)]
		date: Option<String>,
		#[arg(long)]
		weekday: Option<String>,
		#[arg(long)]
		start: String,
		#[arg(long)]
		end: String,
		#[arg(long)]
		heading: String,
		#[arg(long, default_value = "")]
		content: String,
	},
	Remove {
		#[arg(long)]
		index: usize,
	},
	List,
	Week {
		#[arg(long)]
		date: Option<String>,
	},
	Day {
		#[arg(long)]
		date: Option<String>,
	},
	Next,
	Export,
	Planners {
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	if let Some(Command::Planners { limit }) = &cli.command {
		print_recent_planners(*limit)?;
		return Ok(());
	}

	let mut planner_path = resolve_planner_path(cli.file);
	let mut planner = load_planner(&planner_path)?;
	if let Err(err) = remember_planner(&planner_path) {
		eprintln!("warning: failed to store recent planner: {err}");
	}

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Init => {
			save_planner(&planner_path, &planner)?;
			println!("initialized planner at {}", planner_path.display());
		}
		Command::Dashboard => {
			run_dashboard(&mut planner, &mut planner_path)?;
		}
		Command::Add {
			date,
			weekday,
			start,
			end,
			heading,
			content,
		} => {
			let recurrence = parse_recurrence(date.as_deref(), weekday.as_deref())?;
			let start = parse_clock(&start)?;
			let end = parse_clock(&end)?;
			let entry = Entry::new(recurrence, start, end, &heading, &content)?;
			check_entry(planner.entries(), &entry, None)?;
			let index = planner.add(entry);
			save_planner(&planner_path, &planner)?;
			println!("added entry {} at index {index}", heading.trim());
		}
		Command::Remove { index } => {
			let removed = planner
				.remove(index)
				.ok_or_else(|| format!("no entry at index {index}"))?;
			save_planner(&planner_path, &planner)?;
			println!("removed entry {}", removed.heading);
		}
		Command::List => {
			print_entries(&planner);
		}
		Command::Week { date } => {
			let day = parse_day(date.as_deref())?;
			print_week(&planner, day);
		}
		Command::Day { date } => {
			let day = parse_day(date.as_deref())?;
			print_day(&planner, day);
		}
		Command::Next => {
			print_next(&planner);
		}
		Command::Export => {
			println!("{}", serde_json::to_string_pretty(planner.entries())?);
		}
		Command::Planners { .. } => {}
	}

	Ok(())
}

fn print_recent_planners(limit: usize) -> Result<(), Box<dyn Error>> {
	let rows = recent_planners(limit)?;
	if rows.is_empty() {
		println!("no recent planners");
		return Ok(());
	}

	for (index, path) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, path.display());
	}

	Ok(())
}

fn parse_recurrence(date: Option<&str>, weekday: Option<&str>) -> Result<Recurrence, Box<dyn Error>> {
	match (date, weekday) {
		(Some(raw), None) => {
			let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
			Ok(Recurrence::Once { date })
		}
		(None, Some(raw)) => Ok(Recurrence::Weekly {
			weekday: parse_weekday(raw)?,
		}),
		_ => Err("exactly one of --date or --weekday is required".into()),
	}
}

fn parse_weekday(input: &str) -> Result<Weekday, Box<dyn Error>> {
	let normalized = input.trim().to_lowercase();
	if let Ok(number) = normalized.parse::<u8>() {
		if (1..=7).contains(&number) {
			return Ok(Weekday::try_from(number - 1)
				.map_err(|_| format!("invalid weekday number {number}"))?);
		}
		return Err(format!("invalid weekday number {number}, expected 1-7").into());
	}

	match normalized.as_str() {
		"mon" | "monday" => Ok(Weekday::Mon),
		"tue" | "tuesday" => Ok(Weekday::Tue),
		"wed" | "wednesday" => Ok(Weekday::Wed),
		"thu" | "thursday" => Ok(Weekday::Thu),
		"fri" | "friday" => Ok(Weekday::Fri),
		"sat" | "saturday" => Ok(Weekday::Sat),
		"sun" | "sunday" => Ok(Weekday::Sun),
		_ => Err(format!("invalid weekday '{input}', expected mon-sun or 1-7").into()),
	}
}

fn parse_day(input: Option<&str>) -> Result<NaiveDate, Box<dyn Error>> {
	if let Some(raw) = input {
		Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
	} else {
		Ok(Local::now().date_naive())
	}
}

fn describe_recurrence(recurrence: Recurrence) -> String {
	match recurrence {
		Recurrence::Once { date } => date.format("%Y-%m-%d").to_string(),
		Recurrence::Weekly { weekday } => format!("every {}", weekday_name(weekday)),
	}
}

fn weekday_name(weekday: Weekday) -> &'static str {
	match weekday {
		Weekday::Mon => "Monday",
		Weekday::Tue => "Tuesday",
		Weekday::Wed => "Wednesday",
		Weekday::Thu => "Thursday",
		Weekday::Fri => "Friday",
		Weekday::Sat => "Saturday",
		Weekday::Sun => "Sunday",
	}
}

fn print_entries(planner: &Planner) {
	if planner.is_empty() {
		println!("no entries yet");
		return;
	}

	for (index, entry) in planner.entries().iter().enumerate() {
		println!(
			"{:>2}. {} | {} | {}",
			index,
			entry.time_range(),
			describe_recurrence(entry.recurrence),
			entry.heading
		);
	}
}

fn print_week(planner: &Planner, day: NaiveDate) {
	let week = week_of(day);
	println!(
		"week of {} - {}",
		week[0].format("%Y-%m-%d"),
		week[6].format("%Y-%m-%d")
	);

	let occurrences = resolve_week(planner.entries(), &week);
	for date in &week {
		println!("\n{}", date.format("%A %d %B"));
		let mut day_occurrences = occurrences
			.iter()
			.filter(|occurrence| occurrence.date == *date)
			.collect::<Vec<_>>();
		day_occurrences.sort_by_key(|occurrence| {
			(
				crate::domain::minutes_since_midnight(occurrence.entry.start),
				occurrence.index,
			)
		});

		if day_occurrences.is_empty() {
			println!("  (free)");
			continue;
		}
		for occurrence in day_occurrences {
			println!("  {} {}", occurrence.entry.time_range(), occurrence.entry.heading);
		}
	}
}

fn print_day(planner: &Planner, day: NaiveDate) {
	let today = Local::now().date_naive();
	let occurrences = entries_on_date(planner.entries(), day, today);

	println!("entries for {}", day.format("%A %d %B %Y"));
	if occurrences.is_empty() {
		println!("no entries for this day");
		return;
	}

	for occurrence in occurrences {
		println!(
			"  {} {} ({})",
			occurrence.entry.time_range(),
			occurrence.entry.heading,
			describe_recurrence(occurrence.entry.recurrence)
		);
	}
}

fn print_next(planner: &Planner) {
	let now = Local::now().naive_local();
	let Some(occurrence) = next_occurrence(planner.entries(), now) else {
		println!("no upcoming entry");
		return;
	};

	let entry = occurrence.entry;
	println!(
		"{} {} on {}",
		entry.time_range(),
		entry.heading,
		occurrence.date.format("%A %d %B")
	);
	match countdown(entry, now) {
		Countdown::StartsIn(remaining) => println!("starts in {}", format_duration(remaining)),
		Countdown::EndsIn(remaining) => println!("ends in {}", format_duration(remaining)),
		Countdown::Completed => println!("completed"),
	}
}
