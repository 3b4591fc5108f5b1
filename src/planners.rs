use std::env;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const RECENT_PLANNERS_FILE: &str = "recent_planners.txt";
const MAX_RECENT_PLANNERS: usize = 50;
const DEFAULT_PLANNER_FILE: &str = "data.txt";

/// Resolution order: `--file` flag, `WEEKPLAN_DATA`, the most recent planner,
/// then `data.txt` in the working directory.
pub fn resolve_planner_path(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("WEEKPLAN_DATA") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	if let Ok(mut recent) = recent_planners(MAX_RECENT_PLANNERS) {
		if let Some(path) = recent.drain(..).next() {
			return path;
		}
	}

	absolutize(PathBuf::from(DEFAULT_PLANNER_FILE))
}

pub fn remember_planner(path: &Path) -> Result<(), std::io::Error> {
	let path = absolutize(path.to_path_buf());
	let mut entries = recent_planners(MAX_RECENT_PLANNERS)?;
	entries.retain(|entry| entry != &path);
	entries.insert(0, path);
	entries.truncate(MAX_RECENT_PLANNERS);
	save_recent_planners(&entries)
}

pub fn recent_planners(limit: usize) -> Result<Vec<PathBuf>, std::io::Error> {
	let path = recent_planners_path();
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(err) => return Err(err),
	};

	let mut rows = Vec::new();
	for line in raw.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}
		rows.push(PathBuf::from(trimmed));
		if rows.len() >= limit {
			break;
		}
	}

	Ok(rows)
}

fn save_recent_planners(entries: &[PathBuf]) -> Result<(), std::io::Error> {
	let state_dir = state_dir();
	fs::create_dir_all(&state_dir)?;

	let mut file = fs::File::create(recent_planners_path())?;
	for path in entries {
		writeln!(file, "{}", path.display())?;
	}

	Ok(())
}

fn recent_planners_path() -> PathBuf {
	state_dir().join(RECENT_PLANNERS_FILE)
}

fn state_dir() -> PathBuf {
	if let Some(path) = env::var_os("WEEKPLAN_STATE_DIR") {
		return PathBuf::from(path);
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join("weekplan");
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join("weekplan");
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join("weekplan");
	}

	PathBuf::from(".weekplan")
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}
