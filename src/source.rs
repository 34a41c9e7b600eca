//! Migration source: discovers numbered `.sql` files in a directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};
use crate::parser::{self, EXTENSION, Scripts};

/// Template written by [`create_unit`].
pub const TEMPLATE: &str = "-- UP\n\n\n-- DOWN\n";

/// Which way a migration is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// One migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub id: i64,
    pub filename: String,
    pub path: PathBuf,
    pub up: String,
    pub down: String,
}

impl MigrationUnit {
    /// Load and parse a migration file.
    pub fn load(id: i64, path: PathBuf) -> MigrateResult<Self> {
        let filename = file_name(&path);
        let Scripts { up, down } = parser::parse_scripts(&fs::read_to_string(&path)?);
        Ok(Self {
            id,
            filename,
            path,
            up,
            down,
        })
    }

    /// The script to run for `direction`; empty when the section is missing.
    pub fn script(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// List all migration units in `dir`, ascending by id.
///
/// A missing directory is created and yields no units. Files that do not
/// follow the `<id>-<label>.sql` convention are skipped. Two files sharing
/// an id are rejected before anything is read.
pub fn list_units(dir: &Path) -> MigrateResult<Vec<MigrationUnit>> {
    let mut entries = scan(dir)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    for pair in entries.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(MigrateError::DuplicateId {
                id: pair[0].0,
                first: file_name(&pair[0].1),
                second: file_name(&pair[1].1),
            });
        }
    }

    entries
        .into_iter()
        .map(|(id, path)| MigrationUnit::load(id, path))
        .collect()
}

/// Create a new, empty migration file and return its path.
///
/// The id is one past the highest existing id (1 for an empty directory).
/// `name` has whitespace runs replaced by `_` and is lowercased.
pub fn create_unit(dir: &Path, name: &str) -> MigrateResult<PathBuf> {
    let slug = sanitize(name);
    if slug.is_empty() {
        return Err(MigrateError::Config("Migration name is empty".to_string()));
    }

    let next = scan(dir)?.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;
    let path = dir.join(format!("{next}-{slug}{EXTENSION}"));

    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .and_then(|mut file| std::io::Write::write_all(&mut file, TEMPLATE.as_bytes()))?;

    tracing::debug!(id = next, path = %path.display(), "created migration");
    Ok(path)
}

/// Collapse whitespace runs to `_` and lowercase.
pub fn sanitize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Find `(id, path)` for every migration file, creating `dir` if needed.
fn scan(dir: &Path) -> MigrateResult<Vec<(i64, PathBuf)>> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        tracing::debug!(dir = %dir.display(), "created migrations directory");
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(parser::parse_filename) else {
            continue;
        };
        found.push((id, entry.path()));
    }
    Ok(found)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn ids(units: &[MigrationUnit]) -> Vec<i64> {
        units.iter().map(|u| u.id).collect()
    }

    #[test]
    fn test_missing_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("db").join("migrations");

        let units = list_units(&dir).unwrap();
        assert!(units.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_numeric_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "10-ten.sql", "-- UP\nSELECT 10;");
        write(tmp.path(), "2-two.sql", "-- UP\nSELECT 2;");
        write(tmp.path(), "1-one.sql", "-- UP\nSELECT 1;");

        let units = list_units(tmp.path()).unwrap();
        assert_eq!(ids(&units), vec![1, 2, 10]);
        assert_eq!(units[0].filename, "1-one.sql");
        assert_eq!(units[2].up, "SELECT 10;");
    }

    #[test]
    fn test_skips_non_migrations() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1-init.sql", "-- UP\nSELECT 1;");
        write(tmp.path(), "002_users.sql", "-- UP\nSELECT 2;");
        write(tmp.path(), "README.md", "docs");
        write(tmp.path(), "seed.sql", "INSERT INTO t VALUES (1);");
        fs::create_dir(tmp.path().join("3-not-a-file.sql")).unwrap();

        assert_eq!(ids(&list_units(tmp.path()).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "1-a.sql", "-- UP\nSELECT 1;");
        write(tmp.path(), "01-b.sql", "-- UP\nSELECT 1;");

        match list_units(tmp.path()) {
            Err(MigrateError::DuplicateId { id, first, second }) => {
                assert_eq!(id, 1);
                assert_eq!((first.as_str(), second.as_str()), ("01-b.sql", "1-a.sql"));
            }
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn test_create_numbers_sequentially() {
        let tmp = TempDir::new().unwrap();

        let first = create_unit(tmp.path(), "Add Users").unwrap();
        let second = create_unit(tmp.path(), "Add Posts").unwrap();

        assert_eq!(first.file_name().unwrap(), "1-add_users.sql");
        assert_eq!(second.file_name().unwrap(), "2-add_posts.sql");
        assert_eq!(fs::read_to_string(&first).unwrap(), TEMPLATE);

        let units = list_units(tmp.path()).unwrap();
        assert_eq!(ids(&units), vec![1, 2]);
        assert_eq!(units[0].up, "");
        assert_eq!(units[0].down, "");
    }

    #[test]
    fn test_create_follows_highest_id() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "7-seven.sql", TEMPLATE);
        write(tmp.path(), "3-three.sql", TEMPLATE);

        let path = create_unit(tmp.path(), "next").unwrap();
        assert_eq!(path.file_name().unwrap(), "8-next.sql");
    }

    #[test]
    fn test_create_in_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("migrations");

        let path = create_unit(&dir, "init").unwrap();
        assert_eq!(path, dir.join("1-init.sql"));
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            create_unit(tmp.path(), "   "),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Add Users"), "add_users");
        assert_eq!(sanitize("  add\t  many   spaces "), "add_many_spaces");
        assert_eq!(sanitize("already_ok"), "already_ok");
    }
}
