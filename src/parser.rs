//! Migration file parsing using nom.
//!
//! Two small grammars live here: the file name convention and the
//! comment markers that split a file into its UP and DOWN scripts.
//!
//! # File layout
//!
//! ```text
//! 12-add_users.sql
//! ─┬ ────┬──── ─┬─
//!  │     │      └── extension (required)
//!  │     └── free-form label (`-`, `_` or nothing before it)
//!  └── migration id (positive integer)
//!
//! -- UP
//! CREATE TABLE users (id INT);
//!
//! -- DOWN
//! DROP TABLE users;
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{digit1, multispace0, multispace1},
    combinator::{eof, map_res, value},
};

/// Extension every migration file carries.
pub const EXTENSION: &str = ".sql";

/// The two scripts embedded in a migration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    pub up: String,
    pub down: String,
}

/// Extract the migration id from a file name.
///
/// Any `.sql` name that starts with digits is a migration, whatever
/// separates the id from the label. Returns `None` for anything else: wrong
/// extension, no numeric prefix, a zero id or one that overflows `i64`.
///
/// ```
/// use pgmig::parser::parse_filename;
///
/// assert_eq!(parse_filename("12-add_users.sql"), Some(12));
/// assert_eq!(parse_filename("README.md"), None);
/// ```
pub fn parse_filename(name: &str) -> Option<i64> {
    if !name.ends_with(EXTENSION) {
        return None;
    }
    match parse_id(name) {
        Ok((_, id)) if id > 0 => Some(id),
        _ => None,
    }
}

/// Parse the leading integer prefix. Whatever follows it is the label.
fn parse_id(input: &str) -> IResult<&str, i64> {
    map_res(digit1, str::parse::<i64>)(input)
}

/// Split migration text into its UP and DOWN scripts.
///
/// The UP script runs from the first `-- UP` marker to the first `-- DOWN`
/// marker after it; the DOWN script is everything after that marker.
/// Markers are case-insensitive. A missing marker yields an empty script.
pub fn parse_scripts(text: &str) -> Scripts {
    let up_marker = find_marker(text, "UP", 0);
    let down_marker = find_marker(text, "DOWN", up_marker.map_or(0, |(_, end)| end));

    let up = match up_marker {
        Some((_, end)) => {
            let stop = down_marker.map_or(text.len(), |(start, _)| start);
            &text[end..stop]
        }
        None => "",
    };
    let down = down_marker.map_or("", |(_, end)| &text[end..]);

    Scripts {
        up: up.trim().to_string(),
        down: down.trim().to_string(),
    }
}

/// Parse a marker comment: `--`, optional whitespace, the token, then
/// whitespace or end of input.
fn marker<'a>(token: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    move |input| {
        let (input, _) = tag("--")(input)?;
        let (input, _) = multispace0(input)?;
        let (input, _) = tag_no_case(token)(input)?;
        let (input, _) = alt((value((), multispace1), value((), eof)))(input)?;
        Ok((input, ()))
    }
}

/// Byte range `(start, end)` of the first marker at or after `from`.
fn find_marker(text: &str, token: &'static str, from: usize) -> Option<(usize, usize)> {
    let mut parse = marker(token);
    text[from..]
        .char_indices()
        .filter(|&(_, c)| c == '-')
        .find_map(|(offset, _)| {
            let start = from + offset;
            parse(&text[start..])
                .ok()
                .map(|(rest, ())| (start, text.len() - rest.len()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_with_label() {
        assert_eq!(parse_filename("1-init.sql"), Some(1));
        assert_eq!(parse_filename("42-add-users-table.sql"), Some(42));
        assert_eq!(parse_filename("007-padded.sql"), Some(7));
    }

    #[test]
    fn test_filename_with_any_separator() {
        assert_eq!(parse_filename("1_init.sql"), Some(1));
        assert_eq!(parse_filename("0001_create_users.sql"), Some(1));
        assert_eq!(parse_filename("12abc.sql"), Some(12));
    }

    #[test]
    fn test_filename_without_label() {
        assert_eq!(parse_filename("3.sql"), Some(3));
    }

    #[test]
    fn test_filename_rejects_non_migrations() {
        assert_eq!(parse_filename("init.sql"), None);
        assert_eq!(parse_filename("1-init.txt"), None);
        assert_eq!(parse_filename("0-zero.sql"), None);
        assert_eq!(parse_filename("99999999999999999999-big.sql"), None);
        assert_eq!(parse_filename(".sql"), None);
    }

    #[test]
    fn test_up_and_down() {
        let scripts = parse_scripts("-- UP\nCREATE TABLE foo (id INT);\n\n-- DOWN\nDROP TABLE foo;\n");
        assert_eq!(scripts.up, "CREATE TABLE foo (id INT);");
        assert_eq!(scripts.down, "DROP TABLE foo;");
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let scripts = parse_scripts("--up\nSELECT 1;\n--   Down\nSELECT 2;");
        assert_eq!(scripts.up, "SELECT 1;");
        assert_eq!(scripts.down, "SELECT 2;");
    }

    #[test]
    fn test_up_only() {
        let scripts = parse_scripts("-- UP\nCREATE TABLE t (id INT);\n");
        assert_eq!(scripts.up, "CREATE TABLE t (id INT);");
        assert_eq!(scripts.down, "");
    }

    #[test]
    fn test_no_markers() {
        assert_eq!(parse_scripts("CREATE TABLE t (id INT);"), Scripts::default());
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(parse_scripts("-- UP\n\n\n-- DOWN\n"), Scripts::default());
    }

    #[test]
    fn test_update_comment_is_not_a_marker() {
        let scripts = parse_scripts("-- UPDATE notes\n-- UP\nSELECT 1;\n-- DOWN\nSELECT 2;");
        assert_eq!(scripts.up, "SELECT 1;");
        assert_eq!(scripts.down, "SELECT 2;");
    }

    #[test]
    fn test_multi_statement_scripts() {
        let text = "-- UP\nCREATE TABLE a (id INT);\nCREATE TABLE b (id INT);\n-- DOWN\nDROP TABLE b;\nDROP TABLE a;\n";
        let scripts = parse_scripts(text);
        assert_eq!(scripts.up, "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);");
        assert_eq!(scripts.down, "DROP TABLE b;\nDROP TABLE a;");
    }
}
