use std::fmt;
use std::ops::Index;
use std::slice;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// One executable unit of a command line.
///
/// A `Command` is produced by the parser and is never mutated afterwards.
/// The program name is not stored separately: [`Command::name`] reads
/// `argv[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Full argument vector, program name at index 0. Never empty.
    pub argv: Vec<String>,
    /// Path read as standard input, set iff the text contained `<`.
    pub redirect_in: Option<String>,
    /// Path written as standard output, set iff the text contained `>`.
    pub redirect_out: Option<String>,
    /// The command was terminated by `&`.
    pub background: bool,
    /// The command was terminated by `;`.
    pub sequential: bool,
    /// 1-based index of the command this one pipes into, if any.
    pub pipe_to: Option<usize>,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            argv: vec![String::new()],
            redirect_in: None,
            redirect_out: None,
            background: false,
            sequential: false,
            pipe_to: None,
        }
    }
}

impl Command {
    /// The program name, `argv[0]`.
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// True when no program name was given.
    pub fn is_empty(&self) -> bool {
        self.name().is_empty()
    }

    /// 0-based index of the pipe target within the owning sequence.
    pub fn pipe_target(&self) -> Option<usize> {
        self.pipe_to.and_then(|to| to.checked_sub(1))
    }

    /// Structural dump used by `--dump debug`.
    pub fn dump(&self, index: usize) -> String {
        let mut out = format!("---- Command({index}) ----\n{}\n", self.name());
        for (i, arg) in self.argv.iter().enumerate() {
            out.push_str(&format!("+-> argv[{i}] = {arg}\n"));
        }
        out.push_str(&format!("Background = {}\n", self.background));
        out.push_str(&format!("Sequential = {}\n", self.sequential));
        out.push_str(&format!("Redirect Input = {:?}\n", self.redirect_in));
        out.push_str(&format!("Redirect Output = {:?}\n", self.redirect_out));
        out.push_str(&format!("Pipe to Command = {}\n", self.pipe_to.unwrap_or(0)));
        out
    }
}

/// Human-readable form used by `--dump human`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program : {}", self.name())?;
        writeln!(f, "Parameters : {}", self.args().join(" "))?;
        if self.background {
            writeln!(f, "Execution in Background.")?;
        }
        if let Some(path) = &self.redirect_in {
            writeln!(f, "Redirect Input from {path}.")?;
        }
        if let Some(path) = &self.redirect_out {
            writeln!(f, "Redirect Output to {path}.")?;
        }
        if let Some(to) = self.pipe_to {
            writeln!(f, "Pipe Output to Command# {to}")?;
        }
        Ok(())
    }
}

/// Ordered commands produced by one parse of one input line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSequence {
    commands: Vec<Command>,
}

impl CommandSequence {
    pub(crate) fn from_commands(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[Command] {
        &self.commands
    }

    /// Index of the last member of the pipeline run starting at `start`.
    ///
    /// Follows `pipe_to` links while each one points at the immediately
    /// following command. A link past the end of the sequence (from a
    /// trailing `|`) ends the run. Returns `start` for a standalone command.
    pub fn pipeline_end(&self, start: usize) -> usize {
        let mut end = start;
        while let Some(next) = self.get(end).and_then(Command::pipe_target) {
            if next != end + 1 || next >= self.commands.len() {
                break;
            }
            end = next;
        }
        end
    }
}

impl Index<usize> for CommandSequence {
    type Output = Command;

    fn index(&self, index: usize) -> &Command {
        &self.commands[index]
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a Command;
    type IntoIter = slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(name: &str, pipe_to: Option<usize>) -> Command {
        Command {
            argv: vec![name.to_string()],
            pipe_to,
            ..Command::default()
        }
    }

    #[test]
    fn default_command_has_single_empty_arg() {
        let c = Command::default();
        assert_eq!(c.argv, vec![String::new()]);
        assert_eq!(c.name(), "");
        assert!(c.is_empty());
        assert!(c.args().is_empty());
    }

    #[test]
    fn dropping_empty_commands_twice_over_is_harmless() {
        let seq = CommandSequence::from_commands(vec![Command::default(), Command::default()]);
        let copy = seq.clone();
        drop(seq);
        drop(copy);

        let hollow = Command {
            argv: Vec::new(),
            ..Command::default()
        };
        assert_eq!(hollow.name(), "");
        assert!(hollow.args().is_empty());
    }

    #[test]
    fn pipeline_end_follows_chain() {
        let seq = CommandSequence::from_commands(vec![
            cmd("a", Some(2)),
            cmd("b", Some(3)),
            cmd("c", None),
            cmd("d", None),
        ]);
        assert_eq!(seq.pipeline_end(0), 2);
        assert_eq!(seq.pipeline_end(1), 2);
        assert_eq!(seq.pipeline_end(3), 3);
    }

    #[test]
    fn pipeline_end_stops_at_out_of_range_target() {
        let seq = CommandSequence::from_commands(vec![cmd("ls", Some(2))]);
        assert_eq!(seq.pipeline_end(0), 0);
    }

    #[test]
    fn display_is_human_readable() {
        let c = Command {
            argv: vec!["sort".into(), "-r".into()],
            redirect_in: Some("in.txt".into()),
            pipe_to: Some(2),
            ..Command::default()
        };
        let text = c.to_string();
        assert!(text.contains("Program : sort"));
        assert!(text.contains("Parameters : -r"));
        assert!(text.contains("Redirect Input from in.txt."));
        assert!(text.contains("Pipe Output to Command# 2"));
    }

    #[test]
    fn dump_lists_every_argument() {
        let c = Command {
            argv: vec!["ls".into(), "-l".into()],
            ..Command::default()
        };
        let text = c.dump(0);
        assert!(text.starts_with("---- Command(0) ----\nls\n"));
        assert!(text.contains("+-> argv[1] = -l"));
        assert!(text.contains("Pipe to Command = 0"));
    }
}
