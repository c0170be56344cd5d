// Interactive roster picking.
//
// The human sees the catalogue's type names numbered from 1, picks one, then
// sees that type's creatures numbered from 1 and picks three of them. Every
// answer is a 1-based number checked against the list it was chosen from; an
// out-of-range or non-numeric answer ends the flow with
// `ClientError::InvalidChoice` (no re-prompt). Picking the same creature more
// than once is allowed and kept as-is.
//
// The pure helpers (`parse_choice`, `select_type`, `build_selection`) carry
// the rules. `Prompter` wraps them in prompt/answer I/O and is generic over
// its input and output so tests can script a session.

use std::io::{BufRead, Write};

use pokeparty_protocol::{Catalogue, ROSTER_SIZE, RosterSelection, TypeGroup};

use crate::client::ClientError;

/// Parse a 1-based menu answer and check it against `1..=max`.
pub fn parse_choice(input: &str, max: usize) -> Result<usize, ClientError> {
    let invalid = || ClientError::InvalidChoice {
        input: input.trim().to_owned(),
        max,
    };
    let n: usize = input.trim().parse().map_err(|_| invalid())?;
    if (1..=max).contains(&n) { Ok(n) } else { Err(invalid()) }
}

/// The type group at menu position `choice`. An empty catalogue has no valid
/// position, so every answer is `InvalidChoice` with `max: 0`.
pub fn select_type<'c>(catalogue: &'c Catalogue, choice: &str) -> Result<&'c TypeGroup, ClientError> {
    let position = parse_choice(choice, catalogue.type_count())?;
    catalogue
        .group_at(position)
        .ok_or_else(|| ClientError::InvalidChoice {
            input: choice.trim().to_owned(),
            max: catalogue.type_count(),
        })
}

/// Assemble a roster for `name` from menu answers against `group`'s members.
pub fn build_selection(
    name: &str,
    group: &TypeGroup,
    picks: &[&str],
) -> Result<RosterSelection, ClientError> {
    let count = group.member_count();
    if count == 0 {
        return Err(ClientError::NoMembers(group.name.clone()));
    }
    let selected = picks
        .iter()
        .map(|answer| {
            let position = parse_choice(answer, count)?;
            group
                .member_at(position)
                .cloned()
                .ok_or_else(|| ClientError::InvalidChoice {
                    input: answer.trim().to_owned(),
                    max: count,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RosterSelection {
        name: name.trim().to_owned(),
        type_name: group.name.clone(),
        selected,
    })
}

/// Line-oriented prompts over any input/output pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one answer line. End of input reads as an
    /// empty answer.
    pub fn ask(&mut self, prompt: &str) -> Result<String, ClientError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }

    pub fn ask_name(&mut self) -> Result<String, ClientError> {
        Ok(self.ask("Enter your name: ")?.trim().to_owned())
    }

    /// Show the numbered type list and return the chosen group.
    pub fn choose_type<'c>(&mut self, catalogue: &'c Catalogue) -> Result<&'c TypeGroup, ClientError> {
        writeln!(self.output, "Available types:")?;
        for (i, name) in catalogue.type_names().iter().enumerate() {
            writeln!(self.output, "{}. {name}", i + 1)?;
        }
        let answer = self.ask("Enter the number of your chosen type: ")?;
        let group = select_type(catalogue, &answer)?;
        writeln!(self.output, "You have chosen: {}", group.name)?;
        Ok(group)
    }

    /// Show `group`'s members and collect `ROSTER_SIZE` picks.
    pub fn choose_roster(
        &mut self,
        name: &str,
        group: &TypeGroup,
    ) -> Result<RosterSelection, ClientError> {
        if group.member_count() == 0 {
            return Err(ClientError::NoMembers(group.name.clone()));
        }
        writeln!(self.output, "Available creatures:")?;
        for (i, creature) in group.members().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, creature.name)?;
        }

        // Validate each answer as it arrives so a bad one stops the flow
        // before the remaining prompts.
        let mut answers = Vec::with_capacity(ROSTER_SIZE);
        for slot in 1..=ROSTER_SIZE {
            let answer = self.ask(&format!("Enter the number of creature {slot} of {ROSTER_SIZE}: "))?;
            parse_choice(&answer, group.member_count())?;
            answers.push(answer);
        }
        let answers: Vec<&str> = answers.iter().map(String::as_str).collect();
        build_selection(name, group, &answers)
    }

    /// Ask whether to start a game; on an answer containing "yes" (case
    /// sensitive), ask for the name to send.
    pub fn ask_start_game(&mut self) -> Result<Option<String>, ClientError> {
        let answer = self.ask("Do you want to start your game? ")?;
        if !answer.contains("yes") {
            return Ok(None);
        }
        Ok(Some(self.ask("Please enter your name: ")?.trim().to_owned()))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
