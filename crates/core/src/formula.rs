//! The command-expression parser: turns one positional argument into a `Formula`.
//!
//! Grammar: `[KEY][#COLOR][+DELAY…][:DEP…][|ACTION…]=CMD`. The first unescaped
//! `=` splits the prefix from the command; an empty prefix means the whole
//! string is the command (`=echo a=b`).

use std::collections::HashSet;
use std::time::Duration;

use crate::color::Color;
use crate::error::ParseError;
use crate::time::parse_delay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum On {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dep {
    /// Empty target means "no process dependency, just the delays".
    pub target: String,
    pub on: On,
    pub after: Vec<Duration>,
}

impl Dep {
    pub fn after_sum(&self) -> Duration {
        self.after.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    End,
    Silent,
    Noout,
    Noerr,
}

impl Action {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "end" => Some(Action::End),
            "silent" => Some(Action::Silent),
            "noout" => Some(Action::Noout),
            "noerr" => Some(Action::Noerr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// `None` until the auto-naming pass in `assign_names` runs.
    pub name: Option<String>,
    pub color: Option<Color>,
    pub start_delays: Vec<Duration>,
    pub deps: Vec<Dep>,
    pub actions: HashSet<Action>,
    pub argv: Vec<String>,
}

impl Formula {
    pub fn start_delay_sum(&self) -> Duration {
        self.start_delays.iter().sum()
    }
}

/// Find the index of the first unescaped `=` in `s`, i.e. one whose preceding
/// run of backslashes has even length.
fn find_split(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            let mut backslashes = 0;
            let mut j = i;
            while j > 0 && bytes[j - 1] == b'\\' {
                backslashes += 1;
                j -= 1;
            }
            if backslashes % 2 == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Consume chars from `s[pos..]` matching `[A-Za-z0-9_]` and return the
/// substring plus the new position.
fn take_key(s: &str, pos: usize) -> (String, usize) {
    let bytes = s.as_bytes();
    let mut i = pos;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    (s[pos..i].to_string(), i)
}

/// Consume up to (but not including) the next occurrence of any byte in
/// `stop`, or the end of the string.
fn take_until(s: &str, pos: usize, stop: &[u8]) -> (String, usize) {
    let bytes = s.as_bytes();
    let mut i = pos;
    while i < bytes.len() && !stop.contains(&bytes[i]) {
        i += 1;
    }
    (s[pos..i].to_string(), i)
}

fn parse_dep_clause(s: &str, full_arg: &str) -> Result<Dep, ParseError> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let (target, new_i) = take_key(s, 0);
    i = new_i;

    let on = if i < bytes.len() && bytes[i] == b'&' {
        i += 1;
        On::Start
    } else {
        On::End
    };

    let mut after = Vec::new();
    while i < bytes.len() && bytes[i] == b'+' {
        let (term, new_i) = take_until(s, i + 1, b"+");
        after.push(parse_delay(&term).map_err(|_| ParseError::BadDep(full_arg.to_string()))?);
        i = new_i;
    }

    if i != bytes.len() {
        return Err(ParseError::BadDep(full_arg.to_string()));
    }

    Ok(Dep { target, on, after })
}

/// Parse one positional command-expression argument into a `Formula`.
pub fn parse_formula(arg: &str) -> Result<Formula, ParseError> {
    let split = find_split(arg).ok_or_else(|| ParseError::MissingCommand(arg.to_string()))?;
    let prefix = &arg[..split];
    let command = &arg[split + 1..];

    let mut name = None;
    let mut color = None;
    let mut start_delays = Vec::new();
    let mut deps = Vec::new();
    let mut actions = HashSet::new();

    let mut pos = 0;
    let bytes = prefix.as_bytes();

    // KEY?
    if pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        let (key, new_pos) = take_key(prefix, pos);
        if !key.is_empty() {
            name = Some(key);
        }
        pos = new_pos;
    }

    // #COLOR?
    if pos < bytes.len() && bytes[pos] == b'#' {
        let (spec, new_pos) = take_until(prefix, pos + 1, b"+:|");
        color = Some(Color::parse(&spec)?);
        pos = new_pos;
    }

    // (+DELAY)*
    while pos < bytes.len() && bytes[pos] == b'+' {
        let (term, new_pos) = take_until(prefix, pos + 1, b"+:|");
        start_delays.push(parse_delay(&term)?);
        pos = new_pos;
    }

    // (:DEP)*
    while pos < bytes.len() && bytes[pos] == b':' {
        let (clause, new_pos) = take_until(prefix, pos + 1, b":|");
        deps.push(parse_dep_clause(&clause, arg)?);
        pos = new_pos;
    }

    // (|ACTION)*
    while pos < bytes.len() && bytes[pos] == b'|' {
        let (action_name, new_pos) = take_until(prefix, pos + 1, b"|");
        let action = Action::from_name(&action_name)
            .ok_or_else(|| ParseError::UnknownAction(action_name.clone()))?;
        actions.insert(action);
        pos = new_pos;
    }

    if pos != bytes.len() {
        return Err(ParseError::BadSectionOrder(arg.to_string()));
    }

    if command.is_empty() {
        return Err(ParseError::EmptyCommand(arg.to_string()));
    }
    let argv =
        shell_words::split(command).map_err(|e| ParseError::Shlex(e.to_string()))?;
    if argv.is_empty() {
        return Err(ParseError::EmptyCommand(arg.to_string()));
    }

    Ok(Formula {
        name,
        color,
        start_delays,
        deps,
        actions,
        argv,
    })
}

/// Assign `A`, `B`, … to every Formula with no user-supplied name, in
/// argument order, skipping names already claimed by a user-assigned
/// Formula. Returns an error if two formulas end up with the same name.
pub fn assign_names(formulas: &mut [Formula]) -> Result<(), ParseError> {
    let taken: HashSet<String> = formulas.iter().filter_map(|f| f.name.clone()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    let mut next_letters = letter_sequence();
    for formula in formulas.iter_mut() {
        if formula.name.is_none() {
            loop {
                let candidate = next_letters.next().expect("letter sequence is infinite");
                if !taken.contains(&candidate) {
                    formula.name = Some(candidate);
                    break;
                }
            }
        }
        let name = formula.name.clone().unwrap();
        if !seen.insert(name.clone()) {
            return Err(ParseError::DuplicateName(name));
        }
    }
    Ok(())
}

/// `A`, `B`, …, `Z`, `AA`, `AB`, … (base-26, spreadsheet-column style).
fn letter_sequence() -> impl Iterator<Item = String> {
    (1u64..).map(|n| {
        let mut n = n;
        let mut chars = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            chars.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        chars.iter().rev().collect()
    })
}

/// Validate that every dep target names a known channel, and that the
/// dependency graph has no `END`-to-`END` cycle.
pub fn validate_deps(formulas: &[Formula]) -> Result<(), ParseError> {
    let names: HashSet<&str> = formulas
        .iter()
        .map(|f| f.name.as_deref().expect("names must be assigned"))
        .collect();

    for formula in formulas {
        for dep in &formula.deps {
            if !dep.target.is_empty() && !names.contains(dep.target.as_str()) {
                return Err(ParseError::UnknownDepTarget(dep.target.clone()));
            }
        }
    }

    // Build END->END edges: dependent -> target.
    let mut end_edges: std::collections::HashMap<&str, Vec<&str>> =
        std::collections::HashMap::new();
    for formula in formulas {
        let name = formula.name.as_deref().unwrap();
        for dep in &formula.deps {
            if dep.on == On::End && !dep.target.is_empty() {
                end_edges.entry(name).or_default().push(dep.target.as_str());
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let mut marks: std::collections::HashMap<&str, Mark> =
        names.iter().map(|n| (*n, Mark::Unvisited)).collect();

    fn visit<'a>(
        node: &'a str,
        end_edges: &std::collections::HashMap<&'a str, Vec<&'a str>>,
        marks: &mut std::collections::HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), ParseError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InStack) => {
                path.push(node);
                return Err(ParseError::DependencyCycle(path.join(" -> ")));
            }
            _ => {}
        }
        marks.insert(node, Mark::InStack);
        path.push(node);
        if let Some(targets) = end_edges.get(node) {
            for target in targets {
                visit(target, end_edges, marks, path)?;
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        Ok(())
    }

    for name in &names {
        let mut path = Vec::new();
        visit(name, &end_edges, &mut marks, &mut path)?;
    }

    Ok(())
}
