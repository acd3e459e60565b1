//! Interactive credential entry
//!
//! On a terminal, input is read in raw mode so the password is never
//! echoed and Ctrl+C at either prompt surfaces as
//! [`io::ErrorKind::Interrupted`] instead of killing the process. Piped
//! input falls back to plain line reads.

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use lastseen_agent::CredentialPrompt;
use lastseen_core::Credential;

use crate::output::print_warning;

const WELCOME: &str = "Welcome to LastSeen\n\n\
Login to your account and we'll grab a token to make this seamless.\n";

const PASSWORD_NOTICE: &str = "We'll use this ONCE to grab a token you can revoke at any time";

/// Prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn prompt(&mut self, attempt: u32) -> io::Result<Credential> {
        if attempt == 1 {
            println!("{}", WELCOME);
        }
        let email = read_field("Email Address: ", false)?;
        println!("{}", PASSWORD_NOTICE);
        let password = read_field("Password: ", true)?;
        Ok(Credential::new(email.trim(), password))
    }

    fn rejected(&mut self, message: &str) {
        println!();
        print_warning(message);
        println!();
    }
}

/// True when the error means the user pressed Ctrl+C
pub fn is_interrupt(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}

fn read_field(label: &str, masked: bool) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before a value was entered",
            ));
        }
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    terminal::enable_raw_mode()?;
    let result = read_raw_line(&mut stdout, masked);
    let _ = terminal::disable_raw_mode();
    writeln!(stdout)?;
    result
}

fn read_raw_line(out: &mut impl Write, masked: bool) -> io::Result<String> {
    let mut buf = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match apply_key(&mut buf, key)? {
            Edit::Done => return Ok(buf),
            Edit::Typed(c) if !masked => write!(out, "{}", c)?,
            Edit::Erased if !masked => write!(out, "\x08 \x08")?,
            _ => {}
        }
        out.flush()?;
    }
}

#[derive(Debug, PartialEq)]
enum Edit {
    Typed(char),
    Erased,
    Done,
    Ignored,
}

fn apply_key(buf: &mut String, key: KeyEvent) -> io::Result<Edit> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "interrupted at prompt",
        )),
        KeyCode::Char('d') if ctrl && buf.is_empty() => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before a value was entered",
        )),
        KeyCode::Enter => Ok(Edit::Done),
        KeyCode::Backspace => Ok(match buf.pop() {
            Some(_) => Edit::Erased,
            None => Edit::Ignored,
        }),
        KeyCode::Char(c) if !ctrl => {
            buf.push(c);
            Ok(Edit::Typed(c))
        }
        _ => Ok(Edit::Ignored),
    }
}
