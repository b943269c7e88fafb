use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};
use std::io::{self, BufRead, IsTerminal, Write};

/// Line-oriented terminal access shared by the chat loop and setup.
pub trait Console {
    /// Next line without its trailing newline; `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Like `read_line`, but nothing typed is echoed when on a terminal.
    fn read_secret(&mut self) -> io::Result<Option<String>>;

    fn print(&mut self, text: &str) -> io::Result<()>;

    fn clear_screen(&mut self) -> io::Result<()>;

    fn println(&mut self, text: &str) -> io::Result<()> {
        self.print(text)?;
        self.print("\n")
    }
}

#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_concealed() -> io::Result<Option<String>> {
    let _raw_mode = RawModeGuard::enable()?;
    let mut secret = String::new();

    loop {
        match event::read()? {
            Event::Key(key) => {
                if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    continue;
                }
                match key.code {
                    KeyCode::Enter => return Ok(Some(secret)),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Err(io::Error::new(
                            io::ErrorKind::Interrupted,
                            "input interrupted",
                        ));
                    }
                    KeyCode::Char('d')
                        if key.modifiers.contains(KeyModifiers::CONTROL) && secret.is_empty() =>
                    {
                        return Ok(None);
                    }
                    KeyCode::Backspace => {
                        secret.pop();
                    }
                    KeyCode::Char(c) => secret.push(c),
                    _ => {}
                }
            }
            Event::Paste(pasted) => secret.push_str(pasted.trim_end_matches(['\r', '\n'])),
            _ => {}
        }
    }
}

/// Reads one line; bytes that are not valid UTF-8 become U+FFFD.
fn read_lossy_line(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut bytes = Vec::new();
    if reader.read_until(b'\n', &mut bytes)? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&bytes);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

impl Console for TerminalConsole {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_lossy_line(&mut io::stdin().lock())
    }

    fn read_secret(&mut self) -> io::Result<Option<String>> {
        if !io::stdin().is_terminal() {
            return self.read_line();
        }
        io::stdout().flush()?;
        let secret = read_concealed();
        self.print("\n")?;
        secret
    }

    fn print(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))
    }
}
