use crate::error::Result;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Key(char),
    /// Nothing arrived within the timeout.
    Idle,
    /// The source is exhausted.
    Closed,
}

/// Interactive, character-at-a-time text source.
pub trait KeySource {
    fn poll_key(&mut self, timeout: Duration) -> Result<KeyEvent>;
}

/// Replays a fixed script of events, then reports `Closed`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    events: std::collections::VecDeque<KeyEvent>,
}

impl ScriptedKeys {
    pub fn new<I: IntoIterator<Item = KeyEvent>>(events: I) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self, _timeout: Duration) -> Result<KeyEvent> {
        Ok(self.events.pop_front().unwrap_or(KeyEvent::Closed))
    }
}

/// Words from the command line, sent as one line.
pub fn words_to_text<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| w.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(unix)]
pub use keyboard::Keyboard;

#[cfg(unix)]
mod keyboard {
    use super::{KeyEvent, KeySource};
    use crate::error::Result;
    use std::io;
    use std::time::Duration;

    /// Standard input, switched to raw mode when it is a terminal.
    /// The previous terminal settings come back on drop.
    pub struct Keyboard {
        saved: Option<libc::termios>,
    }

    impl Keyboard {
        pub fn open() -> Result<Self> {
            let fd = libc::STDIN_FILENO;
            // SAFETY: isatty only inspects the descriptor.
            if unsafe { libc::isatty(fd) } != 1 {
                return Ok(Self { saved: None });
            }

            // SAFETY: termios is plain data and tcgetattr fully initialises it on success.
            let mut saved: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
                return Err(io::Error::last_os_error().into());
            }

            let mut raw = saved;
            raw.c_iflag = 0;
            raw.c_oflag &= !libc::OPOST;
            raw.c_lflag &= !(libc::IEXTEN | libc::ISIG | libc::ICANON | libc::ECHO);
            raw.c_cflag &= !(libc::CSIZE | libc::PARENB);
            raw.c_cflag |= libc::CS8;
            raw.c_cc[libc::VMIN] = 1;
            raw.c_cc[libc::VTIME] = 1;

            // SAFETY: raw is a valid termios derived from the current settings.
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            log::debug!("terminal switched to raw mode");

            Ok(Self { saved: Some(saved) })
        }
    }

    impl KeySource for Keyboard {
        fn poll_key(&mut self, timeout: Duration) -> Result<KeyEvent> {
            let mut fds = libc::pollfd {
                fd: libc::STDIN_FILENO,
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

            // SAFETY: one valid pollfd for the duration of the call.
            let ready = unsafe { libc::poll(&mut fds, 1, millis) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(KeyEvent::Idle);
                }
                return Err(err.into());
            }
            if ready == 0 {
                return Ok(KeyEvent::Idle);
            }

            let mut byte = 0u8;
            // SAFETY: reads at most one byte into a local.
            let n = unsafe { libc::read(libc::STDIN_FILENO, (&mut byte as *mut u8).cast(), 1) };
            match n {
                1 => Ok(KeyEvent::Key(char::from(byte))),
                0 => Ok(KeyEvent::Closed),
                _ => Err(io::Error::last_os_error().into()),
            }
        }
    }

    impl Drop for Keyboard {
        fn drop(&mut self) {
            if let Some(saved) = self.saved.take() {
                // SAFETY: restores settings previously read from the same descriptor.
                unsafe {
                    libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &saved);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_keys_close_when_empty() {
        let mut keys = ScriptedKeys::new([KeyEvent::Key('a'), KeyEvent::Idle]);
        let timeout = Duration::from_millis(100);
        assert_eq!(keys.poll_key(timeout).unwrap(), KeyEvent::Key('a'));
        assert_eq!(keys.poll_key(timeout).unwrap(), KeyEvent::Idle);
        assert_eq!(keys.poll_key(timeout).unwrap(), KeyEvent::Closed);
    }

    #[test]
    fn test_words_joined_with_spaces() {
        assert_eq!(words_to_text(&["CQ", "CQ", "DE", "N0CALL"]), "CQ CQ DE N0CALL");
        assert_eq!(words_to_text::<&str>(&[]), "");
    }
}
