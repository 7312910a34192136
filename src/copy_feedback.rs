use crate::address::Address;
use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use std::{
    io::{
        self,
        Stdout,
        Write,
    },
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{
        self,
        Instant,
    },
};
use tracing::{
    debug,
    warn,
};

pub const COPY_FEEDBACK_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("failed to write to the clipboard: {0}")]
    Io(#[from] io::Error),
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Copies through the terminal with an OSC 52 escape sequence.
pub struct Osc52Clipboard<W = Stdout> {
    out: W,
}

impl Osc52Clipboard<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let payload = STANDARD.encode(text.as_bytes());
        write!(self.out, "\u{1b}]52;c;{payload}\u{7}")?;
        self.out.flush()?;
        Ok(())
    }
}

/// The address currently shown as "copied" and when that indicator goes away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyMark {
    pub address: Address,
    pub expires_at: Instant,
}

pub struct CopyFeedbackTimer<C> {
    clipboard: C,
    duration: Duration,
    state: Arc<watch::Sender<Option<CopyMark>>>,
    expiry: Option<JoinHandle<()>>,
}

impl<C: Clipboard> CopyFeedbackTimer<C> {
    pub fn new(clipboard: C, duration: Duration) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            clipboard,
            duration,
            state: Arc::new(state),
            expiry: None,
        }
    }

    /// Copies `address` and highlights it for the configured duration, replacing any
    /// earlier highlight. A failed clipboard write leaves the highlight untouched.
    pub fn mark_copied(&mut self, address: &Address) -> Result<(), ClipboardError> {
        if let Err(err) = self.clipboard.write_text(address.as_str()) {
            warn!(%address, %err, "copy to clipboard failed");
            return Err(err);
        }
        if let Some(previous) = self.expiry.take() {
            previous.abort();
        }

        let mark = CopyMark {
            address: address.clone(),
            expires_at: Instant::now() + self.duration,
        };
        debug!(%address, "address copied");
        self.state.send_replace(Some(mark.clone()));

        let state = Arc::clone(&self.state);
        self.expiry = Some(tokio::spawn(async move {
            time::sleep_until(mark.expires_at).await;
            state.send_if_modified(|current| {
                if current.as_ref() != Some(&mark) {
                    return false;
                }
                *current = None;
                true
            });
        }));
        Ok(())
    }

    pub fn highlighted(&self) -> Option<Address> {
        self.state.borrow().as_ref().map(|mark| mark.address.clone())
    }

    pub fn is_highlighted(&self, address: &Address) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|mark| &mark.address == address)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CopyMark>> {
        self.state.subscribe()
    }
}

impl<C> Drop for CopyFeedbackTimer<C> {
    fn drop(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct FakeClipboard {
        written: Arc<Mutex<Vec<String>>>,
        broken: bool,
    }

    impl Clipboard for FakeClipboard {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed").into());
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn addr(last: char) -> Address {
        Address::new(format!("0x{}", last.to_string().repeat(40)))
    }

    #[tokio::test(start_paused = true)]
    async fn mark_copied__duration_elapses__highlight_cleared() {
        // given
        let clipboard = FakeClipboard::default();
        let mut timer = CopyFeedbackTimer::new(clipboard.clone(), COPY_FEEDBACK_DURATION);

        // when
        timer.mark_copied(&addr('a')).unwrap();

        // then
        assert!(timer.is_highlighted(&addr('a')));
        assert_eq!(*clipboard.written.lock().unwrap(), vec![addr('a').to_string()]);
        time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(timer.highlighted(), Some(addr('a')));
        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(timer.highlighted(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_copied__second_address__only_latest_highlighted() {
        // given
        let mut timer = CopyFeedbackTimer::new(FakeClipboard::default(), COPY_FEEDBACK_DURATION);

        // when
        timer.mark_copied(&addr('a')).unwrap();
        timer.mark_copied(&addr('b')).unwrap();

        // then
        assert!(!timer.is_highlighted(&addr('a')));
        assert!(timer.is_highlighted(&addr('b')));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_copied__superseded__earlier_expiry_does_not_clear() {
        // given
        let mut timer = CopyFeedbackTimer::new(FakeClipboard::default(), COPY_FEEDBACK_DURATION);
        timer.mark_copied(&addr('a')).unwrap();
        time::sleep(Duration::from_secs(1)).await;

        // when
        timer.mark_copied(&addr('b')).unwrap();
        time::sleep(Duration::from_millis(1500)).await;

        // then
        assert_eq!(timer.highlighted(), Some(addr('b')));
        time::sleep(Duration::from_millis(600)).await;
        assert_eq!(timer.highlighted(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_copied__same_address_again__expiry_restarts() {
        // given
        let mut timer = CopyFeedbackTimer::new(FakeClipboard::default(), COPY_FEEDBACK_DURATION);
        timer.mark_copied(&addr('a')).unwrap();
        time::sleep(Duration::from_millis(1500)).await;

        // when
        timer.mark_copied(&addr('a')).unwrap();
        time::sleep(Duration::from_millis(1000)).await;

        // then
        assert!(timer.is_highlighted(&addr('a')));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_copied__clipboard_fails__state_unchanged() {
        // given
        let mut timer = CopyFeedbackTimer::new(
            FakeClipboard {
                broken: true,
                ..FakeClipboard::default()
            },
            COPY_FEEDBACK_DURATION,
        );
        let updates = timer.subscribe();

        // when
        let actual = timer.mark_copied(&addr('a'));

        // then
        assert!(actual.is_err());
        assert_eq!(timer.highlighted(), None);
        assert!(!updates.has_changed().unwrap());
    }

    #[test]
    fn osc52_clipboard__write_text__emits_base64_escape_sequence() {
        // given
        let mut clipboard = Osc52Clipboard::new(Vec::new());

        // when
        clipboard.write_text("0xabc").unwrap();

        // then
        assert_eq!(clipboard.out, b"\x1b]52;c;MHhhYmM=\x07".to_vec());
    }
}
