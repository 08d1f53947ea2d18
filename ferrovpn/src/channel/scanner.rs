//! Byte-at-a-time prompt detection for one output stream.

use super::prompts::PromptTable;
use super::transcript::Transcript;

/// What a single appended byte caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// No marker ends here.
    Pending,

    /// These prompts (match-order indices) just matched; send their replies.
    Reply(Vec<usize>),

    /// The completion marker just matched; close input and stop reading.
    Complete,
}

/// Feeds one stream's bytes through a transcript window and reports matches.
///
/// Matching is re-evaluated after every byte, so each transcript state that
/// ends with a marker fires exactly once. The completion marker takes
/// precedence over prompt markers ending at the same byte.
#[derive(Debug)]
pub struct PromptScanner {
    table: PromptTable,
    transcript: Transcript,
    complete: bool,
}

impl PromptScanner {
    pub fn new(table: PromptTable) -> Self {
        let transcript = Transcript::new(table.window_len());
        Self {
            table,
            transcript,
            complete: false,
        }
    }

    /// Append one byte and report any markers it completes.
    ///
    /// After completion, further bytes are ignored and `Complete` is
    /// returned again.
    pub fn feed(&mut self, byte: u8) -> ScanEvent {
        if self.complete {
            return ScanEvent::Complete;
        }

        self.transcript.push(byte);
        let tail = self.transcript.tail();

        if self.table.is_complete(tail) {
            self.complete = true;
            return ScanEvent::Complete;
        }

        let hits: Vec<usize> = self.table.matches(tail).collect();
        if hits.is_empty() {
            ScanEvent::Pending
        } else {
            ScanEvent::Reply(hits)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn table(&self) -> &PromptTable {
        &self.table
    }

    /// Bytes consumed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.transcript.total_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn table() -> PromptTable {
        PromptTable::builder("Data Base Updated")
            .secret_prompt("phrase:", SecretString::from("secret123".to_string()))
            .prompt("removal:", "yes")
            .build()
            .unwrap()
    }

    fn feed_all(scanner: &mut PromptScanner, data: &[u8]) -> Vec<(usize, ScanEvent)> {
        data.iter()
            .enumerate()
            .map(|(i, &b)| (i + 1, scanner.feed(b)))
            .filter(|(_, e)| *e != ScanEvent::Pending)
            .collect()
    }

    #[test]
    fn test_passphrase_prompt_fires_once_on_last_byte() {
        let mut scanner = PromptScanner::new(table());
        let input = b"Enter pass phrase:";
        let events = feed_all(&mut scanner, input);

        assert_eq!(events.len(), 1);
        let (position, event) = &events[0];
        assert_eq!(*position, input.len());

        let ScanEvent::Reply(hits) = event else {
            panic!("expected a reply, got {:?}", event);
        };
        assert_eq!(hits.len(), 1);
        let prompt = scanner.table().get(hits[0]).unwrap();
        assert_eq!(prompt.reply().expose(), "secret123");
    }

    #[test]
    fn test_no_refire_without_new_suffix() {
        let mut scanner = PromptScanner::new(table());
        feed_all(&mut scanner, b"Confirm removal:");
        let events = feed_all(&mut scanner, b" \nworking...");
        assert!(events.is_empty());

        // Appearing again is a new transcript state and fires again
        let events = feed_all(&mut scanner, b"\nConfirm removal:");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_completion_wins_and_stops() {
        let overlapping = PromptTable::builder("Updated")
            .prompt("Updated", "never")
            .prompt("ted", "never")
            .build()
            .unwrap();
        let mut scanner = PromptScanner::new(overlapping);

        let events = feed_all(&mut scanner, b"Data Base Updated");
        assert_eq!(events, vec![(17, ScanEvent::Complete)]);
        assert!(scanner.is_complete());

        // Bytes after completion are not processed
        assert_eq!(scanner.feed(b'x'), ScanEvent::Complete);
        assert_eq!(scanner.bytes_seen(), 17);
    }

    #[test]
    fn test_long_output_keeps_matching() {
        let mut scanner = PromptScanner::new(table());
        let mut data = vec![b'.'; 100_000];
        data.extend_from_slice(b"Data Base Updated");
        let events = feed_all(&mut scanner, &data);
        assert_eq!(events, vec![(data.len(), ScanEvent::Complete)]);
    }
}
