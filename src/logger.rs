use std::cell::RefCell;
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event types that determine which receivers should log the message
/// Listed from the most detailed to the most condensed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// Raw auction data (every bid of every round, CSV)
    Auction,
    /// One line per round outcome (winner, price, click, voids)
    Round,
    /// Simulation-level data (setup and final statistics of one run)
    Simulation,
    /// Scenario-level data (validations of a scenario run)
    Scenario,
    /// Validation results (pass/fail summary lines)
    Validation,
}

impl LogEvent {
    /// This event together with every more condensed event above it
    /// Warnings and errors are delivered along this chain
    fn with_upward(self) -> &'static [LogEvent] {
        static CHAIN: [LogEvent; 5] = [
            LogEvent::Auction,
            LogEvent::Round,
            LogEvent::Simulation,
            LogEvent::Scenario,
            LogEvent::Validation,
        ];
        let start = CHAIN.iter().position(|e| *e == self).unwrap_or(0);
        &CHAIN[start..]
    }
}

/// Trait for log receivers that can receive log messages
pub trait LogReceiver {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    /// Write a string to this receiver
    fn write(&mut self, s: &str) -> io::Result<()>;

    /// Flush this receiver
    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    enabled_events: Vec<LogEvent>,
}

impl ConsoleReceiver {
    /// Returns a boxed receiver ready to be added to a logger
    pub fn new(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(Self { enabled_events })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        print!("{}", s);
        io::stdout().flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// File log receiver (writes to a file)
pub struct FileReceiver {
    file: File,
    enabled_events: Vec<LogEvent>,
}

impl FileReceiver {
    /// Create a receiver writing to `path`, truncating it and creating parent directories
    pub fn new(path: &Path, enabled_events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiver>> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(Self { file, enabled_events }))
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        write!(self.file, "{}", s)?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// In-memory receiver, the buffer is shared so callers can inspect what was logged
pub struct MemoryReceiver {
    buffer: Rc<RefCell<String>>,
    enabled_events: Vec<LogEvent>,
}

impl MemoryReceiver {
    /// Returns the boxed receiver and a handle to its buffer
    pub fn new(enabled_events: Vec<LogEvent>) -> (Box<dyn LogReceiver>, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let receiver = Box::new(Self { buffer: Rc::clone(&buffer), enabled_events });
        (receiver, buffer)
    }
}

impl LogReceiver for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.buffer.borrow_mut().push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unique identifier for a receiver
pub type ReceiverId = usize;

/// Global counter for generating unique receiver IDs
static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Main logger that manages multiple receivers
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    /// Create a new logger with no receivers
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    /// Remove a receiver by its ID
    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// True if at least one receiver listens to `event`
    /// Lets callers skip building expensive messages nobody will read
    pub fn is_enabled(&self, event: LogEvent) -> bool {
        self.receivers.iter().any(|(_, receiver)| receiver.should_log(event))
    }

    /// Write a message with a specific log event type
    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    /// Write a message with newline
    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// Deliver a prefixed line to every receiver listening to `event` or anything above it
    /// Each receiver gets the line once, even if it listens to several of those events
    fn log_upward(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        let events = event.with_upward();
        let formatted_message = format!("{} {}\n", prefix, message);
        for (_, receiver) in &mut self.receivers {
            if events.iter().any(|&evt| receiver.should_log(evt)) {
                receiver.write(&formatted_message)?;
            }
        }
        Ok(())
    }

    /// Write an "ERROR" line to `event` and all more condensed events
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_upward(event, "ERROR", message)
    }

    /// Write a "WARNING" line to `event` and all more condensed events
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_upward(event, "WARNING", message)
    }

    /// Flush all receivers
    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize a string to be used as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Macro to log a formatted string (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Like logln!, prefixed with "ERROR" and propagated to all more condensed events
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Like logln!, prefixed with "WARNING" and propagated to all more condensed events
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test name"), "test_name");
        assert_eq!(sanitize_filename("test/name"), "test_name");
        assert_eq!(sanitize_filename("test:name"), "test_name");
    }

    #[test]
    fn test_plain_log_goes_only_to_matching_receivers() {
        let mut logger = Logger::new();
        let (round_receiver, round_buffer) = MemoryReceiver::new(vec![LogEvent::Round]);
        let (scenario_receiver, scenario_buffer) = MemoryReceiver::new(vec![LogEvent::Scenario]);
        logger.add_receiver(round_receiver);
        logger.add_receiver(scenario_receiver);

        logln!(logger, LogEvent::Round, "round {}", 1);

        assert_eq!(round_buffer.borrow().as_str(), "round 1\n");
        assert!(scenario_buffer.borrow().is_empty());
    }

    #[test]
    fn test_warnings_propagate_upward_once() {
        let mut logger = Logger::new();
        // Listens to two events on the chain, must still get the line only once
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Simulation, LogEvent::Validation]);
        let (auction_receiver, auction_buffer) = MemoryReceiver::new(vec![LogEvent::Auction]);
        logger.add_receiver(receiver);
        logger.add_receiver(auction_receiver);

        warnln!(logger, LogEvent::Round, "bidder {} disqualified", 3);

        assert_eq!(buffer.borrow().as_str(), "WARNING bidder 3 disqualified\n");
        // Auction is below Round, so it must not see the warning
        assert!(auction_buffer.borrow().is_empty());
    }

    #[test]
    fn test_remove_receiver() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Validation]);
        let id = logger.add_receiver(receiver);
        assert!(logger.is_enabled(LogEvent::Validation));

        logger.remove_receiver(id);
        logln!(logger, LogEvent::Validation, "dropped");

        assert!(!logger.is_enabled(LogEvent::Validation));
        assert!(buffer.borrow().is_empty());
    }
}
