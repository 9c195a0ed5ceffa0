//! Retry decisions and the operator questions behind them.
//!
//! [`decide`] only looks at the failure count and the account's policy.
//! When it says `Ask`, the question goes through a [`Prompt`]: the terminal,
//! or a headless stand-in that always picks the non-blocking answer.

use log::{info, warn};
use std::{
    cell::RefCell,
    io::{BufRead, BufReader, Write},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Skip,
    Exit,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyDecision {
    Skip,
    Exit,
    DropProxy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub auto_skip: bool,
}

impl RetryPolicy {
    /// Every account gets at least one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

pub fn decide(failures: u32, policy: RetryPolicy) -> Decision {
    if failures < policy.attempts() {
        Decision::Retry
    } else if policy.auto_skip {
        Decision::Skip
    } else {
        Decision::Ask
    }
}

/// `s`/`skip`, `e`/`exit`, anything else retries.
pub fn parse_exhausted_answer(answer: &str) -> Decision {
    match answer.trim().to_lowercase().as_str() {
        "s" | "skip" => Decision::Skip,
        "e" | "exit" => Decision::Exit,
        _ => Decision::Retry,
    }
}

/// `s`/`skip`, `e`/`exit`, anything else drops the proxy.
pub fn parse_proxy_answer(answer: &str) -> ProxyDecision {
    match answer.trim().to_lowercase().as_str() {
        "s" | "skip" => ProxyDecision::Skip,
        "e" | "exit" => ProxyDecision::Exit,
        _ => ProxyDecision::DropProxy,
    }
}

pub trait Prompt {
    fn confirm_resume(&self, short_key: &str) -> bool;
    /// Only ever returns `Retry`, `Skip` or `Exit`.
    fn on_exhausted(&self, short_key: &str) -> Decision;
    fn on_dead_proxy(&self, short_key: &str) -> ProxyDecision;
    /// Blocks until the operator says the transaction went through.
    /// `false` means nobody is there to ask.
    fn wait_for_inclusion(&self, label: &str) -> bool;
}

/// Questions on stdout, answers from stdin unless another input is given.
pub struct Console {
    input: RefCell<Box<dyn BufRead>>,
}

impl Default for Console {
    fn default() -> Self {
        Console::with_input(Box::new(BufReader::new(std::io::stdin())))
    }
}

impl Console {
    pub fn with_input(input: Box<dyn BufRead>) -> Self {
        Console {
            input: RefCell::new(input),
        }
    }

    /// `None` once the input is closed or unreadable.
    fn ask(&self, question: &str) -> Option<String> {
        print!("{}", question);
        let _ = std::io::stdout().flush();
        read_answer(&mut *self.input.borrow_mut())
    }
}

fn read_answer<R: BufRead + ?Sized>(input: &mut R) -> Option<String> {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) => {
            warn!("[Main] No answer, stdin is closed");
            None
        }
        Ok(_) => Some(answer.trim().to_string()),
        Err(e) => {
            warn!("[Main] Failed to read answer: {}", e);
            None
        }
    }
}

impl Prompt for Console {
    fn confirm_resume(&self, short_key: &str) -> bool {
        self.ask(&format!(
            "[Main] Continue account with private_key {}? [y/n]: ",
            short_key
        ))
        .map_or(false, |answer| answer.eq_ignore_ascii_case("y"))
    }

    fn on_exhausted(&self, short_key: &str) -> Decision {
        match self.ask("[Main] What to do? (possible options: [s]kip, [e]xit, [r]etry): ") {
            Some(answer) => parse_exhausted_answer(&answer),
            None => Headless::default().on_exhausted(short_key),
        }
    }

    fn on_dead_proxy(&self, short_key: &str) -> ProxyDecision {
        match self.ask("[Main] What to do? (possible options: [s]kip, [e]xit, [d]elete (deletes proxy)): ") {
            Some(answer) => parse_proxy_answer(&answer),
            None => Headless::default().on_dead_proxy(short_key),
        }
    }

    fn wait_for_inclusion(&self, label: &str) -> bool {
        self.ask(&format!(
            "[{}] Failed to get transaction receipt. Press Enter when transaction will be processed",
            label
        ))
        .is_some()
    }
}

/// Unattended runs: never block, skip whatever needs a human.
#[derive(Debug, Default)]
pub struct Headless {
    pub resume: bool,
}

impl Prompt for Headless {
    fn confirm_resume(&self, short_key: &str) -> bool {
        if self.resume {
            info!("[Main] Resuming from account with private_key {}", short_key);
        }
        self.resume
    }

    fn on_exhausted(&self, _short_key: &str) -> Decision {
        Decision::Skip
    }

    fn on_dead_proxy(&self, _short_key: &str) -> ProxyDecision {
        ProxyDecision::Skip
    }

    fn wait_for_inclusion(&self, _label: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_retries_until_attempts_are_used_up() {
        let policy = RetryPolicy {
            max_retries: 3,
            auto_skip: false,
        };
        assert_eq!(decide(0, policy), Decision::Retry);
        assert_eq!(decide(2, policy), Decision::Retry);
        assert_eq!(decide(3, policy), Decision::Ask);
        let auto = RetryPolicy {
            auto_skip: true,
            ..policy
        };
        assert_eq!(decide(3, auto), Decision::Skip);
    }

    #[test]
    fn zero_retries_still_means_one_attempt() {
        let policy = RetryPolicy {
            max_retries: 0,
            auto_skip: true,
        };
        assert_eq!(policy.attempts(), 1);
        assert_eq!(decide(0, policy), Decision::Retry);
        assert_eq!(decide(1, policy), Decision::Skip);
    }

    #[test]
    fn answers_map_to_decisions() {
        assert_eq!(parse_exhausted_answer("S"), Decision::Skip);
        assert_eq!(parse_exhausted_answer(" exit\n"), Decision::Exit);
        assert_eq!(parse_exhausted_answer(""), Decision::Retry);
        assert_eq!(parse_proxy_answer("skip"), ProxyDecision::Skip);
        assert_eq!(parse_proxy_answer("e"), ProxyDecision::Exit);
        assert_eq!(parse_proxy_answer("d"), ProxyDecision::DropProxy);
    }

    #[test]
    fn closed_input_reads_as_no_answer() {
        assert_eq!(read_answer(&mut std::io::empty()), None);
        assert_eq!(read_answer(&mut " Skip \n".as_bytes()), Some("Skip".to_string()));
        assert_eq!(read_answer(&mut "\n".as_bytes()), Some(String::new()));
    }

    #[test]
    fn closed_console_answers_like_headless() {
        let console = Console::with_input(Box::new(std::io::empty()));
        assert!(!console.confirm_resume("k"));
        assert_eq!(console.on_exhausted("k"), Decision::Skip);
        assert_eq!(console.on_dead_proxy("k"), ProxyDecision::Skip);
        assert!(!console.wait_for_inclusion("Scroll Canvas"));
    }

    #[test]
    fn console_reads_one_answer_per_question() {
        let console = Console::with_input(Box::new("y\nr\nd\n\n".as_bytes()));
        assert!(console.confirm_resume("k"));
        assert_eq!(console.on_exhausted("k"), Decision::Retry);
        assert_eq!(console.on_dead_proxy("k"), ProxyDecision::DropProxy);
        assert!(console.wait_for_inclusion("Scroll Canvas"));
        assert_eq!(console.on_exhausted("k"), Decision::Skip);
    }

    #[test]
    fn headless_never_blocks() {
        let prompt = Headless::default();
        assert!(!prompt.confirm_resume("k"));
        assert!(Headless { resume: true }.confirm_resume("k"));
        assert_eq!(prompt.on_exhausted("k"), Decision::Skip);
        assert_eq!(prompt.on_dead_proxy("k"), ProxyDecision::Skip);
        assert!(!prompt.wait_for_inclusion("Scroll Canvas"));
    }
}
