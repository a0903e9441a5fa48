//! Interactive console: menu parsing, confirmation prompts and the pure
//! transition functions behind them.
//!
//! All input interpretation is in free functions returning a [`Transition`]
//! so the re-prompt behavior is unit-testable without a terminal.

use std::io::Write;

use crate::store::FileFormat;

/// Outcome of interpreting one line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<T> {
    /// Input understood, carry on with the parsed value.
    Proceed(T),
    /// Input not understood, prompt again.
    Retry,
    /// Operator asked to stop.
    Abort,
}

/// The ten menu operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ExportCustomers,
    ExportCustomersBulk,
    ExportDirectoryRoles,
    ExportSecurityGroups,
    DownloadExistingRelationships,
    OneFlow,
    CreateRelationships,
    RefreshRelationships,
    CreateAssignments,
    RefreshAssignments,
}

pub const MENU: &str = "\
Download operations:
\t 1. Download eligible customers list
\t 2. Download eligible customers for very large list (compressed format)
\t 3. Download directory roles
\t 4. Download partner tenant's security group(s)
\t 5. Download existing GDAP relationship(s)

GDAP relationship operations:
\t 6. One flow generation
\t 7. Create GDAP relationship(s)
\t 8. Refresh GDAP relationship status

Provision security group operations:
\t 9. Create security group role assignment(s)
\t10. Refresh security group role assignment status

\t q. Quit";

/// Interpret a menu selection.
pub fn parse_menu_choice(input: &str) -> Transition<MenuAction> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
        return Transition::Abort;
    }
    match input.parse::<u8>() {
        Ok(1) => Transition::Proceed(MenuAction::ExportCustomers),
        Ok(2) => Transition::Proceed(MenuAction::ExportCustomersBulk),
        Ok(3) => Transition::Proceed(MenuAction::ExportDirectoryRoles),
        Ok(4) => Transition::Proceed(MenuAction::ExportSecurityGroups),
        Ok(5) => Transition::Proceed(MenuAction::DownloadExistingRelationships),
        Ok(6) => Transition::Proceed(MenuAction::OneFlow),
        Ok(7) => Transition::Proceed(MenuAction::CreateRelationships),
        Ok(8) => Transition::Proceed(MenuAction::RefreshRelationships),
        Ok(9) => Transition::Proceed(MenuAction::CreateAssignments),
        Ok(10) => Transition::Proceed(MenuAction::RefreshAssignments),
        _ => Transition::Retry,
    }
}

/// Interpret the session file format selection (1 = CSV, 2 = JSON).
pub fn parse_format_choice(input: &str) -> Transition<FileFormat> {
    match input.trim() {
        "1" => Transition::Proceed(FileFormat::Csv),
        "2" => Transition::Proceed(FileFormat::Json),
        input if input.eq_ignore_ascii_case("q") => Transition::Abort,
        _ => Transition::Retry,
    }
}

/// Interpret an answer inside a convergence loop: continue, poll again, or
/// abandon.
pub fn parse_convergence(input: &str) -> Transition<()> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Transition::Proceed(()),
        "r" | "retry" | "" => Transition::Retry,
        "n" | "no" | "q" | "quit" => Transition::Abort,
        _ => Transition::Retry,
    }
}

/// Source of operator answers. Production reads stdin; tests script the
/// answers.
pub trait Prompter: Send + Sync {
    /// Yes/no gate; only an explicit `y` answer proceeds.
    fn confirm(&self, message: &str) -> bool;

    /// Show `prompt` and return one line of input.
    fn read_line(&self, prompt: &str) -> String;
}

/// Prompter over stdin/stdout.
pub struct StdPrompter;

impl Prompter for StdPrompter {
    fn confirm(&self, message: &str) -> bool {
        println!("{message}");
        let answer = self.read_line("Press [y/Y] to continue or any other key to exit the operation.");
        answer.trim().eq_ignore_ascii_case("y")
    }

    fn read_line(&self, prompt: &str) -> String {
        if !prompt.is_empty() {
            println!("{prompt}");
        }
        print!("> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(_) => line.trim_end().to_string(),
            Err(_) => String::new(),
        }
    }
}
