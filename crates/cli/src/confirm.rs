//! Interactive operator confirmation.

use retag_core::client::Confirm;

/// Stdin-backed confirmation gate: requires a literal `yes`.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprintln!();
        eprintln!("{prompt}");
        eprintln!("Type 'yes' to continue:");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input).is_ok() && input.trim() == "yes"
    }
}
