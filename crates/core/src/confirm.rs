//! Operator confirmation capability.

/// Yes/no decision presented to the operator.
///
/// Supplied by the external UI layer. The call is a suspend point: the
/// reconciler blocks logically until answered. Adapters must map a dismissed
/// dialog (operator closes it without choosing) to `false`, and should do
/// the same for their own timeout if they impose one.
pub trait ConfirmPrompt {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Closures double as prompts, which keeps tests and small adapters terse.
impl<F> ConfirmPrompt for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}
