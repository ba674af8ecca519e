//! Tab selection driven by the current error.

use confirm_common::{EstimationError, SubmitError};
use derive_more::Display;

/// A tab of the confirmation form.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Tab {
    /// Operation summary and balance changes.
    #[display("details")]
    Details,
    /// Fee tiers and custom fee.
    #[display("fee")]
    Fee,
    /// Limits, nonce and raw operation.
    #[display("advanced")]
    Advanced,
    /// The current error.
    #[display("error")]
    Error,
}

impl Tab {
    /// Tabs that are always available.
    pub const BASE: [Self; 3] = [Self::Details, Self::Fee, Self::Advanced];
}

/// The error shown in the error tab.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// Submission failed.
    #[error(transparent)]
    Submit(SubmitError),
    /// The fee could not be estimated.
    #[error(transparent)]
    Estimation(EstimationError),
}

impl FormError {
    /// The error to show: submit errors outrank estimation errors.
    pub fn current(
        submit: Option<&SubmitError>,
        estimation: Option<&EstimationError>,
    ) -> Option<Self> {
        submit
            .cloned()
            .map(Self::Submit)
            .or_else(|| estimation.cloned().map(Self::Estimation))
    }
}

/// Selected tab plus the last error it reacted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabState {
    selected: Tab,
    error: Option<FormError>,
}

impl Default for TabState {
    fn default() -> Self {
        Self::new()
    }
}

impl TabState {
    /// Starts on [`Tab::Details`] without an error.
    pub fn new() -> Self {
        Self { selected: Tab::Details, error: None }
    }

    /// The selected tab.
    pub fn selected(&self) -> Tab {
        self.selected
    }

    /// The error currently shown, if any.
    pub fn error(&self) -> Option<&FormError> {
        self.error.as_ref()
    }

    /// Tabs the user can pick from; [`Tab::Error`] only while there is an error.
    pub fn available(&self) -> Vec<Tab> {
        let mut tabs = Tab::BASE.to_vec();
        if self.error.is_some() {
            tabs.push(Tab::Error);
        }
        tabs
    }

    /// Selects `tab`, returning `false` if it is not available.
    pub fn select(&mut self, tab: Tab) -> bool {
        if tab == Tab::Error && self.error.is_none() {
            return false;
        }
        self.selected = tab;
        true
    }

    /// Reacts to the current error.
    ///
    /// An error different from the previously observed one forces [`Tab::Error`]. Once the error
    /// is gone the error tab falls back to [`Tab::Details`]. A cleared error that comes back is
    /// new again.
    pub fn observe(&mut self, error: Option<FormError>) {
        if error == self.error {
            return;
        }
        match &error {
            Some(err) => {
                debug!(target: "confirm::form", %err, "showing error tab");
                self.selected = Tab::Error;
            }
            None if self.selected == Tab::Error => self.selected = Tab::Details,
            None => {}
        }
        self.error = error;
    }
}
