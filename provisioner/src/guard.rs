//! Typed confirmation gate in front of destructive operations.
//!
//! [`SafetyGuard`] re-resolves the selected resource, shows the operator what
//! is about to be destroyed, and demands the exact token [`CONFIRMATION_TOKEN`].
//! After the answer it resolves the resource once more; if the identity moved
//! while the operator was reading the prompt, the new identity is shown and
//! confirmed again. Only a successful round yields a [`Confirmed`] value, and
//! only this module can construct one.

use std::fmt;

/// The only answer accepted as consent, compared after trimming whitespace.
pub const CONFIRMATION_TOKEN: &str = "YES";

/// A resource that can be destroyed and must be re-identified first.
pub trait GuardedResource: Clone {
    /// Properties that must not change between confirmation and use.
    type Identity: Clone + PartialEq + fmt::Display;

    /// Current identity of the resource.
    fn identity(&self) -> Self::Identity;

    /// One-line description shown to the operator.
    fn summary(&self) -> String;
}

/// Re-resolves a resource from the live system.
pub trait ResourceProbe<R> {
    /// Probe failure type.
    type Error: fmt::Display;

    /// Return the current state of `resource`, or `None` when it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error when the system cannot be queried.
    fn probe(&self, resource: &R) -> Result<Option<R>, Self::Error>;
}

/// What the operator is asked to confirm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    /// Description of the resource that will be destroyed.
    pub summary: String,
    /// Set when the identity differs from what was previously shown.
    pub change_notice: Option<String>,
    /// One-based prompt number within this confirmation.
    pub round: u32,
}

/// Source of operator answers.
pub trait Confirm {
    /// Show `prompt` and return the raw answer, or `None` on end of input or
    /// cancellation.
    fn confirm(&self, prompt: &ConfirmationPrompt) -> Option<String>;
}

/// Whether an answer grants consent.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::guard::is_affirmative;
///
/// assert!(is_affirmative(Some(" YES\n")));
/// assert!(!is_affirmative(Some("yes")));
/// assert!(!is_affirmative(Some("y")));
/// assert!(!is_affirmative(Some("")));
/// assert!(!is_affirmative(None));
/// ```
#[must_use]
pub fn is_affirmative(answer: Option<&str>) -> bool {
    answer.is_some_and(|text| text.trim() == CONFIRMATION_TOKEN)
}

/// Proof that the operator consented to destroying `R` in its current state.
#[derive(Debug)]
pub struct Confirmed<R> {
    resource: R,
    prompts: u32,
}

impl<R> Confirmed<R> {
    /// The resource as it was re-resolved after the final answer.
    pub const fn resource(&self) -> &R {
        &self.resource
    }

    /// Number of prompts shown before consent was given.
    #[must_use]
    pub const fn prompts(&self) -> u32 {
        self.prompts
    }

    /// Consume the proof, yielding the confirmed resource.
    pub fn into_resource(self) -> R {
        self.resource
    }
}

/// Why the guard refused to hand out a [`Confirmed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardRefusal {
    /// The operator answered anything other than the confirmation token.
    #[error("confirmation declined")]
    Declined,

    /// The resource disappeared.
    #[error("{resource} is no longer present")]
    Vanished {
        /// Summary of the missing resource.
        resource: String,
    },

    /// The identity kept changing across every allowed prompt.
    #[error("{resource} changed identity after each of {prompts} confirmation(s)")]
    Unstable {
        /// Summary of the last observed state.
        resource: String,
        /// Prompts shown.
        prompts: u32,
    },

    /// The resource could not be re-resolved.
    #[error("could not re-check {resource}: {reason}")]
    ProbeFailed {
        /// Summary of the resource being probed.
        resource: String,
        /// Probe error.
        reason: String,
    },
}

/// Confirmation gate parameterised by the probe and the answer source.
pub struct SafetyGuard<'a, P, C: ?Sized> {
    probe: &'a P,
    confirmer: &'a C,
    max_reconfirmations: u32,
}

impl<'a, P, C: Confirm + ?Sized> SafetyGuard<'a, P, C> {
    /// Create a guard allowing up to `max_reconfirmations` extra prompts after
    /// the first when the identity changes underneath the operator.
    #[must_use]
    pub const fn new(probe: &'a P, confirmer: &'a C, max_reconfirmations: u32) -> Self {
        Self {
            probe,
            confirmer,
            max_reconfirmations,
        }
    }

    /// Obtain consent to destroy `selected`.
    ///
    /// # Errors
    ///
    /// Returns a [`GuardRefusal`] when the operator declines, the resource is
    /// gone or cannot be probed, or its identity will not hold still.
    pub fn confirm<R>(&self, selected: &R) -> Result<Confirmed<R>, GuardRefusal>
    where
        R: GuardedResource,
        P: ResourceProbe<R>,
    {
        let mut current = self.resolve(selected)?;
        let mut change_notice = changed(&selected.identity(), &current.identity());
        let max_prompts = self.max_reconfirmations.saturating_add(1);

        for round in 1..=max_prompts {
            let prompt = ConfirmationPrompt {
                summary: current.summary(),
                change_notice: change_notice.take(),
                round,
            };
            let answer = self.confirmer.confirm(&prompt);
            if !is_affirmative(answer.as_deref()) {
                log::info!("operator declined to erase {}", prompt.summary);
                return Err(GuardRefusal::Declined);
            }

            let after = self.resolve(&current)?;
            if after.identity() == current.identity() {
                log::info!("operator confirmed erasing {}", after.summary());
                return Ok(Confirmed {
                    resource: after,
                    prompts: round,
                });
            }
            log::warn!(
                "identity changed after confirmation: {} -> {}",
                current.identity(),
                after.identity()
            );
            change_notice = changed(&current.identity(), &after.identity());
            current = after;
        }
        Err(GuardRefusal::Unstable {
            resource: current.summary(),
            prompts: max_prompts,
        })
    }

    fn resolve<R>(&self, resource: &R) -> Result<R, GuardRefusal>
    where
        R: GuardedResource,
        P: ResourceProbe<R>,
    {
        self.probe
            .probe(resource)
            .map_err(|e| GuardRefusal::ProbeFailed {
                resource: resource.summary(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| GuardRefusal::Vanished {
                resource: resource.summary(),
            })
    }
}

fn changed<I: PartialEq + fmt::Display>(before: &I, after: &I) -> Option<String> {
    (before != after).then(|| format!("CHANGED since last shown: was {before}, now {after}"))
}
