/// Decides whether a call outcome counts as a failure against the breaker.
///
/// The default treats every `Err` as a failure. The proxy installs a custom
/// classifier so that downstream 4xx responses (client errors, not downstream
/// faults) do not trip the circuit.
pub trait FailureClassifier<Res, Err>: Send + Sync {
    fn is_failure(&self, result: &Result<Res, Err>) -> bool;
}

/// Classifies errors as failures and responses as successes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for DefaultClassifier {
    fn is_failure(&self, result: &Result<Res, Err>) -> bool {
        result.is_err()
    }
}

/// Adapts a closure into a [`FailureClassifier`].
#[derive(Clone)]
pub struct FnClassifier<F>(pub F);

impl<Res, Err, F> FailureClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
{
    fn is_failure(&self, result: &Result<Res, Err>) -> bool {
        (self.0)(result)
    }
}
