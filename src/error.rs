use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## IR Errors
/// - [`Error::Malformed`] - A handle did not resolve or an invariant of the IR was broken
/// - [`Error::Verification`] - A function failed verification after a rewrite
///
/// ## Transformation Errors
/// - [`Error::MalformedCandidate`] - A function matched the detector but lacks a shape the
///   rewrite relies on
///
/// ## Evaluation Errors
/// - [`Error::UnknownFunction`] - A call named a function the module does not contain
/// - [`Error::Evaluation`] - The interpreter hit an operation it cannot execute
/// - [`Error::StepLimit`] - The interpreter exhausted its step budget
/// - [`Error::RecursionLimit`] - The interpreter exceeded its call depth budget
///
/// # Examples
///
/// ```rust
/// use tailfold::{CandidateDefect, Error};
///
/// fn describe(err: &Error) -> String {
///     match err {
///         Error::MalformedCandidate { function, defect } => {
///             format!("{function} cannot be rewritten: {defect}")
///         }
///         other => other.to_string(),
///     }
/// }
///
/// let err = Error::MalformedCandidate {
///     function: "sum".to_string(),
///     defect: CandidateDefect::BaseCaseMissing,
/// };
/// assert!(describe(&err).starts_with("sum cannot be rewritten"));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The IR is damaged or a handle points at a deleted entity.
    ///
    /// The error includes the source location where the malformation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A function passed the detector but does not have the structure the rewrite needs.
    ///
    /// No part of the function has been modified when this error is returned.
    #[error("Malformed candidate '{function}': {defect}")]
    MalformedCandidate {
        /// Name of the rejected function
        function: String,
        /// The precondition that failed
        defect: CandidateDefect,
    },

    /// A rewritten function failed verification and was discarded.
    #[error("Verification of '{function}' failed: {message}")]
    Verification {
        /// Name of the function that failed verification
        function: String,
        /// The first violation found
        message: String,
    },

    /// A call referenced a function that does not exist in the module.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// The interpreter could not execute an operation.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// The interpreter executed more steps than allowed.
    #[error("Step limit of {0} exceeded")]
    StepLimit(u64),

    /// The interpreter exceeded the configured call depth.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}

/// A structural precondition of the accumulator rewrite that a candidate violates.
///
/// The detector only proves the call/update pair exists. Everything else the rewrite
/// depends on is checked while planning and reported through one of these variants.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDefect {
    /// The entry block does not end in a conditional branch on a preceding comparison.
    #[error("entry block does not end in a comparison-guarded branch")]
    GuardMissing,
    /// The guard comparison does not test a function argument.
    #[error("recursion guard does not compare a function argument")]
    GuardNotOnArgument,
    /// No block other than the recursive one jumps to the final block.
    #[error("no base case block jumps to the final block")]
    BaseCaseMissing,
    /// The base case block does not store its result right before its jump.
    #[error("base case block has no store before its jump")]
    BaseCaseWithoutStore,
    /// The base case result is neither a constant nor a pass-through argument.
    #[error("base case value must be a constant or a non-induction argument")]
    BaseCaseValueUnsupported,
    /// The guard does not branch to the base case on true and the recursion on false.
    #[error("guard targets do not select the base case and the recursive block")]
    GuardTargetsMismatch,
    /// The recursive block does not jump to the final block.
    #[error("recursive block does not continue to the final block")]
    RecursiveBlockNotTail,
    /// The call is not preceded by a step on the induction argument feeding the call.
    #[error("recursive call is not preceded by a step of the induction argument")]
    StepMissing,
    /// A call argument other than the induction argument changes between calls.
    #[error("only the induction argument may change between recursive calls")]
    MultiArgumentChain,
    /// The update does not fold the induction argument into the call result.
    #[error("accumulator update does not combine the call result with the induction argument")]
    UpdateOperandMismatch,
    /// A block involved in the rewrite holds an instruction the loop cannot carry.
    #[error("unexpected instruction in a block involved in the rewrite")]
    UnexpectedInstruction,
    /// The final block does not return the value computed right before its return.
    #[error("final block does not return the value computed before its return")]
    FinalBlockShape,
    /// The function has blocks beyond entry, base case, recursion and final block.
    #[error("function has blocks outside the recursion shape")]
    UnexpectedBlock,
    /// Another self-call would survive the rewrite.
    #[error("another self-call would survive the rewrite")]
    ExtraSelfCall,
}
