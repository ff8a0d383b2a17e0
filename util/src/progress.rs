/// The course of a tracked gesture, reported per event.
///
/// Any number of `Proceed` values are followed by exactly one `Commit` or `Cancel`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress<T> {
    Proceed(T),
    /// Ends at the last value that proceeded.
    Commit,
    /// Ends without effect.
    Cancel,
}
