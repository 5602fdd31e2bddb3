/// Avatar data module
///
/// Parses the avatar measurements table into per-avatar vectors. The
/// recommender that would match them against a user is not part of this app.

pub mod measurements;

pub use measurements::AvatarTable;
