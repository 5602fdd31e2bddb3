/// User interface views
///
/// Each tab of the main window lives in its own module and only renders
/// what it is handed; all state changes go through `Message`s.

pub mod avatars;
pub mod gallery;
pub mod home;
pub mod uploads;
