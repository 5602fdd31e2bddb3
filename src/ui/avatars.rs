/// Avatars tab: read-only view of the avatar measurement vectors
use iced::widget::{column, scrollable, text, Column};
use iced::{Element, Length};

use crate::avatar::AvatarTable;
use crate::Message;

pub fn view(avatars: Option<&Result<AvatarTable, String>>) -> Element<'_, Message> {
    match avatars {
        None => text("No avatar measurements configured (set \"avatars_csv\" in config.json).")
            .size(16)
            .into(),
        Some(Err(e)) => text(format!("Could not load avatars: {}", e)).size(16).into(),
        Some(Ok(table)) => {
            let rows = table.columns.iter().map(|avatar| {
                let values: Vec<String> = avatar.values.iter().map(|v| v.to_string()).collect();
                text(format!("{}: {}", avatar.name, values.join(", ")))
                    .size(14)
                    .into()
            });

            scrollable(
                column![
                    text(format!("Avatars ({})", table.columns.len())).size(20),
                    Column::with_children(rows).spacing(6),
                ]
                .spacing(12),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
        }
    }
}
