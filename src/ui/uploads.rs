/// User Images tab: every photo and garment the user has loaded
use std::path::PathBuf;

use iced::widget::image::Handle;
use iced::widget::{column, scrollable, text, Image};
use iced::{Alignment, Element, Length, Pixels};
use iced_aw::Wrap;

use crate::Message;

const THUMB_SIZE: f32 = 150.0;

pub fn view(images: &[PathBuf]) -> Element<'_, Message> {
    if images.is_empty() {
        return text("No uploaded images yet. Load a photo or a garment from the Home tab.")
            .size(16)
            .into();
    }

    let thumbs: Vec<Element<'_, Message>> = images
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            column![
                Image::new(Handle::from_path(path))
                    .width(Length::Fixed(THUMB_SIZE))
                    .height(Length::Fixed(THUMB_SIZE)),
                text(name).size(12),
            ]
            .spacing(4)
            .align_x(Alignment::Center)
            .into()
        })
        .collect();

    let grid = Wrap::with_elements(thumbs)
        .spacing(Pixels(12.0))
        .line_spacing(Pixels(12.0));

    scrollable(column![text(format!("{} uploaded images", images.len())).size(16), grid].spacing(12))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
