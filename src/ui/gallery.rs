/// Output Images tab: every produced try-on, newest first
use iced::widget::image::Handle;
use iced::widget::{column, scrollable, text, Image};
use iced::{Alignment, Element, Length, Pixels};
use iced_aw::Wrap;

use crate::state::history::HistoryEntry;
use crate::Message;

const TILE_SIZE: f32 = 200.0;

pub fn view(outputs: &[HistoryEntry]) -> Element<'_, Message> {
    if outputs.is_empty() {
        return text("No output images yet. Run a try-on from the Home tab.")
            .size(16)
            .into();
    }

    let tiles: Vec<Element<'_, Message>> = outputs.iter().map(tile).collect();

    let grid = Wrap::with_elements(tiles)
        .spacing(Pixels(12.0))
        .line_spacing(Pixels(12.0));

    scrollable(column![text(format!("{} output images", outputs.len())).size(16), grid].spacing(12))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn tile(entry: &HistoryEntry) -> Element<'_, Message> {
    let name = std::path::Path::new(&entry.output_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| entry.output_path.clone());

    let when = chrono::DateTime::from_timestamp(entry.created_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    column![
        Image::new(Handle::from_path(&entry.output_path))
            .width(Length::Fixed(TILE_SIZE))
            .height(Length::Fixed(TILE_SIZE)),
        text(name).size(12),
        text(when).size(10),
    ]
    .spacing(4)
    .align_x(Alignment::Center)
    .into()
}
