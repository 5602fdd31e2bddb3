/// Home tab: instructions, the two upload slots with previews, the run button
use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, text, Column, Image};
use iced::{Alignment, Element, Length};

use crate::state::data::{ImageRef, RunState, Slot};
use crate::Message;

/// Edge length of the square preview boxes
pub const PREVIEW_SIZE: f32 = 200.0;
const RESULT_SIZE: f32 = 320.0;

/// What the home tab shows for one slot
#[derive(Debug, Clone)]
pub struct SlotPreview {
    pub slot: Slot,
    pub image: Option<ImageRef>,
    pub dimensions: Option<(u32, u32)>,
}

pub fn view<'a>(
    person: SlotPreview,
    garment: SlotPreview,
    output: Option<ImageRef>,
    state: RunState,
    last_error: Option<String>,
    status: &'a str,
) -> Element<'a, Message> {
    let mut instructions = column![
        text("AI Personal Shopper").size(32),
        text("Instructions:\n1. Load your photo and a garment.\n2. Run the try-on.\n3. View the results.")
            .size(16),
        text(state_label(state)).size(14),
    ]
    .spacing(16)
    .width(Length::FillPortion(1));

    if let Some(error) = last_error {
        instructions = instructions.push(text(format!("Compositor output: {}", error)).size(12));
    }
    instructions = instructions.push(text(status).size(14));

    let run_label = if state == RunState::Running {
        "Running..."
    } else {
        "Run try-on"
    };

    // No on_press (disabled) while a run is in flight or a slot is empty
    let run_button = button(text(run_label).size(16))
        .padding(12)
        .width(Length::Fixed(250.0));
    let run_button = if state.can_run() {
        run_button.on_press(Message::RunTryOn)
    } else {
        run_button
    };

    let slots = column![slot_view(person), slot_view(garment), run_button]
        .spacing(16)
        .align_x(Alignment::Center);

    row![instructions, slots, result_view(output)]
        .spacing(40)
        .padding(20)
        .into()
}

/// The image produced by the last successful run
fn result_view(output: Option<ImageRef>) -> Element<'static, Message> {
    let (picture, caption): (Element<'static, Message>, String) = match output {
        Some(image) => (
            Image::new(Handle::from_path(image.path()))
                .width(Length::Fixed(RESULT_SIZE))
                .height(Length::Fixed(RESULT_SIZE))
                .into(),
            image.file_name(),
        ),
        None => (text("No result yet").into(), String::new()),
    };

    column![
        text("Latest Result").size(18),
        container(picture)
            .width(Length::Fixed(RESULT_SIZE))
            .height(Length::Fixed(RESULT_SIZE))
            .center_x(Length::Fixed(RESULT_SIZE))
            .center_y(Length::Fixed(RESULT_SIZE))
            .style(container::bordered_box),
        text(caption).size(12),
    ]
    .spacing(6)
    .align_x(Alignment::Center)
    .into()
}

fn slot_view(preview: SlotPreview) -> Element<'static, Message> {
    let title = format!("Load {} Image", preview.slot.label());

    let picture: Element<'static, Message> = match &preview.image {
        Some(image) => Image::new(Handle::from_path(image.path()))
            .width(Length::Fixed(PREVIEW_SIZE))
            .height(Length::Fixed(PREVIEW_SIZE))
            .into(),
        None => text("No Image Loaded").into(),
    };

    let caption = match (&preview.image, preview.dimensions) {
        (Some(image), Some((w, h))) => format!("{} ({}x{})", image.file_name(), w, h),
        (Some(image), None) => image.file_name(),
        (None, _) => String::new(),
    };

    let column: Column<'static, Message> = column![
        button(text(title)).on_press(Message::PickImage(preview.slot)).padding(10),
        container(picture)
            .width(Length::Fixed(PREVIEW_SIZE))
            .height(Length::Fixed(PREVIEW_SIZE))
            .center_x(Length::Fixed(PREVIEW_SIZE))
            .center_y(Length::Fixed(PREVIEW_SIZE))
            .style(container::bordered_box),
        text(caption).size(12),
    ]
    .spacing(6)
    .align_x(Alignment::Center);

    column.into()
}

fn state_label(state: RunState) -> &'static str {
    match state {
        RunState::Idle => "Waiting for both images",
        RunState::Ready => "Ready to run",
        RunState::Running => "Compositor is running",
        RunState::Succeeded => "Last try-on succeeded",
        RunState::Failed => "Last try-on failed",
    }
}
